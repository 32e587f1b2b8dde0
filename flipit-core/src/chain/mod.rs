//! Boundaries toward the two external collaborators: the wallet provider
//! that authorizes account access, and the transaction client that exposes
//! the deployed contract as read calls, state-changing sends and named event
//! streams.

pub mod decode;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::error::Result;
use crate::types::{Address, ContractEvent, TxNotification};

/// Contract method names. These are the wire contract with the deployed
/// FlipIt program and must not be renamed.
pub mod methods {
    pub const TOSS: &str = "toss";
    pub const CLAIM_WIN: &str = "claimWin";
    pub const GET_ACCOUNT_WAGER: &str = "getAccountWager";
    pub const GET_GAME_STATS: &str = "getGameStats";
    pub const IS_ADMIN: &str = "isAdmin";
    pub const LOAD_GAME: &str = "loadGame";
    pub const WITHDRAW: &str = "withdraw";
    pub const SET_MINIMUM_BET: &str = "setMinimumBet";
}

/// Contract event stream names, wire identifiers like [`methods`].
pub mod events {
    pub const TOSS_SUBMITTED: &str = "tossSubmitted";
    pub const TOSS_RESULT_RETURNED: &str = "tossResultReturned";
    pub const FLIP_IT_LOG: &str = "flipItLog";
}

/// Options attached to a state-changing send.
#[derive(Debug, Clone, Copy, Default)]
pub struct SendOptions {
    /// Native value transferred with the transaction, in wei.
    pub value: u128,
    pub gas: Option<u64>,
}

/// Wallet provider boundary: the sole authentication primitive.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Request account access. Denial or absence of a wallet must error.
    async fn request_access(&self) -> Result<Vec<Address>>;
}

/// Produces contract handles bound to an address and a default sender.
#[async_trait]
pub trait ContractConnector: Send + Sync {
    async fn contract_at(
        &self,
        address: &Address,
        sender: &Address,
    ) -> Result<Arc<dyn ContractHandle>>;
}

/// A typed binding to the deployed contract.
#[async_trait]
pub trait ContractHandle: Send + Sync {
    /// Read-only call returning the contract's positional result fields.
    async fn call(&self, method: &str, args: &[Value]) -> Result<Vec<Value>>;

    /// State-changing send. `Ok` means the transaction was accepted for
    /// submission; the rest of its lifecycle arrives on the returned handle.
    async fn send(&self, method: &str, args: &[Value], options: SendOptions) -> Result<TxHandle>;

    /// Subscription descriptor for a named contract event stream.
    fn event_stream(&self, name: &str) -> Result<EventStream>;
}

/// Lifecycle notifications of one submitted transaction.
pub struct TxHandle {
    transaction_hash: String,
    notifications: mpsc::Receiver<TxNotification>,
}

impl TxHandle {
    pub fn new(
        transaction_hash: impl Into<String>,
        notifications: mpsc::Receiver<TxNotification>,
    ) -> Self {
        Self {
            transaction_hash: transaction_hash.into(),
            notifications,
        }
    }

    /// Build a handle together with the sender half used by the transaction
    /// client to publish notifications.
    pub fn channel(
        transaction_hash: impl Into<String>,
        capacity: usize,
    ) -> (mpsc::Sender<TxNotification>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self::new(transaction_hash, receiver))
    }

    pub fn transaction_hash(&self) -> &str {
        &self.transaction_hash
    }

    /// Next lifecycle notification; `None` once the transaction client has
    /// dropped its sender.
    pub async fn next(&mut self) -> Option<TxNotification> {
        self.notifications.recv().await
    }
}

impl std::fmt::Debug for TxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxHandle")
            .field("transaction_hash", &self.transaction_hash)
            .finish()
    }
}

/// Subscription to a named contract event stream.
pub struct EventStream {
    name: String,
    receiver: broadcast::Receiver<ContractEvent>,
}

impl EventStream {
    pub fn new(name: impl Into<String>, receiver: broadcast::Receiver<ContractEvent>) -> Self {
        Self {
            name: name.into(),
            receiver,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next event on the stream; `None` once the stream is closed. Entries
    /// dropped because this subscriber lagged are skipped.
    pub async fn next(&mut self) -> Option<ContractEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(stream = %self.name, skipped, "event stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
