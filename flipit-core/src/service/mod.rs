//! The FlipIt service façade consumed by UI code.
//!
//! Holds the wallet-authenticated session and mediates every interaction
//! with the contract: wager submission, win claims, statistics queries and
//! administrative actions.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::json;
use tokio::time;

use crate::chain::{
    decode, events, methods, ContractConnector, ContractHandle, EventStream, SendOptions,
    TxHandle, WalletProvider,
};
use crate::error::{FlipItError, Result};
use crate::types::{
    Address, Completion, Denomination, GameStatsReport, QueryId, TxNotification, WagerChoice,
};
use crate::units;

/// Gas attached to state-changing sends.
pub const DEFAULT_GAS_LIMIT: u64 = 2_000_000;

/// Minimum wager assumed until the first statistics query refreshes it
/// (one finney).
pub const INITIAL_MINIMUM_WAGER: u128 = 1_000_000_000_000_000;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// How long a claim or administrative operation waits for its first
    /// confirmation or receipt before failing.
    pub confirmation_timeout: Duration,
    pub gas_limit: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(60),
            gas_limit: DEFAULT_GAS_LIMIT,
        }
    }
}

impl ServiceConfig {
    pub fn validate(&self) -> Result<()> {
        if self.confirmation_timeout.is_zero() {
            return Err(FlipItError::internal(
                "confirmation timeout must be greater than zero",
            ));
        }
        if self.gas_limit == 0 {
            return Err(FlipItError::internal("gas limit must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Clone)]
struct Session {
    account: Address,
    contract: Arc<dyn ContractHandle>,
}

pub struct FlipItService {
    provider: Arc<dyn WalletProvider>,
    connector: Arc<dyn ContractConnector>,
    contract_address: Address,
    config: ServiceConfig,
    session: RwLock<Option<Session>>,
    minimum_wager: RwLock<u128>,
}

impl FlipItService {
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        connector: Arc<dyn ContractConnector>,
        contract_address: Address,
    ) -> Self {
        Self::with_config(provider, connector, contract_address, ServiceConfig::default())
    }

    pub fn with_config(
        provider: Arc<dyn WalletProvider>,
        connector: Arc<dyn ContractConnector>,
        contract_address: Address,
        config: ServiceConfig,
    ) -> Self {
        Self {
            provider,
            connector,
            contract_address,
            config,
            session: RwLock::new(None),
            minimum_wager: RwLock::new(INITIAL_MINIMUM_WAGER),
        }
    }

    /// Authenticate with the wallet provider and bind the contract handle.
    ///
    /// Adopts the first granted account as the active player account and
    /// verifies the contract's event streams resolve. Running this again
    /// replaces the session.
    pub async fn init(&self) -> Result<()> {
        self.config.validate()?;
        let accounts = self.provider.request_access().await?;
        let account = accounts.into_iter().next().ok_or_else(|| {
            FlipItError::wallet_access("wallet granted access but returned no accounts")
        })?;
        let contract = self
            .connector
            .contract_at(&self.contract_address, &account)
            .await?;
        for name in [
            events::TOSS_SUBMITTED,
            events::TOSS_RESULT_RETURNED,
            events::FLIP_IT_LOG,
        ] {
            contract.event_stream(name)?;
        }
        tracing::info!(account = %account, "FlipIt session initialized");
        *self.session.write() = Some(Session { account, contract });
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.session.read().is_some()
    }

    /// The account every operation sends from.
    pub fn player_account(&self) -> Result<Address> {
        Ok(self.session()?.account)
    }

    /// Minimum wager threshold as of the last statistics query.
    pub fn minimum_wager(&self) -> u128 {
        *self.minimum_wager.read()
    }

    /// Submit a wager on a coin toss.
    ///
    /// `choice` is the raw index the UI supplies: 0 heads, 1 tails. The
    /// returned handle is the transaction client's own lifecycle signal; an
    /// `Ok` here acknowledges submission, not on-chain finality.
    pub async fn do_toss(
        &self,
        choice: u8,
        amount: &str,
        denomination: Denomination,
    ) -> Result<TxHandle> {
        let choice = WagerChoice::from_index(choice)?;
        let value = units::to_wei(amount, denomination)?;
        let minimum = *self.minimum_wager.read();
        if value < minimum {
            return Err(FlipItError::MinimumWager {
                wagered: value,
                minimum,
            });
        }
        let session = self.session()?;
        let options = SendOptions {
            value,
            gas: Some(self.config.gas_limit),
        };
        let handle = session
            .contract
            .send(methods::TOSS, &[json!(choice.index())], options)
            .await?;
        tracing::info!(tx = %handle.transaction_hash(), %choice, value = %value, "toss submitted");
        Ok(handle)
    }

    /// Claim a previously unresolved win.
    ///
    /// Resolves on the first of the transaction's confirmation or receipt
    /// notifications, whichever arrives first.
    pub async fn claim_win(&self, query_id: &QueryId) -> Result<Completion> {
        let session = self.session()?;
        let options = SendOptions {
            value: 0,
            gas: Some(self.config.gas_limit),
        };
        let handle = session
            .contract
            .send(methods::CLAIM_WIN, &[json!(query_id.as_str())], options)
            .await?;
        tracing::info!(tx = %handle.transaction_hash(), query_id = %query_id, "claim submitted");
        self.await_completion(handle).await
    }

    /// Fetch the calling account's wager record and the aggregate game
    /// statistics, merged into one report.
    ///
    /// Refreshes the cached minimum wager as a side effect. Either underlying
    /// query failing fails the whole report; there is no partial result.
    pub async fn game_stats(&self) -> Result<GameStatsReport> {
        let session = self.session()?;
        let account_fields = session
            .contract
            .call(methods::GET_ACCOUNT_WAGER, &[])
            .await?;
        let account = decode::account_wager(&account_fields)?;
        let stats_fields = session.contract.call(methods::GET_GAME_STATS, &[]).await?;
        let stats = decode::game_stats(&stats_fields)?;
        *self.minimum_wager.write() = stats.minimum_wager;

        let unclaimed_win = account.win && !account.claimed;
        let unclaimed_query_id = unclaimed_win.then(|| account.query_id);
        Ok(GameStatsReport {
            stats,
            unclaimed_win,
            unclaimed_query_id,
        })
    }

    /// Whether the active account is the game administrator.
    pub async fn is_admin(&self) -> Result<bool> {
        let session = self.session()?;
        let fields = session.contract.call(methods::IS_ADMIN, &[]).await?;
        decode::admin_flag(&fields)
    }

    /// Add funds to the game's balance. `amount` is denominated in ether.
    pub async fn load_game(&self, amount: &str) -> Result<Completion> {
        let value = units::to_wei(amount, Denomination::Ether)?;
        let session = self.session()?;
        let options = SendOptions {
            value,
            gas: Some(self.config.gas_limit),
        };
        let handle = session.contract.send(methods::LOAD_GAME, &[], options).await?;
        tracing::info!(tx = %handle.transaction_hash(), value = %value, "game load submitted");
        self.await_completion(handle).await
    }

    /// Withdraw funds from the game's balance. `amount` is denominated in
    /// ether. Privilege is checked by the contract, not here.
    pub async fn withdraw(&self, amount: &str) -> Result<Completion> {
        let wei = units::to_wei(amount, Denomination::Ether)?;
        let session = self.session()?;
        let options = SendOptions {
            value: 0,
            gas: Some(self.config.gas_limit),
        };
        let handle = session
            .contract
            .send(methods::WITHDRAW, &[json!(wei.to_string())], options)
            .await?;
        tracing::info!(tx = %handle.transaction_hash(), amount = %wei, "withdrawal submitted");
        self.await_completion(handle).await
    }

    /// Adjust the minimum wager threshold. `amount` is denominated in ether.
    /// The cached threshold only changes once a statistics query observes it.
    pub async fn set_minimum_bet(&self, amount: &str) -> Result<Completion> {
        let wei = units::to_wei(amount, Denomination::Ether)?;
        let session = self.session()?;
        let options = SendOptions {
            value: 0,
            gas: Some(self.config.gas_limit),
        };
        let handle = session
            .contract
            .send(methods::SET_MINIMUM_BET, &[json!(wei.to_string())], options)
            .await?;
        tracing::info!(tx = %handle.transaction_hash(), minimum = %wei, "minimum wager update submitted");
        self.await_completion(handle).await
    }

    pub fn toss_submitted_events(&self) -> Result<EventStream> {
        self.session()?.contract.event_stream(events::TOSS_SUBMITTED)
    }

    pub fn toss_result_returned_events(&self) -> Result<EventStream> {
        self.session()?
            .contract
            .event_stream(events::TOSS_RESULT_RETURNED)
    }

    pub fn flip_it_log_events(&self) -> Result<EventStream> {
        self.session()?.contract.event_stream(events::FLIP_IT_LOG)
    }

    fn session(&self) -> Result<Session> {
        self.session.read().clone().ok_or(FlipItError::NotInitialized)
    }

    /// Await the first terminal notification of a submitted transaction.
    ///
    /// The returned completion resolves exactly once regardless of how many
    /// confirmation or receipt notifications follow. `error` notifications
    /// and silence past the configured timeout both surface as errors.
    async fn await_completion(&self, mut handle: TxHandle) -> Result<Completion> {
        let waited = self.config.confirmation_timeout;
        let outcome = time::timeout(waited, async {
            loop {
                match handle.next().await {
                    Some(TxNotification::TransactionHash(hash)) => {
                        tracing::debug!(%hash, "transaction hash received");
                    }
                    Some(TxNotification::Confirmation(number)) => {
                        return Ok(Completion::Confirmed(number));
                    }
                    Some(TxNotification::Receipt(receipt)) => {
                        return Ok(Completion::Receipted(receipt));
                    }
                    Some(TxNotification::Error(message)) => {
                        return Err(FlipItError::transaction(message));
                    }
                    None => {
                        return Err(FlipItError::transaction(
                            "notification stream closed before completion",
                        ));
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(result) => result,
            Err(_) => Err(FlipItError::Timeout { waited }),
        }
    }
}
