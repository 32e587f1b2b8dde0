//! In-process FlipIt chain.
//!
//! Implements the wallet-provider and transaction-client boundaries against
//! an in-memory contract with the full FlipIt semantics: minimum-wager
//! enforcement, hash-derived coin resolution, multiplier payouts, claim
//! bookkeeping and admin-gated maintenance. The chain state is serializable
//! so a consumer can persist it between runs; the service layer itself still
//! owns nothing durable.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::chain::{
    events, methods, ContractConnector, ContractHandle, EventStream, SendOptions, TxHandle,
    WalletProvider,
};
use crate::error::{FlipItError, Result};
use crate::types::{u128_string, Address, ContractEvent, TxNotification, TxReceipt};

pub const GENESIS_ACCOUNTS: usize = 3;
pub const DEFAULT_WIN_MULTIPLIER: u64 = 2;
/// One finney.
pub const DEFAULT_MINIMUM_WAGER: u128 = 1_000_000_000_000_000;
/// Ten ether: the pot the contract is deployed with.
pub const GENESIS_BALANCE: u128 = 10_000_000_000_000_000_000;

const EVENT_STREAM_CAPACITY: usize = 64;
const NOTIFICATION_CAPACITY: usize = 8;

/// One account's wager record, stored in the contract's positional layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WagerRecord {
    #[serde(with = "u128_string")]
    pub amount: u128,
    #[serde(with = "u128_string")]
    pub payout: u128,
    pub timestamp: i64,
    pub pending: bool,
    pub choice: u8,
    pub query_id: String,
    pub result: u8,
    pub win: bool,
    pub block: u64,
    pub claimed: bool,
}

impl WagerRecord {
    pub fn empty() -> Self {
        Self {
            amount: 0,
            payout: 0,
            timestamp: 0,
            pending: false,
            choice: 0,
            query_id: "0x0".to_string(),
            result: 0,
            win: false,
            block: 0,
            claimed: false,
        }
    }

    /// The positional shape `getAccountWager` puts on the wire.
    fn to_fields(&self) -> Vec<Value> {
        vec![
            json!(self.amount.to_string()),
            json!(self.payout.to_string()),
            json!(self.timestamp),
            json!(self.pending),
            json!(self.choice),
            json!(self.query_id),
            json!(self.result),
            json!(self.win),
            json!(self.block),
            json!(self.claimed),
        ]
    }
}

/// Complete contract and ledger state of the simulated chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainState {
    pub accounts: Vec<Address>,
    pub admin: Address,
    #[serde(with = "u128_string")]
    pub balance: u128,
    #[serde(with = "u128_string")]
    pub minimum_wager: u128,
    pub win_multiplier: u64,
    pub wagers_made: u64,
    pub wagers_won: u64,
    #[serde(with = "u128_string")]
    pub amount_wagered: u128,
    #[serde(with = "u128_string")]
    pub amount_paid_out: u128,
    pub records: HashMap<String, WagerRecord>,
    pub block_number: u64,
    #[serde(default)]
    pub log: Vec<ContractEvent>,
}

impl ChainState {
    pub fn genesis() -> Self {
        let accounts: Vec<Address> = (0..GENESIS_ACCOUNTS).map(derived_account).collect();
        let admin = accounts[0].clone();
        Self {
            accounts,
            admin,
            balance: GENESIS_BALANCE,
            minimum_wager: DEFAULT_MINIMUM_WAGER,
            win_multiplier: DEFAULT_WIN_MULTIPLIER,
            wagers_made: 0,
            wagers_won: 0,
            amount_wagered: 0,
            amount_paid_out: 0,
            records: HashMap::new(),
            block_number: 0,
            log: Vec::new(),
        }
    }
}

fn derived_account(index: usize) -> Address {
    let digest = Sha256::digest(format!("flipit-account-{index}"));
    Address::new(format!("0x{}", hex::encode(&digest[..20])))
}

fn transaction_hash(block_number: u64) -> String {
    let digest = Sha256::digest(format!("flipit-tx-{block_number}"));
    format!("0x{}", hex::encode(digest))
}

type StreamMap = HashMap<&'static str, broadcast::Sender<ContractEvent>>;

pub struct SimulatedChain {
    state: Arc<RwLock<ChainState>>,
    streams: Arc<StreamMap>,
}

impl SimulatedChain {
    pub fn new() -> Self {
        Self::from_state(ChainState::genesis())
    }

    pub fn from_state(state: ChainState) -> Self {
        let mut streams = StreamMap::new();
        for name in [
            events::TOSS_SUBMITTED,
            events::TOSS_RESULT_RETURNED,
            events::FLIP_IT_LOG,
        ] {
            streams.insert(name, broadcast::channel(EVENT_STREAM_CAPACITY).0);
        }
        Self {
            state: Arc::new(RwLock::new(state)),
            streams: Arc::new(streams),
        }
    }

    /// Snapshot of the chain state, e.g. for persistence.
    pub fn state(&self) -> ChainState {
        self.state.read().clone()
    }

    pub fn accounts(&self) -> Vec<Address> {
        self.state.read().accounts.clone()
    }

    /// Move `account` to the front so `request_access` hands it out as the
    /// active account.
    pub fn activate_account(&self, account: &Address) -> Result<()> {
        let mut state = self.state.write();
        let position = state
            .accounts
            .iter()
            .position(|known| known == account)
            .ok_or_else(|| FlipItError::wallet_access(format!("unknown account {account}")))?;
        state.accounts.swap(0, position);
        Ok(())
    }

    /// The most recent `limit` contract events, oldest first.
    pub fn recent_events(&self, limit: usize) -> Vec<ContractEvent> {
        let state = self.state.read();
        let skip = state.log.len().saturating_sub(limit);
        state.log[skip..].to_vec()
    }
}

impl Default for SimulatedChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletProvider for SimulatedChain {
    async fn request_access(&self) -> Result<Vec<Address>> {
        Ok(self.state.read().accounts.clone())
    }
}

#[async_trait]
impl ContractConnector for SimulatedChain {
    async fn contract_at(
        &self,
        _address: &Address,
        sender: &Address,
    ) -> Result<Arc<dyn ContractHandle>> {
        if !self.state.read().accounts.contains(sender) {
            return Err(FlipItError::wallet_access(format!(
                "unknown account {sender}"
            )));
        }
        Ok(Arc::new(SimContract {
            state: self.state.clone(),
            streams: self.streams.clone(),
            sender: sender.clone(),
        }))
    }
}

/// Contract handle bound to one sender account.
struct SimContract {
    state: Arc<RwLock<ChainState>>,
    streams: Arc<StreamMap>,
    sender: Address,
}

impl SimContract {
    fn emit(&self, state: &mut ChainState, name: &'static str, payload: Value, hash: &str) {
        let event = ContractEvent {
            name: name.to_string(),
            payload,
            transaction_hash: hash.to_string(),
            timestamp: Utc::now(),
        };
        state.log.push(event.clone());
        if let Some(stream) = self.streams.get(name) {
            // nobody listening is fine
            let _ = stream.send(event);
        }
    }

    /// Execute a state-changing method; `Err` is the revert reason.
    fn execute(
        &self,
        state: &mut ChainState,
        method: &str,
        args: &[Value],
        options: &SendOptions,
        hash: &str,
    ) -> std::result::Result<(), String> {
        match method {
            methods::TOSS => self.toss(state, args, options, hash),
            methods::CLAIM_WIN => self.claim_win(state, args, hash),
            methods::LOAD_GAME => self.load_game(state, options, hash),
            methods::WITHDRAW => self.withdraw(state, args, hash),
            methods::SET_MINIMUM_BET => self.set_minimum_bet(state, args, hash),
            other => Err(format!("unknown method {other}")),
        }
    }

    fn toss(
        &self,
        state: &mut ChainState,
        args: &[Value],
        options: &SendOptions,
        hash: &str,
    ) -> std::result::Result<(), String> {
        let choice = uint_arg(args, 0)?;
        if choice > 1 {
            return Err(format!("invalid choice {choice}"));
        }
        let choice = choice as u8;
        if options.value < state.minimum_wager {
            return Err(format!(
                "wager {} below minimum {}",
                options.value, state.minimum_wager
            ));
        }

        let query_id = format!("0x{}", Uuid::new_v4().simple());
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update(query_id.as_bytes());
        let result = hasher.finalize()[0] & 1;
        let win = result == choice;

        let payout = options
            .value
            .checked_mul(u128::from(state.win_multiplier))
            .ok_or_else(|| "payout overflows".to_string())?;

        state.wagers_made += 1;
        state.amount_wagered += options.value;
        state.balance += options.value;
        if win {
            state.wagers_won += 1;
        }
        state.records.insert(
            self.sender.as_str().to_string(),
            WagerRecord {
                amount: options.value,
                payout: if win { payout } else { 0 },
                timestamp: Utc::now().timestamp(),
                pending: false,
                choice,
                query_id: query_id.clone(),
                result,
                win,
                block: state.block_number,
                claimed: false,
            },
        );

        self.emit(
            state,
            events::TOSS_SUBMITTED,
            json!({
                "player": self.sender.as_str(),
                "choice": choice,
                "amount": options.value.to_string(),
                "queryId": query_id,
            }),
            hash,
        );
        self.emit(
            state,
            events::TOSS_RESULT_RETURNED,
            json!({
                "queryId": query_id,
                "result": result,
                "win": win,
                "payout": if win { payout.to_string() } else { "0".to_string() },
            }),
            hash,
        );
        Ok(())
    }

    fn claim_win(
        &self,
        state: &mut ChainState,
        args: &[Value],
        hash: &str,
    ) -> std::result::Result<(), String> {
        let query_id = string_arg(args, 0)?;
        let record = state
            .records
            .get(self.sender.as_str())
            .filter(|record| record.query_id == query_id && record.win && !record.claimed)
            .cloned()
            .ok_or_else(|| format!("no unclaimed win for query id {query_id}"))?;

        if state.balance < record.payout {
            return Err("game balance cannot cover the payout".to_string());
        }
        state.balance -= record.payout;
        state.amount_paid_out += record.payout;
        if let Some(stored) = state.records.get_mut(self.sender.as_str()) {
            stored.claimed = true;
        }

        self.emit(
            state,
            events::FLIP_IT_LOG,
            json!({
                "message": "win claimed",
                "player": self.sender.as_str(),
                "queryId": query_id,
                "payout": record.payout.to_string(),
            }),
            hash,
        );
        Ok(())
    }

    fn load_game(
        &self,
        state: &mut ChainState,
        options: &SendOptions,
        hash: &str,
    ) -> std::result::Result<(), String> {
        state.balance += options.value;
        self.emit(
            state,
            events::FLIP_IT_LOG,
            json!({
                "message": "game loaded",
                "from": self.sender.as_str(),
                "amount": options.value.to_string(),
            }),
            hash,
        );
        Ok(())
    }

    fn withdraw(
        &self,
        state: &mut ChainState,
        args: &[Value],
        hash: &str,
    ) -> std::result::Result<(), String> {
        if self.sender != state.admin {
            return Err("caller is not the game admin".to_string());
        }
        let amount = big_uint_arg(args, 0)?;
        if amount > state.balance {
            return Err("insufficient game balance".to_string());
        }
        state.balance -= amount;
        self.emit(
            state,
            events::FLIP_IT_LOG,
            json!({
                "message": "funds withdrawn",
                "amount": amount.to_string(),
            }),
            hash,
        );
        Ok(())
    }

    fn set_minimum_bet(
        &self,
        state: &mut ChainState,
        args: &[Value],
        hash: &str,
    ) -> std::result::Result<(), String> {
        if self.sender != state.admin {
            return Err("caller is not the game admin".to_string());
        }
        let minimum = big_uint_arg(args, 0)?;
        state.minimum_wager = minimum;
        self.emit(
            state,
            events::FLIP_IT_LOG,
            json!({
                "message": "minimum wager updated",
                "minimum": minimum.to_string(),
            }),
            hash,
        );
        Ok(())
    }
}

#[async_trait]
impl ContractHandle for SimContract {
    async fn call(&self, method: &str, _args: &[Value]) -> Result<Vec<Value>> {
        let state = self.state.read();
        match method {
            methods::GET_ACCOUNT_WAGER => {
                let record = state
                    .records
                    .get(self.sender.as_str())
                    .cloned()
                    .unwrap_or_else(WagerRecord::empty);
                Ok(record.to_fields())
            }
            methods::GET_GAME_STATS => Ok(vec![
                json!(state.wagers_made),
                json!(state.wagers_won),
                json!(state.amount_wagered.to_string()),
                json!(state.amount_paid_out.to_string()),
                json!(state.balance.to_string()),
                json!(state.win_multiplier),
                json!(state.minimum_wager.to_string()),
            ]),
            methods::IS_ADMIN => Ok(vec![json!(self.sender == state.admin)]),
            other => Err(FlipItError::call(format!("unknown read method {other}"))),
        }
    }

    async fn send(&self, method: &str, args: &[Value], options: SendOptions) -> Result<TxHandle> {
        let (hash, block_number, outcome) = {
            let mut state = self.state.write();
            state.block_number += 1;
            let hash = transaction_hash(state.block_number);
            let outcome = self.execute(&mut state, method, args, &options, &hash);
            (hash, state.block_number, outcome)
        };

        let (notifier, handle) = TxHandle::channel(&hash, NOTIFICATION_CAPACITY);
        let _ = notifier.try_send(TxNotification::TransactionHash(hash.clone()));
        match outcome {
            Ok(()) => {
                tracing::debug!(tx = %hash, method, "transaction executed");
                let receipt = TxReceipt {
                    transaction_hash: hash,
                    block_number,
                    status: true,
                };
                let _ = notifier.try_send(TxNotification::Receipt(receipt));
                let _ = notifier.try_send(TxNotification::Confirmation(1));
            }
            Err(reason) => {
                tracing::warn!(tx = %hash, method, %reason, "transaction reverted");
                let _ = notifier.try_send(TxNotification::Error(reason));
            }
        }
        Ok(handle)
    }

    fn event_stream(&self, name: &str) -> Result<EventStream> {
        let stream = self
            .streams
            .get(name)
            .ok_or_else(|| FlipItError::UnknownEvent(name.to_string()))?;
        Ok(EventStream::new(name, stream.subscribe()))
    }
}

fn uint_arg(args: &[Value], index: usize) -> std::result::Result<u64, String> {
    args.get(index)
        .and_then(Value::as_u64)
        .ok_or_else(|| format!("argument {index} is not an unsigned integer"))
}

fn big_uint_arg(args: &[Value], index: usize) -> std::result::Result<u128, String> {
    match args.get(index) {
        Some(Value::String(raw)) => raw
            .parse()
            .map_err(|_| format!("argument {index} is not an unsigned amount")),
        Some(Value::Number(number)) => number
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| format!("argument {index} is not an unsigned amount")),
        _ => Err(format!("argument {index} is not an unsigned amount")),
    }
}

fn string_arg(args: &[Value], index: usize) -> std::result::Result<String, String> {
    match args.get(index) {
        Some(Value::String(raw)) => Ok(raw.clone()),
        _ => Err(format!("argument {index} is not a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::decode;

    async fn player_contract(chain: &SimulatedChain, index: usize) -> Arc<dyn ContractHandle> {
        let account = chain.accounts()[index].clone();
        chain
            .contract_at(&Address::new("0xflipit"), &account)
            .await
            .unwrap()
    }

    async fn drain(handle: &mut TxHandle) -> Vec<TxNotification> {
        let mut notifications = Vec::new();
        while let Some(notification) = handle.next().await {
            notifications.push(notification);
        }
        notifications
    }

    #[tokio::test]
    async fn toss_records_the_wager_and_updates_the_stats() {
        let chain = SimulatedChain::new();
        let contract = player_contract(&chain, 1).await;

        let options = SendOptions {
            value: DEFAULT_MINIMUM_WAGER,
            gas: Some(2_000_000),
        };
        let mut handle = contract
            .send(methods::TOSS, &[json!(1)], options)
            .await
            .unwrap();
        let notifications = drain(&mut handle).await;
        assert!(matches!(
            notifications[0],
            TxNotification::TransactionHash(_)
        ));
        assert!(matches!(notifications[1], TxNotification::Receipt(_)));
        assert!(matches!(notifications[2], TxNotification::Confirmation(1)));

        let record =
            decode::account_wager(&contract.call(methods::GET_ACCOUNT_WAGER, &[]).await.unwrap())
                .unwrap();
        assert_eq!(record.amount, DEFAULT_MINIMUM_WAGER);
        assert!(!record.claimed);
        assert_ne!(record.query_id.as_str(), "0x0");

        let stats =
            decode::game_stats(&contract.call(methods::GET_GAME_STATS, &[]).await.unwrap())
                .unwrap();
        assert_eq!(stats.wagers_made, 1);
        assert_eq!(stats.amount_wagered, DEFAULT_MINIMUM_WAGER);
        assert_eq!(stats.available_balance, GENESIS_BALANCE + DEFAULT_MINIMUM_WAGER);
        assert_eq!(stats.wagers_won, u64::from(record.win));
        if record.win {
            assert_eq!(record.payout, DEFAULT_MINIMUM_WAGER * 2);
        } else {
            assert_eq!(record.payout, 0);
        }
    }

    #[tokio::test]
    async fn toss_below_the_contract_minimum_reverts() {
        let chain = SimulatedChain::new();
        let contract = player_contract(&chain, 1).await;

        let options = SendOptions {
            value: DEFAULT_MINIMUM_WAGER - 1,
            gas: None,
        };
        let mut handle = contract
            .send(methods::TOSS, &[json!(0)], options)
            .await
            .unwrap();
        let notifications = drain(&mut handle).await;
        assert!(matches!(
            notifications[0],
            TxNotification::TransactionHash(_)
        ));
        assert!(matches!(notifications[1], TxNotification::Error(_)));

        let stats =
            decode::game_stats(&contract.call(methods::GET_GAME_STATS, &[]).await.unwrap())
                .unwrap();
        assert_eq!(stats.wagers_made, 0);
    }

    #[tokio::test]
    async fn claiming_a_win_pays_out_and_marks_the_record() {
        let mut state = ChainState::genesis();
        let player = state.accounts[1].clone();
        state.records.insert(
            player.as_str().to_string(),
            WagerRecord {
                amount: 1_000,
                payout: 2_000,
                timestamp: 0,
                pending: false,
                choice: 0,
                query_id: "0xabc".to_string(),
                result: 0,
                win: true,
                block: 1,
                claimed: false,
            },
        );
        let chain = SimulatedChain::from_state(state);
        let contract = player_contract(&chain, 1).await;

        let mut handle = contract
            .send(methods::CLAIM_WIN, &[json!("0xabc")], SendOptions::default())
            .await
            .unwrap();
        let notifications = drain(&mut handle).await;
        assert!(matches!(notifications[1], TxNotification::Receipt(_)));

        let snapshot = chain.state();
        assert_eq!(snapshot.balance, GENESIS_BALANCE - 2_000);
        assert_eq!(snapshot.amount_paid_out, 2_000);
        assert!(snapshot.records[player.as_str()].claimed);

        // a second claim for the same query id must revert
        let mut handle = contract
            .send(methods::CLAIM_WIN, &[json!("0xabc")], SendOptions::default())
            .await
            .unwrap();
        let notifications = drain(&mut handle).await;
        assert!(matches!(notifications[1], TxNotification::Error(_)));
    }

    #[tokio::test]
    async fn withdraw_is_admin_gated() {
        let chain = SimulatedChain::new();
        let player = player_contract(&chain, 1).await;

        let mut handle = player
            .send(methods::WITHDRAW, &[json!("1000")], SendOptions::default())
            .await
            .unwrap();
        let notifications = drain(&mut handle).await;
        assert!(matches!(notifications[1], TxNotification::Error(_)));
        assert_eq!(chain.state().balance, GENESIS_BALANCE);

        let admin = player_contract(&chain, 0).await;
        let mut handle = admin
            .send(methods::WITHDRAW, &[json!("1000")], SendOptions::default())
            .await
            .unwrap();
        let notifications = drain(&mut handle).await;
        assert!(matches!(notifications[1], TxNotification::Receipt(_)));
        assert_eq!(chain.state().balance, GENESIS_BALANCE - 1_000);
    }

    #[tokio::test]
    async fn set_minimum_bet_shows_up_in_the_stats() {
        let chain = SimulatedChain::new();
        let admin = player_contract(&chain, 0).await;

        let mut handle = admin
            .send(
                methods::SET_MINIMUM_BET,
                &[json!("2000000000000000")],
                SendOptions::default(),
            )
            .await
            .unwrap();
        drain(&mut handle).await;

        let stats =
            decode::game_stats(&admin.call(methods::GET_GAME_STATS, &[]).await.unwrap()).unwrap();
        assert_eq!(stats.minimum_wager, 2_000_000_000_000_000);
    }

    #[tokio::test]
    async fn admin_flag_tracks_the_genesis_admin() {
        let chain = SimulatedChain::new();
        let admin = player_contract(&chain, 0).await;
        let player = player_contract(&chain, 1).await;

        assert!(decode::admin_flag(&admin.call(methods::IS_ADMIN, &[]).await.unwrap()).unwrap());
        assert!(!decode::admin_flag(&player.call(methods::IS_ADMIN, &[]).await.unwrap()).unwrap());
    }

    #[tokio::test]
    async fn tosses_broadcast_both_game_events() {
        let chain = SimulatedChain::new();
        let contract = player_contract(&chain, 1).await;

        let mut submitted = contract.event_stream(events::TOSS_SUBMITTED).unwrap();
        let mut resolved = contract.event_stream(events::TOSS_RESULT_RETURNED).unwrap();

        let options = SendOptions {
            value: DEFAULT_MINIMUM_WAGER,
            gas: None,
        };
        let mut handle = contract
            .send(methods::TOSS, &[json!(0)], options)
            .await
            .unwrap();
        drain(&mut handle).await;

        let event = submitted.next().await.unwrap();
        assert_eq!(event.name, events::TOSS_SUBMITTED);
        let event = resolved.next().await.unwrap();
        assert_eq!(event.name, events::TOSS_RESULT_RETURNED);
        assert!(event.payload.get("win").is_some());

        assert_eq!(chain.recent_events(10).len(), 2);
    }

    #[tokio::test]
    async fn unknown_event_streams_are_rejected() {
        let chain = SimulatedChain::new();
        let contract = player_contract(&chain, 0).await;
        assert!(matches!(
            contract.event_stream("blockMined"),
            Err(FlipItError::UnknownEvent(_))
        ));
    }

    #[tokio::test]
    async fn activating_an_account_reorders_request_access() {
        let chain = SimulatedChain::new();
        let second = chain.accounts()[1].clone();
        chain.activate_account(&second).unwrap();
        let accounts = chain.request_access().await.unwrap();
        assert_eq!(accounts[0], second);

        assert!(chain.activate_account(&Address::new("0xnobody")).is_err());
    }

    #[tokio::test]
    async fn state_round_trips_through_json() {
        let chain = SimulatedChain::new();
        let contract = player_contract(&chain, 1).await;
        let options = SendOptions {
            value: DEFAULT_MINIMUM_WAGER,
            gas: None,
        };
        let mut handle = contract
            .send(methods::TOSS, &[json!(0)], options)
            .await
            .unwrap();
        drain(&mut handle).await;

        let snapshot = chain.state();
        let json = serde_json::to_string(&snapshot).unwrap();
        let restored: ChainState = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.wagers_made, snapshot.wagers_made);
        assert_eq!(restored.balance, snapshot.balance);
        assert_eq!(restored.log.len(), snapshot.log.len());

        let resumed = SimulatedChain::from_state(restored);
        let stats_fields = player_contract(&resumed, 1)
            .await
            .call(methods::GET_GAME_STATS, &[])
            .await
            .unwrap();
        assert_eq!(
            decode::game_stats(&stats_fields).unwrap().wagers_made,
            snapshot.wagers_made
        );
    }
}
