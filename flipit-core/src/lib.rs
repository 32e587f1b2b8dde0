//! FlipIt SDK - client service layer for the FlipIt coin-toss wagering game.
//!
//! This library mediates between a UI and the deployed FlipIt contract:
//! wallet-authenticated session bootstrap, wager submission, win claims,
//! statistics queries and administrative actions, with the contract's event
//! streams exposed for consumers. The wallet provider and the transaction
//! client are trait boundaries; an in-process simulated chain implements
//! both for development and testing.

pub mod chain;
pub mod error;
pub mod service;
pub mod sim;
pub mod types;
pub mod units;

pub use chain::{
    ContractConnector, ContractHandle, EventStream, SendOptions, TxHandle, WalletProvider,
};
pub use error::{FlipItError, Result};
pub use service::{FlipItService, ServiceConfig};
pub use sim::{ChainState, SimulatedChain};
pub use types::{
    Address, Completion, ContractEvent, Denomination, GameStats, GameStatsReport, QueryId,
    TxNotification, TxReceipt, WagerChoice,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn toss_round_trip_against_the_simulated_chain() {
        let chain = Arc::new(SimulatedChain::new());
        let service = FlipItService::new(chain.clone(), chain.clone(), Address::new("0xflipit"));
        service.init().await.unwrap();

        let mut results = service.toss_result_returned_events().unwrap();
        let handle = service
            .do_toss(WagerChoice::Heads.index(), "0.01", Denomination::Ether)
            .await
            .unwrap();
        assert!(handle.transaction_hash().starts_with("0x"));

        let event = results.next().await.unwrap();
        assert_eq!(event.name, "tossResultReturned");

        let report = service.game_stats().await.unwrap();
        assert_eq!(report.stats.wagers_made, 1);
        assert_eq!(report.stats.amount_wagered, 10_000_000_000_000_000);
        // an unclaimed win is reported exactly when the toss won
        let record_won = event.payload["win"].as_bool().unwrap();
        assert_eq!(report.unclaimed_win, record_won);
    }
}
