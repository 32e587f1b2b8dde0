use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{FlipItError, Result};

/// Player's prediction for a coin toss. The contract encodes heads as 0 and
/// tails as 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WagerChoice {
    Heads,
    Tails,
}

impl WagerChoice {
    /// Validate a raw choice index as supplied by a UI.
    pub fn from_index(index: u8) -> Result<Self> {
        match index {
            0 => Ok(Self::Heads),
            1 => Ok(Self::Tails),
            _ => Err(FlipItError::HeadsOrTails),
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            Self::Heads => 0,
            Self::Tails => 1,
        }
    }
}

impl FromStr for WagerChoice {
    type Err = FlipItError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "heads" | "0" => Ok(Self::Heads),
            "tails" | "1" => Ok(Self::Tails),
            _ => Err(FlipItError::HeadsOrTails),
        }
    }
}

impl fmt::Display for WagerChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Heads => write!(f, "heads"),
            Self::Tails => write!(f, "tails"),
        }
    }
}

/// Denominations of the platform's native value. Wei is the base unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Denomination {
    Wei,
    Kwei,
    Mwei,
    Gwei,
    Szabo,
    Finney,
    Ether,
}

impl Denomination {
    /// Base-10 exponent relative to wei.
    pub fn exponent(&self) -> u32 {
        match self {
            Self::Wei => 0,
            Self::Kwei => 3,
            Self::Mwei => 6,
            Self::Gwei => 9,
            Self::Szabo => 12,
            Self::Finney => 15,
            Self::Ether => 18,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Wei => "wei",
            Self::Kwei => "kwei",
            Self::Mwei => "mwei",
            Self::Gwei => "gwei",
            Self::Szabo => "szabo",
            Self::Finney => "finney",
            Self::Ether => "ether",
        }
    }
}

impl FromStr for Denomination {
    type Err = FlipItError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "wei" => Ok(Self::Wei),
            "kwei" => Ok(Self::Kwei),
            "mwei" => Ok(Self::Mwei),
            "gwei" => Ok(Self::Gwei),
            "szabo" => Ok(Self::Szabo),
            "finney" => Ok(Self::Finney),
            "ether" => Ok(Self::Ether),
            other => Err(FlipItError::invalid_amount(format!(
                "unknown denomination '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An account address as handed out by the wallet provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a pending win, handed back by the contract and used
/// to claim the payout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryId(String);

impl QueryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregate game statistics as held by the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStats {
    pub wagers_made: u64,
    pub wagers_won: u64,
    #[serde(with = "u128_string")]
    pub amount_wagered: u128,
    #[serde(with = "u128_string")]
    pub amount_paid_out: u128,
    #[serde(with = "u128_string")]
    pub available_balance: u128,
    pub win_multiplier: u64,
    #[serde(with = "u128_string")]
    pub minimum_wager: u128,
}

/// Result of a statistics query: aggregate stats merged with the calling
/// account's unclaimed-win derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStatsReport {
    #[serde(flatten)]
    pub stats: GameStats,
    pub unclaimed_win: bool,
    pub unclaimed_query_id: Option<QueryId>,
}

/// Per-account wager record, decoded from the contract's positional layout.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountWager {
    pub amount: u128,
    pub payout: u128,
    pub pending: bool,
    pub query_id: QueryId,
    pub win: bool,
    pub claimed: bool,
}

/// Execution outcome of a mined transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub transaction_hash: String,
    pub block_number: u64,
    pub status: bool,
}

/// Lifecycle notification of a submitted state-changing transaction. The
/// platform does not guarantee an order between `Confirmation` and `Receipt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TxNotification {
    TransactionHash(String),
    Confirmation(u64),
    Receipt(TxReceipt),
    Error(String),
}

/// Which terminal notification resolved a send-and-await operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Confirmed(u64),
    Receipted(TxReceipt),
}

/// An entry on one of the contract's named event streams.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractEvent {
    pub name: String,
    pub payload: serde_json::Value,
    pub transaction_hash: String,
    pub timestamp: DateTime<Utc>,
}

/// Serde helper keeping u128 amounts round-trippable through JSON, where
/// quantities travel as decimal strings.
pub mod u128_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choice_indices_match_the_wire_encoding() {
        assert_eq!(WagerChoice::from_index(0).unwrap(), WagerChoice::Heads);
        assert_eq!(WagerChoice::from_index(1).unwrap(), WagerChoice::Tails);
        assert_eq!(WagerChoice::Heads.index(), 0);
        assert_eq!(WagerChoice::Tails.index(), 1);
    }

    #[test]
    fn out_of_range_choice_is_rejected() {
        for index in [2u8, 7, 255] {
            assert!(matches!(
                WagerChoice::from_index(index),
                Err(FlipItError::HeadsOrTails)
            ));
        }
    }

    #[test]
    fn choices_parse_from_ui_strings() {
        assert_eq!("heads".parse::<WagerChoice>().unwrap(), WagerChoice::Heads);
        assert_eq!("TAILS".parse::<WagerChoice>().unwrap(), WagerChoice::Tails);
        assert!("edge".parse::<WagerChoice>().is_err());
    }

    #[test]
    fn denominations_parse_by_name() {
        assert_eq!("ether".parse::<Denomination>().unwrap(), Denomination::Ether);
        assert_eq!("WEI".parse::<Denomination>().unwrap(), Denomination::Wei);
        assert!("satoshi".parse::<Denomination>().is_err());
    }

    #[test]
    fn game_stats_round_trip_through_json() {
        let stats = GameStats {
            wagers_made: 12,
            wagers_won: 5,
            amount_wagered: 340_282_366_920_938_463_463_374_607_431_768_211_455,
            amount_paid_out: 2,
            available_balance: 10_000_000_000_000_000_000,
            win_multiplier: 2,
            minimum_wager: 500_000,
        };
        let json = serde_json::to_string(&stats).unwrap();
        let decoded: GameStats = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, stats);
    }
}
