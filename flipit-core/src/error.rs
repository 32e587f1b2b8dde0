use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlipItError>;

#[derive(Error, Debug)]
pub enum FlipItError {
    #[error("Choice must be heads or tails")]
    HeadsOrTails,

    #[error("Wager of {wagered} wei is below the minimum wager of {minimum} wei")]
    MinimumWager { wagered: u128, minimum: u128 },

    #[error("Service is not initialized")]
    NotInitialized,

    #[error("Wallet access error: {0}")]
    WalletAccess(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Contract call failed: {0}")]
    Call(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("No confirmation or receipt within {waited:?}")]
    Timeout { waited: Duration },

    #[error("Unexpected contract response: {0}")]
    Decode(String),

    #[error("Unknown event stream: {0}")]
    UnknownEvent(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlipItError {
    pub fn wallet_access(msg: impl Into<String>) -> Self {
        Self::WalletAccess(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn call(msg: impl Into<String>) -> Self {
        Self::Call(msg.into())
    }

    pub fn transaction(msg: impl Into<String>) -> Self {
        Self::Transaction(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
