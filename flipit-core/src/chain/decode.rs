//! Decoding of the contract's positional result arrays into typed records.
//!
//! Every decoder validates the field count and field types up front, so a
//! shape change on the remote side fails loudly instead of producing wrong
//! flags.

use serde_json::Value;

use crate::error::{FlipItError, Result};
use crate::types::{AccountWager, GameStats, QueryId};

/// Field count of a `getAccountWager` result.
pub const ACCOUNT_WAGER_FIELDS: usize = 10;
/// Field count of a `getGameStats` result.
pub const GAME_STATS_FIELDS: usize = 7;

// Positional layout of the account wager record.
const WAGER_AMOUNT: usize = 0;
const WAGER_PAYOUT: usize = 1;
const WAGER_PENDING: usize = 3;
const WAGER_QUERY_ID: usize = 5;
const WAGER_WIN: usize = 7;
const WAGER_CLAIMED: usize = 9;

// Positional layout of the game statistics record.
const STATS_WAGERS_MADE: usize = 0;
const STATS_WAGERS_WON: usize = 1;
const STATS_AMOUNT_WAGERED: usize = 2;
const STATS_AMOUNT_PAID_OUT: usize = 3;
const STATS_AVAILABLE_BALANCE: usize = 4;
const STATS_WIN_MULTIPLIER: usize = 5;
const STATS_MINIMUM_WAGER: usize = 6;

pub fn account_wager(fields: &[Value]) -> Result<AccountWager> {
    expect_len(fields, ACCOUNT_WAGER_FIELDS, "getAccountWager")?;
    Ok(AccountWager {
        amount: uint_field(fields, WAGER_AMOUNT, "amount")?,
        payout: uint_field(fields, WAGER_PAYOUT, "payout")?,
        pending: bool_field(fields, WAGER_PENDING, "pending")?,
        query_id: QueryId::new(string_field(fields, WAGER_QUERY_ID, "queryId")?),
        win: bool_field(fields, WAGER_WIN, "win")?,
        claimed: bool_field(fields, WAGER_CLAIMED, "claimed")?,
    })
}

pub fn game_stats(fields: &[Value]) -> Result<GameStats> {
    expect_len(fields, GAME_STATS_FIELDS, "getGameStats")?;
    Ok(GameStats {
        wagers_made: u64_field(fields, STATS_WAGERS_MADE, "wagersMade")?,
        wagers_won: u64_field(fields, STATS_WAGERS_WON, "wagersWon")?,
        amount_wagered: uint_field(fields, STATS_AMOUNT_WAGERED, "amountWagered")?,
        amount_paid_out: uint_field(fields, STATS_AMOUNT_PAID_OUT, "amountPaidOut")?,
        available_balance: uint_field(fields, STATS_AVAILABLE_BALANCE, "availableBalance")?,
        win_multiplier: u64_field(fields, STATS_WIN_MULTIPLIER, "winMultiplier")?,
        minimum_wager: uint_field(fields, STATS_MINIMUM_WAGER, "minimumWager")?,
    })
}

pub fn admin_flag(fields: &[Value]) -> Result<bool> {
    expect_len(fields, 1, "isAdmin")?;
    bool_field(fields, 0, "admin")
}

fn expect_len(fields: &[Value], expected: usize, what: &str) -> Result<()> {
    if fields.len() != expected {
        return Err(FlipItError::decode(format!(
            "{what} returned {} fields, expected {expected}",
            fields.len()
        )));
    }
    Ok(())
}

fn uint_field(fields: &[Value], index: usize, name: &str) -> Result<u128> {
    match &fields[index] {
        Value::String(raw) => raw.parse().map_err(|_| {
            FlipItError::decode(format!("field {index} ({name}) is not an unsigned amount"))
        }),
        Value::Number(number) => number.as_u64().map(u128::from).ok_or_else(|| {
            FlipItError::decode(format!("field {index} ({name}) is not an unsigned amount"))
        }),
        other => Err(FlipItError::decode(format!(
            "field {index} ({name}) has unexpected type {other}"
        ))),
    }
}

fn u64_field(fields: &[Value], index: usize, name: &str) -> Result<u64> {
    let value = uint_field(fields, index, name)?;
    u64::try_from(value).map_err(|_| {
        FlipItError::decode(format!("field {index} ({name}) exceeds the u64 range"))
    })
}

fn bool_field(fields: &[Value], index: usize, name: &str) -> Result<bool> {
    match &fields[index] {
        Value::Bool(flag) => Ok(*flag),
        other => Err(FlipItError::decode(format!(
            "field {index} ({name}) is not a flag: {other}"
        ))),
    }
}

fn string_field(fields: &[Value], index: usize, name: &str) -> Result<String> {
    match &fields[index] {
        Value::String(raw) => Ok(raw.clone()),
        other => Err(FlipItError::decode(format!(
            "field {index} ({name}) is not a string: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlipItError;
    use serde_json::json;

    fn wager_fields() -> Vec<Value> {
        vec![
            json!("250000"),      // amount
            json!("500000"),      // payout
            json!(1700000000i64), // timestamp
            json!(false),         // pending
            json!(0),             // choice
            json!("0xfeedc0de"),  // query id
            json!(0),             // result
            json!(true),          // win
            json!(18),            // block
            json!(false),         // claimed
        ]
    }

    #[test]
    fn account_wager_extracts_the_flag_and_id_positions() {
        let record = account_wager(&wager_fields()).unwrap();
        assert!(record.win);
        assert!(!record.claimed);
        assert!(!record.pending);
        assert_eq!(record.query_id.as_str(), "0xfeedc0de");
        assert_eq!(record.amount, 250_000);
        assert_eq!(record.payout, 500_000);
    }

    #[test]
    fn account_wager_rejects_wrong_arity() {
        let mut fields = wager_fields();
        fields.pop();
        assert!(matches!(
            account_wager(&fields),
            Err(FlipItError::Decode(_))
        ));
        let mut fields = wager_fields();
        fields.push(json!(0));
        assert!(matches!(
            account_wager(&fields),
            Err(FlipItError::Decode(_))
        ));
    }

    #[test]
    fn account_wager_rejects_mistyped_flags() {
        let mut fields = wager_fields();
        fields[7] = json!("true");
        assert!(matches!(
            account_wager(&fields),
            Err(FlipItError::Decode(_))
        ));
    }

    #[test]
    fn game_stats_reads_the_minimum_wager_from_the_last_field() {
        let fields = vec![
            json!(10),
            json!(4),
            json!("1000000"),
            json!("800000"),
            json!("5000000"),
            json!(2),
            json!("500000"),
        ];
        let stats = game_stats(&fields).unwrap();
        assert_eq!(stats.wagers_made, 10);
        assert_eq!(stats.wagers_won, 4);
        assert_eq!(stats.win_multiplier, 2);
        assert_eq!(stats.minimum_wager, 500_000);
    }

    #[test]
    fn game_stats_rejects_short_results() {
        let fields = vec![json!(10), json!(4)];
        assert!(matches!(game_stats(&fields), Err(FlipItError::Decode(_))));
    }

    #[test]
    fn admin_flag_is_a_single_boolean() {
        assert!(admin_flag(&[json!(true)]).unwrap());
        assert!(!admin_flag(&[json!(false)]).unwrap());
        assert!(admin_flag(&[json!(1)]).is_err());
        assert!(admin_flag(&[json!(true), json!(false)]).is_err());
    }
}
