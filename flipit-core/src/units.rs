//! Conversion between display denominations and wei, the base unit.

use crate::error::{FlipItError, Result};
use crate::types::Denomination;

/// Convert a decimal amount in the given denomination to wei.
///
/// The conversion is the identity when the denomination already is wei.
/// Fractional digits are accepted up to the denomination's exponent; anything
/// finer than one wei is rejected rather than truncated.
pub fn to_wei(amount: &str, denomination: Denomination) -> Result<u128> {
    let amount = amount.trim();
    let (integral, fraction) = match amount.split_once('.') {
        Some((integral, fraction)) => (integral, fraction),
        None => (amount, ""),
    };

    if integral.is_empty() && fraction.is_empty() {
        return Err(FlipItError::invalid_amount(format!(
            "'{amount}' is not a decimal amount"
        )));
    }
    if !integral.chars().all(|c| c.is_ascii_digit())
        || !fraction.chars().all(|c| c.is_ascii_digit())
    {
        return Err(FlipItError::invalid_amount(format!(
            "'{amount}' is not a decimal amount"
        )));
    }

    let exponent = denomination.exponent();
    let fraction = fraction.trim_end_matches('0');
    if fraction.len() as u32 > exponent {
        return Err(FlipItError::invalid_amount(format!(
            "'{amount}' {denomination} is finer than one wei"
        )));
    }

    let integral: u128 = if integral.is_empty() {
        0
    } else {
        integral.parse().map_err(|_| {
            FlipItError::invalid_amount(format!("'{amount}' does not fit the base unit range"))
        })?
    };

    let scale = 10u128.pow(exponent);
    let mut wei = integral.checked_mul(scale).ok_or_else(|| {
        FlipItError::invalid_amount(format!("'{amount}' {denomination} overflows the base unit"))
    })?;

    if !fraction.is_empty() {
        let digits = fraction.len() as u32;
        let value: u128 = fraction.parse().map_err(|_| {
            FlipItError::invalid_amount(format!("'{amount}' does not fit the base unit range"))
        })?;
        wei = wei
            .checked_add(value * 10u128.pow(exponent - digits))
            .ok_or_else(|| {
                FlipItError::invalid_amount(format!(
                    "'{amount}' {denomination} overflows the base unit"
                ))
            })?;
    }

    Ok(wei)
}
