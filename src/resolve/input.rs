//! Parsing and bounded re-prompting for single fields

use super::prompt::Prompter;
use crate::error::{BridgeError, BridgeResult};
use crate::ui::format_amount;

use ethers::types::{Address, U256};
use ethers::utils::to_checksum;
use std::str::FromStr;
use tracing::debug;

/// Result of reading one field once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldOutcome<T> {
    Valid(T),
    /// Rejected; the reason is shown before asking again
    Invalid(String),
    /// The user asked to stop
    Aborted,
}

/// Sentinel for "the whole observed balance"
pub const ALL: &str = "all";

/// Parse a human amount into smallest units, bounded by `balance`.
///
/// The conversion is exact: input with more fractional digits than the
/// asset carries is rejected rather than rounded.
pub fn parse_amount(input: &str, balance: U256, decimals: u8) -> FieldOutcome<U256> {
    let input = input.trim();

    if input.eq_ignore_ascii_case(ALL) {
        if balance.is_zero() {
            return FieldOutcome::Invalid("No balance available".to_string());
        }
        return FieldOutcome::Valid(balance);
    }
    if input.starts_with('-') {
        return FieldOutcome::Invalid("Amount must be positive".to_string());
    }

    let (whole, frac) = match input.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (input, ""),
    };
    let digits_only = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if whole.is_empty() || !digits_only(whole) || !digits_only(frac) {
        return FieldOutcome::Invalid(format!("{:?} is not a number", input));
    }
    if frac.len() > decimals as usize {
        return FieldOutcome::Invalid(format!(
            "At most {} decimal places are supported",
            decimals
        ));
    }

    let amount = match to_smallest_unit(whole, frac, decimals) {
        Some(amount) => amount,
        None => return FieldOutcome::Invalid(format!("{} is too large", input)),
    };

    if amount.is_zero() {
        return FieldOutcome::Invalid("Amount must be positive".to_string());
    }
    if amount > balance {
        return FieldOutcome::Invalid(format!(
            "Insufficient balance: {} available",
            format_amount(balance, decimals)
        ));
    }

    FieldOutcome::Valid(amount)
}

/// `whole.frac` scaled by `10^decimals`; `None` when it does not fit in 256 bits
fn to_smallest_unit(whole: &str, frac: &str, decimals: u8) -> Option<U256> {
    let scale = U256::from(10).checked_pow(U256::from(decimals))?;
    let whole = U256::from_dec_str(whole).ok()?;

    let mut frac_units = U256::zero();
    if !frac.is_empty() {
        let padded = format!("{:0<width$}", frac, width = decimals as usize);
        frac_units = U256::from_dec_str(&padded).ok()?;
    }

    whole.checked_mul(scale)?.checked_add(frac_units)
}

/// 1-based menu index
pub fn parse_index(input: &str, len: usize) -> FieldOutcome<usize> {
    match input.trim().parse::<usize>() {
        Ok(n) if n >= 1 && n <= len => FieldOutcome::Valid(n - 1),
        _ => FieldOutcome::Invalid(format!("Pick a number between 1 and {}", len)),
    }
}

/// `y`/`yes` confirms, anything else declines
pub fn parse_yes_no(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Destination address; blank means the sender. Malformed input is fatal.
pub fn parse_destination(input: &str, sender: Address) -> BridgeResult<Address> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(sender);
    }

    let hex = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .ok_or_else(|| BridgeError::InvalidAddress(input.to_string()))?;
    if hex.len() != 40 {
        return Err(BridgeError::InvalidAddress(input.to_string()));
    }

    let address =
        Address::from_str(hex).map_err(|_| BridgeError::InvalidAddress(input.to_string()))?;

    // Mixed case carries an EIP-55 checksum, which must match
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    if has_upper && has_lower && to_checksum(&address, None)[2..] != *hex {
        return Err(BridgeError::InvalidAddress(format!("{} (bad checksum)", input)));
    }

    Ok(address)
}

/// Ask until `parse` accepts, the user aborts, or attempts run out.
///
/// `Ok(None)` means the user aborted (end of input).
pub async fn ask_until_valid<P, T, F>(
    prompter: &mut P,
    question: &str,
    field: &str,
    max_attempts: u32,
    mut parse: F,
) -> BridgeResult<Option<T>>
where
    P: Prompter + ?Sized,
    F: FnMut(&str) -> FieldOutcome<T>,
{
    for attempt in 1..=max_attempts {
        let answer = match prompter.ask(question).await? {
            Some(answer) => answer,
            None => return Ok(None),
        };

        match parse(&answer) {
            FieldOutcome::Valid(value) => return Ok(Some(value)),
            FieldOutcome::Aborted => return Ok(None),
            FieldOutcome::Invalid(reason) => {
                debug!("Rejected {} (attempt {}): {}", field, attempt, reason);
                prompter.say(&reason);
            }
        }
    }

    Err(BridgeError::InputExhausted {
        field: field.to_string(),
        attempts: max_attempts,
    })
}
