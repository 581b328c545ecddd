//! Conversions between raw and the human-facing display unit.
//!
//! One display unit (nano, historically `Mxrb`) is 10^30 raw. Display text
//! may use either `.` or `,` as the decimal separator.

use crate::numbers::uint::{Amount, UintError, UintResult};

/// 10^33 raw.
pub const GXRB_RATIO: Amount = Amount::new(1_000_000_000_000_000_000_000_000_000_000_000);
/// 10^30 raw, one display unit.
pub const MXRB_RATIO: Amount = Amount::new(1_000_000_000_000_000_000_000_000_000_000);
/// 10^27 raw.
pub const KXRB_RATIO: Amount = Amount::new(1_000_000_000_000_000_000_000_000_000);
/// 10^24 raw.
pub const XRB_RATIO: Amount = Amount::new(1_000_000_000_000_000_000_000_000);

/// Fractional digits carried by the display unit.
pub const DISPLAY_DECIMALS: usize = 30;

const MAX_RAW_DIGITS: usize = 39;
const MAX_NANO_LENGTH: usize = 40;
const MAX_NANO_INTEGER_DIGITS: usize = 9;
const MAX_NANO_INTEGER: u128 = 340_282_366;

/// Split display text into its integer and fractional digit runs.
fn split_display(text: &str) -> UintResult<(&str, &str)> {
    if text.is_empty() {
        return Err(UintError::Empty);
    }
    if text.starts_with('-') {
        return Err(UintError::Negative);
    }

    let mut parts = text.splitn(2, |c| c == '.' || c == ',');
    let integer = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();

    if let Some(bad) = integer
        .chars()
        .chain(fraction.chars())
        .find(|c| !c.is_ascii_digit())
    {
        return Err(UintError::InvalidDigit(bad));
    }
    if integer.is_empty() && fraction.is_empty() {
        return Err(UintError::Empty);
    }
    Ok((integer, fraction))
}

/// Convert display text (`"1.5"`, `"0,000001"`) into raw.
///
/// Fractional digits beyond the 30th are below one raw and are dropped.
pub fn nano_to_raw(nano: &str) -> UintResult<Amount> {
    let (integer, fraction) = split_display(nano)?;

    let integer = integer.trim_start_matches('0');
    let whole = if integer.is_empty() {
        0
    } else {
        integer.parse::<u128>().map_err(|_| UintError::Overflow(128))?
    };

    let mut padded = fraction.chars().take(DISPLAY_DECIMALS).collect::<String>();
    padded.extend(std::iter::repeat('0').take(DISPLAY_DECIMALS - padded.len()));
    let sub_unit = padded.parse::<u128>().map_err(|_| UintError::Overflow(128))?;

    whole
        .checked_mul(MXRB_RATIO.raw())
        .and_then(|raw| raw.checked_add(sub_unit))
        .map(Amount::new)
        .ok_or(UintError::Overflow(128))
}

/// Render a raw amount in the display unit, trimming trailing fractional
/// zeros and the separator when nothing is left after it.
pub fn raw_to_nano(raw: Amount) -> String {
    let digits = raw.to_dec_string();
    let padded = if digits.len() <= DISPLAY_DECIMALS {
        format!("{:0>width$}", digits, width = DISPLAY_DECIMALS + 1)
    } else {
        digits
    };

    let (integer, fraction) = padded.split_at(padded.len() - DISPLAY_DECIMALS);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        integer.to_string()
    } else {
        format!("{}.{}", integer, fraction)
    }
}

/// True when `raw` is decimal digits only and no larger than the supply ceiling.
///
/// Leading zeros are tolerated here, unlike [`Amount::from_dec_str`].
pub fn validate_raw(raw: &str) -> bool {
    !raw.is_empty()
        && raw.len() <= MAX_RAW_DIGITS
        && raw.chars().all(|c| c.is_ascii_digit())
        && raw.parse::<u128>().is_ok()
}

/// True when `nano` is well-formed display text whose raw value fits the
/// supply ceiling.
pub fn validate_nano(nano: &str) -> bool {
    if nano.len() > MAX_NANO_LENGTH {
        return false;
    }
    let Ok((integer, fraction)) = split_display(nano) else {
        return false;
    };
    if integer.len() > MAX_NANO_INTEGER_DIGITS || fraction.len() > DISPLAY_DECIMALS {
        return false;
    }
    if !integer.is_empty() && integer.parse::<u128>().map_or(true, |whole| whole > MAX_NANO_INTEGER) {
        return false;
    }
    nano_to_raw(nano).is_ok()
}

/// Multiply a whole number of `xrb` (10^24 raw) into raw.
pub fn xrb_to_raw(xrb: &str) -> UintResult<Amount> {
    let whole = Amount::from_dec_str(xrb)?;
    whole.checked_mul(XRB_RATIO).ok_or(UintError::Overflow(128))
}

/// `raw > base`, both given as canonical decimal raw text.
pub fn greater(raw: &str, base: &str) -> UintResult<bool> {
    Ok(Amount::from_dec_str(raw)? > Amount::from_dec_str(base)?)
}

/// `raw >= base`, both given as canonical decimal raw text.
pub fn greater_or_equal(raw: &str, base: &str) -> UintResult<bool> {
    Ok(Amount::from_dec_str(raw)? >= Amount::from_dec_str(base)?)
}
