//! Amount parsing and validity rules
//!
//! User input is a decimal string such as `"12.5"`. It is converted to token
//! base units (`value * 10^decimals`) with exact integer arithmetic so that
//! balance and fee comparisons never suffer from float rounding.

use crate::AmountError;
use ethers::types::U256;

/// A decimal string split into its digits and the number of fractional digits
///
/// The represented value is `digits / 10^fraction_digits`. Trailing fractional
/// zeros are dropped from the value; `typed_fraction_digits` keeps the count
/// as entered for the precision rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DecimalInput {
    digits: U256,
    fraction_digits: usize,
    typed_fraction_digits: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseFailure {
    Malformed,
    Overflow,
}

/// `10^exp`, or `None` when it does not fit in 256 bits
fn pow10(exp: usize) -> Option<U256> {
    U256::from(10u8).checked_pow(U256::from(exp))
}

/// Parse a plain decimal string (`"7"`, `"0.25"`, `".5"`, `"5."`)
///
/// Signs, exponents and separators are rejected. Surrounding whitespace is
/// ignored.
fn parse_decimal(raw: &str) -> Result<DecimalInput, ParseFailure> {
    let trimmed = raw.trim();
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((w, f)) => (w, f),
        None => (trimmed, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if whole.is_empty() && fraction.is_empty() {
        return Err(ParseFailure::Malformed);
    }
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(ParseFailure::Malformed);
    }

    let significant = fraction.trim_end_matches('0');
    let joined = format!("{whole}{significant}");
    let digits = if joined.is_empty() {
        U256::zero()
    } else {
        U256::from_dec_str(&joined).map_err(|_| ParseFailure::Overflow)?
    };

    Ok(DecimalInput {
        digits,
        fraction_digits: significant.len(),
        typed_fraction_digits: fraction.len(),
    })
}

/// Convert parsed input to base units, returning `(floor, ceil)`
///
/// The two differ only when the input has more fractional digits than the
/// token supports. `None` means the value does not fit in 256 bits.
fn to_base_units(input: DecimalInput, decimals: usize) -> Option<(U256, U256)> {
    if input.fraction_digits <= decimals {
        let scaled = input
            .digits
            .checked_mul(pow10(decimals - input.fraction_digits)?)?;
        return Some((scaled, scaled));
    }

    match pow10(input.fraction_digits - decimals) {
        Some(divisor) => {
            let floor = input.digits / divisor;
            let ceil = if (input.digits % divisor).is_zero() {
                floor
            } else {
                floor + U256::one()
            };
            Some((floor, ceil))
        }
        // The divisor exceeds any 256-bit value, so the input is below one base unit
        None => Some((U256::zero(), U256::one())),
    }
}

/// Validate an entered amount against the fee and the available balance
///
/// Rules are applied in order:
/// 1. not a decimal number, or not greater than zero: `NotPositive`
/// 2. `amount + fee > available`: `ExceedsBalance`
/// 3. more fractional digits than `decimals`, or exactly `decimals` fractional
///    digits with a zero value at that precision: `TooManyDecimals`
///
/// # Returns
/// The amount in base units when valid
pub fn check_amount(
    raw: &str,
    decimals: u8,
    fee: U256,
    available: U256,
) -> Result<U256, AmountError> {
    let exceeds = |required: U256| AmountError::ExceedsBalance {
        required,
        available,
    };

    let input = match parse_decimal(raw) {
        Ok(input) => input,
        Err(ParseFailure::Malformed) => return Err(AmountError::NotPositive),
        Err(ParseFailure::Overflow) => return Err(exceeds(U256::MAX)),
    };
    if input.digits.is_zero() {
        return Err(AmountError::NotPositive);
    }

    let Some((floor, ceil)) = to_base_units(input, decimals as usize) else {
        return Err(exceeds(U256::MAX));
    };

    // Fee and balance are whole base units, so comparing the rounded-up amount is exact
    match ceil.checked_add(fee) {
        Some(required) if required <= available => {}
        Some(required) => return Err(exceeds(required)),
        None => return Err(exceeds(U256::MAX)),
    }

    let precision = decimals as usize;
    if input.typed_fraction_digits > precision
        || (input.typed_fraction_digits == precision && floor.is_zero())
    {
        return Err(AmountError::TooManyDecimals {
            max_decimals: decimals,
        });
    }

    Ok(floor)
}

/// Render base units as a plain decimal string with trailing zeros trimmed
///
/// `format_base_units(7_000_000, 6) == "7"`, `format_base_units(1_500, 3) == "1.5"`
pub fn format_base_units(value: U256, decimals: u8) -> String {
    let decimals = decimals as usize;
    let digits = value.to_string();
    if decimals == 0 {
        return digits;
    }

    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');

    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Parse a whole-token decimal string into base units, truncating extra precision
///
/// Used when loading balances and fees that are quoted in whole tokens.
pub fn parse_units_lossy(raw: &str, decimals: u8) -> Option<U256> {
    let input = parse_decimal(raw).ok()?;
    to_base_units(input, decimals as usize).map(|(floor, _)| floor)
}
