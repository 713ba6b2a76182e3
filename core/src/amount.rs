//! Token-amount arithmetic in exact integer base units.

use crate::error::ValidationError;

/// Fee rates are basis points, capped at 100%.
pub const MAX_FEE_BPS: u16 = 10_000;

// u64::MAX has 20 digits, so any scale beyond this overflows everything.
const MAX_DECIMALS: u8 = 19;

/// Converts a human-readable decimal string into integer base units.
///
/// Parsing is exact: no float ever enters the computation, so
/// `"250.50"` at 6 decimals is precisely `250_500_000`. Fractional
/// digits beyond the mint's precision round to the nearest base unit.
pub fn to_base_units(amount: &str, decimals: u8) -> Result<u64, ValidationError> {
    if decimals > MAX_DECIMALS {
        return Err(ValidationError::InvalidDecimals(decimals));
    }
    let s = amount.trim();
    if s.is_empty() {
        return Err(ValidationError::MalformedAmount(amount.to_string()));
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(ValidationError::MalformedAmount(amount.to_string()));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::MalformedAmount(amount.to_string()));
    }

    let scale = 10u64
        .checked_pow(decimals as u32)
        .ok_or(ValidationError::AmountOverflow { decimals })?;

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|_| ValidationError::AmountOverflow { decimals })?
    };

    // Scale the fractional digits to the mint precision, rounding half up
    // on the first dropped digit.
    let mut frac_units: u64 = 0;
    let wanted = decimals as usize;
    for (i, b) in frac.bytes().enumerate() {
        let digit = (b - b'0') as u64;
        if i < wanted {
            frac_units = frac_units * 10 + digit;
        } else {
            if digit >= 5 {
                frac_units += 1;
            }
            break;
        }
    }
    if frac.len() < wanted {
        frac_units = frac_units
            .checked_mul(10u64.pow((wanted - frac.len()) as u32))
            .ok_or(ValidationError::AmountOverflow { decimals })?;
    }

    let base = whole_units
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_units))
        .ok_or(ValidationError::AmountOverflow { decimals })?;

    if base == 0 {
        return Err(ValidationError::ZeroAmount);
    }
    Ok(base)
}

/// Validates a basis-point fee parameter.
pub fn validate_fee_bps(bps: u32) -> Result<u16, ValidationError> {
    if bps > MAX_FEE_BPS as u32 {
        return Err(ValidationError::FeeOutOfRange(bps));
    }
    Ok(bps as u16)
}

/// Formats base units back into a fixed-width decimal string.
pub fn format_base_units(amount: u64, decimals: u8) -> Result<String, ValidationError> {
    if decimals > MAX_DECIMALS {
        return Err(ValidationError::InvalidDecimals(decimals));
    }
    if decimals == 0 {
        return Ok(amount.to_string());
    }
    let ten_pow = 10u64
        .checked_pow(decimals as u32)
        .ok_or(ValidationError::InvalidDecimals(decimals))?;
    let whole = amount / ten_pow;
    let rem = amount % ten_pow;
    Ok(format!("{}.{:0>width$}", whole, rem, width = decimals as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_conversion() {
        assert_eq!(to_base_units("250.50", 6).unwrap(), 250_500_000);
        assert_eq!(to_base_units("1", 6).unwrap(), 1_000_000);
        assert_eq!(to_base_units("0.000001", 6).unwrap(), 1);
        assert_eq!(to_base_units(".5", 2).unwrap(), 50);
        assert_eq!(to_base_units("7", 0).unwrap(), 7);
    }

    #[test]
    fn rounds_excess_precision() {
        assert_eq!(to_base_units("1.0000005", 6).unwrap(), 1_000_001);
        assert_eq!(to_base_units("1.0000004", 6).unwrap(), 1_000_000);
        // rounds down to zero -> still rejected as zero
        assert_eq!(
            to_base_units("0.0000004", 6),
            Err(ValidationError::ZeroAmount)
        );
    }

    #[test]
    fn rejects_malformed() {
        for bad in ["", " ", ".", "-1", "1,5", "1.5e3", "abc", "1 0"] {
            assert!(to_base_units(bad, 6).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn rejects_zero_and_overflow() {
        assert_eq!(to_base_units("0", 6), Err(ValidationError::ZeroAmount));
        assert_eq!(to_base_units("0.0", 6), Err(ValidationError::ZeroAmount));
        assert!(to_base_units("18446744073709551616", 0).is_err());
        assert!(to_base_units("18446744073709.551616", 6).is_err());
    }

    #[test]
    fn fee_bounds() {
        assert_eq!(validate_fee_bps(0).unwrap(), 0);
        assert_eq!(validate_fee_bps(10_000).unwrap(), 10_000);
        assert_eq!(
            validate_fee_bps(10_001),
            Err(ValidationError::FeeOutOfRange(10_001))
        );
    }

    #[test]
    fn formatting_round_trip() {
        assert_eq!(format_base_units(250_500_000, 6).unwrap(), "250.500000");
        assert_eq!(format_base_units(1, 6).unwrap(), "0.000001");
        assert_eq!(
            to_base_units(&format_base_units(987_654_321, 6).unwrap(), 6).unwrap(),
            987_654_321
        );
    }
}
