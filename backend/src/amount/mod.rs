//! Decimal-exact amount handling.
//!
//! Amounts arrive as decimal strings (`"12.5"`) and leave as integers in the
//! token's smallest unit. No binary floating point is involved anywhere:
//! the string is split on the decimal point, the fraction is padded or
//! truncated to the token precision, and both halves are combined in `U256`.

use alloy_primitives::U256;

use crate::error::AmountError;

/// `10^exp`, or `None` if it does not fit in 256 bits.
pub fn pow10(exp: u32) -> Option<U256> {
    U256::from(10u64).checked_pow(U256::from(exp))
}

/// Split a decimal string into validated whole and fraction digits.
fn split_decimal(amount: &str) -> Result<(&str, &str), AmountError> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(AmountError::Empty);
    }
    if amount.starts_with('-') {
        return Err(AmountError::Negative);
    }

    let (whole, fraction) = match amount.split_once('.') {
        Some((w, f)) => (w, f),
        None => (amount, ""),
    };

    let digits_only = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !digits_only(whole) || !digits_only(fraction) || (whole.is_empty() && fraction.is_empty()) {
        return Err(AmountError::NotANumber(amount.to_string()));
    }

    Ok((whole, fraction))
}

fn parse_digits(digits: &str) -> Result<U256, AmountError> {
    if digits.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(digits, 10).map_err(|_| AmountError::Overflow)
}

/// Convert a decimal string to an integer amount with `decimals` fractional digits.
///
/// Extra fractional digits are truncated (round toward zero).
///
/// # Example
/// ```ignore
/// use payout::amount::normalize;
///
/// assert_eq!(normalize("12.50", 6).unwrap().to_string(), "12500000");
/// assert_eq!(normalize("1.23456789", 4).unwrap().to_string(), "12345");
/// ```
pub fn normalize(amount: &str, decimals: u8) -> Result<U256, AmountError> {
    let (whole, fraction) = split_decimal(amount)?;
    let precision = usize::from(decimals);

    let fraction: String = if fraction.len() >= precision {
        fraction[..precision].to_string()
    } else {
        format!("{:0<width$}", fraction, width = precision)
    };

    let factor = pow10(u32::from(decimals)).ok_or(AmountError::Overflow)?;
    let whole = parse_digits(whole)?
        .checked_mul(factor)
        .ok_or(AmountError::Overflow)?;

    whole
        .checked_add(parse_digits(&fraction)?)
        .ok_or(AmountError::Overflow)
}

/// Render an integer amount as a decimal string with exactly `decimals` digits
/// after the point. Presentation only.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let precision = usize::from(decimals);
    if precision == 0 {
        return digits;
    }

    let padded = format!("{:0>width$}", digits, width = precision + 1);
    let (whole, fraction) = padded.split_at(padded.len() - precision);
    format!("{}.{}", whole, fraction)
}

/// A decimal amount kept exactly as `unscaled / 10^scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalAmount {
    pub unscaled: U256,
    pub scale: u32,
}

impl DecimalAmount {
    /// Parse without losing any fractional digit.
    pub fn parse(amount: &str) -> Result<Self, AmountError> {
        let (whole, fraction) = split_decimal(amount)?;
        let scale = u32::try_from(fraction.len()).map_err(|_| AmountError::Overflow)?;
        let digits = format!("{}{}", whole, fraction);
        Ok(Self {
            unscaled: parse_digits(&digits)?,
            scale,
        })
    }

    fn rescale(self, scale: u32) -> Result<U256, AmountError> {
        let factor = pow10(scale - self.scale).ok_or(AmountError::Overflow)?;
        self.unscaled.checked_mul(factor).ok_or(AmountError::Overflow)
    }
}

/// Exact running sum of decimal amounts with mixed precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecimalSum {
    total: U256,
    scale: u32,
}

impl DecimalSum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an amount, widening the scale when needed.
    pub fn add(&mut self, amount: DecimalAmount) -> Result<(), AmountError> {
        let scale = self.scale.max(amount.scale);
        let current = DecimalAmount { unscaled: self.total, scale: self.scale }.rescale(scale)?;
        let incoming = amount.rescale(scale)?;
        self.total = current.checked_add(incoming).ok_or(AmountError::Overflow)?;
        self.scale = scale;
        Ok(())
    }

    /// Decimal rendering at the widest scale seen.
    pub fn formatted(&self) -> String {
        match u8::try_from(self.scale) {
            Ok(scale) => format_units(self.total, scale),
            Err(_) => self.total.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(amount: &str, decimals: u8) -> String {
        normalize(amount, decimals).unwrap().to_string()
    }

    #[test]
    fn test_normalize_examples() {
        assert_eq!(n("12.50", 6), "12500000");
        assert_eq!(n("0.000001", 6), "1");
        assert_eq!(n("12", 0), "12");
        assert_eq!(n("1.23456789", 4), "12345");
    }

    #[test]
    fn test_normalize_edge_shapes() {
        assert_eq!(n(" 7 ", 2), "700");
        assert_eq!(n("12.", 3), "12000");
        assert_eq!(n(".5", 1), "5");
        assert_eq!(n("1.9", 0), "1");
        assert_eq!(n("1", 18), "1000000000000000000");
    }

    #[test]
    fn test_normalize_rejects_malformed() {
        assert_eq!(normalize("", 6), Err(AmountError::Empty));
        assert_eq!(normalize("   ", 6), Err(AmountError::Empty));
        assert_eq!(normalize("-1", 6), Err(AmountError::Negative));
        assert!(matches!(normalize("abc", 6), Err(AmountError::NotANumber(_))));
        assert!(matches!(normalize("1.2.3", 6), Err(AmountError::NotANumber(_))));
        assert!(matches!(normalize("1e5", 6), Err(AmountError::NotANumber(_))));
        assert!(matches!(normalize("+1", 6), Err(AmountError::NotANumber(_))));
        assert!(matches!(normalize(".", 6), Err(AmountError::NotANumber(_))));
        assert!(matches!(normalize("1_000", 6), Err(AmountError::NotANumber(_))));
    }

    #[test]
    fn test_normalize_overflow() {
        assert_eq!(normalize("1", 78), Err(AmountError::Overflow));
        let huge = "9".repeat(80);
        assert_eq!(normalize(&huge, 0), Err(AmountError::Overflow));
    }

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(U256::from(12500000u64), 6), "12.500000");
        assert_eq!(format_units(U256::from(1u64), 6), "0.000001");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
        assert_eq!(format_units(U256::ZERO, 2), "0.00");
    }

    #[test]
    fn test_decimal_sum_mixed_scales() {
        let mut sum = DecimalSum::new();
        for a in ["1.5", "2.25", "3", "0.1"] {
            sum.add(DecimalAmount::parse(a).unwrap()).unwrap();
        }
        assert_eq!(sum.formatted(), "6.85");
    }

    #[test]
    fn test_decimal_sum_is_exact() {
        // 0.1 + 0.2 is not 0.30000000000000004 here.
        let mut sum = DecimalSum::new();
        sum.add(DecimalAmount::parse("0.1").unwrap()).unwrap();
        sum.add(DecimalAmount::parse("0.2").unwrap()).unwrap();
        assert_eq!(sum.formatted(), "0.3");
        assert_eq!(DecimalSum::new().formatted(), "0");
    }
}
