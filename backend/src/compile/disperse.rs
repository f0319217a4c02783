//! Flat `address,amount` list for disperse tools.
//!
//! Amounts are written exactly as the operator typed them; the consuming
//! tool applies the token precision itself. No checksum.

use alloy_primitives::Address;

use crate::amount::{DecimalAmount, DecimalSum};
use crate::error::AmountError;
use crate::models::checksum_address;

/// Rendered in place of the total when the exact sum no longer fits.
pub const TOTAL_UNAVAILABLE: &str = "unavailable";

#[derive(Debug, Clone, Default)]
pub struct DisperseBuilder {
    rows: Vec<(String, String)>,
    total: DecimalSum,
    total_overflowed: bool,
}

impl DisperseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one row. The amount must be a valid non-negative decimal.
    ///
    /// Acceptance depends on the amount alone. An overflowing total only
    /// marks the total as unavailable.
    pub fn push(&mut self, to: &Address, amount: &str) -> Result<(), AmountError> {
        let amount = amount.trim();
        let parsed = DecimalAmount::parse(amount)?;
        if !self.total_overflowed {
            let mut total = self.total;
            match total.add(parsed) {
                Ok(()) => self.total = total,
                Err(_) => self.total_overflowed = true,
            }
        }
        self.rows.push((checksum_address(to), amount.to_string()));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Exact sum of every amount pushed so far, `None` once it overflowed.
    pub fn total_formatted(&self) -> Option<String> {
        (!self.total_overflowed).then(|| self.total.formatted())
    }

    /// Headerless CSV, one `address,amount` row per transfer.
    pub fn to_csv(&self) -> Result<String, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for (address, amount) in &self.rows {
            writer.write_record([address, amount])?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}
