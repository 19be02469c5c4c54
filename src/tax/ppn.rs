//! PPN (Pajak Pertambahan Nilai) calculation engine for Indonesian VAT

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

use crate::documents::DocumentLine;
use crate::types::LedgerError;
use crate::utils::money::round_money;

/// PPN rate as a percentage (e.g. 11 for 11%)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpnRate {
    pub rate: BigDecimal,
}

impl PpnRate {
    /// Create a rate, rejecting values outside 0..=100
    pub fn new(rate: BigDecimal) -> Result<Self, PpnError> {
        let rate = Self { rate };
        rate.validate()?;
        Ok(rate)
    }

    /// Standard rate since April 2022
    pub fn standard() -> Self {
        Self {
            rate: BigDecimal::from(11),
        }
    }

    pub fn zero_rated() -> Self {
        Self {
            rate: BigDecimal::from(0),
        }
    }

    pub fn validate(&self) -> Result<(), PpnError> {
        if self.rate < BigDecimal::from(0) || self.rate > BigDecimal::from(100) {
            return Err(PpnError::InvalidRate(format!(
                "PPN rate must be between 0 and 100, got {}",
                self.rate
            )));
        }
        Ok(())
    }
}

/// Standard PPN treatment of goods and services
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PpnCategory {
    /// Regular taxable supplies - 11%
    Standard,
    /// Luxury goods (PPnBM goods) - 12%
    Luxury,
    /// Exports - 0%
    Export,
    /// Exempt supplies (basic necessities, medical services) - 0%
    Exempt,
}

impl PpnCategory {
    pub fn rate(&self) -> PpnRate {
        match self {
            PpnCategory::Standard => PpnRate::standard(),
            PpnCategory::Luxury => PpnRate {
                rate: BigDecimal::from(12),
            },
            PpnCategory::Export | PpnCategory::Exempt => PpnRate::zero_rated(),
        }
    }
}

/// Detailed PPN calculation breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PpnCalculation {
    /// Taxable base (DPP, before PPN)
    pub base_amount: BigDecimal,
    pub rate: PpnRate,
    pub tax_amount: BigDecimal,
    /// Base plus PPN
    pub total_amount: BigDecimal,
}

impl PpnCalculation {
    /// PPN on top of a tax-exclusive base
    pub fn exclusive(base_amount: BigDecimal, rate: PpnRate) -> Result<Self, PpnError> {
        rate.validate()?;
        if base_amount < BigDecimal::from(0) {
            return Err(PpnError::Calculation(
                "Taxable base cannot be negative".to_string(),
            ));
        }

        let tax_amount = round_money(&(&base_amount * &rate.rate / BigDecimal::from(100)));
        let total_amount = &base_amount + &tax_amount;

        Ok(Self {
            base_amount,
            rate,
            tax_amount,
            total_amount,
        })
    }

    /// Split a tax-inclusive amount into base and PPN; the base absorbs rounding
    pub fn inclusive(total_amount: BigDecimal, rate: PpnRate) -> Result<Self, PpnError> {
        rate.validate()?;
        if total_amount < BigDecimal::from(0) {
            return Err(PpnError::Calculation(
                "Total amount cannot be negative".to_string(),
            ));
        }

        let divisor = BigDecimal::from(100) + &rate.rate;
        let tax_amount = round_money(&(&total_amount * &rate.rate / divisor));
        let base_amount = &total_amount - &tax_amount;

        Ok(Self {
            base_amount,
            rate,
            tax_amount,
            total_amount,
        })
    }
}

/// Totals of an invoice or bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTotals {
    /// Sum of line amounts
    pub subtotal: BigDecimal,
    pub discount_amount: BigDecimal,
    /// Subtotal less discount, the base PPN is charged on
    pub taxable_base: BigDecimal,
    pub tax_amount: BigDecimal,
    /// subtotal + tax_amount - discount_amount
    pub total_amount: BigDecimal,
}

impl DocumentTotals {
    pub fn compute(
        lines: &[DocumentLine],
        rate: &PpnRate,
        discount_amount: &BigDecimal,
    ) -> Result<Self, PpnError> {
        let zero = BigDecimal::from(0);
        if lines.is_empty() {
            return Err(PpnError::Calculation(
                "Document must have at least one line".to_string(),
            ));
        }
        for line in lines {
            if line.quantity <= zero {
                return Err(PpnError::Calculation(format!(
                    "Quantity for '{}' must be positive",
                    line.description
                )));
            }
            if line.unit_price < zero {
                return Err(PpnError::Calculation(format!(
                    "Unit price for '{}' cannot be negative",
                    line.description
                )));
            }
        }

        let subtotal: BigDecimal = lines.iter().map(|l| l.amount()).sum();
        if *discount_amount < zero || *discount_amount > subtotal {
            return Err(PpnError::Calculation(format!(
                "Discount {} must be between 0 and the subtotal {}",
                discount_amount, subtotal
            )));
        }

        let taxable_base = &subtotal - discount_amount;
        let ppn = PpnCalculation::exclusive(taxable_base.clone(), rate.clone())?;
        let total_amount = &subtotal + &ppn.tax_amount - discount_amount;

        Ok(Self {
            subtotal,
            discount_amount: discount_amount.clone(),
            taxable_base,
            tax_amount: ppn.tax_amount,
            total_amount,
        })
    }
}

/// PPN-related errors
#[derive(Debug, thiserror::Error)]
pub enum PpnError {
    #[error("Invalid PPN rate: {0}")]
    InvalidRate(String),
    #[error("Calculation error: {0}")]
    Calculation(String),
}

impl From<PpnError> for LedgerError {
    fn from(err: PpnError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}
