//! Validation utilities

use crate::traits::*;
use crate::types::*;
use crate::utils::money::is_positive;
use bigdecimal::BigDecimal;
use std::collections::HashSet;

/// Validate that an amount is positive
pub fn validate_positive_amount(amount: &BigDecimal) -> LedgerResult<()> {
    if is_positive(amount) {
        Ok(())
    } else {
        Err(LedgerError::Validation(
            "Amount must be positive".to_string(),
        ))
    }
}

/// Validate an account code: digits, optionally grouped with dashes or dots ("1-1100", "1.1")
pub fn validate_account_code(code: &str) -> LedgerResult<()> {
    if code.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account code cannot be empty".to_string(),
        ));
    }

    if code.len() > 20 {
        return Err(LedgerError::Validation(
            "Account code cannot exceed 20 characters".to_string(),
        ));
    }

    if !code.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '.') {
        return Err(LedgerError::Validation(
            "Account code can only contain digits, dashes, and dots".to_string(),
        ));
    }

    if !code.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(LedgerError::Validation(
            "Account code must start with a digit".to_string(),
        ));
    }

    Ok(())
}

/// Validate that an account name is valid
pub fn validate_account_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account name cannot be empty".to_string(),
        ));
    }

    if name.len() > 100 {
        return Err(LedgerError::Validation(
            "Account name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that an entry description is valid
pub fn validate_entry_description(description: &str) -> LedgerResult<()> {
    if description.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Journal entry description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(LedgerError::Validation(
            "Journal entry description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Stricter entry validator: descriptions required, no repeated account/side pairs
pub struct EnhancedJournalEntryValidator;

impl JournalEntryValidator for EnhancedJournalEntryValidator {
    fn validate_entry(&self, entry: &JournalEntry) -> LedgerResult<()> {
        entry.validate()?;
        validate_entry_description(&entry.description)?;

        let mut seen = HashSet::new();
        for line in &entry.lines {
            validate_positive_amount(line.amount())?;
            if !seen.insert((&line.account_id, line.entry_type())) {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' appears multiple times on the same side of the entry",
                    line.account_id
                )));
            }
        }

        Ok(())
    }
}

/// Stricter account validator: code format and name length
pub struct EnhancedAccountValidator;

impl AccountValidator for EnhancedAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        validate_account_code(&account.code)?;
        validate_account_name(&account.name)?;
        Ok(())
    }

    fn validate_account_deletion(&self, account: &Account) -> LedgerResult<()> {
        DefaultAccountValidator.validate_account_deletion(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_account_codes() {
        assert!(validate_account_code("1100").is_ok());
        assert!(validate_account_code("1-1100").is_ok());
        assert!(validate_account_code("kas").is_err());
        assert!(validate_account_code("-100").is_err());
        assert!(validate_account_code("").is_err());
    }

    #[test]
    fn test_positive_amounts() {
        assert!(validate_positive_amount(&BigDecimal::from(1)).is_ok());
        assert!(matches!(
            validate_positive_amount(&BigDecimal::from(0)),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_enhanced_validator_rejects_repeated_lines() {
        let mut entry = JournalEntry::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "Penjualan".to_string(),
            None,
        );
        entry.add_line(JournalEntryLine::debit("kas".into(), BigDecimal::from(50), None));
        entry.add_line(JournalEntryLine::debit("kas".into(), BigDecimal::from(50), None));
        entry.add_line(JournalEntryLine::credit("penjualan".into(), BigDecimal::from(100), None));

        assert!(DefaultJournalEntryValidator.validate_entry(&entry).is_ok());
        assert!(EnhancedJournalEntryValidator.validate_entry(&entry).is_err());
    }

    #[test]
    fn test_enhanced_validator_requires_description() {
        let mut entry = JournalEntry::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "  ".to_string(),
            None,
        );
        entry.add_line(JournalEntryLine::debit("kas".into(), BigDecimal::from(1), None));
        entry.add_line(JournalEntryLine::credit("modal".into(), BigDecimal::from(1), None));

        assert!(EnhancedJournalEntryValidator.validate_entry(&entry).is_err());
    }
}
