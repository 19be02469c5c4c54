//! Journal entry creation, posting and reversal

use bigdecimal::BigDecimal;
use chrono::NaiveDate;

use crate::config::NumberingConfig;
use crate::ledger::period::ensure_period_open;
use crate::traits::*;
use crate::types::*;

const JOURNAL_SEQUENCE: &str = "journal_entry";

/// Journal manager for the draft → posted → reversed lifecycle of entries
pub struct JournalManager<S: LedgerStorage> {
    storage: S,
    validator: Box<dyn JournalEntryValidator>,
    numbering: NumberingConfig,
}

impl<S: LedgerStorage> JournalManager<S> {
    /// Create a new journal manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultJournalEntryValidator),
            numbering: NumberingConfig::default(),
        }
    }

    /// Create a new journal manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn JournalEntryValidator>) -> Self {
        Self {
            storage,
            validator,
            numbering: NumberingConfig::default(),
        }
    }

    pub fn with_numbering(mut self, numbering: NumberingConfig) -> Self {
        self.numbering = numbering;
        self
    }

    /// Validate and store a draft entry, assigning its entry number
    pub async fn create_entry(&mut self, mut entry: JournalEntry) -> LedgerResult<JournalEntry> {
        self.check_entry(&entry).await?;

        let sequence = self.storage.next_sequence(JOURNAL_SEQUENCE).await?;
        entry.entry_number = self
            .numbering
            .format(&self.numbering.journal_prefix, sequence);
        entry.is_posted = false;
        entry.posted_at = None;
        entry.is_reversed = false;
        entry.reversed_by_id = None;
        entry.version = 0;
        entry.updated_at = chrono::Utc::now().naive_utc();

        self.storage.save_journal_entry(&entry).await?;
        tracing::debug!(entry = %entry.entry_number, "journal entry created");
        Ok(entry)
    }

    /// Mark a draft entry as posted; posted entries are immutable
    pub async fn post_entry(&mut self, entry_id: &str) -> LedgerResult<JournalEntry> {
        let mut entry = self.get_entry_required(entry_id).await?;
        if entry.is_posted {
            return Err(LedgerError::EntryAlreadyPosted(entry.entry_number));
        }
        self.check_entry(&entry).await?;

        let now = chrono::Utc::now().naive_utc();
        entry.is_posted = true;
        entry.posted_at = Some(now);
        entry.updated_at = now;
        self.storage.update_journal_entry(&mut entry).await?;

        tracing::info!(
            entry = %entry.entry_number,
            date = %entry.entry_date,
            amount = %entry.total_debits(),
            "journal entry posted"
        );
        Ok(entry)
    }

    /// Create and immediately post an entry as one unit of work
    pub async fn record_entry(&mut self, entry: JournalEntry) -> LedgerResult<JournalEntry> {
        self.storage.begin().await?;
        let result = self.record_entry_inner(entry).await;
        crate::ledger::finish(&mut self.storage, result).await
    }

    async fn record_entry_inner(&mut self, entry: JournalEntry) -> LedgerResult<JournalEntry> {
        let created = self.create_entry(entry).await?;
        self.post_entry(&created.id).await
    }

    /// Post a mirrored entry and mark the original as reversed.
    /// Returns the reversing entry. `date` defaults to the original entry date.
    pub async fn reverse_entry(
        &mut self,
        entry_id: &str,
        date: Option<NaiveDate>,
    ) -> LedgerResult<JournalEntry> {
        self.storage.begin().await?;
        let result = self.reverse_entry_inner(entry_id, date).await;
        crate::ledger::finish(&mut self.storage, result).await
    }

    async fn reverse_entry_inner(
        &mut self,
        entry_id: &str,
        date: Option<NaiveDate>,
    ) -> LedgerResult<JournalEntry> {
        let mut original = self.get_entry_required(entry_id).await?;
        if !original.is_posted {
            return Err(LedgerError::EntryNotPosted(original.entry_number));
        }
        if original.is_reversed {
            return Err(LedgerError::EntryAlreadyReversed(original.entry_number));
        }

        let mut reversal = JournalEntry::new(
            date.unwrap_or(original.entry_date),
            format!("Reversal of {}", original.entry_number),
            original.reference.clone(),
        );
        reversal.lines = original.lines.iter().map(|l| l.mirrored()).collect();
        reversal.reversal_of_id = Some(original.id.clone());
        reversal.source = original.source.clone();

        let reversal = self.create_entry(reversal).await?;
        let reversal = self.post_entry(&reversal.id).await?;

        original.is_reversed = true;
        original.reversed_by_id = Some(reversal.id.clone());
        original.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_journal_entry(&mut original).await?;

        tracing::info!(
            entry = %original.entry_number,
            reversal = %reversal.entry_number,
            "journal entry reversed"
        );
        Ok(reversal)
    }

    /// Replace the contents of a draft entry
    pub async fn update_entry(&mut self, entry: &mut JournalEntry) -> LedgerResult<()> {
        let stored = self.get_entry_required(&entry.id).await?;
        if stored.is_posted {
            return Err(LedgerError::EntryAlreadyPosted(stored.entry_number));
        }
        self.check_entry(entry).await?;
        entry.entry_number = stored.entry_number;
        entry.is_posted = false;
        entry.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_journal_entry(entry).await
    }

    /// Delete a draft entry
    pub async fn delete_entry(&mut self, entry_id: &str) -> LedgerResult<()> {
        let entry = self.get_entry_required(entry_id).await?;
        if entry.is_posted {
            return Err(LedgerError::EntryAlreadyPosted(entry.entry_number));
        }
        self.storage.delete_journal_entry(entry_id).await
    }

    /// Get an entry by ID
    pub async fn get_entry(&self, entry_id: &str) -> LedgerResult<Option<JournalEntry>> {
        self.storage.get_journal_entry(entry_id).await
    }

    /// Get an entry by ID, returning an error if not found
    pub async fn get_entry_required(&self, entry_id: &str) -> LedgerResult<JournalEntry> {
        self.storage
            .get_journal_entry(entry_id)
            .await?
            .ok_or_else(|| LedgerError::EntryNotFound(entry_id.to_string()))
    }

    /// Get all entries within a date range
    pub async fn list_entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        self.storage.list_journal_entries(start_date, end_date).await
    }

    /// Entries generated from a document or payment, oldest first
    pub async fn entries_for_source(&self, source: &SourceRef) -> LedgerResult<Vec<JournalEntry>> {
        let entries = self.storage.list_journal_entries(None, None).await?;
        Ok(entries
            .into_iter()
            .filter(|e| e.source.as_ref() == Some(source))
            .collect())
    }

    async fn check_entry(&self, entry: &JournalEntry) -> LedgerResult<()> {
        self.validator.validate_entry(entry)?;

        for line in &entry.lines {
            if self.storage.get_account(&line.account_id).await?.is_none() {
                return Err(LedgerError::AccountNotFound(line.account_id.clone()));
            }
        }

        ensure_period_open(&self.storage, entry.entry_date).await
    }
}

/// Builder for multi-line journal entries
#[derive(Debug)]
pub struct JournalEntryBuilder {
    entry: JournalEntry,
}

impl JournalEntryBuilder {
    pub fn new(date: NaiveDate, description: impl Into<String>) -> Self {
        Self {
            entry: JournalEntry::new(date, description.into(), None),
        }
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.entry.reference = Some(reference.into());
        self
    }

    pub fn source(mut self, source: SourceRef) -> Self {
        self.entry.source = Some(source);
        self
    }

    /// Add a debit line; zero amounts are skipped
    pub fn debit(
        mut self,
        account_id: impl Into<String>,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        if amount != BigDecimal::from(0) {
            self.entry
                .add_line(JournalEntryLine::debit(account_id.into(), amount, description));
        }
        self
    }

    /// Add a credit line; zero amounts are skipped
    pub fn credit(
        mut self,
        account_id: impl Into<String>,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        if amount != BigDecimal::from(0) {
            self.entry
                .add_line(JournalEntryLine::credit(account_id.into(), amount, description));
        }
        self
    }

    /// Validate and return the draft entry
    pub fn build(self) -> LedgerResult<JournalEntry> {
        self.entry.validate()?;
        Ok(self.entry)
    }
}

/// Common entry patterns
pub mod patterns {
    use super::*;

    /// Owner puts cash into the business (debit cash, credit capital)
    pub fn owner_investment(
        date: NaiveDate,
        cash_account_id: &str,
        equity_account_id: &str,
        amount: BigDecimal,
    ) -> LedgerResult<JournalEntry> {
        JournalEntryBuilder::new(date, "Setoran modal pemilik")
            .debit(cash_account_id, amount.clone(), None)
            .credit(equity_account_id, amount, None)
            .build()
    }

    /// Cash expense (debit expense, credit cash)
    pub fn expense_payment(
        date: NaiveDate,
        description: &str,
        expense_account_id: &str,
        cash_account_id: &str,
        amount: BigDecimal,
    ) -> LedgerResult<JournalEntry> {
        JournalEntryBuilder::new(date, description)
            .debit(expense_account_id, amount.clone(), None)
            .credit(cash_account_id, amount, None)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AccountManager, NewAccount, PeriodManager};
    use crate::utils::memory_storage::MemoryStorage;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    async fn setup() -> (MemoryStorage, String, String) {
        let storage = MemoryStorage::new();
        let mut accounts = AccountManager::new(storage.clone());
        let cash = accounts
            .create_account(NewAccount::new("1100", "Kas", AccountType::Asset))
            .await
            .unwrap();
        let capital = accounts
            .create_account(NewAccount::new("3100", "Modal", AccountType::Equity))
            .await
            .unwrap();
        (storage, cash.id, capital.id)
    }

    #[tokio::test]
    async fn test_create_post_and_number_entries() {
        let (storage, cash, capital) = setup().await;
        let mut journal = JournalManager::new(storage);

        let entry =
            patterns::owner_investment(d(1, 2), &cash, &capital, BigDecimal::from(5_000_000))
                .unwrap();
        let created = journal.create_entry(entry).await.unwrap();
        assert_eq!(created.entry_number, "JE-000001");
        assert!(!created.is_posted);

        let posted = journal.post_entry(&created.id).await.unwrap();
        assert!(posted.is_posted);

        let again = journal.post_entry(&created.id).await;
        assert!(matches!(again, Err(LedgerError::EntryAlreadyPosted(_))));
    }

    #[tokio::test]
    async fn test_reverse_entry_rules() {
        let (storage, cash, capital) = setup().await;
        let mut journal = JournalManager::new(storage);

        let draft = journal
            .create_entry(
                patterns::owner_investment(d(1, 2), &cash, &capital, BigDecimal::from(100))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(matches!(
            journal.reverse_entry(&draft.id, None).await,
            Err(LedgerError::EntryNotPosted(_))
        ));

        journal.post_entry(&draft.id).await.unwrap();
        let reversal = journal.reverse_entry(&draft.id, Some(d(1, 5))).await.unwrap();
        assert!(reversal.is_posted);
        assert_eq!(reversal.reversal_of_id.as_deref(), Some(draft.id.as_str()));
        assert_eq!(reversal.net_debit_for(&cash), BigDecimal::from(-100));

        let original = journal.get_entry_required(&draft.id).await.unwrap();
        assert!(original.is_reversed);
        assert_eq!(original.reversed_by_id, Some(reversal.id.clone()));

        let twice = journal.reverse_entry(&draft.id, None).await;
        assert!(matches!(twice, Err(LedgerError::EntryAlreadyReversed(_))));
    }

    #[tokio::test]
    async fn test_closed_period_blocks_new_entries() {
        let (storage, cash, capital) = setup().await;
        let mut periods = PeriodManager::new(storage.clone());
        let january = periods
            .create_period("Januari 2024".into(), d(1, 1), d(1, 31))
            .await
            .unwrap();
        periods.close_period(&january.id).await.unwrap();

        let mut journal = JournalManager::new(storage);
        let entry =
            patterns::owner_investment(d(1, 10), &cash, &capital, BigDecimal::from(10)).unwrap();
        let err = journal.create_entry(entry).await.unwrap_err();
        assert_eq!(err.code(), "fiscal_period_closed");
    }

    #[tokio::test]
    async fn test_posted_entries_are_immutable() {
        let (storage, cash, capital) = setup().await;
        let mut journal = JournalManager::new(storage);
        let mut entry = journal
            .record_entry(
                patterns::owner_investment(d(2, 1), &cash, &capital, BigDecimal::from(10))
                    .unwrap(),
            )
            .await
            .unwrap();

        entry.description = "Edited".to_string();
        assert!(journal.update_entry(&mut entry).await.is_err());
        assert!(journal.delete_entry(&entry.id).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_account_is_rejected() {
        let (storage, cash, _) = setup().await;
        let mut journal = JournalManager::new(storage);
        let entry = JournalEntryBuilder::new(d(1, 3), "Bad")
            .debit(cash.as_str(), BigDecimal::from(1), None)
            .credit("missing", BigDecimal::from(1), None)
            .build()
            .unwrap();

        assert!(matches!(
            journal.create_entry(entry).await,
            Err(LedgerError::AccountNotFound(_))
        ));
    }

    #[test]
    fn test_builder_rejects_unbalanced_entry() {
        let result = JournalEntryBuilder::new(d(1, 1), "Unbalanced")
            .debit("cash", BigDecimal::from(1000), None)
            .credit("revenue", BigDecimal::from(500), None)
            .build();
        assert!(matches!(result, Err(LedgerError::UnbalancedEntry { .. })));
    }
}
