//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::NotificationChannel;
use crate::documents::{Contact, Document, DocumentStatus, Payment};
use crate::ledger::FiscalPeriod;
use crate::reconciliation::BankTransaction;
use crate::reports::{BalanceSheet, IncomeStatement};
use crate::scheduler::{PaymentReminder, RecurringTemplate};
use crate::types::*;

/// Storage abstraction for the ledger system
///
/// This trait allows the accounting core to work with any storage backend
/// (PostgreSQL, MySQL, SQLite, in-memory, etc.) by implementing these methods.
/// Soft-deleted rows must be excluded from every lookup and listing.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Open a unit of work; nested calls join the outer one
    async fn begin(&mut self) -> LedgerResult<()> {
        Ok(())
    }

    /// Make the changes of the current unit of work durable
    async fn commit(&mut self) -> LedgerResult<()> {
        Ok(())
    }

    /// Discard every change since the outermost `begin`
    async fn rollback(&mut self) -> LedgerResult<()> {
        Ok(())
    }

    /// A handle on the same data that takes part in this handle's unit of work.
    /// Plain clones are independent callers with units of work of their own.
    fn joined(&self) -> Self
    where
        Self: Sized + Clone,
    {
        self.clone()
    }

    /// Next value of a named, gap-free counter starting at 1
    async fn next_sequence(&mut self, key: &str) -> LedgerResult<u64>;

    /// Save an account to storage
    async fn save_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Get an account by ID
    async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>>;

    /// Get an account by its code
    async fn find_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>>;

    /// List all accounts, optionally filtered by type
    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>>;

    /// Update an account
    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;

    /// Save a new journal entry
    async fn save_journal_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()>;

    /// Get a journal entry by ID
    async fn get_journal_entry(&self, entry_id: &str) -> LedgerResult<Option<JournalEntry>>;

    /// Update an entry; fails with `ConcurrentModification` when `entry.version` is stale.
    /// On success the stored and the passed version are both incremented.
    async fn update_journal_entry(&mut self, entry: &mut JournalEntry) -> LedgerResult<()>;

    /// Remove a draft entry
    async fn delete_journal_entry(&mut self, entry_id: &str) -> LedgerResult<()>;

    /// List entries dated within a range, ordered by date then number
    async fn list_journal_entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>>;

    async fn save_fiscal_period(&mut self, period: &FiscalPeriod) -> LedgerResult<()>;

    async fn get_fiscal_period(&self, period_id: &str) -> LedgerResult<Option<FiscalPeriod>>;

    async fn list_fiscal_periods(&self) -> LedgerResult<Vec<FiscalPeriod>>;

    async fn update_fiscal_period(&mut self, period: &FiscalPeriod) -> LedgerResult<()>;
}

/// Storage for contacts, documents, payments and scheduler state
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    async fn save_contact(&mut self, contact: &Contact) -> LedgerResult<()>;

    async fn get_contact(&self, contact_id: &str) -> LedgerResult<Option<Contact>>;

    async fn list_contacts(&self) -> LedgerResult<Vec<Contact>>;

    async fn update_contact(&mut self, contact: &Contact) -> LedgerResult<()>;

    async fn save_document(&mut self, document: &Document) -> LedgerResult<()>;

    async fn get_document(&self, reference: &DocumentRef) -> LedgerResult<Option<Document>>;

    /// Update a document; fails with `ConcurrentModification` when `document.version` is stale
    async fn update_document(&mut self, document: &mut Document) -> LedgerResult<()>;

    /// List documents, optionally filtered by kind and status
    async fn list_documents(
        &self,
        kind: Option<DocumentKind>,
        status: Option<DocumentStatus>,
    ) -> LedgerResult<Vec<Document>>;

    async fn save_payment(&mut self, payment: &Payment) -> LedgerResult<()>;

    async fn get_payment(&self, payment_id: &str) -> LedgerResult<Option<Payment>>;

    /// Update a payment; fails with `ConcurrentModification` when `payment.version` is stale
    async fn update_payment(&mut self, payment: &mut Payment) -> LedgerResult<()>;

    /// All payments (voided included) made against a document
    async fn list_payments_for(&self, reference: &DocumentRef) -> LedgerResult<Vec<Payment>>;

    async fn list_payments(&self) -> LedgerResult<Vec<Payment>>;

    async fn save_template(&mut self, template: &RecurringTemplate) -> LedgerResult<()>;

    async fn get_template(&self, template_id: &str) -> LedgerResult<Option<RecurringTemplate>>;

    async fn list_templates(&self) -> LedgerResult<Vec<RecurringTemplate>>;

    async fn update_template(&mut self, template: &RecurringTemplate) -> LedgerResult<()>;

    async fn save_reminder(&mut self, reminder: &PaymentReminder) -> LedgerResult<()>;

    async fn get_reminder(&self, reminder_id: &str) -> LedgerResult<Option<PaymentReminder>>;

    async fn list_reminders(&self) -> LedgerResult<Vec<PaymentReminder>>;

    async fn update_reminder(&mut self, reminder: &PaymentReminder) -> LedgerResult<()>;

    /// Insert or replace an imported bank statement line
    async fn save_bank_transaction(&mut self, transaction: &BankTransaction) -> LedgerResult<()>;

    async fn get_bank_transaction(&self, transaction_id: &str) -> LedgerResult<Option<BankTransaction>>;

    /// Every stored statement line, ordered by date
    async fn list_bank_transactions(&self) -> LedgerResult<Vec<BankTransaction>>;
}

/// A backend holding both the ledger and the commercial documents
pub trait AccountingStorage: LedgerStorage + DocumentStorage + Clone {}

impl<T: LedgerStorage + DocumentStorage + Clone> AccountingStorage for T {}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before saving
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;

    /// Validate account deletion
    fn validate_account_deletion(&self, account: &Account) -> LedgerResult<()>;
}

/// Trait for implementing custom journal entry validation rules
pub trait JournalEntryValidator: Send + Sync {
    /// Validate an entry before saving or posting
    fn validate_entry(&self, entry: &JournalEntry) -> LedgerResult<()>;
}

/// Default account validator with basic rules
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        if account.code.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account code cannot be empty".to_string(),
            ));
        }

        if account.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Account name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_account_deletion(&self, account: &Account) -> LedgerResult<()> {
        if account.is_system {
            return Err(LedgerError::ProtectedAccount(account.code.clone()));
        }
        Ok(())
    }
}

/// Default entry validator with the basic double-entry rules
pub struct DefaultJournalEntryValidator;

impl JournalEntryValidator for DefaultJournalEntryValidator {
    fn validate_entry(&self, entry: &JournalEntry) -> LedgerResult<()> {
        entry.validate()
    }
}

/// Toggleable capabilities, injected instead of looked up globally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    RecurringDocuments,
    PaymentReminders,
    OverdueNotices,
    CreditLimitEnforcement,
}

pub trait FeatureManager: Send + Sync {
    fn is_enabled(&self, feature: Feature) -> bool;
}

/// Messages emitted to contacts or back-office users
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    OverdueNotice {
        document: DocumentRef,
        number: String,
        contact_id: String,
        outstanding: BigDecimal,
        due_date: NaiveDate,
        days_overdue: i64,
    },
    PaymentReminder {
        reminder_id: String,
        document: DocumentRef,
        number: String,
        contact_id: String,
        outstanding: BigDecimal,
        due_date: NaiveDate,
    },
    CreditLimitWarning {
        document: DocumentRef,
        contact_id: String,
        limit: BigDecimal,
        exposure: BigDecimal,
    },
}

/// Delivery seam for notifications (mail, database, ...)
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        channel: NotificationChannel,
        notification: &Notification,
    ) -> LedgerResult<()>;
}

/// Trait for report generation
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Generate a balance sheet as of a specific date
    async fn generate_balance_sheet(&self, as_of_date: NaiveDate) -> LedgerResult<BalanceSheet>;

    /// Generate an income statement for a date range
    async fn generate_income_statement(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<IncomeStatement>;
}
