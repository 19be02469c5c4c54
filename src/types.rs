//! Core types and data structures for the accounting system

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Account types following the SAK EMKM chart of accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Assets - what the business owns (Kas, Piutang, Persediaan, etc.)
    Asset,
    /// Liabilities - what the business owes (Utang Usaha, PPN Keluaran, etc.)
    Liability,
    /// Equity - owner's interest in the business (Modal, Laba Ditahan)
    Equity,
    /// Revenue - money earned by the business
    Revenue,
    /// Expenses - costs incurred by the business
    Expense,
}

impl AccountType {
    /// Returns the normal balance side for this account type.
    /// Assets and Expenses normally have debit balances,
    /// Liabilities, Equity, and Revenue normally have credit balances.
    pub fn normal_balance(&self) -> EntryType {
        match self {
            AccountType::Asset | AccountType::Expense => EntryType::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                EntryType::Credit
            }
        }
    }
}

/// Side of a journal line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Debit,
    Credit,
}

impl EntryType {
    pub fn opposite(&self) -> Self {
        match self {
            EntryType::Debit => EntryType::Credit,
            EntryType::Credit => EntryType::Debit,
        }
    }
}

/// Chart of accounts node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: String,
    /// Account code, unique among active accounts (e.g. "1100")
    pub code: String,
    /// Human-readable account name
    pub name: String,
    /// Type of account (Asset, Liability, etc.)
    pub account_type: AccountType,
    /// Free-form subtype, e.g. "cash", "receivable", "tax"
    pub subtype: Option<String>,
    /// Optional parent account for hierarchical chart of accounts
    pub parent_id: Option<String>,
    /// Balance brought forward before the first journal entry
    pub opening_balance: BigDecimal,
    /// System accounts cannot be deleted
    pub is_system: bool,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    /// Soft-delete marker
    pub deleted_at: Option<NaiveDateTime>,
}

impl Account {
    /// Create a new account with a generated id
    pub fn new(
        code: String,
        name: String,
        account_type: AccountType,
        parent_id: Option<String>,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            code,
            name,
            account_type,
            subtype: None,
            parent_id,
            opening_balance: BigDecimal::from(0),
            is_system: false,
            metadata: HashMap::new(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Effect of a movement on this account's balance, signed by its normal side.
    pub fn signed_amount(&self, entry_type: EntryType, amount: &BigDecimal) -> BigDecimal {
        if self.account_type.normal_balance() == entry_type {
            amount.clone()
        } else {
            -amount.clone()
        }
    }
}

/// Kind of commercial document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Invoice,
    Bill,
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentKind::Invoice => write!(f, "invoice"),
            DocumentKind::Bill => write!(f, "bill"),
        }
    }
}

/// Reference to an invoice or a bill (payable / remindable targets)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentRef {
    pub kind: DocumentKind,
    pub id: String,
}

impl DocumentRef {
    pub fn invoice(id: impl Into<String>) -> Self {
        Self {
            kind: DocumentKind::Invoice,
            id: id.into(),
        }
    }

    pub fn bill(id: impl Into<String>) -> Self {
        Self {
            kind: DocumentKind::Bill,
            id: id.into(),
        }
    }
}

/// Origin of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Invoice,
    Bill,
    Payment,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub kind: SourceKind,
    pub id: String,
}

impl SourceRef {
    pub fn payment(id: impl Into<String>) -> Self {
        Self {
            kind: SourceKind::Payment,
            id: id.into(),
        }
    }
}

impl From<&DocumentRef> for SourceRef {
    fn from(document: &DocumentRef) -> Self {
        let kind = match document.kind {
            DocumentKind::Invoice => SourceKind::Invoice,
            DocumentKind::Bill => SourceKind::Bill,
        };
        Self {
            kind,
            id: document.id.clone(),
        }
    }
}

/// One debit or credit line of a journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryLine {
    /// Account being affected
    pub account_id: String,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    /// Optional description for this specific line
    pub description: Option<String>,
}

impl JournalEntryLine {
    /// Create a debit line
    pub fn debit(account_id: String, amount: BigDecimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: BigDecimal::from(0),
            description,
        }
    }

    /// Create a credit line
    pub fn credit(account_id: String, amount: BigDecimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit: BigDecimal::from(0),
            credit: amount,
            description,
        }
    }

    /// Side of the line, `None` when both or neither side carries an amount
    pub fn entry_type(&self) -> Option<EntryType> {
        let zero = BigDecimal::from(0);
        match (self.debit != zero, self.credit != zero) {
            (true, false) => Some(EntryType::Debit),
            (false, true) => Some(EntryType::Credit),
            _ => None,
        }
    }

    /// The non-zero side of the line
    pub fn amount(&self) -> &BigDecimal {
        match self.entry_type() {
            Some(EntryType::Credit) => &self.credit,
            _ => &self.debit,
        }
    }

    /// Same line with debit and credit swapped
    pub fn mirrored(&self) -> Self {
        Self {
            account_id: self.account_id.clone(),
            debit: self.credit.clone(),
            credit: self.debit.clone(),
            description: self.description.clone(),
        }
    }
}

/// Balanced set of debit/credit lines recording one accounting event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unique identifier for the entry
    pub id: String,
    /// Sequential number, assigned when the entry is stored (e.g. "JE-000001")
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub description: String,
    /// Optional external reference (document number, bank reference, etc.)
    pub reference: Option<String>,
    pub lines: Vec<JournalEntryLine>,
    pub is_posted: bool,
    pub posted_at: Option<NaiveDateTime>,
    pub is_reversed: bool,
    pub reversal_of_id: Option<String>,
    pub reversed_by_id: Option<String>,
    /// Document or payment that produced this entry
    pub source: Option<SourceRef>,
    /// Optimistic concurrency counter, bumped by storage on every update
    pub version: u64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl JournalEntry {
    /// Create a new draft entry
    pub fn new(entry_date: NaiveDate, description: String, reference: Option<String>) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            entry_number: String::new(),
            entry_date,
            description,
            reference,
            lines: Vec::new(),
            is_posted: false,
            posted_at: None,
            is_reversed: false,
            reversal_of_id: None,
            reversed_by_id: None,
            source: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn add_line(&mut self, line: JournalEntryLine) {
        self.lines.push(line);
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.debit).sum()
    }

    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|l| &l.credit).sum()
    }

    /// Check if the entry is balanced (debits = credits)
    pub fn is_balanced(&self) -> bool {
        self.total_debits() == self.total_credits()
    }

    /// Check the structural double-entry rules
    pub fn validate(&self) -> LedgerResult<()> {
        if self.lines.len() < 2 {
            return Err(LedgerError::Validation(
                "Journal entry must have at least two lines for double-entry bookkeeping"
                    .to_string(),
            ));
        }

        let zero = BigDecimal::from(0);
        for line in &self.lines {
            if line.debit < zero || line.credit < zero {
                return Err(LedgerError::Validation(
                    "Line amounts must be positive".to_string(),
                ));
            }
            if line.entry_type().is_none() {
                return Err(LedgerError::Validation(format!(
                    "Line for account '{}' must carry either a debit or a credit",
                    line.account_id
                )));
            }
        }

        if !self.is_balanced() {
            return Err(LedgerError::UnbalancedEntry {
                debits: self.total_debits(),
                credits: self.total_credits(),
            });
        }

        Ok(())
    }

    /// Net movement of the entry on one account, signed debit-positive
    pub fn net_debit_for(&self, account_id: &str) -> BigDecimal {
        self.lines
            .iter()
            .filter(|l| l.account_id == account_id)
            .map(|l| &l.debit - &l.credit)
            .sum()
    }
}

/// Trial Balance - snapshot of all account balances at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of_date: NaiveDate,
    /// Account balances keyed by account code
    pub balances: HashMap<String, AccountBalance>,
    pub total_debits: BigDecimal,
    pub total_credits: BigDecimal,
    pub is_balanced: bool,
}

/// Account balance information for trial balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: Account,
    pub debit_balance: Option<BigDecimal>,
    pub credit_balance: Option<BigDecimal>,
}

impl AccountBalance {
    /// Place a signed (normal-side positive) balance in the debit or credit column
    pub fn from_signed(account: Account, balance: BigDecimal) -> Self {
        let zero = BigDecimal::from(0);
        let side = if balance >= zero {
            account.account_type.normal_balance()
        } else {
            account.account_type.normal_balance().opposite()
        };
        let amount = balance.abs();
        match side {
            EntryType::Debit => Self {
                account,
                debit_balance: Some(amount),
                credit_balance: None,
            },
            EntryType::Credit => Self {
                account,
                debit_balance: None,
                credit_balance: Some(amount),
            },
        }
    }

    /// Balance on the account's normal side; negative when the account is contra
    pub fn balance_amount(&self) -> BigDecimal {
        let zero = BigDecimal::from(0);
        let (normal, contra) = match self.account.account_type.normal_balance() {
            EntryType::Debit => (&self.debit_balance, &self.credit_balance),
            EntryType::Credit => (&self.credit_balance, &self.debit_balance),
        };
        match (normal, contra) {
            (Some(amount), _) => amount.clone(),
            (None, Some(amount)) => -amount.clone(),
            (None, None) => zero,
        }
    }
}

/// Error taxonomy used to map failures onto caller-facing responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed input (unbalanced entry, empty name, ...)
    Validation,
    /// Invalid transition (posting a posted entry, voiding twice, ...)
    State,
    /// Business rule refusal (closed period, credit limit, overpayment)
    Policy,
    NotFound,
    Internal,
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Journal entry is not balanced: debits = {debits}, credits = {credits}")]
    UnbalancedEntry {
        debits: BigDecimal,
        credits: BigDecimal,
    },
    #[error("Invalid state transition: {0}")]
    InvalidTransition(String),
    #[error("Journal entry {0} is already posted")]
    EntryAlreadyPosted(String),
    #[error("Journal entry {0} is not posted")]
    EntryNotPosted(String),
    #[error("Journal entry {0} is already reversed")]
    EntryAlreadyReversed(String),
    #[error("Payment {0} is already voided")]
    PaymentAlreadyVoided(String),
    #[error("{entity} {id} was modified concurrently")]
    ConcurrentModification { entity: &'static str, id: String },
    #[error("Job {0} is already running")]
    JobAlreadyRunning(String),
    #[error("Fiscal period is closed or locked for {0}")]
    FiscalPeriodClosed(NaiveDate),
    #[error("Credit limit exceeded for contact {contact_id}: limit = {limit}, exposure = {exposure}")]
    CreditLimitExceeded {
        contact_id: String,
        limit: BigDecimal,
        exposure: BigDecimal,
    },
    #[error("Overpayment: outstanding = {outstanding}, attempted = {attempted}")]
    Overpayment {
        outstanding: BigDecimal,
        attempted: BigDecimal,
    },
    #[error("Account {0} is protected")]
    ProtectedAccount(String),
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Journal entry not found: {0}")]
    EntryNotFound(String),
    #[error("Document not found: {0}")]
    DocumentNotFound(String),
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),
    #[error("Contact not found: {0}")]
    ContactNotFound(String),
    #[error("Fiscal period not found: {0}")]
    FiscalPeriodNotFound(String),
    #[error("Recurring template not found: {0}")]
    TemplateNotFound(String),
    #[error("Payment reminder not found: {0}")]
    ReminderNotFound(String),
    #[error("Bank transaction not found: {0}")]
    BankTransactionNotFound(String),
}

impl LedgerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Storage(_) => ErrorKind::Internal,
            LedgerError::Validation(_) | LedgerError::UnbalancedEntry { .. } => {
                ErrorKind::Validation
            }
            LedgerError::InvalidTransition(_)
            | LedgerError::EntryAlreadyPosted(_)
            | LedgerError::EntryNotPosted(_)
            | LedgerError::EntryAlreadyReversed(_)
            | LedgerError::PaymentAlreadyVoided(_)
            | LedgerError::ConcurrentModification { .. }
            | LedgerError::JobAlreadyRunning(_) => ErrorKind::State,
            LedgerError::FiscalPeriodClosed(_)
            | LedgerError::CreditLimitExceeded { .. }
            | LedgerError::Overpayment { .. }
            | LedgerError::ProtectedAccount(_) => ErrorKind::Policy,
            LedgerError::AccountNotFound(_)
            | LedgerError::EntryNotFound(_)
            | LedgerError::DocumentNotFound(_)
            | LedgerError::PaymentNotFound(_)
            | LedgerError::ContactNotFound(_)
            | LedgerError::FiscalPeriodNotFound(_)
            | LedgerError::TemplateNotFound(_)
            | LedgerError::ReminderNotFound(_)
            | LedgerError::BankTransactionNotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            LedgerError::Storage(_) => "storage_error",
            LedgerError::Validation(_) => "validation_failed",
            LedgerError::UnbalancedEntry { .. } => "unbalanced_entry",
            LedgerError::InvalidTransition(_) => "invalid_transition",
            LedgerError::EntryAlreadyPosted(_) => "entry_already_posted",
            LedgerError::EntryNotPosted(_) => "entry_not_posted",
            LedgerError::EntryAlreadyReversed(_) => "entry_already_reversed",
            LedgerError::PaymentAlreadyVoided(_) => "payment_already_voided",
            LedgerError::ConcurrentModification { .. } => "concurrent_modification",
            LedgerError::JobAlreadyRunning(_) => "job_already_running",
            LedgerError::FiscalPeriodClosed(_) => "fiscal_period_closed",
            LedgerError::CreditLimitExceeded { .. } => "credit_limit_exceeded",
            LedgerError::Overpayment { .. } => "overpayment",
            LedgerError::ProtectedAccount(_) => "protected_account",
            LedgerError::AccountNotFound(_) => "account_not_found",
            LedgerError::EntryNotFound(_) => "journal_entry_not_found",
            LedgerError::DocumentNotFound(_) => "document_not_found",
            LedgerError::PaymentNotFound(_) => "payment_not_found",
            LedgerError::ContactNotFound(_) => "contact_not_found",
            LedgerError::FiscalPeriodNotFound(_) => "fiscal_period_not_found",
            LedgerError::TemplateNotFound(_) => "recurring_template_not_found",
            LedgerError::ReminderNotFound(_) => "payment_reminder_not_found",
            LedgerError::BankTransactionNotFound(_) => "bank_transaction_not_found",
        }
    }

    /// HTTP status an API layer should answer with
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 422,
            ErrorKind::State => 409,
            ErrorKind::Policy => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Internal => 500,
        }
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
