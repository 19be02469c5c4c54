//! # Pembukuan Core
//!
//! Double-entry bookkeeping for small Indonesian businesses: a chart of
//! accounts, journals with fiscal periods, sales invoices and purchase bills
//! with PPN, payments, recurring documents, reminders and financial reports.
//!
//! ## Features
//!
//! - **Ledger**: balanced journal entries, posting, reversal and closed-period protection
//! - **Documents**: invoice and bill lifecycle with automatic journal entries
//! - **Payments**: allocation, overpayment protection and voiding
//! - **PPN**: exclusive and inclusive VAT at configurable rates
//! - **Scheduler**: overdue marking, recurring generation and payment reminders
//! - **Reports**: trial balance, balance sheet, income statement, aging and tax summary
//! - **Storage abstraction**: async storage traits with an in-memory implementation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pembukuan_core::utils::MemoryStorage;
//! use pembukuan_core::{Ledger, LedgerConfig};
//!
//! # async fn run() -> pembukuan_core::LedgerResult<()> {
//! let mut ledger = Ledger::new(MemoryStorage::new());
//! let chart = ledger.setup_standard_chart_of_accounts().await?;
//! assert!(chart.contains_key(&LedgerConfig::default().accounts.cash));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod costing;
pub mod documents;
pub mod ledger;
pub mod reconciliation;
pub mod reports;
pub mod scheduler;
pub mod tax;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::*;
pub use documents::*;
pub use ledger::{
    ensure_period_open, AccountManager, FiscalPeriod, JournalEntryBuilder, JournalManager,
    Ledger, NewAccount, PeriodManager,
};
pub use reports::*;
pub use scheduler::*;
pub use tax::*;
pub use traits::*;
pub use types::*;

// Re-export journal patterns for convenience
pub use ledger::journal::patterns;
