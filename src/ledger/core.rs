//! Main ledger orchestrator that coordinates accounts, journal entries and periods

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::ledger::{AccountManager, FiscalPeriod, JournalManager, NewAccount, PeriodManager};
use crate::reports::{BalanceSheet, IncomeStatement, LedgerIntegrityReport, Reports};
use crate::traits::*;
use crate::types::*;

/// Main ledger system that orchestrates all bookkeeping operations
pub struct Ledger<S: LedgerStorage> {
    account_manager: AccountManager<S>,
    journal_manager: JournalManager<S>,
    period_manager: PeriodManager<S>,
    reports: Reports<S>,
}

impl<S: LedgerStorage + Clone> Ledger<S> {
    /// Create a new ledger with the given storage backend
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, Arc::new(LedgerConfig::default()))
    }

    pub fn with_config(storage: S, config: Arc<LedgerConfig>) -> Self {
        Self {
            account_manager: AccountManager::new(storage.clone()),
            journal_manager: JournalManager::new(storage.clone())
                .with_numbering(config.numbering.clone()),
            period_manager: PeriodManager::new(storage.clone()),
            reports: Reports::new(storage, config),
        }
    }

    /// Create a new ledger with custom validators
    pub fn with_validators(
        storage: S,
        account_validator: Box<dyn AccountValidator>,
        entry_validator: Box<dyn JournalEntryValidator>,
    ) -> Self {
        let config = Arc::new(LedgerConfig::default());
        Self {
            account_manager: AccountManager::with_validator(storage.clone(), account_validator),
            journal_manager: JournalManager::with_validator(storage.clone(), entry_validator)
                .with_numbering(config.numbering.clone()),
            period_manager: PeriodManager::new(storage.clone()),
            reports: Reports::new(storage, config),
        }
    }

    // Account operations
    pub async fn create_account(&mut self, params: NewAccount) -> LedgerResult<Account> {
        self.account_manager.create_account(params).await
    }

    pub async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        self.account_manager.get_account(account_id).await
    }

    pub async fn get_account_by_code(&self, code: &str) -> LedgerResult<Account> {
        self.account_manager.get_by_code_required(code).await
    }

    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.account_manager.list_accounts().await
    }

    pub async fn list_accounts_by_type(
        &self,
        account_type: AccountType,
    ) -> LedgerResult<Vec<Account>> {
        self.account_manager
            .list_accounts_by_type(account_type)
            .await
    }

    pub async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.account_manager.update_account(account).await
    }

    pub async fn delete_account(&mut self, account_id: &str) -> LedgerResult<()> {
        self.account_manager.delete_account(account_id).await
    }

    pub async fn child_accounts(&self, parent_id: &str) -> LedgerResult<Vec<Account>> {
        self.account_manager.child_accounts(parent_id).await
    }

    // Journal operations
    /// Store a balanced draft entry
    pub async fn create_entry(&mut self, entry: JournalEntry) -> LedgerResult<JournalEntry> {
        self.journal_manager.create_entry(entry).await
    }

    pub async fn post_entry(&mut self, entry_id: &str) -> LedgerResult<JournalEntry> {
        self.journal_manager.post_entry(entry_id).await
    }

    /// Create and post an entry in one step
    pub async fn record_entry(&mut self, entry: JournalEntry) -> LedgerResult<JournalEntry> {
        self.journal_manager.record_entry(entry).await
    }

    pub async fn reverse_entry(
        &mut self,
        entry_id: &str,
        date: Option<NaiveDate>,
    ) -> LedgerResult<JournalEntry> {
        self.journal_manager.reverse_entry(entry_id, date).await
    }

    pub async fn get_entry(&self, entry_id: &str) -> LedgerResult<Option<JournalEntry>> {
        self.journal_manager.get_entry(entry_id).await
    }

    pub async fn get_entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        self.journal_manager.list_entries(start_date, end_date).await
    }

    pub async fn delete_entry(&mut self, entry_id: &str) -> LedgerResult<()> {
        self.journal_manager.delete_entry(entry_id).await
    }

    // Fiscal period operations
    pub async fn create_period(
        &mut self,
        name: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<FiscalPeriod> {
        self.period_manager
            .create_period(name, start_date, end_date)
            .await
    }

    pub async fn close_period(&mut self, period_id: &str) -> LedgerResult<FiscalPeriod> {
        self.period_manager.close_period(period_id).await
    }

    pub async fn reopen_period(&mut self, period_id: &str) -> LedgerResult<FiscalPeriod> {
        self.period_manager.reopen_period(period_id).await
    }

    pub async fn lock_period(&mut self, period_id: &str) -> LedgerResult<FiscalPeriod> {
        self.period_manager.lock_period(period_id).await
    }

    pub async fn unlock_period(&mut self, period_id: &str) -> LedgerResult<FiscalPeriod> {
        self.period_manager.unlock_period(period_id).await
    }

    pub async fn list_periods(&self) -> LedgerResult<Vec<FiscalPeriod>> {
        self.period_manager.list_periods().await
    }

    // Balance and reporting operations
    /// Get account balance as of a specific date
    pub async fn get_account_balance(
        &self,
        account_id: &str,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<BigDecimal> {
        self.account_manager
            .get_balance(account_id, as_of_date)
            .await
    }

    pub async fn get_trial_balance(&self, as_of_date: NaiveDate) -> LedgerResult<TrialBalance> {
        self.reports.trial_balance(as_of_date).await
    }

    pub async fn generate_balance_sheet(
        &self,
        as_of_date: NaiveDate,
    ) -> LedgerResult<BalanceSheet> {
        self.reports.generate_balance_sheet(as_of_date).await
    }

    pub async fn generate_income_statement(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<IncomeStatement> {
        self.reports
            .generate_income_statement(start_date, end_date)
            .await
    }

    /// Setup the SAK EMKM chart of accounts, keyed by account code
    pub async fn setup_standard_chart_of_accounts(
        &mut self,
    ) -> LedgerResult<HashMap<String, Account>> {
        crate::ledger::account::utils::create_standard_chart(&mut self.account_manager).await
    }

    /// Validate the integrity of the ledger
    pub async fn validate_integrity(
        &self,
        as_of_date: NaiveDate,
    ) -> LedgerResult<LedgerIntegrityReport> {
        self.reports.validate_integrity(as_of_date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::journal::patterns;
    use crate::utils::memory_storage::MemoryStorage;

    #[tokio::test]
    async fn test_ledger_basic_operations() {
        let storage = MemoryStorage::new();
        let mut ledger = Ledger::new(storage);
        let chart = ledger.setup_standard_chart_of_accounts().await.unwrap();
        let cash = &chart["1100"];
        let capital = &chart["3100"];
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let entry =
            patterns::owner_investment(date, &cash.id, &capital.id, BigDecimal::from(1000))
                .unwrap();
        ledger.record_entry(entry).await.unwrap();

        let cash_balance = ledger.get_account_balance(&cash.id, None).await.unwrap();
        let capital_balance = ledger.get_account_balance(&capital.id, None).await.unwrap();
        assert_eq!(cash_balance, BigDecimal::from(1000));
        assert_eq!(capital_balance, BigDecimal::from(1000));

        let balance_sheet = ledger.generate_balance_sheet(date).await.unwrap();
        assert_eq!(balance_sheet.total_assets, BigDecimal::from(1000));
        assert!(balance_sheet.is_balanced);
    }

    #[tokio::test]
    async fn test_draft_entries_do_not_move_balances() {
        let mut ledger = Ledger::new(MemoryStorage::new());
        let chart = ledger.setup_standard_chart_of_accounts().await.unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let entry = patterns::expense_payment(
            date,
            "Sewa kantor",
            &chart["5300"].id,
            &chart["1100"].id,
            BigDecimal::from(250),
        )
        .unwrap();
        let draft = ledger.create_entry(entry).await.unwrap();

        let balance = ledger
            .get_account_balance(&chart["5300"].id, None)
            .await
            .unwrap();
        assert_eq!(balance, BigDecimal::from(0));

        ledger.post_entry(&draft.id).await.unwrap();
        let balance = ledger
            .get_account_balance(&chart["5300"].id, None)
            .await
            .unwrap();
        assert_eq!(balance, BigDecimal::from(250));
    }
}
