//! Financial reports computed from posted journal entries and open documents

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::documents::{Document, DocumentStatus};
use crate::traits::*;
use crate::types::*;

/// Balance Sheet structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of_date: NaiveDate,
    pub assets: Vec<AccountBalance>,
    pub liabilities: Vec<AccountBalance>,
    /// Equity accounts plus current-period earnings
    pub equity: Vec<AccountBalance>,
    pub total_assets: BigDecimal,
    pub total_liabilities: BigDecimal,
    pub total_equity: BigDecimal,
    pub is_balanced: bool,
}

/// Income Statement structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeStatement {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub revenue: Vec<AccountBalance>,
    pub expenses: Vec<AccountBalance>,
    pub total_revenue: BigDecimal,
    pub total_expenses: BigDecimal,
    pub net_income: BigDecimal,
}

/// Report on ledger integrity and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub as_of_date: NaiveDate,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub trial_balance_total_debits: BigDecimal,
    pub trial_balance_total_credits: BigDecimal,
    pub balance_sheet_total_assets: BigDecimal,
    pub balance_sheet_total_liabilities_equity: BigDecimal,
}

/// Days-past-due bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    Current,
    Days1To30,
    Days31To60,
    Days61To90,
    Over90,
}

impl AgingBucket {
    pub fn for_days_past_due(days: i64) -> Self {
        match days {
            i64::MIN..=0 => AgingBucket::Current,
            1..=30 => AgingBucket::Days1To30,
            31..=60 => AgingBucket::Days31To60,
            61..=90 => AgingBucket::Days61To90,
            _ => AgingBucket::Over90,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingRow {
    pub document: DocumentRef,
    pub number: String,
    pub contact_id: String,
    pub due_date: NaiveDate,
    pub days_past_due: i64,
    pub outstanding: BigDecimal,
    pub bucket: AgingBucket,
}

/// Receivable (invoices) or payable (bills) aging
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgingReport {
    pub kind: DocumentKind,
    pub as_of_date: NaiveDate,
    pub rows: Vec<AgingRow>,
    pub bucket_totals: BTreeMap<AgingBucket, BigDecimal>,
    pub total_outstanding: BigDecimal,
}

/// PPN collected versus PPN paid over a date range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub output_tax: BigDecimal,
    pub input_tax: BigDecimal,
    /// Output less input; negative means a carry-forward credit
    pub net_payable: BigDecimal,
}

/// Read-only reporting over a storage backend
pub struct Reports<S: LedgerStorage> {
    storage: S,
    config: Arc<LedgerConfig>,
}

impl<S: LedgerStorage> Reports<S> {
    pub fn new(storage: S, config: Arc<LedgerConfig>) -> Self {
        Self { storage, config }
    }

    /// Net debit per account id over posted entries dated within the range
    async fn net_debits(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<HashMap<String, BigDecimal>> {
        let entries = self
            .storage
            .list_journal_entries(start_date, end_date)
            .await?;

        let mut totals: HashMap<String, BigDecimal> = HashMap::new();
        for entry in entries.iter().filter(|e| e.is_posted) {
            for line in &entry.lines {
                *totals
                    .entry(line.account_id.clone())
                    .or_insert_with(|| BigDecimal::from(0)) += &line.debit - &line.credit;
            }
        }
        Ok(totals)
    }

    /// Balances per account, normal-side signed; opening balances included when `with_opening`
    async fn balances(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
        with_opening: bool,
    ) -> LedgerResult<Vec<AccountBalance>> {
        let zero = BigDecimal::from(0);
        let net = self.net_debits(start_date, end_date).await?;
        let mut accounts = self.storage.list_accounts(None).await?;
        accounts.sort_by(|a, b| a.code.cmp(&b.code));

        let mut balances = Vec::new();
        for account in accounts {
            let movement = net.get(&account.id).cloned().unwrap_or_else(|| zero.clone());
            let mut balance = account.signed_amount(EntryType::Debit, &movement);
            if with_opening {
                balance += &account.opening_balance;
            }
            if balance != zero {
                balances.push(AccountBalance::from_signed(account, balance));
            }
        }
        Ok(balances)
    }

    /// Trial balance as of a date
    pub async fn trial_balance(&self, as_of_date: NaiveDate) -> LedgerResult<TrialBalance> {
        let zero = BigDecimal::from(0);
        let balances = self.balances(None, Some(as_of_date), true).await?;

        let total_debits: BigDecimal = balances
            .iter()
            .filter_map(|b| b.debit_balance.as_ref())
            .sum();
        let total_credits: BigDecimal = balances
            .iter()
            .filter_map(|b| b.credit_balance.as_ref())
            .sum();

        Ok(TrialBalance {
            as_of_date,
            is_balanced: &total_debits - &total_credits == zero,
            balances: balances
                .into_iter()
                .map(|b| (b.account.code.clone(), b))
                .collect(),
            total_debits,
            total_credits,
        })
    }

    /// Validate the integrity of the ledger
    pub async fn validate_integrity(
        &self,
        as_of_date: NaiveDate,
    ) -> LedgerResult<LedgerIntegrityReport> {
        let trial_balance = self.trial_balance(as_of_date).await?;
        let balance_sheet = self.generate_balance_sheet(as_of_date).await?;

        let mut issues = Vec::new();

        let entries = self
            .storage
            .list_journal_entries(None, Some(as_of_date))
            .await?;
        for entry in entries.iter().filter(|e| e.is_posted) {
            if !entry.is_balanced() {
                issues.push(format!(
                    "Entry {} is not balanced: debits = {}, credits = {}",
                    entry.entry_number,
                    entry.total_debits(),
                    entry.total_credits()
                ));
            }
        }

        if !trial_balance.is_balanced {
            issues.push(format!(
                "Trial balance is not balanced: debits = {}, credits = {}",
                trial_balance.total_debits, trial_balance.total_credits
            ));
        }

        let total_liabilities_equity =
            &balance_sheet.total_liabilities + &balance_sheet.total_equity;

        if !balance_sheet.is_balanced {
            issues.push(format!(
                "Balance sheet is not balanced: assets = {}, liabilities + equity = {}",
                balance_sheet.total_assets, total_liabilities_equity
            ));
        }

        Ok(LedgerIntegrityReport {
            as_of_date,
            is_valid: issues.is_empty(),
            issues,
            trial_balance_total_debits: trial_balance.total_debits,
            trial_balance_total_credits: trial_balance.total_credits,
            balance_sheet_total_assets: balance_sheet.total_assets,
            balance_sheet_total_liabilities_equity: total_liabilities_equity,
        })
    }

    /// PPN output versus input recorded between two dates
    pub async fn tax_summary(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<TaxSummary> {
        let zero = BigDecimal::from(0);
        let net = self.net_debits(Some(start_date), Some(end_date)).await?;
        let output_id = self.account_id(&self.config.accounts.ppn_output).await?;
        let input_id = self.account_id(&self.config.accounts.ppn_input).await?;
        let movement = |id: &str| net.get(id).cloned().unwrap_or_else(|| zero.clone());

        // Output tax sits on the credit side, input tax on the debit side.
        let output_tax = -movement(&output_id);
        let input_tax = movement(&input_id);

        Ok(TaxSummary {
            start_date,
            end_date,
            net_payable: &output_tax - &input_tax,
            output_tax,
            input_tax,
        })
    }

    async fn account_id(&self, code: &str) -> LedgerResult<String> {
        self.storage
            .find_account_by_code(code)
            .await?
            .map(|a| a.id)
            .ok_or_else(|| LedgerError::AccountNotFound(code.to_string()))
    }
}

impl<S: AccountingStorage> Reports<S> {
    /// Amounts still owed on `as_of_date`, grouped by days past due.
    /// Payments made or voided after that date are ignored.
    pub async fn aging(&self, kind: DocumentKind, as_of_date: NaiveDate) -> LedgerResult<AgingReport> {
        let zero = BigDecimal::from(0);
        let documents = self.storage.list_documents(Some(kind), None).await?;

        let mut rows = Vec::new();
        for document in documents {
            if !document.is_posted() || document.issue_date > as_of_date {
                continue;
            }
            if document.status == DocumentStatus::Cancelled
                && !self.cancelled_after(&document, as_of_date).await?
            {
                continue;
            }

            let outstanding = self.outstanding_on(&document, as_of_date).await?;
            if outstanding <= zero {
                continue;
            }
            let days_past_due = (as_of_date - document.due_date).num_days();
            rows.push(AgingRow {
                document: document.reference(),
                outstanding,
                number: document.number,
                contact_id: document.contact_id,
                due_date: document.due_date,
                days_past_due,
                bucket: AgingBucket::for_days_past_due(days_past_due),
            });
        }
        rows.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.number.cmp(&b.number)));

        let mut bucket_totals: BTreeMap<AgingBucket, BigDecimal> = [
            AgingBucket::Current,
            AgingBucket::Days1To30,
            AgingBucket::Days31To60,
            AgingBucket::Days61To90,
            AgingBucket::Over90,
        ]
        .into_iter()
        .map(|b| (b, zero.clone()))
        .collect();
        for row in &rows {
            *bucket_totals.entry(row.bucket).or_insert_with(|| zero.clone()) += &row.outstanding;
        }
        let total_outstanding = rows.iter().map(|r| &r.outstanding).sum();

        Ok(AgingReport {
            kind,
            as_of_date,
            rows,
            bucket_totals,
            total_outstanding,
        })
    }

    async fn outstanding_on(&self, document: &Document, as_of_date: NaiveDate) -> LedgerResult<BigDecimal> {
        let payments = self.storage.list_payments_for(&document.reference()).await?;
        let paid: BigDecimal = payments
            .iter()
            .filter(|p| p.payment_date <= as_of_date)
            .filter(|p| !(p.is_voided && p.voided_at.is_none_or(|at| at <= as_of_date)))
            .map(|p| &p.amount)
            .sum();
        Ok(&document.total_amount - paid)
    }

    /// Whether a cancelled document was still live on `as_of_date`
    async fn cancelled_after(&self, document: &Document, as_of_date: NaiveDate) -> LedgerResult<bool> {
        let Some(entry_id) = &document.journal_entry_id else {
            return Ok(false);
        };
        let Some(reversal_id) = self
            .storage
            .get_journal_entry(entry_id)
            .await?
            .and_then(|entry| entry.reversed_by_id)
        else {
            return Ok(false);
        };
        Ok(self
            .storage
            .get_journal_entry(&reversal_id)
            .await?
            .is_some_and(|reversal| reversal.entry_date > as_of_date))
    }
}

#[async_trait]
impl<S: LedgerStorage> ReportGenerator for Reports<S> {
    async fn generate_balance_sheet(&self, as_of_date: NaiveDate) -> LedgerResult<BalanceSheet> {
        let zero = BigDecimal::from(0);
        let balances = self.balances(None, Some(as_of_date), true).await?;

        let mut assets = Vec::new();
        let mut liabilities = Vec::new();
        let mut equity = Vec::new();
        let mut total_revenue = zero.clone();
        let mut total_expenses = zero.clone();
        for balance in balances {
            match balance.account.account_type {
                AccountType::Asset => assets.push(balance),
                AccountType::Liability => liabilities.push(balance),
                AccountType::Equity => equity.push(balance),
                AccountType::Revenue => total_revenue += balance.balance_amount(),
                AccountType::Expense => total_expenses += balance.balance_amount(),
            }
        }

        // Earnings not yet closed to retained earnings
        let net_income = &total_revenue - &total_expenses;
        if net_income != zero {
            let account = Account::new(
                "net_income".to_string(),
                "Laba Tahun Berjalan".to_string(),
                AccountType::Equity,
                None,
            );
            equity.push(AccountBalance::from_signed(account, net_income));
        }

        let total_assets: BigDecimal = assets.iter().map(|ab| ab.balance_amount()).sum();
        let total_liabilities: BigDecimal = liabilities.iter().map(|ab| ab.balance_amount()).sum();
        let total_equity: BigDecimal = equity.iter().map(|ab| ab.balance_amount()).sum();

        let is_balanced = total_assets == (&total_liabilities + &total_equity);

        Ok(BalanceSheet {
            as_of_date,
            assets,
            liabilities,
            equity,
            total_assets,
            total_liabilities,
            total_equity,
            is_balanced,
        })
    }

    async fn generate_income_statement(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<IncomeStatement> {
        let balances = self
            .balances(Some(start_date), Some(end_date), false)
            .await?;

        let (revenue, expenses): (Vec<_>, Vec<_>) = balances
            .into_iter()
            .filter(|b| {
                matches!(
                    b.account.account_type,
                    AccountType::Revenue | AccountType::Expense
                )
            })
            .partition(|b| b.account.account_type == AccountType::Revenue);

        let total_revenue: BigDecimal = revenue.iter().map(|ab| ab.balance_amount()).sum();
        let total_expenses: BigDecimal = expenses.iter().map(|ab| ab.balance_amount()).sum();
        let net_income = &total_revenue - &total_expenses;

        Ok(IncomeStatement {
            start_date,
            end_date,
            revenue,
            expenses,
            total_revenue,
            total_expenses,
            net_income,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{JournalEntryBuilder, JournalManager};
    use crate::utils::memory_storage::MemoryStorage;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    async fn seeded() -> (MemoryStorage, HashMap<String, Account>) {
        let storage = MemoryStorage::new();
        let mut accounts = crate::ledger::AccountManager::new(storage.clone());
        let chart = crate::ledger::account::utils::create_standard_chart(&mut accounts)
            .await
            .unwrap();
        (storage, chart)
    }

    #[test]
    fn test_aging_buckets() {
        assert_eq!(AgingBucket::for_days_past_due(-5), AgingBucket::Current);
        assert_eq!(AgingBucket::for_days_past_due(0), AgingBucket::Current);
        assert_eq!(AgingBucket::for_days_past_due(1), AgingBucket::Days1To30);
        assert_eq!(AgingBucket::for_days_past_due(30), AgingBucket::Days1To30);
        assert_eq!(AgingBucket::for_days_past_due(61), AgingBucket::Days61To90);
        assert_eq!(AgingBucket::for_days_past_due(91), AgingBucket::Over90);
    }

    #[tokio::test]
    async fn test_sale_flows_into_statements() {
        let (storage, chart) = seeded().await;
        let mut journal = JournalManager::new(storage.clone());

        let entry = JournalEntryBuilder::new(d(1, 5), "Penjualan tunai")
            .debit(&chart["1100"].id, BigDecimal::from(1_110_000), None)
            .credit(&chart["4100"].id, BigDecimal::from(1_000_000), None)
            .credit(&chart["2200"].id, BigDecimal::from(110_000), None)
            .build()
            .unwrap();
        journal.record_entry(entry).await.unwrap();

        let entry = JournalEntryBuilder::new(d(2, 5), "Pembelian panel")
            .debit(&chart["5100"].id, BigDecimal::from(400_000), None)
            .debit(&chart["1400"].id, BigDecimal::from(44_000), None)
            .credit(&chart["1100"].id, BigDecimal::from(444_000), None)
            .build()
            .unwrap();
        journal.record_entry(entry).await.unwrap();

        let reports = Reports::new(storage.clone(), Arc::new(LedgerConfig::default()));

        let trial = reports.trial_balance(d(2, 28)).await.unwrap();
        assert!(trial.is_balanced);
        assert_eq!(trial.total_debits, BigDecimal::from(1_110_000));

        let sheet = reports.generate_balance_sheet(d(2, 28)).await.unwrap();
        assert!(sheet.is_balanced);
        assert_eq!(sheet.total_assets, BigDecimal::from(710_000));

        let january = reports.generate_income_statement(d(1, 1), d(1, 31)).await.unwrap();
        assert_eq!(january.net_income, BigDecimal::from(1_000_000));
        let february = reports.generate_income_statement(d(2, 1), d(2, 29)).await.unwrap();
        assert_eq!(february.net_income, BigDecimal::from(-400_000));

        let tax = reports.tax_summary(d(1, 1), d(2, 29)).await.unwrap();
        assert_eq!(tax.output_tax, BigDecimal::from(110_000));
        assert_eq!(tax.input_tax, BigDecimal::from(44_000));
        assert_eq!(tax.net_payable, BigDecimal::from(66_000));

        let integrity = reports.validate_integrity(d(2, 28)).await.unwrap();
        assert!(integrity.is_valid, "{:?}", integrity.issues);
    }

    #[tokio::test]
    async fn test_drafts_are_ignored() {
        let (storage, chart) = seeded().await;
        let mut journal = JournalManager::new(storage.clone());
        let entry = JournalEntryBuilder::new(d(1, 5), "Draft")
            .debit(&chart["1100"].id, BigDecimal::from(10), None)
            .credit(&chart["3100"].id, BigDecimal::from(10), None)
            .build()
            .unwrap();
        journal.create_entry(entry).await.unwrap();

        let reports = Reports::new(storage, Arc::new(LedgerConfig::default()));
        let trial = reports.trial_balance(d(1, 31)).await.unwrap();
        assert!(trial.balances.is_empty());
    }
}
