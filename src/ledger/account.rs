//! Account management functionality

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::traits::*;
use crate::types::*;

/// Parameters for creating an account
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub subtype: Option<String>,
    pub parent_id: Option<String>,
    pub opening_balance: BigDecimal,
    pub is_system: bool,
}

impl NewAccount {
    pub fn new(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
            subtype: None,
            parent_id: None,
            opening_balance: BigDecimal::from(0),
            is_system: false,
        }
    }

    pub fn parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn opening_balance(mut self, amount: BigDecimal) -> Self {
        self.opening_balance = amount;
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }
}

/// Account manager for handling chart of accounts operations
pub struct AccountManager<S: LedgerStorage> {
    pub(crate) storage: S,
    validator: Box<dyn AccountValidator>,
}

impl<S: LedgerStorage> AccountManager<S> {
    /// Create a new account manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Box::new(DefaultAccountValidator),
        }
    }

    /// Create a new account manager with custom validator
    pub fn with_validator(storage: S, validator: Box<dyn AccountValidator>) -> Self {
        Self { storage, validator }
    }

    /// Create a new account
    pub async fn create_account(&mut self, params: NewAccount) -> LedgerResult<Account> {
        let mut account = Account::new(
            params.code,
            params.name,
            params.account_type,
            params.parent_id,
        );
        account.subtype = params.subtype;
        account.opening_balance = params.opening_balance;
        account.is_system = params.is_system;

        self.validator.validate_account(&account)?;
        self.ensure_code_available(&account).await?;
        self.ensure_valid_parent(&account).await?;

        self.storage.save_account(&account).await?;
        tracing::debug!(code = %account.code, name = %account.name, "account created");

        Ok(account)
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        self.storage.get_account(account_id).await
    }

    /// Get an account by ID, returning an error if not found
    pub async fn get_account_required(&self, account_id: &str) -> LedgerResult<Account> {
        self.storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    /// Get an account by code, returning an error if not found
    pub async fn get_by_code_required(&self, code: &str) -> LedgerResult<Account> {
        self.storage
            .find_account_by_code(code)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(code.to_string()))
    }

    /// List all accounts
    pub async fn list_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(None).await
    }

    /// List accounts by type
    pub async fn list_accounts_by_type(
        &self,
        account_type: AccountType,
    ) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(Some(account_type)).await
    }

    /// Update an account, re-checking code uniqueness and the tree shape
    pub async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.validator.validate_account(account)?;

        let existing = self.get_account_required(&account.id).await?;
        if existing.is_system && existing.account_type != account.account_type {
            return Err(LedgerError::ProtectedAccount(existing.code));
        }

        self.ensure_code_available(account).await?;
        self.ensure_valid_parent(account).await?;

        let mut updated = account.clone();
        updated.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_account(&updated).await
    }

    /// Soft-delete an account
    pub async fn delete_account(&mut self, account_id: &str) -> LedgerResult<()> {
        let mut account = self.get_account_required(account_id).await?;
        self.validator.validate_account_deletion(&account)?;

        if !self.child_accounts(account_id).await?.is_empty() {
            return Err(LedgerError::Validation(format!(
                "Account '{}' still has child accounts",
                account.code
            )));
        }

        let now = chrono::Utc::now().naive_utc();
        account.deleted_at = Some(now);
        account.updated_at = now;
        self.storage.update_account(&account).await?;
        tracing::info!(code = %account.code, "account deleted");
        Ok(())
    }

    /// Direct children of an account
    pub async fn child_accounts(&self, parent_id: &str) -> LedgerResult<Vec<Account>> {
        let all_accounts = self.list_accounts().await?;
        Ok(all_accounts
            .into_iter()
            .filter(|account| account.parent_id.as_deref() == Some(parent_id))
            .collect())
    }

    /// Accounts from the root down to `account_id`
    pub async fn account_path(&self, account_id: &str) -> LedgerResult<Vec<Account>> {
        let mut path = Vec::new();
        let mut current_account_id = Some(account_id.to_string());

        while let Some(id) = current_account_id {
            let account = self.get_account_required(&id).await?;
            current_account_id = account.parent_id.clone();
            path.insert(0, account);
        }

        Ok(path)
    }

    /// Balance on the account's normal side: opening balance plus posted movements
    /// dated on or before `as_of_date` (all posted movements when `None`).
    pub async fn get_balance(
        &self,
        account_id: &str,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<BigDecimal> {
        let account = self.get_account_required(account_id).await?;
        let entries = self.storage.list_journal_entries(None, as_of_date).await?;

        let mut balance = account.opening_balance.clone();
        for entry in entries.iter().filter(|e| e.is_posted) {
            for line in entry.lines.iter().filter(|l| l.account_id == account.id) {
                if let Some(entry_type) = line.entry_type() {
                    balance += account.signed_amount(entry_type, line.amount());
                }
            }
        }
        Ok(balance)
    }

    async fn ensure_code_available(&self, account: &Account) -> LedgerResult<()> {
        if let Some(existing) = self.storage.find_account_by_code(&account.code).await? {
            if existing.id != account.id {
                return Err(LedgerError::Validation(format!(
                    "Account with code '{}' already exists",
                    account.code
                )));
            }
        }
        Ok(())
    }

    async fn ensure_valid_parent(&self, account: &Account) -> LedgerResult<()> {
        let Some(parent_id) = account.parent_id.as_deref() else {
            return Ok(());
        };

        let parent = self.storage.get_account(parent_id).await?.ok_or_else(|| {
            LedgerError::Validation(format!("Parent account '{}' does not exist", parent_id))
        })?;
        if parent.account_type != account.account_type {
            return Err(LedgerError::Validation(format!(
                "Parent account '{}' has a different account type",
                parent.code
            )));
        }

        // Walk up from the parent; meeting the account itself means a cycle.
        let mut cursor = Some(parent);
        while let Some(node) = cursor {
            if node.id == account.id {
                return Err(LedgerError::Validation(format!(
                    "Account '{}' cannot be its own ancestor",
                    account.code
                )));
            }
            cursor = match node.parent_id {
                Some(ref id) => self.storage.get_account(id).await?,
                None => None,
            };
        }
        Ok(())
    }
}

/// Utility functions for working with accounts
pub mod utils {
    use super::*;

    /// (code, name, type, subtype, parent code)
    const SAK_EMKM_CHART: &[(&str, &str, AccountType, Option<&str>, Option<&str>)] = &[
        ("1000", "Aset Lancar", AccountType::Asset, None, None),
        ("1100", "Kas dan Bank", AccountType::Asset, Some("cash"), Some("1000")),
        ("1200", "Piutang Usaha", AccountType::Asset, Some("receivable"), Some("1000")),
        ("1300", "Persediaan", AccountType::Asset, Some("inventory"), Some("1000")),
        ("1400", "PPN Masukan", AccountType::Asset, Some("tax"), Some("1000")),
        ("1500", "Aset Tetap", AccountType::Asset, Some("fixed_asset"), None),
        ("2000", "Liabilitas Jangka Pendek", AccountType::Liability, None, None),
        ("2100", "Utang Usaha", AccountType::Liability, Some("payable"), Some("2000")),
        ("2200", "PPN Keluaran", AccountType::Liability, Some("tax"), Some("2000")),
        ("3000", "Ekuitas", AccountType::Equity, None, None),
        ("3100", "Modal Pemilik", AccountType::Equity, Some("capital"), Some("3000")),
        ("3200", "Laba Ditahan", AccountType::Equity, Some("retained_earnings"), Some("3000")),
        ("4000", "Pendapatan", AccountType::Revenue, None, None),
        ("4100", "Pendapatan Penjualan", AccountType::Revenue, Some("sales"), Some("4000")),
        ("4200", "Potongan Penjualan", AccountType::Revenue, Some("contra"), Some("4000")),
        ("5000", "Beban", AccountType::Expense, None, None),
        ("5100", "Beban Pembelian", AccountType::Expense, Some("purchases"), Some("5000")),
        ("5200", "Potongan Pembelian", AccountType::Expense, Some("contra"), Some("5000")),
        ("5300", "Beban Operasional", AccountType::Expense, Some("operating"), Some("5000")),
    ];

    /// Create the SAK EMKM system chart of accounts, keyed by account code
    pub async fn create_standard_chart<S: LedgerStorage>(
        account_manager: &mut AccountManager<S>,
    ) -> LedgerResult<HashMap<String, Account>> {
        let mut accounts: HashMap<String, Account> = HashMap::new();

        for (code, name, account_type, subtype, parent_code) in SAK_EMKM_CHART {
            let mut params = NewAccount::new(*code, *name, *account_type).system();
            if let Some(subtype) = subtype {
                params = params.subtype(*subtype);
            }
            if let Some(parent_code) = parent_code {
                let parent = accounts
                    .get(*parent_code)
                    .ok_or_else(|| LedgerError::AccountNotFound(parent_code.to_string()))?;
                params = params.parent(parent.id.clone());
            }

            let account = account_manager.create_account(params).await?;
            accounts.insert(code.to_string(), account);
        }

        Ok(accounts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    #[tokio::test]
    async fn test_duplicate_code_is_rejected() {
        let mut manager = AccountManager::new(MemoryStorage::new());
        manager
            .create_account(NewAccount::new("1100", "Kas", AccountType::Asset))
            .await
            .unwrap();

        let result = manager
            .create_account(NewAccount::new("1100", "Kas Kecil", AccountType::Asset))
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_reparenting_into_descendant_is_rejected() {
        let mut manager = AccountManager::new(MemoryStorage::new());
        let root = manager
            .create_account(NewAccount::new("1000", "Aset Lancar", AccountType::Asset))
            .await
            .unwrap();
        let child = manager
            .create_account(NewAccount::new("1100", "Kas", AccountType::Asset).parent(&root.id))
            .await
            .unwrap();

        let mut cyclic = root.clone();
        cyclic.parent_id = Some(child.id.clone());
        let result = manager.update_account(&cyclic).await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));

        let path = manager.account_path(&child.id).await.unwrap();
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].code, "1000");
    }

    #[tokio::test]
    async fn test_system_accounts_are_protected() {
        let mut manager = AccountManager::new(MemoryStorage::new());
        let chart = utils::create_standard_chart(&mut manager).await.unwrap();
        assert_eq!(chart.len(), 19);

        let cash = &chart["1100"];
        let err = manager.delete_account(&cash.id).await.unwrap_err();
        assert_eq!(err.code(), "protected_account");
    }

    #[tokio::test]
    async fn test_soft_delete_hides_account_and_frees_code() {
        let mut manager = AccountManager::new(MemoryStorage::new());
        let petty = manager
            .create_account(NewAccount::new("1110", "Kas Kecil", AccountType::Asset))
            .await
            .unwrap();

        manager.delete_account(&petty.id).await.unwrap();
        assert!(manager.get_account(&petty.id).await.unwrap().is_none());
        assert!(manager.list_accounts().await.unwrap().is_empty());

        manager
            .create_account(NewAccount::new("1110", "Kas Kecil Baru", AccountType::Asset))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_parent_with_children_cannot_be_deleted() {
        let mut manager = AccountManager::new(MemoryStorage::new());
        let parent = manager
            .create_account(NewAccount::new("5000", "Beban", AccountType::Expense))
            .await
            .unwrap();
        manager
            .create_account(NewAccount::new("5300", "Beban Sewa", AccountType::Expense).parent(&parent.id))
            .await
            .unwrap();

        assert!(manager.delete_account(&parent.id).await.is_err());
    }
}
