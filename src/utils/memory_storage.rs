//! In-memory storage implementation for testing

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::documents::{Contact, Document, DocumentStatus, Payment};
use crate::ledger::FiscalPeriod;
use crate::reconciliation::BankTransaction;
use crate::scheduler::{PaymentReminder, RecurringTemplate};
use crate::traits::*;
use crate::types::*;

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: HashMap<String, Account>,
    entries: HashMap<String, JournalEntry>,
    periods: HashMap<String, FiscalPeriod>,
    contacts: HashMap<String, Contact>,
    documents: HashMap<DocumentRef, Document>,
    payments: HashMap<String, Payment>,
    templates: HashMap<String, RecurringTemplate>,
    reminders: HashMap<String, PaymentReminder>,
    bank_transactions: HashMap<String, BankTransaction>,
    sequences: HashMap<String, u64>,
}

#[derive(Debug, Clone)]
enum Row {
    Account(Account),
    Entry(JournalEntry),
    Period(FiscalPeriod),
    Contact(Contact),
    Document(Document),
    Payment(Payment),
    Template(RecurringTemplate),
    Reminder(PaymentReminder),
    BankTransaction(BankTransaction),
}

impl Row {
    /// Version carried by optimistically locked rows
    fn version(&self) -> Option<u64> {
        match self {
            Row::Entry(entry) => Some(entry.version),
            Row::Document(document) => Some(document.version),
            Row::Payment(payment) => Some(payment.version),
            _ => None,
        }
    }

    fn not_found(&self) -> LedgerError {
        match self {
            Row::Account(a) => LedgerError::AccountNotFound(a.id.clone()),
            Row::Entry(e) => LedgerError::EntryNotFound(e.id.clone()),
            Row::Period(p) => LedgerError::FiscalPeriodNotFound(p.id.clone()),
            Row::Contact(c) => LedgerError::ContactNotFound(c.id.clone()),
            Row::Document(d) => LedgerError::DocumentNotFound(d.id.clone()),
            Row::Payment(p) => LedgerError::PaymentNotFound(p.id.clone()),
            Row::Template(t) => LedgerError::TemplateNotFound(t.id.clone()),
            Row::Reminder(r) => LedgerError::ReminderNotFound(r.id.clone()),
            Row::BankTransaction(t) => LedgerError::BankTransactionNotFound(t.id.clone()),
        }
    }

    fn conflict(&self) -> LedgerError {
        let (entity, id) = match self {
            Row::Entry(e) => ("journal entry", &e.id),
            Row::Document(d) => ("document", &d.id),
            Row::Payment(p) => ("payment", &p.id),
            Row::Account(a) => ("account", &a.id),
            Row::Period(p) => ("fiscal period", &p.id),
            Row::Contact(c) => ("contact", &c.id),
            Row::Template(t) => ("recurring template", &t.id),
            Row::Reminder(r) => ("payment reminder", &r.id),
            Row::BankTransaction(t) => ("bank transaction", &t.id),
        };
        LedgerError::ConcurrentModification {
            entity,
            id: id.clone(),
        }
    }
}

/// A write recorded by a unit of work and replayed on commit
#[derive(Debug, Clone)]
enum Change {
    Put(Row),
    /// The row must exist; versioned rows must be exactly one version ahead
    Update(Row),
    RemoveEntry(String),
}

impl MemoryState {
    /// Version of the live row `row` would replace, 0 for unversioned rows
    fn stored_version(&self, row: &Row) -> Option<u64> {
        match row {
            Row::Account(a) => self
                .accounts
                .get(&a.id)
                .filter(|stored| !stored.is_deleted())
                .map(|_| 0),
            Row::Entry(e) => self.entries.get(&e.id).map(|stored| stored.version),
            Row::Period(p) => self.periods.get(&p.id).map(|_| 0),
            Row::Contact(c) => self
                .contacts
                .get(&c.id)
                .filter(|stored| stored.deleted_at.is_none())
                .map(|_| 0),
            Row::Document(d) => self
                .documents
                .get(&d.reference())
                .filter(|stored| stored.deleted_at.is_none())
                .map(|stored| stored.version),
            Row::Payment(p) => self.payments.get(&p.id).map(|stored| stored.version),
            Row::Template(t) => self.templates.get(&t.id).map(|_| 0),
            Row::Reminder(r) => self.reminders.get(&r.id).map(|_| 0),
            Row::BankTransaction(t) => self.bank_transactions.get(&t.id).map(|_| 0),
        }
    }

    fn put(&mut self, row: Row) {
        match row {
            Row::Account(a) => {
                self.accounts.insert(a.id.clone(), a);
            }
            Row::Entry(e) => {
                self.entries.insert(e.id.clone(), e);
            }
            Row::Period(p) => {
                self.periods.insert(p.id.clone(), p);
            }
            Row::Contact(c) => {
                self.contacts.insert(c.id.clone(), c);
            }
            Row::Document(d) => {
                self.documents.insert(d.reference(), d);
            }
            Row::Payment(p) => {
                self.payments.insert(p.id.clone(), p);
            }
            Row::Template(t) => {
                self.templates.insert(t.id.clone(), t);
            }
            Row::Reminder(r) => {
                self.reminders.insert(r.id.clone(), r);
            }
            Row::BankTransaction(t) => {
                self.bank_transactions.insert(t.id.clone(), t);
            }
        }
    }

    fn apply(&mut self, change: Change) -> LedgerResult<()> {
        match change {
            Change::Put(row) => self.put(row),
            Change::Update(row) => {
                let stored = self.stored_version(&row).ok_or_else(|| row.not_found())?;
                if let Some(version) = row.version() {
                    if version != stored + 1 {
                        return Err(row.conflict());
                    }
                }
                self.put(row);
            }
            Change::RemoveEntry(id) => {
                if self.entries.remove(&id).is_none() {
                    return Err(LedgerError::EntryNotFound(id));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct UnitOfWork {
    depth: usize,
    /// Committed data as of the outermost `begin` plus this unit's own writes
    working: Option<MemoryState>,
    changes: Vec<Change>,
    /// Sequence values handed out inside this unit
    sequences: Vec<(String, u64)>,
}

/// In-memory storage implementation for testing and development.
///
/// Clones share the data but not the unit of work: each clone is an independent caller
/// whose uncommitted writes stay private until `commit`, which replays them onto the shared
/// data and fails with `ConcurrentModification` when a versioned row moved underneath it.
/// Use [`LedgerStorage::joined`] for a handle that takes part in the same unit of work.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
    unit: Arc<Mutex<UnitOfWork>>,
}

impl Clone for MemoryStorage {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            unit: Arc::default(),
        }
    }
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a unit of work is open on this handle
    pub fn in_transaction(&self) -> bool {
        self.unit.lock().map(|unit| unit.depth > 0).unwrap_or(false)
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }

    fn unit(&self) -> LedgerResult<MutexGuard<'_, UnitOfWork>> {
        self.unit
            .lock()
            .map_err(|_| LedgerError::Storage("transaction lock poisoned".to_string()))
    }

    /// Read through the open unit of work, or the shared data outside one
    fn view<T>(&self, f: impl FnOnce(&MemoryState) -> T) -> LedgerResult<T> {
        {
            let unit = self.unit()?;
            if let Some(working) = &unit.working {
                return Ok(f(working));
            }
        }
        let state = self.read()?;
        Ok(f(&state))
    }

    fn record(&self, change: Change) -> LedgerResult<()> {
        {
            let mut guard = self.unit()?;
            let unit = &mut *guard;
            if let Some(working) = unit.working.as_mut() {
                working.apply(change.clone())?;
                unit.changes.push(change);
                return Ok(());
            }
        }
        self.write()?.apply(change)
    }

    /// Hand back numbers nobody has drawn past, newest first
    fn release_sequences(&self, sequences: Vec<(String, u64)>) -> LedgerResult<()> {
        if sequences.is_empty() {
            return Ok(());
        }
        let mut state = self.write()?;
        for (key, value) in sequences.into_iter().rev() {
            if let Some(counter) = state.sequences.get_mut(&key) {
                if *counter == value {
                    *counter -= 1;
                }
            }
        }
        Ok(())
    }
}

fn in_range(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.is_none_or(|s| date >= s) && end.is_none_or(|e| date <= e)
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn begin(&mut self) -> LedgerResult<()> {
        let mut unit = self.unit()?;
        if unit.depth == 0 {
            unit.working = Some(self.read()?.clone());
        }
        unit.depth += 1;
        Ok(())
    }

    async fn commit(&mut self) -> LedgerResult<()> {
        let finished = {
            let mut unit = self.unit()?;
            let depth = unit.depth;
            match depth {
                0 => return Ok(()),
                1 => std::mem::take(&mut *unit),
                _ => {
                    unit.depth -= 1;
                    return Ok(());
                }
            }
        };

        let replayed = {
            let mut state = self.write()?;
            let mut next = state.clone();
            let result = finished
                .changes
                .into_iter()
                .try_for_each(|change| next.apply(change));
            if result.is_ok() {
                *state = next;
            }
            result
        };
        if let Err(err) = replayed {
            tracing::warn!(error = %err, "unit of work discarded on commit");
            self.release_sequences(finished.sequences)?;
            return Err(err);
        }
        Ok(())
    }

    async fn rollback(&mut self) -> LedgerResult<()> {
        let discarded = std::mem::take(&mut *self.unit()?);
        self.release_sequences(discarded.sequences)
    }

    fn joined(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            unit: Arc::clone(&self.unit),
        }
    }

    async fn next_sequence(&mut self, key: &str) -> LedgerResult<u64> {
        let value = {
            let mut state = self.write()?;
            let counter = state.sequences.entry(key.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };
        let mut unit = self.unit()?;
        if unit.depth > 0 {
            unit.sequences.push((key.to_string(), value));
        }
        Ok(value)
    }

    async fn save_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.record(Change::Put(Row::Account(account.clone())))
    }

    async fn get_account(&self, account_id: &str) -> LedgerResult<Option<Account>> {
        self.view(|s| {
            s.accounts
                .get(account_id)
                .filter(|a| !a.is_deleted())
                .cloned()
        })
    }

    async fn find_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        self.view(|s| {
            s.accounts
                .values()
                .find(|a| a.code == code && !a.is_deleted())
                .cloned()
        })
    }

    async fn list_accounts(&self, account_type: Option<AccountType>) -> LedgerResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self.view(|s| {
            s.accounts
                .values()
                .filter(|account| {
                    !account.is_deleted() && account_type.is_none_or(|t| account.account_type == t)
                })
                .cloned()
                .collect()
        })?;
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(accounts)
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        self.record(Change::Update(Row::Account(account.clone())))
    }

    async fn save_journal_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        self.record(Change::Put(Row::Entry(entry.clone())))
    }

    async fn get_journal_entry(&self, entry_id: &str) -> LedgerResult<Option<JournalEntry>> {
        self.view(|s| s.entries.get(entry_id).cloned())
    }

    async fn update_journal_entry(&mut self, entry: &mut JournalEntry) -> LedgerResult<()> {
        let mut next = entry.clone();
        next.version += 1;
        self.record(Change::Update(Row::Entry(next)))?;
        entry.version += 1;
        Ok(())
    }

    async fn delete_journal_entry(&mut self, entry_id: &str) -> LedgerResult<()> {
        self.record(Change::RemoveEntry(entry_id.to_string()))
    }

    async fn list_journal_entries(
        &self,
        start_date: Option<NaiveDate>,
        end_date: Option<NaiveDate>,
    ) -> LedgerResult<Vec<JournalEntry>> {
        let mut entries: Vec<JournalEntry> = self.view(|s| {
            s.entries
                .values()
                .filter(|e| in_range(e.entry_date, start_date, end_date))
                .cloned()
                .collect()
        })?;
        entries.sort_by(|a, b| {
            a.entry_date
                .cmp(&b.entry_date)
                .then_with(|| a.entry_number.cmp(&b.entry_number))
        });
        Ok(entries)
    }

    async fn save_fiscal_period(&mut self, period: &FiscalPeriod) -> LedgerResult<()> {
        self.record(Change::Put(Row::Period(period.clone())))
    }

    async fn get_fiscal_period(&self, period_id: &str) -> LedgerResult<Option<FiscalPeriod>> {
        self.view(|s| s.periods.get(period_id).cloned())
    }

    async fn list_fiscal_periods(&self) -> LedgerResult<Vec<FiscalPeriod>> {
        let mut periods: Vec<FiscalPeriod> = self.view(|s| s.periods.values().cloned().collect())?;
        periods.sort_by_key(|p| p.start_date);
        Ok(periods)
    }

    async fn update_fiscal_period(&mut self, period: &FiscalPeriod) -> LedgerResult<()> {
        self.record(Change::Update(Row::Period(period.clone())))
    }
}

#[async_trait]
impl DocumentStorage for MemoryStorage {
    async fn save_contact(&mut self, contact: &Contact) -> LedgerResult<()> {
        self.record(Change::Put(Row::Contact(contact.clone())))
    }

    async fn get_contact(&self, contact_id: &str) -> LedgerResult<Option<Contact>> {
        self.view(|s| {
            s.contacts
                .get(contact_id)
                .filter(|c| c.deleted_at.is_none())
                .cloned()
        })
    }

    async fn list_contacts(&self) -> LedgerResult<Vec<Contact>> {
        let mut contacts: Vec<Contact> = self.view(|s| {
            s.contacts
                .values()
                .filter(|c| c.deleted_at.is_none())
                .cloned()
                .collect()
        })?;
        contacts.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(contacts)
    }

    async fn update_contact(&mut self, contact: &Contact) -> LedgerResult<()> {
        self.record(Change::Update(Row::Contact(contact.clone())))
    }

    async fn save_document(&mut self, document: &Document) -> LedgerResult<()> {
        self.record(Change::Put(Row::Document(document.clone())))
    }

    async fn get_document(&self, reference: &DocumentRef) -> LedgerResult<Option<Document>> {
        self.view(|s| {
            s.documents
                .get(reference)
                .filter(|d| d.deleted_at.is_none())
                .cloned()
        })
    }

    async fn update_document(&mut self, document: &mut Document) -> LedgerResult<()> {
        let mut next = document.clone();
        next.version += 1;
        self.record(Change::Update(Row::Document(next)))?;
        document.version += 1;
        Ok(())
    }

    async fn list_documents(
        &self,
        kind: Option<DocumentKind>,
        status: Option<DocumentStatus>,
    ) -> LedgerResult<Vec<Document>> {
        let mut documents: Vec<Document> = self.view(|s| {
            s.documents
                .values()
                .filter(|d| {
                    d.deleted_at.is_none()
                        && kind.is_none_or(|k| d.kind == k)
                        && status.is_none_or(|st| d.status == st)
                })
                .cloned()
                .collect()
        })?;
        documents.sort_by(|a, b| {
            a.issue_date
                .cmp(&b.issue_date)
                .then_with(|| a.number.cmp(&b.number))
        });
        Ok(documents)
    }

    async fn save_payment(&mut self, payment: &Payment) -> LedgerResult<()> {
        self.record(Change::Put(Row::Payment(payment.clone())))
    }

    async fn get_payment(&self, payment_id: &str) -> LedgerResult<Option<Payment>> {
        self.view(|s| s.payments.get(payment_id).cloned())
    }

    async fn update_payment(&mut self, payment: &mut Payment) -> LedgerResult<()> {
        let mut next = payment.clone();
        next.version += 1;
        self.record(Change::Update(Row::Payment(next)))?;
        payment.version += 1;
        Ok(())
    }

    async fn list_payments_for(&self, reference: &DocumentRef) -> LedgerResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self.view(|s| {
            s.payments
                .values()
                .filter(|p| p.payable == *reference)
                .cloned()
                .collect()
        })?;
        payments.sort_by(|a, b| a.number.cmp(&b.number));
        Ok(payments)
    }

    async fn list_payments(&self) -> LedgerResult<Vec<Payment>> {
        let mut payments: Vec<Payment> = self.view(|s| s.payments.values().cloned().collect())?;
        payments.sort_by(|a, b| {
            a.payment_date
                .cmp(&b.payment_date)
                .then_with(|| a.number.cmp(&b.number))
        });
        Ok(payments)
    }

    async fn save_template(&mut self, template: &RecurringTemplate) -> LedgerResult<()> {
        self.record(Change::Put(Row::Template(template.clone())))
    }

    async fn get_template(&self, template_id: &str) -> LedgerResult<Option<RecurringTemplate>> {
        self.view(|s| s.templates.get(template_id).cloned())
    }

    async fn list_templates(&self) -> LedgerResult<Vec<RecurringTemplate>> {
        let mut templates: Vec<RecurringTemplate> =
            self.view(|s| s.templates.values().cloned().collect())?;
        templates.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(templates)
    }

    async fn update_template(&mut self, template: &RecurringTemplate) -> LedgerResult<()> {
        self.record(Change::Update(Row::Template(template.clone())))
    }

    async fn save_reminder(&mut self, reminder: &PaymentReminder) -> LedgerResult<()> {
        self.record(Change::Put(Row::Reminder(reminder.clone())))
    }

    async fn get_reminder(&self, reminder_id: &str) -> LedgerResult<Option<PaymentReminder>> {
        self.view(|s| s.reminders.get(reminder_id).cloned())
    }

    async fn list_reminders(&self) -> LedgerResult<Vec<PaymentReminder>> {
        let mut reminders: Vec<PaymentReminder> =
            self.view(|s| s.reminders.values().cloned().collect())?;
        reminders.sort_by(|a, b| {
            a.scheduled_date
                .cmp(&b.scheduled_date)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(reminders)
    }

    async fn update_reminder(&mut self, reminder: &PaymentReminder) -> LedgerResult<()> {
        self.record(Change::Update(Row::Reminder(reminder.clone())))
    }

    async fn save_bank_transaction(&mut self, transaction: &BankTransaction) -> LedgerResult<()> {
        self.record(Change::Put(Row::BankTransaction(transaction.clone())))
    }

    async fn get_bank_transaction(&self, transaction_id: &str) -> LedgerResult<Option<BankTransaction>> {
        self.view(|s| s.bank_transactions.get(transaction_id).cloned())
    }

    async fn list_bank_transactions(&self) -> LedgerResult<Vec<BankTransaction>> {
        let mut transactions: Vec<BankTransaction> =
            self.view(|s| s.bank_transactions.values().cloned().collect())?;
        transactions.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rollback_discards_the_whole_unit() {
        let mut storage = MemoryStorage::new();
        let kas = Account::new("1100".into(), "Kas".into(), AccountType::Asset, None);
        storage.save_account(&kas).await.unwrap();

        storage.begin().await.unwrap();
        let bank = Account::new("1110".into(), "Bank".into(), AccountType::Asset, None);
        storage.save_account(&bank).await.unwrap();

        // A joined handle takes part in the same unit of work.
        let mut nested = storage.joined();
        nested.begin().await.unwrap();
        assert_eq!(nested.next_sequence("invoice").await.unwrap(), 1);
        nested.commit().await.unwrap();
        assert!(storage.in_transaction());

        storage.rollback().await.unwrap();
        assert!(!storage.in_transaction());
        assert!(storage.get_account(&bank.id).await.unwrap().is_none());
        assert!(storage.get_account(&kas.id).await.unwrap().is_some());
        assert_eq!(storage.next_sequence("invoice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clones_keep_their_own_unit_of_work() {
        let mut storage = MemoryStorage::new();
        let mut other = storage.clone();

        other.begin().await.unwrap();
        let draft = Account::new("1120".into(), "Bank Mandiri".into(), AccountType::Asset, None);
        other.save_account(&draft).await.unwrap();
        assert!(storage.get_account(&draft.id).await.unwrap().is_none());

        storage.begin().await.unwrap();
        let kas = Account::new("1100".into(), "Kas".into(), AccountType::Asset, None);
        storage.save_account(&kas).await.unwrap();
        storage.commit().await.unwrap();
        assert!(!storage.in_transaction());

        other.rollback().await.unwrap();
        assert!(storage.get_account(&kas.id).await.unwrap().is_some());
        assert!(other.get_account(&draft.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conflicting_commit_is_rejected() {
        let mut storage = MemoryStorage::new();
        let mut entry = JournalEntry::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "Setoran".to_string(),
            None,
        );
        storage.save_journal_entry(&entry).await.unwrap();

        let mut other = storage.clone();
        other.begin().await.unwrap();
        let mut theirs = entry.clone();
        theirs.description = "Setoran modal".to_string();
        other.update_journal_entry(&mut theirs).await.unwrap();

        storage.update_journal_entry(&mut entry).await.unwrap();

        let err = other.commit().await.unwrap_err();
        assert_eq!(err.code(), "concurrent_modification");
        let stored = storage.get_journal_entry(&entry.id).await.unwrap().unwrap();
        assert_eq!(stored.description, "Setoran");
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn test_stale_version_is_rejected() {
        let mut storage = MemoryStorage::new();
        let mut entry = JournalEntry::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            "Setoran".to_string(),
            None,
        );
        storage.save_journal_entry(&entry).await.unwrap();

        let mut stale = entry.clone();
        storage.update_journal_entry(&mut entry).await.unwrap();
        assert_eq!(entry.version, 1);

        let err = storage.update_journal_entry(&mut stale).await.unwrap_err();
        assert_eq!(err.code(), "concurrent_modification");
        assert_eq!(stale.version, 0);
    }

    #[tokio::test]
    async fn test_soft_deleted_accounts_are_hidden() {
        let mut storage = MemoryStorage::new();
        let mut account = Account::new("5300".into(), "Beban Listrik".into(), AccountType::Expense, None);
        storage.save_account(&account).await.unwrap();

        account.deleted_at = Some(chrono::Utc::now().naive_utc());
        storage.update_account(&account).await.unwrap();

        assert!(storage.get_account(&account.id).await.unwrap().is_none());
        assert!(storage.find_account_by_code("5300").await.unwrap().is_none());
        assert!(storage.list_accounts(None).await.unwrap().is_empty());
        assert_eq!(
            storage.update_account(&account).await.unwrap_err().code(),
            "account_not_found"
        );
    }
}
