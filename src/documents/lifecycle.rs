//! Invoice and bill lifecycle: draft → sent/received → partial → paid, overdue, cancelled

use bigdecimal::BigDecimal;
use chrono::{Days, NaiveDate};
use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::documents::{ContactManager, Document, DocumentLine, DocumentStatus};
use crate::ledger::{ensure_period_open, finish, JournalEntryBuilder, JournalManager};
use crate::scheduler::{PaymentReminder, ReminderStatus};
use crate::tax::{DocumentTotals, PpnRate};
use crate::traits::*;
use crate::types::*;
use crate::utils::notifier::dispatch;

/// Parameters for a new draft document
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub kind: DocumentKind,
    pub contact_id: String,
    pub issue_date: NaiveDate,
    /// Defaults to the issue date plus the contact's payment terms
    pub due_date: Option<NaiveDate>,
    pub lines: Vec<DocumentLine>,
    /// Defaults to the configured PPN rate
    pub tax_rate: Option<BigDecimal>,
    pub discount_amount: BigDecimal,
    pub notes: Option<String>,
    pub template_id: Option<String>,
}

impl NewDocument {
    pub fn new(
        kind: DocumentKind,
        contact_id: impl Into<String>,
        issue_date: NaiveDate,
        lines: Vec<DocumentLine>,
    ) -> Self {
        Self {
            kind,
            contact_id: contact_id.into(),
            issue_date,
            due_date: None,
            lines,
            tax_rate: None,
            discount_amount: BigDecimal::from(0),
            notes: None,
            template_id: None,
        }
    }

    pub fn invoice(contact_id: impl Into<String>, issue_date: NaiveDate, lines: Vec<DocumentLine>) -> Self {
        Self::new(DocumentKind::Invoice, contact_id, issue_date, lines)
    }

    pub fn bill(contact_id: impl Into<String>, issue_date: NaiveDate, lines: Vec<DocumentLine>) -> Self {
        Self::new(DocumentKind::Bill, contact_id, issue_date, lines)
    }

    pub fn due_on(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn tax_rate(mut self, rate: BigDecimal) -> Self {
        self.tax_rate = Some(rate);
        self
    }

    pub fn discount(mut self, amount: BigDecimal) -> Self {
        self.discount_amount = amount;
        self
    }
}

/// Changes applied to a draft; `None` keeps the current value
#[derive(Debug, Clone, Default)]
pub struct DraftChanges {
    pub lines: Option<Vec<DocumentLine>>,
    pub tax_rate: Option<BigDecimal>,
    pub discount_amount: Option<BigDecimal>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Drives documents through their lifecycle and posts them to the ledger
pub struct DocumentEngine<S: AccountingStorage> {
    storage: S,
    journal: JournalManager<S>,
    contacts: ContactManager<S>,
    config: Arc<LedgerConfig>,
    features: Arc<dyn FeatureManager>,
    notifier: Arc<dyn Notifier>,
}

impl<S: AccountingStorage> DocumentEngine<S> {
    pub fn new(
        storage: S,
        config: Arc<LedgerConfig>,
        features: Arc<dyn FeatureManager>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            journal: JournalManager::new(storage.joined()).with_numbering(config.numbering.clone()),
            contacts: ContactManager::new(storage.joined()),
            storage,
            config,
            features,
            notifier,
        }
    }

    /// Create a draft with computed totals and a sequential number
    pub async fn create_draft(&mut self, params: NewDocument) -> LedgerResult<Document> {
        self.storage.begin().await?;
        let result = self.create_draft_inner(params).await;
        finish(&mut self.storage, result).await
    }

    async fn create_draft_inner(&mut self, params: NewDocument) -> LedgerResult<Document> {
        let contact = self.contacts.get_contact_required(&params.contact_id).await?;
        if !contact.contact_type.accepts(params.kind) {
            return Err(LedgerError::Validation(format!(
                "Contact '{}' cannot be used on a {}",
                contact.name, params.kind
            )));
        }

        let due_date = match params.due_date {
            Some(date) => date,
            None => params
                .issue_date
                .checked_add_days(Days::new(u64::from(contact.payment_terms_days)))
                .ok_or_else(|| LedgerError::Validation("Due date out of range".to_string()))?,
        };
        if due_date < params.issue_date {
            return Err(LedgerError::Validation(format!(
                "Due date {} is before issue date {}",
                due_date, params.issue_date
            )));
        }

        let (sequence_key, prefix) = match params.kind {
            DocumentKind::Invoice => ("invoice", &self.config.numbering.invoice_prefix),
            DocumentKind::Bill => ("bill", &self.config.numbering.bill_prefix),
        };
        let sequence = self.storage.next_sequence(sequence_key).await?;
        let number = self.config.numbering.format(prefix, sequence);

        let now = chrono::Utc::now().naive_utc();
        let zero = BigDecimal::from(0);
        let mut document = Document {
            id: uuid::Uuid::new_v4().to_string(),
            kind: params.kind,
            number,
            contact_id: contact.id,
            issue_date: params.issue_date,
            due_date,
            lines: params.lines,
            subtotal: zero.clone(),
            tax_rate: params
                .tax_rate
                .unwrap_or_else(|| self.config.default_tax_rate.clone()),
            tax_amount: zero.clone(),
            discount_amount: params.discount_amount,
            total_amount: zero.clone(),
            paid_amount: zero,
            status: DocumentStatus::Draft,
            journal_entry_id: None,
            template_id: params.template_id,
            notes: params.notes,
            version: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        apply_totals(&mut document)?;

        self.storage.save_document(&document).await?;
        tracing::debug!(number = %document.number, total = %document.total_amount, "draft created");
        Ok(document)
    }

    /// Edit a draft and recompute its totals
    pub async fn update_draft(
        &mut self,
        reference: &DocumentRef,
        changes: DraftChanges,
    ) -> LedgerResult<Document> {
        let mut document = self.get_document_required(reference).await?;
        ensure_status(&document, &[DocumentStatus::Draft], "edited")?;

        if let Some(lines) = changes.lines {
            document.lines = lines;
        }
        if let Some(rate) = changes.tax_rate {
            document.tax_rate = rate;
        }
        if let Some(discount) = changes.discount_amount {
            document.discount_amount = discount;
        }
        if let Some(due_date) = changes.due_date {
            if due_date < document.issue_date {
                return Err(LedgerError::Validation(format!(
                    "Due date {} is before issue date {}",
                    due_date, document.issue_date
                )));
            }
            document.due_date = due_date;
        }
        if changes.notes.is_some() {
            document.notes = changes.notes;
        }
        apply_totals(&mut document)?;
        document.updated_at = chrono::Utc::now().naive_utc();

        self.storage.update_document(&mut document).await?;
        Ok(document)
    }

    /// Soft-delete a draft
    pub async fn delete_draft(&mut self, reference: &DocumentRef) -> LedgerResult<()> {
        let mut document = self.get_document_required(reference).await?;
        ensure_status(&document, &[DocumentStatus::Draft], "deleted")?;
        document.deleted_at = Some(chrono::Utc::now().naive_utc());
        self.storage.update_document(&mut document).await
    }

    /// Post a draft: record its journal entry and issue it
    pub async fn post(&mut self, reference: &DocumentRef) -> LedgerResult<Document> {
        self.storage.begin().await?;
        let result = self.post_inner(reference).await;
        let (document, warning) = finish(&mut self.storage, result).await?;

        if let Some(notification) = warning {
            tracing::warn!(number = %document.number, "credit limit exceeded");
            if let Err(err) = dispatch(
                self.notifier.as_ref(),
                &self.config.notification_channels,
                &notification,
            )
            .await
            {
                tracing::warn!(number = %document.number, error = %err, "credit limit warning not delivered");
            }
        }
        Ok(document)
    }

    async fn post_inner(
        &mut self,
        reference: &DocumentRef,
    ) -> LedgerResult<(Document, Option<Notification>)> {
        let mut document = self.get_document_required(reference).await?;
        ensure_status(&document, &[DocumentStatus::Draft], "posted")?;
        document.check_invariants()?;
        ensure_period_open(&self.storage, document.issue_date).await?;

        let warning = match document.kind {
            DocumentKind::Invoice => self.check_credit_limit(&document).await?,
            DocumentKind::Bill => None,
        };

        let entry = self.build_entry(&document).await?;
        let entry = self.journal.create_entry(entry).await?;
        let entry = self.journal.post_entry(&entry.id).await?;

        document.journal_entry_id = Some(entry.id.clone());
        document.status = DocumentStatus::issued(document.kind);
        document.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_document(&mut document).await?;

        if document.kind == DocumentKind::Invoice
            && self.features.is_enabled(Feature::PaymentReminders)
        {
            self.schedule_reminders(&document).await?;
        }

        tracing::info!(
            number = %document.number,
            entry = %entry.entry_number,
            total = %document.total_amount,
            "document posted"
        );
        Ok((document, warning))
    }

    /// Cancel a draft or an unpaid issued document; a posted entry is reversed on `date`
    pub async fn cancel(&mut self, reference: &DocumentRef, date: NaiveDate) -> LedgerResult<Document> {
        self.storage.begin().await?;
        let result = self.cancel_inner(reference, date).await;
        finish(&mut self.storage, result).await
    }

    async fn cancel_inner(&mut self, reference: &DocumentRef, date: NaiveDate) -> LedgerResult<Document> {
        let mut document = self.get_document_required(reference).await?;
        ensure_status(
            &document,
            &[
                DocumentStatus::Draft,
                DocumentStatus::Sent,
                DocumentStatus::Received,
            ],
            "cancelled",
        )?;
        if document.paid_amount != BigDecimal::from(0) {
            return Err(LedgerError::InvalidTransition(format!(
                "{} {} has payments and cannot be cancelled",
                document.kind, document.number
            )));
        }

        if let Some(entry_id) = document.journal_entry_id.clone() {
            self.journal.reverse_entry(&entry_id, Some(date)).await?;
        }

        let reminders = self.storage.list_reminders().await?;
        for mut reminder in reminders
            .into_iter()
            .filter(|r| r.remindable == *reference && r.status == ReminderStatus::Pending)
        {
            reminder.status = ReminderStatus::Cancelled;
            self.storage.update_reminder(&reminder).await?;
        }

        document.status = DocumentStatus::Cancelled;
        document.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_document(&mut document).await?;
        tracing::info!(number = %document.number, "document cancelled");
        Ok(document)
    }

    pub async fn get_document_required(&self, reference: &DocumentRef) -> LedgerResult<Document> {
        self.storage
            .get_document(reference)
            .await?
            .ok_or_else(|| LedgerError::DocumentNotFound(reference.id.clone()))
    }

    pub async fn list_documents(
        &self,
        kind: Option<DocumentKind>,
        status: Option<DocumentStatus>,
    ) -> LedgerResult<Vec<Document>> {
        self.storage.list_documents(kind, status).await
    }

    /// Entry recorded when the document was posted
    pub async fn journal_entry_for(&self, reference: &DocumentRef) -> LedgerResult<Option<JournalEntry>> {
        let document = self.get_document_required(reference).await?;
        match document.journal_entry_id {
            Some(id) => self.journal.get_entry(&id).await,
            None => Ok(None),
        }
    }

    async fn check_credit_limit(&self, document: &Document) -> LedgerResult<Option<Notification>> {
        let contact = self.contacts.get_contact_required(&document.contact_id).await?;
        let Some(limit) = contact.credit_limit else {
            return Ok(None);
        };

        let open = self
            .contacts
            .open_balance(&contact.id, DocumentKind::Invoice)
            .await?;
        let exposure = open + &document.total_amount;
        if exposure <= limit {
            return Ok(None);
        }

        if self.features.is_enabled(Feature::CreditLimitEnforcement) {
            return Err(LedgerError::CreditLimitExceeded {
                contact_id: contact.id,
                limit,
                exposure,
            });
        }
        Ok(Some(Notification::CreditLimitWarning {
            document: document.reference(),
            contact_id: contact.id,
            limit,
            exposure,
        }))
    }

    async fn schedule_reminders(&mut self, document: &Document) -> LedgerResult<()> {
        for offset in &self.config.reminder_offsets_days {
            let Some(date) = offset_date(document.due_date, *offset) else {
                continue;
            };
            if date < document.issue_date {
                continue;
            }
            let reminder = PaymentReminder::new(document.reference(), date);
            self.storage.save_reminder(&reminder).await?;
        }
        Ok(())
    }

    async fn account_id(&self, code: &str) -> LedgerResult<String> {
        self.storage
            .find_account_by_code(code)
            .await?
            .map(|a| a.id)
            .ok_or_else(|| LedgerError::AccountNotFound(code.to_string()))
    }

    /// Balanced entry for a document:
    /// invoice Dr receivable + sales discount / Cr revenue lines + PPN output,
    /// bill Dr expense lines + PPN input / Cr payable + purchase discount.
    async fn build_entry(&self, document: &Document) -> LedgerResult<JournalEntry> {
        let accounts = &self.config.accounts;
        let description = format!("{} {}", document.kind, document.number);
        let builder = JournalEntryBuilder::new(document.issue_date, description)
            .reference(document.number.clone())
            .source(SourceRef::from(&document.reference()));

        let entry = match document.kind {
            DocumentKind::Invoice => {
                let default_revenue = self.account_id(&accounts.sales_revenue).await?;
                let mut builder = builder
                    .debit(
                        self.account_id(&accounts.receivable).await?,
                        document.total_amount.clone(),
                        Some("Piutang usaha".to_string()),
                    )
                    .debit(
                        self.account_id(&accounts.sales_discount).await?,
                        document.discount_amount.clone(),
                        Some("Potongan penjualan".to_string()),
                    );
                for (account_id, amount) in group_lines(&document.lines, &default_revenue) {
                    builder = builder.credit(account_id, amount, None);
                }
                builder
                    .credit(
                        self.account_id(&accounts.ppn_output).await?,
                        document.tax_amount.clone(),
                        Some("PPN keluaran".to_string()),
                    )
                    .build()?
            }
            DocumentKind::Bill => {
                let default_expense = self.account_id(&accounts.purchase_expense).await?;
                let mut builder = builder;
                for (account_id, amount) in group_lines(&document.lines, &default_expense) {
                    builder = builder.debit(account_id, amount, None);
                }
                builder
                    .debit(
                        self.account_id(&accounts.ppn_input).await?,
                        document.tax_amount.clone(),
                        Some("PPN masukan".to_string()),
                    )
                    .credit(
                        self.account_id(&accounts.payable).await?,
                        document.total_amount.clone(),
                        Some("Utang usaha".to_string()),
                    )
                    .credit(
                        self.account_id(&accounts.purchase_discount).await?,
                        document.discount_amount.clone(),
                        Some("Potongan pembelian".to_string()),
                    )
                    .build()?
            }
        };
        Ok(entry)
    }
}

fn ensure_status(document: &Document, allowed: &[DocumentStatus], action: &str) -> LedgerResult<()> {
    if allowed.contains(&document.status) {
        Ok(())
    } else {
        Err(LedgerError::InvalidTransition(format!(
            "{} {} is {:?} and cannot be {}",
            document.kind, document.number, document.status, action
        )))
    }
}

fn apply_totals(document: &mut Document) -> LedgerResult<()> {
    let rate = PpnRate::new(document.tax_rate.clone())?;
    let totals = DocumentTotals::compute(&document.lines, &rate, &document.discount_amount)?;
    if totals.total_amount <= BigDecimal::from(0) {
        return Err(LedgerError::Validation(
            "Document total must be positive".to_string(),
        ));
    }
    document.subtotal = totals.subtotal;
    document.tax_amount = totals.tax_amount;
    document.discount_amount = totals.discount_amount;
    document.total_amount = totals.total_amount;
    Ok(())
}

/// Sum line amounts per account, keeping first-seen order
fn group_lines(lines: &[DocumentLine], default_account: &str) -> Vec<(String, BigDecimal)> {
    let mut grouped: Vec<(String, BigDecimal)> = Vec::new();
    for line in lines {
        let account = line.account_id.as_deref().unwrap_or(default_account);
        match grouped.iter_mut().find(|(id, _)| id == account) {
            Some((_, amount)) => *amount += line.amount(),
            None => grouped.push((account.to_string(), line.amount())),
        }
    }
    grouped
}

pub(crate) fn offset_date(date: NaiveDate, offset_days: i64) -> Option<NaiveDate> {
    if offset_days >= 0 {
        date.checked_add_days(Days::new(offset_days.unsigned_abs()))
    } else {
        date.checked_sub_days(Days::new(offset_days.unsigned_abs()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{Contact, ContactType};
    use crate::ledger::{AccountManager, PeriodManager};
    use crate::utils::memory_storage::MemoryStorage;
    use crate::utils::notifier::RecordingNotifier;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    struct Fixture {
        storage: MemoryStorage,
        engine: DocumentEngine<MemoryStorage>,
        notifier: RecordingNotifier,
        customer: Contact,
        supplier: Contact,
    }

    async fn fixture(config: LedgerConfig) -> Fixture {
        let storage = MemoryStorage::new();
        let mut accounts = AccountManager::new(storage.clone());
        crate::ledger::account::utils::create_standard_chart(&mut accounts)
            .await
            .unwrap();

        let mut contacts = ContactManager::new(storage.clone());
        let mut customer = Contact::new("PT Matahari Energi", ContactType::Customer);
        customer.credit_limit = Some(BigDecimal::from(2_000_000));
        let customer = contacts.create_contact(customer).await.unwrap();
        let supplier = contacts
            .create_contact(Contact::new("CV Panel Nusantara", ContactType::Supplier))
            .await
            .unwrap();

        let notifier = RecordingNotifier::new();
        let config = Arc::new(config);
        let engine = DocumentEngine::new(
            storage.clone(),
            config.clone(),
            Arc::new(config.features.clone()),
            Arc::new(notifier.clone()),
        );
        Fixture {
            storage,
            engine,
            notifier,
            customer,
            supplier,
        }
    }

    fn service_line(amount: i64) -> Vec<DocumentLine> {
        vec![DocumentLine::new(
            "Instalasi PLTS atap",
            BigDecimal::from(1),
            BigDecimal::from(amount),
        )]
    }

    #[tokio::test]
    async fn test_invoice_posting_creates_balanced_entry() {
        let mut f = fixture(LedgerConfig::default()).await;
        let draft = f
            .engine
            .create_draft(NewDocument::invoice(&f.customer.id, d(1, 10), service_line(1_000_000)))
            .await
            .unwrap();
        assert_eq!(draft.number, "INV-000001");
        assert_eq!(draft.tax_amount, BigDecimal::from(110_000));
        assert_eq!(draft.total_amount, BigDecimal::from(1_110_000));
        assert_eq!(draft.due_date, d(2, 9));

        let posted = f.engine.post(&draft.reference()).await.unwrap();
        assert_eq!(posted.status, DocumentStatus::Sent);

        let entry = f
            .engine
            .journal_entry_for(&draft.reference())
            .await
            .unwrap()
            .unwrap();
        assert!(entry.is_posted);
        assert!(entry.is_balanced());
        assert_eq!(entry.total_debits(), BigDecimal::from(1_110_000));

        let again = f.engine.post(&draft.reference()).await;
        assert!(matches!(again, Err(LedgerError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_bill_with_discount_posts_net_of_tax() {
        let mut f = fixture(LedgerConfig::default()).await;
        let bill = f
            .engine
            .create_draft(
                NewDocument::bill(&f.supplier.id, d(1, 5), service_line(2_000_000))
                    .discount(BigDecimal::from(200_000)),
            )
            .await
            .unwrap();
        assert_eq!(bill.tax_amount, BigDecimal::from(198_000));
        assert_eq!(bill.total_amount, BigDecimal::from(1_998_000));

        let posted = f.engine.post(&bill.reference()).await.unwrap();
        assert_eq!(posted.status, DocumentStatus::Received);

        let entry = f
            .engine
            .journal_entry_for(&bill.reference())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.lines.len(), 4);
        assert_eq!(entry.total_debits(), BigDecimal::from(2_198_000));
        assert!(entry.is_balanced());
    }

    #[tokio::test]
    async fn test_wrong_contact_role_is_rejected() {
        let mut f = fixture(LedgerConfig::default()).await;
        let result = f
            .engine
            .create_draft(NewDocument::bill(&f.customer.id, d(1, 5), service_line(100)))
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_posting_into_closed_period_fails_and_keeps_draft() {
        let mut f = fixture(LedgerConfig::default()).await;
        let mut periods = PeriodManager::new(f.storage.clone());
        let january = periods
            .create_period("Januari 2024".into(), d(1, 1), d(1, 31))
            .await
            .unwrap();

        let draft = f
            .engine
            .create_draft(NewDocument::invoice(&f.customer.id, d(1, 20), service_line(500_000)))
            .await
            .unwrap();
        periods.close_period(&january.id).await.unwrap();

        let err = f.engine.post(&draft.reference()).await.unwrap_err();
        assert_eq!(err.code(), "fiscal_period_closed");

        let reloaded = f.engine.get_document_required(&draft.reference()).await.unwrap();
        assert_eq!(reloaded.status, DocumentStatus::Draft);
        assert!(reloaded.journal_entry_id.is_none());
        assert!(f.storage.list_journal_entries(None, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credit_limit_warning_and_enforcement() {
        let mut f = fixture(LedgerConfig::default()).await;
        let big = f
            .engine
            .create_draft(NewDocument::invoice(&f.customer.id, d(1, 10), service_line(3_000_000)))
            .await
            .unwrap();
        f.engine.post(&big.reference()).await.unwrap();
        assert!(f
            .notifier
            .sent()
            .iter()
            .any(|(_, n)| matches!(n, Notification::CreditLimitWarning { .. })));

        let mut config = LedgerConfig::default();
        config.features.credit_limit_enforcement = true;
        let mut f = fixture(config).await;
        let big = f
            .engine
            .create_draft(NewDocument::invoice(&f.customer.id, d(1, 10), service_line(3_000_000)))
            .await
            .unwrap();
        let err = f.engine.post(&big.reference()).await.unwrap_err();
        assert_eq!(err.code(), "credit_limit_exceeded");
    }

    #[tokio::test]
    async fn test_cancel_reverses_posted_entry() {
        let mut f = fixture(LedgerConfig::default()).await;
        let draft = f
            .engine
            .create_draft(NewDocument::invoice(&f.customer.id, d(1, 10), service_line(100_000)))
            .await
            .unwrap();
        let posted = f.engine.post(&draft.reference()).await.unwrap();

        let cancelled = f.engine.cancel(&draft.reference(), d(1, 12)).await.unwrap();
        assert_eq!(cancelled.status, DocumentStatus::Cancelled);

        let entry_id = posted.journal_entry_id.unwrap();
        let entry = f.storage.get_journal_entry(&entry_id).await.unwrap().unwrap();
        assert!(entry.is_reversed);

        let reminders = f.storage.list_reminders().await.unwrap();
        assert!(!reminders.is_empty());
        assert!(reminders.iter().all(|r| r.status == ReminderStatus::Cancelled));

        let again = f.engine.cancel(&draft.reference(), d(1, 12)).await;
        assert!(matches!(again, Err(LedgerError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_update_and_delete_draft() {
        let mut f = fixture(LedgerConfig::default()).await;
        let draft = f
            .engine
            .create_draft(NewDocument::invoice(&f.customer.id, d(1, 10), service_line(100_000)))
            .await
            .unwrap();

        let updated = f
            .engine
            .update_draft(
                &draft.reference(),
                DraftChanges {
                    tax_rate: Some(BigDecimal::from(0)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.total_amount, BigDecimal::from(100_000));

        f.engine.delete_draft(&draft.reference()).await.unwrap();
        assert!(matches!(
            f.engine.get_document_required(&draft.reference()).await,
            Err(LedgerError::DocumentNotFound(_))
        ));
    }
}
