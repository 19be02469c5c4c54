//! Payment allocation and voiding

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::sync::Arc;

use crate::config::LedgerConfig;
use crate::documents::{Document, Payment, PaymentType};
use crate::ledger::{finish, JournalEntryBuilder, JournalManager};
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::validate_positive_amount;

const PAYMENT_SEQUENCE: &str = "payment";

/// Money received against an invoice or sent against a bill
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payable: DocumentRef,
    pub amount: BigDecimal,
    pub payment_date: NaiveDate,
    /// Cash or bank account id; the configured cash account when `None`
    pub cash_account_id: Option<String>,
    pub reference: Option<String>,
}

impl NewPayment {
    pub fn new(payable: DocumentRef, amount: BigDecimal, payment_date: NaiveDate) -> Self {
        Self {
            payable,
            amount,
            payment_date,
            cash_account_id: None,
            reference: None,
        }
    }

    pub fn into_account(mut self, cash_account_id: impl Into<String>) -> Self {
        self.cash_account_id = Some(cash_account_id.into());
        self
    }

    pub fn reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// A payment together with the document state it produced
#[derive(Debug, Clone)]
pub struct PaymentApplication {
    pub payment: Payment,
    pub document: Document,
}

pub struct PaymentAllocator<S: AccountingStorage> {
    storage: S,
    journal: JournalManager<S>,
    config: Arc<LedgerConfig>,
}

impl<S: AccountingStorage> PaymentAllocator<S> {
    pub fn new(storage: S, config: Arc<LedgerConfig>) -> Self {
        Self {
            journal: JournalManager::new(storage.joined()).with_numbering(config.numbering.clone()),
            storage,
            config,
        }
    }

    /// Apply a payment to an open document and record its cash entry
    pub async fn apply_payment(&mut self, params: NewPayment) -> LedgerResult<PaymentApplication> {
        validate_positive_amount(&params.amount)?;
        self.storage.begin().await?;
        let result = self.apply_payment_inner(params).await;
        finish(&mut self.storage, result).await
    }

    async fn apply_payment_inner(&mut self, params: NewPayment) -> LedgerResult<PaymentApplication> {
        let mut document = self.get_document_required(&params.payable).await?;
        if !document.is_posted() || !document.status.is_open() {
            return Err(LedgerError::InvalidTransition(format!(
                "{} {} is {:?} and cannot receive payments",
                document.kind, document.number, document.status
            )));
        }
        if params.payment_date < document.issue_date {
            return Err(LedgerError::Validation(format!(
                "Payment date {} is before issue date {}",
                params.payment_date, document.issue_date
            )));
        }
        let outstanding = document.outstanding();
        if params.amount > outstanding {
            return Err(LedgerError::Overpayment {
                outstanding,
                attempted: params.amount,
            });
        }

        let cash_account = self.cash_account(params.cash_account_id.as_deref()).await?;
        let payment_type = match document.kind {
            DocumentKind::Invoice => PaymentType::Receive,
            DocumentKind::Bill => PaymentType::Send,
        };

        let sequence = self.storage.next_sequence(PAYMENT_SEQUENCE).await?;
        let number = self
            .config
            .numbering
            .format(&self.config.numbering.payment_prefix, sequence);
        let payment_id = uuid::Uuid::new_v4().to_string();

        let builder = JournalEntryBuilder::new(
            params.payment_date,
            format!("Payment {} for {}", number, document.number),
        )
        .reference(number.clone())
        .source(SourceRef::payment(&payment_id));
        let entry = match payment_type {
            PaymentType::Receive => {
                let receivable = self.account_id(&self.config.accounts.receivable).await?;
                builder
                    .debit(&cash_account.id, params.amount.clone(), None)
                    .credit(receivable, params.amount.clone(), None)
                    .build()?
            }
            PaymentType::Send => {
                let payable = self.account_id(&self.config.accounts.payable).await?;
                builder
                    .debit(payable, params.amount.clone(), None)
                    .credit(&cash_account.id, params.amount.clone(), None)
                    .build()?
            }
        };
        let entry = self.journal.create_entry(entry).await?;
        let entry = self.journal.post_entry(&entry.id).await?;

        let payment = Payment {
            id: payment_id,
            number,
            payment_type,
            contact_id: document.contact_id.clone(),
            payable: params.payable,
            amount: params.amount,
            cash_account_id: cash_account.id,
            payment_date: params.payment_date,
            reference: params.reference,
            journal_entry_id: Some(entry.id),
            is_voided: false,
            voided_at: None,
            version: 0,
            created_at: chrono::Utc::now().naive_utc(),
        };
        self.storage.save_payment(&payment).await?;

        document.paid_amount += &payment.amount;
        document.status = document.settled_status(payment.payment_date);
        document.updated_at = chrono::Utc::now().naive_utc();
        document.check_invariants()?;
        self.storage.update_document(&mut document).await?;

        tracing::info!(
            payment = %payment.number,
            document = %document.number,
            amount = %payment.amount,
            status = ?document.status,
            "payment applied"
        );
        Ok(PaymentApplication { payment, document })
    }

    /// Void a payment: reverse its entry on `date` and restore the document balance
    pub async fn void_payment(
        &mut self,
        payment_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<PaymentApplication> {
        self.storage.begin().await?;
        let result = self.void_payment_inner(payment_id, date).await;
        finish(&mut self.storage, result).await
    }

    async fn void_payment_inner(
        &mut self,
        payment_id: &str,
        date: NaiveDate,
    ) -> LedgerResult<PaymentApplication> {
        let mut payment = self.get_payment_required(payment_id).await?;
        if payment.is_voided {
            return Err(LedgerError::PaymentAlreadyVoided(payment.number));
        }

        if let Some(entry_id) = payment.journal_entry_id.clone() {
            self.journal.reverse_entry(&entry_id, Some(date)).await?;
        }

        payment.is_voided = true;
        payment.voided_at = Some(date);
        self.storage.update_payment(&mut payment).await?;

        let mut document = self.get_document_required(&payment.payable).await?;
        document.paid_amount -= &payment.amount;
        document.status = document.settled_status(date);
        document.updated_at = chrono::Utc::now().naive_utc();
        document.check_invariants()?;
        self.storage.update_document(&mut document).await?;

        tracing::info!(
            payment = %payment.number,
            document = %document.number,
            status = ?document.status,
            "payment voided"
        );
        Ok(PaymentApplication { payment, document })
    }

    pub async fn get_payment_required(&self, payment_id: &str) -> LedgerResult<Payment> {
        self.storage
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| LedgerError::PaymentNotFound(payment_id.to_string()))
    }

    /// Payments made against a document, voided ones included
    pub async fn payments_for(&self, reference: &DocumentRef) -> LedgerResult<Vec<Payment>> {
        self.storage.list_payments_for(reference).await
    }

    async fn get_document_required(&self, reference: &DocumentRef) -> LedgerResult<Document> {
        self.storage
            .get_document(reference)
            .await?
            .ok_or_else(|| LedgerError::DocumentNotFound(reference.id.clone()))
    }

    async fn cash_account(&self, account_id: Option<&str>) -> LedgerResult<Account> {
        let account = match account_id {
            Some(id) => self.storage.get_account(id).await?,
            None => {
                self.storage
                    .find_account_by_code(&self.config.accounts.cash)
                    .await?
            }
        }
        .ok_or_else(|| {
            LedgerError::AccountNotFound(
                account_id.unwrap_or(&self.config.accounts.cash).to_string(),
            )
        })?;

        if account.account_type != AccountType::Asset {
            return Err(LedgerError::Validation(format!(
                "Payments must go through an asset account, '{}' is {:?}",
                account.code, account.account_type
            )));
        }
        Ok(account)
    }

    async fn account_id(&self, code: &str) -> LedgerResult<String> {
        self.storage
            .find_account_by_code(code)
            .await?
            .map(|a| a.id)
            .ok_or_else(|| LedgerError::AccountNotFound(code.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::{
        Contact, ContactManager, ContactType, DocumentEngine, DocumentLine, DocumentStatus,
        NewDocument,
    };
    use crate::ledger::AccountManager;
    use crate::utils::memory_storage::MemoryStorage;
    use crate::utils::notifier::RecordingNotifier;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    async fn posted_invoice(
        storage: &MemoryStorage,
        config: Arc<LedgerConfig>,
        amount: i64,
    ) -> Document {
        let mut accounts = AccountManager::new(storage.clone());
        crate::ledger::account::utils::create_standard_chart(&mut accounts)
            .await
            .unwrap();
        let customer = ContactManager::new(storage.clone())
            .create_contact(Contact::new("PT Cahaya Timur", ContactType::Customer))
            .await
            .unwrap();

        let mut engine = DocumentEngine::new(
            storage.clone(),
            config.clone(),
            Arc::new(config.features.clone()),
            Arc::new(RecordingNotifier::new()),
        );
        let lines = vec![DocumentLine::new(
            "Inverter 5kW",
            BigDecimal::from(1),
            BigDecimal::from(amount),
        )];
        let draft = engine
            .create_draft(NewDocument::invoice(&customer.id, d(3, 1), lines).due_on(d(3, 31)))
            .await
            .unwrap();
        engine.post(&draft.reference()).await.unwrap()
    }

    #[tokio::test]
    async fn test_partial_then_full_payment() {
        let storage = MemoryStorage::new();
        let config = Arc::new(LedgerConfig::default());
        let invoice = posted_invoice(&storage, config.clone(), 1_000_000).await;
        let mut allocator = PaymentAllocator::new(storage.clone(), config);

        let first = allocator
            .apply_payment(NewPayment::new(invoice.reference(), BigDecimal::from(500_000), d(3, 10)))
            .await
            .unwrap();
        assert_eq!(first.payment.number, "PAY-000001");
        assert_eq!(first.payment.payment_type, PaymentType::Receive);
        assert_eq!(first.document.status, DocumentStatus::Partial);

        let second = allocator
            .apply_payment(NewPayment::new(invoice.reference(), BigDecimal::from(610_000), d(3, 20)))
            .await
            .unwrap();
        assert_eq!(second.document.status, DocumentStatus::Paid);
        assert_eq!(second.document.paid_amount, BigDecimal::from(1_110_000));

        let closed = allocator
            .apply_payment(NewPayment::new(invoice.reference(), BigDecimal::from(1), d(3, 21)))
            .await;
        assert!(matches!(closed, Err(LedgerError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_overpayment_leaves_document_untouched() {
        let storage = MemoryStorage::new();
        let config = Arc::new(LedgerConfig::default());
        let invoice = posted_invoice(&storage, config.clone(), 1_000_000).await;
        let mut allocator = PaymentAllocator::new(storage.clone(), config);

        let err = allocator
            .apply_payment(NewPayment::new(invoice.reference(), BigDecimal::from(2_000_000), d(3, 10)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "overpayment");

        let reloaded = storage.get_document(&invoice.reference()).await.unwrap().unwrap();
        assert_eq!(reloaded.paid_amount, BigDecimal::from(0));
        assert!(allocator.payments_for(&invoice.reference()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_void_payment_restores_balance() {
        let storage = MemoryStorage::new();
        let config = Arc::new(LedgerConfig::default());
        let invoice = posted_invoice(&storage, config.clone(), 1_000_000).await;
        let mut allocator = PaymentAllocator::new(storage.clone(), config);

        let applied = allocator
            .apply_payment(NewPayment::new(invoice.reference(), BigDecimal::from(1_110_000), d(3, 10)))
            .await
            .unwrap();
        assert_eq!(applied.document.status, DocumentStatus::Paid);

        let voided = allocator
            .void_payment(&applied.payment.id, d(3, 12))
            .await
            .unwrap();
        assert!(voided.payment.is_voided);
        assert_eq!(voided.document.paid_amount, BigDecimal::from(0));
        assert_eq!(voided.document.status, DocumentStatus::Sent);

        let entry_id = applied.payment.journal_entry_id.unwrap();
        let entry = storage.get_journal_entry(&entry_id).await.unwrap().unwrap();
        assert!(entry.is_reversed);

        let again = allocator.void_payment(&applied.payment.id, d(3, 12)).await;
        assert!(matches!(again, Err(LedgerError::PaymentAlreadyVoided(_))));
    }

    #[tokio::test]
    async fn test_payment_requires_asset_account() {
        let storage = MemoryStorage::new();
        let config = Arc::new(LedgerConfig::default());
        let invoice = posted_invoice(&storage, config.clone(), 100_000).await;
        let revenue = storage.find_account_by_code("4100").await.unwrap().unwrap();
        let mut allocator = PaymentAllocator::new(storage.clone(), config);

        let result = allocator
            .apply_payment(
                NewPayment::new(invoice.reference(), BigDecimal::from(100), d(3, 10))
                    .into_account(revenue.id),
            )
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));
    }
}
