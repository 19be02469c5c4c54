//! Contacts, invoices, bills and payments

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactType {
    Customer,
    Supplier,
    Both,
}

impl ContactType {
    /// Whether a contact of this type may appear on documents of `kind`
    pub fn accepts(&self, kind: DocumentKind) -> bool {
        matches!(
            (self, kind),
            (ContactType::Both, _)
                | (ContactType::Customer, DocumentKind::Invoice)
                | (ContactType::Supplier, DocumentKind::Bill)
        )
    }
}

/// Customer or supplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub contact_type: ContactType,
    pub email: Option<String>,
    /// Tax id (NPWP)
    pub tax_number: Option<String>,
    /// Maximum open receivable balance; `None` means unlimited
    pub credit_limit: Option<BigDecimal>,
    /// Days between issue date and due date
    pub payment_terms_days: u32,
    pub created_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

impl Contact {
    pub fn new(name: impl Into<String>, contact_type: ContactType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            contact_type,
            email: None,
            tax_number: None,
            credit_limit: None,
            payment_terms_days: 30,
            created_at: chrono::Utc::now().naive_utc(),
            deleted_at: None,
        }
    }
}

/// Lifecycle state of an invoice or bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Draft,
    /// Posted invoice
    Sent,
    /// Posted bill
    Received,
    Partial,
    Paid,
    Overdue,
    Cancelled,
}

impl DocumentStatus {
    /// Status of a freshly posted document of `kind`
    pub fn issued(kind: DocumentKind) -> Self {
        match kind {
            DocumentKind::Invoice => DocumentStatus::Sent,
            DocumentKind::Bill => DocumentStatus::Received,
        }
    }

    /// Posted and still waiting for money
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            DocumentStatus::Sent
                | DocumentStatus::Received
                | DocumentStatus::Partial
                | DocumentStatus::Overdue
        )
    }
}

/// Line item owned by a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentLine {
    pub description: String,
    pub quantity: BigDecimal,
    pub unit_price: BigDecimal,
    /// Revenue (invoice) or expense (bill) account id; configured default when `None`
    pub account_id: Option<String>,
}

impl DocumentLine {
    pub fn new(description: impl Into<String>, quantity: BigDecimal, unit_price: BigDecimal) -> Self {
        Self {
            description: description.into(),
            quantity,
            unit_price,
            account_id: None,
        }
    }

    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn amount(&self) -> BigDecimal {
        &self.quantity * &self.unit_price
    }
}

/// Invoice (sales) or bill (purchase)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub kind: DocumentKind,
    pub number: String,
    pub contact_id: String,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub lines: Vec<DocumentLine>,
    pub subtotal: BigDecimal,
    /// PPN percentage
    pub tax_rate: BigDecimal,
    pub tax_amount: BigDecimal,
    pub discount_amount: BigDecimal,
    pub total_amount: BigDecimal,
    pub paid_amount: BigDecimal,
    pub status: DocumentStatus,
    /// Entry recorded when the document was posted
    pub journal_entry_id: Option<String>,
    /// Recurring template this document was generated from
    pub template_id: Option<String>,
    pub notes: Option<String>,
    pub version: u64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub deleted_at: Option<NaiveDateTime>,
}

impl Document {
    pub fn reference(&self) -> DocumentRef {
        DocumentRef {
            kind: self.kind,
            id: self.id.clone(),
        }
    }

    pub fn outstanding(&self) -> BigDecimal {
        &self.total_amount - &self.paid_amount
    }

    pub fn is_posted(&self) -> bool {
        self.journal_entry_id.is_some()
    }

    /// Check the totals and payment invariants
    pub fn check_invariants(&self) -> LedgerResult<()> {
        let expected = &self.subtotal + &self.tax_amount - &self.discount_amount;
        if self.total_amount != expected {
            return Err(LedgerError::Validation(format!(
                "Document {} total {} does not equal subtotal + tax - discount ({})",
                self.number, self.total_amount, expected
            )));
        }
        if self.paid_amount < BigDecimal::from(0) || self.paid_amount > self.total_amount {
            return Err(LedgerError::Validation(format!(
                "Document {} paid amount {} outside 0..={}",
                self.number, self.paid_amount, self.total_amount
            )));
        }
        Ok(())
    }

    /// Status implied by the paid amount once posted, evaluated on `as_of`
    pub fn settled_status(&self, as_of: NaiveDate) -> DocumentStatus {
        let zero = BigDecimal::from(0);
        if self.paid_amount >= self.total_amount {
            DocumentStatus::Paid
        } else if self.due_date < as_of {
            DocumentStatus::Overdue
        } else if self.paid_amount > zero {
            DocumentStatus::Partial
        } else {
            DocumentStatus::issued(self.kind)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    /// Cash in against an invoice
    Receive,
    /// Cash out against a bill
    Send,
}

impl PaymentType {
    pub fn pays(&self) -> DocumentKind {
        match self {
            PaymentType::Receive => DocumentKind::Invoice,
            PaymentType::Send => DocumentKind::Bill,
        }
    }
}

/// Cash receipt or disbursement applied to one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub number: String,
    pub payment_type: PaymentType,
    pub contact_id: String,
    pub payable: DocumentRef,
    pub amount: BigDecimal,
    pub cash_account_id: String,
    pub payment_date: NaiveDate,
    pub reference: Option<String>,
    pub journal_entry_id: Option<String>,
    pub is_voided: bool,
    pub voided_at: Option<NaiveDate>,
    pub version: u64,
    pub created_at: NaiveDateTime,
}
