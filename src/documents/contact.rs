//! Customer and supplier management

use bigdecimal::BigDecimal;

use crate::documents::{Contact, DocumentStatus};
use crate::traits::*;
use crate::types::*;

pub struct ContactManager<S: DocumentStorage> {
    storage: S,
}

impl<S: DocumentStorage> ContactManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub async fn create_contact(&mut self, contact: Contact) -> LedgerResult<Contact> {
        validate_contact(&contact)?;
        self.storage.save_contact(&contact).await?;
        Ok(contact)
    }

    pub async fn get_contact_required(&self, contact_id: &str) -> LedgerResult<Contact> {
        self.storage
            .get_contact(contact_id)
            .await?
            .ok_or_else(|| LedgerError::ContactNotFound(contact_id.to_string()))
    }

    pub async fn list_contacts(&self) -> LedgerResult<Vec<Contact>> {
        self.storage.list_contacts().await
    }

    pub async fn update_contact(&mut self, contact: &Contact) -> LedgerResult<()> {
        validate_contact(contact)?;
        self.get_contact_required(&contact.id).await?;
        self.storage.update_contact(contact).await
    }

    /// Soft-delete a contact without open documents
    pub async fn delete_contact(&mut self, contact_id: &str) -> LedgerResult<()> {
        let mut contact = self.get_contact_required(contact_id).await?;
        let documents = self.storage.list_documents(None, None).await?;
        if documents
            .iter()
            .any(|d| d.contact_id == contact.id && (d.status.is_open() || d.status == DocumentStatus::Draft))
        {
            return Err(LedgerError::InvalidTransition(format!(
                "Contact '{}' still has open documents",
                contact.name
            )));
        }
        contact.deleted_at = Some(chrono::Utc::now().naive_utc());
        self.storage.update_contact(&contact).await
    }

    /// Outstanding amount over the contact's open documents of `kind`
    pub async fn open_balance(
        &self,
        contact_id: &str,
        kind: DocumentKind,
    ) -> LedgerResult<BigDecimal> {
        let documents = self.storage.list_documents(Some(kind), None).await?;
        Ok(documents
            .iter()
            .filter(|d| d.contact_id == contact_id && d.status.is_open())
            .map(|d| d.outstanding())
            .sum())
    }
}

fn validate_contact(contact: &Contact) -> LedgerResult<()> {
    if contact.name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Contact name cannot be empty".to_string(),
        ));
    }
    if let Some(limit) = &contact.credit_limit {
        if *limit < BigDecimal::from(0) {
            return Err(LedgerError::Validation(
                "Credit limit cannot be negative".to_string(),
            ));
        }
    }
    if let Some(email) = &contact.email {
        if !email.contains('@') {
            return Err(LedgerError::Validation(format!(
                "Invalid email address '{}'",
                email
            )));
        }
    }
    Ok(())
}
