//! Payment reminders scheduled against posted invoices

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::types::DocumentRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Sent,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReminder {
    pub id: String,
    pub remindable: DocumentRef,
    pub scheduled_date: NaiveDate,
    pub status: ReminderStatus,
    pub sent_at: Option<NaiveDateTime>,
    /// Delivery error of the last failed attempt
    pub last_error: Option<String>,
    pub created_at: NaiveDateTime,
}

impl PaymentReminder {
    pub fn new(remindable: DocumentRef, scheduled_date: NaiveDate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            remindable,
            scheduled_date,
            status: ReminderStatus::Pending,
            sent_at: None,
            last_error: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.status == ReminderStatus::Pending && self.scheduled_date <= today
    }

    pub fn mark_sent(&mut self) {
        self.status = ReminderStatus::Sent;
        self.sent_at = Some(chrono::Utc::now().naive_utc());
        self.last_error = None;
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.status = ReminderStatus::Failed;
        self.last_error = Some(error.into());
    }
}
