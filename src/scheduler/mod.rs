//! Batch jobs: overdue marking, recurring document generation and payment reminders
//!
//! Every job refuses to start while another run of the same job holds its lock, and
//! every item is committed in its own unit of work so one failure never undoes the rest.

pub mod recurring;
pub mod reminders;

pub use recurring::*;
pub use reminders::*;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::config::LedgerConfig;
use crate::documents::{ContactManager, Document, DocumentEngine, DocumentStatus};
use crate::ledger::finish;
use crate::traits::*;
use crate::types::*;
use crate::utils::notifier::{deliver, dispatch};

pub const MARK_OVERDUE_JOB: &str = "accounting:mark-overdue";
pub const GENERATE_RECURRING_JOB: &str = "accounting:generate-recurring";
pub const SEND_REMINDERS_JOB: &str = "accounting:send-reminders";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchFailure {
    pub item: String,
    pub code: String,
    pub message: String,
}

/// Outcome of one job run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub job: String,
    pub run_date: NaiveDate,
    pub processed: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn new(job: &str, run_date: NaiveDate) -> Self {
        Self {
            job: job.to_string(),
            run_date,
            processed: 0,
            succeeded: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, item: &str, outcome: LedgerResult<ItemOutcome>) {
        self.processed += 1;
        match outcome {
            Ok(ItemOutcome::Done) => self.succeeded += 1,
            Ok(ItemOutcome::Skipped) => self.skipped += 1,
            Ok(ItemOutcome::Failed(err)) | Err(err) => {
                tracing::warn!(job = %self.job, item, error = %err, "batch item failed");
                self.failures.push(BatchFailure {
                    item: item.to_string(),
                    code: err.code().to_string(),
                    message: err.to_string(),
                });
            }
        }
    }
}

enum ItemOutcome {
    Done,
    Skipped,
    /// Committed, but the item still counts as failed
    Failed(LedgerError),
}

/// Names of jobs currently running; clones share the same set
#[derive(Debug, Clone, Default)]
pub struct JobLocks {
    running: Arc<Mutex<HashSet<String>>>,
}

impl JobLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock for `job`, failing with `JobAlreadyRunning` when it is held
    pub fn acquire(&self, job: &str) -> LedgerResult<JobGuard> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| LedgerError::Storage("job lock poisoned".to_string()))?;
        if !running.insert(job.to_string()) {
            return Err(LedgerError::JobAlreadyRunning(job.to_string()));
        }
        Ok(JobGuard {
            job: job.to_string(),
            running: self.running.clone(),
        })
    }

    pub fn is_running(&self, job: &str) -> bool {
        self.running
            .lock()
            .map(|running| running.contains(job))
            .unwrap_or(false)
    }
}

/// Releases the job lock when dropped
#[derive(Debug)]
pub struct JobGuard {
    job: String,
    running: Arc<Mutex<HashSet<String>>>,
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            running.remove(&self.job);
        }
    }
}

pub struct Scheduler<S: AccountingStorage> {
    storage: S,
    documents: DocumentEngine<S>,
    contacts: ContactManager<S>,
    config: Arc<LedgerConfig>,
    features: Arc<dyn FeatureManager>,
    notifier: Arc<dyn Notifier>,
    locks: JobLocks,
}

impl<S: AccountingStorage> Scheduler<S> {
    pub fn new(
        storage: S,
        config: Arc<LedgerConfig>,
        features: Arc<dyn FeatureManager>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            documents: DocumentEngine::new(
                storage.joined(),
                config.clone(),
                features.clone(),
                notifier.clone(),
            ),
            contacts: ContactManager::new(storage.joined()),
            storage,
            config,
            features,
            notifier,
            locks: JobLocks::new(),
        }
    }

    /// Share job locks with other schedulers working on the same data
    pub fn with_locks(mut self, locks: JobLocks) -> Self {
        self.locks = locks;
        self
    }

    pub fn locks(&self) -> &JobLocks {
        &self.locks
    }

    /// Run the three daily jobs in order
    pub async fn run_daily(&mut self, today: NaiveDate) -> LedgerResult<Vec<BatchReport>> {
        Ok(vec![
            self.mark_overdue(today).await?,
            self.generate_recurring(today).await?,
            self.send_reminders(today).await?,
        ])
    }

    /// Flag posted, unpaid documents due before `today` as overdue
    pub async fn mark_overdue(&mut self, today: NaiveDate) -> LedgerResult<BatchReport> {
        let _guard = self.locks.acquire(MARK_OVERDUE_JOB)?;
        let mut report = BatchReport::new(MARK_OVERDUE_JOB, today);

        let documents = self.storage.list_documents(None, None).await?;
        for document in documents.iter().filter(|d| is_overdue_candidate(d, today)) {
            let outcome = self.mark_one_overdue(&document.reference(), today).await;
            report.record(&document.number, outcome);
        }

        tracing::info!(
            job = MARK_OVERDUE_JOB,
            processed = report.processed,
            failed = report.failures.len(),
            "job finished"
        );
        Ok(report)
    }

    async fn mark_one_overdue(
        &mut self,
        reference: &DocumentRef,
        today: NaiveDate,
    ) -> LedgerResult<ItemOutcome> {
        self.storage.begin().await?;
        let result = self.mark_one_overdue_inner(reference, today).await;
        let Some(document) = finish(&mut self.storage, result).await? else {
            return Ok(ItemOutcome::Skipped);
        };

        if self.features.is_enabled(Feature::OverdueNotices) {
            let notice = Notification::OverdueNotice {
                document: document.reference(),
                number: document.number.clone(),
                contact_id: document.contact_id.clone(),
                outstanding: document.outstanding(),
                due_date: document.due_date,
                days_overdue: (today - document.due_date).num_days(),
            };
            if let Err(err) = dispatch(
                self.notifier.as_ref(),
                &self.config.notification_channels,
                &notice,
            )
            .await
            {
                tracing::warn!(number = %document.number, error = %err, "overdue notice not delivered");
            }
        }
        Ok(ItemOutcome::Done)
    }

    async fn mark_one_overdue_inner(
        &mut self,
        reference: &DocumentRef,
        today: NaiveDate,
    ) -> LedgerResult<Option<Document>> {
        // Reload: the listing may be stale by the time this item runs.
        let Some(mut document) = self.storage.get_document(reference).await? else {
            return Ok(None);
        };
        if !is_overdue_candidate(&document, today) {
            return Ok(None);
        }
        document.status = DocumentStatus::Overdue;
        document.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_document(&mut document).await?;
        tracing::debug!(number = %document.number, "document marked overdue");
        Ok(Some(document))
    }

    /// Generate every occurrence of active templates that is due on or before `today`
    pub async fn generate_recurring(&mut self, today: NaiveDate) -> LedgerResult<BatchReport> {
        let mut report = BatchReport::new(GENERATE_RECURRING_JOB, today);
        if !self.features.is_enabled(Feature::RecurringDocuments) {
            tracing::info!(job = GENERATE_RECURRING_JOB, "feature disabled, skipping");
            return Ok(report);
        }
        let _guard = self.locks.acquire(GENERATE_RECURRING_JOB)?;

        let templates = self.storage.list_templates().await?;
        for template in templates.iter().filter(|t| t.is_due(today)) {
            // Catch up on missed occurrences one committed document at a time.
            loop {
                let outcome = self.generate_one(&template.id, today).await;
                let stop = !matches!(outcome, Ok(ItemOutcome::Done));
                if matches!(outcome, Ok(ItemOutcome::Skipped)) {
                    break;
                }
                report.record(&template.name, outcome);
                if stop {
                    break;
                }
            }
        }

        tracing::info!(
            job = GENERATE_RECURRING_JOB,
            generated = report.succeeded,
            failed = report.failures.len(),
            "job finished"
        );
        Ok(report)
    }

    async fn generate_one(&mut self, template_id: &str, today: NaiveDate) -> LedgerResult<ItemOutcome> {
        self.storage.begin().await?;
        let result = self.generate_one_inner(template_id, today).await;
        finish(&mut self.storage, result).await
    }

    async fn generate_one_inner(
        &mut self,
        template_id: &str,
        today: NaiveDate,
    ) -> LedgerResult<ItemOutcome> {
        let mut template = self.get_template_required(template_id).await?;
        let Some(issue_date) = template.next_generate_date.filter(|_| template.is_due(today)) else {
            return Ok(ItemOutcome::Skipped);
        };

        let draft = self
            .documents
            .create_draft(template.to_new_document(issue_date))
            .await?;
        let document = if template.auto_post {
            self.documents.post(&draft.reference()).await?
        } else {
            draft
        };

        template.advance();
        self.storage.update_template(&template).await?;
        tracing::debug!(
            template = %template.name,
            number = %document.number,
            next = ?template.next_generate_date,
            "recurring document generated"
        );
        Ok(ItemOutcome::Done)
    }

    /// Deliver pending reminders scheduled on or before `today`
    pub async fn send_reminders(&mut self, today: NaiveDate) -> LedgerResult<BatchReport> {
        let mut report = BatchReport::new(SEND_REMINDERS_JOB, today);
        if !self.features.is_enabled(Feature::PaymentReminders) {
            tracing::info!(job = SEND_REMINDERS_JOB, "feature disabled, skipping");
            return Ok(report);
        }
        let _guard = self.locks.acquire(SEND_REMINDERS_JOB)?;

        let mut reminders: Vec<PaymentReminder> = self
            .storage
            .list_reminders()
            .await?
            .into_iter()
            .filter(|r| r.is_due(today))
            .collect();
        reminders.sort_by(|a, b| a.scheduled_date.cmp(&b.scheduled_date));

        for reminder in &reminders {
            let outcome = self.send_one(&reminder.id, today).await;
            report.record(&reminder.id, outcome);
        }

        tracing::info!(
            job = SEND_REMINDERS_JOB,
            sent = report.succeeded,
            failed = report.failures.len(),
            "job finished"
        );
        Ok(report)
    }

    async fn send_one(&mut self, reminder_id: &str, today: NaiveDate) -> LedgerResult<ItemOutcome> {
        self.storage.begin().await?;
        let result = self.send_one_inner(reminder_id, today).await;
        finish(&mut self.storage, result).await
    }

    async fn send_one_inner(&mut self, reminder_id: &str, today: NaiveDate) -> LedgerResult<ItemOutcome> {
        let mut reminder = self
            .storage
            .get_reminder(reminder_id)
            .await?
            .ok_or_else(|| LedgerError::ReminderNotFound(reminder_id.to_string()))?;
        if !reminder.is_due(today) {
            return Ok(ItemOutcome::Skipped);
        }

        let document = self.storage.get_document(&reminder.remindable).await?;
        let Some(document) = document.filter(|d| d.status.is_open()) else {
            reminder.status = ReminderStatus::Cancelled;
            self.storage.update_reminder(&reminder).await?;
            return Ok(ItemOutcome::Skipped);
        };

        let notification = Notification::PaymentReminder {
            reminder_id: reminder.id.clone(),
            document: document.reference(),
            number: document.number.clone(),
            contact_id: document.contact_id.clone(),
            outstanding: document.outstanding(),
            due_date: document.due_date,
        };
        let delivery = deliver(
            self.notifier.as_ref(),
            &self.config.notification_channels,
            &notification,
        )
        .await;
        let failures = delivery.failure_summary();
        let partial = delivery.any_delivered();
        let outcome = match delivery.into_result() {
            Ok(()) => {
                reminder.mark_sent();
                ItemOutcome::Done
            }
            // Sent on at least one channel; the failed ones stay in `last_error`.
            Err(_) if partial => {
                tracing::warn!(reminder = %reminder.id, failed = %failures, "reminder partly delivered");
                reminder.mark_sent();
                reminder.last_error = Some(failures);
                ItemOutcome::Done
            }
            Err(err) => {
                reminder.mark_failed(failures);
                ItemOutcome::Failed(err)
            }
        };
        self.storage.update_reminder(&reminder).await?;
        Ok(outcome)
    }

    /// Store a new template after checking its contact
    pub async fn create_template(&mut self, template: RecurringTemplate) -> LedgerResult<RecurringTemplate> {
        template.validate()?;
        let contact = self.contacts.get_contact_required(&template.contact_id).await?;
        if !contact.contact_type.accepts(template.kind) {
            return Err(LedgerError::Validation(format!(
                "Contact '{}' cannot be used on a {}",
                contact.name, template.kind
            )));
        }
        self.storage.save_template(&template).await?;
        tracing::info!(template = %template.name, frequency = ?template.frequency, "recurring template created");
        Ok(template)
    }

    pub async fn get_template_required(&self, template_id: &str) -> LedgerResult<RecurringTemplate> {
        self.storage
            .get_template(template_id)
            .await?
            .ok_or_else(|| LedgerError::TemplateNotFound(template_id.to_string()))
    }

    pub async fn list_templates(&self) -> LedgerResult<Vec<RecurringTemplate>> {
        self.storage.list_templates().await
    }

    pub async fn pause_template(&mut self, template_id: &str) -> LedgerResult<RecurringTemplate> {
        let mut template = self.get_template_required(template_id).await?;
        template.is_active = false;
        template.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_template(&template).await?;
        Ok(template)
    }

    /// Resume a paused template; an exhausted schedule cannot be resumed
    pub async fn resume_template(&mut self, template_id: &str) -> LedgerResult<RecurringTemplate> {
        let mut template = self.get_template_required(template_id).await?;
        if template.is_exhausted() {
            return Err(LedgerError::InvalidTransition(format!(
                "Recurring template '{}' has no occurrences left",
                template.name
            )));
        }
        template.is_active = true;
        template.updated_at = chrono::Utc::now().naive_utc();
        self.storage.update_template(&template).await?;
        Ok(template)
    }
}

fn is_overdue_candidate(document: &Document, today: NaiveDate) -> bool {
    matches!(
        document.status,
        DocumentStatus::Sent | DocumentStatus::Received | DocumentStatus::Partial
    ) && document.due_date < today
        && document.outstanding() > BigDecimal::from(0)
}
