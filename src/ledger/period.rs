//! Fiscal periods gate the dates journal entries may be recorded on

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::traits::*;
use crate::types::*;

/// Accounting period with close/lock controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiscalPeriod {
    pub id: String,
    /// Period name (e.g. "Januari 2024")
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Closed periods can be reopened
    pub is_closed: bool,
    /// Locked periods refuse every change until unlocked
    pub is_locked: bool,
    pub closed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

impl FiscalPeriod {
    pub fn new(name: String, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            start_date,
            end_date,
            is_closed: false,
            is_locked: false,
            closed_at: None,
            created_at: chrono::Utc::now().naive_utc(),
        }
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }

    pub fn overlaps(&self, other: &FiscalPeriod) -> bool {
        self.start_date <= other.end_date && other.start_date <= self.end_date
    }

    /// Returns true if entries may be dated within this period
    pub fn accepts_entries(&self) -> bool {
        !self.is_closed && !self.is_locked
    }
}

/// Fail with `FiscalPeriodClosed` when `date` falls in a closed or locked period.
/// Dates outside every defined period are accepted.
pub async fn ensure_period_open<S: LedgerStorage + ?Sized>(
    storage: &S,
    date: NaiveDate,
) -> LedgerResult<()> {
    let periods = storage.list_fiscal_periods().await?;
    match periods.iter().find(|p| p.contains_date(date)) {
        Some(period) if !period.accepts_entries() => Err(LedgerError::FiscalPeriodClosed(date)),
        _ => Ok(()),
    }
}

/// Manager for opening, closing and locking fiscal periods
pub struct PeriodManager<S: LedgerStorage> {
    storage: S,
}

impl<S: LedgerStorage> PeriodManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Create a new open period; periods may not overlap
    pub async fn create_period(
        &mut self,
        name: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<FiscalPeriod> {
        if name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Fiscal period name cannot be empty".to_string(),
            ));
        }
        if start_date > end_date {
            return Err(LedgerError::Validation(format!(
                "Fiscal period starts after it ends: {} > {}",
                start_date, end_date
            )));
        }

        let period = FiscalPeriod::new(name, start_date, end_date);
        let existing = self.storage.list_fiscal_periods().await?;
        if let Some(clash) = existing.iter().find(|p| p.overlaps(&period)) {
            return Err(LedgerError::Validation(format!(
                "Fiscal period overlaps '{}' ({} - {})",
                clash.name, clash.start_date, clash.end_date
            )));
        }

        self.storage.save_fiscal_period(&period).await?;
        Ok(period)
    }

    pub async fn get_period_required(&self, period_id: &str) -> LedgerResult<FiscalPeriod> {
        self.storage
            .get_fiscal_period(period_id)
            .await?
            .ok_or_else(|| LedgerError::FiscalPeriodNotFound(period_id.to_string()))
    }

    /// All periods ordered by start date
    pub async fn list_periods(&self) -> LedgerResult<Vec<FiscalPeriod>> {
        let mut periods = self.storage.list_fiscal_periods().await?;
        periods.sort_by_key(|p| p.start_date);
        Ok(periods)
    }

    pub async fn period_for_date(&self, date: NaiveDate) -> LedgerResult<Option<FiscalPeriod>> {
        let periods = self.storage.list_fiscal_periods().await?;
        Ok(periods.into_iter().find(|p| p.contains_date(date)))
    }

    pub async fn ensure_open(&self, date: NaiveDate) -> LedgerResult<()> {
        ensure_period_open(&self.storage, date).await
    }

    pub async fn close_period(&mut self, period_id: &str) -> LedgerResult<FiscalPeriod> {
        let mut period = self.get_period_required(period_id).await?;
        if period.is_locked {
            return Err(LedgerError::InvalidTransition(format!(
                "Fiscal period '{}' is locked",
                period.name
            )));
        }
        if period.is_closed {
            return Err(LedgerError::InvalidTransition(format!(
                "Fiscal period '{}' is already closed",
                period.name
            )));
        }
        period.is_closed = true;
        period.closed_at = Some(chrono::Utc::now().naive_utc());
        self.storage.update_fiscal_period(&period).await?;
        tracing::info!(period = %period.name, "fiscal period closed");
        Ok(period)
    }

    pub async fn reopen_period(&mut self, period_id: &str) -> LedgerResult<FiscalPeriod> {
        let mut period = self.get_period_required(period_id).await?;
        if period.is_locked {
            return Err(LedgerError::InvalidTransition(format!(
                "Fiscal period '{}' is locked and cannot be reopened",
                period.name
            )));
        }
        if !period.is_closed {
            return Err(LedgerError::InvalidTransition(format!(
                "Fiscal period '{}' is not closed",
                period.name
            )));
        }
        period.is_closed = false;
        period.closed_at = None;
        self.storage.update_fiscal_period(&period).await?;
        tracing::info!(period = %period.name, "fiscal period reopened");
        Ok(period)
    }

    pub async fn lock_period(&mut self, period_id: &str) -> LedgerResult<FiscalPeriod> {
        let mut period = self.get_period_required(period_id).await?;
        if period.is_locked {
            return Err(LedgerError::InvalidTransition(format!(
                "Fiscal period '{}' is already locked",
                period.name
            )));
        }
        period.is_locked = true;
        self.storage.update_fiscal_period(&period).await?;
        tracing::info!(period = %period.name, "fiscal period locked");
        Ok(period)
    }

    pub async fn unlock_period(&mut self, period_id: &str) -> LedgerResult<FiscalPeriod> {
        let mut period = self.get_period_required(period_id).await?;
        if !period.is_locked {
            return Err(LedgerError::InvalidTransition(format!(
                "Fiscal period '{}' is not locked",
                period.name
            )));
        }
        period.is_locked = false;
        self.storage.update_fiscal_period(&period).await?;
        tracing::info!(period = %period.name, "fiscal period unlocked");
        Ok(period)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_overlapping_periods_are_rejected() {
        let mut periods = PeriodManager::new(MemoryStorage::new());
        periods
            .create_period("Januari 2024".into(), d(1, 1), d(1, 31))
            .await
            .unwrap();

        let result = periods
            .create_period("Overlap".into(), d(1, 15), d(2, 15))
            .await;
        assert!(matches!(result, Err(LedgerError::Validation(_))));

        let inverted = periods.create_period("Bad".into(), d(3, 31), d(3, 1)).await;
        assert!(matches!(inverted, Err(LedgerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_close_reopen_lock_cycle() {
        let mut periods = PeriodManager::new(MemoryStorage::new());
        let period = periods
            .create_period("Februari 2024".into(), d(2, 1), d(2, 29))
            .await
            .unwrap();

        assert!(periods.ensure_open(d(2, 10)).await.is_ok());

        periods.close_period(&period.id).await.unwrap();
        assert!(matches!(
            periods.ensure_open(d(2, 10)).await,
            Err(LedgerError::FiscalPeriodClosed(_))
        ));
        // Dates outside any period stay open
        assert!(periods.ensure_open(d(3, 1)).await.is_ok());

        periods.lock_period(&period.id).await.unwrap();
        assert!(matches!(
            periods.reopen_period(&period.id).await,
            Err(LedgerError::InvalidTransition(_))
        ));

        periods.unlock_period(&period.id).await.unwrap();
        let reopened = periods.reopen_period(&period.id).await.unwrap();
        assert!(reopened.accepts_entries());
    }

    #[tokio::test]
    async fn test_locked_open_period_refuses_entries() {
        let mut periods = PeriodManager::new(MemoryStorage::new());
        let period = periods
            .create_period("Maret 2024".into(), d(3, 1), d(3, 31))
            .await
            .unwrap();
        periods.lock_period(&period.id).await.unwrap();

        assert!(periods.ensure_open(d(3, 5)).await.is_err());
        assert!(matches!(
            periods.close_period(&period.id).await,
            Err(LedgerError::InvalidTransition(_))
        ));
    }
}
