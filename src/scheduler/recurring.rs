//! Recurring invoice and bill templates

use bigdecimal::BigDecimal;
use chrono::{Days, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::documents::{DocumentLine, NewDocument};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
}

impl Frequency {
    /// `start` moved forward by `steps` periods; month arithmetic clamps to the month end
    pub fn advance(&self, start: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Frequency::Daily => start.checked_add_days(Days::new(u64::from(steps))),
            Frequency::Weekly => start.checked_add_days(Days::new(7 * u64::from(steps))),
            Frequency::Monthly => start.checked_add_months(Months::new(steps)),
            Frequency::Quarterly => start.checked_add_months(Months::new(steps.checked_mul(3)?)),
            Frequency::Yearly => start.checked_add_months(Months::new(steps.checked_mul(12)?)),
        }
    }
}

/// Blueprint for documents generated on a schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTemplate {
    pub id: String,
    pub name: String,
    pub kind: DocumentKind,
    pub contact_id: String,
    pub lines: Vec<DocumentLine>,
    pub tax_rate: Option<BigDecimal>,
    pub discount_amount: BigDecimal,
    pub frequency: Frequency,
    /// Number of `frequency` periods between occurrences
    pub interval: u32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    /// `None` once the schedule has run out
    pub next_generate_date: Option<NaiveDate>,
    pub occurrences_limit: Option<u32>,
    pub occurrences_count: u32,
    pub is_active: bool,
    /// Post generated documents instead of leaving them as drafts
    pub auto_post: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl RecurringTemplate {
    pub fn new(
        name: impl Into<String>,
        kind: DocumentKind,
        contact_id: impl Into<String>,
        lines: Vec<DocumentLine>,
        frequency: Frequency,
        start_date: NaiveDate,
    ) -> Self {
        let now = chrono::Utc::now().naive_utc();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            contact_id: contact_id.into(),
            lines,
            tax_rate: None,
            discount_amount: BigDecimal::from(0),
            frequency,
            interval: 1,
            start_date,
            end_date: None,
            next_generate_date: Some(start_date),
            occurrences_limit: None,
            occurrences_count: 0,
            is_active: true,
            auto_post: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn until(mut self, end_date: NaiveDate) -> Self {
        self.end_date = Some(end_date);
        self
    }

    pub fn limit(mut self, occurrences: u32) -> Self {
        self.occurrences_limit = Some(occurrences);
        self
    }

    pub fn auto_post(mut self) -> Self {
        self.auto_post = true;
        self
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::Validation(
                "Template name cannot be empty".to_string(),
            ));
        }
        if self.interval == 0 {
            return Err(LedgerError::Validation(
                "Template interval must be at least 1".to_string(),
            ));
        }
        if self.lines.is_empty() {
            return Err(LedgerError::Validation(
                "Template must have at least one line".to_string(),
            ));
        }
        if let Some(end) = self.end_date {
            if end < self.start_date {
                return Err(LedgerError::Validation(format!(
                    "Template ends before it starts: {} < {}",
                    end, self.start_date
                )));
            }
        }
        Ok(())
    }

    /// Date of the n-th occurrence (0-based), always computed from `start_date`
    pub fn occurrence_date(&self, n: u32) -> Option<NaiveDate> {
        self.frequency
            .advance(self.start_date, n.checked_mul(self.interval)?)
    }

    pub fn is_exhausted(&self) -> bool {
        let limit_reached = self
            .occurrences_limit
            .is_some_and(|limit| self.occurrences_count >= limit);
        let past_end = match (self.next_generate_date, self.end_date) {
            (Some(next), Some(end)) => next > end,
            (None, _) => true,
            _ => false,
        };
        limit_reached || past_end
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        self.is_active
            && !self.is_exhausted()
            && self.next_generate_date.is_some_and(|next| next <= today)
    }

    /// Record one generated occurrence and move the cursor; deactivates an exhausted template
    pub fn advance(&mut self) {
        self.occurrences_count += 1;
        self.next_generate_date = self.occurrence_date(self.occurrences_count);
        if self.is_exhausted() {
            self.is_active = false;
        }
        self.updated_at = chrono::Utc::now().naive_utc();
    }

    /// Draft parameters for an occurrence issued on `issue_date`
    pub fn to_new_document(&self, issue_date: NaiveDate) -> NewDocument {
        let mut params = NewDocument::new(self.kind, &self.contact_id, issue_date, self.lines.clone())
            .discount(self.discount_amount.clone());
        if let Some(rate) = &self.tax_rate {
            params = params.tax_rate(rate.clone());
        }
        params.template_id = Some(self.id.clone());
        params.notes = Some(self.name.clone());
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn template(frequency: Frequency, start: NaiveDate) -> RecurringTemplate {
        RecurringTemplate::new(
            "Sewa gudang",
            DocumentKind::Bill,
            "supplier-1",
            vec![DocumentLine::new("Sewa", BigDecimal::from(1), BigDecimal::from(5_000_000))],
            frequency,
            start,
        )
    }

    #[test]
    fn test_monthly_cursor_is_anchored_on_start() {
        let mut t = template(Frequency::Monthly, d(2024, 1, 31));
        t.advance();
        assert_eq!(t.next_generate_date, Some(d(2024, 2, 29)));
        t.advance();
        assert_eq!(t.next_generate_date, Some(d(2024, 3, 31)));
    }

    #[test]
    fn test_interval_and_frequencies() {
        let t = template(Frequency::Weekly, d(2024, 1, 1)).every(2);
        assert_eq!(t.occurrence_date(1), Some(d(2024, 1, 15)));

        let t = template(Frequency::Quarterly, d(2024, 1, 15));
        assert_eq!(t.occurrence_date(2), Some(d(2024, 7, 15)));

        let t = template(Frequency::Yearly, d(2024, 2, 29));
        assert_eq!(t.occurrence_date(1), Some(d(2025, 2, 28)));
    }

    #[test]
    fn test_limit_deactivates_template() {
        let mut t = template(Frequency::Daily, d(2024, 1, 1)).limit(2);
        assert!(t.is_due(d(2024, 1, 1)));
        t.advance();
        assert!(t.is_active);
        t.advance();
        assert!(t.is_exhausted());
        assert!(!t.is_active);
        assert!(!t.is_due(d(2024, 12, 31)));
    }

    #[test]
    fn test_end_date_deactivates_template() {
        let mut t = template(Frequency::Monthly, d(2024, 1, 10)).until(d(2024, 2, 20));
        t.advance();
        assert!(t.is_active);
        t.advance();
        assert_eq!(t.next_generate_date, Some(d(2024, 3, 10)));
        assert!(!t.is_active);
    }

    #[test]
    fn test_validation() {
        assert!(template(Frequency::Daily, d(2024, 1, 1)).every(0).validate().is_err());
        assert!(template(Frequency::Daily, d(2024, 1, 2))
            .until(d(2024, 1, 1))
            .validate()
            .is_err());
    }
}
