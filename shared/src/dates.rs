use chrono::{Datelike, NaiveDate};

use crate::catalog::DatasetCatalog;
use crate::error::{DateRangeIssue, ValidationError};

/// Date as entered in the year/month/day pickers; month and day may be left blank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartialDate {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
}

/// Which end of a range a partial date sits on; decides how blanks are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    Start,
    End,
}

impl PartialDate {
    pub const fn new(year: i32, month: u32, day: u32) -> Self {
        Self {
            year: Some(year),
            month: Some(month),
            day: Some(day),
        }
    }

    pub const fn year_only(year: i32) -> Self {
        Self {
            year: Some(year),
            month: None,
            day: None,
        }
    }

    pub fn is_present(&self) -> bool {
        self.year.is_some()
    }

    /// Resolve to a calendar date. A start defaults to January / the 1st, an end to
    /// December / the last day of its month. `None` when no such date exists.
    pub fn resolve(&self, end: RangeEnd) -> Option<NaiveDate> {
        let year = self.year?;
        let month = self.month.unwrap_or(match end {
            RangeEnd::Start => 1,
            RangeEnd::End => 12,
        });
        let day = match (self.day, end) {
            (Some(day), _) => day,
            (None, RangeEnd::Start) => 1,
            (None, RangeEnd::End) => last_day_of_month(year, month)?,
        };
        NaiveDate::from_ymd_opt(year, month, day)
    }
}

fn last_day_of_month(year: i32, month: u32) -> Option<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((next - first).num_days() as u32)
}

/// A range that passed validation, with both ends resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl ValidatedRange {
    pub fn from_iso(&self) -> String {
        self.from.format("%Y-%m-%d").to_string()
    }

    pub fn to_iso(&self) -> String {
        self.to.format("%Y-%m-%d").to_string()
    }
}

/// Checks a candidate range against a dataset's validity window.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRangeValidator {
    catalog: DatasetCatalog,
}

impl DateRangeValidator {
    pub fn new(catalog: DatasetCatalog) -> Self {
        Self { catalog }
    }

    pub fn validate(
        &self,
        dataset_key: &str,
        from: PartialDate,
        to: PartialDate,
    ) -> Result<ValidatedRange, ValidationError> {
        let dataset = self
            .catalog
            .get(dataset_key)
            .ok_or_else(|| ValidationError::UnknownDataset(dataset_key.to_string()))?;

        let from = from
            .resolve(RangeEnd::Start)
            .ok_or(invalid("start date", DateRangeIssue::NotACalendarDate))?;
        let to = to
            .resolve(RangeEnd::End)
            .ok_or(invalid("end date", DateRangeIssue::NotACalendarDate))?;

        if from < dataset.min_date() {
            return Err(invalid("start date", DateRangeIssue::StartBeforeMinimum));
        }
        if to < from {
            return Err(invalid("end date", DateRangeIssue::EndBeforeStart));
        }
        if to.year() > dataset.max_year {
            return Err(invalid("end date", DateRangeIssue::EndAfterMaximum));
        }

        Ok(ValidatedRange { from, to })
    }
}

fn invalid(field: &'static str, reason: DateRangeIssue) -> ValidationError {
    ValidationError::InvalidDate { field, reason }
}
