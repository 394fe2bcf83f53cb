/// Common types and utilities shared across handlers and services
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
use std::sync::{Arc, RwLock};

use crate::errors::ServiceError;

/// Source of "now" for everything time-dependent.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for deterministic tests and replays
#[derive(Debug, Clone)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.write() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.write() {
            *guard = *guard + by;
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.read().map(|guard| *guard).unwrap_or_else(|_| Utc::now())
    }
}

/// Calendar year of `at` on the business calendar.
pub fn local_year(at: DateTime<Utc>, offset: FixedOffset) -> i32 {
    at.with_timezone(&offset).year()
}

/// Hour of day (0-23) of `at` on the business calendar.
pub fn local_hour(at: DateTime<Utc>, offset: FixedOffset) -> u32 {
    at.with_timezone(&offset).hour()
}

/// Calendar date of `at` on the business calendar.
pub fn local_date(at: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    at.with_timezone(&offset).date_naive()
}

/// First instant of the local day containing `at`.
pub fn local_day_start(at: DateTime<Utc>, offset: FixedOffset) -> Result<DateTime<Utc>, ServiceError> {
    local_midnight(local_date(at, offset), offset)
}

/// Half-open `[start, next_start)` UTC range of a local calendar month.
pub fn month_bounds(
    year: i32,
    month: u32,
    offset: FixedOffset,
) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
    if !(1..=12).contains(&month) {
        return Err(ServiceError::ValidationError(format!(
            "Month must be between 1 and 12, got {}",
            month
        )));
    }
    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| ServiceError::ValidationError(format!("Invalid year {}", year)))?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    }
    .ok_or_else(|| ServiceError::ValidationError(format!("Invalid year {}", year)))?;

    let start = local_midnight(first, offset)?;
    let end = local_midnight(next, offset)?;
    Ok((start, end))
}

fn local_midnight(date: NaiveDate, offset: FixedOffset) -> Result<DateTime<Utc>, ServiceError> {
    let naive = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| ServiceError::InternalError("midnight out of range".to_string()))?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| ServiceError::InternalError("ambiguous local midnight".to_string()))
}

/// Parses `YYYY-MM-DD` date bounds on the business calendar. The end day is included in full:
/// the returned upper bound is the following local midnight and is exclusive.
pub fn parse_date_range(
    start_date: Option<&str>,
    end_date: Option<&str>,
    offset: FixedOffset,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), ServiceError> {
    let parse = |raw: &str, label: &str| {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
            ServiceError::ValidationError(format!("Invalid {} date format: {}", label, e))
        })
    };

    let from = match start_date.filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(local_midnight(parse(raw, "start")?, offset)?),
        None => None,
    };
    let to = match end_date.filter(|s| !s.trim().is_empty()) {
        Some(raw) => {
            let day = parse(raw, "end")?;
            let next = day
                .succ_opt()
                .ok_or_else(|| ServiceError::ValidationError("End date out of range".into()))?;
            Some(local_midnight(next, offset)?)
        }
        None => None,
    };
    Ok((from, to))
}
