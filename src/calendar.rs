//! Workday calendar
//!
//! The planner never decides on its own what a workday is; it asks a
//! `WorkCalendar`. Walking forward through the calendar goes through the
//! bounded `Workdays` iterator so that every walk has a hard horizon.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Workday lookup consumed by the planner
pub trait WorkCalendar: Send + Sync {
    /// True if `date` is a working day in `country_code`
    fn is_workday(&self, date: NaiveDate, country_code: &str) -> bool;
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Monday to Friday, every country
#[derive(Debug, Clone, Copy, Default)]
pub struct WeekendCalendar;

impl WorkCalendar for WeekendCalendar {
    fn is_workday(&self, date: NaiveDate, _country_code: &str) -> bool {
        !is_weekend(date)
    }
}

/// Weekends plus per-country public holidays
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolidayCalendar {
    holidays: BTreeMap<String, BTreeSet<NaiveDate>>,
}

impl HolidayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a holiday for a country (country codes are case-insensitive)
    pub fn with_holiday(mut self, country_code: &str, date: NaiveDate) -> Self {
        self.add_holiday(country_code, date);
        self
    }

    pub fn add_holiday(&mut self, country_code: &str, date: NaiveDate) {
        self.holidays
            .entry(country_code.to_ascii_uppercase())
            .or_default()
            .insert(date);
    }

    pub fn is_holiday(&self, date: NaiveDate, country_code: &str) -> bool {
        self.holidays
            .iter()
            .any(|(country, days)| country.eq_ignore_ascii_case(country_code) && days.contains(&date))
    }

    pub fn len(&self) -> usize {
        self.holidays.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WorkCalendar for HolidayCalendar {
    fn is_workday(&self, date: NaiveDate, country_code: &str) -> bool {
        !is_weekend(date) && !self.is_holiday(date, country_code)
    }
}

/// Lazy sequence of workdays from a start date, bounded by a horizon
///
/// The horizon counts calendar days, not workdays, so a calendar with no
/// workdays at all still terminates.
pub struct Workdays<'a> {
    calendar: &'a dyn WorkCalendar,
    country_code: &'a str,
    cursor: Option<NaiveDate>,
    last: NaiveDate,
}

impl<'a> Workdays<'a> {
    pub fn new(calendar: &'a dyn WorkCalendar, country_code: &'a str, from: NaiveDate, horizon_days: u32) -> Self {
        let last = from
            .checked_add_days(Days::new(u64::from(horizon_days)))
            .unwrap_or(NaiveDate::MAX);
        Self::until(calendar, country_code, from, last)
    }

    /// Workdays in `from..=last`
    pub fn until(calendar: &'a dyn WorkCalendar, country_code: &'a str, from: NaiveDate, last: NaiveDate) -> Self {
        Self {
            calendar,
            country_code,
            cursor: Some(from),
            last,
        }
    }
}

impl Iterator for Workdays<'_> {
    type Item = NaiveDate;

    fn next(&mut self) -> Option<NaiveDate> {
        while let Some(day) = self.cursor {
            if day > self.last {
                self.cursor = None;
                return None;
            }
            self.cursor = day.succ_opt();
            if self.calendar.is_workday(day, self.country_code) {
                return Some(day);
            }
        }
        None
    }
}

/// First workday on or after `date`, within the horizon
pub fn workday_on_or_after(
    calendar: &dyn WorkCalendar,
    country_code: &str,
    date: NaiveDate,
    horizon_days: u32,
) -> Option<NaiveDate> {
    Workdays::new(calendar, country_code, date, horizon_days).next()
}

/// First workday strictly after `date`, within the horizon
pub fn workday_after(
    calendar: &dyn WorkCalendar,
    country_code: &str,
    date: NaiveDate,
    horizon_days: u32,
) -> Option<NaiveDate> {
    date.succ_opt()
        .and_then(|next| workday_on_or_after(calendar, country_code, next, horizon_days))
}
