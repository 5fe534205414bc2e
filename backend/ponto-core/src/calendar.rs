// src/calendar.rs
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};

use crate::error::TimesheetError;
use crate::model::DayRecord;

pub const MONTH_NAMES: [&str; 12] = [
    "Janeiro",
    "Fevereiro",
    "Março",
    "Abril",
    "Maio",
    "Junho",
    "Julho",
    "Agosto",
    "Setembro",
    "Outubro",
    "Novembro",
    "Dezembro",
];

/// A selected month. `month` is the 0-based index used by the form (0 = Janeiro).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, TimesheetError> {
        if month > 11 {
            return Err(TimesheetError::InvalidMonth(month));
        }
        // Both the first of this month and of the next must be representable.
        let key = Self { year, month };
        key.first_day()?;
        key.days_in_month()?;
        Ok(key)
    }

    /// The month containing `now`.
    pub fn containing(now: NaiveDateTime) -> Self {
        Self {
            year: now.year(),
            month: now.month0(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[self.month as usize]
    }

    /// Document id, `YYYY-MM` with a 1-based month.
    pub fn doc_id(&self) -> String {
        format!("{}-{:02}", self.year, self.month + 1)
    }

    fn first_day(&self) -> Result<NaiveDate, TimesheetError> {
        NaiveDate::from_ymd_opt(self.year, self.month + 1, 1).ok_or(TimesheetError::InvalidYear(self.year))
    }

    /// Last day of the month, i.e. the day before the first of the next month.
    pub fn days_in_month(&self) -> Result<u32, TimesheetError> {
        let (next_year, next_month) = if self.month == 11 {
            (self.year + 1, 1)
        } else {
            (self.year, self.month + 2)
        };
        NaiveDate::from_ymd_opt(next_year, next_month, 1)
            .and_then(|first_of_next| first_of_next.pred_opt())
            .map(|last| last.day())
            .ok_or(TimesheetError::InvalidYear(self.year))
    }

    pub fn date(&self, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month + 1, day)
    }
}

/// Days in a month given a 0-based month index.
pub fn days_in_month(year: i32, month: u32) -> Result<u32, TimesheetError> {
    MonthKey::new(year, month)?.days_in_month()
}

/// pt-BR weekday name with the first letter capitalized.
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Segunda-feira",
        Weekday::Tue => "Terça-feira",
        Weekday::Wed => "Quarta-feira",
        Weekday::Thu => "Quinta-feira",
        Weekday::Fri => "Sexta-feira",
        Weekday::Sat => "Sábado",
        Weekday::Sun => "Domingo",
    }
}

/// Builds the blank records for every day of the month, in ascending order.
pub fn build_template(year: i32, month: u32) -> Result<Vec<DayRecord>, TimesheetError> {
    template_for(MonthKey::new(year, month)?)
}

pub fn template_for(key: MonthKey) -> Result<Vec<DayRecord>, TimesheetError> {
    let days = key.days_in_month()?;
    (1..=days)
        .map(|day| {
            key.date(day)
                .map(|date| DayRecord::blank(day, weekday_name(date.weekday())))
                .ok_or(TimesheetError::InvalidYear(key.year))
        })
        .collect()
}

/// Year choices for the form: five years back through four years ahead.
pub fn selectable_years(current_year: i32) -> Vec<i32> {
    (0..10).map(|i| current_year - 5 + i).collect()
}
