// src/form.rs
use chrono::NaiveTime;
use tracing::debug;

use crate::calendar::{template_for, MonthKey};
use crate::cpf::format_cpf;
use crate::error::TimesheetError;
use crate::model::{DayRecord, HeaderPatch, MonthDocument, TimeSlot, TimesheetHeader};
use crate::reconcile::load_month;
use crate::status::{is_weekend, DayStatus};

// --- Field Mutation ---

fn record_at(records: &mut [DayRecord], index: usize) -> Result<&mut DayRecord, TimesheetError> {
    let len = records.len();
    records
        .get_mut(index)
        .ok_or(TimesheetError::DayIndexOutOfRange { index, len })
}

/// Replaces one time field of the record at `index`. Values are taken as typed;
/// no ordering check between start and end is made.
pub fn set_time(
    records: &mut [DayRecord],
    index: usize,
    slot: TimeSlot,
    value: &str,
) -> Result<(), TimesheetError> {
    *record_at(records, index)?.time_mut(slot) = value.to_string();
    Ok(())
}

/// Replaces the status of the record at `index`. Weekends only accept clearing it.
pub fn set_status(
    records: &mut [DayRecord],
    index: usize,
    status: Option<DayStatus>,
) -> Result<(), TimesheetError> {
    let record = record_at(records, index)?;
    if status.is_some() && is_weekend(&record.weekday) {
        return Err(TimesheetError::StatusOnWeekend {
            day: record.day,
            weekday: record.weekday.clone(),
        });
    }
    record.status = status;
    Ok(())
}

// --- Form State Controller ---

/// In-memory editable copy of one month: header fields plus one record per day.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    month: MonthKey,
    header: TimesheetHeader,
    records: Vec<DayRecord>,
}

impl FormState {
    pub fn new(month: MonthKey) -> Result<Self, TimesheetError> {
        Ok(Self {
            month,
            header: TimesheetHeader::default(),
            records: template_for(month)?,
        })
    }

    pub fn month(&self) -> MonthKey {
        self.month
    }

    pub fn header(&self) -> &TimesheetHeader {
        &self.header
    }

    pub fn records(&self) -> &[DayRecord] {
        &self.records
    }

    /// Switches to `month` with blank records, keeping the header as typed.
    pub fn reset_to_template(&mut self, month: MonthKey) -> Result<(), TimesheetError> {
        self.records = template_for(month)?;
        self.month = month;
        Ok(())
    }

    /// Replaces header and records with the reconciled view of a stored
    /// document (or the defaults when the month was never saved).
    pub fn load(&mut self, month: MonthKey, stored: Option<&MonthDocument>) -> Result<(), TimesheetError> {
        let (header, records) = load_month(month, stored)?;
        debug!(
            "Loaded {} with {} stored entries",
            month.doc_id(),
            stored.map(|d| d.time_entries.len()).unwrap_or(0)
        );
        self.month = month;
        self.header = header;
        self.records = records;
        Ok(())
    }

    pub fn set_time(&mut self, index: usize, slot: TimeSlot, value: &str) -> Result<(), TimesheetError> {
        set_time(&mut self.records, index, slot, value)
    }

    pub fn set_status(&mut self, index: usize, status: Option<DayStatus>) -> Result<(), TimesheetError> {
        set_status(&mut self.records, index, status)
    }

    /// Fills a slot with `now` as `HH:MM` and returns the written value.
    pub fn stamp_time(&mut self, index: usize, slot: TimeSlot, now: NaiveTime) -> Result<String, TimesheetError> {
        let value = now.format("%H:%M").to_string();
        self.set_time(index, slot, &value)?;
        Ok(value)
    }

    pub fn set_cpf(&mut self, raw: &str) {
        self.header.cpf = format_cpf(raw);
    }

    pub fn update_header(&mut self, patch: HeaderPatch) {
        if let Some(name) = patch.server_name {
            self.header.server_name = name;
        }
        if let Some(cpf) = patch.cpf {
            self.set_cpf(&cpf);
        }
        if let Some(role) = patch.role {
            self.header.role = role;
        }
        if let Some(vinculo) = patch.vinculo {
            self.header.vinculo = vinculo;
        }
        if let Some(route) = patch.route {
            self.header.route = route;
        }
    }

    /// The payload a save writes.
    pub fn to_document(&self) -> MonthDocument {
        MonthDocument::compose(&self.header, &self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::build_template;

    #[test]
    fn test_set_time_touches_a_single_field() {
        let original = build_template(2024, 1).unwrap();
        let mut records = original.clone();

        set_time(&mut records, 2, TimeSlot::Morning1Start, "08:00").unwrap();

        assert_eq!(records[2].morning1_start, "08:00");
        let mut expected_day = original[2].clone();
        expected_day.morning1_start = "08:00".to_string();
        assert_eq!(records[2], expected_day);
        for (i, (got, want)) in records.iter().zip(original.iter()).enumerate() {
            if i != 2 {
                assert_eq!(got, want, "record {} changed", i);
            }
        }
    }

    #[test]
    fn test_set_time_accepts_inverted_ranges() {
        let mut records = build_template(2024, 1).unwrap();
        set_time(&mut records, 0, TimeSlot::Afternoon1Start, "18:00").unwrap();
        set_time(&mut records, 0, TimeSlot::Afternoon1End, "13:00").unwrap();
        assert_eq!(records[0].afternoon1_start, "18:00");
        assert_eq!(records[0].afternoon1_end, "13:00");
    }

    #[test]
    fn test_out_of_range_index_is_an_error() {
        let mut records = build_template(2023, 1).unwrap();
        assert_eq!(
            set_status(&mut records, 28, Some(DayStatus::Absence)),
            Err(TimesheetError::DayIndexOutOfRange { index: 28, len: 28 })
        );
    }

    #[test]
    fn test_set_status_and_clear() {
        let mut form = FormState::new(MonthKey::new(2024, 4).unwrap()).unwrap();
        form.set_status(9, Some(DayStatus::MedicalLeave)).unwrap();
        assert_eq!(form.records()[9].status, Some(DayStatus::MedicalLeave));
        form.set_status(9, None).unwrap();
        assert_eq!(form.records()[9].status, None);
    }

    #[test]
    fn test_weekend_takes_no_status() {
        // 2024-02-03 is a Saturday.
        let mut records = build_template(2024, 1).unwrap();
        assert_eq!(
            set_status(&mut records, 2, Some(DayStatus::Holiday)),
            Err(TimesheetError::StatusOnWeekend {
                day: 3,
                weekday: "Sábado".to_string()
            })
        );
        assert_eq!(records[2].status, None);

        records[2].status = Some(DayStatus::Holiday);
        set_status(&mut records, 2, None).unwrap();
        assert_eq!(records[2].status, None);
    }

    #[test]
    fn test_stamp_time_formats_hours_and_minutes() {
        let mut form = FormState::new(MonthKey::new(2024, 4).unwrap()).unwrap();
        let now = NaiveTime::from_hms_opt(7, 5, 42).unwrap();
        let value = form.stamp_time(3, TimeSlot::Morning1Start, now).unwrap();
        assert_eq!(value, "07:05");
        assert_eq!(form.records()[3].morning1_start, "07:05");
    }

    #[test]
    fn test_header_patch_formats_cpf_and_keeps_other_fields() {
        let mut form = FormState::new(MonthKey::new(2024, 4).unwrap()).unwrap();
        form.update_header(HeaderPatch {
            server_name: Some("Carlos Alberto Lima".to_string()),
            cpf: Some("98765432100".to_string()),
            ..Default::default()
        });
        form.update_header(HeaderPatch {
            role: Some("Monitor".to_string()),
            ..Default::default()
        });

        let header = form.header();
        assert_eq!(header.server_name, "Carlos Alberto Lima");
        assert_eq!(header.cpf, "987.654.321-00");
        assert_eq!(header.role, "Monitor");
        assert_eq!(header.route, "Regular");
    }

    #[test]
    fn test_reset_to_template_keeps_header() {
        let mut form = FormState::new(MonthKey::new(2024, 0).unwrap()).unwrap();
        form.set_cpf("11122233344");
        form.set_time(0, TimeSlot::Morning1Start, "07:00").unwrap();

        form.reset_to_template(MonthKey::new(2024, 1).unwrap()).unwrap();
        assert_eq!(form.records().len(), 29);
        assert!(form.records().iter().all(|r| !r.has_data()));
        assert_eq!(form.header().cpf, "111.222.333-44");
    }
}
