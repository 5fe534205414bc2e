// src/model.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TimesheetError;
use crate::status::{self, DayStatus};

pub const DEFAULT_ROUTE: &str = "Regular";
pub const DEFAULT_VINCULO: &str = "Efetivo";

pub const VINCULO_OPTIONS: [&str; 6] = ["Efetivo", "Terceirizado", "Seleção", "RPA", "MEI", "Outro"];
pub const ROUTE_OPTIONS: [&str; 4] = ["Regular", "Integral", "Regular + Integral", "Outro"];

// --- Time Slots ---

/// The eight clock fields of a day, two morning and two afternoon shifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeSlot {
    Morning1Start,
    Morning1End,
    Morning2Start,
    Morning2End,
    Afternoon1Start,
    Afternoon1End,
    Afternoon2Start,
    Afternoon2End,
}

impl TimeSlot {
    /// Column order of the grid and of the PDF table.
    pub const ALL: [TimeSlot; 8] = [
        TimeSlot::Morning1Start,
        TimeSlot::Morning1End,
        TimeSlot::Morning2Start,
        TimeSlot::Morning2End,
        TimeSlot::Afternoon1Start,
        TimeSlot::Afternoon1End,
        TimeSlot::Afternoon2Start,
        TimeSlot::Afternoon2End,
    ];

    /// Field name used in stored documents and in the HTTP API.
    pub fn key(&self) -> &'static str {
        match self {
            TimeSlot::Morning1Start => "morning1Start",
            TimeSlot::Morning1End => "morning1End",
            TimeSlot::Morning2Start => "morning2Start",
            TimeSlot::Morning2End => "morning2End",
            TimeSlot::Afternoon1Start => "afternoon1Start",
            TimeSlot::Afternoon1End => "afternoon1End",
            TimeSlot::Afternoon2Start => "afternoon2Start",
            TimeSlot::Afternoon2End => "afternoon2End",
        }
    }

    /// Form label, e.g. "Manhã - Início 1".
    pub fn label(&self) -> String {
        let position = Self::ALL.iter().position(|s| s == self).unwrap_or(0);
        let period = if position / 4 == 0 { "Manhã" } else { "Tarde" };
        let edge = if position % 2 == 0 { "Início" } else { "Fim" };
        format!("{} - {} {}", period, edge, (position / 2) % 2 + 1)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for TimeSlot {
    type Err = TimesheetError;

    // Accepts the stored names as well as the long "morningSlot1Start" spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.replace("Slot", "");
        TimeSlot::ALL
            .into_iter()
            .find(|slot| slot.key().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| TimesheetError::UnknownSlot(s.to_string()))
    }
}

// --- Day Record ---

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub day: u32,
    #[serde(default, deserialize_with = "lenient::text")]
    pub weekday: String,
    #[serde(default, alias = "morningSlot1Start", deserialize_with = "lenient::text")]
    pub morning1_start: String,
    #[serde(default, alias = "morningSlot1End", deserialize_with = "lenient::text")]
    pub morning1_end: String,
    #[serde(default, alias = "morningSlot2Start", deserialize_with = "lenient::text")]
    pub morning2_start: String,
    #[serde(default, alias = "morningSlot2End", deserialize_with = "lenient::text")]
    pub morning2_end: String,
    #[serde(default, alias = "afternoonSlot1Start", deserialize_with = "lenient::text")]
    pub afternoon1_start: String,
    #[serde(default, alias = "afternoonSlot1End", deserialize_with = "lenient::text")]
    pub afternoon1_end: String,
    #[serde(default, alias = "afternoonSlot2Start", deserialize_with = "lenient::text")]
    pub afternoon2_start: String,
    #[serde(default, alias = "afternoonSlot2End", deserialize_with = "lenient::text")]
    pub afternoon2_end: String,
    #[serde(default, with = "status::empty_as_none")]
    pub status: Option<DayStatus>,
}

impl DayRecord {
    /// A day with no times and no status.
    pub fn blank(day: u32, weekday: &str) -> Self {
        Self {
            day,
            weekday: weekday.to_string(),
            ..Default::default()
        }
    }

    pub fn time(&self, slot: TimeSlot) -> &str {
        match slot {
            TimeSlot::Morning1Start => &self.morning1_start,
            TimeSlot::Morning1End => &self.morning1_end,
            TimeSlot::Morning2Start => &self.morning2_start,
            TimeSlot::Morning2End => &self.morning2_end,
            TimeSlot::Afternoon1Start => &self.afternoon1_start,
            TimeSlot::Afternoon1End => &self.afternoon1_end,
            TimeSlot::Afternoon2Start => &self.afternoon2_start,
            TimeSlot::Afternoon2End => &self.afternoon2_end,
        }
    }

    pub fn time_mut(&mut self, slot: TimeSlot) -> &mut String {
        match slot {
            TimeSlot::Morning1Start => &mut self.morning1_start,
            TimeSlot::Morning1End => &mut self.morning1_end,
            TimeSlot::Morning2Start => &mut self.morning2_start,
            TimeSlot::Morning2End => &mut self.morning2_end,
            TimeSlot::Afternoon1Start => &mut self.afternoon1_start,
            TimeSlot::Afternoon1End => &mut self.afternoon1_end,
            TimeSlot::Afternoon2Start => &mut self.afternoon2_start,
            TimeSlot::Afternoon2End => &mut self.afternoon2_end,
        }
    }

    /// True when any time or the status has been filled in.
    pub fn has_data(&self) -> bool {
        self.status.is_some() || TimeSlot::ALL.iter().any(|slot| !self.time(*slot).is_empty())
    }

    pub fn is_non_workday(&self) -> bool {
        status::is_non_workday(self)
    }
}

// --- Header ---

/// Identification block at the top of the form and of the PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimesheetHeader {
    pub server_name: String,
    pub cpf: String,
    pub role: String,
    pub vinculo: String,
    pub route: String,
}

impl Default for TimesheetHeader {
    fn default() -> Self {
        Self {
            server_name: String::new(),
            cpf: String::new(),
            role: String::new(),
            vinculo: DEFAULT_VINCULO.to_string(),
            route: DEFAULT_ROUTE.to_string(),
        }
    }
}

impl TimesheetHeader {
    /// Header as loaded from a stored document; empty route/vinculo fall back to defaults.
    pub fn from_document(doc: &MonthDocument) -> Self {
        let or_default = |value: &str, default: &str| {
            if value.is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        };
        Self {
            server_name: doc.server_name.clone(),
            cpf: doc.cpf.clone(),
            role: doc.role.clone(),
            vinculo: or_default(&doc.vinculo, DEFAULT_VINCULO),
            route: or_default(&doc.route, DEFAULT_ROUTE),
        }
    }

    /// "Cargo / Vínculo" as printed on the report.
    pub fn role_with_bond(&self) -> String {
        format!("{} / {}", self.role, self.vinculo)
    }
}

/// Partial header update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderPatch {
    pub server_name: Option<String>,
    pub cpf: Option<String>,
    pub role: Option<String>,
    pub vinculo: Option<String>,
    pub route: Option<String>,
}

// --- Month Document ---

/// Persisted unit for one user and one month. `time_entries` is sparse: only
/// days carrying data are written.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthDocument {
    #[serde(default, deserialize_with = "lenient::text")]
    pub server_name: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub cpf: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub role: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub route: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub vinculo: String,
    #[serde(default, deserialize_with = "lenient::entries")]
    pub time_entries: Vec<DayRecord>,
}

impl MonthDocument {
    pub fn compose(header: &TimesheetHeader, records: &[DayRecord]) -> Self {
        Self {
            server_name: header.server_name.clone(),
            cpf: header.cpf.clone(),
            role: header.role.clone(),
            route: header.route.clone(),
            vinculo: header.vinculo.clone(),
            time_entries: records.iter().filter(|r| r.has_data()).cloned().collect(),
        }
    }
}

/// Field readers for stored documents. A malformed value or day entry is
/// dropped with a warning so the rest of the month still loads.
mod lenient {
    use super::DayRecord;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;
    use tracing::warn;

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(text) => Ok(text),
            Value::Null => Ok(String::new()),
            other => {
                warn!("Ignoring non-text stored field value {}", other);
                Ok(String::new())
            }
        }
    }

    pub fn entries<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<DayRecord>, D::Error> {
        let raw = match Value::deserialize(deserializer)? {
            Value::Array(items) => items,
            Value::Null => return Ok(Vec::new()),
            other => {
                warn!("Ignoring stored timeEntries that is not a list: {}", other);
                return Ok(Vec::new());
            }
        };
        Ok(raw
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<DayRecord>(item.clone()) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping unreadable stored day entry {}: {}", item, e);
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_slot_parsing_accepts_both_spellings() {
        assert_eq!("morning1Start".parse::<TimeSlot>().unwrap(), TimeSlot::Morning1Start);
        assert_eq!("morningSlot1Start".parse::<TimeSlot>().unwrap(), TimeSlot::Morning1Start);
        assert_eq!("afternoonSlot2End".parse::<TimeSlot>().unwrap(), TimeSlot::Afternoon2End);
        assert!(matches!("lunch".parse::<TimeSlot>(), Err(TimesheetError::UnknownSlot(_))));
    }

    #[test]
    fn test_slot_labels_follow_grid_order() {
        assert_eq!(TimeSlot::Morning1Start.label(), "Manhã - Início 1");
        assert_eq!(TimeSlot::Morning2End.label(), "Manhã - Fim 2");
        assert_eq!(TimeSlot::Afternoon1End.label(), "Tarde - Fim 1");
        assert_eq!(TimeSlot::Afternoon2Start.label(), "Tarde - Início 2");
    }

    #[test]
    fn test_day_record_wire_format() {
        let mut record = DayRecord::blank(3, "Sexta-feira");
        record.morning1_start = "07:30".to_string();
        record.status = Some(DayStatus::PartialPresence);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["morning1Start"], json!("07:30"));
        assert_eq!(value["afternoon2End"], json!(""));
        assert_eq!(value["status"], json!("Presença Parcial"));

        let blank = serde_json::to_value(DayRecord::blank(4, "Sábado")).unwrap();
        assert_eq!(blank["status"], json!(""));
    }

    #[test]
    fn test_day_record_reads_sparse_and_legacy_entries() {
        let record: DayRecord = serde_json::from_value(json!({
            "day": 5,
            "status": "Férias"
        }))
        .unwrap();
        assert_eq!(record.status, Some(DayStatus::Vacation));
        assert!(record.weekday.is_empty());
        assert!(record.morning1_start.is_empty());

        let record: DayRecord = serde_json::from_value(json!({
            "day": 6,
            "morningSlot1Start": "08:00",
            "status": null
        }))
        .unwrap();
        assert_eq!(record.morning1_start, "08:00");
        assert_eq!(record.status, None);
    }

    #[test]
    fn test_unknown_status_loads_as_no_status() {
        let record: DayRecord = serde_json::from_value(json!({
            "day": 1,
            "morning1Start": "07:30",
            "status": "Licença"
        }))
        .unwrap();
        assert_eq!(record.status, None);
        assert_eq!(record.morning1_start, "07:30");
    }

    #[test]
    fn test_bad_values_in_document_do_not_lose_the_month() {
        let doc: MonthDocument = serde_json::from_value(json!({
            "serverName": "Maria Santos",
            "cpf": null,
            "role": 7,
            "timeEntries": [
                { "day": 1, "morning1Start": "07:30", "morning1End": null },
                { "day": "dois", "morning1Start": "08:00" },
                { "day": 3, "status": 42, "afternoon1Start": "13:00" }
            ]
        }))
        .unwrap();
        assert_eq!(doc.server_name, "Maria Santos");
        assert_eq!(doc.cpf, "");
        assert_eq!(doc.role, "");
        assert_eq!(doc.time_entries.len(), 2);
        assert_eq!(doc.time_entries[0].morning1_start, "07:30");
        assert_eq!(doc.time_entries[0].morning1_end, "");
        assert_eq!(doc.time_entries[1].day, 3);
        assert_eq!(doc.time_entries[1].status, None);
        assert_eq!(doc.time_entries[1].afternoon1_start, "13:00");

        let doc: MonthDocument = serde_json::from_value(json!({ "timeEntries": null })).unwrap();
        assert!(doc.time_entries.is_empty());
    }

    #[test]
    fn test_compose_keeps_only_days_with_data() {
        let mut records: Vec<DayRecord> = (1..=3).map(|d| DayRecord::blank(d, "Segunda-feira")).collect();
        records[1].afternoon1_end = "17:00".to_string();
        let header = TimesheetHeader {
            server_name: "Maria da Silva".to_string(),
            ..Default::default()
        };

        let doc = MonthDocument::compose(&header, &records);
        assert_eq!(doc.time_entries.len(), 1);
        assert_eq!(doc.time_entries[0].day, 2);
        assert_eq!(doc.route, DEFAULT_ROUTE);
        assert_eq!(doc.vinculo, DEFAULT_VINCULO);
    }

    #[test]
    fn test_header_defaults_fill_empty_stored_fields() {
        let doc = MonthDocument {
            server_name: "João".to_string(),
            role: "Motorista".to_string(),
            ..Default::default()
        };
        let header = TimesheetHeader::from_document(&doc);
        assert_eq!(header.route, "Regular");
        assert_eq!(header.vinculo, "Efetivo");
        assert_eq!(header.role_with_bond(), "Motorista / Efetivo");
    }
}
