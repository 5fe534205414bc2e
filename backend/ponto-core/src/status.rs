// src/status.rs
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::TimesheetError;
use crate::model::DayRecord;

pub const SATURDAY: &str = "Sábado";
pub const SUNDAY: &str = "Domingo";

/// Day status labels offered on the form, in the order the select shows them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DayStatus {
    #[serde(rename = "Feriado")]
    Holiday,
    #[serde(rename = "Ponto Facultativo")]
    DiscretionaryHoliday,
    #[serde(rename = "Folga")]
    DayOff,
    #[serde(rename = "Falta")]
    Absence,
    #[serde(rename = "Atestado Médico")]
    MedicalLeave,
    #[serde(rename = "Recesso Escolar")]
    SchoolRecess,
    #[serde(rename = "Férias")]
    Vacation,
    #[serde(rename = "Presença Parcial")]
    PartialPresence,
}

impl DayStatus {
    pub const ALL: [DayStatus; 8] = [
        DayStatus::Holiday,
        DayStatus::DiscretionaryHoliday,
        DayStatus::DayOff,
        DayStatus::Absence,
        DayStatus::MedicalLeave,
        DayStatus::SchoolRecess,
        DayStatus::Vacation,
        DayStatus::PartialPresence,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DayStatus::Holiday => "Feriado",
            DayStatus::DiscretionaryHoliday => "Ponto Facultativo",
            DayStatus::DayOff => "Folga",
            DayStatus::Absence => "Falta",
            DayStatus::MedicalLeave => "Atestado Médico",
            DayStatus::SchoolRecess => "Recesso Escolar",
            DayStatus::Vacation => "Férias",
            DayStatus::PartialPresence => "Presença Parcial",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.label() == label)
    }

    /// Everything except partial presence removes the whole day from the grid.
    pub fn is_full_day_off(&self) -> bool {
        !matches!(self, DayStatus::PartialPresence)
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DayStatus {
    type Err = TimesheetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DayStatus::from_label(s.trim()).ok_or_else(|| TimesheetError::UnknownStatus(s.to_string()))
    }
}

/// Parses a form value where the empty string means "ordinary workday".
pub fn parse_optional_status(value: &str) -> Result<Option<DayStatus>, TimesheetError> {
    if value.trim().is_empty() {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

pub fn is_weekend(weekday: &str) -> bool {
    weekday == SATURDAY || weekday == SUNDAY
}

/// Weekend or full-day-off status. The grid and the PDF both render these rows
/// as a single label, so both must call this.
pub fn is_non_workday(record: &DayRecord) -> bool {
    let is_full_day_off = record.status.is_some_and(|s| s.is_full_day_off());
    is_weekend(&record.weekday) || is_full_day_off
}

/// Serde adapter persisting `Option<DayStatus>` as `""` or the status label.
/// Reading never fails: labels the form does not offer load as no status.
pub(crate) mod empty_as_none {
    use super::*;
    use serde_json::Value;
    use tracing::warn;

    pub fn serialize<S: Serializer>(value: &Option<DayStatus>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.map(|s| s.label()).unwrap_or(""))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<DayStatus>, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Null => Ok(None),
            Value::String(label) if label.trim().is_empty() => Ok(None),
            Value::String(label) => {
                let status = DayStatus::from_label(label.trim());
                if status.is_none() {
                    warn!("Ignoring unknown stored day status '{}'", label);
                }
                Ok(status)
            }
            other => {
                warn!("Ignoring non-text stored day status {}", other);
                Ok(None)
            }
        }
    }
}
