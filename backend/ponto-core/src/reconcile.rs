// src/reconcile.rs
use std::collections::HashMap;

use crate::calendar::{template_for, MonthKey};
use crate::error::TimesheetError;
use crate::model::{DayRecord, MonthDocument, TimesheetHeader};

/// Layers stored day records over a freshly built template.
///
/// The output always has the template's length and day order. Stored entries
/// replace the template entry with the same day number; when several stored
/// entries share a day the last one wins. Days outside the template are
/// ignored. The weekday is always the template's, never the stored one.
pub fn reconcile(template: Vec<DayRecord>, stored: &[DayRecord]) -> Vec<DayRecord> {
    let by_day: HashMap<u32, &DayRecord> = stored.iter().map(|r| (r.day, r)).collect();

    template
        .into_iter()
        .map(|entry| match by_day.get(&entry.day) {
            Some(saved) => DayRecord {
                day: entry.day,
                weekday: entry.weekday,
                ..(*saved).clone()
            },
            None => entry,
        })
        .collect()
}

/// Header and records for a month, given the stored document if there is one.
pub fn load_month(
    key: MonthKey,
    stored: Option<&MonthDocument>,
) -> Result<(TimesheetHeader, Vec<DayRecord>), TimesheetError> {
    let template = template_for(key)?;
    Ok(match stored {
        Some(doc) => (
            TimesheetHeader::from_document(doc),
            reconcile(template, &doc.time_entries),
        ),
        None => (TimesheetHeader::default(), template),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::build_template;
    use crate::status::DayStatus;

    #[test]
    fn test_reconcile_with_nothing_stored_is_the_template() {
        let template = build_template(2024, 1).unwrap();
        assert_eq!(reconcile(template.clone(), &[]), template);
    }

    #[test]
    fn test_reconcile_overrides_only_the_stored_day() {
        let template = build_template(2024, 1).unwrap();
        let stored = vec![DayRecord {
            status: Some(DayStatus::Vacation),
            ..DayRecord::blank(5, "")
        }];

        let merged = reconcile(template.clone(), &stored);
        assert_eq!(merged.len(), template.len());
        for (got, want) in merged.iter().zip(template.iter()) {
            if got.day == 5 {
                assert_eq!(got.status, Some(DayStatus::Vacation));
                assert_eq!(got.weekday, want.weekday);
                assert_eq!(got.morning1_start, "");
            } else {
                assert_eq!(got, want);
            }
        }
    }

    #[test]
    fn test_stored_weekday_is_ignored() {
        let template = build_template(2024, 1).unwrap();
        let stored = vec![DayRecord {
            morning1_start: "08:00".to_string(),
            ..DayRecord::blank(1, "Segunda-feira")
        }];

        let merged = reconcile(template, &stored);
        assert_eq!(merged[0].weekday, "Quinta-feira");
        assert_eq!(merged[0].morning1_start, "08:00");
    }

    #[test]
    fn test_duplicates_and_out_of_range_days() {
        let template = build_template(2023, 1).unwrap();
        let stored = vec![
            DayRecord {
                afternoon1_start: "13:00".to_string(),
                ..DayRecord::blank(10, "")
            },
            DayRecord {
                afternoon1_start: "14:00".to_string(),
                ..DayRecord::blank(10, "")
            },
            DayRecord {
                status: Some(DayStatus::Holiday),
                ..DayRecord::blank(30, "")
            },
        ];

        let merged = reconcile(template, &stored);
        assert_eq!(merged.len(), 28);
        assert_eq!(merged[9].afternoon1_start, "14:00");
        assert!(merged.iter().all(|r| r.day <= 28));
    }

    #[test]
    fn test_load_month_without_document_uses_defaults() {
        let key = MonthKey::new(2024, 1).unwrap();
        let (header, records) = load_month(key, None).unwrap();
        assert_eq!(header, TimesheetHeader::default());
        assert_eq!(records.len(), 29);
    }

    #[test]
    fn test_load_month_with_document_without_entries() {
        let key = MonthKey::new(2024, 3).unwrap();
        let doc = MonthDocument {
            server_name: "Ana Souza".to_string(),
            route: "Integral".to_string(),
            ..Default::default()
        };
        let (header, records) = load_month(key, Some(&doc)).unwrap();
        assert_eq!(header.server_name, "Ana Souza");
        assert_eq!(header.route, "Integral");
        assert_eq!(header.vinculo, "Efetivo");
        assert_eq!(records, template_for(key).unwrap());
    }
}
