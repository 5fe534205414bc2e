// src/report_csv.rs
use csv::Writer;
use tracing::info;

use crate::calendar::MonthKey;
use crate::error::ReportError;
use crate::model::TimeSlot;
use crate::report::{report_file_name, ReportInput};

/// Same naming as the PDF, with a `.csv` extension.
pub fn csv_file_name(server_name: &str, month: MonthKey) -> String {
    let pdf_name = report_file_name(server_name, month);
    format!("{}.csv", pdf_name.trim_end_matches(".pdf"))
}

/// One row per day: day, weekday, the eight time fields, status label.
pub fn render_csv(input: &ReportInput<'_>) -> Result<Vec<u8>, ReportError> {
    let mut wtr = Writer::from_writer(Vec::new());

    let mut head = vec!["Dia".to_string(), "Dia da Semana".to_string()];
    head.extend(TimeSlot::ALL.iter().map(|slot| slot.label()));
    head.push("Status".to_string());
    wtr.write_record(&head)?;

    for record in input.records {
        let mut row = vec![record.day.to_string(), record.weekday.clone()];
        row.extend(TimeSlot::ALL.iter().map(|slot| record.time(*slot).to_string()));
        row.push(record.status.map(|s| s.label().to_string()).unwrap_or_default());
        wtr.write_record(&row)?;
    }

    let bytes = wtr.into_inner().map_err(|e| ReportError::Io(e.into_error()))?;
    info!(
        "Rendered timesheet CSV for {} ({} rows)",
        input.month.doc_id(),
        input.records.len()
    );
    Ok(bytes)
}
