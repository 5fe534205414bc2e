// src/report_tests.rs

#[cfg(test)]
mod tests {
    use crate::calendar::{build_template, MonthKey};
    use crate::error::ReportError;
    use crate::letterhead::Letterhead;
    use crate::model::{DayRecord, TimesheetHeader};
    use crate::report::*;
    use crate::report_csv::{csv_file_name, render_csv};
    use crate::status::DayStatus;

    // 2x1 RGB PNG.
    const TINY_PNG: [u8; 72] = [
        0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44, 0x52,
        0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x01, 0x08, 0x02, 0x00, 0x00, 0x00, 0x7b, 0x40, 0xe8,
        0xdd, 0x00, 0x00, 0x00, 0x0f, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x10, 0x4b, 0x35, 0xf9,
        0xff, 0xff, 0x3f, 0x00, 0x09, 0x4e, 0x03, 0xad, 0x03, 0xdf, 0x02, 0x22, 0x00, 0x00, 0x00, 0x00,
        0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
    ];

    fn february() -> MonthKey {
        MonthKey::new(2024, 1).unwrap()
    }

    fn sample_header() -> TimesheetHeader {
        TimesheetHeader {
            server_name: "Maria da Silva Santos".to_string(),
            cpf: "123.456.789-01".to_string(),
            role: "Motorista".to_string(),
            ..TimesheetHeader::default()
        }
    }

    fn sample_records() -> Vec<DayRecord> {
        let mut records = build_template(2024, 1).unwrap();
        // Day 1 is a Thursday, day 3 a Saturday.
        records[0].morning1_start = "07:30".to_string();
        records[0].morning1_end = "11:30".to_string();
        records[2].morning1_start = "09:00".to_string();
        records[4].status = Some(DayStatus::Absence);
        records[5].status = Some(DayStatus::PartialPresence);
        records[5].afternoon1_start = "13:00".to_string();
        records
    }

    // --- File names ---

    #[test]
    fn test_report_file_name_uses_first_and_last_name() {
        assert_eq!(
            report_file_name("Maria da Silva Santos", february()),
            "Ponto_Maria_Santos_Fevereiro_2024.pdf"
        );
        assert_eq!(
            report_file_name("  Joana  ", february()),
            "Ponto_Joana_Fevereiro_2024.pdf"
        );
        assert_eq!(report_file_name("", february()), "Ponto_Servidor_Fevereiro_2024.pdf");
        assert_eq!(
            csv_file_name("Maria Santos", february()),
            "Ponto_Maria_Santos_Fevereiro_2024.csv"
        );
    }

    // --- Layout ---

    #[test]
    fn test_first_page_carries_titles_header_and_footer() {
        let header = sample_header();
        let records = sample_records();
        let input = ReportInput { header: &header, month: february(), records: &records };

        let pages = compose_pages(&input, None);
        assert_eq!(pages.len(), 1);
        let texts = pages[0].texts();
        for expected in [
            TITLE_LINE,
            SUBTITLE_LINE,
            "Servidor: Maria da Silva Santos",
            "CPF: 123.456.789-01",
            "Rota: Regular",
            "Cargo: Motorista / Efetivo",
            "Mês: Fevereiro",
            "Ano: 2024",
            "Dia",
            "Manhã",
            "Tarde",
            EMPLOYEE_SIGNATURE,
            SUPERVISOR_SIGNATURE,
            FOOTER_TITLE,
            FOOTER_ADDRESS,
        ] {
            assert!(texts.iter().any(|t| t == expected), "missing text {:?}", expected);
        }
        assert_eq!(texts.iter().filter(|t| *t == "Início").count(), 4);
    }

    #[test]
    fn test_non_workdays_collapse_to_a_label() {
        let header = sample_header();
        let records = sample_records();
        let input = ReportInput { header: &header, month: february(), records: &records };
        let pages = compose_pages(&input, None);
        let texts = pages[0].texts();

        // Saturday: weekday label, its stray time is not drawn.
        assert!(texts.iter().any(|t| t == "3, Sábado"));
        assert!(!texts.iter().any(|t| t == "09:00"));
        // Absence on a Monday collapses with the status label.
        assert!(texts.iter().any(|t| t == "5, Segunda-feira"));
        assert!(texts.iter().any(|t| t == "Falta"));
        // Partial presence keeps its times.
        assert!(texts.iter().any(|t| t == "13:00"));
        assert!(texts.iter().any(|t| t == "07:30"));
    }

    #[test]
    fn test_long_tables_repeat_head_and_footer() {
        let header = sample_header();
        let mut records = build_template(2024, 0).unwrap();
        records.extend(build_template(2024, 2).unwrap());
        let input = ReportInput { header: &header, month: february(), records: &records };

        let pages = compose_pages(&input, None);
        assert_eq!(pages.len(), 2);
        let second = pages[1].texts();
        assert!(second.iter().any(|t| t == "Dia"));
        assert!(second.iter().any(|t| t == FOOTER_ADDRESS));
        assert!(!second.iter().any(|t| t == SUBTITLE_LINE));
    }

    #[test]
    fn test_centred_text_width_grows_with_length() {
        let short = text_width_mm("Fim", 7.0, Font::Bold);
        let long = text_width_mm("Início", 7.0, Font::Bold);
        assert!(short > 0.0 && long > short);
    }

    // --- PDF bytes ---

    #[test]
    fn test_render_pdf_produces_a_loadable_document() {
        let header = sample_header();
        let records = sample_records();
        let input = ReportInput { header: &header, month: february(), records: &records };

        let bytes = render_pdf(&input, None).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        let doc = lopdf::Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_render_pdf_with_letterhead() {
        let letterhead = Letterhead::from_bytes(TINY_PNG.to_vec(), "tiny.png").unwrap();
        assert_eq!(letterhead.fit_within(22.0, 22.0), (22.0, 11.0));

        let header = sample_header();
        let records = sample_records();
        let input = ReportInput { header: &header, month: february(), records: &records };
        let with_logo = render_pdf(&input, Some(&letterhead)).unwrap();
        let without_logo = render_pdf(&input, None).unwrap();
        assert!(with_logo.starts_with(b"%PDF"));
        assert!(with_logo.len() > without_logo.len());
    }

    #[test]
    fn test_letterhead_failures_are_reported() {
        let garbage = Letterhead::from_bytes(b"not an image".to_vec(), "garbage.png");
        assert!(matches!(garbage, Err(ReportError::Letterhead { .. })));
    }

    #[tokio::test]
    async fn test_missing_letterhead_file_fails() {
        let result = Letterhead::load("/definitely/not/here/logo.png").await;
        match result {
            Err(ReportError::Letterhead { source_desc, .. }) => {
                assert_eq!(source_desc, "/definitely/not/here/logo.png")
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    // --- CSV ---

    #[test]
    fn test_csv_has_one_row_per_day() {
        let header = sample_header();
        let records = sample_records();
        let input = ReportInput { header: &header, month: february(), records: &records };

        let bytes = render_csv(&input).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 30);
        assert!(lines[0].starts_with("Dia,Dia da Semana,Manhã - Início 1"));
        assert!(lines[0].ends_with(",Status"));
        assert_eq!(lines[1], "1,Quinta-feira,07:30,11:30,,,,,,,");
        assert_eq!(lines[5], "5,Segunda-feira,,,,,,,,,Falta");
    }
}
