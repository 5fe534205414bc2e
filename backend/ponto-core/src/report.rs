// src/report.rs
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream, StringFormat};
use tracing::info;

use crate::calendar::MonthKey;
use crate::error::ReportError;
use crate::letterhead::Letterhead;
use crate::model::{DayRecord, TimeSlot, TimesheetHeader};

// --- Page Geometry (millimetres, origin at the top-left corner) ---

pub const PAGE_WIDTH_MM: f32 = 210.0;
pub const PAGE_HEIGHT_MM: f32 = 297.0;
const PT_PER_MM: f32 = 72.0 / 25.4;

const TABLE_LEFT: f32 = 14.0;
const TABLE_WIDTH: f32 = PAGE_WIDTH_MM - 2.0 * TABLE_LEFT;
const DAY_COLUMN_WIDTH: f32 = 30.0;
const TIME_COLUMN_WIDTH: f32 = (TABLE_WIDTH - DAY_COLUMN_WIDTH) / 8.0;
const HEAD_ROW_HEIGHT: f32 = 6.0;
const BODY_ROW_HEIGHT: f32 = 6.2;
const FIRST_PAGE_TABLE_TOP: f32 = 50.0;
const CONTINUATION_TABLE_TOP: f32 = 30.0;
const TABLE_BOTTOM_LIMIT: f32 = PAGE_HEIGHT_MM - 30.0;

const HEADER_INFO_Y: f32 = 38.0;
const HEADER_COLUMNS: [f32; 3] = [38.0, 110.0, 160.0];
const FOOTER_HEIGHT: f32 = 18.0;

pub const TITLE_LINE: &str = "SECRETARIA DE EDUCAÇÃO E ESPORTES | GERÊNCIA GERAL DE TRANSPORTE";
pub const SUBTITLE_LINE: &str = "FOLHA DE PONTO INDIVIDUAL";
pub const FOOTER_TITLE: &str = "SECRETARIA DE EDUCAÇÃO E ESPORTES";
pub const FOOTER_ADDRESS: &str = "Avenida Cícero José Dutra, Petrópolis, Caruaru - PE - CEP 55030-580";
pub const EMPLOYEE_SIGNATURE: &str = "Assinatura do Servidor";
pub const SUPERVISOR_SIGNATURE: &str = "Assinatura do Responsável pelo Setor";

type Rgb = (u8, u8, u8);
const BRAND_GREEN: Rgb = (22, 101, 52);
const WHITE: Rgb = (255, 255, 255);
const BLACK: Rgb = (0, 0, 0);
const GRID_GREY: Rgb = (128, 128, 128);
const NON_WORKDAY_FILL: Rgb = (240, 240, 240);
const MUTED_TEXT: Rgb = (85, 85, 85);

const LETTERHEAD_NAME: &str = "Im1";

/// Everything the renderer needs; borrowed from the session unmodified.
#[derive(Debug, Clone, Copy)]
pub struct ReportInput<'a> {
    pub header: &'a TimesheetHeader,
    pub month: MonthKey,
    pub records: &'a [DayRecord],
}

/// `Ponto_{First}_{Last}_{Month}_{Year}.pdf`; single-word names keep only that
/// word and an empty name becomes `Servidor`.
pub fn report_file_name(server_name: &str, month: MonthKey) -> String {
    let parts: Vec<&str> = server_name.split_whitespace().collect();
    let name = match parts.as_slice() {
        [] => "Servidor".to_string(),
        [only] => only.to_string(),
        [first, .., last] => format!("{}_{}", first, last),
    };
    format!("Ponto_{}_{}_{}.pdf", name, month.month_name(), month.year())
}

// --- Fonts ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Font {
    Regular,
    Bold,
    Italic,
}

impl Font {
    fn resource_name(self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Italic => "F3",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Italic => "Helvetica-Oblique",
        }
    }
}

// Helvetica advance widths for ' '..='~', in 1/1000 em.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

fn glyph_width(c: char) -> u16 {
    match u32::from(c) {
        code @ 32..=126 => HELVETICA_WIDTHS[(code - 32) as usize],
        _ if c.is_uppercase() => 722,
        _ => 556,
    }
}

/// Approximate rendered width in millimetres. Bold runs about 5% wider.
pub(crate) fn text_width_mm(text: &str, size_pt: f32, font: Font) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(glyph_width(c))).sum();
    let scale = if font == Font::Bold { 1.05 } else { 1.0 };
    units as f32 / 1000.0 * size_pt * scale / PT_PER_MM
}

/// WinAnsi covers Latin-1 for the accented letters Portuguese needs.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

// --- Page Canvas ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Align {
    Left,
    Center,
}

fn x_pt(x_mm: f32) -> Object {
    Object::Real(x_mm * PT_PER_MM)
}

fn y_pt(y_mm: f32) -> Object {
    Object::Real((PAGE_HEIGHT_MM - y_mm) * PT_PER_MM)
}

fn colour_operands((r, g, b): Rgb) -> Vec<Object> {
    vec![
        Object::Real(f32::from(r) / 255.0),
        Object::Real(f32::from(g) / 255.0),
        Object::Real(f32::from(b) / 255.0),
    ]
}

/// Drawing operations for one page, expressed in page millimetres.
#[derive(Debug, Default)]
pub(crate) struct PageCanvas {
    operations: Vec<Operation>,
    texts: Vec<String>,
}

impl PageCanvas {
    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, colour: Rgb) {
        self.operations.push(Operation::new("rg", colour_operands(colour)));
        self.operations.push(Operation::new(
            "re",
            vec![x_pt(x), y_pt(y + h), Object::Real(w * PT_PER_MM), Object::Real(h * PT_PER_MM)],
        ));
        self.operations.push(Operation::new("f", vec![]));
    }

    fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32) {
        self.set_stroke(GRID_GREY, 0.1);
        self.operations.push(Operation::new(
            "re",
            vec![x_pt(x), y_pt(y + h), Object::Real(w * PT_PER_MM), Object::Real(h * PT_PER_MM)],
        ));
        self.operations.push(Operation::new("S", vec![]));
    }

    fn line(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, colour: Rgb, width_mm: f32) {
        self.set_stroke(colour, width_mm);
        self.operations.push(Operation::new("m", vec![x_pt(x1), y_pt(y1)]));
        self.operations.push(Operation::new("l", vec![x_pt(x2), y_pt(y2)]));
        self.operations.push(Operation::new("S", vec![]));
    }

    fn set_stroke(&mut self, colour: Rgb, width_mm: f32) {
        self.operations.push(Operation::new("RG", colour_operands(colour)));
        self.operations.push(Operation::new("w", vec![Object::Real(width_mm * PT_PER_MM)]));
    }

    /// Draws `text` with its baseline at `y`; `x` is the left edge or the
    /// centre depending on `align`.
    fn text(&mut self, text: &str, font: Font, size_pt: f32, x: f32, y: f32, align: Align, colour: Rgb) {
        if text.is_empty() {
            return;
        }
        let left = match align {
            Align::Left => x,
            Align::Center => x - text_width_mm(text, size_pt, font) / 2.0,
        };
        self.operations.push(Operation::new("rg", colour_operands(colour)));
        self.operations.push(Operation::new("BT", vec![]));
        self.operations.push(Operation::new(
            "Tf",
            vec![Object::Name(font.resource_name().as_bytes().to_vec()), Object::Real(size_pt)],
        ));
        self.operations.push(Operation::new("Td", vec![x_pt(left), y_pt(y)]));
        self.operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ));
        self.operations.push(Operation::new("ET", vec![]));
        self.texts.push(text.to_string());
    }

    fn image(&mut self, name: &str, x: f32, y: f32, w: f32, h: f32) {
        self.operations.push(Operation::new("q", vec![]));
        self.operations.push(Operation::new(
            "cm",
            vec![
                Object::Real(w * PT_PER_MM),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(h * PT_PER_MM),
                x_pt(x),
                y_pt(y + h),
            ],
        ));
        self.operations.push(Operation::new("Do", vec![Object::Name(name.as_bytes().to_vec())]));
        self.operations.push(Operation::new("Q", vec![]));
    }

    /// Strings drawn on this page, in drawing order.
    pub(crate) fn texts(&self) -> &[String] {
        &self.texts
    }

    fn into_content(self) -> Content {
        Content {
            operations: self.operations,
        }
    }
}

// --- Page Furniture ---

fn draw_letterhead_and_title(page: &mut PageCanvas, letterhead: Option<&Letterhead>) {
    if let Some(letterhead) = letterhead {
        let (w, h) = letterhead.fit_within(22.0, 22.0);
        page.image(LETTERHEAD_NAME, 10.0, 8.0, w, h);
    }
    let centre = PAGE_WIDTH_MM / 2.0;
    page.text(TITLE_LINE, Font::Bold, 10.0, centre, 15.0, Align::Center, BLACK);
    page.text(SUBTITLE_LINE, Font::Bold, 12.0, centre, 22.0, Align::Center, BLACK);
}

fn draw_header_block(page: &mut PageCanvas, input: &ReportInput<'_>) {
    let header = input.header;
    let [col1, col2, col3] = HEADER_COLUMNS;
    let first = HEADER_INFO_Y;
    let second = HEADER_INFO_Y + 6.0;
    let year = input.month.year().to_string();

    let cells = [
        (format!("Servidor: {}", header.server_name), col1, first),
        (format!("CPF: {}", header.cpf), col2, first),
        (format!("Rota: {}", header.route), col3, first),
        (format!("Cargo: {}", header.role_with_bond()), col1, second),
        (format!("Mês: {}", input.month.month_name()), col2, second),
        (format!("Ano: {}", year), col3, second),
    ];
    for (text, x, y) in &cells {
        page.text(text, Font::Regular, 9.0, *x, *y, Align::Left, BLACK);
    }
}

fn draw_signatures_and_footer(page: &mut PageCanvas) {
    let signature_y = PAGE_HEIGHT_MM - 28.0;
    page.line(20.0, signature_y, 90.0, signature_y, BLACK, 0.2);
    page.text(EMPLOYEE_SIGNATURE, Font::Regular, 8.0, 55.0, signature_y + 4.0, Align::Center, BLACK);
    page.line(PAGE_WIDTH_MM - 90.0, signature_y, PAGE_WIDTH_MM - 20.0, signature_y, BLACK, 0.2);
    page.text(
        SUPERVISOR_SIGNATURE,
        Font::Regular,
        8.0,
        PAGE_WIDTH_MM - 55.0,
        signature_y + 4.0,
        Align::Center,
        BLACK,
    );

    let footer_y = PAGE_HEIGHT_MM - FOOTER_HEIGHT;
    page.fill_rect(0.0, footer_y, PAGE_WIDTH_MM, FOOTER_HEIGHT, BRAND_GREEN);
    let centre = PAGE_WIDTH_MM / 2.0;
    page.text(FOOTER_TITLE, Font::Bold, 9.0, centre, footer_y + 7.0, Align::Center, WHITE);
    page.text(FOOTER_ADDRESS, Font::Regular, 8.0, centre, footer_y + 12.0, Align::Center, WHITE);
}

// --- Table ---

fn time_column_x(column: usize) -> f32 {
    TABLE_LEFT + DAY_COLUMN_WIDTH + TIME_COLUMN_WIDTH * column as f32
}

// Baseline that centres text of `size_pt` vertically in a row.
fn baseline(row_top: f32, row_height: f32, size_pt: f32) -> f32 {
    row_top + row_height / 2.0 + size_pt * 0.35 / PT_PER_MM
}

/// Two-row table head; returns the y where the body starts.
fn draw_table_head(page: &mut PageCanvas, top: f32) -> f32 {
    let size = 7.0;
    let head_height = HEAD_ROW_HEIGHT * 2.0;
    page.fill_rect(TABLE_LEFT, top, TABLE_WIDTH, head_height, BRAND_GREEN);

    page.stroke_rect(TABLE_LEFT, top, DAY_COLUMN_WIDTH, head_height);
    page.text(
        "Dia",
        Font::Bold,
        size,
        TABLE_LEFT + DAY_COLUMN_WIDTH / 2.0,
        baseline(top, head_height, size),
        Align::Center,
        WHITE,
    );

    let group_width = TIME_COLUMN_WIDTH * 4.0;
    for (group, label) in ["Manhã", "Tarde"].iter().enumerate() {
        let x = time_column_x(group * 4);
        page.stroke_rect(x, top, group_width, HEAD_ROW_HEIGHT);
        page.text(
            label,
            Font::Bold,
            size,
            x + group_width / 2.0,
            baseline(top, HEAD_ROW_HEIGHT, size),
            Align::Center,
            WHITE,
        );
    }

    let second_row = top + HEAD_ROW_HEIGHT;
    for column in 0..8 {
        let x = time_column_x(column);
        let label = if column % 2 == 0 { "Início" } else { "Fim" };
        page.stroke_rect(x, second_row, TIME_COLUMN_WIDTH, HEAD_ROW_HEIGHT);
        page.text(
            label,
            Font::Bold,
            size,
            x + TIME_COLUMN_WIDTH / 2.0,
            baseline(second_row, HEAD_ROW_HEIGHT, size),
            Align::Center,
            WHITE,
        );
    }
    top + head_height
}

fn draw_day_row(page: &mut PageCanvas, record: &DayRecord, top: f32) {
    let size = 7.5;
    let text_y = baseline(top, BODY_ROW_HEIGHT, size);
    let collapsed = record.is_non_workday();
    if collapsed {
        page.fill_rect(TABLE_LEFT, top, TABLE_WIDTH, BODY_ROW_HEIGHT, NON_WORKDAY_FILL);
    }

    page.stroke_rect(TABLE_LEFT, top, DAY_COLUMN_WIDTH, BODY_ROW_HEIGHT);
    page.text(
        &format!("{}, {}", record.day, record.weekday),
        Font::Bold,
        size,
        TABLE_LEFT + 1.6,
        text_y,
        Align::Left,
        BLACK,
    );

    if collapsed {
        let span_left = time_column_x(0);
        let span_width = TIME_COLUMN_WIDTH * 8.0;
        let label = record
            .status
            .map(|s| s.label().to_string())
            .unwrap_or_else(|| record.weekday.clone());
        page.stroke_rect(span_left, top, span_width, BODY_ROW_HEIGHT);
        page.text(
            &label,
            Font::Italic,
            size,
            span_left + span_width / 2.0,
            text_y,
            Align::Center,
            MUTED_TEXT,
        );
        return;
    }

    for (column, slot) in TimeSlot::ALL.iter().enumerate() {
        let x = time_column_x(column);
        page.stroke_rect(x, top, TIME_COLUMN_WIDTH, BODY_ROW_HEIGHT);
        page.text(
            record.time(*slot),
            Font::Regular,
            size,
            x + TIME_COLUMN_WIDTH / 2.0,
            text_y,
            Align::Center,
            BLACK,
        );
    }
}

/// Lays out every page. The letterhead, titles and header block appear on the
/// first page; the table head, signatures and footer repeat on each page.
pub(crate) fn compose_pages(input: &ReportInput<'_>, letterhead: Option<&Letterhead>) -> Vec<PageCanvas> {
    let mut pages = Vec::new();
    let mut page = PageCanvas::default();
    draw_letterhead_and_title(&mut page, letterhead);
    draw_header_block(&mut page, input);
    let mut y = draw_table_head(&mut page, FIRST_PAGE_TABLE_TOP);

    for record in input.records {
        if y + BODY_ROW_HEIGHT > TABLE_BOTTOM_LIMIT {
            draw_signatures_and_footer(&mut page);
            pages.push(std::mem::take(&mut page));
            y = draw_table_head(&mut page, CONTINUATION_TABLE_TOP);
        }
        draw_day_row(&mut page, record, y);
        y += BODY_ROW_HEIGHT;
    }

    draw_signatures_and_footer(&mut page);
    pages.push(page);
    pages
}

// --- Document Assembly ---

fn font_dictionary(doc: &mut Document) -> Dictionary {
    let mut fonts = Dictionary::new();
    for font in [Font::Regular, Font::Bold, Font::Italic] {
        let id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource_name(), id);
    }
    fonts
}

/// Renders the monthly timesheet as an A4 PDF.
pub fn render_pdf(input: &ReportInput<'_>, letterhead: Option<&Letterhead>) -> Result<Vec<u8>, ReportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let fonts = font_dictionary(&mut doc);
    let mut resources = dictionary! { "Font" => fonts };
    if let Some(letterhead) = letterhead {
        let image_id = doc.add_object(letterhead.image().clone());
        resources.set("XObject", dictionary! { LETTERHEAD_NAME => image_id });
    }
    let resources_id = doc.add_object(resources);

    let canvases = compose_pages(input, letterhead);
    let page_count = canvases.len();
    let mut kids: Vec<Object> = Vec::with_capacity(page_count);
    for canvas in canvases {
        let content = canvas.into_content();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Real(PAGE_WIDTH_MM * PT_PER_MM),
            Object::Real(PAGE_HEIGHT_MM * PT_PER_MM),
        ],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    info!(
        "Rendered timesheet PDF for {} ({} page(s), {} bytes)",
        input.month.doc_id(),
        page_count,
        bytes.len()
    );
    Ok(bytes)
}
