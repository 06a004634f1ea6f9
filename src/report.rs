//! Module that lays out the air quality report.
//!
//! The builder produces a [`Report`], a plain description of rows, cell values and cell
//! styles. Turning it into bytes is done by [`crate::xlsx`].
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::reading::{numeric_or_zero, Reading};
use crate::status::{classify, AirQualityStatus};

pub const TITLE: &str = "INFORME GENERAL DE MONITOREO";
pub const AGGREGATE_LABEL: &str = "PROMEDIO";
pub const HEADERS: [&str; COLUMN_COUNT] = [
    "Fecha",
    "Temperatura",
    "Humedad",
    "PM2.5",
    "PM10",
    "CO",
    "NO2",
    "O3",
    "SO2",
];
pub const COLUMN_WIDTHS: [f64; COLUMN_COUNT] = [22.0, 15.0, 15.0, 12.0, 12.0, 10.0, 10.0, 10.0, 10.0];
pub const COLUMN_COUNT: usize = 9;

const DATE_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
/// Column of PM2.5 within the measurements (the date column is not counted).
const PM25_MEASUREMENT: usize = 2;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
/// Switches selecting between the report variants.
pub struct ReportOptions {
    /// Write averaging formulas in the aggregate row instead of fixed values.
    #[serde(default)]
    pub use_live_formulas: bool,
    /// Show the status banner derived from the most recent reading.
    #[serde(default = "default_include_status_banner")]
    pub include_status_banner: bool,
    /// Time zone used for every timestamp in the report.
    #[serde(default = "default_time_zone")]
    pub time_zone: Tz,
}

fn default_include_status_banner() -> bool {
    true
}

fn default_time_zone() -> Tz {
    chrono_tz::America::Bogota
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            use_live_formulas: false,
            include_status_banner: default_include_status_banner(),
            time_zone: default_time_zone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellStyle {
    Title,
    Subtitle,
    Banner(AirQualityStatus),
    Header,
    Data,
    Pm25(AirQualityStatus),
    Aggregate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Blank,
    Text(String),
    Number(f64),
    /// Formula with the value a spreadsheet would show before recalculating.
    Formula { formula: String, cached: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    fn new(value: CellValue, style: CellStyle) -> Cell {
        Cell { value, style }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// A single text cell merged across every report column.
    Merged(Cell),
    Blank,
    Cells(Vec<Cell>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
/// Zero based, inclusive range of rows and columns.
pub struct CellRange {
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub rows: Vec<Row>,
    /// Status of the most recent reading, when the banner was rendered.
    pub status: Option<AirQualityStatus>,
    /// Index of the header row.
    pub header_row: u32,
    /// Number of data rows, always equal to the number of readings.
    pub data_rows: u32,
    /// Rows above this index stay visible while scrolling.
    pub freeze_rows: u32,
    pub auto_filter: CellRange,
    pub column_widths: [f64; COLUMN_COUNT],
}

impl Report {
    /// Index of the first data row.
    pub fn first_data_row(&self) -> u32 {
        self.header_row + 1
    }

    pub fn aggregate_row(&self) -> u32 {
        self.first_data_row() + self.data_rows
    }
}

/// Builds the report for `readings`, which are expected newest first.
///
/// Every reading is rendered in the order given. `now` is shown as the generation time.
pub fn build_report(readings: &[Reading], now: DateTime<Utc>, options: &ReportOptions) -> Report {
    let mut rows = Vec::with_capacity(readings.len() + 6);

    rows.push(Row::Merged(Cell::new(CellValue::Text(TITLE.to_string()), CellStyle::Title)));
    rows.push(Row::Merged(Cell::new(
        CellValue::Text(format!("Fecha de generación: {}", format_time(now, options.time_zone))),
        CellStyle::Subtitle,
    )));

    let status = match readings.first() {
        Some(latest) if options.include_status_banner => Some(classify(numeric_or_zero(latest.pm25))),
        _ => None,
    };
    if let Some(status) = status {
        rows.push(Row::Merged(Cell::new(
            CellValue::Text(format!("Estado actual de la calidad del aire: {}", status.label())),
            CellStyle::Banner(status),
        )));
    }
    rows.push(Row::Blank);

    let header_row = rows.len() as u32;
    rows.push(Row::Cells(
        HEADERS
            .iter()
            .map(|label| Cell::new(CellValue::Text(label.to_string()), CellStyle::Header))
            .collect(),
    ));

    let mut sums = [0.0f64; COLUMN_COUNT - 1];
    for reading in readings {
        let measurements = reading.measurements();
        let mut cells = Vec::with_capacity(COLUMN_COUNT);
        cells.push(Cell::new(
            CellValue::Text(format_time(reading.timestamp, options.time_zone)),
            CellStyle::Data,
        ));
        for (column, value) in measurements.iter().enumerate() {
            sums[column] += numeric_or_zero(*value);
            let style = if column == PM25_MEASUREMENT {
                CellStyle::Pm25(classify(numeric_or_zero(*value)))
            } else {
                CellStyle::Data
            };
            let value = match value {
                Some(number) if number.is_finite() => CellValue::Number(*number),
                _ => CellValue::Blank,
            };
            cells.push(Cell::new(value, style));
        }
        rows.push(Row::Cells(cells));
    }

    let data_rows = readings.len() as u32;
    let first_data_row = header_row + 1;
    let last_data_row = header_row + data_rows;
    let divisor = readings.len().max(1) as f64;

    let mut aggregates = Vec::with_capacity(COLUMN_COUNT);
    aggregates.push(Cell::new(CellValue::Text(AGGREGATE_LABEL.to_string()), CellStyle::Aggregate));
    for (column, sum) in sums.iter().enumerate() {
        let snapshot = format!("{:.2}", sum / divisor);
        let value = if options.use_live_formulas && data_rows > 0 {
            let letter = column_letter(column as u16 + 1);
            CellValue::Formula {
                // AVERAGE would skip blank cells, missing values count as zero here.
                formula: format!("SUM({0}{1}:{0}{2})/ROWS({0}{1}:{0}{2})", letter, first_data_row + 1, last_data_row + 1),
                cached: snapshot,
            }
        } else {
            CellValue::Text(snapshot)
        };
        aggregates.push(Cell::new(value, CellStyle::Aggregate));
    }
    rows.push(Row::Cells(aggregates));

    log::debug!(target: "airqd::report", "Laid out report with {} data rows", data_rows);

    Report {
        rows,
        status,
        header_row,
        data_rows,
        freeze_rows: header_row + 1,
        auto_filter: CellRange {
            first_row: header_row,
            first_col: 0,
            last_row: last_data_row,
            last_col: (COLUMN_COUNT - 1) as u16,
        },
        column_widths: COLUMN_WIDTHS,
    }
}

fn format_time(timestamp: DateTime<Utc>, time_zone: Tz) -> String {
    timestamp.with_timezone(&time_zone).format(DATE_FORMAT).to_string()
}

/// Spreadsheet letter of a zero based column. Reports never exceed column `Z`.
fn column_letter(column: u16) -> char {
    (b'A' + column as u8) as char
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reading::tests::reading;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 17, 30, 0).unwrap()
    }

    fn cells(row: &Row) -> &[Cell] {
        match row {
            Row::Cells(cells) => cells,
            other => panic!("expected a row of cells, got {:?}", other),
        }
    }

    fn text(cell: &Cell) -> &str {
        match &cell.value {
            CellValue::Text(text) => text,
            other => panic!("expected text, got {:?}", other),
        }
    }

    fn aggregate_texts(report: &Report) -> Vec<String> {
        cells(&report.rows[report.aggregate_row() as usize])[1..]
            .iter()
            .map(|cell| text(cell).to_string())
            .collect()
    }

    #[test]
    fn header_has_fixed_labels() {
        let readings: Vec<Reading> = (0..5).map(|i| reading(i, Some(10.0))).collect();
        let report = build_report(&readings, now(), &ReportOptions::default());
        let header: Vec<&str> = cells(&report.rows[report.header_row as usize]).iter().map(text).collect();
        assert_eq!(header, HEADERS.to_vec());
        assert!(cells(&report.rows[report.header_row as usize])
            .iter()
            .all(|cell| cell.style == CellStyle::Header));
    }

    #[test]
    fn averages_match_hand_computed_sums() {
        let mut first = reading(3, Some(10.0));
        first.temperature = Some(20.0);
        first.co = None;
        let mut second = reading(2, Some(20.5));
        second.temperature = Some(22.0);
        second.co = Some(1.0);
        let mut third = reading(1, None);
        third.temperature = Some(25.0);
        third.co = Some(f64::NAN);

        let report = build_report(&[first, second, third], now(), &ReportOptions::default());
        let averages = aggregate_texts(&report);
        // (20 + 22 + 25) / 3
        assert_eq!(averages[0], "22.33");
        // (10 + 20.5 + 0) / 3
        assert_eq!(averages[2], "10.17");
        // (0 + 1 + 0) / 3
        assert_eq!(averages[4], "0.33");
        assert_eq!(averages[1], "60.00");
    }

    #[test]
    fn empty_input_has_no_banner_and_zero_averages() {
        let report = build_report(&[], now(), &ReportOptions::default());
        assert_eq!(report.status, None);
        assert!(!report.rows.iter().any(|row| matches!(row, Row::Merged(Cell { style: CellStyle::Banner(_), .. }))));
        assert_eq!(report.data_rows, 0);
        assert_eq!(aggregate_texts(&report), vec!["0.00"; 8]);
        assert_eq!(report.auto_filter.first_row, report.header_row);
        assert_eq!(report.auto_filter.last_row, report.header_row);
    }

    #[test]
    fn renders_every_reading_in_order() {
        let readings: Vec<Reading> = vec![reading(30, Some(1.0)), reading(10, Some(2.0)), reading(20, Some(1.0))];
        let report = build_report(&readings, now(), &ReportOptions::default());
        assert_eq!(report.data_rows, 3);
        assert_eq!(report.rows.len() as u32, report.aggregate_row() + 1);
        let pm25: Vec<CellValue> = (0..3)
            .map(|i| cells(&report.rows[(report.first_data_row() + i) as usize])[3].value.clone())
            .collect();
        assert_eq!(pm25, vec![CellValue::Number(1.0), CellValue::Number(2.0), CellValue::Number(1.0)]);
    }

    #[test]
    fn identical_input_builds_identical_report() {
        let readings: Vec<Reading> = (0..4).map(|i| reading(i * 60, Some(i as f64 * 70.0))).collect();
        let options = ReportOptions::default();
        assert_eq!(build_report(&readings, now(), &options), build_report(&readings, now(), &options));
    }

    #[test]
    fn banner_and_pm25_cells_follow_classification() {
        let readings = vec![reading(2, Some(30.0)), reading(1, Some(200.0))];
        let report = build_report(&readings, now(), &ReportOptions::default());

        assert_eq!(report.status, Some(AirQualityStatus::Good));
        assert_eq!(
            report.rows[2],
            Row::Merged(Cell::new(
                CellValue::Text("Estado actual de la calidad del aire: BUENO".to_string()),
                CellStyle::Banner(AirQualityStatus::Good)
            ))
        );
        let first = report.first_data_row() as usize;
        assert_eq!(cells(&report.rows[first])[3].style, CellStyle::Pm25(AirQualityStatus::Good));
        assert_eq!(cells(&report.rows[first + 1])[3].style, CellStyle::Pm25(AirQualityStatus::Critical));
        assert_eq!(aggregate_texts(&report)[2], "115.00");
    }

    #[test]
    fn layout_metadata_covers_header_and_data() {
        let readings: Vec<Reading> = (0..3).map(|i| reading(i, Some(60.0))).collect();
        let report = build_report(&readings, now(), &ReportOptions::default());
        // title, subtitle, banner, blank
        assert_eq!(report.header_row, 4);
        assert_eq!(report.freeze_rows, 5);
        assert_eq!(
            report.auto_filter,
            CellRange { first_row: 4, first_col: 0, last_row: 7, last_col: 8 }
        );
        assert!(report.column_widths[0] > report.column_widths[1]);
    }

    #[test]
    fn dates_use_configured_time_zone() {
        let readings = vec![reading(0, Some(1.0))];
        let report = build_report(&readings, now(), &ReportOptions::default());
        assert_eq!(
            report.rows[1],
            Row::Merged(Cell::new(
                CellValue::Text("Fecha de generación: 01/03/2024 12:30:00".to_string()),
                CellStyle::Subtitle
            ))
        );
        let row = cells(&report.rows[report.first_data_row() as usize]);
        assert_eq!(text(&row[0]), "31/12/1969 19:00:00");

        let utc = ReportOptions { time_zone: chrono_tz::UTC, ..ReportOptions::default() };
        let report = build_report(&readings, now(), &utc);
        let row = cells(&report.rows[report.first_data_row() as usize]);
        assert_eq!(text(&row[0]), "01/01/1970 00:00:00");
    }

    #[test]
    fn missing_measurements_render_blank() {
        let mut r = reading(0, None);
        r.so2 = None;
        let report = build_report(&[r], now(), &ReportOptions::default());
        let row = cells(&report.rows[report.first_data_row() as usize]);
        assert_eq!(row[3].value, CellValue::Blank);
        assert_eq!(row[3].style, CellStyle::Pm25(AirQualityStatus::Good));
        assert_eq!(row[8].value, CellValue::Blank);
        assert_eq!(row[8].style, CellStyle::Data);
    }

    #[test]
    fn banner_can_be_disabled() {
        let options = ReportOptions { include_status_banner: false, ..ReportOptions::default() };
        let report = build_report(&[reading(0, Some(300.0))], now(), &options);
        assert_eq!(report.status, None);
        assert_eq!(report.header_row, 3);
    }

    #[test]
    fn live_formulas_reference_data_range() {
        let options = ReportOptions { use_live_formulas: true, ..ReportOptions::default() };
        let readings = vec![reading(2, Some(30.0)), reading(1, Some(200.0))];
        let report = build_report(&readings, now(), &options);
        let aggregates = cells(&report.rows[report.aggregate_row() as usize]);
        assert_eq!(
            aggregates[3].value,
            CellValue::Formula { formula: "SUM(D6:D7)/ROWS(D6:D7)".to_string(), cached: "115.00".to_string() }
        );
        assert_eq!(aggregates[1].value, CellValue::Formula {
            formula: "SUM(B6:B7)/ROWS(B6:B7)".to_string(),
            cached: "21.50".to_string()
        });

        let empty = build_report(&[], now(), &options);
        assert_eq!(aggregate_texts(&empty), vec!["0.00"; 8]);
    }

    #[test]
    fn live_formulas_count_missing_values_as_zero() {
        let options = ReportOptions { use_live_formulas: true, ..ReportOptions::default() };
        let readings = vec![reading(2, Some(30.0)), reading(1, None)];
        let report = build_report(&readings, now(), &options);
        let aggregates = cells(&report.rows[report.aggregate_row() as usize]);
        match &aggregates[3].value {
            CellValue::Formula { formula, cached } => {
                assert!(!formula.contains("AVERAGE"));
                assert_eq!(formula, "SUM(D6:D7)/ROWS(D6:D7)");
                assert_eq!(cached, "15.00");
            }
            other => panic!("expected a formula, got {:?}", other),
        }
    }
}
