//! Serialization of a [`Report`] into an OOXML spreadsheet.
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Formula, Workbook, Worksheet, XlsxError};

use crate::error::GenerationError;
use crate::report::{Cell, CellStyle, CellValue, Report, Row, COLUMN_COUNT};
use crate::status::AirQualityStatus;

/// MIME type of the generated document.
pub const CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
/// Filename suggested to clients downloading the report.
pub const FILENAME: &str = "Informe_Monitoreo_Ambiental.xlsx";

const SHEET_NAME: &str = "Reporte";

const HEADER_BLUE: u32 = 0x1E40AF;
const AGGREGATE_GREY: u32 = 0xE5E7EB;
const GOOD_GREEN: u32 = 0x16A34A;
const MODERATE_YELLOW: u32 = 0xFACC15;
const CRITICAL_RED: u32 = 0xDC2626;

fn status_color(status: AirQualityStatus) -> Color {
    match status {
        AirQualityStatus::Good => Color::RGB(GOOD_GREEN),
        AirQualityStatus::Moderate => Color::RGB(MODERATE_YELLOW),
        AirQualityStatus::Critical => Color::RGB(CRITICAL_RED),
    }
}

fn bordered() -> Format {
    Format::new().set_align(FormatAlign::Center).set_border(FormatBorder::Thin)
}

fn format_for(style: CellStyle) -> Format {
    match style {
        CellStyle::Title => Format::new().set_font_size(18).set_bold().set_align(FormatAlign::Center),
        CellStyle::Subtitle => Format::new().set_align(FormatAlign::Center),
        CellStyle::Banner(status) => {
            let format = Format::new()
                .set_font_size(14)
                .set_bold()
                .set_align(FormatAlign::Center)
                .set_background_color(status_color(status));
            match status {
                AirQualityStatus::Moderate => format,
                _ => format.set_font_color(Color::White),
            }
        }
        CellStyle::Header => bordered()
            .set_bold()
            .set_font_color(Color::White)
            .set_background_color(Color::RGB(HEADER_BLUE)),
        CellStyle::Data => bordered(),
        CellStyle::Pm25(status) => {
            let format = bordered().set_background_color(status_color(status));
            match status {
                AirQualityStatus::Moderate => format,
                _ => format.set_bold().set_font_color(Color::White),
            }
        }
        CellStyle::Aggregate => bordered().set_bold().set_background_color(Color::RGB(AGGREGATE_GREY)),
    }
}

fn write_cell(sheet: &mut Worksheet, row: u32, col: u16, cell: &Cell) -> Result<(), XlsxError> {
    let format = format_for(cell.style);
    match &cell.value {
        CellValue::Blank => sheet.write_blank(row, col, &format)?,
        CellValue::Text(text) => sheet.write_string_with_format(row, col, text, &format)?,
        CellValue::Number(number) => sheet.write_number_with_format(row, col, *number, &format)?,
        CellValue::Formula { formula, cached } => {
            sheet.write_formula_with_format(row, col, Formula::new(formula).set_result(cached), &format)?
        }
    };
    Ok(())
}

/// Writes `report` into a new workbook and returns the document bytes.
pub fn render(report: &Report) -> Result<Vec<u8>, GenerationError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let last_col = (COLUMN_COUNT - 1) as u16;
    for (index, row) in report.rows.iter().enumerate() {
        let index = index as u32;
        match row {
            Row::Merged(cell) => {
                let text = match &cell.value {
                    CellValue::Text(text) => text.as_str(),
                    _ => "",
                };
                sheet.merge_range(index, 0, index, last_col, text, &format_for(cell.style))?;
            }
            Row::Blank => {}
            Row::Cells(cells) => {
                for (col, cell) in cells.iter().enumerate() {
                    write_cell(sheet, index, col as u16, cell)?;
                }
            }
        }
    }

    for (col, width) in report.column_widths.iter().enumerate() {
        sheet.set_column_width(col as u16, *width)?;
    }
    sheet.set_freeze_panes(report.freeze_rows, 0)?;
    let filter = report.auto_filter;
    sheet.autofilter(filter.first_row, filter.first_col, filter.last_row, filter.last_col)?;

    let buffer = workbook.save_to_buffer()?;
    log::debug!(target: "airqd::report", "Serialized report into {} bytes, averages on row {}",
                buffer.len(), report.aggregate_row() + 1);
    Ok(buffer)
}
