#![cfg(not(tarpaulin_include))]

use crate::table::Table;
use std::error::Error;

/// Convert a table to CSV format
///
/// The first line holds the column names, then one line per record.
/// Fields containing commas, quotes or newlines are quoted, with inner
/// quotes doubled.
///
/// # Examples
/// ```
/// use merchant_panel::downloader::to_csv;
/// use merchant_panel::table::Table;
///
/// let mut table = Table::new(vec!["NOMBRE".into(), "NOTA".into()]);
/// table.rows.push(vec!["Ana".into(), "dice \"hola\", adiós".into()]);
/// assert_eq!(to_csv(&table), "NOMBRE,NOTA\nAna,\"dice \"\"hola\"\", adiós\"\n");
/// ```
pub fn to_csv(table: &Table) -> String {
    let mut csv_content = String::new();

    push_csv_line(&mut csv_content, &table.columns);
    for row in &table.rows {
        push_csv_line(&mut csv_content, row);
    }

    csv_content
}

fn push_csv_line(csv_content: &mut String, fields: &[String]) {
    for (i, value) in fields.iter().enumerate() {
        if i > 0 {
            csv_content.push(',');
        }
        if value.contains(',') || value.contains('"') || value.contains('\n') {
            let escaped = value.replace('"', "\"\"");
            csv_content.push_str(&format!("\"{}\"", escaped));
        } else {
            csv_content.push_str(value);
        }
    }
    csv_content.push('\n');
}

/// Convert a table to XLSX format
///
/// Writes one worksheet with the header in row 1 and every value as a string
/// cell, using the rust_xlsxwriter library.
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>, Box<dyn Error>> {
    use rust_xlsxwriter::{Workbook, Worksheet};

    let mut workbook = Workbook::new();
    let mut worksheet = Worksheet::new();

    for (c, name) in table.columns.iter().enumerate() {
        worksheet.write_string(0, c as u16, name)?;
    }
    for (r, row) in table.rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                worksheet.write_string((r + 1) as u32, c as u16, value)?;
            }
        }
    }

    workbook.push_worksheet(worksheet);

    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}
