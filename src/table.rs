use serde::Serialize;
use std::collections::HashMap;

use crate::error::{PanelError, Result};

/// In-memory snapshot of a worksheet.
///
/// `columns` is the column set read from the header row. Every row in `rows`
/// holds exactly one value per column, in column order, so a record is the
/// pairing of `columns` with one row. Rows have no identity beyond their
/// position, which shifts on every insert or delete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from the raw cell grid of a worksheet.
    ///
    /// Row 0 is the header. Headers are trimmed and uppercased, blank headers
    /// become `UNNAMED: <n>` and repeats get `.1`, `.2` suffixes. Data rows are
    /// padded with empty strings to the column count; rows whose cells are all
    /// empty are dropped.
    ///
    /// # Arguments
    /// * `grid` - Cell values row by row, as returned by the worksheet
    ///
    /// # Returns
    /// * `Table` - The normalized table; empty when `grid` has no rows
    ///
    /// # Examples
    /// ```
    /// use merchant_panel::Table;
    ///
    /// let grid = vec![
    ///     vec![" nombre".to_string(), "Telefono".to_string()],
    ///     vec!["Ana".to_string()],
    ///     vec![String::new(), String::new()],
    /// ];
    /// let table = Table::from_grid(grid);
    /// assert_eq!(table.columns, vec!["NOMBRE", "TELEFONO"]);
    /// assert_eq!(table.rows, vec![vec!["Ana".to_string(), String::new()]]);
    /// ```
    pub fn from_grid(grid: Vec<Vec<String>>) -> Self {
        let mut grid = grid.into_iter();
        let header = match grid.next() {
            Some(header) => header,
            None => return Table::default(),
        };

        let data: Vec<Vec<String>> = grid
            .filter(|row| row.iter().any(|cell| !cell.is_empty()))
            .collect();

        let width = data
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(header.len()))
            .max()
            .unwrap_or(0);

        let mut columns: Vec<String> = Vec::with_capacity(width);
        for position in 0..width {
            let raw = header.get(position).map(|h| h.trim()).unwrap_or("");
            let base = if raw.is_empty() {
                format!("UNNAMED: {}", position)
            } else {
                raw.to_uppercase()
            };
            columns.push(dedupe_column(&columns, base));
        }

        let rows = data
            .into_iter()
            .map(|mut row| {
                row.resize(width, String::new());
                row
            })
            .collect();

        Table { columns, rows }
    }

    /// Flatten the table back into a cell grid, header first.
    pub fn to_grid(&self) -> Vec<Vec<String>> {
        if self.columns.is_empty() {
            return Vec::new();
        }
        let mut grid = Vec::with_capacity(self.rows.len() + 1);
        grid.push(self.columns.clone());
        grid.extend(self.rows.iter().cloned());
        grid
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == column)
            .ok_or_else(|| PanelError::UnknownColumn(column.to_string()))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.column_index(column).ok()?;
        self.rows.get(row).map(|r| r[col].as_str())
    }

    /// The record at `index` as column/value pairs in column order.
    pub fn record(&self, index: usize) -> Option<Vec<(&str, &str)>> {
        let row = self.rows.get(index)?;
        Some(
            self.columns
                .iter()
                .map(String::as_str)
                .zip(row.iter().map(String::as_str))
                .collect(),
        )
    }

    /// Append a record built from labelled input.
    ///
    /// Values are matched to columns by name; columns without a value get an
    /// empty string and labels that are not columns are ignored.
    ///
    /// # Arguments
    /// * `fields` - Value per column name, typically the submitted add form
    ///
    /// # Examples
    /// ```
    /// use merchant_panel::Table;
    /// use std::collections::HashMap;
    ///
    /// let mut table = Table::new(vec!["NOMBRE".into(), "TELEFONO".into()]);
    /// let fields = HashMap::from([("NOMBRE".to_string(), "Eva".to_string())]);
    /// table.push_record(&fields);
    /// assert_eq!(table.value(0, "NOMBRE"), Some("Eva"));
    /// assert_eq!(table.value(0, "TELEFONO"), Some(""));
    /// ```
    pub fn push_record(&mut self, fields: &HashMap<String, String>) {
        let row = self
            .columns
            .iter()
            .map(|c| fields.get(c).cloned().unwrap_or_default())
            .collect();
        self.rows.push(row);
    }

    /// Overwrite one cell. An empty value is rejected and leaves the table untouched.
    ///
    /// # Arguments
    /// * `index` - Position of the record
    /// * `column` - Column name
    /// * `value` - New cell text, must not be empty
    ///
    /// # Returns
    /// * `Result<()>` - `EmptyValue`, `UnknownColumn` or `RowOutOfRange` on bad input
    pub fn set_cell(&mut self, index: usize, column: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            return Err(PanelError::EmptyValue);
        }
        let col = self.column_index(column)?;
        let len = self.rows.len();
        let row = self
            .rows
            .get_mut(index)
            .ok_or(PanelError::RowOutOfRange { index, len })?;
        row[col] = value.to_string();
        Ok(())
    }

    /// Remove the record at `index`; later records move down by one.
    ///
    /// # Returns
    /// * `Result<Vec<String>>` - The removed row, or `RowOutOfRange`
    pub fn remove_record(&mut self, index: usize) -> Result<Vec<String>> {
        if index >= self.rows.len() {
            return Err(PanelError::RowOutOfRange {
                index,
                len: self.rows.len(),
            });
        }
        Ok(self.rows.remove(index))
    }
}

fn dedupe_column(existing: &[String], base: String) -> String {
    if !existing.contains(&base) {
        return base;
    }
    let mut n = 1;
    loop {
        let candidate = format!("{}.{}", base, n);
        if !existing.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    fn contacts() -> Table {
        Table::from_grid(grid(&[
            &["Nombre", "Telefono"],
            &["Ana", "123"],
            &["Luis", "456"],
        ]))
    }

    #[test]
    fn headers_are_trimmed_and_uppercased() {
        let table = Table::from_grid(grid(&[&[" nombre ", "Teléfono"], &["Ana", "1"]]));
        assert_eq!(table.columns, vec!["NOMBRE", "TELÉFONO"]);
    }

    #[test]
    fn blank_rows_are_dropped_and_short_rows_padded() {
        let table = Table::from_grid(grid(&[
            &["A", "B", "C"],
            &["1"],
            &[],
            &["", "", ""],
            &["", "2"],
        ]));
        assert_eq!(table.rows, grid(&[&["1", "", ""], &["", "2", ""]]));
    }

    #[test]
    fn blank_and_repeated_headers_get_unique_names() {
        let table = Table::from_grid(grid(&[&["name", "", "Name", "NAME"], &["x", "y", "z", "w", "extra"]]));
        assert_eq!(
            table.columns,
            vec!["NAME", "UNNAMED: 1", "NAME.1", "NAME.2", "UNNAMED: 4"]
        );
    }

    #[test]
    fn empty_grid_gives_empty_table() {
        let table = Table::from_grid(Vec::new());
        assert!(table.columns.is_empty());
        assert!(table.is_empty());
        assert!(table.to_grid().is_empty());
    }

    #[test]
    fn header_only_sheet_keeps_columns() {
        let table = Table::from_grid(grid(&[&["A", "B"]]));
        assert_eq!(table.columns, vec!["A", "B"]);
        assert_eq!(table.to_grid(), grid(&[&["A", "B"]]));
    }

    #[test]
    fn push_record_reindexes_to_column_set() {
        let mut table = contacts();
        let before = table.rows.clone();
        let mut fields = HashMap::new();
        fields.insert("NOMBRE".to_string(), "Eva".to_string());
        fields.insert("EMAIL".to_string(), "eva@example.com".to_string());
        table.push_record(&fields);

        assert_eq!(table.len(), 3);
        assert_eq!(table.rows[2], vec!["Eva".to_string(), String::new()]);
        assert_eq!(&table.rows[..2], &before[..]);
    }

    #[test]
    fn set_cell_changes_only_the_target() {
        let mut table = contacts();
        let before = table.clone();
        table.set_cell(1, "TELEFONO", "789").unwrap();

        assert_eq!(table.value(1, "TELEFONO"), Some("789"));
        assert_eq!(table.rows[0], before.rows[0]);
        assert_eq!(table.value(1, "NOMBRE"), Some("Luis"));
    }

    #[test]
    fn set_cell_rejects_empty_value_without_touching_the_table() {
        let mut table = contacts();
        let before = table.clone();
        assert!(matches!(
            table.set_cell(0, "NOMBRE", ""),
            Err(PanelError::EmptyValue)
        ));
        assert_eq!(table, before);
    }

    #[test]
    fn set_cell_rejects_bad_row_and_column() {
        let mut table = contacts();
        assert!(matches!(
            table.set_cell(2, "NOMBRE", "x"),
            Err(PanelError::RowOutOfRange { index: 2, len: 2 })
        ));
        assert!(matches!(
            table.set_cell(0, "EMAIL", "x"),
            Err(PanelError::UnknownColumn(_))
        ));
    }

    #[test]
    fn remove_record_shifts_later_rows_down() {
        let mut table = contacts();
        let removed = table.remove_record(0).unwrap();
        assert_eq!(removed, vec!["Ana", "123"]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.record(0), Some(vec![("NOMBRE", "Luis"), ("TELEFONO", "456")]));
    }

    #[test]
    fn remove_record_on_empty_table_is_out_of_range() {
        let mut table = Table::new(vec!["A".into()]);
        assert!(matches!(
            table.remove_record(0),
            Err(PanelError::RowOutOfRange { index: 0, len: 0 })
        ));
    }
}
