use serde::Serialize;

use crate::error::Result;
use crate::table::Table;

/// One record of a search result, tagged with its position in the full table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Hit<'a> {
    pub index: usize,
    pub cells: &'a [String],
}

/// Records whose `column` value contains `term`, ignoring case.
///
/// An empty term matches every record. Order follows the table. Fails only
/// when `column` is not one of the table's columns.
///
/// # Arguments
/// * `table` - The table to search
/// * `column` - Column to match against
/// * `term` - Literal text to look for
///
/// # Returns
/// * `Result<Vec<Hit>>` - Matching records with their positions in `table`
///
/// # Examples
/// ```
/// use merchant_panel::Table;
/// use merchant_panel::search::filter;
///
/// let table = Table {
///     columns: vec!["NOMBRE".into()],
///     rows: vec![vec!["Luis".into()], vec!["Ana".into()]],
/// };
/// let hits = filter(&table, "NOMBRE", "AN").unwrap();
/// assert_eq!(hits.len(), 1);
/// assert_eq!(hits[0].index, 1);
/// ```
pub fn filter<'a>(table: &'a Table, column: &str, term: &str) -> Result<Vec<Hit<'a>>> {
    let all = table.rows.iter().enumerate();
    if term.is_empty() {
        return Ok(all
            .map(|(index, cells)| Hit {
                index,
                cells: cells.as_slice(),
            })
            .collect());
    }

    let col = table.column_index(column)?;
    let needle = term.to_lowercase();
    Ok(all
        .filter(|(_, cells)| cells[col].to_lowercase().contains(&needle))
        .map(|(index, cells)| Hit {
            index,
            cells: cells.as_slice(),
        })
        .collect())
}

/// Copy of the matching records as a standalone table, for export.
pub fn filtered_table(table: &Table, column: &str, term: &str) -> Result<Table> {
    let rows = filter(table, column, term)?
        .into_iter()
        .map(|hit| hit.cells.to_vec())
        .collect();
    Ok(Table {
        columns: table.columns.clone(),
        rows,
    })
}
