use crate::error::Result;
use crate::sheets::Worksheet;
use crate::table::Table;

/// Read the whole worksheet into a table.
pub async fn load<W: Worksheet>(sheet: &W) -> Result<Table> {
    let table = Table::from_grid(sheet.get_all_values().await?);
    log::info!(
        "loaded {} rows x {} columns from {:?}",
        table.len(),
        table.columns.len(),
        sheet.title()
    );
    Ok(table)
}

/// Replace the worksheet contents with `table`, header row first.
///
/// The sheet is cleared before the write, so a failure between the two steps
/// leaves it empty.
pub async fn save<W: Worksheet>(sheet: &W, table: &Table) -> Result<()> {
    sheet.clear().await?;
    let grid = table.to_grid();
    if !grid.is_empty() {
        sheet.update(grid).await?;
    }
    log::info!("saved {} rows to {:?}", table.len(), sheet.title());
    Ok(())
}
