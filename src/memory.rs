//! In-memory spreadsheet backend.
//!
//! Behaves like the Sheets API as far as the panel can tell (trailing blank
//! cells are not returned, writes land at the origin) and can be told to fail
//! reads or writes. The test suites run the whole panel against it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{PanelError, Result};
use crate::sheets::{SheetService, Worksheet};

#[derive(Default)]
struct MemoryState {
    cells: Vec<Vec<String>>,
    fail_reads: bool,
    fail_writes: bool,
    fail_updates: bool,
    reads: usize,
    writes: usize,
}

/// A worksheet held in memory. Clones share the same cells.
#[derive(Clone, Default)]
pub struct MemoryWorksheet {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryWorksheet {
    pub fn with_cells(cells: Vec<Vec<String>>) -> Self {
        let sheet = MemoryWorksheet::default();
        sheet.lock().cells = cells;
        sheet
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current cells exactly as stored.
    pub fn cells(&self) -> Vec<Vec<String>> {
        self.lock().cells.clone()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }

    /// Fail both `clear` and `update`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Fail only `update`, so a save clears the sheet and then stops.
    pub fn set_fail_updates(&self, fail: bool) {
        self.lock().fail_updates = fail;
    }

    pub fn reads(&self) -> usize {
        self.lock().reads
    }

    /// Number of successful clear/update calls.
    pub fn writes(&self) -> usize {
        self.lock().writes
    }
}

impl Worksheet for MemoryWorksheet {
    fn title(&self) -> &str {
        "Sheet1"
    }

    async fn get_all_values(&self) -> Result<Vec<Vec<String>>> {
        let mut state = self.lock();
        if state.fail_reads {
            return Err(PanelError::Read("simulated read failure".into()));
        }
        state.reads += 1;

        let mut rows: Vec<Vec<String>> = state
            .cells
            .iter()
            .map(|row| {
                let used = row.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
                row[..used].to_vec()
            })
            .collect();
        while rows.last().is_some_and(Vec::is_empty) {
            rows.pop();
        }
        Ok(rows)
    }

    async fn clear(&self) -> Result<()> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(PanelError::Write("simulated write failure".into()));
        }
        state.writes += 1;
        state.cells.clear();
        Ok(())
    }

    async fn update(&self, values: Vec<Vec<String>>) -> Result<()> {
        let mut state = self.lock();
        if state.fail_writes || state.fail_updates {
            return Err(PanelError::Write("simulated write failure".into()));
        }
        state.writes += 1;

        if state.cells.len() < values.len() {
            state.cells.resize(values.len(), Vec::new());
        }
        for (target, row) in state.cells.iter_mut().zip(values) {
            if target.len() < row.len() {
                target.resize(row.len(), String::new());
            }
            for (cell, value) in target.iter_mut().zip(row) {
                *cell = value;
            }
        }
        Ok(())
    }
}

/// A set of in-memory spreadsheets keyed by identifier.
#[derive(Clone, Default)]
pub struct MemorySheets {
    sheets: Arc<Mutex<HashMap<String, MemoryWorksheet>>>,
}

impl MemorySheets {
    pub fn new() -> Self {
        MemorySheets::default()
    }

    /// Register a spreadsheet and return a handle to its first worksheet.
    pub fn insert(&self, identifier: &str, cells: Vec<Vec<String>>) -> MemoryWorksheet {
        let sheet = MemoryWorksheet::with_cells(cells);
        self.sheets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identifier.to_string(), sheet.clone());
        sheet
    }

    pub fn worksheet(&self, identifier: &str) -> Option<MemoryWorksheet> {
        self.sheets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identifier)
            .cloned()
    }
}

impl SheetService for MemorySheets {
    type Sheet = MemoryWorksheet;

    async fn open(&self, identifier: &str) -> Result<MemoryWorksheet> {
        self.worksheet(identifier).ok_or_else(|| {
            PanelError::DocumentAccess(format!("404 Not Found: no spreadsheet {}", identifier))
        })
    }
}

/// Build a cell grid from string literals.
pub fn grid(rows: &[&[&str]]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}
