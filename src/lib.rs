/*!
# Merchant Panel

A browser-based panel for viewing, searching, adding, editing and deleting the
rows of a single Google Sheet, built in Rust.

## Overview

The spreadsheet is the system of record. The panel keeps no data of its own:
every operation reads the whole first worksheet into an in-memory table,
changes that table, writes the whole table back and reads it again so the
page always shows what is actually stored.

## Architecture

### Frontend Layer
- **Technologies**: HTML rendered with handlebars, CSS
- **Key Components**:
  - Identifier form - Selects the spreadsheet to work on
  - Search form - Case-insensitive substring search on one column
  - Table view - Rows with their positional index
  - Add / Edit / Delete forms - One submit per operation

### Backend Layer
- **Technologies**: Rust, axum, reqwest
- **Core Components**:
  - Credential Loader - Service-account key to bearer token
  - Sheet Client - First worksheet of a document, read/clear/write in full
  - Table Transfer - Cell grid <-> table conversion, save-then-reload
  - Session Cache - One cached table per browser session
  - Search - Column filter that keeps original row positions
  - Mutations - Add, edit and delete on a copy of the cached table

## Failure Handling

Every backend failure (credentials, document access, read, write) is logged
and shown on the page. A failed read leaves an empty table, a failed write
leaves the table as it was before the change. Nothing is retried.

Concurrent editors are not detected: the last full-sheet write wins.

## Modules

- **config**: constants, command-line options, identifier parsing
- **error**: error taxonomy
- **credentials**: service-account authorization
- **sheets**: worksheet/service seams and the Google Sheets client
- **memory**: in-memory backend used by the test suites
- **table**: in-memory table model and mutation primitives
- **transfer**: load/save between worksheet and table
- **search**: column filter
- **session**: session store and the operations run against a session
- **downloader**: CSV / XLSX export
- **app**: routing and page rendering

## Routes

- `GET /` - The panel page (`column`, `q`, `row` query parameters)
- `POST /open` - Open a spreadsheet by ID or URL
- `POST /add`, `POST /edit`, `POST /delete` - Mutations
- `GET /export.csv`, `GET /export.xlsx` - Download the searched view
*/

pub mod config;
pub mod error;
pub mod memory;
pub mod search;
pub mod sheets;
pub mod table;
pub mod transfer;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod credentials;
#[cfg(feature = "web")]
pub mod downloader;
#[cfg(feature = "web")]
pub mod session;

#[cfg(all(test, feature = "web"))]
mod google_stub;

pub use error::{PanelError, Result, Severity};
pub use sheets::{SheetService, Worksheet};
pub use table::Table;
