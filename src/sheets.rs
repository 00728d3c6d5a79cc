use std::future::Future;

use crate::error::Result;

/// One worksheet of a spreadsheet document, read and written as a whole grid.
pub trait Worksheet: Send + Sync {
    fn title(&self) -> &str;

    /// Every cell as displayed, formulas already evaluated, row-major.
    /// Trailing blank cells of a row may be missing.
    fn get_all_values(&self) -> impl Future<Output = Result<Vec<Vec<String>>>> + Send;

    /// Blank every cell.
    fn clear(&self) -> impl Future<Output = Result<()>> + Send;

    /// Write `values` with the first row at the origin cell, growing the grid if needed.
    fn update(&self, values: Vec<Vec<String>>) -> impl Future<Output = Result<()>> + Send;
}

/// Resolves a spreadsheet identifier to the worksheet the panel edits.
pub trait SheetService: Send + Sync + 'static {
    type Sheet: Worksheet + 'static;

    /// Open the document and return its first worksheet.
    fn open(&self, identifier: &str) -> impl Future<Output = Result<Self::Sheet>> + Send;
}

/// Convert column number to letter (1 = A, 27 = AA).
pub fn column_letter(col: usize) -> String {
    let mut name = String::new();
    let mut n = col;

    while n > 0 {
        n -= 1;
        name.insert(0, (b'A' + (n % 26) as u8) as char);
        n /= 26;
    }

    name
}

#[cfg(feature = "web")]
pub use google::{GoogleSheets, GoogleWorksheet};

#[cfg(feature = "web")]
mod google {
    use serde::Deserialize;
    use serde_json::{Value, json};
    use std::path::PathBuf;
    use std::sync::{Arc, Mutex, PoisonError};

    use super::{SheetService, Worksheet, column_letter};
    use crate::config::{CREDENTIALS_FILE, SHEETS_API, SHEETS_SCOPE};
    use crate::credentials::{self, AuthorizedClient};
    use crate::error::{PanelError, Result};

    #[derive(Deserialize)]
    struct SpreadsheetMeta {
        #[serde(default)]
        sheets: Vec<SheetMeta>,
    }

    #[derive(Deserialize)]
    struct SheetMeta {
        properties: SheetProperties,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct SheetProperties {
        sheet_id: i64,
        title: String,
        #[serde(default)]
        grid_properties: GridProperties,
    }

    #[derive(Clone, Copy, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct GridProperties {
        #[serde(default)]
        row_count: usize,
        #[serde(default)]
        column_count: usize,
    }

    #[derive(Deserialize)]
    struct ValueRange {
        #[serde(default)]
        values: Vec<Vec<Value>>,
    }

    /// Google Sheets backend. Every `open` loads the credential file afresh.
    pub struct GoogleSheets {
        credentials_file: PathBuf,
        scope: String,
        api_base: String,
    }

    impl Default for GoogleSheets {
        fn default() -> Self {
            GoogleSheets::new(CREDENTIALS_FILE, SHEETS_API)
        }
    }

    impl GoogleSheets {
        /// Backend reading its key from `credentials_file` and talking to the
        /// spreadsheets collection at `api_base`.
        pub fn new(credentials_file: impl Into<PathBuf>, api_base: impl Into<String>) -> Self {
            GoogleSheets {
                credentials_file: credentials_file.into(),
                scope: SHEETS_SCOPE.to_string(),
                api_base: api_base.into(),
            }
        }
    }

    impl SheetService for GoogleSheets {
        type Sheet = GoogleWorksheet;

        async fn open(&self, identifier: &str) -> Result<GoogleWorksheet> {
            let client = credentials::authorize(&self.credentials_file, &self.scope).await?;
            GoogleWorksheet::first_of(Arc::new(client), &self.api_base, identifier).await
        }
    }

    pub struct GoogleWorksheet {
        client: Arc<AuthorizedClient>,
        api_base: String,
        spreadsheet_id: String,
        sheet_id: i64,
        title: String,
        grid: Mutex<GridProperties>,
    }

    impl GoogleWorksheet {
        async fn first_of(
            client: Arc<AuthorizedClient>,
            api_base: &str,
            spreadsheet_id: &str,
        ) -> Result<Self> {
            let url = format!("{}/{}", api_base, urlencoding::encode(spreadsheet_id));
            log::debug!("GET {}", url);
            let request = client
                .http()
                .get(&url)
                .query(&[("fields", "sheets.properties")]);
            let meta: SpreadsheetMeta = client
                .send(request, PanelError::DocumentAccess)
                .await?
                .json()
                .await
                .map_err(|e| PanelError::DocumentAccess(e.to_string()))?;

            let first = meta.sheets.into_iter().next().ok_or_else(|| {
                PanelError::DocumentAccess(format!("{} has no worksheets", spreadsheet_id))
            })?;

            log::info!(
                "opened worksheet {:?} of {}",
                first.properties.title,
                spreadsheet_id
            );
            Ok(GoogleWorksheet {
                client,
                api_base: api_base.to_string(),
                spreadsheet_id: spreadsheet_id.to_string(),
                sheet_id: first.properties.sheet_id,
                title: first.properties.title,
                grid: Mutex::new(first.properties.grid_properties),
            })
        }

        /// A1 reference to the whole sheet, e.g. `'Sheet 1'`.
        fn sheet_range(&self) -> String {
            format!("'{}'", self.title.replace('\'', "''"))
        }

        fn values_url(&self, range: &str) -> String {
            format!(
                "{}/{}/values/{}",
                self.api_base,
                urlencoding::encode(&self.spreadsheet_id),
                urlencoding::encode(range)
            )
        }

        /// Grow the sheet so `rows` x `cols` fits. Never shrinks it.
        async fn ensure_size(&self, rows: usize, cols: usize) -> Result<()> {
            let current = *self.grid.lock().unwrap_or_else(PoisonError::into_inner);
            if rows <= current.row_count && cols <= current.column_count {
                return Ok(());
            }
            let wanted = GridProperties {
                row_count: rows.max(current.row_count),
                column_count: cols.max(current.column_count),
            };

            let url = format!(
                "{}/{}:batchUpdate",
                self.api_base,
                urlencoding::encode(&self.spreadsheet_id)
            );
            let body = json!({
                "requests": [{
                    "updateSheetProperties": {
                        "properties": {
                            "sheetId": self.sheet_id,
                            "gridProperties": {
                                "rowCount": wanted.row_count,
                                "columnCount": wanted.column_count,
                            }
                        },
                        "fields": "gridProperties(rowCount,columnCount)"
                    }
                }]
            });
            log::debug!("resizing {} to {}x{}", self.title, wanted.row_count, wanted.column_count);
            self.client
                .send(self.client.http().post(&url).json(&body), PanelError::Write)
                .await?;

            *self.grid.lock().unwrap_or_else(PoisonError::into_inner) = wanted;
            Ok(())
        }
    }

    fn cell_text(value: Value) -> String {
        match value {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    impl Worksheet for GoogleWorksheet {
        fn title(&self) -> &str {
            &self.title
        }

        async fn get_all_values(&self) -> Result<Vec<Vec<String>>> {
            let url = self.values_url(&self.sheet_range());
            log::debug!("GET {}", url);
            let request = self.client.http().get(&url).query(&[
                ("valueRenderOption", "FORMATTED_VALUE"),
                ("majorDimension", "ROWS"),
            ]);
            let range: ValueRange = self
                .client
                .send(request, PanelError::Read)
                .await?
                .json()
                .await
                .map_err(|e| PanelError::Read(e.to_string()))?;

            Ok(range
                .values
                .into_iter()
                .map(|row| row.into_iter().map(cell_text).collect())
                .collect())
        }

        async fn clear(&self) -> Result<()> {
            let url = format!("{}:clear", self.values_url(&self.sheet_range()));
            log::debug!("POST {}", url);
            self.client
                .send(self.client.http().post(&url).json(&json!({})), PanelError::Write)
                .await?;
            Ok(())
        }

        async fn update(&self, values: Vec<Vec<String>>) -> Result<()> {
            let rows = values.len();
            let cols = values.iter().map(Vec::len).max().unwrap_or(0);
            if rows == 0 || cols == 0 {
                return Ok(());
            }
            self.ensure_size(rows, cols).await?;

            let range = format!("{}!A1:{}{}", self.sheet_range(), column_letter(cols), rows);
            let url = self.values_url(&range);
            let body = json!({
                "range": range,
                "majorDimension": "ROWS",
                "values": values,
            });
            log::debug!("PUT {} ({} rows)", url, rows);
            self.client
                .send(
                    self.client
                        .http()
                        .put(&url)
                        .query(&[("valueInputOption", "USER_ENTERED")])
                        .json(&body),
                    PanelError::Write,
                )
                .await?;
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::google_stub::GoogleStub;

        #[test]
        fn cells_become_text() {
            assert_eq!(cell_text(json!("Ana")), "Ana");
            assert_eq!(cell_text(json!(42)), "42");
            assert_eq!(cell_text(json!(true)), "true");
            assert_eq!(cell_text(Value::Null), "");
        }

        #[test]
        fn metadata_parses_first_sheet() {
            let body = r#"{"sheets":[{"properties":{"sheetId":0,"title":"Hoja 1","index":0,
                "gridProperties":{"rowCount":1000,"columnCount":26}}},
                {"properties":{"sheetId":7,"title":"Otra"}}]}"#;
            let meta: SpreadsheetMeta = serde_json::from_str(body).unwrap();
            let first = &meta.sheets[0].properties;
            assert_eq!(first.title, "Hoja 1");
            assert_eq!(first.grid_properties.row_count, 1000);
            assert_eq!(meta.sheets[1].properties.grid_properties.column_count, 0);
        }

        #[test]
        fn empty_sheet_has_no_values_field() {
            let range: ValueRange = serde_json::from_str(r#"{"range":"'Hoja 1'!A1:Z1000","majorDimension":"ROWS"}"#).unwrap();
            assert!(range.values.is_empty());
        }

        const METADATA: &str = r#"{"sheets":[{"properties":{"sheetId":7,"title":"Hoja 1",
            "gridProperties":{"rowCount":2,"columnCount":2}}}]}"#;
        const VALUES_PATH: &str = "/v4/spreadsheets/abc/values/'Hoja 1'";

        async fn open_abc(stub: &GoogleStub) -> GoogleWorksheet {
            stub.respond("GET", "/v4/spreadsheets/abc", 200, METADATA);
            let key = stub.key_file();
            GoogleSheets::new(key.path(), stub.api_base())
                .open("abc")
                .await
                .unwrap()
        }

        #[tokio::test]
        async fn open_picks_the_first_worksheet() {
            let stub = GoogleStub::start().await;
            let sheet = open_abc(&stub).await;

            assert_eq!(sheet.title(), "Hoja 1");
            let requests = stub.api_requests();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].method, "GET");
            assert_eq!(requests[0].query, "fields=sheets.properties");
            assert_eq!(requests[0].bearer.as_deref(), Some("token-1"));
        }

        #[tokio::test]
        async fn missing_document_is_an_access_error() {
            let stub = GoogleStub::start().await;
            stub.respond(
                "GET",
                "/v4/spreadsheets/nope",
                404,
                r#"{"error":{"code":404,"message":"Requested entity was not found."}}"#,
            );
            let key = stub.key_file();
            let err = GoogleSheets::new(key.path(), stub.api_base())
                .open("nope")
                .await
                .err()
                .unwrap();
            assert!(matches!(err, PanelError::DocumentAccess(_)));
            assert!(err.to_string().contains("Requested entity was not found."));
        }

        #[tokio::test]
        async fn document_without_worksheets_is_an_access_error() {
            let stub = GoogleStub::start().await;
            stub.respond("GET", "/v4/spreadsheets/abc", 200, r#"{"sheets":[]}"#);
            let key = stub.key_file();
            let result = GoogleSheets::new(key.path(), stub.api_base()).open("abc").await;
            assert!(matches!(result, Err(PanelError::DocumentAccess(_))));
        }

        #[tokio::test]
        async fn values_are_read_formatted_and_as_text() {
            let stub = GoogleStub::start().await;
            let sheet = open_abc(&stub).await;
            stub.respond(
                "GET",
                VALUES_PATH,
                200,
                r#"{"majorDimension":"ROWS","values":[["Nombre","Telefono"],["Ana",123]]}"#,
            );

            let values = sheet.get_all_values().await.unwrap();
            assert_eq!(
                values,
                vec![vec!["Nombre", "Telefono"], vec!["Ana", "123"]]
            );
            let read = stub.api_requests().pop().unwrap();
            assert!(read.query.contains("valueRenderOption=FORMATTED_VALUE"));
        }

        #[tokio::test]
        async fn read_rejection_is_a_read_error() {
            let stub = GoogleStub::start().await;
            let sheet = open_abc(&stub).await;
            stub.respond("GET", VALUES_PATH, 403, r#"{"error":{"message":"denied"}}"#);
            let err = sheet.get_all_values().await.unwrap_err();
            assert!(matches!(err, PanelError::Read(_)));
            assert!(err.to_string().contains("403 Forbidden: denied"));
        }

        #[tokio::test]
        async fn clear_posts_to_the_whole_sheet_and_reports_failures_as_writes() {
            let stub = GoogleStub::start().await;
            let sheet = open_abc(&stub).await;
            sheet.clear().await.unwrap();
            let clear = stub.api_requests().pop().unwrap();
            assert_eq!(clear.method, "POST");
            assert_eq!(clear.path, format!("{}:clear", VALUES_PATH));

            stub.respond("POST", &format!("{}:clear", VALUES_PATH), 500, "{}");
            assert!(matches!(sheet.clear().await, Err(PanelError::Write(_))));
        }

        #[tokio::test]
        async fn update_grows_the_grid_once_then_writes_user_entered() {
            let stub = GoogleStub::start().await;
            let sheet = open_abc(&stub).await;
            let values = vec![
                vec!["NOMBRE".to_string(), "TELEFONO".to_string(), "CIUDAD".to_string()],
                vec!["Ana".to_string(), "123".to_string(), "Lima".to_string()],
                vec!["Luis".to_string(), "456".to_string(), "Quito".to_string()],
            ];
            sheet.update(values.clone()).await.unwrap();

            let requests = stub.api_requests();
            assert_eq!(requests.len(), 3);
            let resize = &requests[1];
            assert_eq!(resize.path, "/v4/spreadsheets/abc:batchUpdate");
            let body = resize.json();
            let properties = &body["requests"][0]["updateSheetProperties"]["properties"];
            assert_eq!(properties["sheetId"], 7);
            assert_eq!(properties["gridProperties"]["rowCount"], 3);
            assert_eq!(properties["gridProperties"]["columnCount"], 3);

            let write = &requests[2];
            assert_eq!(write.method, "PUT");
            assert_eq!(write.path, format!("{}!A1:C3", VALUES_PATH));
            assert_eq!(write.query, "valueInputOption=USER_ENTERED");
            assert_eq!(write.json()["values"], json!(values));

            sheet.update(values[..2].to_vec()).await.unwrap();
            let requests = stub.api_requests();
            assert_eq!(requests.len(), 4);
            assert_eq!(requests[3].path, format!("{}!A1:C2", VALUES_PATH));
        }

        #[tokio::test]
        async fn empty_update_sends_nothing() {
            let stub = GoogleStub::start().await;
            let sheet = open_abc(&stub).await;
            sheet.update(Vec::new()).await.unwrap();
            assert_eq!(stub.api_requests().len(), 1);
        }
    }
}
