use axum::{
    Form, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use handlebars::Handlebars;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::config::Args;
use crate::downloader;
use crate::search;
use crate::session::{Notice, NoticeKind, PanelSession, SessionHandle, SessionStore};
use crate::sheets::{GoogleSheets, SheetService, Worksheet};
use crate::table::Table;

const SESSION_COOKIE: &str = "session";

pub struct AppState<S: SheetService> {
    service: S,
    sessions: SessionStore<S::Sheet>,
    templates: Handlebars<'static>,
}

#[derive(Debug, Default, Deserialize)]
struct PageQuery {
    column: Option<String>,
    q: Option<String>,
    row: Option<String>,
}

#[derive(Deserialize)]
struct OpenForm {
    #[serde(default)]
    identifier: String,
}

#[derive(Deserialize)]
struct EditForm {
    #[serde(default)]
    row: String,
    #[serde(default)]
    column: String,
    #[serde(default)]
    value: String,
}

#[derive(Deserialize)]
struct DeleteForm {
    #[serde(default)]
    row: String,
}

pub async fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let app = router(GoogleSheets::default())?;

    // Start server
    let addr = args.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the panel's routes on top of `service`.
pub fn router<S: SheetService>(service: S) -> Result<Router, Box<dyn Error>> {
    let mut templates = Handlebars::new();
    templates.register_template_string("panel", include_str!("./static/panel.hbs"))?;

    let app_state = Arc::new(AppState {
        service,
        sessions: SessionStore::new(),
        templates,
    });

    Ok(Router::new()
        .route("/", get(serve_panel::<S>))
        .route("/open", post(open_sheet::<S>))
        .route("/add", post(add_record::<S>))
        .route("/edit", post(edit_record::<S>))
        .route("/delete", post(delete_record::<S>))
        .route("/export.csv", get(export_csv::<S>))
        .route("/export.xlsx", get(export_xlsx::<S>))
        .nest_service("/static", ServeDir::new("static"))
        .with_state(app_state))
}

/// The session named by the cookie, creating one when needed. The returned
/// jar always carries the (possibly new) session cookie.
fn session_from_cookie<S: SheetService>(
    state: &AppState<S>,
    jar: CookieJar,
) -> (CookieJar, SessionHandle<S::Sheet>) {
    let existing = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let (session_id, session) = state.sessions.get_or_create(existing.as_deref());
    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true);
    (jar.add(cookie), session)
}

/// Row number from a form field, clamped to the rows that exist.
/// `None` when the table has no rows at all.
///
/// Digits too large to parse saturate to the last row; anything else
/// unparseable counts as 0.
fn clamp_row(raw: &str, len: usize) -> Option<usize> {
    let last = len.checked_sub(1)?;
    let raw = raw.trim();
    let requested = match raw.parse::<i64>() {
        Ok(n) => usize::try_from(n).unwrap_or(0),
        Err(_) if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) => last,
        Err(_) => 0,
    };
    Some(requested.min(last))
}

/// Column to search in: the requested one if it exists, else the first.
fn search_column<'a>(table: &'a Table, requested: Option<&str>) -> &'a str {
    requested
        .and_then(|name| table.columns.iter().find(|c| c.as_str() == name))
        .or_else(|| table.columns.first())
        .map(String::as_str)
        .unwrap_or("")
}

fn page_context<W: Worksheet>(session: &mut PanelSession<W>, query: &PageQuery) -> serde_json::Value {
    let mut notices = session.take_notices();
    let table = session.table();

    let column = search_column(table, query.column.as_deref());
    let term = query.q.as_deref().unwrap_or("");
    let hits = match search::filter(table, column, term) {
        Ok(hits) => hits,
        Err(err) => {
            notices.push(Notice {
                kind: err.severity().into(),
                text: err.to_string(),
            });
            Vec::new()
        }
    };

    let column_options: Vec<_> = table
        .columns
        .iter()
        .map(|name| json!({ "name": name, "selected": name == column }))
        .collect();

    let preview = query
        .row
        .as_deref()
        .and_then(|raw| clamp_row(raw, table.len()))
        .and_then(|index| {
            let fields: Vec<_> = table
                .record(index)?
                .into_iter()
                .map(|(column, value)| json!({ "column": column, "value": value }))
                .collect();
            Some(json!({ "index": index, "fields": fields }))
        });

    let loaded_at = session
        .loaded_at()
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string());
    let export_query = format!(
        "column={}&q={}",
        urlencoding::encode(column),
        urlencoding::encode(term)
    );

    json!({
        "identifier": session.identifier(),
        "open": session.is_open(),
        "loaded_at": loaded_at,
        "notices": notices,
        "columns": table.columns,
        "column_options": column_options,
        "term": term,
        "hits": hits,
        "shown": hits.len(),
        "total": table.len(),
        "has_columns": !table.columns.is_empty(),
        "has_rows": !table.is_empty(),
        "max_row": table.len().saturating_sub(1),
        "preview": preview,
        "export_query": export_query,
    })
}

async fn serve_panel<S: SheetService>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    Query(query): Query<PageQuery>,
) -> Response {
    let (jar, session) = session_from_cookie(&state, jar);
    let mut session = session.lock().await;
    let context = page_context(&mut session, &query);

    match state.templates.render("panel", &context) {
        Ok(html) => (jar, Html(html)).into_response(),
        Err(e) => {
            log::error!("failed to render panel: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to render page").into_response()
        }
    }
}

async fn open_sheet<S: SheetService>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    Form(form): Form<OpenForm>,
) -> Response {
    let (jar, session) = session_from_cookie(&state, jar);
    session
        .lock()
        .await
        .open(&state.service, &form.identifier)
        .await;
    (jar, Redirect::to("/")).into_response()
}

async fn add_record<S: SheetService>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    Form(fields): Form<HashMap<String, String>>,
) -> Response {
    let (jar, session) = session_from_cookie(&state, jar);
    session.lock().await.add(&fields).await;
    (jar, Redirect::to("/")).into_response()
}

async fn edit_record<S: SheetService>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    Form(form): Form<EditForm>,
) -> Response {
    let (jar, session) = session_from_cookie(&state, jar);
    let mut session = session.lock().await;
    match clamp_row(&form.row, session.table().len()) {
        Some(row) => session.edit(row, &form.column, &form.value).await,
        None => session.notify(NoticeKind::Warning, "There are no rows to edit."),
    }
    (jar, Redirect::to("/")).into_response()
}

async fn delete_record<S: SheetService>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    Form(form): Form<DeleteForm>,
) -> Response {
    let (jar, session) = session_from_cookie(&state, jar);
    let mut session = session.lock().await;
    match clamp_row(&form.row, session.table().len()) {
        Some(row) => session.delete(row).await,
        None => session.notify(NoticeKind::Warning, "There are no rows to delete."),
    }
    (jar, Redirect::to("/")).into_response()
}

/// The searched view of the session table, as shown on the page.
fn current_view<W: Worksheet>(session: &PanelSession<W>, query: &PageQuery) -> Table {
    let table = session.table();
    let column = search_column(table, query.column.as_deref());
    let term = query.q.as_deref().unwrap_or("");
    search::filtered_table(table, column, term).unwrap_or_else(|_| table.clone())
}

async fn export_csv<S: SheetService>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    Query(query): Query<PageQuery>,
) -> Response {
    let (jar, session) = session_from_cookie(&state, jar);
    let view = current_view(&*session.lock().await, &query);

    (
        jar,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"panel.csv\""),
        ],
        downloader::to_csv(&view),
    )
        .into_response()
}

async fn export_xlsx<S: SheetService>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    Query(query): Query<PageQuery>,
) -> Response {
    let (jar, session) = session_from_cookie(&state, jar);
    let view = current_view(&*session.lock().await, &query);

    match downloader::to_xlsx(&view) {
        Ok(bytes) => (
            jar,
            [
                (
                    header::CONTENT_TYPE,
                    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                ),
                (header::CONTENT_DISPOSITION, "attachment; filename=\"panel.xlsx\""),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            log::error!("failed to build xlsx export: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to build XLSX").into_response()
        }
    }
}
