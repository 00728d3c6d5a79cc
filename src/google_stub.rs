//! Local stand-in for the Google token endpoint and the Sheets API.
//!
//! Serves canned responses on a loopback port and records every request, so
//! the real HTTP client code can be exercised without network access.

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

const TEST_KEY: &str = include_str!("../tests/fixtures/service_account_key.pem");

/// One request as the stub saw it, with path and query percent-decoded.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: String,
    pub bearer: Option<String>,
    pub body: String,
}

impl Recorded {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

struct StubState {
    requests: Mutex<Vec<Recorded>>,
    responses: Mutex<HashMap<(String, String), (StatusCode, String)>>,
    tokens_issued: AtomicUsize,
    token_lifetime: AtomicI64,
}

pub struct GoogleStub {
    base: String,
    state: Arc<StubState>,
}

fn decoded(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

async fn handle(
    State(state): State<Arc<StubState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = decoded(uri.path());
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    state.requests.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        query: decoded(uri.query().unwrap_or("")),
        bearer,
        body,
    });

    let canned = state
        .responses
        .lock()
        .unwrap()
        .get(&(method.to_string(), path.clone()))
        .cloned();
    if let Some((status, body)) = canned {
        return (status, [(header::CONTENT_TYPE, "application/json")], body).into_response();
    }

    if path == "/token" {
        let n = state.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
        return Json(json!({
            "access_token": format!("token-{}", n),
            "expires_in": state.token_lifetime.load(Ordering::SeqCst),
            "token_type": "Bearer",
        }))
        .into_response();
    }
    Json(json!({})).into_response()
}

impl GoogleStub {
    pub async fn start() -> Self {
        let state = Arc::new(StubState {
            requests: Mutex::new(Vec::new()),
            responses: Mutex::new(HashMap::new()),
            tokens_issued: AtomicUsize::new(0),
            token_lifetime: AtomicI64::new(3600),
        });
        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        GoogleStub {
            base: format!("http://{}", addr),
            state,
        }
    }

    pub fn api_base(&self) -> String {
        format!("{}/v4/spreadsheets", self.base)
    }

    pub fn token_uri(&self) -> String {
        format!("{}/token", self.base)
    }

    /// Answer `method path` with `status` and `body` from now on.
    pub fn respond(&self, method: &str, path: &str, status: u16, body: &str) {
        self.state.responses.lock().unwrap().insert(
            (method.to_string(), path.to_string()),
            (StatusCode::from_u16(status).unwrap(), body.to_string()),
        );
    }

    pub fn set_token_lifetime(&self, seconds: i64) {
        self.state.token_lifetime.store(seconds, Ordering::SeqCst);
    }

    pub fn tokens_issued(&self) -> usize {
        self.state.tokens_issued.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Requests other than token exchanges.
    pub fn api_requests(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.path != "/token")
            .collect()
    }

    /// A service-account key file whose token endpoint is this stub.
    pub fn key_file(&self) -> tempfile::NamedTempFile {
        let key = json!({
            "type": "service_account",
            "client_email": "panel@merchants.iam.gserviceaccount.com",
            "private_key_id": "test-key",
            "private_key": TEST_KEY,
            "token_uri": self.token_uri(),
        });
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(key.to_string().as_bytes()).unwrap();
        file
    }
}
