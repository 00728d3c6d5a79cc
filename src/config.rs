use lazy_static::lazy_static;
use regex::Regex;

// Constants
pub const CREDENTIALS_FILE: &str = "client_secret.json";
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const SHEETS_API: &str = "https://sheets.googleapis.com/v4/spreadsheets";
pub const SESSION_DURATION: u64 = 24 * 60 * 60; // 24 hours in seconds
pub const TOKEN_LIFETIME: i64 = 3600;
pub const TOKEN_REFRESH_MARGIN: i64 = 60;

lazy_static! {
    static ref DOCUMENT_URL_REGEX: Regex =
        Regex::new(r"/d/([A-Za-z0-9_-]+)").unwrap();
}

/// Command-line options for the web server.
#[cfg(feature = "web")]
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "panel", about = "Web panel for a Google Sheets merchant list")]
pub struct Args {
    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, default_value_t = 3000)]
    pub port: u16,
}

#[cfg(feature = "web")]
impl Args {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Extract the spreadsheet identifier from user input.
///
/// Accepts either the bare identifier or a full document URL such as
/// `https://docs.google.com/spreadsheets/d/<id>/edit#gid=0`.
pub fn spreadsheet_id(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match DOCUMENT_URL_REGEX.captures(input) {
        Some(caps) => Some(caps[1].to_string()),
        None => Some(input.to_string()),
    }
}
