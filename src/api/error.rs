use rocket::http::{ContentType, Status};
use rocket::request::Request;
use rocket::response::{self, Responder, Response};
use std::fmt;
use std::io::Cursor;

#[derive(Debug, Clone)]
pub enum Error {
    Timeout(String),
    LoginError(String),
    ApiError(String),
    RateExceeded(String),
    HttpStatus(u16),
    UnexpectedApiResponse,
    InvalidResponse(String, String),
    UnexpectedChartFormat(String),
    ConfigError(String),
    FormatError,
    InternalError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Timeout(s) => write!(f, "request timed out: {}", s),
            Error::LoginError(s) => write!(f, "authentication rejected: {}", s),
            Error::ApiError(s) => write!(f, "API request failed: {}", s),
            Error::RateExceeded(s) => write!(f, "rate limit exceeded: {}", s),
            Error::HttpStatus(status) => write!(f, "HTTP {}", status),
            Error::UnexpectedApiResponse => f.write_str("unexpected API response"),
            Error::InvalidResponse(body, reason) => {
                write!(f, "invalid JSON response ({}): {}", reason, body)
            }
            Error::UnexpectedChartFormat(s) => {
                write!(f, "chart data is not a list or dict: {}", s)
            }
            Error::ConfigError(s) => write!(f, "configuration error: {}", s),
            Error::FormatError => f.write_str("unable to encode metrics"),
            Error::InternalError => f.write_str("internal error"),
        }
    }
}

impl std::error::Error for Error {}

fn html(status: Status, body: String) -> response::Result<'static> {
    Response::build()
        .status(status)
        .sized_body(body.len(), Cursor::new(body))
        .header(ContentType::new("text", "html"))
        .ok()
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        match self {
            Error::RateExceeded(s) => html(
                Status::TooManyRequests,
                format!("<html><body><h3>429 Too Many Requests</h3>Upstream API response: <code>{}</code></body></html>", s),
            ),
            Error::LoginError(s) => html(
                Status::Forbidden,
                format!("<html><body><h3>403 Forbidden</h3>Error while authenticating to upstream API: <code>{}</code></body></html>", s),
            ),
            _ => html(
                Status::InternalServerError,
                format!(
                    "<html><body><h3>Unknown exception</h3><code>{}</code></body></html>",
                    self
                ),
            ),
        }
    }
}
