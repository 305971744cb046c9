//! Small body-building helpers shared by route actions (§6 handler
//! surface). Each helper only builds the bytes; actually emitting them
//! runs through [`crate::handler::middleware::send_compressed`] so every
//! response gets the same `Accept-Encoding` handling.

use crate::config::config;
use crate::http::request::Request;
use crate::http::response::Response;
use crate::http::status::HttpStatus;

pub fn welcome_html() -> Vec<u8> {
    format!("<h1>Welcome to {}!</h1>", config().server_name).into_bytes()
}

pub fn error_html(status: HttpStatus) -> Vec<u8> {
    format!("<h1>{} {}</h1>", status.code(), status.reason_phrase()).into_bytes()
}

/// Writes an HTML error body through the response, going through the
/// same compression path as a successful response.
pub async fn send_error(req: &Request, res: &mut Response, status: HttpStatus) {
    res.status = status;
    res.set_header("Content-Type", "text/html");
    let _ = crate::handler::middleware::send_compressed(req, res, error_html(status)).await;
}
