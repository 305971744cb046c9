//! HTTP request semantic validator.
//!
//! Once the head section has been parsed, this module checks semantics
//! the parser cannot: HTTP version support and method/body-size
//! constraints. Syntactic body-framing conflicts (`Content-Length` vs.
//! `Transfer-Encoding: chunked`) are already rejected by
//! [`Parser`](crate::http::parser::Parser); this module only evaluates
//! what depends on server configuration.

use crate::config::config;
use crate::http::HttpMethod;
use crate::http::HttpVersion;
use crate::http::request::Request;
use crate::http::status::HttpStatus;

#[derive(thiserror::Error, Debug)]
pub enum ValidatorError {
    #[error("unsupported HTTP version")]
    HttpVersionNotSupported,
    #[error("payload exceeds configured limit")]
    PayloadTooLarge,
    #[error("body not allowed for this method")]
    BodyNotAllowed,
}

impl ValidatorError {
    pub fn into_http_status(&self) -> HttpStatus {
        match self {
            ValidatorError::HttpVersionNotSupported => HttpStatus::HttpVersionNotSupported,
            ValidatorError::PayloadTooLarge => HttpStatus::PayloadTooLarge,
            ValidatorError::BodyNotAllowed => HttpStatus::BadRequest,
        }
    }
}

pub struct Validator;

impl Validator {
    fn validate_http_version(version: HttpVersion) -> Result<(), ValidatorError> {
        if version <= config().http_version {
            Ok(())
        } else {
            Err(ValidatorError::HttpVersionNotSupported)
        }
    }

    fn validate_method(
        content_length: Option<u64>,
        transfer_encoding_chunked: bool,
        method: HttpMethod,
    ) -> Result<(), ValidatorError> {
        if method.forbids_body()
            && (transfer_encoding_chunked || matches!(content_length, Some(n) if n > 0))
        {
            return Err(ValidatorError::BodyNotAllowed);
        }
        Ok(())
    }

    pub fn validate_request(req: &Request) -> Result<(), ValidatorError> {
        Self::validate_http_version(req.version)?;

        let content_length: Option<u64> = req
            .headers
            .get("Content-Length")
            .and_then(|v| v.parse().ok());
        let transfer_encoding_chunked = req
            .headers
            .get("Transfer-Encoding")
            .map(|v| v.split(',').any(|tok| tok.trim().eq_ignore_ascii_case("chunked")))
            .unwrap_or(false);

        Self::validate_method(content_length, transfer_encoding_chunked, req.method)?;

        if let Some(n) = content_length {
            if n as usize > config().max_body_size {
                return Err(ValidatorError::PayloadTooLarge);
            }
        }

        Ok(())
    }
}
