//! Response body compression, applied after a route action has produced
//! its body but before it is written to the wire (§1: body compression is
//! an "external collaborator" concern layered on top of the framing
//! core, not part of it).

use flate2::Compression;
use flate2::write::{DeflateEncoder, GzEncoder};
use std::io::{self, Write};

use crate::http::request::Request;
use crate::http::response::Response;

// Algorithm used for body compression as listed in MDN.
#[allow(dead_code)]
pub enum CompressionAlgorithm {
    Gzip,
    Compress,
    Deflate,
    Br,
    Zstd,
    Dcb,
    Dcz,
    Identity,
}

impl CompressionAlgorithm {
    pub fn as_str(&self) -> &str {
        match self {
            CompressionAlgorithm::Gzip => "gzip",
            CompressionAlgorithm::Compress => "compress",
            CompressionAlgorithm::Deflate => "deflate",
            CompressionAlgorithm::Br => "br",
            CompressionAlgorithm::Zstd => "zstd",
            CompressionAlgorithm::Dcb => "dcb",
            CompressionAlgorithm::Dcz => "dcz",
            CompressionAlgorithm::Identity => "identity",
        }
    }
}

/// Picks the best algorithm this crate can actually produce out of the
/// client's `Accept-Encoding` list, preferring gzip over deflate.
fn negotiate(accept_encoding: &str) -> Option<CompressionAlgorithm> {
    let offered: Vec<&str> = accept_encoding
        .split(',')
        .map(|s| s.split(';').next().unwrap_or("").trim())
        .collect();
    if offered.iter().any(|s| s.eq_ignore_ascii_case("gzip")) {
        Some(CompressionAlgorithm::Gzip)
    } else if offered.iter().any(|s| s.eq_ignore_ascii_case("deflate")) {
        Some(CompressionAlgorithm::Deflate)
    } else {
        None
    }
}

fn compress(body: &[u8], algo: &CompressionAlgorithm) -> io::Result<Vec<u8>> {
    match algo {
        CompressionAlgorithm::Gzip => {
            let mut e = GzEncoder::new(Vec::new(), Compression::default());
            e.write_all(body)?;
            e.finish()
        }
        CompressionAlgorithm::Deflate => {
            let mut e = DeflateEncoder::new(Vec::new(), Compression::default());
            e.write_all(body)?;
            e.finish()
        }
        _ => Ok(body.to_vec()),
    }
}

/// Sends `body` as the response, gzip- or deflate-compressing it first
/// when the request's `Accept-Encoding` allows it. Every route action
/// should go through this instead of calling `Response::send` directly so
/// compression stays consistent across handlers.
pub async fn send_compressed(req: &Request, res: &mut Response, body: Vec<u8>) -> io::Result<()> {
    let negotiated = req
        .headers
        .get("Accept-Encoding")
        .and_then(negotiate);

    let body = match negotiated {
        Some(algo) => match compress(&body, &algo) {
            Ok(compressed) => {
                res.set_header("Content-Encoding", algo.as_str());
                compressed
            }
            Err(err) => {
                log::warn!("response compression failed, sending identity body: {err}");
                body
            }
        },
        None => body,
    };

    res.send(&body).await
}
