//! gnudb/CDDB lookups over the HTTP `cddb.cgi` interface.
//!
//! A lookup is two GETs: `cddb query` maps the disc's TOC to a category and
//! disc id, `cddb read` fetches the xmcd record for that pair.
mod abcde;
mod client;
mod parser;

pub use abcde::format_for_abcde;
pub use client::{read_command, query_command, CddbClient, GNUDB_URL, PROTOCOL_LEVEL};
pub use parser::{
    parse_query_response, parse_record, split_dtitle, CddbMatch, CddbRecord, CddbTrack,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CddbError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Unexpected CDDB status: {0}")]
    Status(String),
    #[error("Malformed CDDB response: {0}")]
    Protocol(String),
}
