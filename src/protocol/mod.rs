//! Wire commands spoken between the client and the storage nodes
//!
//! Commands and replies are short ASCII texts carried in frames (see
//! [`frame`]). Keywords are case-sensitive. Chunk numbers are 1-based on the
//! wire.

pub mod frame;

pub use frame::{
    read_frame, read_frame_or_eof, read_frame_within, write_frame, write_frame_within,
    MAX_FRAME_SIZE,
};

use crate::CHUNK_COUNT;
use thiserror::Error;

/// Acknowledgment sent after a successful PUT
pub const OK: &str = "ok";
/// Reply to CHECK when a chunk record exists
pub const EXISTS: &str = "EXISTS";
/// Reply to CHECK when nothing is stored under the name
pub const NOT_FOUND: &str = "NOT_FOUND";

/// A request that could not be understood
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseError(pub String);

fn parse_err(message: impl Into<String>) -> ParseError {
    ParseError(message.into())
}

/// Check that a file name can be used as a storage key
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.chars().any(char::is_whitespace)
}

/// A command sent by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Announce two chunks of `chunk_size` bytes for `name`
    Put {
        name: String,
        chunk_size: u64,
        file_size: Option<u64>,
    },
    /// Header preceding one chunk payload inside a PUT
    Chunk { number: u8 },
    /// Fetch one chunk record
    Get { name: String, number: u8 },
    /// List distinct stored file names
    List,
    /// Ask whether any chunk of `name` is stored
    Check { name: String },
    /// Ask for the stored chunk size of `name`
    Size { name: String },
}

impl Request {
    /// Parse a command frame
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let mut parts = text.split_whitespace();
        let keyword = parts.next().ok_or_else(|| parse_err("empty command"))?;

        let request = match keyword {
            "PUT" => {
                let name = parse_name(parts.next())?;
                let chunk_size = parse_number(parts.next(), "chunk size")?;
                let file_size = match parts.next() {
                    Some(value) => Some(parse_number(Some(value), "file size")?),
                    None => None,
                };
                Request::Put {
                    name,
                    chunk_size,
                    file_size,
                }
            }
            "CHUNK" => Request::Chunk {
                number: parse_chunk_number(parts.next())?,
            },
            "GET" => Request::Get {
                name: parse_name(parts.next())?,
                number: parse_chunk_number(parts.next())?,
            },
            "LIST" => Request::List,
            "CHECK" => Request::Check {
                name: parse_name(parts.next())?,
            },
            "SIZE" => Request::Size {
                name: parse_name(parts.next())?,
            },
            other => return Err(parse_err(format!("unknown command {}", other))),
        };

        if parts.next().is_some() {
            return Err(parse_err(format!("trailing arguments to {}", keyword)));
        }

        Ok(request)
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Request::Put {
                name,
                chunk_size,
                file_size: Some(file_size),
            } => write!(f, "PUT {} {} {}", name, chunk_size, file_size),
            Request::Put {
                name,
                chunk_size,
                file_size: None,
            } => write!(f, "PUT {} {}", name, chunk_size),
            Request::Chunk { number } => write!(f, "CHUNK {}", number),
            Request::Get { name, number } => write!(f, "GET {} {}", name, number),
            Request::List => write!(f, "LIST"),
            Request::Check { name } => write!(f, "CHECK {}", name),
            Request::Size { name } => write!(f, "SIZE {}", name),
        }
    }
}

fn parse_name(part: Option<&str>) -> Result<String, ParseError> {
    let name = part.ok_or_else(|| parse_err("missing file name"))?;
    if !is_valid_name(name) {
        return Err(parse_err(format!("invalid file name {}", name)));
    }
    Ok(name.to_string())
}

fn parse_number(part: Option<&str>, what: &str) -> Result<u64, ParseError> {
    part.ok_or_else(|| parse_err(format!("missing {}", what)))?
        .parse()
        .map_err(|_| parse_err(format!("invalid {}", what)))
}

fn parse_chunk_number(part: Option<&str>) -> Result<u8, ParseError> {
    let number = parse_number(part, "chunk number")?;
    if number == 0 || number > CHUNK_COUNT as u64 {
        return Err(parse_err(format!("chunk number {} out of range", number)));
    }
    Ok(number as u8)
}

/// Format the SIZE reply
pub fn size_reply(sizes: Option<(u64, u64)>) -> String {
    match sizes {
        Some((chunk_size, file_size)) => format!("SIZE {} {}", chunk_size, file_size),
        None => "SIZE 0".to_string(),
    }
}

/// Parse a SIZE reply into `(chunk_size, file_size)` of a stored file
///
/// `SIZE 0` means nothing is stored. A reply without a file size comes from
/// a node that predates size records; the padded length is assumed.
pub fn parse_size_reply(text: &str) -> Option<(u64, u64)> {
    let mut parts = text.split_whitespace();
    if parts.next()? != "SIZE" {
        return None;
    }
    let chunk_size: u64 = parts.next()?.parse().ok()?;
    match parts.next() {
        Some(file_size) => Some((chunk_size, file_size.parse().ok()?)),
        None if chunk_size > 0 => Some((chunk_size, chunk_size * CHUNK_COUNT as u64)),
        None => None,
    }
}

/// Format the header that precedes a GET payload
pub fn data_reply(len: u64) -> String {
    format!("DATA {}", len)
}

/// Parse the header that precedes a GET payload
pub fn parse_data_reply(text: &str) -> Option<u64> {
    text.strip_prefix("DATA ")?.trim().parse().ok()
}

/// Format an error reply
pub fn error_reply(message: &str) -> String {
    format!("error {}", message)
}

/// Format a LIST reply
pub fn list_reply(names: &[String]) -> String {
    names.join("\n")
}

/// Parse a LIST reply
pub fn parse_list_reply(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
