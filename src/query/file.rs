//! Query file handed to a worker through shared storage.
//!
//! ```text
//! 3
//! 1 10
//! 3 10
//! 4 30
//! ```

use std::fmt::Write as _;
use std::path::Path;

use super::scenario::{parse_node, parse_pair};
use super::{Query, QuerySet};
use crate::error::{Error, FormatError, Result};

pub fn render_query_file(queries: &[Query]) -> String {
    let mut out = String::with_capacity(16 * (queries.len() + 1));
    let _ = writeln!(out, "{}", queries.len());
    for query in queries {
        let _ = writeln!(out, "{query}");
    }
    out
}

pub fn write_query_file(path: &Path, queries: &[Query]) -> std::io::Result<()> {
    std::fs::write(path, render_query_file(queries))
}

pub fn read_query_file(path: &Path) -> Result<QuerySet> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    Ok(parse_query_file(&content)?)
}

pub fn parse_query_file(content: &str) -> std::result::Result<QuerySet, FormatError> {
    let mut lines = content.lines().enumerate();

    let declared = match lines.next() {
        Some((idx, header)) if !header.trim().is_empty() => {
            parse_node(idx + 1, header.trim())? as usize
        }
        _ => return Err(FormatError::MissingHeader),
    };

    let queries = lines
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| parse_pair(idx + 1, line, line))
        .collect::<std::result::Result<QuerySet, _>>()?;

    if queries.len() != declared {
        return Err(FormatError::CountMismatch {
            declared,
            actual: queries.len(),
        });
    }
    Ok(queries)
}
