use std::path::Path;

use super::{NodeId, Query, QuerySet};
use crate::error::{Error, FormatError, Result};

/// Lines starting with this marker carry a query; everything else is skipped.
pub const QUERY_MARKER: char = 'q';

/// Read a point-to-point scenario file.
pub fn load_scenario(path: &Path) -> Result<QuerySet> {
    let content = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let queries = parse_scenario(&content)?;
    tracing::debug!("Loaded {} queries from {}", queries.len(), path.display());
    Ok(queries)
}

/// Parse scenario text into queries, preserving line order.
///
/// Each retained line is exactly `q <source> <target>`.
pub fn parse_scenario(content: &str) -> std::result::Result<QuerySet, FormatError> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && line.starts_with(QUERY_MARKER))
        .map(|(idx, line)| parse_query_line(idx + 1, line))
        .collect()
}

fn parse_query_line(line_no: usize, line: &str) -> std::result::Result<Query, FormatError> {
    parse_pair(line_no, line, &line[QUERY_MARKER.len_utf8()..])
}

/// Parse `fields` as exactly a source and a target; `line` is quoted in errors.
pub(crate) fn parse_pair(
    line_no: usize,
    line: &str,
    fields: &str,
) -> std::result::Result<Query, FormatError> {
    let mut fields = fields.split_whitespace();
    match (fields.next(), fields.next(), fields.next()) {
        (Some(source), Some(target), None) => Ok(Query::new(
            parse_node(line_no, source)?,
            parse_node(line_no, target)?,
        )),
        (Some(_), Some(_), Some(_)) => Err(FormatError::TrailingFields {
            line: line_no,
            content: line.to_string(),
        }),
        _ => Err(FormatError::MissingFields {
            line: line_no,
            content: line.to_string(),
        }),
    }
}

pub(crate) fn parse_node(line_no: usize, token: &str) -> std::result::Result<NodeId, FormatError> {
    token.parse().map_err(|_| FormatError::InvalidNodeId {
        line: line_no,
        token: token.to_string(),
    })
}
