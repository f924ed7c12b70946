use std::fmt;
use std::path::Path;

/// Diff token sent when an experiment perturbs nothing.
pub const NO_DIFF: &str = "-";

/// Request handed to a worker: the settings object on one line, then
/// `<query file> <response pipe> <diff>`.
#[derive(Debug, Clone, Copy)]
pub struct WirePayload<'a> {
    pub config_json: &'a str,
    pub query_file: &'a Path,
    pub response_identity: &'a Path,
    pub diff: &'a str,
}

impl fmt::Display for WirePayload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let diff = if self.diff.trim().is_empty() {
            NO_DIFF
        } else {
            self.diff
        };
        writeln!(f, "{}", self.config_json)?;
        writeln!(
            f,
            "{} {} {}",
            self.query_file.display(),
            self.response_identity.display(),
            diff
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_layout() {
        let payload = WirePayload {
            config_json: r#"{"hscale":1.0}"#,
            query_file: Path::new("/srv/data/query.node-1.1"),
            response_identity: Path::new("/tmp/warthog.answer.node-1.1"),
            diff: "./data/melb.xy.diff",
        };
        assert_eq!(
            payload.to_string(),
            "{\"hscale\":1.0}\n/srv/data/query.node-1.1 /tmp/warthog.answer.node-1.1 ./data/melb.xy.diff\n"
        );
    }

    #[test]
    fn test_empty_diff_becomes_dash() {
        let payload = WirePayload {
            config_json: "{}",
            query_file: Path::new("/tmp/q"),
            response_identity: Path::new("/tmp/a"),
            diff: "",
        };
        assert!(payload.to_string().ends_with("/tmp/q /tmp/a -\n"));
    }
}
