//! Delivery trace format.
//!
//! A trace is a JSON-lines file, one step per line. Blank lines and lines
//! starting with `#` are skipped.
//!
//! ```text
//! {"type": "transition", "kind": "enter", "regions": ["home"]}
//! {"type": "transition", "kind": "exit", "error_code": 1000}
//! {"type": "boot"}
//! {"type": "location_mode_changed", "mode": "off"}
//! {"type": "providers_changed", "gps": false, "network": true}
//! {"type": "remove", "region": "home"}
//! {"type": "remove_all"}
//! {"type": "wait", "ms": 50}
//! {"type": "ready"}
//! ```

use std::io::BufRead;

use geobridge::region::TransitionKind;
use serde::Deserialize;

use crate::error::CliError;

/// Transition kind as written in a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Enter,
    Exit,
    Dwell,
}

impl From<TraceKind> for TransitionKind {
    fn from(kind: TraceKind) -> Self {
        match kind {
            TraceKind::Enter => TransitionKind::Enter,
            TraceKind::Exit => TransitionKind::Exit,
            TraceKind::Dwell => TransitionKind::Dwell,
        }
    }
}

/// One trace step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEntry {
    /// The provider reports a transition. With an error code the delivery
    /// carries no regions.
    Transition {
        kind: TraceKind,
        #[serde(default)]
        regions: Vec<String>,
        #[serde(default)]
        error_code: Option<i32>,
    },
    Boot,
    LocationModeChanged {
        mode: String,
    },
    ProvidersChanged {
        gps: bool,
        network: bool,
    },
    Remove {
        region: String,
    },
    RemoveAll,
    /// Pause the replay.
    Wait {
        ms: u64,
    },
    /// The host runtime finished starting.
    Ready,
}

/// Parse a JSON-lines trace.
pub fn parse_trace<R: BufRead>(reader: R) -> Result<Vec<TraceEntry>, CliError> {
    let mut entries = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let entry = serde_json::from_str(trimmed).map_err(|e| CliError::Trace {
            line: index + 1,
            message: e.to_string(),
        })?;
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_entry_types() {
        let trace = r#"
# cold start
{"type": "transition", "kind": "enter", "regions": ["home", "work"]}
{"type": "transition", "kind": "exit", "error_code": 1000}
{"type": "boot"}
{"type": "location_mode_changed", "mode": "off"}
{"type": "providers_changed", "gps": false, "network": true}
{"type": "remove", "region": "home"}
{"type": "remove_all"}
{"type": "wait", "ms": 5}
{"type": "ready"}
"#;

        let entries = parse_trace(trace.as_bytes()).unwrap();

        assert_eq!(entries.len(), 9);
        assert_eq!(
            entries[0],
            TraceEntry::Transition {
                kind: TraceKind::Enter,
                regions: vec!["home".to_string(), "work".to_string()],
                error_code: None,
            }
        );
        assert_eq!(
            entries[1],
            TraceEntry::Transition {
                kind: TraceKind::Exit,
                regions: Vec::new(),
                error_code: Some(1000),
            }
        );
        assert_eq!(entries[2], TraceEntry::Boot);
        assert_eq!(entries[8], TraceEntry::Ready);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let trace = "{\"type\": \"boot\"}\n\n{\"type\": \"teleport\"}\n";

        let err = parse_trace(trace.as_bytes()).unwrap_err();

        match err {
            CliError::Trace { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_trace_kind_maps_to_transition_kind() {
        assert_eq!(TransitionKind::from(TraceKind::Dwell), TransitionKind::Dwell);
        assert_eq!(TransitionKind::from(TraceKind::Exit).code(), 2);
    }
}
