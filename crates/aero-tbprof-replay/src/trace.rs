//! Recorded translation/execution event stream.
//!
//! One JSON object per line, tagged by `"type"`:
//!
//! ```text
//! {"type":"header","arch":"x86_64"}
//! {"type":"translate","vaddr":4096,"insns":[{"bytes":[144]}],"symbol":"main"}
//! {"type":"exec","vaddr":4096,"repeat":1000}
//! ```
//!
//! Blank lines are ignored.

use std::io::BufRead;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceInsn {
    pub bytes: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disas: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    Header {
        arch: String,
    },
    Translate {
        vaddr: u64,
        insns: Vec<TraceInsn>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        symbol_offset: Option<u64>,
    },
    Exec {
        vaddr: u64,
        #[serde(default = "one")]
        repeat: u64,
    },
}

fn one() -> u64 {
    1
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error("line {line}: failed to read trace: {source}")]
    Io {
        line: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: malformed event: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: translated block at {vaddr:#x} has no instructions")]
    EmptyBlock { line: usize, vaddr: u64 },

    #[error("line {line}: exec of untranslated block at {vaddr:#x}")]
    UntranslatedExec { line: usize, vaddr: u64 },
}

/// Iterate `(line number, event)` pairs, skipping blank lines.
pub fn events<R: BufRead>(
    input: R,
) -> impl Iterator<Item = Result<(usize, TraceEvent), TraceError>> {
    input.lines().enumerate().filter_map(|(idx, line)| {
        let line_no = idx + 1;
        let line = match line {
            Ok(line) => line,
            Err(source) => return Some(Err(TraceError::Io { line: line_no, source })),
        };
        let text = line.trim();
        if text.is_empty() {
            return None;
        }
        Some(
            serde_json::from_str(text)
                .map(|event| (line_no, event))
                .map_err(|source| TraceError::Parse { line: line_no, source }),
        )
    })
}
