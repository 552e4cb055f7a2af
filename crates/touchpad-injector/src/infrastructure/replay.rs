//! JSON-lines touch stream reader.
//!
//! The binary has no touchscreen of its own; touch callbacks arrive as one
//! JSON object per line, from a file or a pipe:
//!
//! ```text
//! {"action":"down","t":0,"pointers":[{"id":0,"x":120,"y":300}]}
//! {"action":"move","t":16,"pointers":[{"id":0,"x":131,"y":296}]}
//! # comments and blank lines are skipped
//! {"action":"up","t":48,"pointers":[{"id":0,"x":131,"y":296}]}
//! ```
//!
//! `t` is a monotonic timestamp in milliseconds; `pointers` lists every
//! finger currently on the surface, including the one that changed.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use touchpad_core::{PointerSample, TouchAction};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("I/O error reading touch stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// One finger in a [`TouchFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub id: u32,
    pub x: f32,
    pub y: f32,
}

/// One touch callback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TouchFrame {
    pub action: TouchAction,
    pub t: u64,
    #[serde(default)]
    pub pointers: Vec<TouchPoint>,
}

impl TouchFrame {
    /// The pointers as classifier samples stamped with `t`.
    pub fn samples(&self) -> Vec<PointerSample> {
        self.pointers
            .iter()
            .map(|p| PointerSample::new(p.id, p.x, p.y, self.t))
            .collect()
    }
}

/// Parses one line; `Ok(None)` for blank and `#` comment lines.
pub fn parse_line(text: &str, line: usize) -> Result<Option<TouchFrame>, ReplayError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    serde_json::from_str(trimmed)
        .map(Some)
        .map_err(|source| ReplayError::Parse { line, source })
}

/// Reads [`TouchFrame`]s from any buffered async reader.
pub struct FrameReader<R> {
    lines: Lines<R>,
    line: usize,
}

impl<R: AsyncBufRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line: 0,
        }
    }

    /// Next frame, or `None` at end of stream.
    pub async fn next_frame(&mut self) -> Result<Option<TouchFrame>, ReplayError> {
        while let Some(text) = self.lines.next_line().await? {
            self.line += 1;
            if let Some(frame) = parse_line(&text, self.line)? {
                return Ok(Some(frame));
            }
        }
        Ok(None)
    }

    /// Number of lines consumed so far.
    pub fn line(&self) -> usize {
        self.line
    }
}
