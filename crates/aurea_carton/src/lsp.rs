//! Minimal LSP wire types.
//!
//! The compilation pipeline works in byte offsets; only the facade converts
//! to these editor-facing shapes. Lines and characters are zero-based and
//! characters count UTF-16 code units, per the protocol.

use serde::{Deserialize, Serialize};

/// Zero-based line + UTF-16 character position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub character: u32,
}

impl Position {
    pub const fn new(line: u32, character: u32) -> Self {
        Self { line, character }
    }
}

/// Half-open position range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// URI + range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub uri: String,
    pub range: Range,
}

impl Location {
    pub fn new(uri: impl Into<String>, range: Range) -> Self {
        Self {
            uri: uri.into(),
            range,
        }
    }
}

/// Diagnostic severity, wire-encoded as 1..=4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum LspSeverity {
    Error = 1,
    Warning = 2,
    Information = 3,
    Hint = 4,
}

impl From<LspSeverity> for u8 {
    fn from(value: LspSeverity) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for LspSeverity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        match value {
            1 => Ok(Self::Error),
            2 => Ok(Self::Warning),
            3 => Ok(Self::Information),
            4 => Ok(Self::Hint),
            other => Err(format!("invalid severity: {other}")),
        }
    }
}

/// Related location attached to a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedInformation {
    pub location: Location,
    pub message: String,
}

/// An editor-facing diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LspDiagnostic {
    pub range: Range,
    pub severity: LspSeverity,
    /// Stable domain code, e.g. `aurelia/unknown-element`.
    pub code: String,
    /// Producer tag, e.g. `aurea/link`.
    pub source: String,
    pub message: String,
    #[serde(rename = "relatedInformation", skip_serializing_if = "Vec::is_empty", default)]
    pub related_information: Vec<RelatedInformation>,
}
