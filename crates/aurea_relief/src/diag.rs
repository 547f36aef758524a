//! Diagnostic data model.
//!
//! Every pipeline stage reports problems as [`Diagnostic`] values; nothing in
//! the pipeline throws. The aggregation rules (dedupe, sorting, confidence
//! demotion, surface routing) live in the maestro engine; this module defines
//! the shared shape and the stable code set.

use aurea_carton::SourceSpan;
use compact_str::CompactString;
use serde::{Deserialize, Serialize};

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Hint,
}

/// Qualitative resolution confidence, used by regime-2 severity demotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Which pipeline stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagSource {
    Lower,
    Link,
    Bind,
    Plan,
    Emit,
    Typecheck,
}

impl DiagSource {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lower => "lower",
            Self::Link => "link",
            Self::Bind => "bind",
            Self::Plan => "plan",
            Self::Emit => "emit",
            Self::Typecheck => "typecheck",
        }
    }
}

/// A diagnostic routing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Surface {
    Lsp,
}

/// Stable diagnostic codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DiagCode {
    MarkupParseError,
    ExprParseError,
    UnknownElement,
    UnknownAttribute,
    UnknownBindable,
    UnknownController,
    UnknownCommand,
    UnknownConverter,
    UnknownBehavior,
    UnknownEvent,
    InvalidCommandUsage,
    InvalidBindingPattern,
    DuplicateLocal,
    RepeatMissingIterator,
    ExprTypeMismatch,
    /// A type-checker code passed through unchanged (e.g. `TS2339`).
    External(CompactString),
}

impl DiagCode {
    /// The stable string form used for dedupe, sorting, and wire output.
    pub fn as_str(&self) -> &str {
        match self {
            Self::MarkupParseError => "aurelia/markup-parse-error",
            Self::ExprParseError => "aurelia/expr-parse-error",
            Self::UnknownElement => "aurelia/unknown-element",
            Self::UnknownAttribute => "aurelia/unknown-attribute",
            Self::UnknownBindable => "aurelia/unknown-bindable",
            Self::UnknownController => "aurelia/unknown-controller",
            Self::UnknownCommand => "aurelia/unknown-command",
            Self::UnknownConverter => "aurelia/unknown-converter",
            Self::UnknownBehavior => "aurelia/unknown-behavior",
            Self::UnknownEvent => "aurelia/unknown-event",
            Self::InvalidCommandUsage => "aurelia/invalid-command-usage",
            Self::InvalidBindingPattern => "aurelia/invalid-binding-pattern",
            Self::DuplicateLocal => "aurelia/duplicate-local",
            Self::RepeatMissingIterator => "aurelia/repeat/missing-iterator",
            Self::ExprTypeMismatch => "aurelia/expr-type-mismatch",
            Self::External(code) => code,
        }
    }

    /// Ecosystem-compatible AU code, when one exists.
    pub fn aur_code(&self) -> Option<&'static str> {
        match self {
            Self::ExprParseError => Some("AU1203"),
            Self::InvalidBindingPattern => Some("AU1201"),
            Self::DuplicateLocal => Some("AU1202"),
            Self::ExprTypeMismatch => Some("AU1301"),
            _ => None,
        }
    }

    /// Whether this code's severity depends on resolution confidence
    /// (regime 2).
    pub fn is_confidence_gated(&self) -> bool {
        matches!(
            self,
            Self::UnknownElement
                | Self::UnknownAttribute
                | Self::UnknownBindable
                | Self::UnknownController
                | Self::UnknownCommand
                | Self::UnknownConverter
                | Self::UnknownBehavior
                | Self::UnknownEvent
        )
    }
}

/// The resource family a diagnostic refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResourceKind {
    Element,
    Attribute,
    Controller,
    ValueConverter,
    BindingBehavior,
    Command,
    Bindable,
    Event,
}

/// Structured payload carried by a diagnostic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_kind: Option<ResourceKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<CompactString>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aur_code: Option<CompactString>,
    /// `true` when the producer recovered and kept compiling.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub recovery: bool,
}

/// A related location attached to a diagnostic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedLocation {
    pub location: SourceSpan,
    pub message: String,
}

/// One reported problem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: DiagCode,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceSpan>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub related: Vec<RelatedLocation>,
    pub source: DiagSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Confidence>,
    #[serde(default)]
    pub data: DiagData,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(
        code: DiagCode,
        message: impl Into<String>,
        location: Option<SourceSpan>,
        source: DiagSource,
    ) -> Self {
        Self::with_severity(code, Severity::Error, message, location, source)
    }

    /// Create a warning diagnostic.
    pub fn warning(
        code: DiagCode,
        message: impl Into<String>,
        location: Option<SourceSpan>,
        source: DiagSource,
    ) -> Self {
        Self::with_severity(code, Severity::Warning, message, location, source)
    }

    pub fn with_severity(
        code: DiagCode,
        severity: Severity,
        message: impl Into<String>,
        location: Option<SourceSpan>,
        source: DiagSource,
    ) -> Self {
        let aur_code = code.aur_code().map(CompactString::from);
        Self {
            code,
            severity,
            message: message.into(),
            location,
            related: Vec::new(),
            source,
            confidence: None,
            data: DiagData {
                aur_code,
                ..DiagData::default()
            },
        }
    }

    /// Attach a resolution confidence.
    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Attach resource metadata.
    pub fn with_resource(mut self, kind: ResourceKind, name: impl Into<CompactString>) -> Self {
        self.data.resource_kind = Some(kind);
        self.data.name = Some(name.into());
        self
    }

    /// Mark the producer as having recovered (fail-soft).
    pub fn with_recovery(mut self) -> Self {
        self.data.recovery = true;
        self
    }

    /// Attach a related location.
    pub fn with_related(mut self, location: SourceSpan, message: impl Into<String>) -> Self {
        self.related.push(RelatedLocation {
            location,
            message: message.into(),
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aurea_carton::TextSpan;

    #[test]
    fn codes_have_stable_strings() {
        assert_eq!(DiagCode::UnknownElement.as_str(), "aurelia/unknown-element");
        assert_eq!(
            DiagCode::RepeatMissingIterator.as_str(),
            "aurelia/repeat/missing-iterator"
        );
        assert_eq!(DiagCode::External("TS2339".into()).as_str(), "TS2339");
    }

    #[test]
    fn confidence_gating_covers_the_unknown_family() {
        assert!(DiagCode::UnknownElement.is_confidence_gated());
        assert!(DiagCode::UnknownConverter.is_confidence_gated());
        assert!(!DiagCode::ExprParseError.is_confidence_gated());
        assert!(!DiagCode::InvalidCommandUsage.is_confidence_gated());
    }

    #[test]
    fn constructor_backfills_aur_code() {
        let diag = Diagnostic::error(
            DiagCode::ExprParseError,
            "unexpected token",
            Some(SourceSpan::local(TextSpan::new(3, 8))),
            DiagSource::Lower,
        );
        assert_eq!(diag.data.aur_code.as_deref(), Some("AU1203"));
        assert_eq!(diag.severity, Severity::Error);
    }
}
