//! External collaborator interfaces.
//!
//! The compilation core is pure; everything that touches the outside world
//! is behind a trait. The host supplies view-model reflection (a type
//! expression plus display name) and, when available, an external type
//! checker that consumes the overlay document. Both are simple blocking
//! traits; the facade decides whether to run them off-thread.

use aurea_carton::TextSpan;
use compact_str::CompactString;
use serde::Serialize;

/// View-model reflection supplied by the host.
pub trait VmReflection {
    /// A type expression usable in the overlay, e.g.
    /// `InstanceType<typeof import("/app/vm")["VmClass"]>`.
    fn root_vm_type_expr(&self) -> String;

    /// The user-facing name substituted into diagnostic messages.
    fn display_name(&self) -> String {
        self.root_vm_type_expr()
    }

    /// Prefix reserved for synthesized names.
    fn synthetic_prefix(&self) -> String {
        "__AU_TTC_".to_string()
    }
}

/// A fixed reflection value, the common host implementation.
#[derive(Debug, Clone)]
pub struct StaticVmReflection {
    pub type_expr: String,
    pub display_name: String,
    pub synthetic_prefix: String,
}

impl StaticVmReflection {
    pub fn new(type_expr: impl Into<String>) -> Self {
        let type_expr = type_expr.into();
        Self {
            display_name: type_expr.clone(),
            type_expr,
            synthetic_prefix: "__AU_TTC_".to_string(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }
}

impl VmReflection for StaticVmReflection {
    fn root_vm_type_expr(&self) -> String {
        self.type_expr.clone()
    }

    fn display_name(&self) -> String {
        self.display_name.clone()
    }

    fn synthetic_prefix(&self) -> String {
        self.synthetic_prefix.clone()
    }
}

/// The overlay document handed to the type checker.
#[derive(Debug, Clone, Copy)]
pub struct OverlayDoc<'a> {
    pub uri: &'a str,
    pub text: &'a str,
}

/// A diagnostic reported by the external type checker, in overlay
/// coordinates.
#[derive(Debug, Clone, Serialize)]
pub struct TsDiag {
    /// Checker code, passed through unchanged (e.g. `TS2339`).
    pub code: CompactString,
    pub message: String,
    pub start: u32,
    pub length: u32,
    pub related: Vec<TsRelated>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TsRelated {
    pub message: String,
    pub uri: CompactString,
    pub span: TextSpan,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuickInfo {
    pub text: String,
    pub span: TextSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TsLocation {
    pub uri: CompactString,
    pub span: TextSpan,
}

#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub label: String,
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TsEdit {
    pub uri: CompactString,
    pub span: TextSpan,
    pub new_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodeAction {
    pub title: String,
    pub edits: Vec<TsEdit>,
}

/// The external type checker consumed by the facade.
pub trait TypeChecker {
    fn diagnostics(&self, doc: &OverlayDoc<'_>) -> Vec<TsDiag>;

    fn quick_info(&self, _doc: &OverlayDoc<'_>, _offset: u32) -> Option<QuickInfo> {
        None
    }

    fn definition(&self, _doc: &OverlayDoc<'_>, _offset: u32) -> Vec<TsLocation> {
        Vec::new()
    }

    fn references(&self, _doc: &OverlayDoc<'_>, _offset: u32) -> Vec<TsLocation> {
        Vec::new()
    }

    fn completions(&self, _doc: &OverlayDoc<'_>, _offset: u32) -> Vec<Completion> {
        Vec::new()
    }

    fn code_actions(&self, _doc: &OverlayDoc<'_>, _start: u32, _end: u32) -> Vec<CodeAction> {
        Vec::new()
    }

    fn rename_edits(&self, _doc: &OverlayDoc<'_>, _offset: u32, _new_name: &str) -> Vec<TsEdit> {
        Vec::new()
    }
}

/// A checker that reports nothing; compilation without a host checker.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTypeChecker;

impl TypeChecker for NullTypeChecker {
    fn diagnostics(&self, _doc: &OverlayDoc<'_>) -> Vec<TsDiag> {
        Vec::new()
    }
}
