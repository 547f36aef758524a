//! Shared test support: a deterministic fake type checker.
//!
//! The fake is a crude stand-in for a real TypeScript service: it answers
//! quick-info with `name: string`, and resolves references/rename by
//! identifier-boundary text search over the overlay. Canned diagnostics can
//! be injected per test.

use aurea_carton::TextSpan;
use aurea_maestro::{OverlayDoc, QuickInfo, TsDiag, TsEdit, TsLocation, TypeChecker};
use compact_str::CompactString;

#[derive(Default)]
pub struct FakeChecker {
    pub canned: Vec<TsDiag>,
}

impl FakeChecker {
    pub fn with_diag(code: &str, message: &str, start: u32, length: u32) -> Self {
        Self {
            canned: vec![TsDiag {
                code: CompactString::from(code),
                message: message.to_string(),
                start,
                length,
                related: Vec::new(),
            }],
        }
    }
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$'
}

/// The identifier covering `offset`, if any.
pub fn word_at(text: &str, offset: u32) -> Option<(String, TextSpan)> {
    let bytes = text.as_bytes();
    let offset = offset as usize;
    if offset >= bytes.len() || !is_ident_byte(bytes[offset]) {
        return None;
    }
    let mut start = offset;
    while start > 0 && is_ident_byte(bytes[start - 1]) {
        start -= 1;
    }
    let mut end = offset;
    while end < bytes.len() && is_ident_byte(bytes[end]) {
        end += 1;
    }
    Some((
        text[start..end].to_string(),
        TextSpan::new(start as u32, end as u32),
    ))
}

/// Every identifier-boundary occurrence of `word` in `text`.
pub fn occurrences(text: &str, word: &str) -> Vec<TextSpan> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut from = 0usize;
    while let Some(found) = text[from..].find(word) {
        let at = from + found;
        let end = at + word.len();
        let before_ok = at == 0 || !is_ident_byte(bytes[at - 1]);
        let after_ok = end >= bytes.len() || !is_ident_byte(bytes[end]);
        if before_ok && after_ok {
            out.push(TextSpan::new(at as u32, end as u32));
        }
        from = at + word.len().max(1);
    }
    out
}

impl TypeChecker for FakeChecker {
    fn diagnostics(&self, _doc: &OverlayDoc<'_>) -> Vec<TsDiag> {
        self.canned.clone()
    }

    fn quick_info(&self, doc: &OverlayDoc<'_>, offset: u32) -> Option<QuickInfo> {
        let (word, span) = word_at(doc.text, offset)?;
        Some(QuickInfo {
            text: format!("(property) {word}: string"),
            span,
        })
    }

    fn references(&self, doc: &OverlayDoc<'_>, offset: u32) -> Vec<TsLocation> {
        let Some((word, _)) = word_at(doc.text, offset) else {
            return Vec::new();
        };
        occurrences(doc.text, &word)
            .into_iter()
            .map(|span| TsLocation {
                uri: CompactString::from(doc.uri),
                span,
            })
            .collect()
    }

    fn rename_edits(&self, doc: &OverlayDoc<'_>, offset: u32, new_name: &str) -> Vec<TsEdit> {
        let Some((word, _)) = word_at(doc.text, offset) else {
            return Vec::new();
        };
        occurrences(doc.text, &word)
            .into_iter()
            .map(|span| TsEdit {
                uri: CompactString::from(doc.uri),
                span,
                new_text: new_name.to_string(),
            })
            .collect()
    }
}
