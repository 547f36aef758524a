//! Template markup parser.
//!
//! Drives the tokenizer and assembles an owned markup tree. Recovery rules:
//! a mismatched close tag pops back to the nearest matching open element,
//! a stray close tag is dropped, and unclosed elements are closed at EOF.
//! Every recovery produces a [`MarkupError`] so the lowering can report it.

use aurea_carton::TextSpan;
use aurea_relief::{Namespace, RawAttr};
use compact_str::CompactString;
use phf::phf_set;

use crate::tokenizer::{Callbacks, QuoteType, TokenizeError, Tokenizer};

/// Elements that never have children.
static VOID_ELEMENTS: phf::Set<&'static str> = phf_set! {
    "area", "base", "br", "col", "embed", "hr", "img", "input",
    "link", "meta", "param", "source", "track", "wbr",
};

/// Parse error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupErrorCode {
    MismatchedCloseTag,
    StrayCloseTag,
    UnclosedElement,
    UnterminatedComment,
    UnterminatedAttrValue,
    UnexpectedEof,
}

impl MarkupErrorCode {
    pub const fn message(self) -> &'static str {
        match self {
            Self::MismatchedCloseTag => "close tag does not match the open element",
            Self::StrayCloseTag => "close tag has no matching open element",
            Self::UnclosedElement => "element is never closed",
            Self::UnterminatedComment => "comment is never closed",
            Self::UnterminatedAttrValue => "attribute value is never closed",
            Self::UnexpectedEof => "unexpected end of input inside a tag",
        }
    }
}

/// A recovered parse error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupError {
    pub code: MarkupErrorCode,
    pub span: TextSpan,
}

/// An element of the markup tree.
#[derive(Debug, Clone)]
pub struct MarkupElement {
    pub tag: CompactString,
    pub tag_span: TextSpan,
    pub ns: Namespace,
    pub attrs: Vec<RawAttr>,
    pub children: Vec<MarkupNode>,
    /// Open tag start through close tag end (or recovery point).
    pub span: TextSpan,
    pub self_closing: bool,
}

/// One node of the markup tree.
#[derive(Debug, Clone)]
pub enum MarkupNode {
    Element(MarkupElement),
    Text {
        text: CompactString,
        span: TextSpan,
    },
    Comment {
        text: CompactString,
        span: TextSpan,
    },
}

impl MarkupNode {
    pub fn span(&self) -> TextSpan {
        match self {
            Self::Element(el) => el.span,
            Self::Text { span, .. } | Self::Comment { span, .. } => *span,
        }
    }
}

/// A parsed document: root nodes plus recovered errors.
#[derive(Debug, Clone)]
pub struct MarkupDocument {
    pub roots: Vec<MarkupNode>,
    pub errors: Vec<MarkupError>,
}

/// Parse template markup into an owned tree.
pub fn parse_markup(source: &str) -> MarkupDocument {
    let builder = TreeBuilder::new(source);
    let builder = Tokenizer::new(source, builder).run();
    builder.finish()
}

/// A frame on the open-element stack.
struct OpenElement {
    element: MarkupElement,
    open_start: u32,
}

struct TreeBuilder<'a> {
    source: &'a str,
    roots: Vec<MarkupNode>,
    stack: Vec<OpenElement>,
    errors: Vec<MarkupError>,
    /// Attribute accumulation for the tag currently being opened.
    pending_tag: Option<PendingTag>,
    pending_attr: Option<PendingAttr>,
}

struct PendingTag {
    tag: CompactString,
    tag_span: TextSpan,
    open_start: u32,
    attrs: Vec<RawAttr>,
}

struct PendingAttr {
    name: CompactString,
    name_span: TextSpan,
}

impl<'a> TreeBuilder<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            roots: Vec::new(),
            stack: Vec::new(),
            errors: Vec::new(),
            pending_tag: None,
            pending_attr: None,
        }
    }

    fn slice(&self, start: usize, end: usize) -> CompactString {
        CompactString::from(&self.source[start..end])
    }

    fn push_node(&mut self, node: MarkupNode) {
        match self.stack.last_mut() {
            Some(open) => open.element.children.push(node),
            None => self.roots.push(node),
        }
    }

    /// Namespace for children of the current open element.
    fn current_ns(&self) -> Namespace {
        self.stack
            .last()
            .map(|open| match open.element.tag.as_str() {
                "svg" => Namespace::Svg,
                "math" => Namespace::MathMl,
                _ => open.element.ns,
            })
            .unwrap_or(Namespace::Html)
    }

    fn flush_pending_attr(&mut self, value: Option<(TextSpan, CompactString, bool)>) {
        let source_len = self.source.len() as u32;
        let Some(attr) = self.pending_attr.take() else {
            return;
        };
        let Some(tag) = self.pending_tag.as_mut() else {
            return;
        };
        let (value, value_span, span_end) = match value {
            Some((span, text, quoted)) => {
                let end = if quoted {
                    (span.end + 1).min(source_len)
                } else {
                    span.end
                };
                (Some(text), Some(span), end)
            }
            None => (None, None, attr.name_span.end),
        };
        tag.attrs.push(RawAttr {
            name: attr.name,
            name_span: attr.name_span,
            value,
            value_span,
            span: TextSpan::new(attr.name_span.start, span_end),
        });
    }

    fn close_element(&mut self, mut open: OpenElement, end: u32) {
        open.element.span = TextSpan::new(open.open_start, end);
        self.push_node(MarkupNode::Element(open.element));
    }

    fn finish(mut self) -> MarkupDocument {
        while let Some(open) = self.stack.pop() {
            self.errors.push(MarkupError {
                code: MarkupErrorCode::UnclosedElement,
                span: open.element.tag_span,
            });
            let end = self.source.len() as u32;
            self.close_element(open, end);
        }
        MarkupDocument {
            roots: self.roots,
            errors: self.errors,
        }
    }
}

impl Callbacks for TreeBuilder<'_> {
    fn on_text(&mut self, start: usize, end: usize) {
        let span = TextSpan::new(start as u32, end as u32);
        // Merge adjacent text sections (the tokenizer splits on stray '<').
        if let Some(MarkupNode::Text {
            text,
            span: prev_span,
        }) = match self.stack.last_mut() {
            Some(open) => open.element.children.last_mut(),
            None => self.roots.last_mut(),
        } {
            if prev_span.end == span.start {
                text.push_str(&self.source[start..end]);
                prev_span.end = span.end;
                return;
            }
        }
        self.push_node(MarkupNode::Text {
            text: self.slice(start, end),
            span,
        });
    }

    fn on_open_tag_name(&mut self, start: usize, end: usize) {
        let mut tag = self.slice(start, end);
        if tag.bytes().any(|b| b.is_ascii_uppercase()) {
            tag = CompactString::from(tag.to_ascii_lowercase());
        }
        self.pending_tag = Some(PendingTag {
            tag,
            tag_span: TextSpan::new(start as u32, end as u32),
            open_start: start as u32 - 1,
            attrs: Vec::new(),
        });
    }

    fn on_open_tag_end(&mut self, end: usize, self_closing: bool) {
        self.flush_pending_attr(None);
        let Some(tag) = self.pending_tag.take() else {
            return;
        };
        let ns = self.current_ns();
        let element = MarkupElement {
            tag: tag.tag,
            tag_span: tag.tag_span,
            ns,
            attrs: tag.attrs,
            children: Vec::new(),
            span: TextSpan::new(tag.open_start, end as u32 + 1),
            self_closing,
        };
        let is_void = VOID_ELEMENTS.contains(element.tag.as_str());
        if self_closing || is_void {
            self.push_node(MarkupNode::Element(element));
        } else {
            self.stack.push(OpenElement {
                open_start: element.span.start,
                element,
            });
        }
    }

    fn on_close_tag(&mut self, start: usize, end: usize) {
        let name = self.source[start..end].to_ascii_lowercase();
        let tag_end = end as u32 + 1; // past '>'

        let matching = self
            .stack
            .iter()
            .rposition(|open| open.element.tag.eq_ignore_ascii_case(&name));
        match matching {
            Some(position) => {
                // Anything above the match is unclosed.
                let cut = (start as u32).saturating_sub(2); // before "</"
                while self.stack.len() > position + 1 {
                    let Some(open) = self.stack.pop() else {
                        break;
                    };
                    self.errors.push(MarkupError {
                        code: MarkupErrorCode::MismatchedCloseTag,
                        span: open.element.tag_span,
                    });
                    self.close_element(open, cut);
                }
                if let Some(open) = self.stack.pop() {
                    self.close_element(open, tag_end);
                }
            }
            None => {
                self.errors.push(MarkupError {
                    code: MarkupErrorCode::StrayCloseTag,
                    span: TextSpan::new(start as u32, end as u32),
                });
            }
        }
    }

    fn on_attr_name(&mut self, start: usize, end: usize) {
        self.flush_pending_attr(None);
        self.pending_attr = Some(PendingAttr {
            name: self.slice(start, end),
            name_span: TextSpan::new(start as u32, end as u32),
        });
    }

    fn on_attr_value(&mut self, start: usize, end: usize, quote: QuoteType) {
        let span = TextSpan::new(start as u32, end as u32);
        let text = self.slice(start, end);
        let quoted = matches!(quote, QuoteType::Single | QuoteType::Double);
        self.flush_pending_attr(Some((span, text, quoted)));
    }

    fn on_comment(&mut self, start: usize, end: usize) {
        self.push_node(MarkupNode::Comment {
            text: self.slice(start, end),
            span: TextSpan::new(start as u32, end as u32),
        });
    }

    fn on_error(&mut self, error: TokenizeError, at: usize) {
        let code = match error {
            TokenizeError::UnexpectedEofInTag => MarkupErrorCode::UnexpectedEof,
            TokenizeError::UnterminatedComment => MarkupErrorCode::UnterminatedComment,
            TokenizeError::UnterminatedAttrValue => MarkupErrorCode::UnterminatedAttrValue,
        };
        self.errors.push(MarkupError {
            code,
            span: TextSpan::new(at as u32, at as u32),
        });
    }

    fn on_end(&mut self, _at: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(doc: &MarkupDocument) -> &MarkupElement {
        doc.roots
            .iter()
            .find_map(|node| match node {
                MarkupNode::Element(el) => Some(el),
                _ => None,
            })
            .expect("no element parsed")
    }

    #[test]
    fn nested_tree_with_spans() {
        let src = r#"<template><div class="a">hi</div></template>"#;
        let doc = parse_markup(src);
        assert!(doc.errors.is_empty());
        let template = first_element(&doc);
        assert_eq!(template.tag, "template");
        assert_eq!(template.span, TextSpan::new(0, src.len() as u32));
        let MarkupNode::Element(div) = &template.children[0] else {
            panic!("expected element child");
        };
        assert_eq!(div.tag, "div");
        assert_eq!(div.attrs.len(), 1);
        assert_eq!(div.attrs[0].name, "class");
        assert_eq!(div.attrs[0].value.as_deref(), Some("a"));
        let MarkupNode::Text { text, .. } = &div.children[0] else {
            panic!("expected text child");
        };
        assert_eq!(text, "hi");
    }

    #[test]
    fn void_elements_do_not_nest() {
        let doc = parse_markup("<div><br><input value.bind=\"x\"></div>");
        assert!(doc.errors.is_empty());
        let div = first_element(&doc);
        assert_eq!(div.children.len(), 2);
    }

    #[test]
    fn tag_names_are_lowercased() {
        let doc = parse_markup("<DIV></DIV>");
        assert!(doc.errors.is_empty());
        assert_eq!(first_element(&doc).tag, "div");
    }

    #[test]
    fn stray_close_tag_is_reported_and_dropped() {
        let doc = parse_markup("<div></span></div>");
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].code, MarkupErrorCode::StrayCloseTag);
        assert!(first_element(&doc).children.is_empty());
    }

    #[test]
    fn unclosed_element_recovers_at_eof() {
        let doc = parse_markup("<div><span>text");
        assert_eq!(doc.errors.len(), 2);
        assert!(doc
            .errors
            .iter()
            .all(|e| e.code == MarkupErrorCode::UnclosedElement));
        let div = first_element(&doc);
        assert_eq!(div.tag, "div");
    }

    #[test]
    fn mismatched_close_pops_to_match() {
        let doc = parse_markup("<div><span>a</div>");
        assert_eq!(doc.errors.len(), 1);
        assert_eq!(doc.errors[0].code, MarkupErrorCode::MismatchedCloseTag);
        let div = first_element(&doc);
        assert_eq!(div.tag, "div");
        let MarkupNode::Element(span_el) = &div.children[0] else {
            panic!("expected span child");
        };
        assert_eq!(span_el.tag, "span");
    }

    #[test]
    fn svg_children_get_svg_namespace() {
        let doc = parse_markup("<svg><path></path></svg>");
        let svg = first_element(&doc);
        assert_eq!(svg.ns, Namespace::Html);
        let MarkupNode::Element(path) = &svg.children[0] else {
            panic!("expected path child");
        };
        assert_eq!(path.ns, Namespace::Svg);
    }

    #[test]
    fn interpolation_text_is_kept_verbatim(){
        let doc = parse_markup("<p>${a} and ${b}</p>");
        let p = first_element(&doc);
        let MarkupNode::Text { text, span } = &p.children[0] else {
            panic!("expected text child");
        };
        assert_eq!(text, "${a} and ${b}");
        assert_eq!(span.slice("<p>${a} and ${b}</p>"), "${a} and ${b}");
    }
}
