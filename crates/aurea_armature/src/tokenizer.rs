//! HTML tokenizer for Aurelia templates.
//!
//! A state machine over raw bytes, in the htmlparser2 lineage. The tokenizer
//! reports spans through a [`Callbacks`] sink and never allocates for
//! content; the tree parser slices the original text. Interpolation (`${…}`)
//! is not tokenized here: Aurelia allows it inside both text and attribute
//! values, so the lowering scans the reported slices instead.

use memchr::memchr;

/// Character codes used in state dispatch.
mod char_codes {
    pub const TAB: u8 = 0x09;
    pub const NEWLINE: u8 = 0x0A;
    pub const FORM_FEED: u8 = 0x0C;
    pub const CARRIAGE_RETURN: u8 = 0x0D;
    pub const SPACE: u8 = 0x20;
    pub const EXCLAMATION: u8 = 0x21;
    pub const DOUBLE_QUOTE: u8 = 0x22;
    pub const SINGLE_QUOTE: u8 = 0x27;
    pub const DASH: u8 = 0x2D;
    pub const SLASH: u8 = 0x2F;
    pub const LT: u8 = 0x3C;
    pub const EQ: u8 = 0x3D;
    pub const GT: u8 = 0x3E;
    pub const QUESTION: u8 = 0x3F;
}

use char_codes::*;

/// Tokenizer states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum State {
    Text = 1,
    BeforeTagName,
    InTagName,
    BeforeClosingTagName,
    InClosingTagName,
    AfterClosingTagName,
    BeforeAttrName,
    InAttrName,
    AfterAttrName,
    BeforeAttrValue,
    InAttrValueDq,
    InAttrValueSq,
    InAttrValueNq,
    InSelfClosingTag,
    BeforeDeclaration,
    InDeclaration,
    InProcessingInstruction,
    InComment,
    InRawText,
}

/// Quote style of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum QuoteType {
    NoValue = 0,
    Unquoted = 1,
    Single = 2,
    Double = 3,
}

/// Recoverable tokenizer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenizeError {
    UnexpectedEofInTag,
    UnterminatedComment,
    UnterminatedAttrValue,
}

/// Span sink driven by the tokenizer. All positions are byte offsets.
pub trait Callbacks {
    fn on_text(&mut self, start: usize, end: usize);
    fn on_open_tag_name(&mut self, start: usize, end: usize);
    /// Open tag finished. `self_closing` distinguishes `<br/>`.
    fn on_open_tag_end(&mut self, end: usize, self_closing: bool);
    /// Closing tag name span.
    fn on_close_tag(&mut self, start: usize, end: usize);
    fn on_attr_name(&mut self, start: usize, end: usize);
    /// Attribute value content span (without quotes).
    fn on_attr_value(&mut self, start: usize, end: usize, quote: QuoteType);
    fn on_comment(&mut self, start: usize, end: usize);
    fn on_error(&mut self, error: TokenizeError, at: usize);
    fn on_end(&mut self, at: usize);

    /// Raw-text element names whose content must not be parsed as markup.
    fn is_raw_text_tag(&self, name: &[u8]) -> bool {
        name.eq_ignore_ascii_case(b"script") || name.eq_ignore_ascii_case(b"style")
    }
}

#[inline]
fn is_whitespace(c: u8) -> bool {
    matches!(c, SPACE | NEWLINE | TAB | FORM_FEED | CARRIAGE_RETURN)
}

#[inline]
fn is_tag_start(c: u8) -> bool {
    c.is_ascii_alphabetic()
}

#[inline]
fn ends_tag_section(c: u8) -> bool {
    c == SLASH || c == GT || is_whitespace(c)
}

/// The tokenizer. Feed the whole input once via [`Tokenizer::run`].
pub struct Tokenizer<'a, C: Callbacks> {
    input: &'a [u8],
    state: State,
    section_start: usize,
    index: usize,
    callbacks: C,
    /// Close sequence we are scanning for inside a raw-text element.
    raw_close: Vec<u8>,
}

impl<'a, C: Callbacks> Tokenizer<'a, C> {
    pub fn new(input: &'a str, callbacks: C) -> Self {
        Self {
            input: input.as_bytes(),
            state: State::Text,
            section_start: 0,
            index: 0,
            callbacks,
            raw_close: Vec::new(),
        }
    }

    /// Run to completion and return the sink.
    pub fn run(mut self) -> C {
        while self.index < self.input.len() {
            let c = self.input[self.index];
            match self.state {
                State::Text => self.state_text(c),
                State::BeforeTagName => self.state_before_tag_name(c),
                State::InTagName => self.state_in_tag_name(c),
                State::BeforeClosingTagName => self.state_before_closing_tag_name(c),
                State::InClosingTagName => self.state_in_closing_tag_name(c),
                State::AfterClosingTagName => self.state_after_closing_tag_name(c),
                State::BeforeAttrName => self.state_before_attr_name(c),
                State::InAttrName => self.state_in_attr_name(c),
                State::AfterAttrName => self.state_after_attr_name(c),
                State::BeforeAttrValue => self.state_before_attr_value(c),
                State::InAttrValueDq => self.state_in_attr_value_quoted(c, DOUBLE_QUOTE),
                State::InAttrValueSq => self.state_in_attr_value_quoted(c, SINGLE_QUOTE),
                State::InAttrValueNq => self.state_in_attr_value_nq(c),
                State::InSelfClosingTag => self.state_in_self_closing_tag(c),
                State::BeforeDeclaration => self.state_before_declaration(c),
                State::InDeclaration => self.state_skip_to_gt(),
                State::InProcessingInstruction => self.state_skip_to_gt(),
                State::InComment => self.state_in_comment(),
                State::InRawText => self.state_in_raw_text(),
            }
            self.index += 1;
        }
        self.finish();
        self.callbacks
    }

    fn state_text(&mut self, c: u8) {
        if c == LT {
            if self.index > self.section_start {
                self.callbacks.on_text(self.section_start, self.index);
            }
            self.section_start = self.index;
            self.state = State::BeforeTagName;
        } else if let Some(found) = memchr(LT, &self.input[self.index..]) {
            // Fast-forward to the next '<'; the loop increment lands on it.
            self.index += found.saturating_sub(1);
        } else {
            self.index = self.input.len();
        }
    }

    fn state_before_tag_name(&mut self, c: u8) {
        if is_tag_start(c) {
            self.section_start = self.index;
            self.state = State::InTagName;
        } else if c == SLASH {
            self.state = State::BeforeClosingTagName;
        } else if c == EXCLAMATION {
            self.state = State::BeforeDeclaration;
        } else if c == QUESTION {
            self.state = State::InProcessingInstruction;
        } else {
            // Not a tag after all; the '<' belongs to text.
            self.state = State::Text;
            self.index -= 1;
        }
    }

    fn state_in_tag_name(&mut self, c: u8) {
        if ends_tag_section(c) {
            let (start, end) = (self.section_start, self.index);
            self.callbacks.on_open_tag_name(start, end);
            if self.callbacks.is_raw_text_tag(&self.input[start..end]) {
                self.raw_close = b"</".to_vec();
                self.raw_close.extend_from_slice(&self.input[start..end]);
            }
            self.section_start = self.index;
            self.state = State::BeforeAttrName;
            self.index -= 1;
        }
    }

    fn state_before_closing_tag_name(&mut self, c: u8) {
        if is_whitespace(c) {
            // skip
        } else if c == GT {
            self.state = State::Text;
            self.section_start = self.index + 1;
        } else {
            self.section_start = self.index;
            self.state = State::InClosingTagName;
        }
    }

    fn state_in_closing_tag_name(&mut self, c: u8) {
        if c == GT || is_whitespace(c) {
            self.callbacks.on_close_tag(self.section_start, self.index);
            self.state = State::AfterClosingTagName;
            self.index -= 1;
        }
    }

    fn state_after_closing_tag_name(&mut self, c: u8) {
        if c == GT {
            self.state = State::Text;
            self.section_start = self.index + 1;
        }
    }

    fn state_before_attr_name(&mut self, c: u8) {
        if c == GT {
            self.callbacks.on_open_tag_end(self.index, false);
            self.section_start = self.index + 1;
            self.state = if self.raw_close.is_empty() {
                State::Text
            } else {
                State::InRawText
            };
        } else if c == SLASH {
            self.state = State::InSelfClosingTag;
        } else if !is_whitespace(c) {
            self.section_start = self.index;
            self.state = State::InAttrName;
        }
    }

    fn state_in_attr_name(&mut self, c: u8) {
        if c == EQ || ends_tag_section(c) {
            self.callbacks.on_attr_name(self.section_start, self.index);
            self.section_start = self.index;
            self.state = State::AfterAttrName;
            self.index -= 1;
        }
    }

    fn state_after_attr_name(&mut self, c: u8) {
        if c == EQ {
            self.state = State::BeforeAttrValue;
        } else if c == SLASH || c == GT {
            self.state = State::BeforeAttrName;
            self.index -= 1;
        } else if !is_whitespace(c) {
            // Valueless attribute followed by another name.
            self.state = State::BeforeAttrName;
            self.index -= 1;
        }
    }

    fn state_before_attr_value(&mut self, c: u8) {
        if c == DOUBLE_QUOTE {
            self.section_start = self.index + 1;
            self.state = State::InAttrValueDq;
        } else if c == SINGLE_QUOTE {
            self.section_start = self.index + 1;
            self.state = State::InAttrValueSq;
        } else if !is_whitespace(c) {
            self.section_start = self.index;
            self.state = State::InAttrValueNq;
            self.index -= 1;
        }
    }

    fn state_in_attr_value_quoted(&mut self, c: u8, quote: u8) {
        if c == quote {
            let quote_type = if quote == DOUBLE_QUOTE {
                QuoteType::Double
            } else {
                QuoteType::Single
            };
            self.callbacks
                .on_attr_value(self.section_start, self.index, quote_type);
            self.state = State::BeforeAttrName;
        }
    }

    fn state_in_attr_value_nq(&mut self, c: u8) {
        if is_whitespace(c) || c == GT {
            self.callbacks
                .on_attr_value(self.section_start, self.index, QuoteType::Unquoted);
            self.state = State::BeforeAttrName;
            self.index -= 1;
        }
    }

    fn state_in_self_closing_tag(&mut self, c: u8) {
        if c == GT {
            self.callbacks.on_open_tag_end(self.index, true);
            self.section_start = self.index + 1;
            // A self-closed raw-text element has no content to skip.
            self.raw_close.clear();
            self.state = State::Text;
        } else if !is_whitespace(c) {
            self.state = State::BeforeAttrName;
            self.index -= 1;
        }
    }

    fn state_before_declaration(&mut self, c: u8) {
        if c == DASH && self.input.get(self.index + 1) == Some(&DASH) {
            self.state = State::InComment;
            self.index += 1;
            self.section_start = self.index + 1;
        } else {
            self.state = State::InDeclaration;
        }
    }

    fn state_skip_to_gt(&mut self) {
        if let Some(found) = memchr(GT, &self.input[self.index..]) {
            self.index += found;
            self.section_start = self.index + 1;
            self.state = State::Text;
        } else {
            self.index = self.input.len();
        }
    }

    fn state_in_comment(&mut self) {
        // Scan for "-->" from the current position.
        let rest = &self.input[self.index..];
        let mut offset = 0;
        while let Some(found) = memchr(DASH, &rest[offset..]) {
            let at = offset + found;
            if rest.get(at + 1) == Some(&DASH) && rest.get(at + 2) == Some(&GT) {
                self.callbacks.on_comment(self.section_start, self.index + at);
                self.index += at + 2;
                self.section_start = self.index + 1;
                self.state = State::Text;
                return;
            }
            offset = at + 1;
        }
        self.callbacks
            .on_error(TokenizeError::UnterminatedComment, self.section_start);
        self.callbacks.on_comment(self.section_start, self.input.len());
        self.index = self.input.len();
        self.section_start = self.input.len();
        self.state = State::Text;
    }

    fn state_in_raw_text(&mut self) {
        let close = std::mem::take(&mut self.raw_close);
        let rest = &self.input[self.index..];
        let mut offset = 0;
        loop {
            let Some(found) = memchr(LT, &rest[offset..]) else {
                // Unterminated raw text: everything to EOF is content.
                self.index = self.input.len();
                if self.index > self.section_start {
                    self.callbacks.on_text(self.section_start, self.index);
                }
                self.section_start = self.index;
                self.state = State::Text;
                return;
            };
            let at = offset + found;
            let candidate = &rest[at..];
            if candidate.len() >= close.len()
                && candidate[..close.len()].eq_ignore_ascii_case(&close)
            {
                let content_end = self.index + at;
                if content_end > self.section_start {
                    self.callbacks.on_text(self.section_start, content_end);
                }
                // Hand the "</name" back to the regular machinery.
                self.index = content_end;
                self.section_start = content_end;
                self.state = State::Text;
                self.index -= 1;
                return;
            }
            offset = at + 1;
        }
    }

    fn finish(&mut self) {
        match self.state {
            State::Text | State::InRawText => {
                if self.input.len() > self.section_start {
                    self.callbacks.on_text(self.section_start, self.input.len());
                }
            }
            State::InAttrValueDq | State::InAttrValueSq => {
                self.callbacks
                    .on_error(TokenizeError::UnterminatedAttrValue, self.section_start);
                self.callbacks.on_attr_value(
                    self.section_start,
                    self.input.len(),
                    QuoteType::Unquoted,
                );
            }
            State::InAttrValueNq => {
                self.callbacks.on_attr_value(
                    self.section_start,
                    self.input.len(),
                    QuoteType::Unquoted,
                );
            }
            State::BeforeTagName => {
                // Input ended on a lone '<'; it belongs to text.
                if self.input.len() > self.section_start {
                    self.callbacks.on_text(self.section_start, self.input.len());
                }
            }
            _ => {
                self.callbacks
                    .on_error(TokenizeError::UnexpectedEofInTag, self.section_start);
            }
        }
        self.callbacks.on_end(self.input.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Recorder {
        fn record(&mut self, event: String) {
            self.events.push(event);
        }
    }

    impl Callbacks for Recorder {
        fn on_text(&mut self, start: usize, end: usize) {
            self.record(format!("text {start}..{end}"));
        }
        fn on_open_tag_name(&mut self, start: usize, end: usize) {
            self.record(format!("open {start}..{end}"));
        }
        fn on_open_tag_end(&mut self, end: usize, self_closing: bool) {
            self.record(format!("open-end {end} self={self_closing}"));
        }
        fn on_close_tag(&mut self, start: usize, end: usize) {
            self.record(format!("close {start}..{end}"));
        }
        fn on_attr_name(&mut self, start: usize, end: usize) {
            self.record(format!("attr {start}..{end}"));
        }
        fn on_attr_value(&mut self, start: usize, end: usize, _quote: QuoteType) {
            self.record(format!("value {start}..{end}"));
        }
        fn on_comment(&mut self, start: usize, end: usize) {
            self.record(format!("comment {start}..{end}"));
        }
        fn on_error(&mut self, error: TokenizeError, at: usize) {
            self.record(format!("error {error:?} {at}"));
        }
        fn on_end(&mut self, _at: usize) {}
    }

    fn tokenize(src: &str) -> Vec<String> {
        Tokenizer::new(src, Recorder::default()).run().events
    }

    #[test]
    fn simple_element_with_attr() {
        let events = tokenize(r#"<div class="a">x</div>"#);
        assert_eq!(
            events,
            [
                "open 1..4",
                "attr 5..10",
                "value 12..13",
                "open-end 14 self=false",
                "text 15..16",
                "close 18..21",
            ]
        );
    }

    #[test]
    fn self_closing_and_valueless_attrs() {
        let events = tokenize("<input disabled value.bind=x />");
        assert_eq!(
            events,
            [
                "open 1..6",
                "attr 7..15",
                "attr 16..26",
                "value 27..28",
                "open-end 30 self=true",
            ]
        );
    }

    #[test]
    fn comment_is_reported_with_content_span() {
        let events = tokenize("a<!--b-->c");
        assert_eq!(events, ["text 0..1", "comment 5..6", "text 9..10"]);
    }

    #[test]
    fn stray_lt_is_text() {
        // The '<' that fails to open a tag is handed back to text; the
        // parser merges adjacent text sections.
        let events = tokenize("1 < 2");
        assert_eq!(events, ["text 0..2", "text 2..5"]);
    }

    #[test]
    fn raw_text_style_content_is_not_parsed() {
        let events = tokenize("<style>a { b: c; } </style><p></p>");
        assert_eq!(
            events,
            [
                "open 1..6",
                "open-end 6 self=false",
                "text 7..19",
                "close 21..26",
                "open 28..29",
                "open-end 29 self=false",
                "close 32..33",
            ]
        );
    }

    #[test]
    fn unterminated_comment_recovers() {
        let events = tokenize("x<!-- never closed");
        assert_eq!(
            events,
            [
                "text 0..1",
                "error UnterminatedComment 5",
                "comment 5..18",
            ]
        );
    }
}
