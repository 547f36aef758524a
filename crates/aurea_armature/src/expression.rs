//! Parser for the Aurelia binding-expression dialect.
//!
//! The dialect is a JavaScript expression subset plus value converters
//! (`items | take:5`), binding behaviors (`expr & debounce:200`), scope
//! hops (`$parent.name`), and for-of iterator headers with destructuring
//! (`[k, v] of pairs`).
//!
//! The parser is a hand-written recursive-descent/precedence-climbing
//! combination. It returns `Err` instead of panicking on malformed input;
//! the lowering converts errors into `BadExpression` sentinels.

use aurea_carton::TextSpan;
use aurea_relief::expr::{
    BinaryOp, BindingPattern, Expr, ForOfHeader, LiteralValue, ObjectLiteralEntry,
    ObjectPatternProp, PatternElement, UnaryOp,
};
use compact_str::CompactString;

/// A parse failure with the offending (source-relative) span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprError {
    pub message: String,
    pub span: TextSpan,
}

impl ExprError {
    fn new(message: impl Into<String>, span: TextSpan) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

/// Parse a complete binding expression. Trailing input is an error.
pub fn parse_expression(source: &str) -> Result<Expr, ExprError> {
    let mut parser = Parser::new(source);
    let expr = parser.parse_variadic()?;
    parser.expect_eof()?;
    Ok(expr)
}

/// Parse a `repeat.for` header: `declaration of iterable`.
pub fn parse_for_of(source: &str) -> Result<ForOfHeader, ExprError> {
    let mut parser = Parser::new(source);
    let declaration = parser.parse_binding_pattern()?;
    let of_token = parser.bump();
    if !(of_token.kind == TokKind::Ident && of_token.text(source) == "of") {
        return Err(ExprError::new("expected 'of' in repeat header", of_token.span));
    }
    let iterable = parser.parse_variadic()?;
    parser.expect_eof()?;
    let span = TextSpan::new(declaration.span().start, iterable.span().end);
    Ok(ForOfHeader {
        declaration,
        iterable,
        span,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokKind {
    Ident,
    Number,
    Str,
    Dot,
    Ellipsis,
    Comma,
    Colon,
    Question,
    Coalesce,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Pipe,
    PipePipe,
    Amp,
    AmpAmp,
    Assign,
    EqEq,
    EqEqEq,
    Bang,
    BangEq,
    BangEqEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eof,
    Unknown,
}

#[derive(Debug, Clone, Copy)]
struct Token {
    kind: TokKind,
    span: TextSpan,
}

impl Token {
    fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span.start as usize..self.span.end as usize]
    }
}

struct Lexer<'s> {
    source: &'s [u8],
    pos: usize,
}

impl<'s> Lexer<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source: source.as_bytes(),
            pos: 0,
        }
    }

    fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let start = self.pos as u32;
        let Some(&c) = self.source.get(self.pos) else {
            return self.tok(TokKind::Eof, start);
        };
        match c {
            b'a'..=b'z' | b'A'..=b'Z' | b'_' | b'$' => {
                self.pos += 1;
                while self
                    .source
                    .get(self.pos)
                    .is_some_and(|&b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$')
                {
                    self.pos += 1;
                }
                self.tok(TokKind::Ident, start)
            }
            b'0'..=b'9' => self.lex_number(start),
            b'.' => {
                if self.source.get(self.pos + 1).is_some_and(u8::is_ascii_digit) {
                    self.lex_number(start)
                } else if self.source.get(self.pos + 1) == Some(&b'.')
                    && self.source.get(self.pos + 2) == Some(&b'.')
                {
                    self.pos += 3;
                    self.tok(TokKind::Ellipsis, start)
                } else {
                    self.pos += 1;
                    self.tok(TokKind::Dot, start)
                }
            }
            b'\'' | b'"' | b'`' => self.lex_string(c, start),
            b'(' => self.single(TokKind::LParen, start),
            b')' => self.single(TokKind::RParen, start),
            b'[' => self.single(TokKind::LBracket, start),
            b']' => self.single(TokKind::RBracket, start),
            b'{' => self.single(TokKind::LBrace, start),
            b'}' => self.single(TokKind::RBrace, start),
            b',' => self.single(TokKind::Comma, start),
            b':' => self.single(TokKind::Colon, start),
            b'?' => {
                if self.source.get(self.pos + 1) == Some(&b'?') {
                    self.pos += 2;
                    self.tok(TokKind::Coalesce, start)
                } else {
                    self.single(TokKind::Question, start)
                }
            }
            b'|' => {
                if self.source.get(self.pos + 1) == Some(&b'|') {
                    self.pos += 2;
                    self.tok(TokKind::PipePipe, start)
                } else {
                    self.single(TokKind::Pipe, start)
                }
            }
            b'&' => {
                if self.source.get(self.pos + 1) == Some(&b'&') {
                    self.pos += 2;
                    self.tok(TokKind::AmpAmp, start)
                } else {
                    self.single(TokKind::Amp, start)
                }
            }
            b'=' => {
                if self.source.get(self.pos + 1) == Some(&b'=') {
                    if self.source.get(self.pos + 2) == Some(&b'=') {
                        self.pos += 3;
                        self.tok(TokKind::EqEqEq, start)
                    } else {
                        self.pos += 2;
                        self.tok(TokKind::EqEq, start)
                    }
                } else {
                    self.single(TokKind::Assign, start)
                }
            }
            b'!' => {
                if self.source.get(self.pos + 1) == Some(&b'=') {
                    if self.source.get(self.pos + 2) == Some(&b'=') {
                        self.pos += 3;
                        self.tok(TokKind::BangEqEq, start)
                    } else {
                        self.pos += 2;
                        self.tok(TokKind::BangEq, start)
                    }
                } else {
                    self.single(TokKind::Bang, start)
                }
            }
            b'<' => {
                if self.source.get(self.pos + 1) == Some(&b'=') {
                    self.pos += 2;
                    self.tok(TokKind::LtEq, start)
                } else {
                    self.single(TokKind::Lt, start)
                }
            }
            b'>' => {
                if self.source.get(self.pos + 1) == Some(&b'=') {
                    self.pos += 2;
                    self.tok(TokKind::GtEq, start)
                } else {
                    self.single(TokKind::Gt, start)
                }
            }
            b'+' => self.single(TokKind::Plus, start),
            b'-' => self.single(TokKind::Minus, start),
            b'*' => self.single(TokKind::Star, start),
            b'/' => self.single(TokKind::Slash, start),
            b'%' => self.single(TokKind::Percent, start),
            _ => {
                // Skip one UTF-8 scalar so errors do not split characters.
                let mut len = 1;
                while self.pos + len < self.source.len()
                    && (self.source[self.pos + len] & 0xC0) == 0x80
                {
                    len += 1;
                }
                self.pos += len;
                self.tok(TokKind::Unknown, start)
            }
        }
    }

    fn single(&mut self, kind: TokKind, start: u32) -> Token {
        self.pos += 1;
        self.tok(kind, start)
    }

    fn tok(&self, kind: TokKind, start: u32) -> Token {
        Token {
            kind,
            span: TextSpan::new(start, self.pos as u32),
        }
    }

    fn skip_whitespace(&mut self) {
        while self
            .source
            .get(self.pos)
            .is_some_and(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r' | 0x0C))
        {
            self.pos += 1;
        }
    }

    fn lex_number(&mut self, start: u32) -> Token {
        while self.source.get(self.pos).is_some_and(u8::is_ascii_digit) {
            self.pos += 1;
        }
        if self.source.get(self.pos) == Some(&b'.')
            && self.source.get(self.pos + 1).is_some_and(u8::is_ascii_digit)
        {
            self.pos += 1;
            while self.source.get(self.pos).is_some_and(u8::is_ascii_digit) {
                self.pos += 1;
            }
        }
        if matches!(self.source.get(self.pos), Some(b'e') | Some(b'E')) {
            let mut ahead = self.pos + 1;
            if matches!(self.source.get(ahead), Some(b'+') | Some(b'-')) {
                ahead += 1;
            }
            if self.source.get(ahead).is_some_and(u8::is_ascii_digit) {
                self.pos = ahead;
                while self.source.get(self.pos).is_some_and(u8::is_ascii_digit) {
                    self.pos += 1;
                }
            }
        }
        self.tok(TokKind::Number, start)
    }

    fn lex_string(&mut self, quote: u8, start: u32) -> Token {
        self.pos += 1;
        while let Some(&b) = self.source.get(self.pos) {
            if b == b'\\' {
                self.pos += 2;
            } else if b == quote {
                self.pos += 1;
                return self.tok(TokKind::Str, start);
            } else {
                self.pos += 1;
            }
        }
        // Unterminated: span to EOF; the parser reports it.
        self.tok(TokKind::Str, start)
    }
}

struct Parser<'s> {
    source: &'s str,
    lexer: Lexer<'s>,
    current: Token,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            source,
            lexer,
            current,
        }
    }

    fn bump(&mut self) -> Token {
        let token = self.current;
        self.current = self.lexer.next_token();
        token
    }

    fn eat(&mut self, kind: TokKind) -> Option<Token> {
        (self.current.kind == kind).then(|| self.bump())
    }

    fn expect(&mut self, kind: TokKind, what: &str) -> Result<Token, ExprError> {
        self.eat(kind)
            .ok_or_else(|| ExprError::new(format!("expected {what}"), self.current.span))
    }

    fn expect_eof(&mut self) -> Result<(), ExprError> {
        if self.current.kind == TokKind::Eof {
            Ok(())
        } else {
            Err(ExprError::new("unexpected trailing input", self.current.span))
        }
    }

    fn current_text(&self) -> &'s str {
        self.current.text(self.source)
    }

    fn is_keyword(&self, word: &str) -> bool {
        self.current.kind == TokKind::Ident && self.current_text() == word
    }

    /// expression [ '|' converter (':' arg)* ]* [ '&' behavior (':' arg)* ]*
    fn parse_variadic(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_assign()?;
        while self.current.kind == TokKind::Pipe {
            self.bump();
            expr = self.parse_decorator(expr, false)?;
        }
        while self.current.kind == TokKind::Amp {
            self.bump();
            expr = self.parse_decorator(expr, true)?;
        }
        Ok(expr)
    }

    fn parse_decorator(&mut self, expr: Expr, behavior: bool) -> Result<Expr, ExprError> {
        let what = if behavior {
            "binding behavior name"
        } else {
            "value converter name"
        };
        let name_token = self.expect(TokKind::Ident, what)?;
        let name = CompactString::from(name_token.text(self.source));
        let mut args = Vec::new();
        while self.eat(TokKind::Colon).is_some() {
            args.push(self.parse_assign()?);
        }
        let end = args
            .last()
            .map(|arg| arg.span().end)
            .unwrap_or(name_token.span.end);
        let span = TextSpan::new(expr.span().start, end);
        Ok(if behavior {
            Expr::BindingBehavior {
                expr: Box::new(expr),
                name,
                name_span: name_token.span,
                args,
                span,
            }
        } else {
            Expr::ValueConverter {
                expr: Box::new(expr),
                name,
                name_span: name_token.span,
                args,
                span,
            }
        })
    }

    fn parse_assign(&mut self) -> Result<Expr, ExprError> {
        let target = self.parse_conditional()?;
        if self.current.kind != TokKind::Assign {
            return Ok(target);
        }
        let assign_span = self.bump().span;
        if !matches!(
            target,
            Expr::AccessScope { .. } | Expr::AccessMember { .. } | Expr::AccessKeyed { .. }
        ) {
            return Err(ExprError::new(
                "left-hand side is not assignable",
                assign_span,
            ));
        }
        let value = self.parse_assign()?;
        let span = TextSpan::new(target.span().start, value.span().end);
        Ok(Expr::Assign {
            target: Box::new(target),
            value: Box::new(value),
            span,
        })
    }

    fn parse_conditional(&mut self) -> Result<Expr, ExprError> {
        let condition = self.parse_binary(1)?;
        if self.eat(TokKind::Question).is_none() {
            return Ok(condition);
        }
        let yes = self.parse_assign()?;
        self.expect(TokKind::Colon, "':' in conditional")?;
        let no = self.parse_assign()?;
        let span = TextSpan::new(condition.span().start, no.span().end);
        Ok(Expr::Conditional {
            condition: Box::new(condition),
            yes: Box::new(yes),
            no: Box::new(no),
            span,
        })
    }

    fn binary_op(&self) -> Option<(BinaryOp, u8)> {
        let op = match self.current.kind {
            TokKind::Coalesce => (BinaryOp::Coalesce, 1),
            TokKind::PipePipe => (BinaryOp::Or, 2),
            TokKind::AmpAmp => (BinaryOp::And, 3),
            TokKind::EqEq => (BinaryOp::Equal, 4),
            TokKind::BangEq => (BinaryOp::NotEqual, 4),
            TokKind::EqEqEq => (BinaryOp::StrictEqual, 4),
            TokKind::BangEqEq => (BinaryOp::StrictNotEqual, 4),
            TokKind::Lt => (BinaryOp::Less, 5),
            TokKind::Gt => (BinaryOp::Greater, 5),
            TokKind::LtEq => (BinaryOp::LessEqual, 5),
            TokKind::GtEq => (BinaryOp::GreaterEqual, 5),
            TokKind::Ident if self.current_text() == "in" => (BinaryOp::In, 5),
            TokKind::Ident if self.current_text() == "instanceof" => (BinaryOp::InstanceOf, 5),
            TokKind::Plus => (BinaryOp::Add, 6),
            TokKind::Minus => (BinaryOp::Sub, 6),
            TokKind::Star => (BinaryOp::Mul, 7),
            TokKind::Slash => (BinaryOp::Div, 7),
            TokKind::Percent => (BinaryOp::Mod, 7),
            _ => return None,
        };
        Some(op)
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ExprError> {
        let mut lhs = self.parse_unary()?;
        while let Some((op, prec)) = self.binary_op() {
            if prec < min_prec {
                break;
            }
            self.bump();
            let rhs = self.parse_binary(prec + 1)?;
            let span = TextSpan::new(lhs.span().start, rhs.span().end);
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
                span,
            };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        let op = match self.current.kind {
            TokKind::Bang => Some(UnaryOp::Not),
            TokKind::Minus => Some(UnaryOp::Neg),
            TokKind::Plus => Some(UnaryOp::Pos),
            TokKind::Ident if self.current_text() == "typeof" => Some(UnaryOp::TypeOf),
            TokKind::Ident if self.current_text() == "void" => Some(UnaryOp::Void),
            _ => None,
        };
        let Some(op) = op else {
            return self.parse_postfix();
        };
        let op_span = self.bump().span;
        let operand = self.parse_unary()?;
        let span = TextSpan::new(op_span.start, operand.span().end);
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
            span,
        })
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.current.kind {
                TokKind::Dot => {
                    self.bump();
                    let name_token = self.expect(TokKind::Ident, "member name after '.'")?;
                    let name = name_token.text(self.source);
                    expr = self.access_after_dot(expr, name, name_token.span)?;
                }
                TokKind::LBracket => {
                    self.bump();
                    let key = self.parse_variadic_inner()?;
                    let close = self.expect(TokKind::RBracket, "']'")?;
                    let span = TextSpan::new(expr.span().start, close.span.end);
                    expr = Expr::AccessKeyed {
                        object: Box::new(expr),
                        key: Box::new(key),
                        span,
                    };
                }
                TokKind::LParen => {
                    self.bump();
                    let mut args = Vec::new();
                    if self.current.kind != TokKind::RParen {
                        loop {
                            args.push(self.parse_assign()?);
                            if self.eat(TokKind::Comma).is_none() {
                                break;
                            }
                        }
                    }
                    let close = self.expect(TokKind::RParen, "')'")?;
                    let span = TextSpan::new(expr.span().start, close.span.end);
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Inside brackets a full expression (minus converters) is allowed.
    fn parse_variadic_inner(&mut self) -> Result<Expr, ExprError> {
        self.parse_assign()
    }

    fn access_after_dot(
        &mut self,
        object: Expr,
        name: &str,
        name_span: TextSpan,
    ) -> Result<Expr, ExprError> {
        // `$parent` chains collapse into the ancestor counter; a plain
        // identifier after `$this`/`$parent` is a scope access at that depth.
        if let Expr::AccessThis { ancestor, span } = &object {
            if name == "$parent" {
                return Ok(Expr::AccessThis {
                    ancestor: ancestor + 1,
                    span: TextSpan::new(span.start, name_span.end),
                });
            }
            return Ok(Expr::AccessScope {
                name: CompactString::from(name),
                name_span,
                ancestor: *ancestor,
                span: TextSpan::new(span.start, name_span.end),
            });
        }
        let span = TextSpan::new(object.span().start, name_span.end);
        Ok(Expr::AccessMember {
            object: Box::new(object),
            name: CompactString::from(name),
            name_span,
            span,
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        match self.current.kind {
            TokKind::Ident => {
                let token = self.bump();
                let text = token.text(self.source);
                let expr = match text {
                    "true" => Expr::Literal {
                        value: LiteralValue::Boolean(true),
                        span: token.span,
                    },
                    "false" => Expr::Literal {
                        value: LiteralValue::Boolean(false),
                        span: token.span,
                    },
                    "null" => Expr::Literal {
                        value: LiteralValue::Null,
                        span: token.span,
                    },
                    "undefined" => Expr::Literal {
                        value: LiteralValue::Undefined,
                        span: token.span,
                    },
                    "$this" => Expr::AccessThis {
                        ancestor: 0,
                        span: token.span,
                    },
                    "$parent" => Expr::AccessThis {
                        ancestor: 1,
                        span: token.span,
                    },
                    name => Expr::AccessScope {
                        name: CompactString::from(name),
                        name_span: token.span,
                        ancestor: 0,
                        span: token.span,
                    },
                };
                Ok(expr)
            }
            TokKind::Number => {
                let token = self.bump();
                let text = token.text(self.source);
                let value = text.parse::<f64>().map_err(|_| {
                    ExprError::new(format!("invalid number literal '{text}'"), token.span)
                })?;
                Ok(Expr::Literal {
                    value: LiteralValue::Number(value),
                    span: token.span,
                })
            }
            TokKind::Str => {
                let token = self.bump();
                let raw = token.text(self.source);
                let value = unescape_string(raw, token.span)?;
                Ok(Expr::Literal {
                    value: LiteralValue::String(value),
                    span: token.span,
                })
            }
            TokKind::LParen => {
                self.bump();
                let inner = self.parse_variadic_inner()?;
                self.expect(TokKind::RParen, "')'")?;
                Ok(inner)
            }
            TokKind::LBracket => {
                let open = self.bump();
                let mut elements = Vec::new();
                if self.current.kind != TokKind::RBracket {
                    loop {
                        elements.push(self.parse_assign()?);
                        if self.eat(TokKind::Comma).is_none() {
                            break;
                        }
                    }
                }
                let close = self.expect(TokKind::RBracket, "']'")?;
                Ok(Expr::ArrayLiteral {
                    elements,
                    span: TextSpan::new(open.span.start, close.span.end),
                })
            }
            TokKind::LBrace => {
                let open = self.bump();
                let mut entries = Vec::new();
                if self.current.kind != TokKind::RBrace {
                    loop {
                        let (key, key_span) = self.parse_object_key()?;
                        let (value, shorthand) = if self.eat(TokKind::Colon).is_some() {
                            (self.parse_assign()?, false)
                        } else {
                            // Shorthand `{ key }`.
                            let implied = Expr::AccessScope {
                                name: key.clone(),
                                name_span: key_span,
                                ancestor: 0,
                                span: key_span,
                            };
                            (implied, true)
                        };
                        entries.push(ObjectLiteralEntry {
                            key,
                            key_span,
                            value,
                            shorthand,
                        });
                        if self.eat(TokKind::Comma).is_none() {
                            break;
                        }
                    }
                }
                let close = self.expect(TokKind::RBrace, "'}'")?;
                Ok(Expr::ObjectLiteral {
                    entries,
                    span: TextSpan::new(open.span.start, close.span.end),
                })
            }
            TokKind::Eof => Err(ExprError::new("unexpected end of expression", self.current.span)),
            _ => Err(ExprError::new(
                format!("unexpected token '{}'", self.current_text()),
                self.current.span,
            )),
        }
    }

    fn parse_object_key(&mut self) -> Result<(CompactString, TextSpan), ExprError> {
        match self.current.kind {
            TokKind::Ident | TokKind::Number => {
                let token = self.bump();
                Ok((CompactString::from(token.text(self.source)), token.span))
            }
            TokKind::Str => {
                let token = self.bump();
                let value = unescape_string(token.text(self.source), token.span)?;
                Ok((value, token.span))
            }
            _ => Err(ExprError::new("expected object key", self.current.span)),
        }
    }

    // ---- binding patterns (for-of declarations) ----

    fn parse_binding_pattern(&mut self) -> Result<BindingPattern, ExprError> {
        match self.current.kind {
            TokKind::Ident => {
                let token = self.bump();
                Ok(BindingPattern::Identifier {
                    name: CompactString::from(token.text(self.source)),
                    span: token.span,
                })
            }
            TokKind::LBracket => self.parse_array_pattern(),
            TokKind::LBrace => self.parse_object_pattern(),
            _ => Err(ExprError::new(
                "expected identifier or destructuring pattern",
                self.current.span,
            )),
        }
    }

    fn parse_array_pattern(&mut self) -> Result<BindingPattern, ExprError> {
        let open = self.expect(TokKind::LBracket, "'['")?;
        let mut elements = Vec::new();
        let mut rest = None;
        loop {
            match self.current.kind {
                TokKind::RBracket => break,
                TokKind::Comma => {
                    // Elision: `[, b]` skips an element.
                    self.bump();
                    elements.push(None);
                    continue;
                }
                TokKind::Ellipsis => {
                    self.bump();
                    rest = Some(Box::new(self.parse_binding_pattern()?));
                    break;
                }
                _ => {
                    let pattern = self.parse_binding_pattern()?;
                    let default = if self.eat(TokKind::Assign).is_some() {
                        Some(self.parse_assign()?)
                    } else {
                        None
                    };
                    elements.push(Some(PatternElement { pattern, default }));
                    if self.eat(TokKind::Comma).is_none() {
                        break;
                    }
                }
            }
        }
        let close = self.expect(TokKind::RBracket, "']' in array pattern")?;
        Ok(BindingPattern::Array {
            elements,
            rest,
            span: TextSpan::new(open.span.start, close.span.end),
        })
    }

    fn parse_object_pattern(&mut self) -> Result<BindingPattern, ExprError> {
        let open = self.expect(TokKind::LBrace, "'{'")?;
        let mut props = Vec::new();
        let mut rest = None;
        loop {
            match self.current.kind {
                TokKind::RBrace => break,
                TokKind::Ellipsis => {
                    self.bump();
                    rest = Some(Box::new(self.parse_binding_pattern()?));
                    break;
                }
                TokKind::Ident => {
                    let key_token = self.bump();
                    let value = if self.eat(TokKind::Colon).is_some() {
                        Some(self.parse_binding_pattern()?)
                    } else {
                        None
                    };
                    let default = if self.eat(TokKind::Assign).is_some() {
                        Some(self.parse_assign()?)
                    } else {
                        None
                    };
                    props.push(ObjectPatternProp {
                        key: CompactString::from(key_token.text(self.source)),
                        key_span: key_token.span,
                        value,
                        default,
                    });
                    if self.eat(TokKind::Comma).is_none() {
                        break;
                    }
                }
                _ => {
                    return Err(ExprError::new(
                        "expected property name in object pattern",
                        self.current.span,
                    ))
                }
            }
        }
        let close = self.expect(TokKind::RBrace, "'}' in object pattern")?;
        Ok(BindingPattern::Object {
            props,
            rest,
            span: TextSpan::new(open.span.start, close.span.end),
        })
    }
}

/// Decode the interior of a quoted string literal.
fn unescape_string(raw: &str, span: TextSpan) -> Result<CompactString, ExprError> {
    let bytes = raw.as_bytes();
    if bytes.len() < 2 || bytes[0] != bytes[bytes.len() - 1] || bytes.len() == 1 {
        return Err(ExprError::new("unterminated string literal", span));
    }
    let interior = &raw[1..raw.len() - 1];
    if !interior.contains('\\') {
        return Ok(CompactString::from(interior));
    }
    let mut out = CompactString::default();
    let mut chars = interior.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => return Err(ExprError::new("dangling escape in string", span)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> Expr {
        parse_expression(src).expect("parse failed")
    }

    #[test]
    fn member_chain_spans_are_exact() {
        let expr = parse("person.name");
        let Expr::AccessMember {
            object,
            name,
            name_span,
            span,
        } = expr
        else {
            panic!("expected member access");
        };
        assert_eq!(name, "name");
        assert_eq!(name_span, TextSpan::new(7, 11));
        assert_eq!(span, TextSpan::new(0, 11));
        let Expr::AccessScope {
            name: base,
            ancestor,
            ..
        } = *object
        else {
            panic!("expected scope access");
        };
        assert_eq!(base, "person");
        assert_eq!(ancestor, 0);
    }

    #[test]
    fn parent_hops_collapse_into_ancestor() {
        let expr = parse("$parent.$parent.item");
        let Expr::AccessScope { name, ancestor, .. } = expr else {
            panic!("expected scope access");
        };
        assert_eq!(name, "item");
        assert_eq!(ancestor, 2);
    }

    #[test]
    fn this_alone_parses() {
        let expr = parse("$this");
        assert!(matches!(expr, Expr::AccessThis { ancestor: 0, .. }));
    }

    #[test]
    fn converter_then_behavior() {
        let expr = parse("items | take:5 & throttle:200");
        let Expr::BindingBehavior { expr: inner, name, args, .. } = expr else {
            panic!("expected behavior");
        };
        assert_eq!(name, "throttle");
        assert_eq!(args.len(), 1);
        let Expr::ValueConverter { name, args, .. } = *inner else {
            panic!("expected converter");
        };
        assert_eq!(name, "take");
        assert_eq!(args.len(), 1);
    }

    #[test]
    fn pipe_and_logical_or_are_distinct() {
        assert!(matches!(
            parse("a || b"),
            Expr::Binary {
                op: BinaryOp::Or,
                ..
            }
        ));
        assert!(matches!(parse("a | b"), Expr::ValueConverter { .. }));
    }

    #[test]
    fn conditional_and_precedence() {
        let expr = parse("a && b ? c + 1 : d[0]");
        let Expr::Conditional { condition, no, .. } = expr else {
            panic!("expected conditional");
        };
        assert!(matches!(
            *condition,
            Expr::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
        assert!(matches!(*no, Expr::AccessKeyed { .. }));
    }

    #[test]
    fn calls_with_args() {
        let expr = parse("fmt(v.toFixed(1), 'x')");
        let Expr::Call { callee, args, .. } = expr else {
            panic!("expected call");
        };
        assert!(matches!(*callee, Expr::AccessScope { .. }));
        assert_eq!(args.len(), 2);
        assert!(matches!(args[0], Expr::Call { .. }));
    }

    #[test]
    fn assignment_requires_assignable_target() {
        assert!(parse_expression("x = 1").is_ok());
        assert!(parse_expression("a.b = c").is_ok());
        let err = parse_expression("1 = 2").unwrap_err();
        assert!(err.message.contains("not assignable"));
    }

    #[test]
    fn literals() {
        assert!(matches!(
            parse("true"),
            Expr::Literal {
                value: LiteralValue::Boolean(true),
                ..
            }
        ));
        let Expr::Literal {
            value: LiteralValue::Number(n),
            ..
        } = parse("1.5e2")
        else {
            panic!("expected number");
        };
        assert_eq!(n, 150.0);
        let Expr::Literal {
            value: LiteralValue::String(s),
            ..
        } = parse(r#"'a\nb'"#)
        else {
            panic!("expected string");
        };
        assert_eq!(s, "a\nb");
    }

    #[test]
    fn object_and_array_literals() {
        let expr = parse("{ a: 1, b }");
        let Expr::ObjectLiteral { entries, .. } = expr else {
            panic!("expected object literal");
        };
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].key, "b");
        assert!(entries[1].shorthand);
        assert!(matches!(entries[1].value, Expr::AccessScope { .. }));

        let Expr::ArrayLiteral { elements, .. } = parse("[1, x]") else {
            panic!("expected array literal");
        };
        assert_eq!(elements.len(), 2);
    }

    #[test]
    fn trailing_input_is_an_error() {
        let err = parse_expression("a b").unwrap_err();
        assert_eq!(err.span, TextSpan::new(2, 3));
    }

    #[test]
    fn for_of_simple_identifier() {
        let header = parse_for_of("item of items").expect("parse failed");
        assert!(matches!(
            header.declaration,
            BindingPattern::Identifier { .. }
        ));
        assert!(matches!(header.iterable, Expr::AccessScope { .. }));
    }

    #[test]
    fn for_of_array_destructuring_with_rest() {
        let header = parse_for_of("[k, v = 1, ...rest] of pairs").expect("parse failed");
        let names: Vec<_> = header
            .declaration
            .bound_names()
            .into_iter()
            .map(|(n, _)| n.to_string())
            .collect();
        assert_eq!(names, ["k", "v", "rest"]);
        let BindingPattern::Array { elements, rest, .. } = &header.declaration else {
            panic!("expected array pattern");
        };
        assert!(elements[1].as_ref().unwrap().default.is_some());
        assert!(rest.is_some());
    }

    #[test]
    fn for_of_object_destructuring() {
        let header = parse_for_of("{ name, detail: d } of entries").expect("parse failed");
        let names: Vec<_> = header
            .declaration
            .bound_names()
            .into_iter()
            .map(|(n, _)| n.to_string())
            .collect();
        assert_eq!(names, ["name", "d"]);
    }

    #[test]
    fn for_of_missing_of_keyword() {
        let err = parse_for_of("item in items").unwrap_err();
        assert!(err.message.contains("'of'"));
    }

    #[test]
    fn converter_on_iterable_side() {
        let header = parse_for_of("p of pairs | sortBy:'k'").expect("parse failed");
        assert!(matches!(header.iterable, Expr::ValueConverter { .. }));
    }

    #[test]
    fn keyed_access_with_expression() {
        let expr = parse("rows[i + 1].cells");
        assert!(matches!(expr, Expr::AccessMember { .. }));
    }

    #[test]
    fn unary_operators_nest() {
        let expr = parse("!!done");
        let Expr::Unary { op, operand, .. } = expr else {
            panic!("expected unary");
        };
        assert_eq!(op, UnaryOp::Not);
        assert!(matches!(*operand, Expr::Unary { .. }));
    }

    #[test]
    fn in_and_instanceof_are_relational() {
        assert!(matches!(
            parse("'k' in map"),
            Expr::Binary {
                op: BinaryOp::In,
                ..
            }
        ));
        assert!(matches!(
            parse("x instanceof Date"),
            Expr::Binary {
                op: BinaryOp::InstanceOf,
                ..
            }
        ));
    }

    #[test]
    fn coalesce_has_lowest_binary_precedence() {
        let expr = parse("a ?? b && c");
        let Expr::Binary { op, rhs, .. } = expr else {
            panic!("expected binary");
        };
        assert_eq!(op, BinaryOp::Coalesce);
        assert!(matches!(
            *rhs,
            Expr::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
    }
}
