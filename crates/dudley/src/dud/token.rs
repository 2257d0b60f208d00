// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Line-oriented tokenizer for the Dudley layout language.
//!
//! The tokenizer produces a lazy stream of typed tokens with one-token
//! lookahead (`peek`/`next`).  Comment handling happens inline: `##` doc
//! lines and `#:` attribute comments never surface as tokens; they
//! accumulate on the tokenizer for the parser to drain and attach to the
//! item under construction.  An unrecognized character yields a
//! one-character error token and the tokenizer moves on; it never aborts.

use crate::attr::{AttrMap, AttrValue};
use crate::error::{ParseError, ParseErrorKind};

/// Token payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    /// Identifier `[A-Za-z_][0-9A-Za-z_]*`.
    Symbol(String),
    /// Quoted identifier or string; quotes and escapes already removed.
    Quoted(String),
    /// Integer literal (decimal, `0x`, `0o`, `0b`; optional sign).
    Int(i64),
    /// Float literal (requires a decimal point).
    Float(f64),
    /// Primitive type spelling with order prefix, e.g. `"<i4"`.
    Prim(String),
    /// `..`
    DotDot,
    /// `->`
    RArrow,
    /// `<-`
    LArrow,
    /// Run of `+` (positive count) or `-` (negative count).
    ParamSfx(i32),
    Colon,
    Slash,
    LBracket,
    RBracket,
    Equals,
    Comma,
    LBrace,
    RBrace,
    At,
    Percent,
    LParen,
    RParen,
    Caret,
    Lt,
    Gt,
    Pipe,
    Amp,
    /// Unrecognized character at the recorded position.
    Error(char),
    Eof,
}

fn c_first(s: &str) -> char {
    s.chars().next().unwrap_or(' ')
}

/// A token plus its 1-based source position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub line: u32,
    pub col: u32,
}

/// The tokenizer.  Holds the accumulated attribute map, doc-line list,
/// and error list alongside the token stream.
pub struct Tokenizer<'s> {
    lines: Vec<&'s str>,
    /// 0-based current line index.
    line: usize,
    /// Byte offset into the current line.
    col: usize,
    lookahead: Option<Token>,
    docs: Vec<String>,
    attrs: AttrMap,
    errors: Vec<ParseError>,
}

impl<'s> Tokenizer<'s> {
    pub fn new(source: &'s str) -> Tokenizer<'s> {
        Tokenizer {
            lines: source.lines().collect(),
            line: 0,
            col: 0,
            lookahead: None,
            docs: Vec::new(),
            attrs: AttrMap::new(),
            errors: Vec::new(),
        }
    }

    /// Current token without consuming it.
    pub fn peek(&mut self) -> &Token {
        if self.lookahead.is_none() {
            let t = self.scan();
            self.lookahead = Some(t);
        }
        self.lookahead.as_ref().expect("lookahead just filled")
    }

    /// Consume and return the current token.
    #[allow(clippy::should_implement_trait)] // not an Iterator: Eof repeats forever
    pub fn next(&mut self) -> Token {
        match self.lookahead.take() {
            Some(t) => t,
            None => self.scan(),
        }
    }

    /// Drain doc lines accumulated since the last drain.
    pub fn take_docs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.docs)
    }

    /// Drain attributes accumulated since the last drain.
    pub fn take_attrs(&mut self) -> AttrMap {
        std::mem::take(&mut self.attrs)
    }

    /// Errors recorded so far (malformed tokens, bad attribute comments).
    pub fn take_errors(&mut self) -> Vec<ParseError> {
        std::mem::take(&mut self.errors)
    }

    fn lex_error(&mut self, line: usize, col: usize, message: impl Into<String>) {
        self.errors.push(ParseError {
            kind: ParseErrorKind::Lex,
            line: line as u32 + 1,
            column: col as u32 + 1,
            message: message.into(),
        });
    }

    // ---- low-level scanning ----------------------------------------------

    fn cur_line(&self) -> &'s str {
        self.lines.get(self.line).copied().unwrap_or("")
    }

    fn rest(&self) -> &'s str {
        let line = self.cur_line();
        if self.col >= line.len() {
            ""
        } else {
            &line[self.col..]
        }
    }

    fn at_eof(&self) -> bool {
        self.line >= self.lines.len()
    }

    fn skip_space(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.col += rest.len() - trimmed.len();
    }

    fn token(&self, tok: Tok, line: usize, col: usize) -> Token {
        Token {
            tok,
            line: line as u32 + 1,
            col: col as u32 + 1,
        }
    }

    fn scan(&mut self) -> Token {
        loop {
            if self.at_eof() {
                return self.token(Tok::Eof, self.line, self.col);
            }
            self.skip_space();
            if self.rest().is_empty() {
                self.line += 1;
                self.col = 0;
                continue;
            }
            let (line, col) = (self.line, self.col);
            let rest = self.rest();
            let c = rest.chars().next().expect("rest is non-empty");
            match c {
                '#' => {
                    self.scan_comment();
                    continue;
                }
                'A'..='Z' | 'a'..='z' | '_' => {
                    let sym = self.read_symbol();
                    return self.token(Tok::Symbol(sym), line, col);
                }
                '\'' | '"' => {
                    let s = self.read_quoted();
                    return self.token(Tok::Quoted(s), line, col);
                }
                '<' | '>' | '|' => {
                    if let Some(name) = self.try_prim() {
                        return self.token(Tok::Prim(name), line, col);
                    }
                    self.col += 1;
                    let tok = match c {
                        '<' if rest[1..].starts_with('-') => {
                            self.col += 1;
                            Tok::LArrow
                        }
                        '<' => Tok::Lt,
                        '>' => Tok::Gt,
                        _ => Tok::Pipe,
                    };
                    return self.token(tok, line, col);
                }
                '0'..='9' => {
                    let tok = self.read_number(false);
                    return self.token(tok, line, col);
                }
                '.' => {
                    if rest.starts_with("..") {
                        self.col += 2;
                        return self.token(Tok::DotDot, line, col);
                    }
                    if rest[1..].starts_with(|d: char| d.is_ascii_digit()) {
                        let tok = self.read_number(false);
                        return self.token(tok, line, col);
                    }
                    self.col += 1;
                    self.lex_error(line, col, "unrecognized character '.'");
                    return self.token(Tok::Error('.'), line, col);
                }
                '-' | '+' => {
                    if c == '-' && rest[1..].starts_with('>') {
                        self.col += 2;
                        return self.token(Tok::RArrow, line, col);
                    }
                    let after = &rest[1..];
                    if after.starts_with(|d: char| d.is_ascii_digit())
                        || (after.starts_with('.')
                            && after[1..].starts_with(|d: char| d.is_ascii_digit()))
                    {
                        let tok = self.read_number(true);
                        return self.token(tok, line, col);
                    }
                    // A run of identical sign characters is a parameter
                    // offset suffix; its value is the length, sign per
                    // character.
                    let run = rest.chars().take_while(|&r| r == c).count();
                    self.col += run;
                    let value = if c == '-' { -(run as i32) } else { run as i32 };
                    return self.token(Tok::ParamSfx(value), line, col);
                }
                _ => {
                    let tok = match c {
                        ':' => Tok::Colon,
                        '/' => Tok::Slash,
                        '[' => Tok::LBracket,
                        ']' => Tok::RBracket,
                        '=' => Tok::Equals,
                        ',' => Tok::Comma,
                        '{' => Tok::LBrace,
                        '}' => Tok::RBrace,
                        '@' => Tok::At,
                        '%' => Tok::Percent,
                        '(' => Tok::LParen,
                        ')' => Tok::RParen,
                        '^' => Tok::Caret,
                        '&' => Tok::Amp,
                        other => {
                            self.col += other.len_utf8();
                            self.lex_error(
                                line,
                                col,
                                format!("unrecognized character {:?}", other),
                            );
                            return self.token(Tok::Error(other), line, col);
                        }
                    };
                    self.col += 1;
                    return self.token(tok, line, col);
                }
            }
        }
    }

    fn read_symbol(&mut self) -> String {
        let rest = self.rest();
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        self.col += end;
        rest[..end].to_string()
    }

    /// Read a quoted identifier/string.  May span multiple lines; the
    /// escapes `\'`, `\"`, and `\\` are replaced.
    fn read_quoted(&mut self) -> String {
        let (start_line, start_col) = (self.line, self.col);
        let quote = self.rest().chars().next().expect("caller saw the quote");
        self.col += 1;
        let mut value = String::new();
        loop {
            if self.at_eof() {
                self.lex_error(
                    start_line,
                    start_col,
                    "file ends with unclosed quoted name",
                );
                return value;
            }
            let rest = self.rest();
            let mut chars = rest.char_indices();
            let mut advanced = None;
            while let Some((i, c)) = chars.next() {
                if c == '\\' {
                    match chars.next() {
                        Some((_, e @ ('\'' | '"' | '\\'))) => value.push(e),
                        Some((_, other)) => {
                            value.push('\\');
                            value.push(other);
                        }
                        None => value.push('\\'),
                    }
                } else if c == quote {
                    advanced = Some(i + 1);
                    break;
                } else {
                    value.push(c);
                }
            }
            match advanced {
                Some(consumed) => {
                    self.col += consumed;
                    return value;
                }
                None => {
                    // Quote continues on the next line.
                    value.push('\n');
                    self.line += 1;
                    self.col = 0;
                }
            }
        }
    }

    /// Try to read an order-prefixed primitive spelling at the cursor.
    fn try_prim(&mut self) -> Option<String> {
        let rest = self.rest();
        let mut chars = rest.chars();
        let order = chars.next()?;
        let kind = chars.next()?;
        let body: String = match kind {
            'i' | 'u' => {
                let d = chars.next()?;
                if !matches!(d, '1' | '2' | '4' | '8') {
                    return None;
                }
                format!("{}{}", kind, d)
            }
            'f' => {
                let d = chars.next()?;
                if !matches!(d, '2' | '4' | '8') {
                    return None;
                }
                format!("f{}", d)
            }
            'c' => {
                let d = chars.next()?;
                match d {
                    '4' | '8' => format!("c{}", d),
                    '1' => {
                        if chars.next()? != '6' {
                            return None;
                        }
                        "c16".to_string()
                    }
                    _ => return None,
                }
            }
            'S' => {
                if chars.next()? != '1' {
                    return None;
                }
                "S1".to_string()
            }
            'U' => {
                let d = chars.next()?;
                if !matches!(d, '1' | '2' | '4') {
                    return None;
                }
                format!("U{}", d)
            }
            'b' => {
                if chars.next()? != '1' {
                    return None;
                }
                "b1".to_string()
            }
            _ => return None,
        };
        // The spelling must not run into a longer identifier (e.g. `<i42`).
        let len = 1 + body.len();
        if rest[len..].starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
            return None;
        }
        self.col += len;
        Some(format!("{}{}", order, body))
    }

    /// Read an integer or float literal.  `signed` means the cursor is on
    /// a `+`/`-` sign.  Floats require a decimal point; integers know
    /// decimal, `0x`, `0o`, and `0b` with leading zeros discarded.
    fn read_number(&mut self, signed: bool) -> Tok {
        let (line, col) = (self.line, self.col);
        let rest = self.rest();
        let mut idx = 0;
        let negative = signed && rest.starts_with('-');
        if signed {
            idx += 1;
        }
        let digits = &rest[idx..];
        // Radix prefixes.
        for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0b", 2)] {
            if digits.starts_with(prefix) {
                let body = &digits[2..];
                let end = body
                    .find(|c: char| !c.is_digit(radix))
                    .unwrap_or(body.len());
                if end == 0 {
                    self.col += idx + 2;
                    self.lex_error(line, col, format!("empty {} literal", prefix));
                    return Tok::Error(prefix.chars().nth(1).expect("two-char prefix"));
                }
                self.col += idx + 2 + end;
                let magnitude = i64::from_str_radix(&body[..end], radix).unwrap_or(0);
                return Tok::Int(if negative { -magnitude } else { magnitude });
            }
        }
        // Decimal: scan digits, optional fraction, optional exponent.
        let int_end = digits
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(digits.len());
        let mut end = int_end;
        let mut is_float = false;
        if digits[end..].starts_with('.') {
            let frac = &digits[end + 1..];
            let frac_end = frac
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(frac.len());
            if frac_end > 0 || int_end > 0 {
                is_float = true;
                end += 1 + frac_end;
            }
        }
        if !is_float && int_end == 0 {
            // No digits at all (a stray `.` reached us, e.g. from an
            // attribute value position).
            self.col += idx + 1;
            self.lex_error(line, col, "expecting a numeric literal");
            return Tok::Error(c_first(rest));
        }
        if is_float {
            // Optional exponent.
            let tail = &digits[end..];
            if tail.starts_with(['e', 'E']) {
                let mut exp = 1;
                let t = &tail[1..];
                let t2 = t.strip_prefix(['+', '-']).unwrap_or(t);
                if t2.len() < t.len() {
                    exp += 1;
                }
                let exp_digits = t2
                    .find(|c: char| !c.is_ascii_digit())
                    .unwrap_or(t2.len());
                if exp_digits > 0 {
                    end += exp + exp_digits;
                }
            }
            self.col += idx + end;
            let text = &rest[..idx + end];
            return match text.parse::<f64>() {
                Ok(v) => Tok::Float(v),
                Err(_) => {
                    self.lex_error(line, col, format!("bad float literal {:?}", text));
                    Tok::Error('.')
                }
            };
        }
        self.col += idx + int_end;
        let body = digits[..int_end].trim_start_matches('0');
        let magnitude = if body.is_empty() {
            0
        } else {
            body.parse::<i64>().unwrap_or(0)
        };
        Tok::Int(if negative { -magnitude } else { magnitude })
    }

    // ---- comments --------------------------------------------------------

    fn scan_comment(&mut self) {
        let rest = self.rest();
        if let Some(doc) = rest.strip_prefix("##") {
            self.docs.push(doc.to_string());
            self.col = self.cur_line().len();
        } else if rest.starts_with("#:") {
            self.col += 2;
            self.scan_attr_comment();
        } else {
            self.col = self.cur_line().len();
        }
    }

    /// Parse an attribute comment: `name`, `name = constant`, or
    /// `name = [constant, ...]`, comma separated, to the end of the line.
    /// Bare names are boolean true; array values must be homogeneous.
    fn scan_attr_comment(&mut self) {
        let attr_line = self.line;
        loop {
            self.skip_space();
            if self.line != attr_line || self.rest().is_empty() {
                break;
            }
            let Some(name) = self.attr_name() else {
                self.skip_attr_rest(attr_line);
                break;
            };
            self.skip_space();
            if !self.rest().starts_with('=') {
                self.attrs.set(name, AttrValue::Bool(true));
                self.skip_space();
                if self.rest().starts_with(',') {
                    self.col += 1;
                    continue;
                }
                if !self.rest().is_empty() {
                    let (l, c) = (self.line, self.col);
                    self.lex_error(l, c, "expecting , or = after attribute name");
                    self.skip_attr_rest(attr_line);
                }
                break;
            }
            self.col += 1;
            self.skip_space();
            let Some(value) = self.attr_value(attr_line) else {
                self.skip_attr_rest(attr_line);
                break;
            };
            self.attrs.set(name, value);
            self.skip_space();
            if self.line == attr_line && self.rest().starts_with(',') {
                self.col += 1;
                continue;
            }
            if self.line == attr_line && !self.rest().is_empty() {
                let (l, c) = (self.line, self.col);
                self.lex_error(l, c, "expecting , between attributes");
                self.skip_attr_rest(attr_line);
            }
            break;
        }
    }

    fn skip_attr_rest(&mut self, attr_line: usize) {
        if self.line == attr_line {
            self.col = self.cur_line().len();
        }
    }

    fn attr_name(&mut self) -> Option<String> {
        let rest = self.rest();
        let c = rest.chars().next()?;
        if c.is_ascii_alphabetic() || c == '_' {
            Some(self.read_symbol())
        } else if c == '\'' || c == '"' {
            Some(self.read_quoted())
        } else {
            let (l, col) = (self.line, self.col);
            self.lex_error(l, col, "expecting attribute name");
            None
        }
    }

    fn attr_value(&mut self, attr_line: usize) -> Option<AttrValue> {
        self.skip_space();
        let rest = self.rest();
        let c = rest.chars().next()?;
        match c {
            '\'' | '"' => Some(AttrValue::Str(self.read_quoted())),
            '[' => {
                self.col += 1;
                self.attr_array(attr_line)
            }
            '0'..='9' | '.' => match self.read_number(false) {
                Tok::Int(v) => Some(AttrValue::Int(v)),
                Tok::Float(v) => Some(AttrValue::Float(v)),
                _ => None,
            },
            '-' | '+' => match self.read_number(true) {
                Tok::Int(v) => Some(AttrValue::Int(v)),
                Tok::Float(v) => Some(AttrValue::Float(v)),
                _ => None,
            },
            _ => {
                let (l, col) = (self.line, self.col);
                self.lex_error(l, col, "expecting attribute value");
                None
            }
        }
    }

    /// Bracketed attribute array; all elements must share one kind.
    fn attr_array(&mut self, attr_line: usize) -> Option<AttrValue> {
        let mut ints: Vec<i64> = Vec::new();
        let mut floats: Vec<f64> = Vec::new();
        let mut strs: Vec<String> = Vec::new();
        loop {
            self.skip_space();
            if self.line != attr_line || self.rest().is_empty() {
                let (l, c) = (self.line, self.col);
                self.lex_error(l, c, "incomplete attribute value");
                return None;
            }
            if self.rest().starts_with(']') {
                self.col += 1;
                break;
            }
            let element = self.attr_value(attr_line)?;
            let homogeneous = match element {
                AttrValue::Int(v) if floats.is_empty() && strs.is_empty() => {
                    ints.push(v);
                    true
                }
                AttrValue::Float(v) if ints.is_empty() && strs.is_empty() => {
                    floats.push(v);
                    true
                }
                AttrValue::Str(v) if ints.is_empty() && floats.is_empty() => {
                    strs.push(v);
                    true
                }
                _ => false,
            };
            if !homogeneous {
                let (l, c) = (self.line, self.col);
                self.lex_error(
                    l,
                    c,
                    "attribute array values must be all int, all float, or all string",
                );
                return None;
            }
            self.skip_space();
            if self.rest().starts_with(',') {
                self.col += 1;
            } else if !self.rest().starts_with(']') {
                let (l, c) = (self.line, self.col);
                self.lex_error(l, c, "expecting , or ] in array attribute");
                return None;
            }
        }
        Some(if !floats.is_empty() {
            AttrValue::FloatArray(floats)
        } else if !strs.is_empty() {
            AttrValue::StrArray(strs)
        } else {
            AttrValue::IntArray(ints)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        let mut tk = Tokenizer::new(src);
        let mut out = Vec::new();
        loop {
            let t = tk.next();
            if t.tok == Tok::Eof {
                break;
            }
            out.push(t.tok);
        }
        out
    }

    #[test]
    fn basic_stream() {
        assert_eq!(
            toks("x = <i4"),
            vec![
                Tok::Symbol("x".into()),
                Tok::Equals,
                Tok::Prim("<i4".into())
            ]
        );
    }

    #[test]
    fn primitives_and_arrows_disambiguate() {
        assert_eq!(toks("<-"), vec![Tok::LArrow]);
        assert_eq!(toks("->"), vec![Tok::RArrow]);
        assert_eq!(toks("<c16"), vec![Tok::Prim("<c16".into())]);
        assert_eq!(
            toks("< i4"),
            vec![Tok::Lt, Tok::Symbol("i4".into())],
            "bare order mark then symbol"
        );
        // A primitive spelling must not run into an identifier.
        assert_eq!(
            toks("<i42"),
            vec![Tok::Lt, Tok::Symbol("i42".into())]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(toks("42"), vec![Tok::Int(42)]);
        assert_eq!(toks("-1"), vec![Tok::Int(-1)]);
        assert_eq!(toks("0x10"), vec![Tok::Int(16)]);
        assert_eq!(toks("0o17"), vec![Tok::Int(15)]);
        assert_eq!(toks("0b101"), vec![Tok::Int(5)]);
        assert_eq!(toks("007"), vec![Tok::Int(7)]);
        assert_eq!(toks("2.5"), vec![Tok::Float(2.5)]);
        assert_eq!(toks("-1.5e3"), vec![Tok::Float(-1500.0)]);
        assert_eq!(toks(".5"), vec![Tok::Float(0.5)]);
        // Floats need a dot; `1e5` is an integer then a symbol.
        assert_eq!(
            toks("1e5"),
            vec![Tok::Int(1), Tok::Symbol("e5".into())]
        );
    }

    #[test]
    fn param_suffixes() {
        assert_eq!(toks("n+++"), vec![Tok::Symbol("n".into()), Tok::ParamSfx(3)]);
        assert_eq!(toks("n--"), vec![Tok::Symbol("n".into()), Tok::ParamSfx(-2)]);
        assert_eq!(toks("+"), vec![Tok::ParamSfx(1)]);
    }

    #[test]
    fn dotdot_and_punctuation() {
        assert_eq!(
            toks("../a[]{}@%():^&,"),
            vec![
                Tok::DotDot,
                Tok::Slash,
                Tok::Symbol("a".into()),
                Tok::LBracket,
                Tok::RBracket,
                Tok::LBrace,
                Tok::RBrace,
                Tok::At,
                Tok::Percent,
                Tok::LParen,
                Tok::RParen,
                Tok::Colon,
                Tok::Caret,
                Tok::Amp,
                Tok::Comma,
            ]
        );
    }

    #[test]
    fn quoted_strings_and_escapes() {
        assert_eq!(toks("'a b'"), vec![Tok::Quoted("a b".into())]);
        assert_eq!(toks(r#""say \"hi\"""#), vec![Tok::Quoted("say \"hi\"".into())]);
        assert_eq!(toks(r"'back\\slash'"), vec![Tok::Quoted(r"back\slash".into())]);
        // Multi-line quote keeps the newline.
        assert_eq!(toks("'two\nlines'"), vec![Tok::Quoted("two\nlines".into())]);
    }

    #[test]
    fn doc_comments_accumulate() {
        let mut tk = Tokenizer::new("x = <i4 ## counter\n## second line\n");
        let mut seen = Vec::new();
        loop {
            let t = tk.next();
            if t.tok == Tok::Eof {
                break;
            }
            seen.push(t.tok);
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(tk.take_docs(), vec![" counter".to_string(), " second line".to_string()]);
    }

    #[test]
    fn attribute_comments_parse_inline() {
        let mut tk = Tokenizer::new("#: units = 'cm', dims = [3, 4], flag\n");
        assert_eq!(tk.next().tok, Tok::Eof);
        let attrs = tk.take_attrs();
        assert_eq!(attrs.get("units"), Some(&AttrValue::Str("cm".into())));
        assert_eq!(attrs.get("dims"), Some(&AttrValue::IntArray(vec![3, 4])));
        assert_eq!(attrs.get("flag"), Some(&AttrValue::Bool(true)));
        assert!(tk.take_errors().is_empty());
    }

    #[test]
    fn mixed_attribute_arrays_are_rejected() {
        let mut tk = Tokenizer::new("#: bad = [1, 'x']\n");
        assert_eq!(tk.next().tok, Tok::Eof);
        assert!(tk.take_attrs().get("bad").is_none());
        assert_eq!(tk.take_errors().len(), 1);
    }

    #[test]
    fn unknown_characters_yield_error_tokens() {
        let mut tk = Tokenizer::new("x ? y");
        assert_eq!(tk.next().tok, Tok::Symbol("x".into()));
        assert_eq!(tk.next().tok, Tok::Error('?'));
        assert_eq!(tk.next().tok, Tok::Symbol("y".into()));
        assert_eq!(tk.take_errors().len(), 1);
    }

    #[test]
    fn positions_are_one_based() {
        let mut tk = Tokenizer::new("a\n  b");
        let a = tk.next();
        assert_eq!((a.line, a.col), (1, 1));
        let b = tk.next();
        assert_eq!((b.line, b.col), (2, 3));
    }
}
