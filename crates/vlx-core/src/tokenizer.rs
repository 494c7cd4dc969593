//! Tokenizer for the VLX text format.
//!
//! Produces a flat token stream: brackets, `=`, string / identifier / UID /
//! boolean / integer / real literals, `<Tag>` headers, and `{< ... >}` rawtext
//! blocks. Whitespace and `//` or `/* */` comments are skipped between tokens.
//!
//! Rawtext is handled with a small mode switch: after `{<` is returned, the
//! next call reads the block body verbatim up to the first `>}` that is not
//! written as `\>}`, and the call after that returns the closing `>}`.

use crate::error::{Result, VlxError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    LeftRoundBracket,
    RightRoundBracket,
    LeftSquareBracket,
    RightSquareBracket,
    LeftCurlyBracket,
    RightCurlyBracket,
    /// `{<`
    LeftFancyBracket,
    /// `>}`
    RightFancyBracket,
    Equals,
    String,
    Uid,
    Identifier,
    Boolean,
    Integer,
    Real,
    TagHeader,
    RawtextBlock,
}

/// A lexed token. `text` holds the unescaped string contents for strings,
/// the body for rawtext blocks, `<Name>` for tag headers, and the literal
/// source text for everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    RawtextBody,
    RawtextClose,
}

pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    mode: Mode,
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

impl<'a> Tokenizer<'a> {
    /// A tokenizer positioned at line 1 of `src`.
    pub fn new(src: &'a str) -> Self {
        Tokenizer {
            src,
            pos: 0,
            line: 1,
            mode: Mode::Normal,
        }
    }

    /// Current 1-based line.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Return the next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        match self.mode {
            Mode::RawtextBody => {
                self.mode = Mode::RawtextClose;
                return self.read_rawtext().map(Some);
            }
            Mode::RawtextClose => {
                self.mode = Mode::Normal;
                return Ok(Some(self.token(TokenKind::RightFancyBracket, ">}")));
            }
            Mode::Normal => {}
        }

        self.skip_whitespace_and_comments()?;

        let c = match self.peek() {
            Some(c) => c,
            None => return Ok(None),
        };

        let simple = match c {
            '(' => Some(TokenKind::LeftRoundBracket),
            ')' => Some(TokenKind::RightRoundBracket),
            '[' => Some(TokenKind::LeftSquareBracket),
            ']' => Some(TokenKind::RightSquareBracket),
            '}' => Some(TokenKind::RightCurlyBracket),
            '=' => Some(TokenKind::Equals),
            _ => None,
        };
        if let Some(kind) = simple {
            self.bump();
            return Ok(Some(self.token(kind, &c.to_string())));
        }

        match c {
            '{' => {
                self.bump();
                if self.peek() == Some('<') {
                    self.bump();
                    self.mode = Mode::RawtextBody;
                    Ok(Some(self.token(TokenKind::LeftFancyBracket, "{<")))
                } else {
                    Ok(Some(self.token(TokenKind::LeftCurlyBracket, "{")))
                }
            }
            '"' => self.read_string().map(Some),
            '#' => self.read_uid().map(Some),
            '<' => self.read_tag_header().map(Some),
            c if c.is_ascii_alphabetic() || c == '_' => Ok(Some(self.read_identifier())),
            c if c.is_ascii_digit() || c == '+' || c == '-' || c == '.' => {
                self.read_number().map(Some)
            }
            other => Err(self.lex_error(format!("unexpected character '{other}'"))),
        }
    }

    /// Collect every remaining token.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn token(&self, kind: TokenKind, text: &str) -> Token {
        Token {
            kind,
            text: text.to_string(),
            line: self.line,
        }
    }

    fn lex_error(&self, message: String) -> VlxError {
        VlxError::Lex {
            line: self.line,
            message,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<()> {
        loop {
            match (self.peek(), self.peek_second()) {
                (Some(' ' | '\t' | '\r' | '\n'), _) => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.bump() {
                            Some('*') if self.peek() == Some('/') => {
                                self.bump();
                                break;
                            }
                            Some(_) => {}
                            None => return Err(self.lex_error("unterminated comment".into())),
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn read_identifier(&mut self) -> Token {
        let line = self.line;
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_char) {
            self.bump();
        }
        let text = &self.src[start..self.pos];
        let kind = if text == "true" || text == "false" {
            TokenKind::Boolean
        } else {
            TokenKind::Identifier
        };
        Token {
            kind,
            text: text.to_string(),
            line,
        }
    }

    fn read_uid(&mut self) -> Result<Token> {
        let line = self.line;
        let start = self.pos;
        self.bump(); // '#'
        while self.peek().is_some_and(is_identifier_char) {
            self.bump();
        }
        if self.pos - start == 1 {
            return Err(self.lex_error("empty UID after '#'".into()));
        }
        Ok(Token {
            kind: TokenKind::Uid,
            text: self.src[start..self.pos].to_string(),
            line,
        })
    }

    fn read_tag_header(&mut self) -> Result<Token> {
        let line = self.line;
        let start = self.pos;
        self.bump(); // '<'
        while self.peek().is_some_and(is_identifier_char) {
            self.bump();
        }
        if self.pos - start == 1 || self.peek() != Some('>') {
            return Err(self.lex_error("malformed tag header".into()));
        }
        self.bump(); // '>'
        Ok(Token {
            kind: TokenKind::TagHeader,
            text: self.src[start..self.pos].to_string(),
            line,
        })
    }

    fn read_number(&mut self) -> Result<Token> {
        let line = self.line;
        let start = self.pos;
        if matches!(self.peek(), Some('+' | '-')) {
            self.bump();
        }

        if self.peek() == Some('0') && matches!(self.peek_second(), Some('x' | 'X')) {
            self.bump();
            self.bump();
            let digits = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            if self.pos == digits {
                return Err(self.lex_error("malformed hexadecimal literal".into()));
            }
            return self.finish_number(TokenKind::Integer, start, line);
        }

        let mut digits = self.skip_digits();
        let mut kind = TokenKind::Integer;
        if self.peek() == Some('.') {
            self.bump();
            kind = TokenKind::Real;
            digits += self.skip_digits();
        }
        if digits == 0 {
            return Err(self.lex_error(format!(
                "malformed number '{}'",
                &self.src[start..self.pos]
            )));
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            kind = TokenKind::Real;
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if self.skip_digits() == 0 {
                return Err(self.lex_error("malformed exponent".into()));
            }
        }
        self.finish_number(kind, start, line)
    }

    fn finish_number(&mut self, kind: TokenKind, start: usize, line: usize) -> Result<Token> {
        if let Some(c) = self.peek().filter(|c| is_identifier_char(*c) || *c == '.') {
            return Err(self.lex_error(format!(
                "unexpected character '{c}' after number '{}'",
                &self.src[start..self.pos]
            )));
        }
        Ok(Token {
            kind,
            text: self.src[start..self.pos].to_string(),
            line,
        })
    }

    fn skip_digits(&mut self) -> usize {
        let mut n = 0;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            n += 1;
        }
        n
    }

    fn read_string(&mut self) -> Result<Token> {
        let line = self.line;
        self.bump(); // opening quote
        let unterminated = || VlxError::Lex {
            line,
            message: "unterminated string".into(),
        };
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('"') => break,
                Some('\\') => match self.bump() {
                    Some('"') => text.push('"'),
                    Some('\\') => text.push('\\'),
                    Some('b') => text.push('\u{0008}'),
                    Some('f') => text.push('\u{000C}'),
                    Some('n') => text.push('\n'),
                    Some('r') => text.push('\r'),
                    Some('t') => text.push('\t'),
                    Some(other) => {
                        text.push('\\');
                        text.push(other);
                    }
                    None => return Err(unterminated()),
                },
                Some(c) => text.push(c),
                None => return Err(unterminated()),
            }
        }
        Ok(Token {
            kind: TokenKind::String,
            text,
            line,
        })
    }

    /// Read a rawtext body up to the terminating `>}`, which is consumed here;
    /// the caller emits the `>}` token on the next call.
    fn read_rawtext(&mut self) -> Result<Token> {
        let line = self.line;
        let mut text = String::new();
        loop {
            match self.bump() {
                Some('>') if self.peek() == Some('}') => {
                    if text.ends_with('\\') {
                        // `\>}` stands for a literal `>}`; the `}` is pushed
                        // on the next iteration.
                        text.pop();
                        text.push('>');
                    } else {
                        self.bump();
                        break;
                    }
                }
                Some(c) => text.push(c),
                None => {
                    return Err(VlxError::Lex {
                        line,
                        message: "unterminated rawtext block".into(),
                    })
                }
            }
        }
        // A CRLF opener makes `\r\n` the delimiter newline at both ends;
        // after an LF opener only `\n` is stripped.
        let crlf = text.starts_with("\r\n");
        if crlf {
            text.drain(..2);
        } else if text.starts_with('\n') {
            text.remove(0);
        }
        if crlf && text.ends_with("\r\n") {
            text.truncate(text.len() - 2);
        } else if text.ends_with('\n') {
            text.pop();
        }
        Ok(Token {
            kind: TokenKind::RawtextBlock,
            text,
            line,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Tokenizer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn fancy_brackets_switch_modes() {
        assert_eq!(
            kinds("{< body >}"),
            vec![
                TokenKind::LeftFancyBracket,
                TokenKind::RawtextBlock,
                TokenKind::RightFancyBracket
            ]
        );
    }

    #[test]
    fn number_followed_by_letters_is_an_error() {
        assert!(Tokenizer::new("12abc").tokenize().is_err());
    }
}
