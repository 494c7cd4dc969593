//! Recursive-descent parser: VLX text → document tree.
//!
//! ```text
//! document       := header TagHeader '{' structure-body '}'
//! header         := IDENTIFIER 'version' '=' INTEGER 'encoding' '=' IDENTIFIER
//! structure-body := ( 'ID' '=' UID | key '=' value )*
//! value          := TagHeader? ( '{' structure-body '}' | '[' value* ']'
//!                              | '(' array-body ')' | '{<' RAWTEXT '>}' )
//!                 | STRING | IDENTIFIER | UID | BOOLEAN | INTEGER | REAL
//! array-body     := INTEGER* | REAL ( REAL | INTEGER )*
//! ```
//!
//! Any error aborts the whole document; no partial tree is returned.

use crate::error::{Result, VlxError};
use crate::tokenizer::{Token, TokenKind, Tokenizer};
use crate::value::{
    ArrayInteger, ArrayReal, List, Payload, RawtextBlock, Structure, StructureRef, UidRef, Value,
};

/// The only accepted `version` value.
pub const VLX_VERSION: i64 = 100;

/// The only accepted `encoding` value.
pub const VLX_ENCODING: &str = "ascii";

/// Parse a complete VLX text document and return its root structure.
pub fn parse_text(text: &str) -> Result<StructureRef> {
    Parser::new(text).parse()
}

pub struct Parser<'a> {
    tokenizer: Tokenizer<'a>,
    format_name: String,
}

impl<'a> Parser<'a> {
    pub fn new(text: &'a str) -> Self {
        Parser {
            tokenizer: Tokenizer::new(text),
            format_name: String::new(),
        }
    }

    /// The format name read from the header (`VLX` for files we write).
    /// Empty until [`Parser::parse`] has read the header.
    pub fn format_name(&self) -> &str {
        &self.format_name
    }

    /// Parse the header and the root structure, which must end the input.
    ///
    /// # Errors
    ///
    /// The first lexical or grammar error, with its line number.
    pub fn parse(&mut self) -> Result<StructureRef> {
        self.parse_header()?;

        let tag = self.next()?;
        if tag.kind != TokenKind::TagHeader {
            return Err(parse_error(&tag));
        }
        let open = self.next()?;
        if open.kind != TokenKind::LeftCurlyBracket {
            return Err(parse_error(&open));
        }

        let mut root = Structure::new(tag.text);
        root.line = open.line;
        self.parse_structure_body(&mut root)?;

        if let Some(trailing) = self.tokenizer.next_token()? {
            return Err(parse_error(&trailing));
        }
        Ok(root.into_ref())
    }

    fn parse_header(&mut self) -> Result<()> {
        let line = self.tokenizer.line();
        let not_found = |line| VlxError::HeaderNotFound { line };

        let name = self.tokenizer.next_token()?.ok_or(not_found(line))?;
        if name.kind != TokenKind::Identifier {
            return Err(not_found(name.line));
        }
        self.format_name = name.text;

        self.expect_header_word("version")?;
        let version = self.tokenizer.next_token()?.ok_or(not_found(line))?;
        let parsed = match version.kind {
            TokenKind::Integer => parse_integer(&version)?,
            _ => return Err(not_found(version.line)),
        };
        if parsed != VLX_VERSION {
            return Err(VlxError::UnsupportedVersion {
                line: version.line,
                version: parsed,
            });
        }

        self.expect_header_word("encoding")?;
        let encoding = self.tokenizer.next_token()?.ok_or(not_found(line))?;
        if encoding.kind != TokenKind::Identifier || encoding.text != VLX_ENCODING {
            return Err(VlxError::UnsupportedEncoding {
                line: encoding.line,
                encoding: encoding.text,
            });
        }
        Ok(())
    }

    /// `word '='` inside the header.
    fn expect_header_word(&mut self, word: &str) -> Result<()> {
        for expected in [TokenKind::Identifier, TokenKind::Equals] {
            let line = self.tokenizer.line();
            match self.tokenizer.next_token()? {
                Some(t)
                    if t.kind == expected
                        && (expected != TokenKind::Identifier || t.text == word) => {}
                Some(t) => return Err(VlxError::HeaderNotFound { line: t.line }),
                None => return Err(VlxError::HeaderNotFound { line }),
            }
        }
        Ok(())
    }

    fn next(&mut self) -> Result<Token> {
        let line = self.tokenizer.line();
        self.tokenizer.next_token()?.ok_or(VlxError::Parse {
            line,
            token: "end of input".to_string(),
        })
    }

    /// Parse `key = value` pairs up to and including the closing `}`.
    fn parse_structure_body(&mut self, structure: &mut Structure) -> Result<()> {
        loop {
            let key = self.next()?;
            match key.kind {
                TokenKind::RightCurlyBracket => return Ok(()),
                TokenKind::Identifier => {}
                _ => return Err(parse_error(&key)),
            }

            let equals = self.next()?;
            if equals.kind != TokenKind::Equals {
                return Err(parse_error(&equals));
            }

            if key.text == "ID" {
                let uid = self.next()?;
                if uid.kind != TokenKind::Uid || structure.has_uid() {
                    return Err(parse_error(&uid));
                }
                structure.uid = uid.text;
            } else if key.text.eq_ignore_ascii_case("ID") {
                // `Id`, `iD` and `id` are reserved, not ordinary keys.
                return Err(parse_error(&key));
            } else {
                let first = self.next()?;
                let value = self.parse_value(first)?;
                structure.push(key.text, value);
            }
        }
    }

    /// Parse one value whose first token has already been read.
    fn parse_value(&mut self, first: Token) -> Result<Value> {
        let (tag, token) = if first.kind == TokenKind::TagHeader {
            (first.text, self.next()?)
        } else {
            (String::new(), first)
        };
        let line = token.line;

        let payload = match token.kind {
            TokenKind::LeftCurlyBracket => {
                let mut structure = Structure::new(tag);
                structure.line = line;
                self.parse_structure_body(&mut structure)?;
                return Ok(Value::with_line(
                    Payload::Structure(structure.into_ref()),
                    line,
                ));
            }
            TokenKind::LeftSquareBracket => {
                let mut list = List::new(tag);
                list.line = line;
                loop {
                    let item = self.next()?;
                    if item.kind == TokenKind::RightSquareBracket {
                        break;
                    }
                    list.push(self.parse_value(item)?);
                }
                return Ok(Value::with_line(Payload::List(list.into_ref()), line));
            }
            TokenKind::LeftRoundBracket => return self.parse_array(tag, line),
            TokenKind::LeftFancyBracket => {
                let body = self.next()?;
                if body.kind != TokenKind::RawtextBlock {
                    return Err(parse_error(&body));
                }
                let close = self.next()?;
                if close.kind != TokenKind::RightFancyBracket {
                    return Err(parse_error(&close));
                }
                let mut block = RawtextBlock::new(tag, body.text);
                block.line = line;
                return Ok(Value::with_line(
                    Payload::RawtextBlock(block.into_ref()),
                    line,
                ));
            }
            // Tags only prefix containers.
            _ if !tag.is_empty() => return Err(parse_error(&token)),
            TokenKind::String => Payload::String(token.text),
            TokenKind::Identifier => Payload::Identifier(token.text),
            TokenKind::Uid => Payload::Uid(UidRef::new(token.text)),
            TokenKind::Boolean => Payload::Bool(token.text == "true"),
            TokenKind::Integer => Payload::Integer(parse_integer(&token)?),
            TokenKind::Real => Payload::Real(parse_real(&token)?),
            _ => return Err(parse_error(&token)),
        };
        Ok(Value::with_line(payload, line))
    }

    /// Parse an array body after `(`. The first literal decides the element
    /// kind; integers inside a real array are widened, reals inside an
    /// integer array are an error. `( )` is an empty integer array.
    fn parse_array(&mut self, tag: String, line: usize) -> Result<Value> {
        let mut integers = Vec::new();
        let mut reals: Option<Vec<f64>> = None;
        loop {
            let token = self.next()?;
            match token.kind {
                TokenKind::RightRoundBracket => break,
                TokenKind::Integer => {
                    let i = parse_integer(&token)?;
                    match reals.as_mut() {
                        Some(reals) => reals.push(i as f64),
                        None => integers.push(i),
                    }
                }
                TokenKind::Real => {
                    if !integers.is_empty() {
                        return Err(parse_error(&token));
                    }
                    reals.get_or_insert_with(Vec::new).push(parse_real(&token)?);
                }
                _ => return Err(parse_error(&token)),
            }
        }

        let value = match reals {
            Some(values) => {
                let mut array = ArrayReal::new(tag, values);
                array.line = line;
                Value::with_line(Payload::ArrayReal(array.into_ref()), line)
            }
            None => {
                let mut array = ArrayInteger::new(tag, integers);
                array.line = line;
                Value::with_line(Payload::ArrayInteger(array.into_ref()), line)
            }
        };
        Ok(value)
    }
}

fn parse_error(token: &Token) -> VlxError {
    VlxError::Parse {
        line: token.line,
        token: token.text.clone(),
    }
}

/// Decimal or `0x` hexadecimal, with an optional sign. Hex literals wider
/// than `i64::MAX` wrap, so `0xFFFFFFFFFFFFFFFF` reads as `-1`.
fn parse_integer(token: &Token) -> Result<i64> {
    let text = token.text.as_str();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let hex = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"));
    let parsed = match hex {
        Some(hex) => u64::from_str_radix(hex, 16).ok().map(|v| {
            let v = v as i64;
            if negative {
                v.wrapping_neg()
            } else {
                v
            }
        }),
        None => text.parse::<i64>().ok(),
    };
    parsed.ok_or_else(|| parse_error(token))
}

fn parse_real(token: &Token) -> Result<f64> {
    token.text.parse::<f64>().map_err(|_| parse_error(token))
}
