use vlx_core::tokenizer::{Token, TokenKind, Tokenizer};
use vlx_core::VlxError;

fn tokens(src: &str) -> Vec<Token> {
    Tokenizer::new(src).tokenize().expect("tokenize failed")
}

fn kinds(src: &str) -> Vec<TokenKind> {
    tokens(src).into_iter().map(|t| t.kind).collect()
}

fn lex_error_line(src: &str) -> usize {
    match Tokenizer::new(src).tokenize() {
        Err(VlxError::Lex { line, .. }) => line,
        other => panic!("expected a lex error for {src:?}, got {other:?}"),
    }
}

// ============================================================================
// Punctuation and literals
// ============================================================================

#[test]
fn header_line() {
    assert_eq!(
        kinds("VLX version=100 encoding=ascii"),
        vec![
            TokenKind::Identifier,
            TokenKind::Identifier,
            TokenKind::Equals,
            TokenKind::Integer,
            TokenKind::Identifier,
            TokenKind::Equals,
            TokenKind::Identifier,
        ]
    );
}

#[test]
fn brackets() {
    assert_eq!(
        kinds("( ) [ ] { }"),
        vec![
            TokenKind::LeftRoundBracket,
            TokenKind::RightRoundBracket,
            TokenKind::LeftSquareBracket,
            TokenKind::RightSquareBracket,
            TokenKind::LeftCurlyBracket,
            TokenKind::RightCurlyBracket,
        ]
    );
}

#[test]
fn tag_header_keeps_angle_brackets() {
    let toks = tokens("<Mesh>");
    assert_eq!(toks[0].kind, TokenKind::TagHeader);
    assert_eq!(toks[0].text, "<Mesh>");
}

#[test]
fn booleans_are_not_identifiers() {
    assert_eq!(
        kinds("true false truth"),
        vec![TokenKind::Boolean, TokenKind::Boolean, TokenKind::Identifier]
    );
}

#[test]
fn uid_includes_hash() {
    let toks = tokens("#node_1 #NULL");
    assert_eq!(toks[0].kind, TokenKind::Uid);
    assert_eq!(toks[0].text, "#node_1");
    assert_eq!(toks[1].text, "#NULL");
}

#[test]
fn numbers() {
    assert_eq!(
        kinds("0 -12 +7 0x1F 1.5 -0.25 2e10 3.0E-2"),
        vec![
            TokenKind::Integer,
            TokenKind::Integer,
            TokenKind::Integer,
            TokenKind::Integer,
            TokenKind::Real,
            TokenKind::Real,
            TokenKind::Real,
            TokenKind::Real,
        ]
    );
}

#[test]
fn string_escapes() {
    let toks = tokens(r#""a\"b\\c\nd\te""#);
    assert_eq!(toks[0].kind, TokenKind::String);
    assert_eq!(toks[0].text, "a\"b\\c\nd\te");
}

#[test]
fn unknown_string_escape_is_kept() {
    assert_eq!(tokens(r#""\q""#)[0].text, "\\q");
}

// ============================================================================
// Rawtext
// ============================================================================

#[test]
fn rawtext_body_is_verbatim() {
    let toks = tokens("{<\nvoid main() { gl_Position = vec4(0); }\n>}");
    assert_eq!(toks.len(), 3);
    assert_eq!(toks[1].kind, TokenKind::RawtextBlock);
    assert_eq!(toks[1].text, "void main() { gl_Position = vec4(0); }");
}

#[test]
fn rawtext_crlf_delimiters() {
    let toks = tokens("{<\r\nline one\r\nline two\r\n>}");
    assert_eq!(toks[1].text, "line one\r\nline two");
}

#[test]
fn rawtext_lf_opener_keeps_trailing_carriage_return() {
    let toks = tokens("{<\nabc\r\n>}");
    assert_eq!(toks[1].text, "abc\r");
}

#[test]
fn rawtext_crlf_document() {
    let root = vlx_core::parse_text(
        "VLX version=100 encoding=ascii\r\n\r\n<Root>\r\n{\r\n\tsrc = {<\r\nabc\r\n>}\r\n}\r\n",
    )
    .unwrap();
    let root = root.borrow();
    let raw = root.value("src").unwrap().as_rawtext().unwrap().borrow();
    assert_eq!(raw.text, "abc");
}

#[test]
fn rawtext_escaped_terminator() {
    let toks = tokens("{<a \\>} b>}");
    assert_eq!(toks[1].text, "a >} b");
}

#[test]
fn rawtext_counts_lines() {
    let toks = tokens("{<\none\ntwo\n>} after");
    assert_eq!(toks[3].kind, TokenKind::Identifier);
    assert_eq!(toks[3].line, 4);
}

// ============================================================================
// Whitespace, comments, and line numbers
// ============================================================================

#[test]
fn comments_are_skipped() {
    let toks = tokens("a // line comment\n/* block\ncomment */ b");
    assert_eq!(toks.len(), 2);
    assert_eq!(toks[1].text, "b");
    assert_eq!(toks[1].line, 3);
}

#[test]
fn line_numbers_start_at_one() {
    let toks = tokens("a\n\n  b");
    assert_eq!(toks[0].line, 1);
    assert_eq!(toks[1].line, 3);
}

#[test]
fn empty_input_has_no_tokens() {
    assert!(tokens("  \n\t ").is_empty());
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn unterminated_string() {
    assert_eq!(lex_error_line("a\n\"open"), 2);
}

#[test]
fn unterminated_rawtext() {
    assert_eq!(lex_error_line("{< never closed"), 1);
}

#[test]
fn unterminated_comment() {
    assert_eq!(lex_error_line("/* forever"), 1);
}

#[test]
fn unexpected_character() {
    assert_eq!(lex_error_line("a\nb\n@"), 3);
}

#[test]
fn number_glued_to_identifier() {
    assert!(Tokenizer::new("12px").tokenize().is_err());
    assert!(Tokenizer::new("1.2.3").tokenize().is_err());
}
