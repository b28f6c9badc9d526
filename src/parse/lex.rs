use super::types::{ParseError, SrcLoc};
use logos::{self, Logos};
use std::fmt;

//===========================================================================//

#[derive(Clone, Debug, Default, PartialEq)]
enum LexerError {
    #[default]
    InvalidToken,
    IntOverflow,
}

//===========================================================================//

struct LexerState {
    line: u32,
    start_of_line: usize,
    start_of_prev_line: usize,
}

//===========================================================================//

fn decimal_literal_callback(
    lexer: &mut logos::Lexer<TokenKind>,
) -> Result<u32, LexerError> {
    lexer
        .slice()
        .iter()
        .try_fold(0u32, |value, &chr| {
            value.checked_mul(10)?.checked_add(u32::from(chr - b'0'))
        })
        .ok_or(LexerError::IntOverflow)
}

fn hex_literal_callback(
    lexer: &mut logos::Lexer<TokenKind>,
) -> Result<u32, LexerError> {
    lexer.slice()[2..]
        .iter()
        .try_fold(0u32, |value, &chr| {
            let digit = char::from(chr).to_digit(16)?;
            value.checked_mul(16)?.checked_add(digit)
        })
        .ok_or(LexerError::IntOverflow)
}

fn newline_callback(lexer: &mut logos::Lexer<TokenKind>) {
    lexer.extras.line += 1;
    lexer.extras.start_of_prev_line = lexer.extras.start_of_line;
    lexer.extras.start_of_line = lexer.span().end;
}

#[derive(Debug, Eq, Logos, PartialEq)]
#[logos(error = LexerError)]
#[logos(extras = LexerState)]
#[logos(skip r"[ \t\r]+")] // whitespace
#[logos(source = [u8])]
enum TokenKind {
    #[token(",")]
    Comma,
    #[token("\"")]
    Quote,
    #[regex(r"0[xX][0-9a-fA-F]+", hex_literal_callback)]
    #[regex(r"[0-9]+", decimal_literal_callback)]
    IntLiteral(u32),
    #[regex(r"\n", newline_callback)]
    Linebreak,
    #[regex(r"[A-Za-z]+")]
    Word,
}

impl TokenKind {
    fn lexer_location(lexer: &logos::Lexer<TokenKind>) -> SrcLoc {
        SrcLoc {
            line: lexer.extras.line,
            column: lexer.span().start - lexer.extras.start_of_line,
        }
    }

    fn into_token(self, lexer: &logos::Lexer<TokenKind>) -> Token {
        let value = match self {
            TokenKind::Comma => TokenValue::Comma,
            TokenKind::Quote => TokenValue::Quote,
            TokenKind::IntLiteral(int) => TokenValue::IntLiteral(int),
            TokenKind::Linebreak => {
                let start = SrcLoc {
                    line: lexer.extras.line - 1,
                    column: lexer.span().start
                        - lexer.extras.start_of_prev_line,
                };
                return Token { start, value: TokenValue::Linebreak };
            }
            TokenKind::Word => {
                let word = String::from_utf8_lossy(lexer.slice()).into_owned();
                TokenValue::Word(word)
            }
        };
        Token { start: TokenKind::lexer_location(lexer), value }
    }
}

//===========================================================================//

/// The contents of a single lexical token.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TokenValue {
    /// A "`,`" field separator.
    Comma,
    /// A "`"`" quote around a field.
    Quote,
    /// A decimal or `0x`-prefixed hexadecimal literal.
    IntLiteral(u32),
    /// The end of a line.
    Linebreak,
    /// A run of ASCII letters.
    Word(String),
}

impl TokenValue {
    /// Returns the human-readable name for this kind of token.
    pub fn name(&self) -> &'static str {
        match &self {
            TokenValue::Comma => "comma",
            TokenValue::Quote => "quote",
            TokenValue::IntLiteral(_) => "int literal",
            TokenValue::Linebreak => "linebreak",
            TokenValue::Word(_) => "word",
        }
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenValue::IntLiteral(int) => write!(f, "int literal {int}"),
            TokenValue::Word(word) => write!(f, "word {word:?}"),
            other => f.write_str(other.name()),
        }
    }
}

//===========================================================================//

/// A single lexical token, including location information.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Token {
    /// The location in the file of the start of the token.
    pub start: SrcLoc,
    /// The contents of the token.
    pub value: TokenValue,
}

//===========================================================================//

/// A lexer for tokenizing an input file.
pub struct TokenLexer<'a> {
    lexer: logos::Lexer<'a, TokenKind>,
}

impl<'a> TokenLexer<'a> {
    /// Constructs a new lexer for input that starts on the given line.
    pub fn new(input: &'a [u8], first_line: u32) -> TokenLexer<'a> {
        let state = LexerState {
            line: first_line,
            start_of_line: 0,
            start_of_prev_line: 0,
        };
        TokenLexer { lexer: TokenKind::lexer_with_extras(input, state) }
    }
}

impl Iterator for TokenLexer<'_> {
    type Item = Result<Token, ParseError>;

    fn next(&mut self) -> Option<Result<Token, ParseError>> {
        match self.lexer.next()? {
            Ok(kind) => Some(Ok(kind.into_token(&self.lexer))),
            Err(error) => {
                let location = TokenKind::lexer_location(&self.lexer);
                let slice = self.lexer.slice().escape_ascii();
                let message = match error {
                    LexerError::InvalidToken => {
                        format!("invalid character: {slice}")
                    }
                    LexerError::IntOverflow => {
                        format!("integer literal too large: {slice}")
                    }
                };
                Some(Err(ParseError { location, message }))
            }
        }
    }
}

//===========================================================================//

/// Parses a single decimal or `0x`-prefixed hexadecimal literal, as used
/// in the input files, from a string with optional surrounding whitespace.
pub fn parse_int_literal(text: &str) -> Result<u32, ParseError> {
    let tokens = TokenLexer::new(text.as_bytes(), 1)
        .collect::<Result<Vec<Token>, ParseError>>()?;
    match tokens.as_slice() {
        [Token { value: TokenValue::IntLiteral(value), .. }] => Ok(*value),
        _ => Err(ParseError::new(
            SrcLoc::line_start(1),
            format!("invalid number: {:?}", text.trim()),
        )),
    }
}

/// Like [`parse_int_literal`], but for values up to 64 bits wide, such as
/// cycle counts.
pub fn parse_u64_literal(text: &str) -> Result<u64, ParseError> {
    let text = text.trim();
    let (digits, radix) =
        match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
            Some(digits) => (digits, 16),
            None => (text, 10),
        };
    let error = |message: String| {
        Err(ParseError::new(SrcLoc::line_start(1), message))
    };
    if digits.is_empty() || !digits.chars().all(|chr| chr.is_digit(radix)) {
        return error(format!("invalid number: {text:?}"));
    }
    match u64::from_str_radix(digits, radix) {
        Ok(value) => Ok(value),
        Err(_) => error(format!("integer literal too large: {text}")),
    }
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::{
        ParseError, Token, TokenLexer, TokenValue, parse_int_literal,
        parse_u64_literal,
    };
    use crate::parse::SrcLoc;

    fn token(line: u32, column: usize, value: TokenValue) -> Token {
        Token { start: SrcLoc { line, column }, value }
    }

    fn error(line: u32, column: usize, message: &str) -> ParseError {
        ParseError {
            location: SrcLoc { line, column },
            message: message.to_string(),
        }
    }

    fn read_all(input: &[u8]) -> Vec<Token> {
        TokenLexer::new(input, 1).collect::<Result<_, _>>().unwrap()
    }

    fn expect_error(input: &[u8]) -> ParseError {
        for result in TokenLexer::new(input, 1) {
            if let Err(error) = result {
                return error;
            }
        }
        panic!("no error occurred");
    }

    #[test]
    fn empty_input() {
        assert_eq!(read_all(b""), vec![]);
        assert_eq!(read_all(b" \t\r"), vec![]);
    }

    #[test]
    fn literals() {
        assert_eq!(
            read_all(b"12345 0x1F 0XaB 4294967295"),
            vec![
                token(1, 0, TokenValue::IntLiteral(12345)),
                token(1, 6, TokenValue::IntLiteral(0x1f)),
                token(1, 11, TokenValue::IntLiteral(0xab)),
                token(1, 16, TokenValue::IntLiteral(u32::MAX)),
            ]
        );
    }

    #[test]
    fn csv_row() {
        assert_eq!(
            read_all(b"W,\"0x28\",,2,t\r\n"),
            vec![
                token(1, 0, TokenValue::Word("W".to_string())),
                token(1, 1, TokenValue::Comma),
                token(1, 2, TokenValue::Quote),
                token(1, 3, TokenValue::IntLiteral(0x28)),
                token(1, 7, TokenValue::Quote),
                token(1, 8, TokenValue::Comma),
                token(1, 9, TokenValue::Comma),
                token(1, 10, TokenValue::IntLiteral(2)),
                token(1, 11, TokenValue::Comma),
                token(1, 12, TokenValue::Word("t".to_string())),
                token(1, 14, TokenValue::Linebreak),
            ]
        );
    }

    #[test]
    fn lines_are_counted() {
        let tokens: Vec<Token> =
            TokenLexer::new(b"1\n\n  2\n", 5).map(Result::unwrap).collect();
        assert_eq!(
            tokens,
            vec![
                token(5, 0, TokenValue::IntLiteral(1)),
                token(5, 1, TokenValue::Linebreak),
                token(6, 0, TokenValue::Linebreak),
                token(7, 2, TokenValue::IntLiteral(2)),
                token(7, 3, TokenValue::Linebreak),
            ]
        );
    }

    #[test]
    fn overflow() {
        assert_eq!(
            expect_error(b"1, 4294967296"),
            error(1, 3, "integer literal too large: 4294967296")
        );
        assert_eq!(
            expect_error(b"0x100000000"),
            error(1, 0, "integer literal too large: 0x100000000")
        );
    }

    #[test]
    fn invalid_token() {
        assert_eq!(
            expect_error(b" `foo\n"),
            error(1, 1, "invalid character: `")
        );
    }

    #[test]
    fn int_literal() {
        assert_eq!(parse_int_literal("42"), Ok(42));
        assert_eq!(parse_int_literal(" 0x100000\n"), Ok(0x100000));
        assert_eq!(
            parse_int_literal("12abc").unwrap_err().message,
            "invalid number: \"12abc\""
        );
        assert!(parse_int_literal("").is_err());
        assert!(parse_int_literal("1 2").is_err());
        assert!(parse_int_literal("-1").is_err());
    }

    #[test]
    fn u64_literal() {
        assert_eq!(parse_u64_literal("100000"), Ok(100000));
        assert_eq!(parse_u64_literal(" 0x100000000 "), Ok(0x1_0000_0000));
        assert_eq!(parse_u64_literal("0XFF"), Ok(255));
        assert_eq!(
            parse_u64_literal("0x10000000000000000").unwrap_err().message,
            "integer literal too large: 0x10000000000000000"
        );
        assert_eq!(
            parse_u64_literal("+5").unwrap_err().message,
            "invalid number: \"+5\""
        );
        assert!(parse_u64_literal("0x").is_err());
        assert!(parse_u64_literal("").is_err());
        assert!(parse_u64_literal("1 2").is_err());
    }
}

//===========================================================================//
