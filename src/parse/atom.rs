use super::lex::{Token, TokenLexer, TokenValue};
use super::types::{ParseError, SrcLoc};
use chumsky::{self, Parser};

//===========================================================================//

/// The error type used for `chumsky::Parser`s in this crate.
pub(crate) type PError<'a> =
    chumsky::extra::Err<chumsky::error::Rich<'a, Token>>;

//===========================================================================//

pub(crate) fn symbol<'a>(
    value: TokenValue,
) -> impl Parser<'a, &'a [Token], Token, PError<'a>> + Clone {
    let name = value.name();
    chumsky::prelude::any()
        .filter(move |token: &Token| token.value == value)
        .labelled(name)
}

pub(crate) fn int_literal<'a>()
-> impl Parser<'a, &'a [Token], (u32, SrcLoc), PError<'a>> + Clone {
    chumsky::select! {
        Token { value: TokenValue::IntLiteral(int), start } => (int, start),
    }
    .labelled("int literal")
}

pub(crate) fn word<'a>()
-> impl Parser<'a, &'a [Token], (String, SrcLoc), PError<'a>> + Clone {
    chumsky::select! {
        Token { value: TokenValue::Word(word), start } => (word, start),
    }
    .labelled("word")
}

/// Accepts `inner`, optionally surrounded by a pair of quotes.
pub(crate) fn field<'a, O, P>(
    inner: P,
) -> impl Parser<'a, &'a [Token], O, PError<'a>> + Clone
where
    P: Parser<'a, &'a [Token], O, PError<'a>> + Clone,
{
    inner
        .clone()
        .delimited_by(symbol(TokenValue::Quote), symbol(TokenValue::Quote))
        .or(inner)
}

//===========================================================================//

/// The tokens of one line of input, without the trailing linebreak.
pub(crate) struct Line {
    pub(crate) number: u32,
    pub(crate) tokens: Vec<Token>,
    end: SrcLoc,
}

impl Line {
    pub(crate) fn is_blank(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Runs `parser` over the whole line.  `what` names the kind of line
    /// expected, for error messages.
    pub(crate) fn parse<'a, O>(
        &'a self,
        parser: impl Parser<'a, &'a [Token], O, PError<'a>>,
        what: &str,
    ) -> Result<O, ParseError> {
        parser
            .then_ignore(chumsky::prelude::end())
            .parse(self.tokens.as_slice())
            .into_result()
            .map_err(|errors| {
                let error = errors.into_iter().next();
                let location = error
                    .as_ref()
                    .and_then(|error| self.tokens.get(error.span().start))
                    .map_or(self.end, |token| token.start);
                let found = match error.as_ref().and_then(|e| e.found()) {
                    Some(token) => token.value.to_string(),
                    None => "end of line".to_string(),
                };
                let message = format!("malformed {what}: unexpected {found}");
                ParseError::new(location, message)
            })
    }
}

/// Splits `input` into lines of tokens.  The first line of `input` is
/// numbered `first_line`.
pub(crate) fn lex_lines(
    input: &str,
    first_line: u32,
) -> Result<Vec<Line>, ParseError> {
    let mut lines = Vec::new();
    let mut tokens = Vec::new();
    let mut number = first_line;
    for token in TokenLexer::new(input.as_bytes(), first_line) {
        let token = token?;
        if token.value == TokenValue::Linebreak {
            let end = token.start;
            lines.push(Line { number, tokens, end });
            tokens = Vec::new();
            number += 1;
        } else {
            tokens.push(token);
        }
    }
    if !tokens.is_empty() {
        let column = input.rsplit('\n').next().map_or(0, str::len);
        let end = SrcLoc { line: number, column };
        lines.push(Line { number, tokens, end });
    }
    Ok(lines)
}

//===========================================================================//


//===========================================================================//
