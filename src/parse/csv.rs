//! Parsing for request files: CSV with a header row, then one request per
//! row in the form `type,address,data,user,wide`.

use super::atom::{PError, field, int_literal, lex_lines, symbol, word};
use super::lex::{Token, TokenValue};
use super::types::{ParseError, SrcLoc};
use crate::bus::{AccessKind, MemoryRequest, Width};
use chumsky::{self, Parser};

//===========================================================================//

type Located<T> = (T, SrcLoc);

/// The fields of a single request row, before validation.
#[derive(Debug)]
struct RowAst {
    kind: Located<String>,
    addr: Located<u32>,
    data: Option<Located<u32>>,
    user: Located<u32>,
    wide: Located<String>,
}

impl RowAst {
    fn parser<'a>() -> impl Parser<'a, &'a [Token], RowAst, PError<'a>> {
        let comma = || symbol(TokenValue::Comma);
        field(word())
            .then_ignore(comma())
            .then(field(int_literal()))
            .then_ignore(comma())
            .then(field(int_literal().or_not()))
            .then_ignore(comma())
            .then(field(int_literal()))
            .then_ignore(comma())
            .then(field(word()))
            .map(|((((kind, addr), data), user), wide)| RowAst {
                kind,
                addr,
                data,
                user,
                wide,
            })
    }

    fn into_request(self) -> Result<MemoryRequest, ParseError> {
        let (kind, kind_loc) = self.kind;
        let kind = match kind.as_str() {
            "R" | "r" => AccessKind::Read,
            "W" | "w" => AccessKind::Write,
            _ => return Err(invalid(kind_loc, "request type", &kind)),
        };
        let (wide, wide_loc) = self.wide;
        let width = match wide.as_str() {
            "T" | "t" => Width::Wide,
            "F" | "f" => Width::Narrow,
            _ => return Err(invalid(wide_loc, "width flag", &wide)),
        };
        let (user, user_loc) = self.user;
        let user = u8::try_from(user).map_err(|_| {
            let message = format!("user id {user} is out of range 0-255");
            ParseError::new(user_loc, message)
        })?;
        let (addr, _) = self.addr;
        let data = match (kind, self.data) {
            (AccessKind::Read, None) => 0,
            (AccessKind::Read, Some((_, loc))) => {
                let message = "read request must not have data".to_string();
                return Err(ParseError::new(loc, message));
            }
            (AccessKind::Write, None) => {
                let message = "write request needs data".to_string();
                return Err(ParseError::new(kind_loc, message));
            }
            (AccessKind::Write, Some((data, loc))) => {
                if width == Width::Narrow && data > 0xff {
                    let message =
                        format!("data 0x{data:x} does not fit in one byte");
                    return Err(ParseError::new(loc, message));
                }
                data
            }
        };
        Ok(MemoryRequest { kind, addr, data, width, user })
    }
}

fn invalid(location: SrcLoc, what: &str, text: &str) -> ParseError {
    ParseError::new(location, format!("invalid {what}: {text:?}"))
}

//===========================================================================//

/// Parses the contents of a request file.  The first line is a header and
/// is ignored, as are blank lines.  Any malformed row fails the whole file.
pub fn parse_requests(source: &str) -> Result<Vec<MemoryRequest>, ParseError> {
    let Some((_header, body)) = source.split_once('\n') else {
        if source.trim().is_empty() {
            let message = "missing header row".to_string();
            return Err(ParseError::new(SrcLoc::line_start(1), message));
        }
        return Ok(Vec::new());
    };
    let mut requests = Vec::new();
    for line in lex_lines(body, 2)? {
        if line.is_blank() {
            continue;
        }
        let row = line.parse(RowAst::parser(), "request row")?;
        let request = row.into_request()?;
        log::trace!("line {}: {request}", line.number);
        requests.push(request);
    }
    Ok(requests)
}

//===========================================================================//

#[cfg(test)]
mod tests {
    use super::parse_requests;
    use crate::bus::{MemoryRequest, Width};
    use crate::parse::SrcLoc;

    const HEADER: &str = "type,address,data,user,wide\n";

    fn parse_rows(rows: &str) -> Vec<MemoryRequest> {
        parse_requests(&format!("{HEADER}{rows}")).unwrap()
    }

    fn row_error(rows: &str) -> (u32, String) {
        let error = parse_requests(&format!("{HEADER}{rows}")).unwrap_err();
        (error.location.line, error.message)
    }

    #[test]
    fn header_only() {
        assert_eq!(parse_requests(HEADER).unwrap(), vec![]);
        assert_eq!(parse_requests("type,address").unwrap(), vec![]);
        let error = parse_requests("").unwrap_err();
        assert_eq!(error.location, SrcLoc::line_start(1));
    }

    #[test]
    fn header_is_not_lexed() {
        assert_eq!(parse_rows("").len(), 0);
        let source = "Type; Addr (hex) & co.\nR,0,,0,T\n";
        assert_eq!(parse_requests(source).unwrap().len(), 1);
    }

    #[test]
    fn reads_and_writes() {
        assert_eq!(
            parse_rows("R,0x1F,,3,F\nw,40,0xA5A5A5A5,2,t\nr,1234,,255,f\n"),
            vec![
                MemoryRequest::read(0x1f, Width::Narrow, 3),
                MemoryRequest::write(40, 0xa5a5a5a5, Width::Wide, 2),
                MemoryRequest::read(1234, Width::Narrow, 255),
            ]
        );
    }

    #[test]
    fn quoted_fields_and_blank_lines() {
        let rows = "\n\"W\",\"0x28\",\"255\",\"0\",\"F\"\r\n\n \
                    R, 4 ,\"\", 1, T";
        assert_eq!(
            parse_rows(rows),
            vec![
                MemoryRequest::write(0x28, 0xff, Width::Narrow, 0),
                MemoryRequest::read(4, Width::Wide, 1),
            ]
        );
    }

    #[test]
    fn invalid_type_and_width() {
        assert_eq!(
            row_error("R,0,,0,T\nX,0,,0,T\n"),
            (3, "invalid request type: \"X\"".to_string())
        );
        assert_eq!(
            row_error("Read,0,,0,T\n"),
            (2, "invalid request type: \"Read\"".to_string())
        );
        assert_eq!(
            row_error("R,0,,0,yes\n"),
            (2, "invalid width flag: \"yes\"".to_string())
        );
    }

    #[test]
    fn data_rules() {
        assert_eq!(
            row_error("W,64,,1,T\n"),
            (2, "write request needs data".to_string())
        );
        assert_eq!(
            row_error("R,64,5,1,T\n"),
            (2, "read request must not have data".to_string())
        );
        assert_eq!(
            row_error("W,64,0x100,1,F\n"),
            (2, "data 0x100 does not fit in one byte".to_string())
        );
        assert_eq!(parse_rows("W,64,0x100,1,T\n").len(), 1);
    }

    #[test]
    fn user_range() {
        assert_eq!(
            row_error("R,64,,256,T\n"),
            (2, "user id 256 is out of range 0-255".to_string())
        );
    }

    #[test]
    fn wrong_field_count() {
        assert_eq!(
            row_error("R,64,,1\n"),
            (2, "malformed request row: unexpected end of line".to_string())
        );
        assert_eq!(
            row_error("R,64,,1,T,7\n"),
            (2, "malformed request row: unexpected comma".to_string())
        );
    }

    #[test]
    fn bad_numbers() {
        assert_eq!(
            row_error("R,0x100000000,,1,T\n"),
            (2, "integer literal too large: 0x100000000".to_string())
        );
        assert_eq!(
            row_error("R,-4,,1,T\n"),
            (2, "invalid character: -".to_string())
        );
    }
}

//===========================================================================//
