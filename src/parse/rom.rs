use super::atom::{int_literal, lex_lines};
use super::types::ParseError;
use chumsky::Parser;

//===========================================================================//

/// Parses a ROM content file: one 32-bit word per line, in decimal or
/// `0x`-prefixed hexadecimal.  Blank lines are ignored.  It is an error for
/// the file to hold more words than fit in `rom_size` bytes.
pub fn parse_rom_content(
    source: &str,
    rom_size: u32,
) -> Result<Vec<u32>, ParseError> {
    let capacity = (rom_size / 4) as usize;
    let mut words = Vec::new();
    for line in lex_lines(source, 1)? {
        if line.is_blank() {
            continue;
        }
        let word = int_literal().map(|(word, _)| word);
        let word = line.parse(word, "ROM word")?;
        if words.len() == capacity {
            let message = format!(
                "ROM content exceeds the ROM size of {rom_size} bytes"
            );
            return Err(ParseError::new(line.tokens[0].start, message));
        }
        words.push(word);
    }
    log::debug!("loaded {} ROM words", words.len());
    Ok(words)
}

//===========================================================================//


//===========================================================================//
