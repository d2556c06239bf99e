//! Textual form of the symbolic items: a flat listing of label definitions
//! and instruction lines, round-trippable through [`parse`] and [`render`].

use std::fmt;

use crate::ir::{Item, Operand};

mod lexer;
mod parser;

pub use lexer::{BadLiteral, Lexer};
pub use parser::{ListError, Parser, Token};

/// Parse listing source into items, in source order.
pub fn parse(source: &str) -> Result<Vec<Item>, ListError> {
    use lexgen_util::LexerErrorKind;

    let l = Lexer::new(source);
    let mut p = Parser::new(Vec::new());

    for tok in l {
        match tok {
            Ok((_, tok, _)) => match p.parse(tok) {
                Ok(()) => {}
                Err(err) => return Err(err),
            },

            Err(err) => match err.kind {
                LexerErrorKind::InvalidToken => return Err(ListError::LexError(err.location)),

                LexerErrorKind::Custom(BadLiteral::NumberOverflow) => {
                    return Err(ListError::IntOutOfRange)
                }

                LexerErrorKind::Custom(BadLiteral::NonAsciiEscape(byte)) => {
                    return Err(ListError::NonAsciiEscape(byte))
                }
            },
        }
    }

    match p.end_of_input() {
        Ok((_, items)) => Ok(items),
        Err(err) => Err(err),
    }
}

/// Render items back to listing source. Instructions are indented one level
/// under the labels that precede them.
pub fn render(items: &[Item]) -> String {
    use std::fmt::Write;

    let mut out = String::new();

    for item in items {
        match item {
            Item::Ins { .. } => writeln!(out, "    {}", PrettyItem(item)).unwrap(),
            _ => writeln!(out, "{}", PrettyItem(item)).unwrap(),
        }
    }

    out
}

#[derive(Debug)]
pub struct PrettyItem<'a>(pub &'a Item);

impl<'a> fmt::Display for PrettyItem<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Item::Define(name) => write!(f, "{name}:"),
            Item::DefineAt(name, offset) => write!(f, "{name} = 0x{offset:x}"),

            Item::Ins { mnemonic, operands } => {
                write!(f, "{mnemonic}(")?;

                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }

                    PrettyOperand(operand).fmt(f)?;
                }

                write!(f, ")")
            }
        }
    }
}

#[derive(Debug)]
pub struct PrettyOperand<'a>(pub &'a Operand);

impl<'a> fmt::Display for PrettyOperand<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Operand::Uint(v) => write!(f, "0x{v:x}"),
            Operand::Int(v) => write!(f, "{v}"),
            Operand::Label(name) => write!(f, "{name}"),

            Operand::Bytes(bytes) => {
                write!(f, "[")?;

                for (i, byte) in bytes.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }

                    write!(f, "0x{byte:02x}")?;
                }

                write!(f, "]")
            }

            Operand::Text(text) => {
                write!(f, "\"")?;

                for c in text.chars() {
                    match c {
                        '\\' => write!(f, "\\\\")?,
                        '"' => write!(f, "\\\"")?,
                        '\n' => write!(f, "\\n")?,
                        '\r' => write!(f, "\\r")?,
                        '\t' => write!(f, "\\t")?,
                        c if (c as u32) < 0x20 => write!(f, "\\x{:02x}", c as u32)?,
                        c => write!(f, "{c}")?,
                    }
                }

                write!(f, "\"")
            }
        }
    }
}
