use pomelo::pomelo;
use thiserror::Error;

use crate::ir::{Item, Operand};

#[derive(Debug, Error)]
pub enum ListError {
    #[error("Lexer Error")]
    LexError(lexgen_util::Loc),

    #[error("Syntax error")]
    SyntaxError,

    #[error("Fatal syntax error")]
    ParseFail,

    #[error("Fatal parse error: stack overflow")]
    ParseStackOverflow,

    #[error("byte literal 0x{0:x} does not fit in one byte")]
    ByteOutOfRange(u64),

    #[error("integer literal out of range")]
    IntOutOfRange,

    #[error("string escape \\x{0:02x} is not ASCII; raw bytes go in a byte list")]
    NonAsciiEscape(u8),
}

pomelo! {
    %include { use super::*; }

    %extra_argument Vec<Item>;

    // token types

    %type Name String;
    %type Dec i64;
    %type Hex u64;
    %type Str String;

    // errors

    %error ListError;

    %syntax_error { Err(ListError::SyntaxError) }

    %parse_fail { ListError::ParseFail }
    %stack_overflow { ListError::ParseStackOverflow }

    // grammar

    program ::= lines;

    lines ::= ;
    lines ::= lines line;

    line ::= Name(n) Colon { extra.push(Item::Define(n)); };

    line ::= Name(n) Equal Hex(offset) { extra.push(Item::DefineAt(n, offset)); };

    line ::= Name(n) Equal Dec(offset) {
        // decimal literals lex without a sign, so this cannot be negative
        extra.push(Item::DefineAt(n, offset as u64));
    };

    line ::= Name(n) LParen RParen {
        extra.push(Item::Ins { mnemonic: n, operands: Vec::new() });
    };

    line ::= Name(n) LParen args(operands) RParen {
        extra.push(Item::Ins { mnemonic: n, operands });
    };

    %type args Vec<Operand>;
    args ::= arg(a) { vec![a] };
    args ::= args(mut v) Comma arg(a) { v.push(a); v };

    %type arg Operand;
    arg ::= Hex(v) { Operand::Uint(v) };
    arg ::= Dec(v) { Operand::Int(v) };
    arg ::= Minus Dec(v) { Operand::Int(-v) };

    arg ::= Minus Hex(v) {
        match i64::try_from(v) {
            Ok(v) => Operand::Int(-v),
            Err(_) => return Err(ListError::IntOutOfRange),
        }
    };

    arg ::= Name(n) { Operand::Label(n) };
    arg ::= Str(s) { Operand::Text(s) };
    arg ::= LBracket RBracket { Operand::Bytes(Vec::new()) };
    arg ::= LBracket bytes(b) RBracket { Operand::Bytes(b) };

    %type bytes Vec<u8>;
    bytes ::= byte(b) { vec![b] };
    bytes ::= bytes(mut v) Comma byte(b) { v.push(b); v };

    %type byte u8;
    byte ::= Hex(v) {
        match u8::try_from(v) {
            Ok(b) => b,
            Err(_) => return Err(ListError::ByteOutOfRange(v)),
        }
    };
}

pub use parser::*;
