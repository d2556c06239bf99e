use super::parser::Token;

use lexgen::lexer;

/// A literal that lexed fine but cannot carry its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadLiteral {
    /// Integer literal overflows its carrier type.
    NumberOverflow,

    /// `\xNN` escape past the ASCII range. Text operands hold characters;
    /// raw bytes go in a byte list.
    NonAsciiEscape(u8),
}

#[derive(Debug, Default)]
pub struct LexerState {
    /// buffer for building string literals
    string_buf: String,
}

lexer! {
    pub Lexer(LexerState) -> Token;

    type Error = BadLiteral;

    let dec_digit = ['0'-'9'];
    let hex_digit = $dec_digit | ['a'-'f' 'A'-'F'];

    rule Init {
        /* ignore whitespace */
        $$ascii_whitespace,

        /* punctuation */
        "(" = Token::LParen,
        ")" = Token::RParen,
        "[" = Token::LBracket,
        "]" = Token::RBracket,
        "," = Token::Comma,
        ":" = Token::Colon,
        "=" = Token::Equal,
        "-" = Token::Minus,

        /* names */

        let name_head = ['a'-'z' 'A'-'Z' '_'];
        let name_tail = $name_head | $dec_digit;

        $name_head $name_tail * => |lexer| lexer.return_(Token::Name(String::from(lexer.match_()))),

        /* integer literals */

        $dec_digit + =? |lexer| {
            match i64::from_str_radix(lexer.match_(), 10) {
                Ok(v) => lexer.return_(Ok(Token::Dec(v))),
                Err(_) => lexer.return_(Err(BadLiteral::NumberOverflow)),
            }
        },

        "0x" $hex_digit + =? |lexer| {
            match u64::from_str_radix(&lexer.match_()[2..], 16) {
                Ok(v) => lexer.return_(Ok(Token::Hex(v))),
                Err(_) => lexer.return_(Err(BadLiteral::NumberOverflow)),
            }
        },

        /* string literals */

        '"' => |lexer| {
            lexer.switch(LexerRule::String)
        },

        /* comments */
        "//" => |lexer| lexer.switch(LexerRule::LineComment),
        "/*" => |lexer| lexer.switch(LexerRule::MultComment),
        "#" => |lexer| lexer.switch(LexerRule::LineComment),
    }

    rule LineComment {
        (_ # '\n') * ('\n' | $) => |lexer| {
            lexer.reset_match();
            lexer.switch(LexerRule::Init)
        },
    }

    rule MultComment {
        "*/" => |lexer| {
            lexer.reset_match();
            lexer.switch(LexerRule::Init)
        },

        _ => |lexer| lexer.continue_(),
    }

    rule String {
        '"' => |lexer| {
            use std::mem;
            let text = mem::take(&mut lexer.state().string_buf);
            lexer.switch_and_return(LexerRule::Init, Token::Str(text))
        },

        "\\n" => |lexer| {
            lexer.state().string_buf.push('\n');
            lexer.continue_()
        },

        "\\r" => |lexer| {
            lexer.state().string_buf.push('\r');
            lexer.continue_()
        },

        "\\t" => |lexer| {
            lexer.state().string_buf.push('\t');
            lexer.continue_()
        },

        "\\\\" => |lexer| {
            lexer.state().string_buf.push('\\');
            lexer.continue_()
        },

        "\\\"" => |lexer| {
            lexer.state().string_buf.push('"');
            lexer.continue_()
        },

        "\\x" $hex_digit $hex_digit =? |lexer| {
            let m = lexer.match_();
            let byte = u8::from_str_radix(&m[m.len() - 2..], 16).unwrap();

            if byte < 0x80 {
                lexer.state().string_buf.push(char::from(byte));
                lexer.continue_()
            } else {
                lexer.return_(Err(BadLiteral::NonAsciiEscape(byte)))
            }
        },

        _ => |lexer| {
            let c = lexer.match_().chars().next_back().unwrap();
            lexer.state().string_buf.push(c);
            lexer.continue_()
        },
    }
}
