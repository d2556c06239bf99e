//! Symbolic script form shared by the assembler, disassembler and listing
//! layers.

/// A single operand, as authored or as recovered by the disassembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    /// Unsigned integer, rendered as hexadecimal.
    Uint(u64),

    /// Signed integer, rendered as decimal.
    Int(i64),

    /// Reference to a named program point.
    Label(String),

    /// Verbatim bytes: a fixed-width raw field, or the payload tail that
    /// follows the text's first NUL byte.
    Bytes(Vec<u8>),

    /// Text payload, transcoded with the schema table's encoding.
    Text(String),
}

/// One element of a symbolic script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    /// Define a label at the current stream position. Emits no bytes.
    Define(String),

    /// Define a label at an explicit byte offset. Produced by relaxed
    /// disassembly for jump targets that matched no instruction.
    DefineAt(String, u64),

    /// A single instruction.
    Ins {
        mnemonic: String,
        operands: Vec<Operand>,
    },
}

/// Conventional name for the label at a given byte offset. The naming scheme
/// carries no meaning of its own; any unique names round-trip the same way.
pub fn offset_label(offset: u64) -> String {
    format!("label_0x{offset:x}")
}
