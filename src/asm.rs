use thiserror::Error;

use crate::field::{self, FieldError, FieldType};
use crate::ir::{Item, Operand};
use crate::label::{LabelError, LabelId, LabelTable};
use crate::schema::SchemaTable;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AsmError {
    #[error("unknown mnemonic '{0}'")]
    UnknownMnemonic(String),

    #[error("'{mnemonic}': missing operand {index}")]
    MissingOperand { mnemonic: String, index: usize },

    #[error("'{mnemonic}': operand {index} should be {expected}")]
    OperandKind {
        mnemonic: String,
        index: usize,
        expected: &'static str,
    },

    #[error("'{mnemonic}': {got} operand(s) supplied, {used} used")]
    ExtraOperands {
        mnemonic: String,
        used: usize,
        got: usize,
    },

    #[error("'{mnemonic}': text cannot be represented in the table's encoding")]
    UnencodableText { mnemonic: String },

    #[error("'{mnemonic}': instruction is {length} bytes, more than the length byte can hold")]
    LengthOverflow { mnemonic: String, length: usize },

    #[error(transparent)]
    Field(#[from] FieldError),

    #[error(transparent)]
    Label(#[from] LabelError),
}

/// Assembles symbolic instructions into a relocatable byte stream.
///
/// One assembler builds one script: emit instructions and label definitions
/// in stream order, then call [`Assembler::finish`] to patch every label
/// reference and take the buffer. Any error poisons the whole assembly; the
/// assembler must be discarded, not resumed.
pub struct Assembler<'a> {
    table: &'a SchemaTable,
    buf: Vec<u8>,
    labels: LabelTable,
}

impl<'a> Assembler<'a> {
    pub fn new(table: &'a SchemaTable) -> Self {
        Self {
            table,
            buf: Vec::new(),
            labels: LabelTable::new(),
        }
    }

    /// Current length of the output buffer.
    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn label(&mut self, name: &str) -> LabelId {
        self.labels.get_or_create(name)
    }

    /// Record the current position as `id`'s offset. Emits no bytes.
    pub fn define(&mut self, id: LabelId) -> Result<(), AsmError> {
        let at = self.buf.len() as u64;
        Ok(self.labels.define(id, at)?)
    }

    /// Record an explicit offset for `id`, for labels that deliberately point
    /// outside the instruction sequence.
    pub fn define_at(&mut self, id: LabelId, offset: u64) -> Result<(), AsmError> {
        Ok(self.labels.define(id, offset)?)
    }

    /// Encode one instruction, returning its byte offset.
    ///
    /// Operands are consumed in schema field order. `Offset` fields take a
    /// label operand and record a patch site; a `StrLen` field takes no
    /// operand of its own, but makes the instruction expect a trailing text
    /// operand (and, optionally, a raw byte suffix after it) whose combined
    /// encoded length is back-filled into the reserved span.
    pub fn emit(&mut self, mnemonic: &str, operands: &[Operand]) -> Result<usize, AsmError> {
        let (opcode, schema) = self
            .table
            .lookup(mnemonic)
            .ok_or_else(|| AsmError::UnknownMnemonic(mnemonic.to_string()))?;

        let at = self.buf.len();
        self.buf.push(opcode);
        self.buf.push(0); // length, back-filled below

        let mut next = 0usize;
        let mut strlen_site = None;

        for field in schema.fields() {
            match *field {
                FieldType::Uint(width) => {
                    let value = match take(mnemonic, operands, &mut next)? {
                        Operand::Uint(v) => *v,
                        Operand::Int(v) if *v >= 0 => *v as u64,

                        Operand::Int(v) => {
                            return Err(FieldError::OutOfRange {
                                value: *v as i128,
                                width,
                            }
                            .into())
                        }

                        _ => return Err(kind(mnemonic, next, "an integer")),
                    };

                    field::encode_uint(&mut self.buf, width, value)?;
                }

                FieldType::Int(width) => {
                    let value = match take(mnemonic, operands, &mut next)? {
                        Operand::Int(v) => *v,

                        // hex literals are fine as long as they stay in the
                        // signed range; no silent wrapping. encode_int
                        // re-checks against the field width
                        Operand::Uint(v) => {
                            i64::try_from(*v).map_err(|_| FieldError::OutOfRange {
                                value: *v as i128,
                                width,
                            })?
                        }

                        _ => return Err(kind(mnemonic, next, "an integer")),
                    };

                    field::encode_int(&mut self.buf, width, value)?;
                }

                FieldType::Offset(width) => {
                    let name = match take(mnemonic, operands, &mut next)? {
                        Operand::Label(name) => name.clone(),
                        _ => return Err(kind(mnemonic, next, "a label")),
                    };

                    let id = self.labels.get_or_create(&name);
                    let site = self.buf.len();
                    self.labels.add_reference(id, site, width);
                    self.buf.extend(std::iter::repeat(0).take(width as usize));
                }

                FieldType::StrLen(width) => {
                    strlen_site = Some((self.buf.len(), width as usize));
                    self.buf.extend(std::iter::repeat(0).take(width as usize));
                }

                FieldType::Raw(width) => {
                    let bytes = match take(mnemonic, operands, &mut next)? {
                        Operand::Bytes(bytes) => bytes.clone(),
                        _ => return Err(kind(mnemonic, next, "a byte list")),
                    };

                    field::encode_raw(&mut self.buf, width, &bytes)?;
                }
            }
        }

        if let Some((site, width)) = strlen_site {
            let text = match take(mnemonic, operands, &mut next)? {
                Operand::Text(text) => text,
                _ => return Err(kind(mnemonic, next, "text")),
            };

            let mut payload = self
                .table
                .encode_text(text)
                .ok_or_else(|| AsmError::UnencodableText {
                    mnemonic: mnemonic.to_string(),
                })?;

            if next < operands.len() {
                match &operands[next] {
                    Operand::Bytes(tail) => {
                        payload.extend_from_slice(tail);
                        next += 1;
                    }

                    _ => return Err(kind(mnemonic, next + 1, "a byte list")),
                }
            }

            field::patch_uint(&mut self.buf[site..site + width], payload.len() as u64)?;
            self.buf.extend_from_slice(&payload);
        }

        if next != operands.len() {
            return Err(AsmError::ExtraOperands {
                mnemonic: mnemonic.to_string(),
                used: next,
                got: operands.len(),
            });
        }

        let length = self.buf.len() - at;

        if length > u8::MAX as usize {
            return Err(AsmError::LengthOverflow {
                mnemonic: mnemonic.to_string(),
                length,
            });
        }

        self.buf[at + 1] = length as u8;
        Ok(at)
    }

    /// Resolve every label reference and hand back the finished byte stream.
    pub fn finish(self) -> Result<Vec<u8>, AsmError> {
        let Self { mut buf, labels, .. } = self;
        labels.resolve_all(&mut buf)?;
        Ok(buf)
    }
}

fn take<'o>(
    mnemonic: &str,
    operands: &'o [Operand],
    next: &mut usize,
) -> Result<&'o Operand, AsmError> {
    let operand = operands.get(*next).ok_or_else(|| AsmError::MissingOperand {
        mnemonic: mnemonic.to_string(),
        index: *next,
    })?;

    *next += 1;
    Ok(operand)
}

fn kind(mnemonic: &str, next: usize, expected: &'static str) -> AsmError {
    AsmError::OperandKind {
        mnemonic: mnemonic.to_string(),
        index: next - 1,
        expected,
    }
}

/// Assemble a whole symbolic script.
pub fn assemble(table: &SchemaTable, items: &[Item]) -> Result<Vec<u8>, AsmError> {
    let mut asm = Assembler::new(table);

    for item in items {
        match item {
            Item::Define(name) => {
                let id = asm.label(name);
                asm.define(id)?;
            }

            Item::DefineAt(name, offset) => {
                let id = asm.label(name);
                asm.define_at(id, *offset)?;
            }

            Item::Ins { mnemonic, operands } => {
                asm.emit(mnemonic, operands)?;
            }
        }
    }

    asm.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::InsSchema;

    fn test_table() -> SchemaTable {
        let mut table = SchemaTable::new(encoding_rs::SHIFT_JIS);
        table
            .define(0x00, InsSchema::new("dlg_str").uint(1).strlen(1))
            .define(0x04, InsSchema::new("val_set").uint(2).int(4))
            .define(0x0D, InsSchema::new("jmp").uint(2).offset(4))
            .define(0x1D, InsSchema::new("sel_add").strlen(2).offset(4));
        table
    }

    #[test]
    fn test_set_value_wire_format() {
        let table = test_table();
        let mut asm = Assembler::new(&table);

        asm.emit("val_set", &[Operand::Uint(0x64), Operand::Int(-1)])
            .unwrap();

        assert_eq!(
            asm.finish().unwrap(),
            [0x04, 0x08, 0x64, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn test_forward_and_backward_jumps() {
        let table = test_table();
        let mut asm = Assembler::new(&table);

        let top = asm.label("top");
        asm.define(top).unwrap();
        asm.emit("jmp", &[Operand::Uint(0), Operand::Label("end".into())])
            .unwrap();
        asm.emit("jmp", &[Operand::Uint(0), Operand::Label("top".into())])
            .unwrap();
        let end = asm.label("end");
        asm.define(end).unwrap();

        let bytes = asm.finish().unwrap();
        // first jump lands past both instructions, second jump back at 0
        assert_eq!(&bytes[4..8], [0x10, 0, 0, 0]);
        assert_eq!(&bytes[12..16], [0x00, 0, 0, 0]);
    }

    #[test]
    fn test_undefined_label_fails_at_finish() {
        let table = test_table();
        let mut asm = Assembler::new(&table);

        asm.emit("jmp", &[Operand::Uint(0), Operand::Label("lost".into())])
            .unwrap();

        assert_eq!(
            asm.finish(),
            Err(AsmError::Label(LabelError::UndefinedLabel("lost".into())))
        );
    }

    #[test]
    fn test_double_definition() {
        let table = test_table();
        let mut asm = Assembler::new(&table);

        let id = asm.label("twice");
        asm.define(id).unwrap();

        assert_eq!(
            asm.define(id),
            Err(AsmError::Label(LabelError::DoubleDefinition("twice".into())))
        );
    }

    #[test]
    fn test_payload_with_tail() {
        let table = test_table();
        let mut asm = Assembler::new(&table);

        asm.emit(
            "dlg_str",
            &[
                Operand::Uint(0),
                Operand::Text("hi".into()),
                Operand::Bytes(vec![0x00, 0x01, 0x02]),
            ],
        )
        .unwrap();

        assert_eq!(
            asm.finish().unwrap(),
            [0x00, 0x09, 0x00, 0x05, b'h', b'i', 0x00, 0x01, 0x02]
        );
    }

    #[test]
    fn test_strlen_before_offset_field() {
        // the payload always trails the fixed fields, wherever the length
        // field sits in the schema
        let table = test_table();
        let mut asm = Assembler::new(&table);

        let id = asm.label("choice");
        asm.define(id).unwrap();
        asm.emit(
            "sel_add",
            &[Operand::Label("choice".into()), Operand::Text("ok".into())],
        )
        .unwrap();

        assert_eq!(
            asm.finish().unwrap(),
            [0x1D, 0x0A, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00, b'o', b'k']
        );
    }

    #[test]
    fn test_unknown_mnemonic() {
        let table = test_table();
        let mut asm = Assembler::new(&table);

        assert_eq!(
            asm.emit("val_get", &[]),
            Err(AsmError::UnknownMnemonic("val_get".into()))
        );
    }

    #[test]
    fn test_operand_shape_errors() {
        let table = test_table();

        let mut asm = Assembler::new(&table);
        assert_eq!(
            asm.emit("val_set", &[Operand::Uint(0)]),
            Err(AsmError::MissingOperand {
                mnemonic: "val_set".into(),
                index: 1
            })
        );

        let mut asm = Assembler::new(&table);
        assert_eq!(
            asm.emit("val_set", &[Operand::Text("x".into()), Operand::Int(0)]),
            Err(AsmError::OperandKind {
                mnemonic: "val_set".into(),
                index: 0,
                expected: "an integer"
            })
        );

        let mut asm = Assembler::new(&table);
        assert_eq!(
            asm.emit(
                "val_set",
                &[Operand::Uint(0), Operand::Int(0), Operand::Int(1)]
            ),
            Err(AsmError::ExtraOperands {
                mnemonic: "val_set".into(),
                used: 2,
                got: 3
            })
        );
    }

    #[test]
    fn test_range_errors() {
        let table = test_table();

        let mut asm = Assembler::new(&table);
        assert!(asm
            .emit("val_set", &[Operand::Uint(0x10000), Operand::Int(0)])
            .is_err());

        // negative value in an unsigned field
        let mut asm = Assembler::new(&table);
        assert!(asm
            .emit("val_set", &[Operand::Int(-1), Operand::Int(0)])
            .is_err());

        // hex literal past the signed range
        let mut asm = Assembler::new(&table);
        assert!(asm
            .emit("val_set", &[Operand::Uint(0), Operand::Uint(0x8000_0000)])
            .is_err());
    }

    #[test]
    fn test_uint_past_signed_range_in_full_width_field() {
        let mut table = SchemaTable::new(encoding_rs::SHIFT_JIS);
        table.define(0x0F, InsSchema::new("val_set_wide").int(8));

        // a hex literal past i64::MAX must not wrap to a negative value
        let mut asm = Assembler::new(&table);
        assert_eq!(
            asm.emit("val_set_wide", &[Operand::Uint(u64::MAX)]),
            Err(AsmError::Field(FieldError::OutOfRange {
                value: u64::MAX as i128,
                width: 8
            }))
        );

        let mut asm = Assembler::new(&table);
        asm.emit("val_set_wide", &[Operand::Uint(i64::MAX as u64)])
            .unwrap();
        assert_eq!(
            asm.finish().unwrap(),
            [0x0F, 0x0A, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x7F]
        );
    }

    #[test]
    fn test_length_overflow() {
        let table = test_table();
        let mut asm = Assembler::new(&table);

        let id = asm.label("choice");
        asm.define(id).unwrap();

        // two-byte length field holds the payload fine, but the instruction
        // itself outgrows its one-byte length header
        let long = "a".repeat(300);

        assert_eq!(
            asm.emit(
                "sel_add",
                &[Operand::Label("choice".into()), Operand::Text(long)]
            ),
            Err(AsmError::LengthOverflow {
                mnemonic: "sel_add".into(),
                length: 308
            })
        );
    }

    #[test]
    fn test_payload_too_long_for_length_field() {
        let table = test_table();
        let mut asm = Assembler::new(&table);

        // one-byte string length field cannot hold 300 bytes
        let long = "a".repeat(300);

        assert!(matches!(
            asm.emit("dlg_str", &[Operand::Uint(0), Operand::Text(long)]),
            Err(AsmError::Field(FieldError::OutOfRange { .. }))
        ));
    }

    #[test]
    fn test_emit_returns_instruction_offset() {
        let table = test_table();
        let mut asm = Assembler::new(&table);

        let a = asm
            .emit("val_set", &[Operand::Uint(0), Operand::Int(0)])
            .unwrap();
        let b = asm
            .emit("val_set", &[Operand::Uint(1), Operand::Int(1)])
            .unwrap();

        assert_eq!((a, b), (0, 8));
    }
}
