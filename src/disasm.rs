use std::collections::BTreeSet;

use thiserror::Error;

use crate::field::{self, FieldType};
use crate::ir::{offset_label, Item, Operand};
use crate::schema::SchemaTable;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DisasmError {
    #[error("unknown opcode 0x{opcode:02x} at offset 0x{offset:x}")]
    UnknownOpcode { opcode: u8, offset: usize },

    #[error("stream ends mid-instruction at offset 0x{offset:x}")]
    TruncatedStream { offset: usize },

    #[error("payload at offset 0x{offset:x} declares {declared} byte(s) but only {available} remain")]
    MalformedPayload {
        offset: usize,
        declared: usize,
        available: usize,
    },

    #[error("text at offset 0x{offset:x} is not valid in the table's encoding")]
    MalformedText { offset: usize },

    #[error("jump target(s) {0:#x?} do not start an instruction")]
    DanglingJumpTarget(Vec<u64>),
}

/// What to do with a jump target that lines up with no instruction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LabelPolicy {
    /// Fail with [`DisasmError::DanglingJumpTarget`].
    #[default]
    Strict,

    /// Append a definition pinning each orphan label to its raw value.
    Synthesize,
}

/// Receives every decoded opcode, in stream order.
pub trait OpcodeObserver {
    fn record(&mut self, opcode: u8);
}

/// Per-opcode hit counter.
#[derive(Clone)]
pub struct OpcodeHistogram {
    counts: [u64; 256],
}

impl OpcodeHistogram {
    pub fn new() -> Self {
        Self { counts: [0; 256] }
    }

    pub fn count(&self, opcode: u8) -> u64 {
        self.counts[opcode as usize]
    }

    /// Opcodes seen at least once, with their hit counts.
    pub fn seen(&self) -> impl Iterator<Item = (u8, u64)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &count)| count > 0)
            .map(|(opcode, &count)| (opcode as u8, count))
    }
}

impl Default for OpcodeHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl OpcodeObserver for OpcodeHistogram {
    fn record(&mut self, opcode: u8) {
        self.counts[opcode as usize] += 1;
    }
}

/// Decodes a byte stream back into the symbolic form the assembler consumes.
///
/// A single forward pass over the buffer, driven entirely by the schema
/// table: the declared length byte is read but never trusted for navigation,
/// so every decoded instruction's shape has actually been checked against its
/// schema.
pub struct Disassembler<'a> {
    table: &'a SchemaTable,
    policy: LabelPolicy,
    observer: Option<&'a mut dyn OpcodeObserver>,
}

impl<'a> Disassembler<'a> {
    pub fn new(table: &'a SchemaTable) -> Self {
        Self {
            table,
            policy: LabelPolicy::Strict,
            observer: None,
        }
    }

    pub fn with_policy(mut self, policy: LabelPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: &'a mut dyn OpcodeObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn run(mut self, data: &[u8]) -> Result<Vec<Item>, DisasmError> {
        let mut decoded = Vec::new();
        let mut targets = BTreeSet::new();
        let mut pos = 0usize;

        while pos < data.len() {
            let at = pos;

            if data.len() - pos < 2 {
                return Err(DisasmError::TruncatedStream { offset: at });
            }

            let opcode = data[pos];
            pos += 2;

            let schema = self
                .table
                .schema(opcode)
                .ok_or(DisasmError::UnknownOpcode { opcode, offset: at })?;

            if let Some(observer) = &mut self.observer {
                observer.record(opcode);
            }

            let mut operands = Vec::with_capacity(schema.fields().len());
            let mut payload_len = None;

            for f in schema.fields() {
                let width = f.width();

                if data.len() - pos < width {
                    return Err(DisasmError::TruncatedStream { offset: at });
                }

                let span = &data[pos..pos + width];
                pos += width;

                match f {
                    FieldType::Uint(_) => operands.push(Operand::Uint(field::decode_uint(span))),
                    FieldType::Int(_) => operands.push(Operand::Int(field::decode_int(span))),

                    FieldType::Offset(_) => {
                        let target = field::decode_uint(span);
                        targets.insert(target);
                        operands.push(Operand::Label(offset_label(target)));
                    }

                    FieldType::StrLen(_) => payload_len = Some(field::decode_uint(span) as usize),
                    FieldType::Raw(_) => operands.push(Operand::Bytes(span.to_vec())),
                }
            }

            if let Some(declared) = payload_len {
                let available = data.len() - pos;

                if available < declared {
                    return Err(DisasmError::MalformedPayload {
                        offset: at,
                        declared,
                        available,
                    });
                }

                let payload = &data[pos..pos + declared];
                pos += declared;

                // text up to the first NUL, opaque tail from the NUL onward
                let (text, tail) = match payload.iter().position(|&b| b == 0) {
                    Some(i) => (&payload[..i], Some(&payload[i..])),
                    None => (payload, None),
                };

                let text = self
                    .table
                    .decode_text(text)
                    .ok_or(DisasmError::MalformedText { offset: at })?;

                operands.push(Operand::Text(text));

                if let Some(tail) = tail {
                    operands.push(Operand::Bytes(tail.to_vec()));
                }
            }

            decoded.push((
                at,
                Item::Ins {
                    mnemonic: schema.mnemonic().to_string(),
                    operands,
                },
            ));
        }

        let mut items = Vec::with_capacity(decoded.len());

        for (offset, ins) in decoded {
            if targets.remove(&(offset as u64)) {
                items.push(Item::Define(offset_label(offset as u64)));
            }

            items.push(ins);
        }

        if !targets.is_empty() {
            match self.policy {
                LabelPolicy::Strict => {
                    return Err(DisasmError::DanglingJumpTarget(
                        targets.into_iter().collect(),
                    ))
                }

                LabelPolicy::Synthesize => {
                    for target in targets {
                        items.push(Item::DefineAt(offset_label(target), target));
                    }
                }
            }
        }

        Ok(items)
    }
}

/// Disassemble with the default strict policy and no observer.
pub fn disassemble(table: &SchemaTable, data: &[u8]) -> Result<Vec<Item>, DisasmError> {
    Disassembler::new(table).run(data)
}
