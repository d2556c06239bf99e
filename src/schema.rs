use std::collections::{BTreeMap, HashMap};

use encoding_rs::Encoding;

use crate::field::FieldType;

/// Shape of one instruction: its mnemonic and its ordered field list.
///
/// Schemas are static configuration data, so malformed ones (duplicate
/// string-length fields, zero or oversized integer widths) are programmer
/// errors and assert at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsSchema {
    mnemonic: String,
    fields: Vec<FieldType>,
}

impl InsSchema {
    pub fn new(mnemonic: impl Into<String>) -> Self {
        Self {
            mnemonic: mnemonic.into(),
            fields: Vec::new(),
        }
    }

    pub fn uint(self, width: u8) -> Self {
        self.field(FieldType::Uint(width))
    }

    pub fn int(self, width: u8) -> Self {
        self.field(FieldType::Int(width))
    }

    pub fn offset(self, width: u8) -> Self {
        self.field(FieldType::Offset(width))
    }

    pub fn strlen(self, width: u8) -> Self {
        self.field(FieldType::StrLen(width))
    }

    pub fn raw(self, width: u8) -> Self {
        self.field(FieldType::Raw(width))
    }

    fn field(mut self, field: FieldType) -> Self {
        match field {
            FieldType::Raw(w) => {
                assert!(w >= 1, "'{}': raw field must have a width", self.mnemonic)
            }

            _ => assert!(
                (1..=8).contains(&(field.width() as u8)),
                "'{}': integer fields are 1 to 8 bytes wide",
                self.mnemonic
            ),
        }

        if let FieldType::StrLen(_) = field {
            assert!(
                !self.has_strlen(),
                "'{}': at most one string length field per schema",
                self.mnemonic
            );
        }

        self.fields.push(field);
        self
    }

    pub fn mnemonic(&self) -> &str {
        &self.mnemonic
    }

    pub fn fields(&self) -> &[FieldType] {
        &self.fields
    }

    pub fn has_strlen(&self) -> bool {
        self.fields
            .iter()
            .any(|f| matches!(f, FieldType::StrLen(_)))
    }

    /// Instruction length without its payload: the 2-byte header plus every
    /// fixed field.
    pub fn fixed_len(&self) -> usize {
        2 + self.fields.iter().map(|f| f.width()).sum::<usize>()
    }
}

/// One engine build's instruction set: opcode -> schema, mnemonic -> opcode,
/// and the text encoding its payloads use.
///
/// Immutable once built; share it by reference between any number of
/// assemblers and disassemblers.
pub struct SchemaTable {
    encoding: &'static Encoding,
    by_opcode: BTreeMap<u8, InsSchema>,
    by_mnemonic: HashMap<String, u8>,
}

impl SchemaTable {
    pub fn new(encoding: &'static Encoding) -> Self {
        Self {
            encoding,
            by_opcode: BTreeMap::new(),
            by_mnemonic: HashMap::new(),
        }
    }

    /// Register a schema. Opcodes and mnemonics must be unique within one
    /// table.
    pub fn define(&mut self, opcode: u8, schema: InsSchema) -> &mut Self {
        assert!(
            !self.by_opcode.contains_key(&opcode),
            "opcode 0x{opcode:02x} is defined twice"
        );
        assert!(
            !self.by_mnemonic.contains_key(schema.mnemonic()),
            "mnemonic '{}' is defined twice",
            schema.mnemonic()
        );

        self.by_mnemonic.insert(schema.mnemonic.clone(), opcode);
        self.by_opcode.insert(opcode, schema);
        self
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    pub fn schema(&self, opcode: u8) -> Option<&InsSchema> {
        self.by_opcode.get(&opcode)
    }

    pub fn lookup(&self, mnemonic: &str) -> Option<(u8, &InsSchema)> {
        let opcode = *self.by_mnemonic.get(mnemonic)?;
        Some((opcode, &self.by_opcode[&opcode]))
    }

    pub fn schemas(&self) -> impl Iterator<Item = (u8, &InsSchema)> {
        self.by_opcode.iter().map(|(op, schema)| (*op, schema))
    }

    /// Encode text with this table's encoding. `None` if any character has
    /// no representation (never silently substituted).
    pub fn encode_text(&self, text: &str) -> Option<Vec<u8>> {
        let (bytes, _, had_errors) = self.encoding.encode(text);

        if had_errors {
            None
        } else {
            Some(bytes.into_owned())
        }
    }

    /// Decode text with this table's encoding. `None` on invalid sequences.
    pub fn decode_text(&self, bytes: &[u8]) -> Option<String> {
        let (text, had_errors) = self.encoding.decode_without_bom_handling(bytes);

        if had_errors {
            None
        } else {
            Some(text.into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_shape() {
        let schema = InsSchema::new("sel_add").strlen(2).offset(4);

        assert_eq!(schema.mnemonic(), "sel_add");
        assert_eq!(schema.fixed_len(), 8);
        assert!(schema.has_strlen());
    }

    #[test]
    #[should_panic]
    fn test_double_strlen_rejected() {
        let _ = InsSchema::new("bad").strlen(1).strlen(1);
    }

    #[test]
    #[should_panic]
    fn test_duplicate_mnemonic_rejected() {
        let mut table = SchemaTable::new(encoding_rs::SHIFT_JIS);
        table
            .define(0x00, InsSchema::new("jmp").uint(2).offset(4))
            .define(0x01, InsSchema::new("jmp").uint(2).offset(4));
    }

    #[test]
    fn test_lookup_both_ways() {
        let mut table = SchemaTable::new(encoding_rs::SHIFT_JIS);
        table.define(0x04, InsSchema::new("val_set").uint(2).int(4));

        let (opcode, schema) = table.lookup("val_set").unwrap();
        assert_eq!(opcode, 0x04);
        assert_eq!(schema.fixed_len(), 8);

        assert_eq!(table.schema(0x04).unwrap().mnemonic(), "val_set");
        assert!(table.schema(0x05).is_none());
        assert!(table.lookup("val_get").is_none());
    }

    #[test]
    fn test_text_round_trip() {
        let table = SchemaTable::new(encoding_rs::SHIFT_JIS);

        let bytes = table.encode_text("最初から見る").unwrap();
        assert_eq!(table.decode_text(&bytes).unwrap(), "最初から見る");

        // a lead byte with no trail byte is not a valid Shift-JIS sequence
        assert!(table.decode_text(&[0x81]).is_none());
    }
}
