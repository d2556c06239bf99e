use std::collections::HashMap;

use thiserror::Error;

use crate::field::{self, FieldError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label '{0}' is defined more than once")]
    DoubleDefinition(String),

    #[error("label '{0}' is referenced but never defined")]
    UndefinedLabel(String),

    #[error(transparent)]
    Field(#[from] FieldError),
}

/// Handle to a label within one [`LabelTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelId(usize);

#[derive(Debug)]
struct Label {
    name: String,
    offset: Option<u64>,

    /// Every span waiting for this label's offset: (patch site, width).
    refs: Vec<(usize, u8)>,
}

/// Registry of named program points and the patch sites that refer to them.
///
/// A label comes into existence on its first reference or first definition,
/// whichever happens first. Referencing before definition (forward jump) and
/// after definition (backward jump) record identical patch entries; only
/// [`LabelTable::resolve_all`] tells them apart, and by then it no longer
/// matters.
#[derive(Debug, Default)]
pub struct LabelTable {
    by_name: HashMap<String, LabelId>,
    labels: Vec<Label>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look a label up by name, creating it undefined if it is new.
    pub fn get_or_create(&mut self, name: &str) -> LabelId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }

        let id = LabelId(self.labels.len());

        self.labels.push(Label {
            name: name.to_string(),
            offset: None,
            refs: Vec::new(),
        });

        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn name(&self, id: LabelId) -> &str {
        &self.labels[id.0].name
    }

    /// Fix the label's offset. Each label names a single program point, so a
    /// second definition is an error.
    pub fn define(&mut self, id: LabelId, offset: u64) -> Result<(), LabelError> {
        let label = &mut self.labels[id.0];

        if label.offset.is_some() {
            return Err(LabelError::DoubleDefinition(label.name.clone()));
        }

        label.offset = Some(offset);
        Ok(())
    }

    /// Record a pending patch at `patch_offset`, `width` bytes wide. Legal
    /// before or after the label is defined.
    pub fn add_reference(&mut self, id: LabelId, patch_offset: usize, width: u8) {
        self.labels[id.0].refs.push((patch_offset, width));
    }

    /// Write every label's final offset into its patch sites.
    ///
    /// Consumes the table: resolution happens exactly once per assembly.
    pub fn resolve_all(self, buf: &mut [u8]) -> Result<(), LabelError> {
        for label in self.labels {
            if label.refs.is_empty() {
                continue;
            }

            let offset = match label.offset {
                Some(offset) => offset,
                None => return Err(LabelError::UndefinedLabel(label.name)),
            };

            for (at, width) in label.refs {
                field::patch_uint(&mut buf[at..at + width as usize], offset)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let mut labels = LabelTable::new();

        let a = labels.get_or_create("start");
        let b = labels.get_or_create("start");
        let c = labels.get_or_create("end");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(labels.name(a), "start");
    }

    #[test]
    fn test_forward_and_backward_references() {
        let mut labels = LabelTable::new();
        let mut buf = vec![0u8; 12];

        let back = labels.get_or_create("back");
        labels.define(back, 0x02).unwrap();
        labels.add_reference(back, 0, 4);

        let fwd = labels.get_or_create("fwd");
        labels.add_reference(fwd, 4, 4);
        labels.define(fwd, 0x0A).unwrap();

        labels.resolve_all(&mut buf).unwrap();
        assert_eq!(&buf[0..4], [0x02, 0, 0, 0]);
        assert_eq!(&buf[4..8], [0x0A, 0, 0, 0]);
    }

    #[test]
    fn test_double_definition() {
        let mut labels = LabelTable::new();

        let id = labels.get_or_create("here");
        labels.define(id, 0).unwrap();

        assert_eq!(
            labels.define(id, 4),
            Err(LabelError::DoubleDefinition("here".to_string()))
        );
    }

    #[test]
    fn test_undefined_label() {
        let mut labels = LabelTable::new();
        let mut buf = vec![0u8; 4];

        let id = labels.get_or_create("nowhere");
        labels.add_reference(id, 0, 4);

        assert_eq!(
            labels.resolve_all(&mut buf),
            Err(LabelError::UndefinedLabel("nowhere".to_string()))
        );
    }

    #[test]
    fn test_defined_but_unreferenced_is_fine() {
        let mut labels = LabelTable::new();
        let mut buf = vec![];

        let id = labels.get_or_create("unused");
        labels.define(id, 0).unwrap();

        labels.resolve_all(&mut buf).unwrap();
    }
}
