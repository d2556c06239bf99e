pub mod archive;
pub mod asm;
pub mod disasm;
pub mod field;
pub mod ir;
pub mod label;
pub mod listing;
pub mod schema;
pub mod tables;
