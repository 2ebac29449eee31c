// Script Module
// Decoding and statement splitting for SQL scripts

pub mod encoding;
pub mod splitter;

pub use encoding::ScriptEncoding;
pub use splitter::{
    ScanAction, ScanMode, ScriptSplitter, Statement, Statements, Unterminated, DEFAULT_SEPARATOR,
};
