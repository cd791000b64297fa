//! Linking of call graph fragments.
//!
//! A fragment is the call graph of one translation unit, written in the line
//! format described in [`format`]. The [`Linker`] merges any number of them
//! into a [`LinkedProgram`], and [`write_linked`] prints the result back out.

pub mod diagnostics;
pub mod format;
pub mod linker;
pub mod paths;
pub mod writer;

pub use diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
pub use format::{parse_line, MalformedLine, NodeLine, NodeToken, Record};
pub use linker::{LinkOptions, LinkedProgram, Linker};
pub use paths::canonicalize;
pub use writer::write_linked;
