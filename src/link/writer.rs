//! Writes a linked program back out in the fragment line format.

use std::io::{self, Write};

use super::linker::LinkedProgram;
use crate::symbols::{ArgSlot, FileId};

/// Emit every live symbol, grouped by file, as one self-contained fragment.
///
/// Forwarders and unused declarations are skipped; callee ids are printed in
/// ascending order. Linking the output again yields the same graph.
pub fn write_linked<W: Write>(program: &LinkedProgram, out: &mut W) -> io::Result<()> {
    let store = program.store();
    let mut current: Option<FileId> = None;
    for id in store.sorted_by_file() {
        let symbol = &store[id];
        if !symbol.is_live() {
            continue;
        }
        if symbol.file.is_some() && symbol.file != current {
            writeln!(out, "F {}", store.file_path(symbol))?;
            current = symbol.file;
        }

        write!(out, "{} ({})", symbol.id, symbol.line)?;
        if symbol.is_static {
            write!(out, " @static")?;
        }
        if symbol.is_decl {
            write!(out, " @decl")?;
        }
        if symbol.is_var {
            write!(out, " @var")?;
        }
        write!(out, " {}", symbol.name)?;
        for callee in &symbol.callees {
            write!(out, " {}", callee)?;
        }
        if let (Some(parent), Some(slot)) = (symbol.parent, symbol.arg_n) {
            if store[parent].is_live() {
                match slot {
                    ArgSlot::Return => write!(out, " ^{}", parent)?,
                    ArgSlot::Arg(n) => write!(out, " ^{}:{}", parent, n)?,
                }
            }
        }
        writeln!(out)?;
    }
    Ok(())
}
