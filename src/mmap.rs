//! Memory-mapped loading for automaton and dictionary files.
//!
//! Open -> `memmap2::Mmap` -> validate header -> hand out a bounds-checked
//! slice, with two small owners — one per file kind this crate loads —
//! since `crate::state_table::StateTable` and `crate::dictionary::Dictionary`
//! already do their own header validation against `crate::format`'s
//! layouts; this module's job is purely to keep the backing mapping alive
//! for as long as a borrowed view into it is.

use crate::error::{PacketMatchError, Result};
use crate::state_table::StateTable;
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

/// A memory-mapped automaton file plus the validated table view borrowed
/// from it. Keeping both in one struct (rather than handing back a bare
/// `StateTable<'_>`) avoids a self-referential lifetime: the `Mmap` must
/// outlive every `StateTable` borrow of it, so this type owns both and
/// only exposes the table through an accessor tied to `&self`.
pub struct MappedAutomaton {
    mmap: Mmap,
}

impl MappedAutomaton {
    /// Map `path` and validate it as a `PKTMATCH` automaton. The mapping
    /// stays open for the lifetime of the returned value; validation
    /// happens eagerly so a malformed file is rejected at load time, not
    /// on first scan.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PacketMatchError::Io(format!("opening {}: {}", path.display(), e)))?;
        // SAFETY: standard mmap caveat — the file must not be mutated by
        // another process while mapped. The automaton is a read-only
        // compiled artifact, produced once by an external compiler and
        // never rewritten in place, so this tradeoff is acceptable.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| PacketMatchError::Mmap(format!("mapping {}: {}", path.display(), e)))?;
        StateTable::from_buffer(&mmap)?; // eager validation; view discarded
        Ok(MappedAutomaton { mmap })
    }

    /// Borrow a validated [`StateTable`] over the mapping.
    pub fn table(&self) -> StateTable<'_> {
        StateTable::from_buffer(&self.mmap).expect("validated in open()")
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.mmap
    }
}

/// Same pattern as [`MappedAutomaton`], for `PKTMDICT` dictionary files.
pub struct MappedDictionary {
    mmap: Mmap,
}

impl MappedDictionary {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| PacketMatchError::Io(format!("opening {}: {}", path.display(), e)))?;
        // SAFETY: see `MappedAutomaton::open`.
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|e| PacketMatchError::Mmap(format!("mapping {}: {}", path.display(), e)))?;
        crate::dictionary::Dictionary::from_buffer(&mmap)?;
        Ok(MappedDictionary { mmap })
    }

    pub fn dictionary(&self) -> crate::dictionary::Dictionary<'_> {
        crate::dictionary::Dictionary::from_buffer(&self.mmap).expect("validated in open()")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::AutomatonBuilder;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn maps_and_validates_a_built_automaton() {
        let built = AutomatonBuilder::new()
            .add_pattern(b"he")
            .add_pattern(b"she")
            .build()
            .unwrap();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&built.buffer).unwrap();
        file.flush().unwrap();

        let mapped = MappedAutomaton::open(file.path()).unwrap();
        let table = mapped.table();
        assert!(table.state_count() > 1);
    }

    #[test]
    fn rejects_a_non_automaton_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"not an automaton").unwrap();
        file.flush().unwrap();
        assert!(MappedAutomaton::open(file.path()).is_err());
    }
}
