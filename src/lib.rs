//! ELF/DWARF (v2/v3) debug-info decoder and `(file, line) -> address` lookup.
//!
//! The core is the DWARF decoder (`leb`, `cursor`, `tables`, `abbrev`, `die`,
//! `cu`, `line`, `aranges`, `strtab`), orchestrated by the [`dwarf::Dwarf`]
//! façade against section slices the hand-rolled `elf` loader resolves.

pub mod abbrev;
pub mod aranges;
pub mod cu;
pub mod cursor;
pub mod die;
pub mod dump;
pub mod dwarf;
pub mod elf;
pub mod error;
pub mod leb;
pub mod line;
pub mod strtab;
pub mod tables;

pub use dwarf::Dwarf;
pub use elf::Elf;
pub use error::{DwarfError, Result};
