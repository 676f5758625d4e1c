//! OScript IR - symbols and shared member index tables.
//!
//! This crate holds the name-resolution data that is shared between threads
//! and between every activation of a lexical construct:
//!
//! - [`Symbol`]: compact interned identifier
//! - [`SymbolInterner`]: thread-safe name <-> symbol mapping
//! - [`SymbolTable`]: a scope "shape" mapping symbols to dense slot indices
//! - [`ShapeSet`]: per-construct memo of shapes, one per [`Visibility`]

mod interner;
mod symbol;
pub mod symbol_table;
mod visibility;

pub use interner::{InternError, SymbolInterner};
pub use symbol::Symbol;
pub use symbol_table::{SymbolTable, SymbolTableError, SymbolTableStats, Symbols};
pub use visibility::{ShapeSet, Visibility};
