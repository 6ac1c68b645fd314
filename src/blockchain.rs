// Thin re-export module: implementation is in `blockchain/core.rs`, split
// into block types, chain state, validation and the assembler.

pub mod core;
pub use core::*;
