//! Core of the picojvm code translator: rewrites a method's parsed
//! instruction bytes in place so they are valid for the reduced
//! instruction set and relocated constant pool of the target machine.
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
// This would be nice to re-enable eventually, but not while in active dev
#![allow(clippy::missing_errors_doc)]

use code::op::RawOpcode;
use relocate::RelocateError;

pub mod code;
pub mod relocate;
pub mod util;

pub use code::{translate_code, TranslateSummary};
pub use relocate::{ConstantPoolRelocator, MapRelocator, RelocationContext};

// Note: Currently these errors use non_exhaustive, but in the future that may be removed
// if there is a belief that they are likely to be stable.

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TranslateError {
    /// The target machine does not implement this opcode at all.
    /// Fatal for the whole method: skipping it would desynchronize every
    /// offset after it, so there is no partial translation.
    UnsupportedOpcode { opcode: RawOpcode, offset: usize },
    /// The relocator did not accept a constant pool index found in the
    /// stream. Passed through unchanged from the relocator.
    Relocate(RelocateError),
}
impl From<RelocateError> for TranslateError {
    fn from(err: RelocateError) -> Self {
        Self::Relocate(err)
    }
}
