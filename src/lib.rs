//! Merges JVM class trees and jar archives into one jar, moving selected
//! packages to new namespaces and rewriting every reference to them.

pub mod assemble;
pub mod classfile;
pub mod config;
pub mod error;
pub mod pattern;
pub mod relocate;
pub mod transform;

pub use assemble::{assemble, repackage, RepackTask};
pub use error::{ClassFormatError, RepackError};
pub use relocate::{Relocator, SymbolRemapper};
