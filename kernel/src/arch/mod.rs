//! Architecture layer: the single-node i386 nucleus supports one target.

pub mod x86;
pub use x86::*;
