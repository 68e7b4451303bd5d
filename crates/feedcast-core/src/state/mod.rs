// # Source Registry Implementations
//
// This module provides implementations of the SourceRegistry trait for
// different persistence strategies.

pub mod file;
pub mod memory;

pub use file::{FileSourceRegistry, FileSourceRegistryFactory};
pub use memory::{MemorySourceRegistry, MemorySourceRegistryFactory};
