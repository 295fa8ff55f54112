//! Small filesystem, path and hashing helpers shared by the npmirror crates.

pub mod error;
pub mod fs;
pub mod hash;
pub mod path;
