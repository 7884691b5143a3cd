pub mod file;
pub mod folder;

pub use file::*;
pub use folder::*;
