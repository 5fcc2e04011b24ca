//! File items, path helpers and sorting

pub mod entry;
pub mod path;
pub mod sort;

pub use entry::FileItem;
