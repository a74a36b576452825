//! Moving whole graphs in and out: file import with validation, and
//! JSON / CSV / GraphML export.

pub mod export;
pub mod import;
