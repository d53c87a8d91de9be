//! TUI widgets for Lookout.

pub mod editor;
pub mod header;
pub mod help;
pub mod reference;
pub mod table;
