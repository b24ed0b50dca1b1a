//! Core types for spreadsheet imports

mod row;
mod value;

pub use row::*;
pub use value::*;
