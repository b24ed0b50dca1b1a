pub mod import;
pub mod map;
