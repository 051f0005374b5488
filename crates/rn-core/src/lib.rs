pub mod config;
pub mod cursor;
pub mod document;
pub mod gate;
pub mod types;
