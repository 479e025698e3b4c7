pub mod file;
pub mod poi;
