pub mod file_info;
pub mod source;
