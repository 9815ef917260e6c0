pub mod php;
pub mod types;
