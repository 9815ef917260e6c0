pub mod line_index;
pub mod processor;
pub mod tree;
