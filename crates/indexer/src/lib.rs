pub mod analysis;
pub mod errors;
pub mod execution;
pub mod parsing;
pub mod project;
pub mod runner;

#[cfg(test)]
mod tests;
