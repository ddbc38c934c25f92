mod engine;
mod paths;
mod traversal;
mod types;

pub use engine::RelationshipGraph;
pub use types::*;

#[cfg(test)]
mod tests;
