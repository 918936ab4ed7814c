pub mod evaluator;
pub mod feedback;
pub mod types;
