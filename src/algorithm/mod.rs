pub mod candidates;
pub mod movement_analysis;
pub mod scoring;
pub mod target_generator;
