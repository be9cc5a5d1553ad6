//! Candidate generation: amount parsing, confidence scoring and the generator

pub mod generator;
pub mod numbers;
pub mod scoring;

pub use generator::CandidateGenerator;
