pub mod response_normalizer;

// Re-export the main entry points for convenience
pub use response_normalizer::{extract_capitalized_terms, normalize, ParseFailure};
