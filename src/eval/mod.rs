//! Grading support for task outputs.
//!
//! The score schema is handed to an external grading adapter, which validates
//! a model's structured rating against it.

mod score_schema;

pub use score_schema::{
    build_score_schema, property_key, rating_fragment, score_schema, RatingEncoding,
    RatingFragment, OVERALL_RATING_KEY,
};
