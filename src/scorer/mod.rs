pub mod features;
pub mod opportunity;

pub use features::{normalize, ComponentScores, TableBounds};
pub use opportunity::{margin_score, OpportunityScorer, PairScore};
