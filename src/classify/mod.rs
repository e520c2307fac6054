//! Accent classification: profile table, scoring engine, calibration and
//! summary text.

pub mod engine;
pub mod profile;
pub mod scorer;
pub mod summary;

pub use engine::{classify, select_label, Classification, ScoreMap};
pub use profile::{AccentProfile, FeatureRange, ProfileTable};
pub use scorer::{assess, Assessment};
pub use summary::summarize;
