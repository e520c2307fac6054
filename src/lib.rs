//! The `accent_analyzer` core library.
//!
//! Classifies the English accent spoken in an audio clip. Audio is decoded and
//! normalised, summarised into a fixed-shape feature vector, scored against a
//! table of accent reference profiles and calibrated into confidence and
//! proficiency scores. An axum server exposes the pipeline over HTTP.

pub mod audio;
pub mod classify;
pub mod config;
pub mod constants;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod reliability;
pub mod server;
pub mod types;
