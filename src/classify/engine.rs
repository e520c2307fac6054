//! Accent classification engine.
//!
//! Scores a [`FeatureVector`] against every profile in a [`ProfileTable`] and
//! selects the best match. Pure: no I/O and no internal state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use super::profile::{AccentProfile, ProfileTable};
use crate::constants::scoring::TIE_EPSILON;
use crate::error::{AnalysisError, Result};
use crate::features::FeatureVector;
use crate::types::AccentClass;

/// Raw match score per accent, iterated in canonical accent order.
pub type ScoreMap = BTreeMap<AccentClass, f64>;

/// Outcome of scoring one feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub label: AccentClass,
    pub scores: ScoreMap,
}

impl Classification {
    /// Score of the selected label.
    pub fn winning_score(&self) -> f64 {
        self.scores.get(&self.label).copied().unwrap_or(0.0)
    }

    /// Highest score among the other classes, or zero if there are none.
    pub fn runner_up_score(&self) -> f64 {
        self.scores
            .iter()
            .filter(|(class, _)| **class != self.label)
            .map(|(_, &score)| score)
            .fold(0.0, f64::max)
    }

    /// Winning score minus runner-up score, never negative.
    pub fn margin(&self) -> f64 {
        (self.winning_score() - self.runner_up_score()).max(0.0)
    }
}

/// Weighted mean membership of `features` in `profile`, in `[0, 1]`.
pub fn score_profile(profile: &AccentProfile, features: &FeatureVector) -> Result<f64> {
    let total_weight = profile.total_weight();
    if !(total_weight > 0.0) {
        return Err(AnalysisError::Classification(format!(
            "{} profile has no positive weight",
            profile.accent
        )));
    }
    let weighted: f64 = profile
        .features
        .iter()
        .map(|range| range.weight * range.membership(features.value(range.feature)))
        .sum();
    Ok((weighted / total_weight).clamp(0.0, 1.0))
}

/// Score every profile in the table.
pub fn score_all(features: &FeatureVector, table: &ProfileTable) -> Result<ScoreMap> {
    table
        .profiles()
        .iter()
        .map(|profile| Ok((profile.accent, score_profile(profile, features)?)))
        .collect()
}

/// Pick the label from a score map.
///
/// Every class within [`TIE_EPSILON`] of the maximum is tied; among tied
/// classes the first in canonical order wins.
///
/// # Errors
/// `Classification` for an empty map or a non-finite score.
pub fn select_label(scores: &ScoreMap) -> Result<AccentClass> {
    if scores.is_empty() {
        return Err(AnalysisError::Classification(
            "score map is empty".to_string(),
        ));
    }
    if let Some((class, score)) = scores.iter().find(|(_, s)| !s.is_finite()) {
        return Err(AnalysisError::Classification(format!(
            "score for {} is not finite: {}",
            class, score
        )));
    }

    let best = scores.values().copied().fold(f64::NEG_INFINITY, f64::max);
    scores
        .iter()
        .find(|(_, &score)| score >= best - TIE_EPSILON)
        .map(|(&class, _)| class)
        .ok_or_else(|| AnalysisError::Classification("no maximum score".to_string()))
}

/// Score a feature vector against the table and select the label.
pub fn classify(features: &FeatureVector, table: &ProfileTable) -> Result<Classification> {
    let scores = score_all(features, table)?;
    let label = select_label(&scores)?;
    debug!(
        "Classified as {} ({:.3}); scores: {:?}",
        label,
        scores.get(&label).copied().unwrap_or(0.0),
        scores
    );
    Ok(Classification { label, scores })
}
