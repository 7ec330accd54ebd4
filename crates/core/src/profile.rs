//! The assembled evidence profile document.
//!
//! These are the shapes handed to persistence and serialised to JSON for client-side rendering.
//! Sub-objects built from optional form fields (`confidence_judgement`, `outcome`,
//! `summary_of_findings`) serialise as `{}` when the submitter left them blank.

use chrono::{DateTime, Utc};
use ep_types::{NonEmptyText, Order, Slug};
use serde::{Deserialize, Serialize};

/// Top-level evidence-synthesis document, composed of ordered streams.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub assessment_id: i64,
    pub title: NonEmptyText,
    pub slug: Slug,
    #[serde(default)]
    pub caption: String,
    #[serde(default)]
    pub one_scenario_per_stream: bool,
    pub cross_stream_conclusions: CrossStreamConclusions,
    pub streams: Vec<Stream>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl EvidenceProfile {
    /// Distinct study ids referenced anywhere in the profile, in first-seen order.
    pub fn study_ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        for scenario in self.streams.iter().flat_map(|s| s.scenarios.iter()) {
            for id in scenario.study_ids() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossStreamConclusions {
    pub confidence_judgement: ConfidenceJudgement,
    pub inferences: Vec<Inference>,
}

/// A conclusion drawn across all streams.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inference {
    pub title: String,
    pub description: String,
}

/// An enumerated certainty score with its display name and rationale.
///
/// Used for a stream's judgement, a scenario's outcome and the cross-stream judgement. Every
/// field is optional so that a blank judgement serialises as `{}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceJudgement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl ConfidenceJudgement {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.score.is_none()
            && self.name.is_none()
            && self.explanation.is_none()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryOfFindings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl SummaryOfFindings {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.summary.is_none()
    }
}

/// One evidence line (human, animal, mechanistic, ...) within a profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    /// Persisted identifier; `None` until the stream has been saved.
    #[serde(default, rename = "pk")]
    pub id: Option<i64>,
    pub stream_type: i64,
    pub stream_title: String,
    pub order: Order,
    #[serde(default)]
    pub confidence_judgement: ConfidenceJudgement,
    #[serde(default)]
    pub summary_of_findings: SummaryOfFindings,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

/// One outcome-level finding within a stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default, rename = "pk")]
    pub id: Option<i64>,
    pub scenario_name: String,
    pub order: Order,
    #[serde(default)]
    pub outcome: ConfidenceJudgement,
    #[serde(default)]
    pub summary_of_findings: SummaryOfFindings,
    #[serde(default)]
    pub studies: Vec<EffectTagStudies>,
    #[serde(default)]
    pub confidencefactors_increase: Vec<ConfidenceFactorRef>,
    #[serde(default)]
    pub confidencefactors_decrease: Vec<ConfidenceFactorRef>,
}

impl Scenario {
    /// Distinct study ids across this scenario's effect tag groupings, in first-seen order.
    pub fn study_ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        for id in self.studies.iter().flat_map(|g| g.studies.iter().copied()) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }
}

/// Studies grouped under one effect tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectTagStudies {
    pub effect_tag: i64,
    #[serde(default)]
    pub studies: Vec<i64>,
}

/// A confidence factor cited for a scenario, with the submitter's explanation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceFactorRef {
    pub confidence_factor: i64,
    #[serde(default)]
    pub explanation: String,
}
