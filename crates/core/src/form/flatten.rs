//! Turn an assembled profile back into flat form fields.
//!
//! The inverse of parse → validate → assemble: feeding the output back through
//! [`crate::form::reconstruct`] yields the same tree. Used to prefill edit forms.

use super::grammar::{Family, IndexPath, ORDER_FIELD};
use super::FormFields;
use crate::constants::{
    CAPTION_FIELD, CONFIDENCE_JUDGEMENT_EXPLANATION_FIELD, CONFIDENCE_JUDGEMENT_SCORE_FIELD,
    ONE_SCENARIO_PER_STREAM_FIELD, SLUG_FIELD, TITLE_FIELD,
};
use crate::profile::{ConfidenceFactorRef, ConfidenceJudgement, EvidenceProfile, Scenario, Stream};

struct Flattener {
    pairs: Vec<(String, String)>,
}

impl Flattener {
    fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((key.into(), value.into()));
    }

    fn field(&mut self, family: Family, path: &IndexPath, attribute: &str, value: impl Into<String>) {
        self.push(family.field_name(path, attribute), value);
    }

    fn judgement(&mut self, family: Family, path: &IndexPath, prefix: &str, j: &ConfidenceJudgement) {
        if j.is_empty() {
            return;
        }
        let title = j.title.clone().unwrap_or_default();
        let explanation = j.explanation.clone().unwrap_or_default();
        let score = j.score.map(|s| s.to_string()).unwrap_or_default();
        self.field(family, path, &format!("{prefix}_title"), title);
        self.field(family, path, &format!("{prefix}_explanation"), explanation);
        self.field(family, path, &format!("{prefix}_score"), score);
    }

    fn stream(&mut self, path: &IndexPath, stream: &Stream) {
        let f = Family::Stream;
        if let Some(id) = stream.id {
            self.field(f, path, "pk", id.to_string());
        }
        self.field(f, path, "stream_type", stream.stream_type.to_string());
        self.field(f, path, "stream_title", stream.stream_title.clone());
        self.field(f, path, ORDER_FIELD, stream.order.to_string());
        self.judgement(f, path, "confidence_judgement", &stream.confidence_judgement);
        if !stream.summary_of_findings.is_empty() {
            let sof = &stream.summary_of_findings;
            self.field(f, path, "summary_of_findings_title", sof.title.clone().unwrap_or_default());
            self.field(f, path, "summary_of_findings_summary", sof.summary.clone().unwrap_or_default());
        }

        for (i, scenario) in stream.scenarios.iter().enumerate() {
            self.scenario(&path.child(i as u32 + 1), scenario);
        }
    }

    fn scenario(&mut self, path: &IndexPath, scenario: &Scenario) {
        let f = Family::Scenario;
        if let Some(id) = scenario.id {
            self.field(f, path, "pk", id.to_string());
        }
        self.field(f, path, "scenario_name", scenario.scenario_name.clone());
        self.field(f, path, ORDER_FIELD, scenario.order.to_string());
        self.judgement(f, path, "outcome", &scenario.outcome);
        if !scenario.summary_of_findings.is_empty() {
            let sof = &scenario.summary_of_findings;
            self.field(f, path, "summary_of_findings_title", sof.title.clone().unwrap_or_default());
            self.field(f, path, "summary_of_findings_summary", sof.summary.clone().unwrap_or_default());
        }

        for (i, group) in scenario.studies.iter().enumerate() {
            let tag_path = path.child(i as u32 + 1);
            self.field(Family::EffectTag, &tag_path, "pk", group.effect_tag.to_string());
            self.field(Family::EffectTag, &tag_path, ORDER_FIELD, (i + 1).to_string());
            for (j, study) in group.studies.iter().enumerate() {
                let study_path = tag_path.child(j as u32 + 1);
                self.field(Family::Study, &study_path, "pk", study.to_string());
                self.field(Family::Study, &study_path, ORDER_FIELD, (j + 1).to_string());
            }
        }

        self.factors(Family::IncreaseFactor, path, &scenario.confidencefactors_increase);
        self.factors(Family::DecreaseFactor, path, &scenario.confidencefactors_decrease);
    }

    fn factors(&mut self, family: Family, scenario_path: &IndexPath, refs: &[ConfidenceFactorRef]) {
        for (i, r) in refs.iter().enumerate() {
            let path = scenario_path.child(i as u32 + 1);
            self.field(family, &path, "pk", r.confidence_factor.to_string());
            self.field(family, &path, "explanation", r.explanation.clone());
            self.field(family, &path, ORDER_FIELD, (i + 1).to_string());
        }
    }
}

/// Flatten a profile into the submission grammar.
///
/// Streams and scenarios keep their stored order; every other family is numbered by position.
pub fn flatten(profile: &EvidenceProfile) -> FormFields {
    let mut out = Flattener { pairs: Vec::new() };

    out.push(TITLE_FIELD, profile.title.as_str());
    out.push(SLUG_FIELD, profile.slug.as_str());
    out.push(CAPTION_FIELD, profile.caption.clone());
    if profile.one_scenario_per_stream {
        out.push(ONE_SCENARIO_PER_STREAM_FIELD, "on");
    }
    let cross = &profile.cross_stream_conclusions.confidence_judgement;
    if let Some(score) = cross.score {
        out.push(CONFIDENCE_JUDGEMENT_SCORE_FIELD, score.to_string());
    }
    if let Some(explanation) = &cross.explanation {
        out.push(CONFIDENCE_JUDGEMENT_EXPLANATION_FIELD, explanation.clone());
    }

    let root = IndexPath::root();
    for (i, inference) in profile.cross_stream_conclusions.inferences.iter().enumerate() {
        let path = root.child(i as u32 + 1);
        out.field(Family::Inference, &path, "title", inference.title.clone());
        out.field(Family::Inference, &path, "description", inference.description.clone());
        out.field(Family::Inference, &path, ORDER_FIELD, (i + 1).to_string());
    }

    for (i, stream) in profile.streams.iter().enumerate() {
        out.stream(&root.child(i as u32 + 1), stream);
    }

    FormFields::from(out.pairs)
}
