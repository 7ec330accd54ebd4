//! Reconstruction of an evidence profile from a flat form submission.
//!
//! The browser submits one flat mapping of dynamically named fields. Rebuilding the profile
//! tree runs in three stages, each taking the previous stage's output by value:
//!
//! 1. [`parser::parse_fields`] buckets values into provisional objects per family.
//! 2. [`validator::validate`] drops objects that break their family's rules.
//! 3. [`assembler::assemble`] orders the survivors and nests them under their parents.
//!
//! Dropped objects never fail the request. Each is reported as a [`Rejection`] so callers can
//! show the submitter what was left out.

pub mod assembler;
pub mod flatten;
pub mod grammar;
pub mod header;
pub mod parser;
pub mod validator;

pub use assembler::{AssembleOptions, AssembledTree, DuplicateOrderPolicy};
pub use grammar::{Family, FieldGrammar, IndexPath};
pub use header::ProfileHeader;

use crate::error::FormError;
use crate::lookups::Lookups;
use serde::Serialize;
use std::fmt;

/// The submitted fields, in submission order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    /// Value of a field; the last one wins if the key was submitted more than once.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<Vec<(String, String)>> for FormFields {
    fn from(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Why an object was left out of the assembled profile.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum RejectReason {
    /// A path segment in the field name was zero or out of range.
    MalformedPath,
    MissingField(&'static str),
    EmptyField(&'static str),
    NotAnInteger(&'static str),
    NotAnOption(&'static str),
    /// The `order` field was missing or not a positive integer.
    InvalidOrder,
    /// The parent object was rejected or never submitted.
    Orphaned,
    /// Another object under the same parent claimed the same order.
    DuplicateOrder { order: u32 },
    /// The profile allows one scenario per stream and this one came after the first.
    ExtraScenario,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::MalformedPath => f.write_str("malformed index path"),
            RejectReason::MissingField(name) => write!(f, "missing required field {name}"),
            RejectReason::EmptyField(name) => write!(f, "field {name} cannot be empty"),
            RejectReason::NotAnInteger(name) => write!(f, "field {name} is not an integer"),
            RejectReason::NotAnOption(name) => write!(f, "field {name} is not a valid option"),
            RejectReason::InvalidOrder => f.write_str("order must be a positive integer"),
            RejectReason::Orphaned => f.write_str("parent object is missing or invalid"),
            RejectReason::DuplicateOrder { order } => {
                write!(f, "order {order} is claimed by another object")
            }
            RejectReason::ExtraScenario => f.write_str("only one scenario is allowed per stream"),
        }
    }
}

/// Diagnostic for one dropped object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub family: Family,
    /// Index path as it appeared in the field names, e.g. `2_1`.
    pub path: String,
    pub reason: RejectReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.family, self.path, self.reason)
    }
}

/// Everything recovered from one submission.
#[derive(Clone, Debug, PartialEq)]
pub struct Reconstruction {
    pub header: ProfileHeader,
    pub tree: AssembledTree,
    pub rejections: Vec<Rejection>,
}

/// Run the full parse → validate → assemble pipeline over a submission.
///
/// # Errors
///
/// Only header problems are errors; see [`header::parse_header`].
pub fn reconstruct(
    form: &FormFields,
    grammar: &FieldGrammar,
    lookups: &Lookups,
    duplicate_order: DuplicateOrderPolicy,
) -> Result<Reconstruction, FormError> {
    let header = header::parse_header(form, lookups)?;

    let parsed = parser::parse_fields(grammar, form);
    let (validated, mut rejections) = validator::validate(parsed, lookups);
    let options = AssembleOptions {
        duplicate_order,
        one_scenario_per_stream: header.one_scenario_per_stream,
    };
    let (tree, assembly_rejections) = assembler::assemble(validated, lookups, options);
    rejections.extend(assembly_rejections);

    if !rejections.is_empty() {
        tracing::debug!(
            slug = %header.slug,
            rejected = rejections.len(),
            "submission reconstructed with rejected objects"
        );
    }

    Ok(Reconstruction {
        header,
        tree,
        rejections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::{CrossStreamConclusions, EvidenceProfile};

    fn form(pairs: &[(&str, &str)]) -> FormFields {
        pairs.iter().copied().collect()
    }

    fn run(pairs: &[(&str, &str)]) -> Reconstruction {
        reconstruct(
            &form(pairs),
            FieldGrammar::shared(),
            &Lookups::default(),
            DuplicateOrderPolicy::default(),
        )
        .expect("valid header")
    }

    fn to_profile(r: Reconstruction) -> EvidenceProfile {
        EvidenceProfile {
            id: None,
            assessment_id: 1,
            title: r.header.title,
            slug: r.header.slug,
            caption: r.header.caption,
            one_scenario_per_stream: r.header.one_scenario_per_stream,
            cross_stream_conclusions: CrossStreamConclusions {
                confidence_judgement: r.header.confidence_judgement,
                inferences: r.tree.inferences,
            },
            streams: r.tree.streams,
            last_updated: None,
        }
    }

    #[test]
    fn single_stream_single_scenario_with_blank_outcome() {
        let r = run(&[
            ("title", "Profile"),
            ("slug", "profile"),
            ("stream_1_stream_type", "2"),
            ("stream_1_stream_title", "Human"),
            ("stream_1_order", "1"),
            ("stream_1_1_scenario_order", "1"),
            ("stream_1_1_scenario_scenario_name", "S1"),
            ("stream_1_1_scenario_outcome_title", ""),
            ("stream_1_1_scenario_outcome_explanation", ""),
            ("stream_1_1_scenario_outcome_score", ""),
        ]);

        assert!(r.rejections.is_empty(), "{:?}", r.rejections);
        assert_eq!(r.tree.streams.len(), 1);
        let stream = &r.tree.streams[0];
        assert_eq!(stream.order.get(), 1);
        assert_eq!(stream.scenarios.len(), 1);
        let scenario = &stream.scenarios[0];
        assert_eq!(scenario.order.get(), 1);
        assert_eq!(scenario.scenario_name, "S1");
        assert_eq!(
            serde_json::to_value(&scenario.outcome).unwrap(),
            serde_json::json!({})
        );
    }

    #[test]
    fn order_fidelity_and_gap_compaction() {
        let r = run(&[
            ("title", "P"),
            ("slug", "p"),
            ("inference_1_title", "third"),
            ("inference_1_description", ""),
            ("inference_1_order", "3"),
            ("inference_2_title", "first"),
            ("inference_2_description", ""),
            ("inference_2_order", "1"),
            ("inference_3_title", "bad"),
            ("inference_3_description", ""),
            ("inference_3_order", "two"),
        ]);

        let titles: Vec<&str> = r.tree.inferences.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["first", "third"]);
        assert_eq!(r.rejections.len(), 1);
        assert_eq!(r.rejections[0].reason, RejectReason::InvalidOrder);
    }

    #[test]
    fn lineage_is_enforced_through_every_level() {
        let r = run(&[
            ("title", "P"),
            ("slug", "p"),
            // stream 1 lacks a title, so everything under it is orphaned
            ("stream_1_stream_type", "1"),
            ("stream_1_order", "1"),
            ("stream_1_1_scenario_scenario_name", "S"),
            ("stream_1_1_scenario_order", "1"),
            ("stream_1_1_1_effectTag_pk", "9"),
            ("stream_1_1_1_effectTag_order", "1"),
            ("stream_1_1_1_1_study_pk", "100"),
            ("stream_1_1_1_1_study_order", "1"),
        ]);

        assert!(r.tree.streams.is_empty());
        let families: Vec<Family> = r.rejections.iter().map(|x| x.family).collect();
        assert!(families.contains(&Family::Stream));
        assert!(families.contains(&Family::Scenario));
        assert!(families.contains(&Family::EffectTag));
        assert!(families.contains(&Family::Study));
        assert!(r
            .rejections
            .iter()
            .filter(|x| x.family != Family::Stream)
            .all(|x| x.reason == RejectReason::Orphaned));
    }

    #[test]
    fn nested_groups_and_factor_pools() {
        let r = run(&[
            ("title", "P"),
            ("slug", "p"),
            ("stream_1_stream_type", "1"),
            ("stream_1_stream_title", "Human"),
            ("stream_1_order", "1"),
            ("stream_1_1_scenario_scenario_name", "Liver"),
            ("stream_1_1_scenario_order", "1"),
            ("stream_1_1_2_effectTag_pk", "7"),
            ("stream_1_1_2_effectTag_order", "2"),
            ("stream_1_1_1_effectTag_pk", "3"),
            ("stream_1_1_1_effectTag_order", "1"),
            ("stream_1_1_1_1_study_pk", "11"),
            ("stream_1_1_1_1_study_order", "2"),
            ("stream_1_1_1_2_study_pk", "12"),
            ("stream_1_1_1_2_study_order", "1"),
            ("stream_1_1_increase_1_confidenceFactor_pk", "2"),
            ("stream_1_1_increase_1_confidenceFactor_explanation", "monotonic"),
            ("stream_1_1_increase_1_confidenceFactor_order", "1"),
            // a decrease-pool id submitted as an increase factor is invalid
            ("stream_1_1_increase_2_confidenceFactor_pk", "6"),
            ("stream_1_1_increase_2_confidenceFactor_order", "2"),
            ("stream_1_1_decrease_1_confidenceFactor_pk", "6"),
            ("stream_1_1_decrease_1_confidenceFactor_order", "1"),
        ]);

        let scenario = &r.tree.streams[0].scenarios[0];
        assert_eq!(scenario.studies.len(), 2);
        assert_eq!(scenario.studies[0].effect_tag, 3);
        assert_eq!(scenario.studies[0].studies, vec![12, 11]);
        assert_eq!(scenario.studies[1].effect_tag, 7);
        assert!(scenario.studies[1].studies.is_empty());
        assert_eq!(scenario.confidencefactors_increase.len(), 1);
        assert_eq!(scenario.confidencefactors_increase[0].explanation, "monotonic");
        assert_eq!(scenario.confidencefactors_decrease.len(), 1);
        assert_eq!(scenario.confidencefactors_decrease[0].explanation, "");
        assert_eq!(
            r.rejections,
            vec![Rejection {
                family: Family::IncreaseFactor,
                path: "1_1_2".into(),
                reason: RejectReason::NotAnOption("pk"),
            }]
        );
    }

    #[test]
    fn flatten_then_reconstruct_reproduces_the_tree() {
        let r = run(&[
            ("title", "P"),
            ("slug", "p"),
            ("caption", "cap"),
            ("confidence_judgement_score", "3"),
            ("inference_1_title", "Overall"),
            ("inference_1_description", "Text"),
            ("inference_1_order", "1"),
            ("stream_1_pk", "5"),
            ("stream_1_stream_type", "1"),
            ("stream_1_stream_title", "Human"),
            ("stream_1_confidence_judgement_title", "Moderate"),
            ("stream_1_confidence_judgement_score", "3"),
            ("stream_1_confidence_judgement_explanation", ""),
            ("stream_1_order", "1"),
            ("stream_2_stream_type", "2"),
            ("stream_2_stream_title", "Animal"),
            ("stream_2_summary_of_findings_title", "SoF"),
            ("stream_2_order", "2"),
            ("stream_2_1_scenario_scenario_name", "Kidney"),
            ("stream_2_1_scenario_outcome_title", "Effect"),
            ("stream_2_1_scenario_outcome_score", "2"),
            ("stream_2_1_scenario_order", "1"),
            ("stream_2_1_1_effectTag_pk", "4"),
            ("stream_2_1_1_effectTag_order", "1"),
            ("stream_2_1_1_1_study_pk", "40"),
            ("stream_2_1_1_1_study_order", "1"),
            ("stream_2_1_decrease_1_confidenceFactor_pk", "8"),
            ("stream_2_1_decrease_1_confidenceFactor_explanation", "wide CIs"),
            ("stream_2_1_decrease_1_confidenceFactor_order", "1"),
        ]);
        assert!(r.rejections.is_empty(), "{:?}", r.rejections);
        let submitted = to_profile(r);

        let again = to_profile(
            reconstruct(
                &flatten::flatten(&submitted),
                FieldGrammar::shared(),
                &Lookups::default(),
                DuplicateOrderPolicy::default(),
            )
            .expect("flattened header is valid"),
        );
        assert_eq!(again, submitted);
    }

    #[test]
    fn header_error_fails_the_whole_submission() {
        let err = reconstruct(
            &form(&[("stream_1_order", "1")]),
            FieldGrammar::shared(),
            &Lookups::default(),
            DuplicateOrderPolicy::default(),
        )
        .expect_err("no title");
        assert!(matches!(err, FormError::MissingField("title")));
    }
}
