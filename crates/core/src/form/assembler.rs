//! Place validated objects into their declared positions and build the nested tree.
//!
//! Every object lands at `order - 1` within its parent. Slots are kept in an ordered map keyed
//! by order, so gaps left by missing or rejected orders simply do not appear in the output and
//! a very large declared order costs nothing extra.
//!
//! Lineage is enforced top-down: children are only pulled in by a parent that was itself
//! placed. Anything left over once the tree is built had no placed parent and is reported as
//! [`RejectReason::Orphaned`].

use super::grammar::{Family, IndexPath};
use super::validator::{ValidRecord, ValidatedForm};
use super::{RejectReason, Rejection};
use crate::lookups::Lookups;
use crate::profile::{
    ConfidenceFactorRef, ConfidenceJudgement, EffectTagStudies, Inference, Scenario, Stream,
    SummaryOfFindings,
};
use ep_types::Order;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

/// What to do when two objects under the same parent declare the same order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateOrderPolicy {
    /// The object first seen later in the submission takes the slot.
    #[default]
    LastWriteWins,
    /// Every object contesting a slot is dropped.
    RejectDuplicates,
}

impl FromStr for DuplicateOrderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "last-write-wins" | "overwrite" => Ok(Self::LastWriteWins),
            "reject" | "reject-duplicates" => Ok(Self::RejectDuplicates),
            other => Err(format!("unknown duplicate order policy: {other:?}")),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssembleOptions {
    pub duplicate_order: DuplicateOrderPolicy,
    pub one_scenario_per_stream: bool,
}

/// The keyed families assembled into their final nested shape.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AssembledTree {
    pub inferences: Vec<Inference>,
    pub streams: Vec<Stream>,
}

type Slotted = BTreeMap<IndexPath, Vec<(IndexPath, ValidRecord)>>;

/// Group a family's objects by parent path, each group sorted by declared order.
fn place_family(
    family: Family,
    records: BTreeMap<IndexPath, ValidRecord>,
    policy: DuplicateOrderPolicy,
    rejections: &mut Vec<Rejection>,
) -> Slotted {
    let mut by_parent: BTreeMap<IndexPath, Vec<(IndexPath, ValidRecord)>> = BTreeMap::new();
    for (path, record) in records {
        by_parent.entry(path.parent()).or_default().push((path, record));
    }

    let mut placed = BTreeMap::new();
    for (parent, mut group) in by_parent {
        group.sort_by_key(|(_, r)| r.seq);

        let mut slots: BTreeMap<Order, (IndexPath, ValidRecord)> = BTreeMap::new();
        let mut displaced: Vec<(IndexPath, Order)> = Vec::new();
        for (path, record) in group {
            let order = record.order;
            if let Some((earlier, _)) = slots.insert(order, (path, record)) {
                displaced.push((earlier, order));
            }
        }

        if policy == DuplicateOrderPolicy::RejectDuplicates {
            let contested: BTreeSet<Order> = displaced.iter().map(|(_, o)| *o).collect();
            for order in contested {
                if let Some((path, _)) = slots.remove(&order) {
                    displaced.push((path, order));
                }
            }
        }

        for (path, order) in displaced {
            tracing::debug!(%family, %path, %order, "dropping object with contested order");
            rejections.push(Rejection {
                family,
                path: path.to_string(),
                reason: RejectReason::DuplicateOrder { order: order.get() },
            });
        }

        placed.insert(parent, slots.into_values().collect());
    }
    placed
}

struct Children {
    slotted: BTreeMap<Family, Slotted>,
}

impl Children {
    fn take(&mut self, family: Family, parent: &IndexPath) -> Vec<(IndexPath, ValidRecord)> {
        self.slotted
            .get_mut(&family)
            .and_then(|groups| groups.remove(parent))
            .unwrap_or_default()
    }

    /// Everything nobody claimed.
    fn into_orphans(self) -> Vec<Rejection> {
        let mut orphans = Vec::new();
        for (family, groups) in self.slotted {
            for (path, _) in groups.into_values().flatten() {
                orphans.push(Rejection {
                    family,
                    path: path.to_string(),
                    reason: RejectReason::Orphaned,
                });
            }
        }
        orphans
    }
}

/// Build a judgement sub-object from flat fields.
///
/// Collapses to an empty judgement when both text fields are blank.
fn judgement(
    title: Option<&str>,
    explanation: Option<&str>,
    score: Option<i64>,
    lookups: &Lookups,
) -> ConfidenceJudgement {
    if title.is_none() && explanation.is_none() {
        return ConfidenceJudgement::default();
    }
    ConfidenceJudgement {
        title: Some(title.unwrap_or_default().to_string()),
        score,
        name: Some(
            score
                .and_then(|s| lookups.judgement_name(s))
                .unwrap_or_default()
                .to_string(),
        ),
        explanation: Some(explanation.unwrap_or_default().to_string()),
    }
}

fn summary_of_findings(record: &ValidRecord) -> SummaryOfFindings {
    let title = record.text("summary_of_findings_title");
    let summary = record.text("summary_of_findings_summary");
    if title.is_none() && summary.is_none() {
        return SummaryOfFindings::default();
    }
    SummaryOfFindings {
        title: Some(title.unwrap_or_default().to_string()),
        summary: Some(summary.unwrap_or_default().to_string()),
    }
}

fn factor_refs(records: Vec<(IndexPath, ValidRecord)>) -> Vec<ConfidenceFactorRef> {
    records
        .into_iter()
        .filter_map(|(_, r)| {
            r.integer("pk").map(|confidence_factor| ConfidenceFactorRef {
                confidence_factor,
                explanation: r.text_or_empty("explanation"),
            })
        })
        .collect()
}

fn build_scenario(
    path: IndexPath,
    record: ValidRecord,
    children: &mut Children,
    lookups: &Lookups,
) -> Scenario {
    let studies = children
        .take(Family::EffectTag, &path)
        .into_iter()
        .filter_map(|(tag_path, tag)| {
            let effect_tag = tag.integer("pk")?;
            let studies = children
                .take(Family::Study, &tag_path)
                .into_iter()
                .filter_map(|(_, s)| s.integer("pk"))
                .collect();
            Some(EffectTagStudies {
                effect_tag,
                studies,
            })
        })
        .collect();

    Scenario {
        id: record.integer("pk"),
        scenario_name: record.text_or_empty("scenario_name"),
        order: record.order,
        outcome: judgement(
            record.text("outcome_title"),
            record.text("outcome_explanation"),
            record.integer("outcome_score"),
            lookups,
        ),
        summary_of_findings: summary_of_findings(&record),
        studies,
        confidencefactors_increase: factor_refs(children.take(Family::IncreaseFactor, &path)),
        confidencefactors_decrease: factor_refs(children.take(Family::DecreaseFactor, &path)),
    }
}

fn build_stream(
    path: IndexPath,
    record: ValidRecord,
    children: &mut Children,
    lookups: &Lookups,
    options: AssembleOptions,
    rejections: &mut Vec<Rejection>,
) -> Stream {
    let mut scenarios = Vec::new();
    for (index, (p, r)) in children.take(Family::Scenario, &path).into_iter().enumerate() {
        // Extras are still built so their own children are consumed rather than orphaned.
        let scenario = build_scenario(p.clone(), r, children, lookups);
        if options.one_scenario_per_stream && index > 0 {
            rejections.push(Rejection {
                family: Family::Scenario,
                path: p.to_string(),
                reason: RejectReason::ExtraScenario,
            });
            continue;
        }
        scenarios.push(scenario);
    }

    Stream {
        id: record.integer("pk"),
        stream_type: record.integer("stream_type").unwrap_or_default(),
        stream_title: record.text_or_empty("stream_title"),
        order: record.order,
        confidence_judgement: judgement(
            record.text("confidence_judgement_title"),
            record.text("confidence_judgement_explanation"),
            record.integer("confidence_judgement_score"),
            lookups,
        ),
        summary_of_findings: summary_of_findings(&record),
        scenarios,
    }
}

/// Assemble validated objects into the final ordered tree.
pub fn assemble(
    validated: ValidatedForm,
    lookups: &Lookups,
    options: AssembleOptions,
) -> (AssembledTree, Vec<Rejection>) {
    let mut rejections = Vec::new();
    let mut slotted = BTreeMap::new();
    for (family, records) in validated.records {
        let placed = place_family(family, records, options.duplicate_order, &mut rejections);
        slotted.insert(family, placed);
    }
    let mut children = Children { slotted };

    let root = IndexPath::root();
    let inferences = children
        .take(Family::Inference, &root)
        .into_iter()
        .map(|(_, r)| Inference {
            title: r.text_or_empty("title"),
            description: r.text_or_empty("description"),
        })
        .collect();

    let streams = children
        .take(Family::Stream, &root)
        .into_iter()
        .map(|(p, r)| build_stream(p, r, &mut children, lookups, options, &mut rejections))
        .collect();

    for orphan in children.into_orphans() {
        tracing::debug!(family = %orphan.family, path = %orphan.path, "dropping orphaned object");
        rejections.push(orphan);
    }

    (
        AssembledTree {
            inferences,
            streams,
        },
        rejections,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::validator::FieldValue;

    fn record(seq: usize, order: u32, fields: &[(&'static str, FieldValue)]) -> ValidRecord {
        ValidRecord {
            seq,
            order: Order::new(order).unwrap(),
            fields: fields.iter().cloned().collect(),
        }
    }

    fn stream_record(seq: usize, order: u32, title: &str) -> ValidRecord {
        record(
            seq,
            order,
            &[
                ("stream_type", FieldValue::Integer(1)),
                ("stream_title", FieldValue::Text(title.into())),
            ],
        )
    }

    fn path(segments: &[u32]) -> IndexPath {
        IndexPath::new(segments.to_vec()).unwrap()
    }

    fn form_with(family: Family, records: Vec<(IndexPath, ValidRecord)>) -> ValidatedForm {
        let mut validated = ValidatedForm::default();
        validated
            .records
            .entry(family)
            .or_default()
            .extend(records);
        validated
    }

    #[test]
    fn out_of_order_arrival_lands_by_declared_order_and_gaps_compact() {
        let validated = form_with(
            Family::Stream,
            vec![
                (path(&[1]), stream_record(0, 3, "third")),
                (path(&[2]), stream_record(1, 1, "first")),
            ],
        );
        let (tree, rejections) = assemble(validated, &Lookups::default(), Default::default());
        let titles: Vec<&str> = tree.streams.iter().map(|s| s.stream_title.as_str()).collect();
        assert_eq!(titles, vec!["first", "third"]);
        assert!(rejections.is_empty());
    }

    #[test]
    fn duplicate_order_last_write_wins_by_default() {
        let validated = form_with(
            Family::Stream,
            vec![
                (path(&[1]), stream_record(5, 1, "later")),
                (path(&[2]), stream_record(0, 1, "earlier")),
            ],
        );
        let (tree, rejections) = assemble(validated, &Lookups::default(), Default::default());
        assert_eq!(tree.streams.len(), 1);
        assert_eq!(tree.streams[0].stream_title, "later");
        assert_eq!(
            rejections,
            vec![Rejection {
                family: Family::Stream,
                path: "2".into(),
                reason: RejectReason::DuplicateOrder { order: 1 },
            }]
        );
    }

    #[test]
    fn duplicate_order_can_reject_both_claimants() {
        let validated = form_with(
            Family::Stream,
            vec![
                (path(&[1]), stream_record(0, 1, "a")),
                (path(&[2]), stream_record(1, 1, "b")),
                (path(&[3]), stream_record(2, 2, "c")),
            ],
        );
        let options = AssembleOptions {
            duplicate_order: DuplicateOrderPolicy::RejectDuplicates,
            ..Default::default()
        };
        let (tree, rejections) = assemble(validated, &Lookups::default(), options);
        assert_eq!(tree.streams.len(), 1);
        assert_eq!(tree.streams[0].stream_title, "c");
        let mut paths: Vec<&str> = rejections.iter().map(|r| r.path.as_str()).collect();
        paths.sort();
        assert_eq!(paths, vec!["1", "2"]);
        assert!(rejections
            .iter()
            .all(|r| r.reason == RejectReason::DuplicateOrder { order: 1 }));
    }

    #[test]
    fn scenario_without_placed_stream_is_orphaned() {
        let mut validated = form_with(Family::Stream, vec![(path(&[1]), stream_record(0, 1, "s"))]);
        validated.records.entry(Family::Scenario).or_default().extend([
            (
                path(&[1, 1]),
                record(1, 1, &[("scenario_name", FieldValue::Text("kept".into()))]),
            ),
            (
                path(&[2, 1]),
                record(2, 1, &[("scenario_name", FieldValue::Text("orphan".into()))]),
            ),
        ]);

        let (tree, rejections) = assemble(validated, &Lookups::default(), Default::default());
        assert_eq!(tree.streams[0].scenarios.len(), 1);
        assert_eq!(tree.streams[0].scenarios[0].scenario_name, "kept");
        assert_eq!(
            rejections,
            vec![Rejection {
                family: Family::Scenario,
                path: "2_1".into(),
                reason: RejectReason::Orphaned,
            }]
        );
    }

    #[test]
    fn one_scenario_per_stream_keeps_lowest_order() {
        let mut validated = form_with(Family::Stream, vec![(path(&[1]), stream_record(0, 1, "s"))]);
        validated.records.entry(Family::Scenario).or_default().extend([
            (
                path(&[1, 1]),
                record(1, 2, &[("scenario_name", FieldValue::Text("second".into()))]),
            ),
            (
                path(&[1, 2]),
                record(2, 1, &[("scenario_name", FieldValue::Text("first".into()))]),
            ),
        ]);
        let options = AssembleOptions {
            one_scenario_per_stream: true,
            ..Default::default()
        };

        let (tree, rejections) = assemble(validated, &Lookups::default(), options);
        assert_eq!(tree.streams[0].scenarios.len(), 1);
        assert_eq!(tree.streams[0].scenarios[0].scenario_name, "first");
        assert_eq!(rejections.len(), 1);
        assert_eq!(rejections[0].reason, RejectReason::ExtraScenario);
    }

    #[test]
    fn judgement_collapses_only_when_both_texts_blank() {
        let lookups = Lookups::default();
        assert!(judgement(None, None, Some(3), &lookups).is_empty());

        let j = judgement(Some("Outcome"), None, Some(3), &lookups);
        assert_eq!(j.title.as_deref(), Some("Outcome"));
        assert_eq!(j.explanation.as_deref(), Some(""));
        assert_eq!(j.name.as_deref(), Some("Moderate"));
    }

    #[test]
    fn policy_parses_from_config_values() {
        assert_eq!(
            "reject".parse::<DuplicateOrderPolicy>(),
            Ok(DuplicateOrderPolicy::RejectDuplicates)
        );
        assert_eq!(
            "last-write-wins".parse::<DuplicateOrderPolicy>(),
            Ok(DuplicateOrderPolicy::LastWriteWins)
        );
        assert!("sometimes".parse::<DuplicateOrderPolicy>().is_err());
    }
}
