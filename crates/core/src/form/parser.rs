//! First pass over a submission: bucket field values into provisional objects.
//!
//! Nothing here decides whether an object is complete. Each family gets a map from index path
//! to the raw attribute values seen for it, plus the position at which the object was first
//! seen, which later decides which of two objects claiming the same order slot is "later".

use super::grammar::{Family, FieldGrammar, IndexPath, KeyMatch};
use super::{FormFields, RejectReason, Rejection};
use std::collections::BTreeMap;

/// Raw attribute values collected for one object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProvisionalRecord {
    /// Submission position of the first field seen for this object.
    pub seq: usize,
    pub fields: BTreeMap<String, String>,
}

/// Output of [`parse_fields`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedForm {
    pub records: BTreeMap<Family, BTreeMap<IndexPath, ProvisionalRecord>>,
    pub rejections: Vec<Rejection>,
}

/// Bucket every matching field into its family's provisional objects.
///
/// Keys that match no family (the profile header, CSRF tokens, widget helpers) are skipped
/// silently. Keys with a family's shape but an invalid path are reported as
/// [`RejectReason::MalformedPath`]. A key submitted twice keeps its last value.
pub fn parse_fields(grammar: &FieldGrammar, form: &FormFields) -> ParsedForm {
    let mut records: BTreeMap<Family, BTreeMap<IndexPath, ProvisionalRecord>> = BTreeMap::new();
    let mut rejections = Vec::new();

    for (seq, (key, value)) in form.iter().enumerate() {
        match grammar.match_key(key) {
            KeyMatch::Unmatched => {}
            KeyMatch::MalformedPath { family, raw_path } => {
                tracing::debug!(key, "ignoring field with malformed index path");
                rejections.push(Rejection {
                    family,
                    path: raw_path,
                    reason: RejectReason::MalformedPath,
                });
            }
            KeyMatch::Field(field) => {
                let record = records
                    .entry(field.family)
                    .or_default()
                    .entry(field.path)
                    .or_insert_with(|| ProvisionalRecord {
                        seq,
                        fields: BTreeMap::new(),
                    });
                record.fields.insert(field.attribute, value.to_string());
            }
        }
    }

    ParsedForm {
        records,
        rejections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormFields {
        pairs.iter().copied().collect()
    }

    fn path(segments: &[u32]) -> IndexPath {
        IndexPath::new(segments.to_vec()).unwrap()
    }

    #[test]
    fn buckets_fields_by_family_and_path() {
        let parsed = parse_fields(
            FieldGrammar::shared(),
            &form(&[
                ("title", "Profile"),
                ("stream_1_stream_title", "Human"),
                ("stream_1_order", "1"),
                ("stream_2_order", "2"),
                ("stream_1_1_scenario_scenario_name", "S1"),
            ]),
        );

        let streams = parsed.records.get(&Family::Stream).unwrap();
        assert_eq!(streams.len(), 2);
        let first = &streams[&path(&[1])];
        assert_eq!(first.fields["stream_title"], "Human");
        assert_eq!(first.fields["order"], "1");
        assert_eq!(first.seq, 1);

        let scenarios = parsed.records.get(&Family::Scenario).unwrap();
        assert_eq!(scenarios[&path(&[1, 1])].fields["scenario_name"], "S1");
        assert!(parsed.records.get(&Family::Inference).is_none());
        assert!(parsed.rejections.is_empty());
    }

    #[test]
    fn repeated_key_keeps_last_value_and_first_position() {
        let parsed = parse_fields(
            FieldGrammar::shared(),
            &form(&[
                ("inference_1_title", "first"),
                ("inference_1_order", "1"),
                ("inference_1_title", "second"),
            ]),
        );
        let record = &parsed.records.get(&Family::Inference).unwrap()[&path(&[1])];
        assert_eq!(record.fields["title"], "second");
        assert_eq!(record.seq, 0);
    }

    #[test]
    fn malformed_paths_are_reported_not_bucketed() {
        let parsed = parse_fields(
            FieldGrammar::shared(),
            &form(&[("stream_0_order", "1"), ("stream_1_0_scenario_order", "1")]),
        );
        assert!(parsed.records.is_empty());
        assert_eq!(parsed.rejections.len(), 2);
        assert!(parsed
            .rejections
            .iter()
            .all(|r| r.reason == RejectReason::MalformedPath));
    }
}
