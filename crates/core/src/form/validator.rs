//! Per-family field rules and the filter that applies them.
//!
//! An object either passes every rule and comes out with typed values, or it is dropped whole
//! with one [`Rejection`] naming the first rule it broke. Nothing is partially kept.

use super::grammar::{Family, IndexPath, ORDER_FIELD};
use super::parser::{ParsedForm, ProvisionalRecord};
use super::{RejectReason, Rejection};
use crate::lookups::{FactorPool, Lookups};
use ep_types::Order;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
}

/// Lookup table an enumerated field must draw from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptionSet {
    StreamTypes,
    Judgements,
    Factors(FactorPool),
}

impl OptionSet {
    fn allows(self, lookups: &Lookups, value: i64) -> bool {
        match self {
            OptionSet::StreamTypes => lookups.is_stream_type(value),
            OptionSet::Judgements => lookups.is_judgement(value),
            OptionSet::Factors(pool) => lookups.is_factor_in(value, pool),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldRule {
    pub name: &'static str,
    pub required: bool,
    pub kind: FieldKind,
    pub can_be_empty: bool,
    pub options: Option<OptionSet>,
}

const fn text(name: &'static str, required: bool, can_be_empty: bool) -> FieldRule {
    FieldRule {
        name,
        required,
        kind: FieldKind::Text,
        can_be_empty,
        options: None,
    }
}

const fn integer(
    name: &'static str,
    required: bool,
    can_be_empty: bool,
    options: Option<OptionSet>,
) -> FieldRule {
    FieldRule {
        name,
        required,
        kind: FieldKind::Integer,
        can_be_empty,
        options,
    }
}

const INFERENCE_RULES: &[FieldRule] = &[
    text("title", true, false),
    text("description", true, true),
];

const STREAM_RULES: &[FieldRule] = &[
    integer("pk", false, true, None),
    integer("stream_type", true, false, Some(OptionSet::StreamTypes)),
    text("stream_title", true, false),
    text("confidence_judgement_title", false, true),
    integer(
        "confidence_judgement_score",
        false,
        true,
        Some(OptionSet::Judgements),
    ),
    text("confidence_judgement_explanation", false, true),
    text("summary_of_findings_title", false, true),
    text("summary_of_findings_summary", false, true),
];

const SCENARIO_RULES: &[FieldRule] = &[
    integer("pk", false, true, None),
    text("scenario_name", true, false),
    text("outcome_title", false, true),
    text("outcome_explanation", false, true),
    integer("outcome_score", false, true, Some(OptionSet::Judgements)),
    text("summary_of_findings_title", false, true),
    text("summary_of_findings_summary", false, true),
];

const REFERENCE_RULES: &[FieldRule] = &[integer("pk", true, false, None)];

const INCREASE_FACTOR_RULES: &[FieldRule] = &[
    integer(
        "pk",
        true,
        false,
        Some(OptionSet::Factors(FactorPool::Increase)),
    ),
    text("explanation", false, true),
];

const DECREASE_FACTOR_RULES: &[FieldRule] = &[
    integer(
        "pk",
        true,
        false,
        Some(OptionSet::Factors(FactorPool::Decrease)),
    ),
    text("explanation", false, true),
];

/// Field rules for a family, excluding the mandatory `order` field.
pub fn rules(family: Family) -> &'static [FieldRule] {
    match family {
        Family::Inference => INFERENCE_RULES,
        Family::Stream => STREAM_RULES,
        Family::Scenario => SCENARIO_RULES,
        Family::EffectTag | Family::Study => REFERENCE_RULES,
        Family::IncreaseFactor => INCREASE_FACTOR_RULES,
        Family::DecreaseFactor => DECREASE_FACTOR_RULES,
    }
}

/// A converted field value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    /// Present but submitted as the empty string.
    Empty,
}

/// An object that passed every rule of its family.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidRecord {
    pub seq: usize,
    pub order: Order,
    pub fields: BTreeMap<&'static str, FieldValue>,
}

impl ValidRecord {
    /// Text value of a field; empty or absent fields yield `None`.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name) {
            Some(FieldValue::Text(s)) => Some(s),
            _ => None,
        }
    }

    /// Text value of a field, or the empty string.
    pub fn text_or_empty(&self, name: &str) -> String {
        self.text(name).unwrap_or_default().to_string()
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        match self.fields.get(name) {
            Some(FieldValue::Integer(v)) => Some(*v),
            _ => None,
        }
    }
}

/// Output of [`validate`]: the surviving objects per family.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidatedForm {
    pub records: BTreeMap<Family, BTreeMap<IndexPath, ValidRecord>>,
}

/// Check one object against its family's rules.
pub fn validate_record(
    family: Family,
    record: &ProvisionalRecord,
    lookups: &Lookups,
) -> Result<ValidRecord, RejectReason> {
    let order = record
        .fields
        .get(ORDER_FIELD)
        .ok_or(RejectReason::InvalidOrder)
        .and_then(|raw| Order::parse(raw).map_err(|_| RejectReason::InvalidOrder))?;

    let mut fields = BTreeMap::new();
    for rule in rules(family) {
        let Some(raw) = record.fields.get(rule.name) else {
            if rule.required {
                return Err(RejectReason::MissingField(rule.name));
            }
            continue;
        };

        if raw.is_empty() {
            if !rule.can_be_empty {
                return Err(RejectReason::EmptyField(rule.name));
            }
            fields.insert(rule.name, FieldValue::Empty);
            continue;
        }

        let value = match rule.kind {
            FieldKind::Text => FieldValue::Text(raw.clone()),
            FieldKind::Integer => {
                let parsed: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| RejectReason::NotAnInteger(rule.name))?;
                if let Some(options) = rule.options {
                    if !options.allows(lookups, parsed) {
                        return Err(RejectReason::NotAnOption(rule.name));
                    }
                }
                FieldValue::Integer(parsed)
            }
        };
        fields.insert(rule.name, value);
    }

    Ok(ValidRecord {
        seq: record.seq,
        order,
        fields,
    })
}

/// Keep only the objects that satisfy every rule of their family.
///
/// Returns the surviving objects and one rejection per dropped object. Rejections already
/// carried by `parsed` are passed through first.
pub fn validate(parsed: ParsedForm, lookups: &Lookups) -> (ValidatedForm, Vec<Rejection>) {
    let mut rejections = parsed.rejections;
    let mut validated = ValidatedForm::default();

    for (family, records) in parsed.records {
        let mut valid = BTreeMap::new();
        for (path, record) in records {
            match validate_record(family, &record, lookups) {
                Ok(v) => {
                    valid.insert(path, v);
                }
                Err(reason) => {
                    tracing::debug!(%family, %path, ?reason, "dropping invalid object");
                    rejections.push(Rejection {
                        family,
                        path: path.to_string(),
                        reason,
                    });
                }
            }
        }
        validated.records.insert(family, valid);
    }

    (validated, rejections)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> ProvisionalRecord {
        ProvisionalRecord {
            seq: 0,
            fields: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    fn stream(extra: &[(&str, &str)]) -> ProvisionalRecord {
        let mut pairs = vec![("stream_type", "2"), ("stream_title", "Animal"), ("order", "1")];
        pairs.extend_from_slice(extra);
        record(&pairs)
    }

    fn check(family: Family, r: &ProvisionalRecord) -> Result<ValidRecord, RejectReason> {
        validate_record(family, r, &Lookups::default())
    }

    #[test]
    fn accepts_minimal_stream_and_converts_integers() {
        let v = check(Family::Stream, &stream(&[("pk", "")])).expect("valid stream");
        assert_eq!(v.integer("stream_type"), Some(2));
        assert_eq!(v.text("stream_title"), Some("Animal"));
        assert_eq!(v.fields["pk"], FieldValue::Empty);
        assert_eq!(v.order.get(), 1);
    }

    #[test]
    fn order_is_mandatory_and_positive() {
        for bad in ["", "0", "-1", "first"] {
            let r = stream(&[("order", bad)]);
            assert_eq!(check(Family::Stream, &r), Err(RejectReason::InvalidOrder), "{bad}");
        }
        let mut r = stream(&[]);
        r.fields.remove("order");
        assert_eq!(check(Family::Stream, &r), Err(RejectReason::InvalidOrder));
    }

    #[test]
    fn required_and_empty_rules() {
        let mut r = stream(&[]);
        r.fields.remove("stream_title");
        assert_eq!(
            check(Family::Stream, &r),
            Err(RejectReason::MissingField("stream_title"))
        );

        let r = stream(&[("stream_title", "")]);
        assert_eq!(
            check(Family::Stream, &r),
            Err(RejectReason::EmptyField("stream_title"))
        );

        let r = record(&[("title", "Inference"), ("order", "1")]);
        assert_eq!(
            check(Family::Inference, &r),
            Err(RejectReason::MissingField("description"))
        );
        let r = record(&[("title", "Inference"), ("description", ""), ("order", "1")]);
        assert!(check(Family::Inference, &r).is_ok());
    }

    #[test]
    fn integer_and_option_rules() {
        let r = stream(&[("stream_type", "human")]);
        assert_eq!(
            check(Family::Stream, &r),
            Err(RejectReason::NotAnInteger("stream_type"))
        );

        let r = stream(&[("stream_type", "42")]);
        assert_eq!(
            check(Family::Stream, &r),
            Err(RejectReason::NotAnOption("stream_type"))
        );

        let r = stream(&[("confidence_judgement_score", "")]);
        assert!(check(Family::Stream, &r).is_ok());

        let r = stream(&[("confidence_judgement_score", "9")]);
        assert_eq!(
            check(Family::Stream, &r),
            Err(RejectReason::NotAnOption("confidence_judgement_score"))
        );
    }

    #[test]
    fn confidence_factor_must_come_from_its_own_pool() {
        let increase = record(&[("pk", "1"), ("order", "1")]);
        assert!(check(Family::IncreaseFactor, &increase).is_ok());
        assert_eq!(
            check(Family::DecreaseFactor, &increase),
            Err(RejectReason::NotAnOption("pk"))
        );

        let decrease = record(&[("pk", "6"), ("explanation", "high RoB"), ("order", "2")]);
        let v = check(Family::DecreaseFactor, &decrease).expect("decrease factor");
        assert_eq!(v.text("explanation"), Some("high RoB"));
    }

    #[test]
    fn validate_splits_valid_and_rejected() {
        let mut parsed = ParsedForm::default();
        let mut streams = BTreeMap::new();
        streams.insert(IndexPath::new(vec![1]).unwrap(), stream(&[]));
        streams.insert(IndexPath::new(vec![2]).unwrap(), stream(&[("order", "0")]));
        parsed.records.insert(Family::Stream, streams);

        let (validated, rejections) = validate(parsed, &Lookups::default());
        assert_eq!(validated.records.get(&Family::Stream).unwrap().len(), 1);
        assert_eq!(
            rejections,
            vec![Rejection {
                family: Family::Stream,
                path: "2".into(),
                reason: RejectReason::InvalidOrder,
            }]
        );
    }
}
