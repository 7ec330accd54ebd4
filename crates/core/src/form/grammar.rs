//! Field-name grammar for evidence profile submissions.
//!
//! Every keyed object family is described by one entry in a static table: the literal pieces of
//! its field names, how many numeric path segments they carry, and the closed list of attribute
//! names. The table is compiled to anchored regular expressions once per process.
//!
//! Because each pattern is anchored and ends in a closed attribute alternation, no field name
//! can match two entries. Should the table ever grow an overlap, [`FieldGrammar::match_key`]
//! returns the first matching entry in table order.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// The object families carried by a submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Inference,
    Stream,
    Scenario,
    EffectTag,
    Study,
    IncreaseFactor,
    DecreaseFactor,
}

impl Family {
    /// Every family, parents before children.
    pub const ALL: [Family; 7] = [
        Family::Inference,
        Family::Stream,
        Family::Scenario,
        Family::EffectTag,
        Family::Study,
        Family::IncreaseFactor,
        Family::DecreaseFactor,
    ];

    /// The family whose objects own objects of this family.
    pub fn parent(self) -> Option<Family> {
        match self {
            Family::Inference | Family::Stream => None,
            Family::Scenario => Some(Family::Stream),
            Family::EffectTag | Family::IncreaseFactor | Family::DecreaseFactor => {
                Some(Family::Scenario)
            }
            Family::Study => Some(Family::EffectTag),
        }
    }

    /// Number of numeric path segments in this family's field names.
    pub fn arity(self) -> usize {
        match self.parent() {
            None => 1,
            Some(parent) => parent.arity() + 1,
        }
    }

    /// Whether the declared `order` stays on the assembled object.
    pub fn retains_order(self) -> bool {
        matches!(self, Family::Stream | Family::Scenario)
    }

    /// Attribute names accepted after the path, excluding `order`.
    pub fn attributes(self) -> &'static [&'static str] {
        match self {
            Family::Inference => &["title", "description"],
            Family::Stream => &[
                "pk",
                "stream_type",
                "stream_title",
                "confidence_judgement_title",
                "confidence_judgement_score",
                "confidence_judgement_explanation",
                "summary_of_findings_title",
                "summary_of_findings_summary",
            ],
            Family::Scenario => &[
                "pk",
                "scenario_name",
                "outcome_title",
                "outcome_explanation",
                "outcome_score",
                "summary_of_findings_title",
                "summary_of_findings_summary",
            ],
            Family::EffectTag | Family::Study => &["pk"],
            Family::IncreaseFactor | Family::DecreaseFactor => &["pk", "explanation"],
        }
    }

    /// Render a field name for this family. Used to re-flatten assembled trees.
    pub fn field_name(self, path: &IndexPath, attribute: &str) -> String {
        let seg = &path.0;
        match self {
            Family::Inference => format!("inference_{}_{attribute}", seg[0]),
            Family::Stream => format!("stream_{}_{attribute}", seg[0]),
            Family::Scenario => format!("stream_{}_{}_scenario_{attribute}", seg[0], seg[1]),
            Family::EffectTag => format!(
                "stream_{}_{}_{}_effectTag_{attribute}",
                seg[0], seg[1], seg[2]
            ),
            Family::Study => format!(
                "stream_{}_{}_{}_{}_study_{attribute}",
                seg[0], seg[1], seg[2], seg[3]
            ),
            Family::IncreaseFactor => format!(
                "stream_{}_{}_increase_{}_confidenceFactor_{attribute}",
                seg[0], seg[1], seg[2]
            ),
            Family::DecreaseFactor => format!(
                "stream_{}_{}_decrease_{}_confidenceFactor_{attribute}",
                seg[0], seg[1], seg[2]
            ),
        }
    }

    fn pattern(self) -> String {
        let mut attributes: Vec<&str> = self.attributes().to_vec();
        attributes.push(ORDER_FIELD);
        let attr = attributes.join("|");
        let n = r"(\d+)";
        let body = match self {
            Family::Inference => format!("inference_{n}"),
            Family::Stream => format!("stream_{n}"),
            Family::Scenario => format!("stream_{n}_{n}_scenario"),
            Family::EffectTag => format!("stream_{n}_{n}_{n}_effectTag"),
            Family::Study => format!("stream_{n}_{n}_{n}_{n}_study"),
            Family::IncreaseFactor => format!("stream_{n}_{n}_increase_{n}_confidenceFactor"),
            Family::DecreaseFactor => format!("stream_{n}_{n}_decrease_{n}_confidenceFactor"),
        };
        format!("^{body}_({attr})$")
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Family::Inference => "inference",
            Family::Stream => "stream",
            Family::Scenario => "scenario",
            Family::EffectTag => "effect_tag",
            Family::Study => "study",
            Family::IncreaseFactor => "increase_factor",
            Family::DecreaseFactor => "decrease_factor",
        };
        f.write_str(name)
    }
}

/// Name of the ordering attribute shared by every family.
pub const ORDER_FIELD: &str = "order";

/// The numeric path embedded in a field name, e.g. `[2, 1, 3]` for `stream_2_1_3_effectTag_pk`.
///
/// Segments are always positive. The parent object's path is this path minus its last segment;
/// top-level objects have the empty path as parent.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct IndexPath(Vec<u32>);

impl IndexPath {
    /// Builds a path, rejecting zero segments.
    pub fn new(segments: Vec<u32>) -> Option<Self> {
        if segments.contains(&0) {
            return None;
        }
        Some(Self(segments))
    }

    /// The empty path that top-level objects hang from.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Path of the owning object.
    pub fn parent(&self) -> IndexPath {
        let mut segments = self.0.clone();
        segments.pop();
        Self(segments)
    }

    /// Path of a child at `index` (1-based) below this one.
    pub fn child(&self, index: u32) -> IndexPath {
        let mut segments = self.0.clone();
        segments.push(index);
        Self(segments)
    }
}

impl fmt::Display for IndexPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u32::to_string).collect();
        f.write_str(&parts.join("_"))
    }
}

impl Serialize for IndexPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// A field name successfully split by the grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldName {
    pub family: Family,
    pub path: IndexPath,
    pub attribute: String,
}

/// Outcome of matching one submitted key against the grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyMatch {
    /// The key belongs to no family.
    Unmatched,
    /// The key has a family's shape but a path segment is zero or out of range.
    MalformedPath { family: Family, raw_path: String },
    Field(FieldName),
}

/// The compiled family table.
pub struct FieldGrammar {
    entries: Vec<(Family, Regex)>,
}

static SHARED: Lazy<FieldGrammar> = Lazy::new(FieldGrammar::compile);

impl FieldGrammar {
    /// The process-wide grammar, compiled on first use.
    pub fn shared() -> &'static FieldGrammar {
        &SHARED
    }

    fn compile() -> Self {
        let entries = Family::ALL
            .iter()
            .map(|family| {
                let re = Regex::new(&family.pattern())
                    .unwrap_or_else(|e| panic!("field pattern for {family} is invalid: {e}"));
                (*family, re)
            })
            .collect();
        Self { entries }
    }

    /// Match a submitted key against the family table.
    pub fn match_key(&self, key: &str) -> KeyMatch {
        for (family, re) in &self.entries {
            let Some(caps) = re.captures(key) else {
                continue;
            };

            let arity = family.arity();
            let raw: Vec<&str> = (1..=arity)
                .filter_map(|i| caps.get(i).map(|m| m.as_str()))
                .collect();
            let parsed: Option<Vec<u32>> = raw.iter().map(|s| s.parse::<u32>().ok()).collect();
            let path = parsed.and_then(IndexPath::new);

            return match (path, caps.get(arity + 1)) {
                (Some(path), Some(attr)) => KeyMatch::Field(FieldName {
                    family: *family,
                    path,
                    attribute: attr.as_str().to_string(),
                }),
                _ => KeyMatch::MalformedPath {
                    family: *family,
                    raw_path: raw.join("_"),
                },
            };
        }
        KeyMatch::Unmatched
    }
}
