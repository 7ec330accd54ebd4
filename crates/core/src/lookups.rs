//! Lookup tables consulted while validating a submission.
//!
//! Stream types, confidence judgements and confidence factors are owned by other parts of the
//! application. This module holds a read-only snapshot of them, loaded once at startup either
//! from built-in defaults or from a YAML file.
//!
//! The YAML file uses a strict schema (`deny_unknown_fields`) and errors carry the path to the
//! offending entry, e.g. `confidence_factors[3].pool`.

use crate::error::LookupError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Which side of a scenario's judgement a confidence factor argues for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactorPool {
    Increase,
    Decrease,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceFactor {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub pool: FactorPool,
}

/// Named values accepted in an enumerated field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NamedValueWire {
    value: i64,
    name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfidenceFactorWire {
    id: i64,
    name: String,
    #[serde(default)]
    description: String,
    pool: FactorPool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LookupsWire {
    stream_types: Vec<NamedValueWire>,
    confidence_judgements: Vec<NamedValueWire>,
    confidence_factors: Vec<ConfidenceFactorWire>,
}

/// Snapshot of the lookup tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lookups {
    stream_types: BTreeMap<i64, String>,
    judgements: BTreeMap<i64, String>,
    factors: BTreeMap<i64, ConfidenceFactor>,
}

impl Lookups {
    /// Parse lookups from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] if the YAML does not match the schema, a table is empty, or a key
    /// repeats within a table. A confidence factor can only sit in one pool, so an id listed
    /// twice (even once per pool) is a duplicate.
    pub fn from_yaml(yaml_text: &str) -> Result<Self, LookupError> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);
        let wire = match serde_path_to_error::deserialize::<_, LookupsWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let path = if path.is_empty() || path == "." {
                    "<root>".to_string()
                } else {
                    path
                };
                return Err(LookupError::Schema {
                    path,
                    message: err.into_inner().to_string(),
                });
            }
        };

        wire_to_domain(wire)
    }

    /// Read lookups from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, LookupError> {
        let text = std::fs::read_to_string(path).map_err(LookupError::FileRead)?;
        Self::from_yaml(&text)
    }

    pub fn is_stream_type(&self, value: i64) -> bool {
        self.stream_types.contains_key(&value)
    }

    pub fn is_judgement(&self, value: i64) -> bool {
        self.judgements.contains_key(&value)
    }

    /// Display name for a confidence judgement score.
    pub fn judgement_name(&self, value: i64) -> Option<&str> {
        self.judgements.get(&value).map(String::as_str)
    }

    /// Whether `id` is a confidence factor in the given pool.
    pub fn is_factor_in(&self, id: i64, pool: FactorPool) -> bool {
        self.factors.get(&id).is_some_and(|f| f.pool == pool)
    }

}

impl Default for Lookups {
    fn default() -> Self {
        let stream_types = [(1, "Human"), (2, "Animal"), (3, "Mechanistic")];
        let judgements = [
            (0, "Indeterminate"),
            (1, "Inadequate"),
            (2, "Slight"),
            (3, "Moderate"),
            (4, "Robust"),
        ];
        let factors = [
            (1, "Consistency", FactorPool::Increase),
            (2, "Dose-response gradient", FactorPool::Increase),
            (3, "Large or concerning magnitude of effect", FactorPool::Increase),
            (4, "Coherence of effects", FactorPool::Increase),
            (5, "Mechanistic evidence providing plausibility", FactorPool::Increase),
            (6, "Risk of bias", FactorPool::Decrease),
            (7, "Unexplained inconsistency", FactorPool::Decrease),
            (8, "Imprecision", FactorPool::Decrease),
            (9, "Indirectness or lack of specificity", FactorPool::Decrease),
            (10, "Evidence of publication bias", FactorPool::Decrease),
        ];

        Self {
            stream_types: stream_types
                .into_iter()
                .map(|(v, n)| (v, n.to_string()))
                .collect(),
            judgements: judgements
                .into_iter()
                .map(|(v, n)| (v, n.to_string()))
                .collect(),
            factors: factors
                .into_iter()
                .map(|(id, name, pool)| {
                    (
                        id,
                        ConfidenceFactor {
                            id,
                            name: name.to_string(),
                            description: String::new(),
                            pool,
                        },
                    )
                })
                .collect(),
        }
    }
}

fn named_values(
    table: &'static str,
    entries: Vec<NamedValueWire>,
) -> Result<BTreeMap<i64, String>, LookupError> {
    if entries.is_empty() {
        return Err(LookupError::EmptyTable(table));
    }
    let mut map = BTreeMap::new();
    for entry in entries {
        if map.insert(entry.value, entry.name).is_some() {
            return Err(LookupError::DuplicateKey {
                table,
                key: entry.value,
            });
        }
    }
    Ok(map)
}

fn wire_to_domain(wire: LookupsWire) -> Result<Lookups, LookupError> {
    let stream_types = named_values("stream_types", wire.stream_types)?;
    let judgements = named_values("confidence_judgements", wire.confidence_judgements)?;

    let mut factors = BTreeMap::new();
    for f in wire.confidence_factors {
        let id = f.id;
        let factor = ConfidenceFactor {
            id,
            name: f.name,
            description: f.description,
            pool: f.pool,
        };
        if factors.insert(id, factor).is_some() {
            return Err(LookupError::DuplicateKey {
                table: "confidence_factors",
                key: id,
            });
        }
    }

    Ok(Lookups {
        stream_types,
        judgements,
        factors,
    })
}
