//! Relational persistence for evidence profiles.
//!
//! One row per profile, one per stream (keyed to its profile) and one per scenario (keyed to its
//! stream). Judgement, summary, study and factor sub-objects are held as JSON values, the way the
//! relational store keeps them in JSON columns.
//!
//! [`ProfileStore`] is the boundary to the backing store. [`diff::plan_writes`] turns a freshly
//! assembled tree into a [`WritePlan`], which a store computes and applies in one atomic step.

pub mod diff;
pub mod memory;

pub use diff::{
    plan_writes, ExistingChildren, PlanSummary, PlannedScenario, PlannedStream, RowAction,
    WritePlan,
};
pub use memory::InMemoryStore;

use crate::error::{StoreError, StoreResult};
use crate::profile::{CrossStreamConclusions, EvidenceProfile, Scenario, Stream};
use chrono::{DateTime, Utc};
use ep_types::{NonEmptyText, Order, Slug};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Profile columns, without the identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileData {
    pub assessment_id: i64,
    pub title: NonEmptyText,
    pub slug: Slug,
    pub caption: String,
    pub one_scenario_per_stream: bool,
    pub cross_stream_conclusions: Value,
    pub last_updated: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: i64,
    #[serde(flatten)]
    pub data: ProfileData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamData {
    pub stream_type: i64,
    pub stream_title: String,
    pub order: Order,
    pub confidence_judgement: Value,
    pub summary_of_findings: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamRow {
    pub id: i64,
    pub profile_id: i64,
    #[serde(flatten)]
    pub data: StreamData,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioData {
    pub scenario_name: String,
    pub order: Order,
    pub outcome: Value,
    pub summary_of_findings: Value,
    pub studies: Value,
    pub confidencefactors_increase: Value,
    pub confidencefactors_decrease: Value,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRow {
    pub id: i64,
    pub stream_id: i64,
    #[serde(flatten)]
    pub data: ScenarioData,
}

/// A stream row together with its scenario rows.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredStream {
    pub row: StreamRow,
    pub scenarios: Vec<ScenarioRow>,
}

fn to_json<T: Serialize>(value: &T) -> StoreResult<Value> {
    serde_json::to_value(value).map_err(StoreError::Serialization)
}

fn from_json<T: serde::de::DeserializeOwned>(value: &Value) -> StoreResult<T> {
    T::deserialize(value).map_err(StoreError::Deserialization)
}

impl ProfileData {
    pub fn from_profile(profile: &EvidenceProfile, last_updated: DateTime<Utc>) -> StoreResult<Self> {
        Ok(Self {
            assessment_id: profile.assessment_id,
            title: profile.title.clone(),
            slug: profile.slug.clone(),
            caption: profile.caption.clone(),
            one_scenario_per_stream: profile.one_scenario_per_stream,
            cross_stream_conclusions: to_json(&profile.cross_stream_conclusions)?,
            last_updated,
        })
    }
}

impl StreamData {
    pub fn from_stream(stream: &Stream) -> StoreResult<Self> {
        Ok(Self {
            stream_type: stream.stream_type,
            stream_title: stream.stream_title.clone(),
            order: stream.order,
            confidence_judgement: to_json(&stream.confidence_judgement)?,
            summary_of_findings: to_json(&stream.summary_of_findings)?,
        })
    }
}

impl ScenarioData {
    pub fn from_scenario(scenario: &Scenario) -> StoreResult<Self> {
        Ok(Self {
            scenario_name: scenario.scenario_name.clone(),
            order: scenario.order,
            outcome: to_json(&scenario.outcome)?,
            summary_of_findings: to_json(&scenario.summary_of_findings)?,
            studies: to_json(&scenario.studies)?,
            confidencefactors_increase: to_json(&scenario.confidencefactors_increase)?,
            confidencefactors_decrease: to_json(&scenario.confidencefactors_decrease)?,
        })
    }
}

impl ScenarioRow {
    fn to_scenario(&self) -> StoreResult<Scenario> {
        let d = &self.data;
        Ok(Scenario {
            id: Some(self.id),
            scenario_name: d.scenario_name.clone(),
            order: d.order,
            outcome: from_json(&d.outcome)?,
            summary_of_findings: from_json(&d.summary_of_findings)?,
            studies: from_json(&d.studies)?,
            confidencefactors_increase: from_json(&d.confidencefactors_increase)?,
            confidencefactors_decrease: from_json(&d.confidencefactors_decrease)?,
        })
    }
}

impl StoredStream {
    fn to_stream(&self) -> StoreResult<Stream> {
        let d = &self.row.data;
        let mut scenarios = self
            .scenarios
            .iter()
            .map(ScenarioRow::to_scenario)
            .collect::<StoreResult<Vec<_>>>()?;
        scenarios.sort_by_key(|s| s.order);
        Ok(Stream {
            id: Some(self.row.id),
            stream_type: d.stream_type,
            stream_title: d.stream_title.clone(),
            order: d.order,
            confidence_judgement: from_json(&d.confidence_judgement)?,
            summary_of_findings: from_json(&d.summary_of_findings)?,
            scenarios,
        })
    }
}

/// Rebuild the document from its rows, streams and scenarios sorted by stored order.
pub fn profile_from_rows(row: &ProfileRow, streams: &[StoredStream]) -> StoreResult<EvidenceProfile> {
    let mut streams = streams
        .iter()
        .map(StoredStream::to_stream)
        .collect::<StoreResult<Vec<_>>>()?;
    streams.sort_by_key(|s| s.order);

    let conclusions: CrossStreamConclusions = from_json(&row.data.cross_stream_conclusions)?;
    Ok(EvidenceProfile {
        id: Some(row.id),
        assessment_id: row.data.assessment_id,
        title: row.data.title.clone(),
        slug: row.data.slug.clone(),
        caption: row.data.caption.clone(),
        one_scenario_per_stream: row.data.one_scenario_per_stream,
        cross_stream_conclusions: conclusions,
        streams,
        last_updated: Some(row.data.last_updated),
    })
}

/// Storage for profiles and their child rows.
///
/// Implementations must run [`ProfileStore::replace_children`] atomically: the diff is taken
/// against the children as they stand when the write starts, and on any error none of its
/// writes may be visible afterwards.
pub trait ProfileStore: Send + Sync {
    /// Insert a profile row with no children and return its id.
    ///
    /// # Errors
    ///
    /// [`StoreError::SlugConflict`] if the assessment already has a profile with this slug.
    fn insert_profile(&self, data: &ProfileData) -> StoreResult<i64>;

    fn find_profile(&self, assessment_id: i64, slug: &str) -> StoreResult<Option<ProfileRow>>;

    /// Profiles of an assessment, ordered by id.
    fn list_profiles(&self, assessment_id: i64) -> StoreResult<Vec<ProfileRow>>;

    /// Delete a profile together with its streams and scenarios.
    fn delete_profile(&self, profile_id: i64) -> StoreResult<()>;

    fn load_streams(&self, profile_id: i64) -> StoreResult<Vec<StoredStream>>;

    /// Rewrite the profile row and make its children match `streams`, in one transaction.
    ///
    /// Returns the plan that was applied.
    ///
    /// # Errors
    ///
    /// [`StoreError::ForeignRow`] if `streams` names a row that belongs to another profile,
    /// [`StoreError::SlugConflict`] if the new slug is taken. Either aborts the whole write.
    fn replace_children(
        &self,
        profile_id: i64,
        data: &ProfileData,
        streams: &[Stream],
    ) -> StoreResult<WritePlan>;
}
