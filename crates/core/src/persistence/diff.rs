//! Turn an assembled tree into row-level writes against what is already stored.
//!
//! A stream or scenario carrying a positive id is updated in place; anything else is inserted.
//! Stored rows the new tree no longer mentions are deleted, and deleting a stream takes its
//! scenarios with it. Nothing here touches storage.

use super::{ScenarioData, StreamData};
use crate::error::StoreResult;
use crate::profile::Stream;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Stored stream ids of one profile, each with its scenario ids.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExistingChildren {
    pub streams: BTreeMap<i64, BTreeSet<i64>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowAction {
    Update(i64),
    Insert,
}

impl RowAction {
    /// Update when the submitted id is positive and not already claimed in this plan.
    fn for_id(id: Option<i64>, claimed: &mut BTreeSet<i64>) -> Self {
        match id {
            Some(id) if id > 0 && claimed.insert(id) => RowAction::Update(id),
            Some(id) if id > 0 => {
                tracing::debug!(id, "id submitted twice; inserting the second copy");
                RowAction::Insert
            }
            _ => RowAction::Insert,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedScenario {
    pub action: RowAction,
    pub data: ScenarioData,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlannedStream {
    pub action: RowAction,
    pub data: StreamData,
    pub scenarios: Vec<PlannedScenario>,
}

/// Counts of row changes a plan makes, returned to callers after a save.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub streams_inserted: usize,
    pub streams_updated: usize,
    pub streams_deleted: usize,
    pub scenarios_inserted: usize,
    pub scenarios_updated: usize,
    /// Includes scenarios removed along with a deleted stream.
    pub scenarios_deleted: usize,
}

impl PlanSummary {
    pub fn is_pure_update(&self) -> bool {
        self.streams_inserted == 0
            && self.streams_deleted == 0
            && self.scenarios_inserted == 0
            && self.scenarios_deleted == 0
    }
}

/// Row-level writes for one profile save.
///
/// Stores execute it in this order: each stream's update or insert followed by its scenarios'
/// updates and inserts, then scenario deletes, then stream deletes (cascading).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WritePlan {
    pub streams: Vec<PlannedStream>,
    pub delete_scenarios: Vec<i64>,
    pub delete_streams: Vec<i64>,
    pub summary: PlanSummary,
}

/// Diff the assembled streams against the stored children.
///
/// # Errors
///
/// Fails only if a sub-object cannot be encoded as JSON.
pub fn plan_writes(existing: &ExistingChildren, streams: &[Stream]) -> StoreResult<WritePlan> {
    let mut plan = WritePlan::default();
    let mut kept_streams = BTreeSet::new();
    let mut kept_scenarios = BTreeSet::new();

    for stream in streams {
        let action = RowAction::for_id(stream.id, &mut kept_streams);
        match action {
            RowAction::Update(_) => plan.summary.streams_updated += 1,
            RowAction::Insert => plan.summary.streams_inserted += 1,
        }

        let mut scenarios = Vec::with_capacity(stream.scenarios.len());
        for scenario in &stream.scenarios {
            let action = RowAction::for_id(scenario.id, &mut kept_scenarios);
            match action {
                RowAction::Update(_) => plan.summary.scenarios_updated += 1,
                RowAction::Insert => plan.summary.scenarios_inserted += 1,
            }
            scenarios.push(PlannedScenario {
                action,
                data: ScenarioData::from_scenario(scenario)?,
            });
        }

        plan.streams.push(PlannedStream {
            action,
            data: StreamData::from_stream(stream)?,
            scenarios,
        });
    }

    for (stream_id, scenario_ids) in &existing.streams {
        let dropped = scenario_ids.difference(&kept_scenarios).copied();
        if kept_streams.contains(stream_id) {
            plan.delete_scenarios.extend(dropped);
        } else {
            plan.delete_streams.push(*stream_id);
            plan.summary.scenarios_deleted += dropped.count();
        }
    }
    plan.summary.streams_deleted = plan.delete_streams.len();
    plan.summary.scenarios_deleted += plan.delete_scenarios.len();

    Ok(plan)
}
