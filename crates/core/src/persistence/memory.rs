//! Mutex-guarded in-process store.
//!
//! [`ProfileStore::replace_children`] holds the lock from the diff to the commit. Writes are
//! staged on a copy of the tables and swapped in only once every step succeeded.

use super::{
    plan_writes, ExistingChildren, ProfileData, ProfileRow, ProfileStore, RowAction,
    ScenarioRow, StoredStream, StreamRow, WritePlan,
};
use crate::error::{StoreError, StoreResult};
use crate::profile::Stream;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Clone, Debug, Default)]
struct Tables {
    last_id: i64,
    profiles: BTreeMap<i64, ProfileRow>,
    streams: BTreeMap<i64, StreamRow>,
    scenarios: BTreeMap<i64, ScenarioRow>,
}

impl Tables {
    fn allocate(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn check_slug(&self, data: &ProfileData, except: Option<i64>) -> StoreResult<()> {
        let taken = self.profiles.values().any(|p| {
            Some(p.id) != except
                && p.data.assessment_id == data.assessment_id
                && p.data.slug == data.slug
        });
        if taken {
            return Err(StoreError::SlugConflict {
                assessment_id: data.assessment_id,
                slug: data.slug.to_string(),
            });
        }
        Ok(())
    }

    fn owns_stream(&self, profile_id: i64, stream_id: i64) -> bool {
        self.streams
            .get(&stream_id)
            .is_some_and(|s| s.profile_id == profile_id)
    }

    fn owns_scenario(&self, profile_id: i64, scenario_id: i64) -> bool {
        self.scenarios
            .get(&scenario_id)
            .is_some_and(|sc| self.owns_stream(profile_id, sc.stream_id))
    }

    fn existing_children(&self, profile_id: i64) -> ExistingChildren {
        let mut streams: BTreeMap<i64, BTreeSet<i64>> = self
            .streams
            .values()
            .filter(|s| s.profile_id == profile_id)
            .map(|s| (s.id, BTreeSet::new()))
            .collect();
        for sc in self.scenarios.values() {
            if let Some(ids) = streams.get_mut(&sc.stream_id) {
                ids.insert(sc.id);
            }
        }
        ExistingChildren { streams }
    }

    fn remove_stream(&mut self, stream_id: i64) {
        self.streams.remove(&stream_id);
        self.scenarios.retain(|_, sc| sc.stream_id != stream_id);
    }

    fn apply(&mut self, profile_id: i64, data: &ProfileData, plan: &WritePlan) -> StoreResult<()> {
        self.check_slug(data, Some(profile_id))?;
        let profile = self
            .profiles
            .get_mut(&profile_id)
            .ok_or(StoreError::ProfileNotFound(profile_id))?;
        profile.data = data.clone();

        for planned in &plan.streams {
            let stream_id = match planned.action {
                RowAction::Update(id) => {
                    if !self.owns_stream(profile_id, id) {
                        return Err(StoreError::ForeignRow {
                            table: "stream",
                            id,
                            profile_id,
                        });
                    }
                    id
                }
                RowAction::Insert => self.allocate(),
            };
            self.streams.insert(
                stream_id,
                StreamRow {
                    id: stream_id,
                    profile_id,
                    data: planned.data.clone(),
                },
            );

            for scenario in &planned.scenarios {
                let scenario_id = match scenario.action {
                    RowAction::Update(id) => {
                        if !self.owns_scenario(profile_id, id) {
                            return Err(StoreError::ForeignRow {
                                table: "scenario",
                                id,
                                profile_id,
                            });
                        }
                        id
                    }
                    RowAction::Insert => self.allocate(),
                };
                self.scenarios.insert(
                    scenario_id,
                    ScenarioRow {
                        id: scenario_id,
                        stream_id,
                        data: scenario.data.clone(),
                    },
                );
            }
        }

        for &id in &plan.delete_scenarios {
            if !self.owns_scenario(profile_id, id) {
                return Err(StoreError::ForeignRow {
                    table: "scenario",
                    id,
                    profile_id,
                });
            }
            self.scenarios.remove(&id);
        }
        for &id in &plan.delete_streams {
            if !self.owns_stream(profile_id, id) {
                return Err(StoreError::ForeignRow {
                    table: "stream",
                    id,
                    profile_id,
                });
            }
            self.remove_stream(id);
        }
        Ok(())
    }
}

/// Profile store kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl ProfileStore for InMemoryStore {
    fn insert_profile(&self, data: &ProfileData) -> StoreResult<i64> {
        let mut tables = self.lock()?;
        tables.check_slug(data, None)?;
        let id = tables.allocate();
        tables.profiles.insert(
            id,
            ProfileRow {
                id,
                data: data.clone(),
            },
        );
        Ok(id)
    }

    fn find_profile(&self, assessment_id: i64, slug: &str) -> StoreResult<Option<ProfileRow>> {
        let tables = self.lock()?;
        Ok(tables
            .profiles
            .values()
            .find(|p| p.data.assessment_id == assessment_id && p.data.slug.as_str() == slug)
            .cloned())
    }

    fn list_profiles(&self, assessment_id: i64) -> StoreResult<Vec<ProfileRow>> {
        let tables = self.lock()?;
        Ok(tables
            .profiles
            .values()
            .filter(|p| p.data.assessment_id == assessment_id)
            .cloned()
            .collect())
    }

    fn delete_profile(&self, profile_id: i64) -> StoreResult<()> {
        let mut tables = self.lock()?;
        if tables.profiles.remove(&profile_id).is_none() {
            return Err(StoreError::ProfileNotFound(profile_id));
        }
        let stream_ids: Vec<i64> = tables
            .streams
            .values()
            .filter(|s| s.profile_id == profile_id)
            .map(|s| s.id)
            .collect();
        for id in stream_ids {
            tables.remove_stream(id);
        }
        Ok(())
    }

    fn load_streams(&self, profile_id: i64) -> StoreResult<Vec<StoredStream>> {
        let tables = self.lock()?;
        let streams = tables
            .streams
            .values()
            .filter(|s| s.profile_id == profile_id)
            .map(|row| StoredStream {
                row: row.clone(),
                scenarios: tables
                    .scenarios
                    .values()
                    .filter(|sc| sc.stream_id == row.id)
                    .cloned()
                    .collect(),
            })
            .collect();
        Ok(streams)
    }

    fn replace_children(
        &self,
        profile_id: i64,
        data: &ProfileData,
        streams: &[Stream],
    ) -> StoreResult<WritePlan> {
        let mut tables = self.lock()?;
        let plan = plan_writes(&tables.existing_children(profile_id), streams)?;
        let mut draft = tables.clone();
        if let Err(e) = draft.apply(profile_id, data, &plan) {
            tracing::warn!(profile_id, error = %e, "write plan rolled back");
            return Err(e);
        }
        *tables = draft;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::profile_from_rows;
    use crate::profile::{
        ConfidenceJudgement, CrossStreamConclusions, EvidenceProfile, Scenario, Stream,
        SummaryOfFindings,
    };
    use chrono::Utc;
    use ep_types::{NonEmptyText, Order, Slug};

    fn header(assessment_id: i64, slug: &str) -> ProfileData {
        let profile = EvidenceProfile {
            id: None,
            assessment_id,
            title: NonEmptyText::new("Profile").unwrap(),
            slug: Slug::new(slug).unwrap(),
            caption: String::new(),
            one_scenario_per_stream: false,
            cross_stream_conclusions: CrossStreamConclusions::default(),
            streams: vec![],
            last_updated: None,
        };
        ProfileData::from_profile(&profile, Utc::now()).unwrap()
    }

    fn scenario(id: Option<i64>, name: &str) -> Scenario {
        Scenario {
            id,
            scenario_name: name.into(),
            order: Order::new(1).unwrap(),
            outcome: ConfidenceJudgement::default(),
            summary_of_findings: SummaryOfFindings::default(),
            studies: vec![],
            confidencefactors_increase: vec![],
            confidencefactors_decrease: vec![],
        }
    }

    fn stream(id: Option<i64>, order: u32, scenarios: Vec<Scenario>) -> Stream {
        Stream {
            id,
            stream_type: 1,
            stream_title: format!("stream {order}"),
            order: Order::new(order).unwrap(),
            confidence_judgement: ConfidenceJudgement::default(),
            summary_of_findings: SummaryOfFindings::default(),
            scenarios,
        }
    }

    fn save(store: &InMemoryStore, profile_id: i64, data: &ProfileData, streams: &[Stream]) -> StoreResult<()> {
        store.replace_children(profile_id, data, streams).map(|_| ())
    }

    fn load(store: &InMemoryStore, data: &ProfileData) -> EvidenceProfile {
        let row = store
            .find_profile(data.assessment_id, data.slug.as_str())
            .unwrap()
            .expect("profile exists");
        profile_from_rows(&row, &store.load_streams(row.id).unwrap()).unwrap()
    }

    #[test]
    fn saving_the_loaded_tree_again_changes_no_ids() {
        let store = InMemoryStore::new();
        let data = header(1, "p");
        let id = store.insert_profile(&data).unwrap();
        save(
            &store,
            id,
            &data,
            &[
                stream(None, 1, vec![scenario(None, "a")]),
                stream(None, 2, vec![]),
            ],
        )
        .unwrap();

        let first = load(&store, &data);
        let plan = store.replace_children(id, &data, &first.streams).unwrap();
        assert!(plan.summary.is_pure_update());

        let second = load(&store, &data);
        assert_eq!(second.streams, first.streams);
    }

    #[test]
    fn omitted_stream_is_deleted_with_its_scenarios() {
        let store = InMemoryStore::new();
        let data = header(1, "p");
        let id = store.insert_profile(&data).unwrap();
        save(
            &store,
            id,
            &data,
            &[
                stream(None, 1, vec![]),
                stream(None, 2, vec![scenario(None, "gone")]),
            ],
        )
        .unwrap();

        let kept = load(&store, &data).streams[0].clone();
        save(&store, id, &data, &[kept.clone()]).unwrap();

        let after = load(&store, &data);
        assert_eq!(after.streams, vec![kept]);
        assert!(store.lock().unwrap().scenarios.is_empty());
    }

    #[test]
    fn foreign_row_rolls_back_the_whole_plan() {
        let store = InMemoryStore::new();
        let ours = header(1, "ours");
        let theirs = header(1, "theirs");
        let our_id = store.insert_profile(&ours).unwrap();
        let their_id = store.insert_profile(&theirs).unwrap();
        save(&store, their_id, &theirs, &[stream(None, 1, vec![])]).unwrap();
        let their_stream = load(&store, &theirs).streams[0].id.unwrap();

        let err = save(
            &store,
            our_id,
            &ours,
            &[stream(None, 1, vec![]), stream(Some(their_stream), 2, vec![])],
        )
        .expect_err("stream belongs to another profile");
        assert!(matches!(err, StoreError::ForeignRow { table: "stream", .. }));

        assert!(store.load_streams(our_id).unwrap().is_empty());
        assert_eq!(load(&store, &theirs).streams.len(), 1);
    }

    #[test]
    fn slugs_are_unique_per_assessment() {
        let store = InMemoryStore::new();
        store.insert_profile(&header(1, "p")).unwrap();
        assert!(store.insert_profile(&header(2, "p")).is_ok());
        assert!(matches!(
            store.insert_profile(&header(1, "p")),
            Err(StoreError::SlugConflict { assessment_id: 1, .. })
        ));
    }

    #[test]
    fn deleting_a_profile_removes_its_rows() {
        let store = InMemoryStore::new();
        let data = header(1, "p");
        let id = store.insert_profile(&data).unwrap();
        save(&store, id, &data, &[stream(None, 1, vec![scenario(None, "s")])]).unwrap();

        store.delete_profile(id).unwrap();
        assert!(store.find_profile(1, "p").unwrap().is_none());
        let tables = store.lock().unwrap();
        assert!(tables.streams.is_empty() && tables.scenarios.is_empty());
        drop(tables);
        assert!(matches!(
            store.delete_profile(id),
            Err(StoreError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn later_writer_replaces_the_children_of_an_earlier_one() {
        let store = InMemoryStore::new();
        let data = header(1, "p");
        let id = store.insert_profile(&data).unwrap();

        // Both writers started from the same empty profile, so neither carries row ids.
        let mut from_b = stream(None, 1, vec![scenario(None, "b")]);
        from_b.stream_title = "from B".into();
        let mut from_a = stream(None, 1, vec![]);
        from_a.stream_title = "from A".into();

        save(&store, id, &data, &[from_b]).unwrap();
        let plan = store.replace_children(id, &data, &[from_a]).unwrap();
        assert_eq!(plan.summary.streams_deleted, 1);
        assert_eq!(plan.summary.scenarios_deleted, 1);

        let titles: Vec<String> = load(&store, &data)
            .streams
            .into_iter()
            .map(|s| s.stream_title)
            .collect();
        assert_eq!(titles, vec!["from A"]);
        assert!(store.lock().unwrap().scenarios.is_empty());
    }

    #[test]
    fn concurrent_writers_never_merge_their_trees() {
        let store = std::sync::Arc::new(InMemoryStore::new());
        let data = header(1, "p");
        let id = store.insert_profile(&data).unwrap();

        let writers: Vec<_> = ["A", "B"]
            .into_iter()
            .map(|name| {
                let store = std::sync::Arc::clone(&store);
                let data = data.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let mut s = stream(None, 1, vec![]);
                        s.stream_title = format!("from {name}");
                        store.replace_children(id, &data, &[s]).unwrap();
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        assert_eq!(store.load_streams(id).unwrap().len(), 1);
    }
}
