//! Evidence profile operations behind the HTTP layer.
//!
//! [`EvidenceProfileService`] runs the reconstruction pipeline over a submission and hands the
//! assembled tree to a [`ProfileStore`], which diffs it against the stored rows and writes it.

use crate::config::CoreConfig;
use crate::error::StoreError;
use crate::form::{self, FieldGrammar, FormFields, Reconstruction, Rejection};
use crate::persistence::{profile_from_rows, PlanSummary, ProfileData, ProfileRow, ProfileStore};
use crate::profile::{CrossStreamConclusions, EvidenceProfile};
use crate::{ProfileError, ProfileResult};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Outcome of a create or update.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Submission {
    pub profile: EvidenceProfile,
    /// Objects left out of the saved profile, and why.
    pub rejections: Vec<Rejection>,
    pub plan: PlanSummary,
}

/// List entry for an assessment's profiles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProfileSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub last_updated: DateTime<Utc>,
}

impl From<&ProfileRow> for ProfileSummary {
    fn from(row: &ProfileRow) -> Self {
        Self {
            id: row.id,
            title: row.data.title.to_string(),
            slug: row.data.slug.to_string(),
            last_updated: row.data.last_updated,
        }
    }
}

fn slug_taken(err: StoreError) -> ProfileError {
    match err {
        StoreError::SlugConflict { slug, .. } => ProfileError::SlugTaken(slug),
        other => ProfileError::Store(other),
    }
}

fn check_assessment_id(assessment_id: i64) -> ProfileResult<()> {
    if assessment_id <= 0 {
        return Err(ProfileError::InvalidInput(format!(
            "assessment id must be positive, got {assessment_id}"
        )));
    }
    Ok(())
}

/// Evidence profile operations over a store.
#[derive(Clone, Debug)]
pub struct EvidenceProfileService<S> {
    store: S,
    config: CoreConfig,
}

impl<S: ProfileStore> EvidenceProfileService<S> {
    pub fn new(store: S, config: CoreConfig) -> Self {
        Self { store, config }
    }

    /// Rebuild the profile tree from a submission without saving anything.
    pub fn reconstruct(&self, form: &FormFields) -> ProfileResult<Reconstruction> {
        Ok(form::reconstruct(
            form,
            FieldGrammar::shared(),
            self.config.lookups(),
            self.config.duplicate_order_policy(),
        )?)
    }

    fn document(
        &self,
        assessment_id: i64,
        form: &FormFields,
    ) -> ProfileResult<(EvidenceProfile, Vec<Rejection>)> {
        let r = self.reconstruct(form)?;
        let profile = EvidenceProfile {
            id: None,
            assessment_id,
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
        };
        Ok((profile, r.rejections))
    }

    fn load(&self, row: &ProfileRow) -> ProfileResult<EvidenceProfile> {
        let streams = self.store.load_streams(row.id)?;
        Ok(profile_from_rows(row, &streams)?)
    }

    fn find(&self, assessment_id: i64, slug: &str) -> ProfileResult<ProfileRow> {
        self.store
            .find_profile(assessment_id, slug)?
            .ok_or_else(|| ProfileError::NotFound {
                assessment_id,
                slug: slug.to_string(),
            })
    }

    /// Create a profile from a submission.
    ///
    /// Every stream and scenario is inserted; ids carried by the submission are ignored.
    ///
    /// # Errors
    ///
    /// [`ProfileError::Form`] for header problems, [`ProfileError::SlugTaken`] if the slug is in
    /// use within the assessment, [`ProfileError::Store`] if the write fails. A failed write
    /// leaves nothing behind.
    pub fn create(&self, assessment_id: i64, form: &FormFields) -> ProfileResult<Submission> {
        check_assessment_id(assessment_id)?;
        let (mut profile, rejections) = self.document(assessment_id, form)?;
        for stream in &mut profile.streams {
            stream.id = None;
            for scenario in &mut stream.scenarios {
                scenario.id = None;
            }
        }

        let data = ProfileData::from_profile(&profile, Utc::now())?;
        let profile_id = self.store.insert_profile(&data).map_err(slug_taken)?;
        let plan = match self.store.replace_children(profile_id, &data, &profile.streams) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::warn!(profile_id, error = %e, "failed to save new evidence profile");
                if let Err(cleanup) = self.store.delete_profile(profile_id) {
                    tracing::error!(
                        profile_id,
                        error = %cleanup,
                        "failed to remove partially created evidence profile"
                    );
                }
                return Err(slug_taken(e));
            }
        };

        let row = self.find(assessment_id, data.slug.as_str())?;
        let saved = self.load(&row)?;
        tracing::info!(
            profile_id,
            assessment_id,
            slug = %saved.slug,
            rejected = rejections.len(),
            "created evidence profile"
        );
        Ok(Submission {
            profile: saved,
            rejections,
            plan: plan.summary,
        })
    }

    /// Replace a profile's contents with a submission.
    ///
    /// Streams and scenarios carrying a positive id are updated, the rest inserted, and stored
    /// rows missing from the submission deleted.
    ///
    /// # Errors
    ///
    /// As for [`Self::create`], plus [`ProfileError::NotFound`] and
    /// [`StoreError::ForeignRow`] (wrapped) when the submission names another profile's row.
    pub fn update(
        &self,
        assessment_id: i64,
        slug: &str,
        form: &FormFields,
    ) -> ProfileResult<Submission> {
        let row = self.find(assessment_id, slug)?;
        let (profile, rejections) = self.document(assessment_id, form)?;

        let data = ProfileData::from_profile(&profile, Utc::now())?;
        let plan = self
            .store
            .replace_children(row.id, &data, &profile.streams)
            .map_err(|e| {
                tracing::warn!(profile_id = row.id, error = %e, "failed to update evidence profile");
                slug_taken(e)
            })?;

        let saved_row = self.find(assessment_id, data.slug.as_str())?;
        let saved = self.load(&saved_row)?;
        tracing::info!(
            profile_id = row.id,
            assessment_id,
            slug = %saved.slug,
            rejected = rejections.len(),
            inserted = plan.summary.streams_inserted + plan.summary.scenarios_inserted,
            deleted = plan.summary.streams_deleted + plan.summary.scenarios_deleted,
            "updated evidence profile"
        );
        Ok(Submission {
            profile: saved,
            rejections,
            plan: plan.summary,
        })
    }

    pub fn get(&self, assessment_id: i64, slug: &str) -> ProfileResult<EvidenceProfile> {
        let row = self.find(assessment_id, slug)?;
        self.load(&row)
    }

    pub fn list(&self, assessment_id: i64) -> ProfileResult<Vec<ProfileSummary>> {
        check_assessment_id(assessment_id)?;
        let rows = self.store.list_profiles(assessment_id)?;
        Ok(rows.iter().map(ProfileSummary::from).collect())
    }

    /// Delete a profile with its streams and scenarios.
    pub fn delete(&self, assessment_id: i64, slug: &str) -> ProfileResult<()> {
        let row = self.find(assessment_id, slug)?;
        self.store.delete_profile(row.id)?;
        tracing::info!(profile_id = row.id, assessment_id, slug, "deleted evidence profile");
        Ok(())
    }
}
