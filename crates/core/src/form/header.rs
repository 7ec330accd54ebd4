//! The profile's own fields, submitted alongside the keyed families.

use super::FormFields;
use crate::constants::{
    CAPTION_FIELD, CHECKBOX_TRUE_VALUES, CONFIDENCE_JUDGEMENT_EXPLANATION_FIELD,
    CONFIDENCE_JUDGEMENT_SCORE_FIELD, ONE_SCENARIO_PER_STREAM_FIELD, SLUG_FIELD, TITLE_FIELD,
};
use crate::error::FormError;
use crate::lookups::Lookups;
use crate::profile::ConfidenceJudgement;
use ep_types::{NonEmptyText, Slug};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProfileHeader {
    pub title: NonEmptyText,
    pub slug: Slug,
    pub caption: String,
    pub one_scenario_per_stream: bool,
    pub confidence_judgement: ConfidenceJudgement,
}

/// Read and check the header fields.
///
/// # Errors
///
/// Returns [`FormError`] if the title or slug is missing or invalid, or if a cross-stream
/// judgement score is given that is not a configured judgement value.
pub fn parse_header(form: &FormFields, lookups: &Lookups) -> Result<ProfileHeader, FormError> {
    let title = form
        .get(TITLE_FIELD)
        .ok_or(FormError::MissingField(TITLE_FIELD))
        .and_then(|t| NonEmptyText::new(t).map_err(FormError::InvalidTitle))?;
    let slug = form
        .get(SLUG_FIELD)
        .ok_or(FormError::MissingField(SLUG_FIELD))
        .and_then(|s| Slug::new(s).map_err(FormError::InvalidSlug))?;

    let caption = form.get(CAPTION_FIELD).unwrap_or_default().to_string();
    let one_scenario_per_stream = form
        .get(ONE_SCENARIO_PER_STREAM_FIELD)
        .is_some_and(|v| CHECKBOX_TRUE_VALUES.contains(&v.trim().to_ascii_lowercase().as_str()));

    let score = match form.get(CONFIDENCE_JUDGEMENT_SCORE_FIELD).map(str::trim) {
        None | Some("") => None,
        Some(raw) => {
            let value: i64 = raw
                .parse()
                .map_err(|_| FormError::InvalidScore(raw.to_string()))?;
            if !lookups.is_judgement(value) {
                return Err(FormError::InvalidScore(raw.to_string()));
            }
            Some(value)
        }
    };
    let explanation = form
        .get(CONFIDENCE_JUDGEMENT_EXPLANATION_FIELD)
        .filter(|e| !e.is_empty());

    let confidence_judgement = if score.is_none() && explanation.is_none() {
        ConfidenceJudgement::default()
    } else {
        ConfidenceJudgement {
            title: None,
            score,
            name: Some(
                score
                    .and_then(|s| lookups.judgement_name(s))
                    .unwrap_or_default()
                    .to_string(),
            ),
            explanation: Some(explanation.unwrap_or_default().to_string()),
        }
    };

    Ok(ProfileHeader {
        title,
        slug,
        caption,
        one_scenario_per_stream,
        confidence_judgement,
    })
}
