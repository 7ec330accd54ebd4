//! # API REST
//!
//! REST API for HAWC evidence profiles.
//!
//! Handles:
//! - HTTP endpoints with axum, taking profile submissions as url-encoded forms
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (status codes, JSON serialization, CORS)
//!
//! All profile logic lives in `ep-core`; handlers only translate between HTTP and
//! [`EvidenceProfileService`].

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Form, Router,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

use ep_core::config::{duplicate_order_policy_from_env_value, load_lookups};
use ep_core::constants::{DUPLICATE_ORDER_POLICY_ENV, LOOKUPS_FILE_ENV};
use ep_core::persistence::PlanSummary;
use ep_core::profile::{CrossStreamConclusions, Stream};
use ep_core::{
    CoreConfig, EvidenceProfile, EvidenceProfileService, FormFields, InMemoryStore,
    ProfileError, ProfileSummary, Rejection, StoreError, Submission,
};

/// The service behind the REST handlers.
pub type ProfileService = EvidenceProfileService<InMemoryStore>;

/// Application state for the REST API server
///
/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    service: Arc<ProfileService>,
}

impl AppState {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            service: Arc::new(EvidenceProfileService::new(InMemoryStore::new(), config)),
        }
    }
}

/// Resolve the core configuration from the process environment.
///
/// Call once at startup; handlers never read the environment.
///
/// # Errors
/// Returns an error if the lookups file cannot be loaded or the duplicate-order policy is
/// not recognised.
pub fn core_config_from_env() -> anyhow::Result<CoreConfig> {
    let lookups = load_lookups(std::env::var(LOOKUPS_FILE_ENV).ok().map(PathBuf::from))?;
    let policy = duplicate_order_policy_from_env_value(std::env::var(DUPLICATE_ORDER_POLICY_ENV).ok())?;
    tracing::info!(?policy, "duplicate order policy");
    Ok(CoreConfig::new(lookups, policy))
}

#[derive(Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ListProfilesRes {
    #[schema(value_type = Vec<Object>)]
    pub profiles: Vec<ProfileSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileRes {
    #[schema(value_type = Object)]
    pub profile: EvidenceProfile,
}

#[derive(Serialize, ToSchema)]
pub struct SubmissionRes {
    #[schema(value_type = Object)]
    pub profile: EvidenceProfile,
    #[schema(value_type = Vec<Object>)]
    pub rejections: Vec<Rejection>,
    #[schema(value_type = Object)]
    pub plan: PlanSummary,
}

impl From<Submission> for SubmissionRes {
    fn from(s: Submission) -> Self {
        Self {
            profile: s.profile,
            rejections: s.rejections,
            plan: s.plan,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PreviewRes {
    pub title: String,
    pub slug: String,
    pub caption: String,
    pub one_scenario_per_stream: bool,
    #[schema(value_type = Object)]
    pub cross_stream_conclusions: CrossStreamConclusions,
    #[schema(value_type = Vec<Object>)]
    pub streams: Vec<Stream>,
    #[schema(value_type = Vec<Object>)]
    pub rejections: Vec<Rejection>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_profiles,
        create_profile,
        read_profile,
        update_profile,
        delete_profile,
        preview_profile,
    ),
    components(schemas(HealthRes, ListProfilesRes, ProfileRes, SubmissionRes, PreviewRes))
)]
pub struct ApiDoc;

/// Build the REST router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/assessments/:assessment_id/evidence-profiles",
            get(list_profiles).post(create_profile),
        )
        .route(
            "/assessments/:assessment_id/evidence-profiles/:slug",
            get(read_profile).put(update_profile).delete(delete_profile),
        )
        .route("/evidence-profiles/preview", post(preview_profile))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

type ApiError = (StatusCode, String);

/// Map a core error onto a status code.
///
/// Server-side failures are logged and their detail withheld from the response.
fn api_error(e: ProfileError) -> ApiError {
    let status = match &e {
        ProfileError::InvalidInput(_) | ProfileError::Form(_) => StatusCode::BAD_REQUEST,
        ProfileError::Store(StoreError::ForeignRow { .. }) => StatusCode::BAD_REQUEST,
        ProfileError::NotFound { .. } => StatusCode::NOT_FOUND,
        ProfileError::SlugTaken(_) => StatusCode::CONFLICT,
        ProfileError::Store(_) | ProfileError::Lookup(_) => {
            tracing::error!("Evidence profile error: {:?}", e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into());
        }
    };
    (status, e.to_string())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Used for monitoring and load balancer health checks.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "HAWC evidence profile API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/assessments/{assessment_id}/evidence-profiles",
    params(("assessment_id" = i64, Path, description = "Owning assessment")),
    responses(
        (status = 200, description = "Profiles of the assessment", body = ListProfilesRes),
        (status = 400, description = "Bad request")
    )
)]
#[axum::debug_handler]
async fn list_profiles(
    State(state): State<AppState>,
    AxumPath(assessment_id): AxumPath<i64>,
) -> Result<Json<ListProfilesRes>, ApiError> {
    let profiles = state.service.list(assessment_id).map_err(api_error)?;
    Ok(Json(ListProfilesRes { profiles }))
}

#[utoipa::path(
    post,
    path = "/assessments/{assessment_id}/evidence-profiles",
    params(("assessment_id" = i64, Path, description = "Owning assessment")),
    request_body(content = Object, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 201, description = "Profile created", body = SubmissionRes),
        (status = 400, description = "Invalid header fields"),
        (status = 409, description = "Slug already used in this assessment")
    )
)]
/// Create an evidence profile from a form submission
///
/// Objects that fail validation are left out and listed under `rejections`.
#[axum::debug_handler]
async fn create_profile(
    State(state): State<AppState>,
    AxumPath(assessment_id): AxumPath<i64>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<(StatusCode, Json<SubmissionRes>), ApiError> {
    let form = FormFields::from(pairs);
    let submission = state
        .service
        .create(assessment_id, &form)
        .map_err(api_error)?;
    Ok((StatusCode::CREATED, Json(submission.into())))
}

#[utoipa::path(
    get,
    path = "/assessments/{assessment_id}/evidence-profiles/{slug}",
    params(
        ("assessment_id" = i64, Path, description = "Owning assessment"),
        ("slug" = String, Path, description = "Profile URL name")
    ),
    responses(
        (status = 200, description = "The stored profile", body = ProfileRes),
        (status = 404, description = "No such profile")
    )
)]
#[axum::debug_handler]
async fn read_profile(
    State(state): State<AppState>,
    AxumPath((assessment_id, slug)): AxumPath<(i64, String)>,
) -> Result<Json<ProfileRes>, ApiError> {
    let profile = state.service.get(assessment_id, &slug).map_err(api_error)?;
    Ok(Json(ProfileRes { profile }))
}

#[utoipa::path(
    put,
    path = "/assessments/{assessment_id}/evidence-profiles/{slug}",
    params(
        ("assessment_id" = i64, Path, description = "Owning assessment"),
        ("slug" = String, Path, description = "Profile URL name")
    ),
    request_body(content = Object, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Profile updated", body = SubmissionRes),
        (status = 400, description = "Invalid header fields or foreign row id"),
        (status = 404, description = "No such profile"),
        (status = 409, description = "Slug already used in this assessment")
    )
)]
/// Replace an evidence profile's contents with a form submission
///
/// Streams and scenarios keep their ids when the submission carries them; stored ones the
/// submission omits are deleted.
#[axum::debug_handler]
async fn update_profile(
    State(state): State<AppState>,
    AxumPath((assessment_id, slug)): AxumPath<(i64, String)>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Json<SubmissionRes>, ApiError> {
    let form = FormFields::from(pairs);
    let submission = state
        .service
        .update(assessment_id, &slug, &form)
        .map_err(api_error)?;
    Ok(Json(submission.into()))
}

#[utoipa::path(
    delete,
    path = "/assessments/{assessment_id}/evidence-profiles/{slug}",
    params(
        ("assessment_id" = i64, Path, description = "Owning assessment"),
        ("slug" = String, Path, description = "Profile URL name")
    ),
    responses(
        (status = 204, description = "Profile deleted"),
        (status = 404, description = "No such profile")
    )
)]
#[axum::debug_handler]
async fn delete_profile(
    State(state): State<AppState>,
    AxumPath((assessment_id, slug)): AxumPath<(i64, String)>,
) -> Result<StatusCode, ApiError> {
    state
        .service
        .delete(assessment_id, &slug)
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/evidence-profiles/preview",
    request_body(content = Object, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Reconstructed profile tree, not saved", body = PreviewRes),
        (status = 400, description = "Invalid header fields")
    )
)]
/// Reconstruct a profile tree from a form submission without saving it
#[axum::debug_handler]
async fn preview_profile(
    State(state): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Json<PreviewRes>, ApiError> {
    let form = FormFields::from(pairs);
    let r = state.service.reconstruct(&form).map_err(api_error)?;
    Ok(Json(PreviewRes {
        title: r.header.title.to_string(),
        slug: r.header.slug.to_string(),
        caption: r.header.caption,
        one_scenario_per_stream: r.header.one_scenario_per_stream,
        cross_stream_conclusions: CrossStreamConclusions {
            confidence_judgement: r.header.confidence_judgement,
            inferences: r.tree.inferences,
        },
        streams: r.tree.streams,
        rejections: r.rejections,
    }))
}
