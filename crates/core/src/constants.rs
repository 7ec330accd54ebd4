//! Constants used throughout the evidence profile core crate.
//!
//! Header field names and environment defaults live here so the form grammar, the REST layer
//! and the binaries agree on them.

/// Default bind address for the REST server.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// Environment variable naming the REST bind address.
pub const REST_ADDR_ENV: &str = "HAWC_REST_ADDR";

/// Environment variable naming an optional YAML lookups file.
pub const LOOKUPS_FILE_ENV: &str = "HAWC_LOOKUPS_FILE";

/// Environment variable selecting the duplicate-order policy.
pub const DUPLICATE_ORDER_POLICY_ENV: &str = "HAWC_DUPLICATE_ORDER_POLICY";

/// Profile title field.
pub const TITLE_FIELD: &str = "title";

/// Profile URL name field.
pub const SLUG_FIELD: &str = "slug";

/// Profile caption field.
pub const CAPTION_FIELD: &str = "caption";

/// Checkbox restricting each stream to a single scenario.
pub const ONE_SCENARIO_PER_STREAM_FIELD: &str = "one_scenario_per_stream";

/// Cross-stream confidence judgement score field.
pub const CONFIDENCE_JUDGEMENT_SCORE_FIELD: &str = "confidence_judgement_score";

/// Cross-stream confidence judgement explanation field.
pub const CONFIDENCE_JUDGEMENT_EXPLANATION_FIELD: &str = "confidence_judgement_explanation";

/// Values a browser may submit for a ticked checkbox.
pub const CHECKBOX_TRUE_VALUES: [&str; 4] = ["on", "true", "1", "yes"];
