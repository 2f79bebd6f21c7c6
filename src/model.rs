/// Core data types for the spray-advisory pipeline.
///
/// This module defines the shared domain model imported by all other modules.
/// It contains no logic, no I/O, and no external dependencies beyond chrono
/// and serde_json — only types.

use chrono::{NaiveDate, NaiveDateTime};

// ---------------------------------------------------------------------------
// Measurement fields
// ---------------------------------------------------------------------------

/// The fixed set of hourly weather measurements the pipeline works with,
/// in canonical column order. Every lag feature is derived from one of
/// these, and the classifier's feature vector follows this order within
/// each lag offset.
pub const MEASUREMENTS: [&str; 9] = [
    "temp",
    "pressure",
    "humidity",
    "dew",
    "windspeed",
    "winddir",
    "precip",
    "visibility",
    "cloudcover",
];

/// Provenance tag the weather provider attaches to directly-observed
/// (non-forecast) records. Only records with this tag enter the store.
pub const SOURCE_OBSERVED: &str = "obs";

// ---------------------------------------------------------------------------
// Observation
// ---------------------------------------------------------------------------

/// One hourly weather observation.
///
/// Timestamps are hour-resolution and unique within the store. Any
/// individual measurement may be absent from the provider's payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub timestamp: NaiveDateTime,
    pub temp: Option<f64>,
    pub pressure: Option<f64>,
    pub humidity: Option<f64>,
    pub dew: Option<f64>,
    pub windspeed: Option<f64>,
    pub winddir: Option<f64>,
    pub precip: Option<f64>,
    pub visibility: Option<f64>,
    pub cloudcover: Option<f64>,
    pub source: String,
}

impl Observation {
    /// Measurement values in the canonical `MEASUREMENTS` order.
    pub fn measurement_values(&self) -> [Option<f64>; 9] {
        [
            self.temp,
            self.pressure,
            self.humidity,
            self.dew,
            self.windspeed,
            self.winddir,
            self.precip,
            self.visibility,
            self.cloudcover,
        ]
    }

    /// Whether the provider tagged this record as directly observed.
    pub fn is_observed(&self) -> bool {
        self.source == SOURCE_OBSERVED
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

/// A scored advisory for one calendar day, as written to the prediction
/// store. Keyed by (predicted_date, system_name); re-scoring the same day
/// overwrites score, snapshot, and created_at.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// The calendar day the score applies to (the day after the run).
    pub predicted_date: NaiveDate,
    /// Identifies which model/pipeline produced the score.
    pub system_name: String,
    /// Probability in [0, 1] that the day is a good day to spray.
    pub score: f64,
    /// The 72 feature values fed to the classifier, as a JSON object with
    /// nulls for missing lags.
    pub feature_snapshot: serde_json::Value,
}

/// The subset of a stored prediction the notifier needs.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSummary {
    pub predicted_date: NaiveDate,
    pub system_name: String,
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can arise anywhere in the pipeline.
///
/// Every job entry point catches these at the top, logs them with context,
/// and converts them into a structured `JobOutcome` — nothing here is
/// fatal to the process host.
#[derive(Debug, PartialEq)]
pub enum PipelineError {
    /// A named secret could not be resolved from the environment.
    SecretRetrieval(String),
    /// The database could not be reached, or a statement failed.
    StoreConnection(String),
    /// No raw observations exist, none fall within the recency window,
    /// or none fall on the designated evaluation hour. Reported as a
    /// skip, not a failure.
    InsufficientData(String),
    /// A feature value has no JSON representation (non-finite float).
    UnserializableFeature(String),
    /// The prediction store is empty.
    NoPredictionFound,
    /// Non-2xx or malformed payload from the weather provider.
    ExternalApi(String),
    /// The SMS gateway rejected or failed the dispatch.
    MessagingDispatch(String),
    /// The classifier artifact could not be loaded or is inconsistent
    /// with the expected feature set.
    ModelArtifact(String),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::SecretRetrieval(name) => {
                write!(f, "Secret retrieval failed: {}", name)
            }
            PipelineError::StoreConnection(msg) => write!(f, "Store error: {}", msg),
            PipelineError::InsufficientData(msg) => write!(f, "Insufficient data: {}", msg),
            PipelineError::UnserializableFeature(col) => {
                write!(f, "Unserializable feature value in column: {}", col)
            }
            PipelineError::NoPredictionFound => write!(f, "No prediction found"),
            PipelineError::ExternalApi(msg) => write!(f, "Weather API error: {}", msg),
            PipelineError::MessagingDispatch(msg) => write!(f, "SMS dispatch failed: {}", msg),
            PipelineError::ModelArtifact(msg) => write!(f, "Model artifact error: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<postgres::Error> for PipelineError {
    fn from(e: postgres::Error) -> Self {
        PipelineError::StoreConnection(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
