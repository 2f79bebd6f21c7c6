/// Job entry points: ingest, infer, notify.
///
/// Each job is an independent, run-to-completion invocation. Every error
/// is caught at the top of the entry point, logged with context, and
/// converted into a structured `JobOutcome` — jobs never raise to their
/// caller, and a failed invocation leaves the next scheduled one
/// unaffected. Writes that committed before a later failure stay
/// committed; there are no retries and no compensating rollback.

use chrono::{Duration, Local, NaiveDateTime};
use serde::Serialize;
use std::time::Duration as StdDuration;

use crate::classifier::{Classifier, ObliviousTreeModel};
use crate::config::{self, Config, PipelineConfig};
use crate::features::{self, FeatureRow};
use crate::ingest::visual_crossing;
use crate::logging::{self, DataSource};
use crate::model::{PipelineError, Prediction};
use crate::notify::{self, HttpSmsGateway, SmsGateway};
use crate::store::Store;

// ---------------------------------------------------------------------------
// Job outcomes
// ---------------------------------------------------------------------------

/// The status/result payload a job returns to the invoking scheduler,
/// mirrored on an HTTP status convention: 200 success (including
/// insufficient-data skips), 404 empty prediction store, 500 failure.
#[derive(Debug, Serialize, PartialEq)]
pub struct JobOutcome {
    pub status: u16,
    pub body: serde_json::Value,
}

impl JobOutcome {
    fn ok(body: serde_json::Value) -> Self {
        JobOutcome { status: 200, body }
    }

    fn from_error(job: &str, err: &PipelineError) -> Self {
        logging::log_job_failure(job, err);
        match err {
            PipelineError::InsufficientData(msg) => JobOutcome {
                status: 200,
                body: serde_json::json!({ "message": format!("skipped: {}", msg), "skipped": true }),
            },
            PipelineError::NoPredictionFound => JobOutcome {
                status: 404,
                body: serde_json::json!({ "error": err.to_string() }),
            },
            _ => JobOutcome {
                status: 500,
                body: serde_json::json!({ "error": err.to_string() }),
            },
        }
    }
}

fn http_client() -> Result<reqwest::blocking::Client, PipelineError> {
    reqwest::blocking::Client::builder()
        .timeout(StdDuration::from_secs(30))
        .build()
        .map_err(|e| PipelineError::ExternalApi(format!("http client: {}", e)))
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

/// Fetches observations from the last stored timestamp through today and
/// inserts them with conflict-ignore semantics.
pub fn run_ingest(config: &Config) -> JobOutcome {
    match ingest(config) {
        Ok(body) => JobOutcome::ok(body),
        Err(err) => JobOutcome::from_error("ingest", &err),
    }
}

fn ingest(config: &Config) -> Result<serde_json::Value, PipelineError> {
    let api_key = config::weather_api_key()?;
    let mut store = Store::connect(&config::database_url()?)?;
    store.ensure_schema()?;

    let start = store
        .last_observation_time()?
        .map(|ts| ts.date())
        .unwrap_or(config.pipeline.default_start_date);
    let end = Local::now().date_naive();

    logging::info(
        DataSource::Weather,
        Some("ingest"),
        &format!("fetching observations from {} to {}", start, end),
    );

    let observations = visual_crossing::fetch_observations(
        &http_client()?,
        config.site.latitude,
        config.site.longitude,
        start,
        end,
        &api_key,
    )?;

    if observations.is_empty() {
        return Ok(serde_json::json!({
            "message": "no new observations",
            "period": format!("{} to {}", start, end),
        }));
    }

    let inserted = store.insert_observations(&observations)?;
    logging::info(
        DataSource::Database,
        Some("ingest"),
        &format!("{} fetched, {} inserted", observations.len(), inserted),
    );

    Ok(serde_json::json!({
        "message": "observations ingested",
        "period": format!("{} to {}", start, end),
        "records_fetched": observations.len(),
        "records_inserted": inserted,
    }))
}

// ---------------------------------------------------------------------------
// Infer
// ---------------------------------------------------------------------------

/// Loads the model, builds lag features over the stored series, scores
/// the most recent qualifying hour, and upserts tomorrow's prediction.
pub fn run_infer(config: &Config) -> JobOutcome {
    match infer(config) {
        Ok(body) => JobOutcome::ok(body),
        Err(err) => JobOutcome::from_error("infer", &err),
    }
}

fn infer(config: &Config) -> Result<serde_json::Value, PipelineError> {
    let model = ObliviousTreeModel::load(&config.pipeline.model_path)?;
    let mut store = Store::connect(&config::database_url()?)?;
    store.ensure_schema()?;

    let series = store.load_observations()?;
    let now = Local::now().naive_local();

    let (row, score) = evaluate_latest(&series, now, &config.pipeline, &model)?;
    let prediction = build_prediction(now, &config.pipeline.system_name, &row, score)?;
    store.upsert_prediction(&prediction)?;

    logging::info(
        DataSource::Model,
        Some("infer"),
        &format!(
            "prediction for {}: {:.4} (evaluated {})",
            prediction.predicted_date, score, row.timestamp
        ),
    );

    Ok(serde_json::json!({
        "message": "prediction recorded",
        "predicted_date": prediction.predicted_date.to_string(),
        "system_name": prediction.system_name,
        "score": score,
        "evaluated_at": row.timestamp.to_string(),
    }))
}

/// Builds lag features over the full series, restricts rows to the
/// evaluation hour, and scores the most recent one inside the recency
/// window. Pure with respect to the clock: `now` is injected so tests
/// stay deterministic.
pub fn evaluate_latest(
    series: &[crate::model::Observation],
    now: NaiveDateTime,
    pipeline: &PipelineConfig,
    classifier: &dyn Classifier,
) -> Result<(FeatureRow, f64), PipelineError> {
    if series.is_empty() {
        return Err(PipelineError::InsufficientData(
            "no observations in store".to_string(),
        ));
    }

    let rows = features::build_lag_features(series);
    let cutoff = now - Duration::hours(pipeline.recency_window_hours);
    if features::latest_row_since(&rows, cutoff).is_none() {
        return Err(PipelineError::InsufficientData(format!(
            "no observations within the last {} hours",
            pipeline.recency_window_hours
        )));
    }

    let eval_rows = features::rows_at_hour(rows, pipeline.evaluation_hour);
    let row = features::latest_row_since(&eval_rows, cutoff).ok_or_else(|| {
        PipelineError::InsufficientData(format!(
            "no observations at evaluation hour {:02}:00 within the window",
            pipeline.evaluation_hour
        ))
    })?;

    let score = classifier.predict_proba(&row.values)?;
    Ok((row.clone(), score))
}

/// The prediction applies to the calendar day after the invocation day.
pub fn build_prediction(
    now: NaiveDateTime,
    system_name: &str,
    row: &FeatureRow,
    score: f64,
) -> Result<Prediction, PipelineError> {
    Ok(Prediction {
        predicted_date: (now + Duration::days(1)).date(),
        system_name: system_name.to_string(),
        score,
        feature_snapshot: row.to_snapshot()?,
    })
}

// ---------------------------------------------------------------------------
// Notify
// ---------------------------------------------------------------------------

/// Reads the most recent prediction and sends the advisory SMS.
pub fn run_notify(config: &Config) -> JobOutcome {
    match notify_job(config) {
        Ok(body) => JobOutcome::ok(body),
        Err(err) => JobOutcome::from_error("notify", &err),
    }
}

fn notify_job(config: &Config) -> Result<serde_json::Value, PipelineError> {
    let (account_sid, auth_token) = config::sms_credentials()?;
    let mut store = Store::connect(&config::database_url()?)?;

    let prediction = store.latest_prediction()?;
    let message = notify::format_probability_message(prediction.score);

    let gateway = HttpSmsGateway::new(
        http_client()?,
        &config.notification.gateway_url,
        &account_sid,
        &auth_token,
        &config.notification.sender,
    );

    logging::info(
        DataSource::Sms,
        Some("notify"),
        &format!("sending advisory to {}", config.notification.recipient),
    );
    let message_sid = gateway.send(&config.notification.recipient, &message)?;

    Ok(serde_json::json!({
        "message": "SMS sent",
        "message_sid": message_sid,
        "predicted_date": prediction.predicted_date.to_string(),
        "score": prediction.score,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
