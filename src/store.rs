/// PostgreSQL access for the raw observation store and the prediction
/// store.
///
/// Connections are scoped to a job invocation: each job entry point
/// acquires one `Store` at start and drops it on every exit path. No
/// pooling, no cross-invocation reuse. Writes rely on the connection's
/// own transaction per statement — there is no compensating rollback
/// across statements.

use chrono::NaiveDateTime;
use postgres::{Client, NoTls};

use crate::model::{Observation, PipelineError, Prediction, PredictionSummary};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const OBSERVATIONS_DDL: &str = "
    CREATE TABLE IF NOT EXISTS observations (
        timestamp   TIMESTAMP PRIMARY KEY,
        temp        DOUBLE PRECISION,
        pressure    DOUBLE PRECISION,
        humidity    DOUBLE PRECISION,
        dew         DOUBLE PRECISION,
        windspeed   DOUBLE PRECISION,
        winddir     DOUBLE PRECISION,
        precip      DOUBLE PRECISION,
        visibility  DOUBLE PRECISION,
        cloudcover  DOUBLE PRECISION,
        source      VARCHAR(16) NOT NULL
    )";

const PREDICTIONS_DDL: &str = "
    CREATE TABLE IF NOT EXISTS predictions (
        predicted_date  DATE NOT NULL,
        system_name     VARCHAR(100) NOT NULL,
        score           DOUBLE PRECISION,
        features        JSONB,
        created_at      TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (predicted_date, system_name)
    )";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// One job-scoped database connection.
pub struct Store {
    client: Client,
}

impl Store {
    /// Opens a connection for the duration of one job invocation.
    pub fn connect(database_url: &str) -> Result<Self, PipelineError> {
        let client = Client::connect(database_url, NoTls)
            .map_err(|e| PipelineError::StoreConnection(format!("connect: {}", e)))?;
        Ok(Store { client })
    }

    /// Creates both tables if absent. Idempotent; run at job start.
    pub fn ensure_schema(&mut self) -> Result<(), PipelineError> {
        self.client.batch_execute(OBSERVATIONS_DDL)?;
        self.client.batch_execute(PREDICTIONS_DDL)?;
        Ok(())
    }

    // -- Raw observation store ----------------------------------------------

    /// MAX(timestamp) over the observation store, or None when empty.
    /// The ingest job resumes from this point.
    pub fn last_observation_time(&mut self) -> Result<Option<NaiveDateTime>, PipelineError> {
        let row = self
            .client
            .query_one("SELECT MAX(timestamp) FROM observations", &[])?;
        Ok(row.get(0))
    }

    /// Inserts observations with conflict-ignore semantics: re-ingesting
    /// an already-present timestamp is a no-op, not an error. Returns the
    /// number of rows actually inserted.
    pub fn insert_observations(&mut self, observations: &[Observation]) -> Result<u64, PipelineError> {
        let statement = self.client.prepare(
            "INSERT INTO observations
                 (timestamp, temp, pressure, humidity, dew, windspeed,
                  winddir, precip, visibility, cloudcover, source)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (timestamp) DO NOTHING",
        )?;

        let mut inserted = 0u64;
        for obs in observations {
            inserted += self.client.execute(
                &statement,
                &[
                    &obs.timestamp,
                    &obs.temp,
                    &obs.pressure,
                    &obs.humidity,
                    &obs.dew,
                    &obs.windspeed,
                    &obs.winddir,
                    &obs.precip,
                    &obs.visibility,
                    &obs.cloudcover,
                    &obs.source,
                ],
            )?;
        }
        Ok(inserted)
    }

    /// Full ordered scan of the observation store, ascending by timestamp.
    pub fn load_observations(&mut self) -> Result<Vec<Observation>, PipelineError> {
        let rows = self.client.query(
            "SELECT timestamp, temp, pressure, humidity, dew, windspeed,
                    winddir, precip, visibility, cloudcover, source
             FROM observations
             ORDER BY timestamp",
            &[],
        )?;

        Ok(rows
            .iter()
            .map(|row| Observation {
                timestamp: row.get(0),
                temp: row.get(1),
                pressure: row.get(2),
                humidity: row.get(3),
                dew: row.get(4),
                windspeed: row.get(5),
                winddir: row.get(6),
                precip: row.get(7),
                visibility: row.get(8),
                cloudcover: row.get(9),
                source: row.get(10),
            })
            .collect())
    }

    // -- Prediction store ---------------------------------------------------

    /// Idempotent upsert keyed by (predicted_date, system_name). On
    /// conflict the score, feature snapshot, and created_at are replaced.
    pub fn upsert_prediction(&mut self, prediction: &Prediction) -> Result<(), PipelineError> {
        self.client.execute(
            "INSERT INTO predictions (predicted_date, system_name, score, features)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (predicted_date, system_name)
             DO UPDATE SET
                 score = EXCLUDED.score,
                 features = EXCLUDED.features,
                 created_at = CURRENT_TIMESTAMP",
            &[
                &prediction.predicted_date,
                &prediction.system_name,
                &prediction.score,
                &prediction.feature_snapshot,
            ],
        )?;
        Ok(())
    }

    /// The single most recent prediction, by predicted_date then
    /// created_at. NoPredictionFound when the store is empty.
    pub fn latest_prediction(&mut self) -> Result<PredictionSummary, PipelineError> {
        let rows = self.client.query(
            "SELECT predicted_date, system_name, score
             FROM predictions
             ORDER BY predicted_date DESC, created_at DESC
             LIMIT 1",
            &[],
        )?;

        match rows.first() {
            Some(row) => Ok(PredictionSummary {
                predicted_date: row.get(0),
                system_name: row.get(1),
                score: row.get(2),
            }),
            None => Err(PipelineError::NoPredictionFound),
        }
    }
}
