/// Spray-advisory weather pipeline.
///
/// Three independent daily batch jobs over a shared PostgreSQL store:
/// - `ingest` — pull hourly observations from the weather provider.
/// - `infer`  — build lag features, score with the pretrained classifier,
///   and record tomorrow's spray-day probability.
/// - `notify` — SMS the most recent probability to the grower.

pub mod classifier;
pub mod config;
pub mod features;
pub mod ingest;
pub mod jobs;
pub mod logging;
pub mod model;
pub mod notify;
pub mod store;
