/// Weather data ingestion.
///
/// Submodules:
/// - `visual_crossing` — timeline API client for hourly observations.

pub mod visual_crossing;
