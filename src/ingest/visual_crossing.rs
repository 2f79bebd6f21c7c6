/// Visual Crossing Timeline API client.
///
/// Retrieves hourly weather records for a fixed latitude/longitude and
/// date range, in metric units. The timeline response nests hours inside
/// days; each hour carries a `source` tag distinguishing direct
/// observations ("obs") from forecast estimates — only observed records
/// are kept, since forecasts are not trustworthy model inputs.
///
/// API documentation: https://www.visualcrossing.com/resources/documentation/weather-api/timeline-weather-api/

use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::collections::HashSet;

use crate::model::{Observation, PipelineError};

const VC_BASE_URL: &str =
    "https://weather.visualcrossing.com/VisualCrossingWebServices/rest/services/timeline";

// ============================================================================
// Timeline API response structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct TimelineResponse {
    #[serde(default)]
    days: Vec<TimelineDay>,
}

#[derive(Debug, Deserialize)]
struct TimelineDay {
    /// Calendar date, "YYYY-MM-DD".
    datetime: String,
    #[serde(default)]
    hours: Vec<TimelineHour>,
}

#[derive(Debug, Deserialize)]
struct TimelineHour {
    /// Time of day, "HH:MM:SS".
    datetime: String,
    temp: Option<f64>,
    pressure: Option<f64>,
    humidity: Option<f64>,
    dew: Option<f64>,
    windspeed: Option<f64>,
    winddir: Option<f64>,
    precip: Option<f64>,
    visibility: Option<f64>,
    cloudcover: Option<f64>,
    source: Option<String>,
}

// ============================================================================
// API client functions
// ============================================================================

/// Builds the timeline request URL for a location and inclusive date range.
pub fn build_timeline_url(
    latitude: f64,
    longitude: f64,
    start: NaiveDate,
    end: NaiveDate,
    api_key: &str,
) -> String {
    format!(
        "{}/{},{}/{}/{}?unitGroup=metric&key={}&contentType=json&include=hours",
        VC_BASE_URL, latitude, longitude, start, end, api_key
    )
}

/// Fetches hourly observations for the date range.
///
/// Returns only directly-observed records, deduplicated by timestamp
/// (first occurrence wins), in payload order.
pub fn fetch_observations(
    client: &reqwest::blocking::Client,
    latitude: f64,
    longitude: f64,
    start: NaiveDate,
    end: NaiveDate,
    api_key: &str,
) -> Result<Vec<Observation>, PipelineError> {
    let url = build_timeline_url(latitude, longitude, start, end, api_key);

    let response = client
        .get(&url)
        .header("Accept", "application/json")
        .send()
        .map_err(|e| PipelineError::ExternalApi(format!("request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(PipelineError::ExternalApi(format!(
            "HTTP {}",
            response.status()
        )));
    }

    let body = response
        .text()
        .map_err(|e| PipelineError::ExternalApi(format!("failed to read body: {}", e)))?;

    parse_timeline(&body)
}

/// Parses a timeline JSON payload into observed, deduplicated records.
pub fn parse_timeline(json: &str) -> Result<Vec<Observation>, PipelineError> {
    let timeline: TimelineResponse = serde_json::from_str(json)
        .map_err(|e| PipelineError::ExternalApi(format!("malformed payload: {}", e)))?;

    let mut seen: HashSet<NaiveDateTime> = HashSet::new();
    let mut observations = Vec::new();

    for day in &timeline.days {
        for hour in &day.hours {
            let source = match &hour.source {
                Some(s) => s.clone(),
                None => continue,
            };

            let timestamp = parse_hour_timestamp(&day.datetime, &hour.datetime)?;

            let obs = Observation {
                timestamp,
                temp: hour.temp,
                pressure: hour.pressure,
                humidity: hour.humidity,
                dew: hour.dew,
                windspeed: hour.windspeed,
                winddir: hour.winddir,
                precip: hour.precip,
                visibility: hour.visibility,
                cloudcover: hour.cloudcover,
                source,
            };

            if !obs.is_observed() {
                continue;
            }
            if seen.insert(timestamp) {
                observations.push(obs);
            }
        }
    }

    Ok(observations)
}

fn parse_hour_timestamp(date: &str, time: &str) -> Result<NaiveDateTime, PipelineError> {
    NaiveDateTime::parse_from_str(&format!("{} {}", date, time), "%Y-%m-%d %H:%M:%S").map_err(
        |e| PipelineError::ExternalApi(format!("bad timestamp '{} {}': {}", date, time, e)),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_payload() -> String {
        serde_json::json!({
            "days": [
                {
                    "datetime": "2025-08-14",
                    "hours": [
                        { "datetime": "14:00:00", "temp": 27.3, "pressure": 1014.0,
                          "humidity": 55.0, "dew": 17.5, "windspeed": 11.2,
                          "winddir": 120.0, "precip": 0.0, "visibility": 16.0,
                          "cloudcover": 40.0, "source": "obs" },
                        { "datetime": "15:00:00", "temp": 28.1, "pressure": 1013.4,
                          "humidity": 52.0, "dew": 17.1, "windspeed": 12.0,
                          "winddir": 125.0, "precip": null, "visibility": 16.0,
                          "cloudcover": 35.0, "source": "obs" },
                        // duplicate hour — first occurrence must win
                        { "datetime": "15:00:00", "temp": 99.0, "pressure": null,
                          "humidity": null, "dew": null, "windspeed": null,
                          "winddir": null, "precip": null, "visibility": null,
                          "cloudcover": null, "source": "obs" },
                        // forecast record — must be dropped
                        { "datetime": "16:00:00", "temp": 29.0, "pressure": 1013.0,
                          "humidity": 50.0, "dew": 17.0, "windspeed": 13.0,
                          "winddir": 130.0, "precip": 0.0, "visibility": 16.0,
                          "cloudcover": 30.0, "source": "fcst" }
                    ]
                }
            ]
        })
        .to_string()
    }

    #[test]
    fn test_parse_keeps_only_observed_records() {
        let observations = parse_timeline(&sample_payload()).unwrap();
        assert_eq!(observations.len(), 2);
        assert!(observations.iter().all(|o| o.is_observed()));
    }

    #[test]
    fn test_parse_deduplicates_first_occurrence_wins() {
        let observations = parse_timeline(&sample_payload()).unwrap();
        let three_pm = NaiveDate::from_ymd_opt(2025, 8, 14)
            .unwrap()
            .and_hms_opt(15, 0, 0)
            .unwrap();
        let obs = observations
            .iter()
            .find(|o| o.timestamp == three_pm)
            .expect("15:00 observation present");
        assert_eq!(obs.temp, Some(28.1), "first 15:00 record wins");
        assert_eq!(obs.precip, None, "missing measurement stays null");
    }

    #[test]
    fn test_parse_timestamps_combine_day_and_hour() {
        let observations = parse_timeline(&sample_payload()).unwrap();
        let expected = NaiveDate::from_ymd_opt(2025, 8, 14)
            .unwrap()
            .and_hms_opt(14, 0, 0)
            .unwrap();
        assert_eq!(observations[0].timestamp, expected);
    }

    #[test]
    fn test_parse_empty_days_is_empty_not_error() {
        let observations = parse_timeline(r#"{"days": []}"#).unwrap();
        assert!(observations.is_empty());
    }

    #[test]
    fn test_parse_malformed_payload_is_api_error() {
        let err = parse_timeline("not json").unwrap_err();
        assert!(matches!(err, PipelineError::ExternalApi(_)));
    }

    #[test]
    fn test_record_without_source_tag_is_dropped() {
        let payload = serde_json::json!({
            "days": [{
                "datetime": "2025-08-14",
                "hours": [
                    { "datetime": "10:00:00", "temp": 20.0, "pressure": null,
                      "humidity": null, "dew": null, "windspeed": null,
                      "winddir": null, "precip": null, "visibility": null,
                      "cloudcover": null, "source": null }
                ]
            }]
        })
        .to_string();
        assert!(parse_timeline(&payload).unwrap().is_empty());
    }

    #[test]
    fn test_build_timeline_url_format() {
        let start = NaiveDate::from_ymd_opt(2025, 8, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 8, 14).unwrap();
        let url = build_timeline_url(-22.5901, -47.46, start, end, "KEY");
        assert!(url.starts_with(VC_BASE_URL));
        assert!(url.contains("/-22.5901,-47.46/2025-08-10/2025-08-14?"));
        assert!(url.contains("unitGroup=metric"));
        assert!(url.contains("key=KEY"));
        assert!(url.contains("include=hours"));
    }
}
