/// Structured logging for the spray-advisory pipeline.
///
/// Provides context-rich logging tagged with the external collaborator
/// involved (weather API, database, SMS gateway, model artifact).
/// Supports both console output and file-based logging for scheduled
/// runs.

use chrono::Utc;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Log Levels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARN"),
            LogLevel::Error => write!(f, "ERROR"),
        }
    }
}

// ---------------------------------------------------------------------------
// Data Source Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Weather,
    Database,
    Sms,
    Model,
    System,
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSource::Weather => write!(f, "WX"),
            DataSource::Database => write!(f, "DB"),
            DataSource::Sms => write!(f, "SMS"),
            DataSource::Model => write!(f, "MODEL"),
            DataSource::System => write!(f, "SYS"),
        }
    }
}

// ---------------------------------------------------------------------------
// Logger Configuration
// ---------------------------------------------------------------------------

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

pub struct Logger {
    /// Minimum log level to display
    min_level: LogLevel,
    /// Optional file path for logging
    log_file: Option<String>,
}

impl Logger {
    /// Initialize the global logger
    pub fn init(min_level: LogLevel, log_file: Option<String>) {
        let logger = Logger { min_level, log_file };
        *LOGGER.lock().unwrap() = Some(logger);
    }

    fn log(&self, level: LogLevel, source: &DataSource, job: Option<&str>, message: &str) {
        if level < self.min_level {
            return;
        }

        let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
        let job_part = job.map(|j| format!(" [{}]", j)).unwrap_or_default();
        let log_entry = format!("{} {} {}{}: {}", timestamp, level, source, job_part, message);

        match level {
            LogLevel::Error | LogLevel::Warning => eprintln!("{}", log_entry),
            LogLevel::Info | LogLevel::Debug => println!("{}", log_entry),
        }

        if let Some(ref path) = self.log_file {
            if let Err(e) = Self::append_to_file(path, &log_entry) {
                eprintln!("Failed to write to log file {}: {}", path, e);
            }
        }
    }

    fn append_to_file(path: &str, entry: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", entry)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Public Logging Functions
// ---------------------------------------------------------------------------

/// Initialize the global logger
pub fn init_logger(min_level: LogLevel, log_file: Option<&str>) {
    Logger::init(min_level, log_file.map(String::from));
}

/// Log a general informational message
pub fn info(source: DataSource, job: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Info, &source, job, message);
    }
}

/// Log a warning message
pub fn warn(source: DataSource, job: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Warning, &source, job, message);
    }
}

/// Log an error message
pub fn error(source: DataSource, job: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Error, &source, job, message);
    }
}

/// Log a debug message
pub fn debug(source: DataSource, job: Option<&str>, message: &str) {
    if let Some(logger) = LOGGER.lock().unwrap().as_ref() {
        logger.log(LogLevel::Debug, &source, job, message);
    }
}

// ---------------------------------------------------------------------------
// Job Failure Logging
// ---------------------------------------------------------------------------

/// Log a job failure against the collaborator that caused it.
pub fn log_job_failure(job: &str, err: &crate::model::PipelineError) {
    use crate::model::PipelineError;

    let source = match err {
        PipelineError::ExternalApi(_) => DataSource::Weather,
        PipelineError::StoreConnection(_) | PipelineError::NoPredictionFound => {
            DataSource::Database
        }
        PipelineError::MessagingDispatch(_) => DataSource::Sms,
        PipelineError::ModelArtifact(_) => DataSource::Model,
        PipelineError::SecretRetrieval(_)
        | PipelineError::InsufficientData(_)
        | PipelineError::UnserializableFeature(_) => DataSource::System,
    };

    error(source, Some(job), &err.to_string());
}
