use crate::utils::error::EtlError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const SUCCESS_SUBJECT: &str = "Hemp NASS Data Upload Successful";
pub const FAILURE_SUBJECT: &str = "Hemp NASS Data Script Failed";

/// One row of commodity statistics, fields kept in payload order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    pub data: Map<String, Value>,
}

impl Record {
    pub fn new(data: Map<String, Value>) -> Self {
        Self { data }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Field rendered as CSV text; absent fields and nulls are empty.
    pub fn field(&self, key: &str) -> String {
        self.data.get(key).map(render_value).unwrap_or_default()
    }
}

pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub record_count: usize,
    pub header: Vec<String>,
    pub csv_output: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub record_count: usize,
    pub destination: String,
    pub bytes_written: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Transform,
    Upload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "fetch",
            Stage::Transform => "transform",
            Stage::Upload => "upload",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new(subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn success(report: &RunReport) -> Self {
        let body = format!(
            "The hemp NASS data script has completed successfully.\n\
             {} records were uploaded to Azure Blob Storage at: {}\n\
             \n\
             Finished at: {}\n\
             \n\
             This is an automated notification, do not reply.\n",
            report.record_count,
            report.destination,
            timestamp()
        );
        Self::new(SUCCESS_SUBJECT, body)
    }

    /// A non-200 fetch keeps the raw status/text body; every other stage
    /// failure names the stage.
    pub fn failure(stage: Stage, error: &EtlError) -> Self {
        let summary = match error {
            EtlError::FetchFailed { status, body } => {
                format!("Request failed with status: {}, message: {}", status, body)
            }
            other => format!("Hemp NASS data script failed during {}: {}", stage, other),
        };
        let body = format!("{}\n\nFailed at: {}\n", summary, timestamp());
        Self::new(FAILURE_SUBJECT, body)
    }
}

fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}
