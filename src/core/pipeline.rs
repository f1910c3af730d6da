use crate::core::{ConfigProvider, Pipeline, Record, RunReport, Storage, TransformResult};
use crate::utils::error::{EtlError, Result};
use reqwest::{Client, StatusCode};
use serde_json::Value;

const RESPONSE_FORMAT: &str = "JSON";

pub struct HempPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    client: Client,
}

impl<S: Storage, C: ConfigProvider> HempPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.http_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            storage,
            config,
            client,
        })
    }

    fn query_params(&self) -> [(&'static str, String); 4] {
        [
            ("key", self.config.api_key().to_string()),
            ("commodity_desc", self.config.commodity().to_string()),
            ("year__GE", self.config.year_ge().to_string()),
            ("format", RESPONSE_FORMAT.to_string()),
        ]
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for HempPipeline<S, C> {
    async fn extract(&self) -> Result<Vec<Record>> {
        tracing::debug!(
            "Making API request to: {} (commodity_desc={}, year__GE={})",
            self.config.api_endpoint(),
            self.config.commodity(),
            self.config.year_ge()
        );
        let response = self
            .client
            .get(self.config.api_endpoint())
            .query(&self.query_params())
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        tracing::debug!("API response status: {}", status);

        if status != StatusCode::OK {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::warn!("Could not read error response body: {}", e.without_url());
                    String::new()
                }
            };
            return Err(EtlError::FetchFailed {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(request_error)?;
        parse_records(&body)
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let header = header_of(&data)?;
        let csv_output = encode_csv(&header, &data)?;
        tracing::debug!(
            "Encoded {} records into {} CSV bytes ({} columns)",
            data.len(),
            csv_output.len(),
            header.len()
        );

        Ok(TransformResult {
            record_count: data.len(),
            header,
            csv_output,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<RunReport> {
        let path = self.config.blob_path();
        let destination = self.storage.destination(path);

        tracing::debug!(
            "Writing CSV ({} bytes) to {}",
            result.csv_output.len(),
            destination
        );
        self.storage.write_file(path, &result.csv_output).await?;

        Ok(RunReport {
            record_count: result.record_count,
            destination,
            bytes_written: result.csv_output.len(),
        })
    }
}

/// The request URL carries the API key in its query string.
fn request_error(e: reqwest::Error) -> EtlError {
    EtlError::ApiError(e.without_url())
}

/// Parses a Quick Stats response body: a JSON object whose `data` key holds
/// an array of flat objects.
pub fn parse_records(body: &str) -> Result<Vec<Record>> {
    let payload: Value = serde_json::from_str(body)?;

    let items = match payload {
        Value::Object(mut obj) => match obj.remove("data") {
            Some(Value::Array(items)) => items,
            Some(_) => {
                return Err(EtlError::MalformedPayload {
                    message: "`data` is not an array".to_string(),
                })
            }
            None => {
                return Err(EtlError::MalformedPayload {
                    message: "response has no `data` key".to_string(),
                })
            }
        },
        _ => {
            return Err(EtlError::MalformedPayload {
                message: "response is not a JSON object".to_string(),
            })
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| match item {
            Value::Object(obj) => Ok(Record::new(obj)),
            _ => Err(EtlError::MalformedPayload {
                message: format!("`data[{}]` is not an object", index),
            }),
        })
        .collect()
}

/// Column header taken from the first record's keys.
pub fn header_of(records: &[Record]) -> Result<Vec<String>> {
    let first = records.first().ok_or(EtlError::EmptyDataset)?;
    Ok(first.keys().map(str::to_string).collect())
}

pub fn encode_csv(header: &[String], records: &[Record]) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(header)?;
    for record in records {
        writer.write_record(header.iter().map(|key| record.field(key)))?;
    }

    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}
