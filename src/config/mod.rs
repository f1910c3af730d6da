pub mod azure;
pub mod cli;
pub mod smtp;

use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::*;
use smtp::{SmtpSettings, SmtpTls, DEFAULT_SMTP_HOST, DEFAULT_SMTP_PORT};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_API_ENDPOINT: &str = "http://quickstats.nass.usda.gov/api/api_GET/";
pub const DEFAULT_COMMODITY: &str = "HEMP";
pub const DEFAULT_YEAR_GE: u16 = 2019;
pub const DEFAULT_CONTAINER: &str = "ams";
pub const DEFAULT_BLOB_PATH: &str = "Quick Stats/hemp_nass_data.csv";

#[cfg(feature = "cli")]
use clap::Parser;
#[cfg(feature = "cli")]
use std::path::PathBuf;

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "hemp-etl")]
#[command(about = "Fetch hemp statistics from USDA NASS Quick Stats, upload them as CSV and email the outcome")]
pub struct CliConfig {
    /// Write the CSV under this directory instead of Azure Blob Storage
    #[arg(long)]
    pub local_output: Option<PathBuf>,

    /// Fetch and transform only; no upload and no email
    #[arg(long)]
    pub dry_run: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log memory and timing per stage")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,
}

/// Run configuration, resolved once from the environment before any stage runs.
#[derive(Clone)]
pub struct AppConfig {
    pub api_endpoint: String,
    pub api_key: String,
    pub commodity: String,
    pub year_ge: u16,
    pub azure_connection_string: Option<String>,
    pub container: String,
    pub blob_path: String,
    pub smtp: SmtpSettings,
    pub http_timeout: Option<Duration>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_endpoint", &self.api_endpoint)
            .field("api_key", &"<redacted>")
            .field("commodity", &self.commodity)
            .field("year_ge", &self.year_ge)
            .field(
                "azure_connection_string",
                &self.azure_connection_string.as_ref().map(|_| "<redacted>"),
            )
            .field("container", &self.container)
            .field("blob_path", &self.blob_path)
            .field("smtp", &self.smtp)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

fn parse_var<T: FromStr>(field: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| EtlError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: e.to_string(),
        })
}

impl AppConfig {
    /// `require_azure` is false when the CSV goes to a local directory.
    pub fn from_env(require_azure: bool) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), require_azure)
    }

    pub fn from_lookup<F>(lookup: F, require_azure: bool) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            validate_required_field(key, &lookup(key)).cloned()
        };
        let optional = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = required("API_KEY")?;
        let azure_connection_string = if require_azure {
            Some(required("AZURE_CONNECTION_STRING")?)
        } else {
            optional("AZURE_CONNECTION_STRING")
        };
        let username = required("GMAIL_USER")?;
        let password = required("GMAIL_APP_PASSWORD")?;
        let recipient = required("RECIPIENT")?;

        let smtp = SmtpSettings {
            host: optional("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
            port: optional("SMTP_PORT")
                .map(|v| parse_var::<u16>("SMTP_PORT", &v))
                .transpose()?
                .unwrap_or(DEFAULT_SMTP_PORT),
            tls: optional("SMTP_TLS")
                .map(|v| v.parse::<SmtpTls>())
                .transpose()?
                .unwrap_or_default(),
            username,
            password,
            recipient,
        };

        Ok(Self {
            api_endpoint: optional("NASS_API_URL")
                .unwrap_or_else(|| DEFAULT_API_ENDPOINT.to_string()),
            api_key,
            commodity: optional("COMMODITY").unwrap_or_else(|| DEFAULT_COMMODITY.to_string()),
            year_ge: optional("YEAR_GE")
                .map(|v| parse_var::<u16>("YEAR_GE", &v))
                .transpose()?
                .unwrap_or(DEFAULT_YEAR_GE),
            azure_connection_string,
            container: optional("AZURE_CONTAINER")
                .unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            blob_path: optional("BLOB_PATH").unwrap_or_else(|| DEFAULT_BLOB_PATH.to_string()),
            smtp,
            http_timeout: optional("HTTP_TIMEOUT_SECS")
                .map(|v| parse_var::<u64>("HTTP_TIMEOUT_SECS", &v))
                .transpose()?
                .map(Duration::from_secs),
        })
    }
}

impl ConfigProvider for AppConfig {
    fn api_endpoint(&self) -> &str {
        &self.api_endpoint
    }

    fn api_key(&self) -> &str {
        &self.api_key
    }

    fn commodity(&self) -> &str {
        &self.commodity
    }

    fn year_ge(&self) -> u16 {
        self.year_ge
    }

    fn blob_path(&self) -> &str {
        &self.blob_path
    }

    fn http_timeout(&self) -> Option<Duration> {
        self.http_timeout
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        // 驗證API端點
        validate_url("NASS_API_URL", &self.api_endpoint)?;
        validate_non_empty_string("API_KEY", &self.api_key)?;
        validate_non_empty_string("COMMODITY", &self.commodity)?;
        validate_range("YEAR_GE", self.year_ge, 1866, 2100)?;

        // 驗證存儲位置
        validate_non_empty_string("AZURE_CONTAINER", &self.container)?;
        validate_blob_path("BLOB_PATH", &self.blob_path)?;
        validate_file_extensions("BLOB_PATH", &[self.blob_path.as_str()], &["csv"])?;

        // 驗證郵件設定
        validate_non_empty_string("SMTP_HOST", &self.smtp.host)?;
        validate_range("SMTP_PORT", self.smtp.port, 1, u16::MAX)?;
        validate_email_address("GMAIL_USER", &self.smtp.username)?;
        validate_non_empty_string("GMAIL_APP_PASSWORD", &self.smtp.password)?;
        validate_email_address("RECIPIENT", &self.smtp.recipient)?;

        if let Some(timeout) = self.http_timeout {
            validate_range("HTTP_TIMEOUT_SECS", timeout.as_secs(), 1, 3600)?;
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}
