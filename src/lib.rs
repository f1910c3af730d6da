pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use config::azure::AzureBlobStorage;
pub use config::cli::LocalStorage;
pub use config::smtp::{SmtpMailer, SmtpSettings, SmtpTls};
pub use config::AppConfig;
pub use core::{etl::EtlEngine, notifier::Notifier, pipeline::HempPipeline};
pub use utils::error::{EtlError, Result};
