pub mod etl;
pub mod notifier;
pub mod pipeline;

pub use crate::domain::model::{Notification, Record, RunReport, Stage, TransformResult};
pub use crate::domain::ports::{ConfigProvider, Mailer, Pipeline, Storage};
pub use crate::utils::error::Result;
