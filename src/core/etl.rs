use crate::core::notifier::Notifier;
use crate::core::{Mailer, Notification, Pipeline, RunReport, Stage, TransformResult};
use crate::utils::error::{EtlError, Result};
use crate::utils::monitor::RunMonitor;

/// Runs fetch -> transform -> upload once and emails the outcome.
pub struct EtlEngine<P: Pipeline, M: Mailer> {
    pipeline: P,
    notifier: Notifier<M>,
    monitor: RunMonitor,
}

impl<P: Pipeline, M: Mailer> EtlEngine<P, M> {
    pub fn new(pipeline: P, mailer: M) -> Self {
        Self::new_with_monitoring(pipeline, mailer, false)
    }

    pub fn new_with_monitoring(pipeline: P, mailer: M, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            notifier: Notifier::new(mailer),
            monitor: RunMonitor::new(monitor_enabled),
        }
    }

    /// Every failing stage sends the failure email before the error is
    /// returned; the email result never changes the run result.
    pub async fn run(&self) -> Result<RunReport> {
        tracing::info!("Starting hemp NASS ETL run");

        match self.execute().await {
            Ok(report) => {
                tracing::info!(
                    "Uploaded {} records to {} ({} bytes)",
                    report.record_count,
                    report.destination,
                    report.bytes_written
                );
                self.notifier.notify(&Notification::success(&report)).await;
                self.monitor.log_final_stats();
                Ok(report)
            }
            Err((stage, e)) => {
                tracing::error!("Run failed during {}: {}", stage, e);
                self.notifier
                    .notify(&Notification::failure(stage, &e))
                    .await;
                self.monitor.log_final_stats();
                Err(e)
            }
        }
    }

    /// Fetch and transform only. Nothing is uploaded and no email is sent.
    pub async fn dry_run(&self) -> Result<TransformResult> {
        tracing::info!("Starting dry run (no upload, no email)");

        let records = self.pipeline.extract().await?;
        tracing::info!("Extracted {} records", records.len());

        let result = self.pipeline.transform(records).await?;
        tracing::info!(
            "Would upload {} records ({} bytes, columns: {})",
            result.record_count,
            result.csv_output.len(),
            result.header.join(",")
        );
        Ok(result)
    }

    async fn execute(&self) -> std::result::Result<RunReport, (Stage, EtlError)> {
        // Extract
        tracing::info!("Fetching records...");
        let records = self
            .pipeline
            .extract()
            .await
            .map_err(|e| (Stage::Fetch, e))?;
        tracing::info!("Extracted {} records", records.len());
        self.monitor.log_stats("Fetch");

        // Transform
        let result = self
            .pipeline
            .transform(records)
            .await
            .map_err(|e| (Stage::Transform, e))?;
        tracing::info!(
            "Transformed {} records into {} CSV bytes",
            result.record_count,
            result.csv_output.len()
        );
        self.monitor.log_stats("Transform");

        // Load
        let report = self
            .pipeline
            .load(result)
            .await
            .map_err(|e| (Stage::Upload, e))?;
        self.monitor.log_stats("Upload");

        Ok(report)
    }
}
