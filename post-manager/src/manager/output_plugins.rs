/*!
Modular output system for reconcile reports
*/

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::manager::{
    config::{OutputConfig, OutputPlugin, TerminalFormat},
    delete_queue::{DeleteOutcome, ReconcileReport},
    error::ManagerError,
};

/// Trait for report outputs
#[async_trait]
pub trait ReportSink: Send {
    /// Name of the sink
    fn name(&self) -> &'static str;

    /// Open files, check endpoints, etc.
    async fn initialize(&mut self) -> Result<(), ManagerError>;

    /// Deliver one reconcile report
    async fn handle_report(&mut self, report: &ReconcileReport) -> Result<(), ManagerError>;

    async fn finalize(&mut self) -> Result<(), ManagerError>;
}

/// Fans reports out to every enabled sink
pub struct ReportManager {
    sinks: Vec<Box<dyn ReportSink>>,
}

impl ReportManager {
    /// Build the enabled sinks. `default_timeout` bounds webhook deliveries
    /// that do not set their own.
    pub fn new(configs: &[OutputConfig], default_timeout: Duration) -> Result<Self, ManagerError> {
        let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();

        for config in configs.iter().filter(|config| config.enabled) {
            let sink: Box<dyn ReportSink> = match &config.plugin {
                OutputPlugin::JsonLines { path } => Box::new(JsonLinesSink::new(path.clone())),
                OutputPlugin::Webhook {
                    url,
                    auth_token,
                    timeout_ms,
                } => {
                    let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(default_timeout);
                    Box::new(WebhookSink::new(url.clone(), auth_token.clone(), timeout)?)
                }
                OutputPlugin::Terminal { format } => Box::new(TerminalSink::new(*format)),
            };
            sinks.push(sink);
        }

        info!("Initialized report manager with {} sinks", sinks.len());
        Ok(Self { sinks })
    }

    #[cfg(test)]
    pub fn with_sinks(sinks: Vec<Box<dyn ReportSink>>) -> Self {
        Self { sinks }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub async fn initialize(&mut self) -> Result<(), ManagerError> {
        for sink in &mut self.sinks {
            sink.initialize().await?;
            info!("Initialized report sink: {}", sink.name());
        }
        Ok(())
    }

    /// Deliver a report to every sink. A failing sink is logged and skipped.
    pub async fn handle_report(&mut self, report: &ReconcileReport) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.handle_report(report).await {
                error!("Sink {} failed to process report: {}", sink.name(), e);
            }
        }
    }

    pub async fn finalize(&mut self) -> Result<(), ManagerError> {
        for sink in &mut self.sinks {
            sink.finalize().await?;
        }
        Ok(())
    }
}

/// Appends one JSON report per line
pub struct JsonLinesSink {
    file_path: PathBuf,
    file: Option<std::fs::File>,
}

impl JsonLinesSink {
    pub fn new(file_path: PathBuf) -> Self {
        Self {
            file_path,
            file: None,
        }
    }
}

#[async_trait]
impl ReportSink for JsonLinesSink {
    fn name(&self) -> &'static str {
        "JSON lines"
    }

    async fn initialize(&mut self) -> Result<(), ManagerError> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.file = Some(
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.file_path)?,
        );
        Ok(())
    }

    async fn handle_report(&mut self, report: &ReconcileReport) -> Result<(), ManagerError> {
        if let Some(ref mut file) = self.file {
            writeln!(file, "{}", serde_json::to_string(report)?)?;
            file.flush()?;
        }
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), ManagerError> {
        if let Some(ref mut file) = self.file {
            file.flush()?;
        }
        Ok(())
    }
}

/// POSTs each report as JSON
pub struct WebhookSink {
    url: String,
    auth_token: Option<String>,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(url: String, auth_token: Option<String>, timeout: Duration) -> Result<Self, ManagerError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ManagerError::Output {
                name: "Webhook",
                reason: e.to_string(),
            })?;

        Ok(Self {
            url,
            auth_token,
            client,
        })
    }
}

#[async_trait]
impl ReportSink for WebhookSink {
    fn name(&self) -> &'static str {
        "Webhook"
    }

    async fn initialize(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }

    async fn handle_report(&mut self, report: &ReconcileReport) -> Result<(), ManagerError> {
        let mut request = self.client.post(&self.url);

        if let Some(ref token) = self.auth_token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request.json(report).send().await.map_err(|e| ManagerError::Output {
            name: "Webhook",
            reason: e.to_string(),
        })?;

        if !response.status().is_success() {
            return Err(ManagerError::Output {
                name: "Webhook",
                reason: format!("delivery failed: {}", response.status()),
            });
        }

        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }
}

/// Prints reports to stdout
pub struct TerminalSink {
    format: TerminalFormat,
}

impl TerminalSink {
    pub fn new(format: TerminalFormat) -> Self {
        Self { format }
    }

    fn format_report(&self, report: &ReconcileReport) -> String {
        let when = report.completed_at.format("%Y-%m-%d %H:%M:%S");
        let deleted = report.deleted().count();
        let failed = report.failed().count();

        match self.format {
            TerminalFormat::Plain => {
                let mut out = format!(
                    "RECONCILE {}: {} deleted, {} failed, DELETE QUEUE {}",
                    when,
                    deleted,
                    failed,
                    report.remaining.len()
                );
                for outcome in report.failed() {
                    if let DeleteOutcome::Failed { post_id, error, .. } = outcome {
                        out.push_str(&format!("\n  post {}: {}", post_id, error));
                    }
                }
                if let Some(ref e) = report.storage_error {
                    out.push_str(&format!("\n  queue not saved: {}", e));
                }
                out
            }
            TerminalFormat::Colored => {
                let mut out = format!(
                    "\x1b[36m🔁 Reconcile\x1b[0m {}\n\
                     \x1b[32m✅ Deleted:\x1b[0m {}\n\
                     \x1b[31m❌ Failed:\x1b[0m {}\n\
                     \x1b[33m📥 DELETE QUEUE:\x1b[0m {}",
                    when,
                    deleted,
                    failed,
                    report.remaining.len()
                );
                for outcome in report.failed() {
                    if let DeleteOutcome::Failed { post_id, error, .. } = outcome {
                        out.push_str(&format!("\n   \x1b[31m•\x1b[0m post {}: {}", post_id, error));
                    }
                }
                if let Some(ref e) = report.storage_error {
                    out.push_str(&format!("\n\x1b[31m💾 Queue not saved:\x1b[0m {}", e));
                }
                out
            }
            TerminalFormat::Json => serde_json::to_string_pretty(report)
                .unwrap_or_else(|_| "JSON serialization failed".to_string()),
        }
    }
}

#[async_trait]
impl ReportSink for TerminalSink {
    fn name(&self) -> &'static str {
        "Terminal"
    }

    async fn initialize(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }

    async fn handle_report(&mut self, report: &ReconcileReport) -> Result<(), ManagerError> {
        // quiet when there was nothing to do
        if report.outcomes.is_empty() && report.remaining.is_empty() {
            return Ok(());
        }
        println!("{}", self.format_report(report));
        Ok(())
    }

    async fn finalize(&mut self) -> Result<(), ManagerError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn report() -> ReconcileReport {
        let at = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        ReconcileReport {
            started_at: at,
            completed_at: at,
            outcomes: vec![
                DeleteOutcome::Deleted { post_id: 1 },
                DeleteOutcome::Failed {
                    post_id: 2,
                    status: Some(503),
                    error: "http://fake/posts/2 returned HTTP 503".to_string(),
                },
            ],
            remaining: vec![2],
            storage_error: None,
        }
    }

    #[test]
    fn plain_format_lists_failures() {
        let text = TerminalSink::new(TerminalFormat::Plain).format_report(&report());

        assert!(text.starts_with("RECONCILE 2026-10-19 12:00:00: 1 deleted, 1 failed, DELETE QUEUE 1"));
        assert!(text.contains("post 2: http://fake/posts/2 returned HTTP 503"));
    }

    #[test]
    fn json_format_tags_outcomes() {
        let text = TerminalSink::new(TerminalFormat::Json).format_report(&report());
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["outcomes"][0]["outcome"], "deleted");
        assert_eq!(value["outcomes"][1]["outcome"], "failed");
        assert_eq!(value["outcomes"][1]["status"], 503);
        assert_eq!(value["remaining"], serde_json::json!([2]));
    }

    #[tokio::test]
    async fn json_lines_sink_appends_one_line_per_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("reconcile.jsonl");

        let mut manager = ReportManager::new(
            &[OutputConfig {
                plugin: OutputPlugin::JsonLines { path: path.clone() },
                enabled: true,
            }],
            Duration::from_secs(1),
        )
        .unwrap();
        manager.initialize().await.unwrap();
        manager.handle_report(&report()).await;
        manager.handle_report(&report()).await;
        manager.finalize().await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["remaining"], serde_json::json!([2]));
    }

    #[test]
    fn disabled_outputs_are_skipped() {
        let manager = ReportManager::new(
            &[
                OutputConfig {
                    plugin: OutputPlugin::Terminal {
                        format: TerminalFormat::Plain,
                    },
                    enabled: false,
                },
                OutputConfig {
                    plugin: OutputPlugin::Webhook {
                        url: "http://localhost:9/hook".to_string(),
                        auth_token: None,
                        timeout_ms: Some(500),
                    },
                    enabled: true,
                },
            ],
            Duration::from_secs(1),
        )
        .unwrap();

        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn unreachable_webhook_does_not_fail_delivery() {
        let sink = WebhookSink::new(
            "http://127.0.0.1:9/hook".to_string(),
            Some("secret".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        let mut manager = ReportManager::with_sinks(vec![Box::new(sink)]);

        manager.initialize().await.unwrap();
        manager.handle_report(&report()).await;
    }

    #[tokio::test]
    async fn silent_webhook_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // accept and never answer
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let mut sink = WebhookSink::new(format!("http://{}/hook", addr), None, Duration::from_millis(200)).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), sink.handle_report(&report()))
            .await
            .expect("webhook delivery should give up on its own");

        assert!(matches!(result, Err(ManagerError::Output { name: "Webhook", .. })));
    }

    #[tokio::test]
    async fn silent_webhook_does_not_stall_the_manager() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let mut manager = ReportManager::new(
            &[OutputConfig {
                plugin: OutputPlugin::Webhook {
                    url: format!("http://{}/hook", addr),
                    auth_token: None,
                    timeout_ms: None,
                },
                enabled: true,
            }],
            Duration::from_millis(200),
        )
        .unwrap();

        let delivered = tokio::time::timeout(Duration::from_secs(5), manager.handle_report(&report())).await;

        assert!(delivered.is_ok());
    }
}
