//! Best-effort application log shipping.
//!
//! Application events are shipped to a remote sink (CloudWatch Logs)
//! when one is configured; any failure falls back to plain console
//! emission through `tracing`.  Shipping never returns an error to the
//! caller, and startup never fails because of logging.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use aws_sdk_cloudwatchlogs::types::InputLogEvent;
use aws_sdk_cloudwatchlogs::Client;
use tracing::{error, info, warn};

use crate::config::Settings;

/// Severity attached to shipped events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
        }
    }
}

/// Render an event the way the remote sink stores it.
fn format_event(level: LogLevel, message: &str) -> String {
    format!("[{}] {}", level.as_str(), message)
}

/// A destination for application log events.
pub trait LogSink: Send + Sync + 'static {
    /// Idempotently create whatever the sink needs to accept events.
    fn ensure_sink(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;

    /// Ship a single timestamped event.
    fn emit(
        &self,
        level: LogLevel,
        message: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>>;
}

/// Sink that ships events to a CloudWatch Logs stream.
pub struct CloudWatchSink {
    /// CloudWatch Logs SDK client.
    client: Client,
    /// Log group name.
    group: String,
    /// Log stream name.
    stream: String,
    /// Echo shipped events to the console (debug mode).
    debug_echo: bool,
}

impl CloudWatchSink {
    /// Create a sink from the application settings.
    ///
    /// Reuses the object-store credentials; both talk to the same AWS
    /// account.
    pub async fn new(settings: &Settings) -> Self {
        let creds = aws_sdk_cloudwatchlogs::config::Credentials::new(
            &settings.storage.access_key_id,
            &settings.storage.secret_access_key,
            None, // session_token
            None, // expiry
            "bookswap-settings",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(settings.storage.region.clone()))
            .credentials_provider(creds)
            .load()
            .await;

        Self {
            client: Client::new(&sdk_config),
            group: settings.logging.group.clone(),
            stream: settings.logging.stream.clone(),
            debug_echo: settings.server.debug,
        }
    }
}

impl LogSink for CloudWatchSink {
    fn ensure_sink(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            if let Err(e) = self
                .client
                .create_log_group()
                .log_group_name(&self.group)
                .send()
                .await
            {
                let service_err = e.into_service_error();
                // An existing group is the normal steady state.
                if !service_err.is_resource_already_exists_exception() {
                    return Err(anyhow::anyhow!("create_log_group: {service_err}"));
                }
            }

            if let Err(e) = self
                .client
                .create_log_stream()
                .log_group_name(&self.group)
                .log_stream_name(&self.stream)
                .send()
                .await
            {
                let service_err = e.into_service_error();
                if !service_err.is_resource_already_exists_exception() {
                    return Err(anyhow::anyhow!("create_log_stream: {service_err}"));
                }
            }

            Ok(())
        })
    }

    fn emit(
        &self,
        level: LogLevel,
        message: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        let formatted = format_event(level, message);
        Box::pin(async move {
            let event = InputLogEvent::builder()
                .timestamp(chrono::Utc::now().timestamp_millis())
                .message(&formatted)
                .build()
                .map_err(|e| anyhow::anyhow!("build log event: {e}"))?;

            self.client
                .put_log_events()
                .log_group_name(&self.group)
                .log_stream_name(&self.stream)
                .log_events(event)
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("put_log_events: {e}"))?;

            if self.debug_echo {
                info!("cloudwatch[{}/{}]: {}", self.group, self.stream, formatted);
            }

            Ok(())
        })
    }
}

/// Sink that writes events to the local console via `tracing`.
pub struct ConsoleSink;

impl LogSink for ConsoleSink {
    fn ensure_sink(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }

    fn emit(
        &self,
        level: LogLevel,
        message: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        match level {
            LogLevel::Info => info!("{message}"),
            LogLevel::Warning => warn!("{message}"),
            LogLevel::Error => error!("{message}"),
        }
        Box::pin(async { Ok(()) })
    }
}

/// Application logger: a primary sink with a console fallback.
///
/// Every failure path ends at the console, so [`AppLogger::log`] has no
/// error to return.
pub struct AppLogger {
    primary: Option<Arc<dyn LogSink>>,
    fallback: Arc<dyn LogSink>,
}

impl AppLogger {
    pub fn new(primary: Option<Arc<dyn LogSink>>, fallback: Arc<dyn LogSink>) -> Self {
        Self { primary, fallback }
    }

    /// Logger that ships to `primary`, falling back to the console.
    pub fn remote(primary: Arc<dyn LogSink>) -> Self {
        Self::new(Some(primary), Arc::new(ConsoleSink))
    }

    /// Console-only logger (no remote sink configured, used in tests).
    pub fn console_only() -> Self {
        Self::new(None, Arc::new(ConsoleSink))
    }

    /// Make sure the primary sink can accept events.
    ///
    /// Failures are reported locally and swallowed.
    pub async fn ensure_sink(&self) {
        if let Some(primary) = &self.primary {
            if let Err(e) = primary.ensure_sink().await {
                warn!("remote log sink unavailable: {e}");
            }
        }
    }

    /// Ship one event, falling back to the console on any failure.
    pub async fn log(&self, level: LogLevel, message: &str) {
        if let Some(primary) = &self.primary {
            match primary.emit(level, message).await {
                Ok(()) => return,
                Err(e) => warn!("log shipping failed, falling back to console: {e}"),
            }
        }
        let _ = self.fallback.emit(level, message).await;
    }

    pub async fn info(&self, message: &str) {
        self.log(LogLevel::Info, message).await;
    }

    pub async fn error(&self, message: &str) {
        self.log(LogLevel::Error, message).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Sink that records every event it receives.
    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
        ensured: Mutex<bool>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl LogSink for RecordingSink {
        fn ensure_sink(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            *self.ensured.lock().unwrap() = true;
            Box::pin(async { Ok(()) })
        }

        fn emit(
            &self,
            level: LogLevel,
            message: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            self.events
                .lock()
                .unwrap()
                .push(format_event(level, message));
            Box::pin(async { Ok(()) })
        }
    }

    /// Sink that rejects everything.
    struct FailingSink;

    impl LogSink for FailingSink {
        fn ensure_sink(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            Box::pin(async { Err(anyhow::anyhow!("sink unreachable")) })
        }

        fn emit(
            &self,
            _level: LogLevel,
            _message: &str,
        ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
            Box::pin(async { Err(anyhow::anyhow!("sink unreachable")) })
        }
    }

    #[test]
    fn test_format_event() {
        assert_eq!(format_event(LogLevel::Info, "started"), "[INFO] started");
        assert_eq!(format_event(LogLevel::Error, "boom"), "[ERROR] boom");
        assert_eq!(
            format_event(LogLevel::Warning, "careful"),
            "[WARNING] careful"
        );
    }

    #[tokio::test]
    async fn test_primary_receives_events() {
        let primary = Arc::new(RecordingSink::default());
        let fallback = Arc::new(RecordingSink::default());
        let logger = AppLogger::new(Some(primary.clone()), fallback.clone());

        logger.info("book uploaded").await;

        assert_eq!(primary.events(), vec!["[INFO] book uploaded"]);
        assert!(fallback.events().is_empty());
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_console_sink() {
        let fallback = Arc::new(RecordingSink::default());
        let logger = AppLogger::new(Some(Arc::new(FailingSink)), fallback.clone());

        logger.error("upload failed").await;

        assert_eq!(fallback.events(), vec!["[ERROR] upload failed"]);
    }

    #[tokio::test]
    async fn test_ensure_sink_reaches_primary() {
        let primary = Arc::new(RecordingSink::default());
        let logger = AppLogger::new(Some(primary.clone()), Arc::new(ConsoleSink));
        logger.ensure_sink().await;
        assert!(*primary.ensured.lock().unwrap());
    }

    #[tokio::test]
    async fn test_ensure_sink_swallows_failures() {
        let logger = AppLogger::new(Some(Arc::new(FailingSink)), Arc::new(ConsoleSink));
        // Must not panic or propagate the error.
        logger.ensure_sink().await;
    }

    #[tokio::test]
    async fn test_console_only_logs_without_primary() {
        let logger = AppLogger::console_only();
        logger.log(LogLevel::Warning, "no remote sink").await;
    }
}
