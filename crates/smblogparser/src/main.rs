mod bootstrap;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use smblog_core::settings::Settings;
use smblog_core::time_utils::TimezoneHandler;
use smblog_data::analysis::AnalysisResult;
use smblog_data::parser::LogParser;
use smblog_runtime::runner::Runner;
use smblog_runtime::sink::{JsonLinesSink, LogSink};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load();

    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("smblogparser v{} starting", env!("CARGO_PKG_VERSION"));

    let config = bootstrap::load_config(settings.config.as_deref())?;
    let device = settings.effective_device(&config);
    if device.is_empty() {
        tracing::warn!("No device configured; metrics will carry an empty device label");
    }

    let parser = LogParser::new(device).with_timezone(TimezoneHandler::new(&settings.timezone));
    let source = bootstrap::build_source(&settings)?;
    tracing::info!("Source: {}, timezone: {}", source.name(), settings.timezone);

    let mut runner = Runner::new(source, parser).with_sink(Arc::new(LogSink));
    if let Some(path) = &settings.metrics_out {
        tracing::info!("Writing gauge samples to {}", path.display());
        runner = runner.with_sink(Arc::new(JsonLinesSink::new(path)));
    }

    if settings.interval == 0 {
        let result = runner.run_once().await?;
        report(&result);
        return Ok(());
    }

    tracing::info!("Running every {}s; Ctrl+C to stop", settings.interval);
    let (mut rx, handle) = runner.start(Duration::from_secs(settings.interval));

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Some(result) => report(&result),
                None => {
                    tracing::warn!("Runner stopped unexpectedly");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received; shutting down");
                break;
            }
        }
    }

    handle.abort();
    Ok(())
}

fn report(result: &AnalysisResult) {
    let totals = &result.totals;
    tracing::info!(
        keys = totals.keys,
        create = totals.create,
        open = totals.open,
        modify = totals.modify,
        delete = totals.delete,
        skipped = result.stats.skipped(),
        "pass complete"
    );
}
