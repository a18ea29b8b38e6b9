use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use mailflow::agents::AgentRegistry;
use mailflow::agents::builtin::standard_units;
use mailflow::message::EmailMessage;
use mailflow::pipeline::{PipelineExecutor, TaskLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing: stderr plus a daily-rolling file.
    let log_dir = std::env::var("MAILFLOW_LOG_DIR").unwrap_or_else(|_| "./logs".to_string());
    let file_appender = tracing_appender::rolling::daily(&log_dir, "mailflow.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    let registry = Arc::new(AgentRegistry::new());
    for unit in standard_units() {
        registry.register(unit).await?;
    }
    let executor = PipelineExecutor::new(registry.clone(), Arc::new(TaskLedger::new()));

    eprintln!("📧 mailflow v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Agent units: {}", registry.count().await);
    eprintln!("   Paste a message as 'sender | subject | body' and press Enter.");
    eprintln!("   A bare line is treated as the body. /quit to exit.\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        let mut parts = line.splitn(3, '|').map(str::trim);
        let (sender, subject, body) = match (parts.next(), parts.next(), parts.next()) {
            (Some(sender), Some(subject), Some(body)) => (sender, subject, body),
            _ => ("cli@localhost", "(no subject)", line),
        };

        let message =
            EmailMessage::inbound(sender, vec!["me@localhost".into()], subject, body);
        let report = executor.run(message).await?;

        println!(
            "category={} priority={} labels=[{}] units={}ok/{}failed ({}ms)",
            report.message.category,
            report.message.priority,
            report.message.labels.join(","),
            report.succeeded(),
            report.failed(),
            report.elapsed.as_millis()
        );
        if let Some(summary) = report.message.analysis.as_ref().and_then(|a| a.summary.as_deref()) {
            println!("summary: {summary}");
        }
    }

    Ok(())
}
