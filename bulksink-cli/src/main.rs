use bulksink::{create_bulk_sink, IndexRecord, SinkEvent, SinkOptions};
use bulksink_http::HttpBulkClient;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Stream newline-delimited JSON records into a bulk endpoint.
#[derive(Parser)]
#[command(name = "bulksink")]
struct Cli {
    /// Base URL of the bulk backend; records are POSTed to `<url>/_bulk`.
    #[arg(long, env = "BULKSINK_URL")]
    url: String,

    /// Read records from this file instead of stdin.
    #[arg(long)]
    input: Option<PathBuf>,

    /// JSON options file (`highWaterMark`, `timeout`).
    #[arg(long, env = "BULKSINK_CONFIG")]
    config: Option<PathBuf>,

    /// Records per bulk submission. Overrides the options file.
    #[arg(long)]
    high_water_mark: Option<usize>,

    /// Idle flush interval in milliseconds. Overrides the options file; 0 disables.
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long, default_value_t = 30)]
    request_timeout_secs: u64,
}

impl Cli {
    fn sink_options(&self) -> SinkOptions {
        let mut options = SinkOptions::load_or_default(self.config.as_deref());
        if let Some(n) = self.high_water_mark {
            options = options.with_high_water_mark(n);
        }
        if let Some(ms) = self.timeout_ms {
            options = options.with_timeout(Duration::from_millis(ms));
        }
        options
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let options = cli.sink_options();
    let client = HttpBulkClient::with_timeout(
        cli.url.clone(),
        Duration::from_secs(cli.request_timeout_secs),
    );
    let (sink, mut events) = create_bulk_sink(Some(client), options)?;

    let reporter = tokio::spawn(async move {
        let mut errors = 0usize;
        while let Some(event) = events.recv().await {
            match event {
                SinkEvent::Flushed {
                    records,
                    written_records,
                } => tracing::info!(records, written_records, "flushed"),
                SinkEvent::Error(e) => {
                    errors += 1;
                    tracing::error!(code = e.code(), "{}", e)
                }
                SinkEvent::Finished { written_records } => {
                    tracing::info!(written_records, "finished")
                }
            }
        }
        errors
    });

    let input: Box<dyn AsyncRead + Unpin + Send> = match &cli.input {
        Some(path) => Box::new(tokio::fs::File::open(path).await?),
        None => Box::new(tokio::io::stdin()),
    };
    let mut lines = BufReader::new(input).lines();

    let mut line_no = 0usize;
    let mut skipped = 0usize;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let record = match serde_json::from_str::<serde_json::Value>(&line)
            .map_err(bulksink::SinkError::from)
            .and_then(|v| IndexRecord::from_json(&v))
        {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Skipping line {}: {}", line_no, e);
                skipped += 1;
                continue;
            }
        };
        // Failures are reported by the event reporter; keep streaming.
        let _ = sink.write(record)?.await;
    }

    let outcome = sink.close(None).await;
    let errors = reporter.await.unwrap_or_else(|e| {
        tracing::warn!("event reporter failed: {}", e);
        0
    });

    let summary = outcome?;
    tracing::info!(
        lines = line_no,
        skipped,
        written_records = summary.written_records,
        flushes = summary.flushes,
        "done"
    );
    if errors > 0 {
        return Err(format!("{} errors while indexing, see log", errors).into());
    }
    Ok(())
}
