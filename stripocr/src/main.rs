use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stripocr::config::Config;
use stripocr::models::MergedDocument;
use stripocr::ocr::{OcrProvider, TextExtractor};
use stripocr::processing::JobDriver;

#[derive(Parser)]
#[command(name = "stripocr")]
#[command(about = "Extract text from tall images by splitting them into OCR-sized strips")]
struct Args {
    /// Print one JSON report per image instead of plain text
    #[arg(long)]
    json: bool,

    /// Image files to process
    #[arg(required = true)]
    images: Vec<PathBuf>,
}

#[derive(Serialize)]
struct JobReport {
    path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<MergedDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env();

    tracing::info!("Initializing OCR provider: {}...", config.ocr.model);
    let provider = OcrProvider::new(&config.ocr)?;
    if !provider.is_available() {
        tracing::warn!("OCR unavailable - every job will fail until a backend is configured");
    }
    let extractor: Arc<dyn TextExtractor> = Arc::new(provider);

    let driver = JobDriver::new(&config, extractor)?;

    let cancel_token = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel_token.clone()));

    let jobs = args.images.iter().map(|path| {
        let driver = driver.clone();
        let token = cancel_token.child_token();
        let path = path.clone();
        async move {
            let result = match tokio::fs::read(&path).await {
                Ok(bytes) => driver
                    .submit_with_cancel(&bytes, &token)
                    .await
                    .map_err(anyhow::Error::from),
                Err(e) => Err(anyhow::anyhow!("Failed to read {}: {e}", path.display())),
            };
            (path, result)
        }
    });

    let results = futures::future::join_all(jobs).await;
    let total = results.len();
    let mut failed = 0;

    let reports: Vec<JobReport> = results
        .into_iter()
        .map(|(path, result)| match result {
            Ok(document) => JobReport {
                path,
                document: Some(document),
                error: None,
            },
            Err(e) => {
                failed += 1;
                tracing::error!(path = %path.display(), "Job failed: {}", e);
                JobReport {
                    path,
                    document: None,
                    error: Some(e.to_string()),
                }
            }
        })
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_text(&reports);
    }

    if failed > 0 {
        return Err(anyhow::anyhow!("{failed} of {total} images failed"));
    }

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stripocr=info".into());

    // Logs go to stderr so stdout carries only extracted text.
    if std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json")) {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_text(reports: &[JobReport]) {
    let with_headers = reports.len() > 1;
    for report in reports {
        let Some(document) = &report.document else {
            continue;
        };
        if with_headers {
            println!("==> {} <==", report.path.display());
        }
        println!("{}", document.text);
        if with_headers {
            println!();
        }
    }
}

async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, cancelling jobs...");
    cancel_token.cancel();
}
