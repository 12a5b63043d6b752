//! Run one end-of-day analysis from the command line.
//!
//! Usage: `analyze-once [focus words...]`

use std::process::ExitCode;

use eod_analyst::{
    config::Config,
    workflow::{DeliveryReport, EndOfDayWorkflow, LogReporter},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "eod_analyst=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let focus = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let focus = Some(focus.trim()).filter(|f| !f.is_empty());

    let workflow = EndOfDayWorkflow::from_config(&config);
    match workflow.run(focus, &LogReporter).await {
        Ok(summary) => {
            println!("{}", summary.message);
            println!(
                "  datasets: {}  charts: {}  iterations: {}  finalized: {}",
                summary.file_count, summary.chart_count, summary.iterations, summary.finalized
            );
            if let Some(path) = &summary.report_path {
                println!("  report: {}", path.display());
            }
            match &summary.delivery {
                DeliveryReport::NotConfigured => println!("  delivery: not configured"),
                DeliveryReport::Delivered => println!("  delivery: delivered"),
                DeliveryReport::Accepted { warning } => println!("  delivery: accepted ({})", warning),
                DeliveryReport::Failed { error } => println!("  delivery: failed ({})", error),
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Analysis failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
