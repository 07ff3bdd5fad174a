use anyhow::Result;
use chrono::NaiveDate;
use clap::Parser;
use daily_image_rotator::app::App;
use daily_image_rotator::models::{BatchOutcome, DatePartition};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "daily-image-rotator")]
#[command(about = "Replace yesterday's images with a fresh daily batch")]
struct CliArgs {
    /// Optional target date in YYYY-MM-DD format (defaults to today, UTC).
    #[arg(value_name = "DATE", value_parser = parse_date_arg)]
    target_date: Option<NaiveDate>,
}

fn parse_date_arg(input: &str) -> std::result::Result<NaiveDate, String> {
    input
        .parse::<DatePartition>()
        .map(|partition| partition.date())
        .map_err(|e| e.to_string())
}

fn log_summary(outcome: &BatchOutcome) {
    for report in [&outcome.purge, &outcome.reset] {
        if !report.is_clean() {
            warn!(
                "Purge of {} incomplete (objects: {:?}, metadata: {:?})",
                report.partition, report.object_store, report.metadata_store
            );
        }
    }

    for failure in &outcome.failures {
        warn!("Failed {}: {}", failure.candidate_ref(), failure.reason);
    }

    info!(
        "Stored {}/{} images for {} ({} failed)",
        outcome.succeeded, outcome.requested, outcome.partition, outcome.failed
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daily_image_rotator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting daily-image-rotator");

    let args = CliArgs::parse();
    let today = args
        .target_date
        .map(DatePartition::new)
        .unwrap_or_else(DatePartition::today);

    let app = match App::new().await {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    let run_timeout = app.settings().run_timeout;
    match tokio::time::timeout(run_timeout, app.run(today)).await {
        Ok(Ok(outcome)) => {
            log_summary(&outcome);
            info!("Rotation completed");
            Ok(())
        }
        Ok(Err(e)) => {
            error!("Rotation failed: {}", e);
            std::process::exit(1);
        }
        Err(_) => {
            error!("Rotation did not finish within {:?}", run_timeout);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_date_arg;

    #[test]
    fn test_parse_date_arg_valid() {
        let parsed = parse_date_arg("2026-02-07").unwrap();
        assert_eq!(parsed.to_string(), "2026-02-07");
    }

    #[test]
    fn test_parse_date_arg_invalid() {
        let err = parse_date_arg("02/07/2026").unwrap_err();
        assert!(err.contains("YYYY-MM-DD"));
    }
}
