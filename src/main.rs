//! Talkwalker harvester CLI
//!
//! One subcommand runs the full harvest, one runs only the credit
//! estimation. Configuration comes from the environment; per-job
//! parameters come from the command line (or, for scheduled runs, from
//! the deployment config map).

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use talkwalker_harvester::config::Config;
use talkwalker_harvester::driver::Driver;
use talkwalker_harvester::error::HarvestError;
use talkwalker_harvester::request::HarvestRequest;
use talkwalker_harvester::sources::twitter::HttpTwitterSource;
use talkwalker_harvester::storage::S3ObjectStore;
use talkwalker_harvester::{credits, request};

/// Talkwalker harvester - windowed social listening pulls with Twitter re-hydration
#[derive(Parser, Debug)]
#[command(name = "talkwalker-harvester")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Windowed Talkwalker harvesting with Twitter re-hydration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, default_value = "false", global = true)]
    json_logs: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one harvest over a date range
    Run {
        /// Talkwalker project id (falls back to PROJECT_ID from env)
        #[arg(long, default_value = "")]
        project_id: String,

        /// Topic id to harvest
        #[arg(long, default_value = "")]
        topic_id: String,

        /// Task id for log correlation
        #[arg(long)]
        task_id: String,

        /// Inclusive start date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        from_date: Option<String>,

        /// Inclusive end date (YYYY-MM-DD); defaults to 30 days after start
        #[arg(long)]
        to_date: Option<String>,

        /// Fetch full article content for news-type records
        #[arg(long, default_value = "false")]
        get_news_links: bool,

        /// Scheduled run: take topic/project/news parameters from the
        /// deployment config instead of the command line
        #[arg(long, default_value = "false")]
        scheduled: bool,
    },

    /// Check credit usage for a topic without harvesting
    Estimate {
        #[arg(long, default_value = "")]
        project_id: String,

        #[arg(long)]
        topic_id: String,
    },
}

/// Sets up structured logging with tracing
fn setup_logging(log_level: &str, json_output: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    if json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(&cli.log_level, cli.json_logs);

    let correlation_id = uuid::Uuid::new_v4().to_string();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        correlation_id = %correlation_id,
        "Starting talkwalker harvester"
    );

    if let Err(e) = run(cli).await {
        // Full chain, then a non-zero exit; there is no partial-success
        // result to return.
        error!(error = ?e, "Task failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        Commands::Run {
            project_id,
            topic_id,
            task_id,
            from_date,
            to_date,
            get_news_links,
            scheduled,
        } => {
            config.validate()?;

            let inputs = resolve_inputs(
                &config,
                project_id,
                topic_id,
                from_date,
                to_date,
                get_news_links,
                scheduled,
            )?;

            let request = HarvestRequest::new(
                inputs.project_id,
                inputs.topic_id,
                task_id,
                inputs.from_date.as_deref(),
                inputs.to_date.as_deref(),
                inputs.get_news_links,
                config.page_size,
                config.max_retries,
            )?;

            let storage = S3ObjectStore::new(config.s3_endpoint_url.as_deref()).await;
            let twitter =
                HttpTwitterSource::new(config.twitter_token(), config.max_retries)?;

            let driver = Driver::new(&config, &storage, &twitter);
            let metadata = driver.run(&request).await?;

            // The sidecar doubles as the machine-readable run result.
            println!("{}", serde_json::to_string(&metadata)?);
        }

        Commands::Estimate {
            project_id,
            topic_id,
        } => {
            if config.api_key().is_empty() {
                return Err(HarvestError::MissingConfig("API_KEY".to_string()).into());
            }
            let project_id = non_empty(project_id)
                .or_else(|| config.project_id.clone())
                .ok_or_else(|| HarvestError::MissingConfig("PROJECT_ID".to_string()))?;

            let http = reqwest::Client::builder().build()?;
            let estimate = credits::estimate(
                &http,
                &config.api_base_url,
                config.api_key(),
                &topic_id,
                &project_id,
            )
            .await?;

            println!(
                "topic: {}\nrequired credits: {}\navailable credits: {}\nsufficient: {}",
                topic_id,
                estimate.required_credits,
                estimate.available_credits,
                estimate.sufficient
            );
        }
    }

    Ok(())
}

struct RunInputs {
    project_id: String,
    topic_id: String,
    from_date: Option<String>,
    to_date: Option<String>,
    get_news_links: bool,
}

/// Applies scheduled-run fallbacks and input validation before the
/// request is built.
fn resolve_inputs(
    config: &Config,
    mut project_id: String,
    mut topic_id: String,
    mut from_date: Option<String>,
    to_date: Option<String>,
    mut get_news_links: bool,
    scheduled: bool,
) -> Result<RunInputs> {
    if scheduled {
        info!("Scheduled run - job parameters come from the config map");
        if from_date.is_none() {
            from_date = config.tw_backfill_start_date.clone();
            info!(from = ?from_date, "From date taken from backfill start");
        }
        project_id = config.tw_project_id.clone().unwrap_or_default();
        topic_id = config.tw_topic_id.clone().unwrap_or_default();
        get_news_links = config.tw_download_news.unwrap_or(false);
    } else {
        info!("Manual run - scheduled parameters are ignored");
    }

    if topic_id.trim().is_empty() {
        return Err(HarvestError::MissingConfig("topic_id".to_string()).into());
    }
    let project_id = non_empty(project_id)
        .or_else(|| config.project_id.clone())
        .ok_or_else(|| HarvestError::MissingConfig("project_id".to_string()))?;

    // Strip any time portion early so bad dates fail before setup.
    let from_date = from_date
        .map(|d| request::parse_date(&d).map(|p| p.format("%Y-%m-%d").to_string()))
        .transpose()?;
    let to_date = to_date
        .map(|d| request::parse_date(&d).map(|p| p.format("%Y-%m-%d").to_string()))
        .transpose()?;

    Ok(RunInputs {
        project_id,
        topic_id,
        from_date,
        to_date,
        get_news_links,
    })
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
