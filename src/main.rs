use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

mod db;
mod metrics;
mod models;
mod normalize;
mod observations;
mod period;
mod report;
mod session;

use models::{Manager, ManagerScorecard, PeriodSelector};
use session::{ScorecardRequest, ScorecardSession};

#[derive(Parser)]
#[command(name = "manager-scorecard")]
#[command(about = "Scores managers from text-channel and call-review observations", long_about = None)]
struct Cli {
    /// Maximum Postgres connections in the pool
    #[arg(long, global = true, default_value_t = 5)]
    max_connections: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct PeriodArgs {
    /// Month of the period (1-12)
    #[arg(long)]
    month: u32,
    #[arg(long)]
    year: i32,
    /// Reporting week of the month (1-5); omit for the whole month
    #[arg(long)]
    week: Option<u8>,
}

impl PeriodArgs {
    fn selector(self) -> PeriodSelector {
        match self.week {
            Some(week) => PeriodSelector::week(week, self.month, self.year),
            None => PeriodSelector::month(self.month, self.year),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import text-channel events from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show period totals and weekly history for one manager
    Stats {
        #[arg(long)]
        email: String,
        #[command(flatten)]
        period: PeriodArgs,
        /// Print the full scorecard as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rank every manager by score for a period
    Rank {
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown scorecard for one manager
    Report {
        #[arg(long)]
        email: String,
        #[command(flatten)]
        period: PeriodArgs,
        #[arg(long, default_value = "scorecard.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(cli.max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    let session = ScorecardSession::new();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} events from {}.", csv.display());
        }
        Commands::Stats {
            email,
            period: period_args,
            json,
        } => {
            let manager = db::find_manager_by_email(&pool, &email).await?;
            let selector = period_args.selector();
            let Some(scorecard) = load_scorecard(&pool, &session, &manager, selector).await
            else {
                return Ok(());
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&scorecard)?);
                return Ok(());
            }

            let stats = scorecard.stats;
            println!(
                "{} ({}) for {}: score {} from {} messages, {} negative, {} positive",
                manager.full_name,
                manager.email,
                period::label(&selector),
                stats.score,
                stats.total_messages,
                stats.total_negative,
                stats.total_positive
            );
            for bucket in &scorecard.weekly {
                println!(
                    "- week {}: score {} ({} messages, {} negative, {} positive)",
                    bucket.week, bucket.score, bucket.messages, bucket.negative, bucket.positive
                );
            }
        }
        Commands::Rank {
            period: period_args,
            limit,
        } => {
            let selector = period_args.selector();
            let predicate = period::resolve(&selector);
            let managers = db::list_managers(&pool).await?;

            if managers.is_empty() {
                println!("No managers registered.");
                return Ok(());
            }

            let mut entries = Vec::with_capacity(managers.len());
            for manager in managers {
                let inputs = db::fetch_inputs(&pool, manager.id, &predicate).await;
                let stats = metrics::compute_scorecard(inputs).stats;
                entries.push((manager, stats));
            }

            let ranked = metrics::rank_managers(entries);
            print!("{}", report::build_ranking(&selector, &ranked, limit));
        }
        Commands::Report {
            email,
            period: period_args,
            out,
        } => {
            let manager = db::find_manager_by_email(&pool, &email).await?;
            let selector = period_args.selector();
            let Some(scorecard) = load_scorecard(&pool, &session, &manager, selector).await
            else {
                return Ok(());
            };

            let report = report::build_report(&manager, &selector, &scorecard);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

/// Retrieves and scores one manager's period, returning `None` if the
/// selection changed while the data was loading.
async fn load_scorecard(
    pool: &PgPool,
    session: &ScorecardSession,
    manager: &Manager,
    selector: PeriodSelector,
) -> Option<ManagerScorecard> {
    let ticket = session
        .begin(ScorecardRequest {
            manager: manager.id,
            period: selector,
        })
        .await;

    let predicate = period::resolve(&ticket.request().period);
    let inputs = db::fetch_inputs(pool, manager.id, &predicate).await;
    let scorecard = metrics::compute_scorecard(inputs);

    info!(
        manager = %manager.email,
        period = %period::label(&selector),
        score = scorecard.stats.score,
        "scorecard ready"
    );

    session.accept(ticket, scorecard).await
}
