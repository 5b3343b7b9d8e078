use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod aggregate;
mod api;
mod db;
mod error;
mod grading;
mod models;
mod report;
mod store;

use aggregate::GradeEngine;
use store::{MemoryStore, RecordStore};

#[derive(Parser)]
#[command(name = "learner-grade-stats")]
#[command(about = "Weighted grade averages and pass rates per learner and class", long_about = None)]
struct Cli {
    /// Read score records from a CSV file instead of Postgres
    #[arg(long, global = true)]
    csv: Option<PathBuf>,
    #[arg(long, global = true, default_value_t = 5)]
    max_connections: u32,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema and indexes
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import score entries from a CSV file
    Import {
        #[arg(long = "from")]
        from: PathBuf,
    },
    /// Weighted average per class for one learner
    LearnerAvg {
        learner_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Pass rate across all learners
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Pass rate within one class
    ClassStats {
        class_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Serve the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        #[arg(long, default_value_t = 3000)]
        port: u16,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "learner_grade_stats=info,tower_http=info".into());
    let format = std::env::var("GRADE_STATS_LOG_FORMAT").unwrap_or_default();

    if format == "json" {
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

async fn connect(max_connections: u32) -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance (or pass --csv)")?;

    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

async fn open_store(cli: &Cli) -> anyhow::Result<Arc<dyn RecordStore>> {
    match &cli.csv {
        Some(path) => Ok(Arc::new(MemoryStore::from_csv_path(path)?)),
        None => {
            let pool = connect(cli.max_connections).await?;
            Ok(Arc::new(db::PgRecordStore::new(pool)))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Commands::InitDb => {
            let pool = connect(cli.max_connections).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect(cli.max_connections).await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { from } => {
            let pool = connect(cli.max_connections).await?;
            let inserted = db::import_csv(&pool, from).await?;
            println!("Imported {inserted} score entries from {}.", from.display());
        }
        Commands::LearnerAvg { learner_id, json } => {
            let learner_id = error::parse_id(learner_id, "learner id")?;
            let engine = GradeEngine::new(open_store(&cli).await?);
            let averages = engine.class_averages(Some(learner_id)).await?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&averages)?);
            } else if averages.is_empty() {
                println!("No scores found for learner {learner_id}.");
            } else {
                println!("Weighted averages for learner {learner_id}:");
                for average in &averages {
                    println!("- class {}: {:.2}", average.class_id, average.average);
                }
            }
        }
        Commands::Stats { json } => {
            let engine = GradeEngine::new(open_store(&cli).await?);
            let stats = engine.population_stats().await?;
            print_stats("all learners", &stats, *json)?;
        }
        Commands::ClassStats { class_id, json } => {
            let class_id = error::parse_id(class_id, "class id")?;
            let engine = GradeEngine::new(open_store(&cli).await?);
            let stats = engine.class_stats(class_id).await?;
            print_stats(&format!("class {class_id}"), &stats, *json)?;
        }
        Commands::Report { out, limit } => {
            let engine = GradeEngine::new(open_store(&cli).await?);
            let data = report::collect(&engine).await?;
            let report = report::build_report(chrono::Utc::now(), &data, *limit);
            std::fs::write(out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Serve { host, port } => {
            let engine = GradeEngine::new(open_store(&cli).await?);
            let addr = format!("{host}:{port}");
            api::run_server(&addr, engine).await?;
        }
    }

    Ok(())
}

fn print_stats(label: &str, stats: &models::StatsReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(stats)?);
    } else {
        println!(
            "{label}: {} of {} learners above {} (ratio {:.2})",
            stats.passing_count,
            stats.total_count,
            grading::PASS_THRESHOLD,
            stats.pass_ratio
        );
    }
    Ok(())
}
