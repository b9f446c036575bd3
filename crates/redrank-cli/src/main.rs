use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "redrank")]
#[command(about = "Reddit SERP rank tracker")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a sync pass: every tracked keyword, or a single one by id.
    Sync {
        #[arg(long)]
        keyword: Option<Uuid>,
    },
    /// Apply pending database migrations.
    Migrate,
    /// Start the HTTP trigger surface.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("redrank=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync { keyword: None }) {
        Commands::Sync { keyword: Some(id) } => {
            let posts = redrank_sync::run_keyword_from_env(id).await?;
            println!("sync complete: keyword={id} posts={}", posts.len());
        }
        Commands::Sync { keyword: None } => {
            let summary = redrank_sync::run_batch_from_env().await?;
            println!(
                "batch complete: total={} succeeded={} failed={}",
                summary.total, summary.succeeded, summary.failed
            );
            for outcome in summary.outcomes.iter().filter(|o| !o.is_success()) {
                eprintln!(
                    "  failed: {} ({})",
                    outcome.keyword,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        Commands::Migrate => {
            let config = redrank_sync::SyncConfig::from_env();
            let store = redrank_storage::PgRankStore::connect(&config.database_url).await?;
            store.run_migrations().await?;
            println!("migrations applied");
        }
        Commands::Serve => {
            redrank_web::serve_from_env().await?;
        }
    }

    Ok(())
}
