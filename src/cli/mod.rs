use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sitework")]
#[command(about = "Sitework CLI - server and admin diagnostics for the Sitework API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server")]
    Serve {
        #[arg(long, help = "Port to bind (overrides SITEWORK_PORT/PORT)")]
        port: Option<u16>,
    },

    #[command(about = "Run the referential integrity audit against the configured store")]
    Integrity,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port } => crate::app::serve(port).await,
        Commands::Integrity => integrity(cli.json).await,
    }
}

/// On-demand admin diagnostic. Exits non-zero when the store has issues
/// so it can gate deploy pipelines.
async fn integrity(json: bool) -> anyhow::Result<()> {
    let config = crate::config::config();
    let store = crate::app::build_store(config)?;
    let report = crate::core::integrity::run_integrity_check(store.as_ref()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("orphaned records:   {}", report.orphaned_records.len());
        println!("date violations:    {}", report.date_violations.len());
        println!("numeric violations: {}", report.numeric_violations.len());
        println!("total issues:       {}", report.total_issues);
    }

    if report.total_issues > 0 {
        std::process::exit(1);
    }
    Ok(())
}
