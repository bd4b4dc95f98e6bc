//! fid-gen - Facility identifier generator CLI
//!
//! Classifies a facility draft, allocates the next sequence in its partition
//! and prints the identifier with its fusion audit trail as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fid_common::config::FidConfig;
use fid_common::db::init_database;
use fid_common::logging::init_tracing;
use fid_common::SequencePartitionKey;
use fid_gen::db::{reconcile_partition, FacilityRepository, SqliteSequenceStore};
use fid_gen::{FacilityDraft, FacilityIdentifierService};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "fid-gen")]
#[command(about = "Facility identifier generator")]
#[command(version)]
struct Args {
    /// Configuration file (overrides FID_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an identifier for a new facility
    Generate {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        industry_text: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Year to date the identifier with (defaults to the current year)
        #[arg(long)]
        year: Option<u16>,
        /// Record the facility in the database after generation
        #[arg(long)]
        register: bool,
    },
    /// Parse and validate an identifier
    Validate { identifier: String },
    /// Raise a partition counter to the highest registered sequence
    Reconcile {
        industry: String,
        region: String,
        year: u16,
    },
    /// List registered facilities awaiting classification review
    Pending,
    /// Show every partition counter
    Counters,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (config, source) = FidConfig::resolve(args.config.as_deref())?;
    init_tracing(&config.logging)?;

    info!("Starting fid-gen v{}", env!("CARGO_PKG_VERSION"));
    source.log();

    let db_path = config.database.database_path();
    let pool = init_database(&db_path, &config.database)
        .await
        .with_context(|| format!("opening database {}", db_path.display()))?;
    let store = SqliteSequenceStore::new(pool.clone());
    let repository = FacilityRepository::new(pool);

    match args.command {
        Command::Generate {
            name,
            industry_text,
            address,
            phone,
            email,
            year,
            register,
        } => {
            let draft = FacilityDraft {
                name,
                industry_text,
                address,
                phone,
                email,
            };
            let service = FacilityIdentifierService::from_config(&config, Arc::new(store))?;
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let output = if register {
                let registered = match year {
                    Some(year) => {
                        service
                            .register_facility_for_year(&draft, year, &repository, &cancel)
                            .await?
                    }
                    None => service.register_facility(&draft, &repository, &cancel).await?,
                };
                serde_json::to_string_pretty(&registered.record)?
            } else {
                let generated = match year {
                    Some(year) => service.generate_identifier_for_year(&draft, year, &cancel).await?,
                    None => service.generate_identifier(&draft, &cancel).await?,
                };
                serde_json::to_string_pretty(&generated)?
            };
            println!("{}", output);
        }
        Command::Validate { identifier } => {
            let parsed = fid_common::FacilityIdentifier::parse(&identifier)?;
            println!(
                "industry={} region={} year={} sequence={}",
                parsed.industry_code(),
                parsed.region_code(),
                parsed.year(),
                parsed.sequence()
            );
        }
        Command::Reconcile {
            industry,
            region,
            year,
        } => {
            let key = SequencePartitionKey::new(industry, region, year)?;
            let counter = reconcile_partition(&store, &repository, &key).await?;
            println!("{} last_sequence = {}", key, counter);
        }
        Command::Pending => {
            for record in repository.pending_confirmation().await? {
                println!(
                    "{}\t{:.2}\t{}",
                    record.identifier,
                    record.overall_confidence,
                    record.name.as_deref().unwrap_or("-")
                );
            }
        }
        Command::Counters => {
            for counter in store.list_counters().await? {
                println!(
                    "{}-{}-{:04}\t{}",
                    counter.industry_code, counter.region_code, counter.year, counter.last_sequence
                );
            }
        }
    }

    Ok(())
}
