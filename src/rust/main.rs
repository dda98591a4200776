use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ppidb::config::StoreConfig;
use ppidb::consensus::Verdict;
use ppidb::entity::Entity;
use ppidb::types::{Accession, Kind, PpiKey, ProteinKey};
use ppidb::Database;
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ppidb")]
#[command(about = "Attribute-sharded protein interaction store with evidence consensus")]
#[command(version)]
struct Cli {
    /// Store root (one directory per entity kind)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// TOML configuration file; --root and --workers override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backup root (defaults to <root>.backup)
    #[arg(long, global = true)]
    backup_root: Option<PathBuf>,

    /// Width of the bulk loader pool
    #[arg(short, long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the consensus verdict of every stored PPI as CSV
    Consensus {
        /// Output CSV file path (optional - will output to stdout if not provided)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Leave out pairs whose evidence is undetermined
        #[arg(long, default_value = "false")]
        skip_undetermined: bool,
    },
    /// Copy every shard of every entity into the backup root
    Backup,
    /// Restore one entity from the backup root
    Restore {
        /// Entity kind
        #[arg(short, long)]
        kind: KindArg,

        /// Entity key: md5 or sequence for proteins, <md5>=<md5> for PPIs,
        /// accession for interactors
        #[arg(long)]
        key: String,
    },
    /// Print entity counts per kind
    Stats,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Protein,
    Ppi,
    Interactor,
}

impl From<KindArg> for Kind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Protein => Kind::Protein,
            KindArg::Ppi => Kind::Ppi,
            KindArg::Interactor => Kind::Interactor,
        }
    }
}

#[derive(Serialize)]
struct ConsensusRow<'a> {
    key: String,
    p1: &'a str,
    p2: &'a str,
    p1_uniprot: Option<&'a str>,
    p2_uniprot: Option<&'a str>,
    verdict: &'static str,
}

fn load_config(cli: &Cli) -> Result<StoreConfig> {
    let mut config = match (&cli.config, &cli.root) {
        (Some(path), _) => StoreConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        (None, Some(root)) => StoreConfig::new(root),
        (None, None) => bail!("either --root or --config is required"),
    };
    if let Some(root) = &cli.root {
        config.root = root.clone();
    }
    if let Some(backup_root) = &cli.backup_root {
        config.backup_root = Some(backup_root.clone());
    }
    if let Some(workers) = cli.workers {
        config.loader.workers = workers;
    }
    config.validate()?;
    Ok(config)
}

fn write_consensus<W: Write>(db: &Database, writer: W, skip_undetermined: bool) -> Result<usize> {
    let mut writer = csv::Writer::from_writer(writer);
    let mut written = 0;
    let ppis = db.loader().ppis(&db.ppis, db.cache().clone(), Vec::new())?;
    for resolved in ppis.skip_failures() {
        let verdict = match resolved.verdict() {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!(key = %resolved.ppi.key(), error = %e, "skipping pair with inconsistent evidence");
                continue;
            }
        };
        if skip_undetermined && verdict == Verdict::Undetermined {
            continue;
        }
        writer.serialize(ConsensusRow {
            key: resolved.ppi.key().to_string(),
            p1: resolved.ppi.p1().as_str(),
            p2: resolved.ppi.p2().as_str(),
            p1_uniprot: resolved.p1.uniprot_id.as_deref(),
            p2_uniprot: resolved.p2.uniprot_id.as_deref(),
            verdict: verdict.label(),
        })?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

fn restore(db: &Database, kind: Kind, key: &str) -> Result<()> {
    match kind {
        Kind::Protein => {
            db.proteins.restore_stored(&ProteinKey::from_stem_or_sequence(key)?)?;
        }
        Kind::Ppi => {
            db.ppis.restore_stored(&key.parse::<PpiKey>()?)?;
        }
        Kind::Interactor => {
            let accession = Accession::new(key)?;
            let mut interactor = db.interactors.open_or_new(&accession)?;
            db.interactors.restore(&mut interactor)?;
            db.interactors.save(&interactor)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    let db = Database::open(config)?;

    match cli.command {
        Commands::Consensus { output, skip_undetermined } => {
            let written = if let Some(output_path) = output {
                eprintln!("Writing verdicts to: {}", output_path.display());
                let file = std::fs::File::create(&output_path)
                    .with_context(|| format!("creating {}", output_path.display()))?;
                write_consensus(&db, file, skip_undetermined)?
            } else {
                write_consensus(&db, std::io::stdout(), skip_undetermined)?
            };
            eprintln!("Wrote {} verdicts", written);
        }
        Commands::Backup => {
            for (kind, report) in db.backup()? {
                println!("{}\t{} entities\t{} shards", kind, report.entities, report.shards);
            }
            println!("Backup saved to: {}", db.config().effective_backup_root().display());
        }
        Commands::Restore { kind, key } => {
            let kind = Kind::from(kind);
            restore(&db, kind, &key)?;
            println!("Restored {} {}", kind, key);
        }
        Commands::Stats => {
            for (kind, count) in db.counts()? {
                println!("{}\t{}", kind, count);
            }
            let metrics = db.metrics();
            println!("shard reads\t{}", metrics.shard_reads);
        }
    }

    Ok(())
}
