//! dossier - investigative report pipeline runner.
//!
//! Wires the coordination core together for one case: the signal bus,
//! the evidence locker, the controller, and the gateway. Evidence files
//! are ingested from a directory, classified, and driven through every
//! section of the report.
//!
//! # Usage
//!
//! ```text
//! dossier run --case 2026-0142 --evidence ./evidence/
//! dossier manifest --case 2026-0142
//! dossier contracts
//! ```
//!
//! Durable state lives under `--data-dir` (default `.dossier/`), one
//! subdirectory per case.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::DossierConfig;
use dossier_bus::SignalBus;
use dossier_control::Controller;
use dossier_gateway::{EchoRenderer, Gateway, RunOutcome};
use dossier_locker::{EvidenceLocker, LockerError, ManifestStore, RuleTable};
use dossier_types::CaseId;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// dossier - investigative report pipeline runner.
#[derive(Parser, Debug)]
#[command(name = "dossier")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the config TOML (gateway tunables, section contracts).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding per-case durable state.
    #[arg(long, default_value = ".dossier")]
    data_dir: PathBuf,

    /// Enable debug logging (also: RUST_LOG).
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest an evidence directory and drive every section to
    /// completion.
    Run {
        /// Case identifier (e.g., a case number).
        #[arg(long)]
        case: String,

        /// Directory of evidence files to ingest.
        #[arg(long)]
        evidence: PathBuf,

        /// Leave drafts awaiting approval instead of auto-approving.
        #[arg(long)]
        manual_approval: bool,
    },

    /// Print the stored evidence manifest for a case.
    Manifest {
        /// Case identifier.
        #[arg(long)]
        case: String,
    },

    /// Validate and list the section contracts.
    Contracts,
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let config = DossierConfig::load(args.config.as_deref())?;

    match args.command {
        Command::Run {
            case,
            evidence,
            manual_approval,
        } => run_pipeline(&args.data_dir, config, &case, &evidence, manual_approval).await,
        Command::Manifest { case } => show_manifest(&args.data_dir, &case),
        Command::Contracts => {
            list_contracts(&config)?;
            Ok(())
        }
    }
}

fn parse_case(case: &str) -> Result<CaseId> {
    CaseId::new(case).context("case id cannot be empty")
}

async fn run_pipeline(
    data_dir: &Path,
    config: DossierConfig,
    case: &str,
    evidence_dir: &Path,
    manual_approval: bool,
) -> Result<()> {
    let case_id = parse_case(case)?;

    let bus = Arc::new(SignalBus::new());
    let store = ManifestStore::new(data_dir.join(case))?;
    let locker = Arc::new(EvidenceLocker::open(
        Arc::clone(&bus),
        store,
        RuleTable::builtin(),
        case_id.clone(),
    )?);
    locker.register_handlers();

    let contracts = config.contract_set()?;
    let controller = Arc::new(Controller::new(Arc::clone(&bus), contracts));
    controller.register_case(case_id.clone());

    let mut gateway_config = config.gateway;
    gateway_config.auto_approve = !manual_approval;
    let gateway = Arc::new(Gateway::new(
        Arc::clone(&bus),
        Arc::clone(&controller),
        Arc::new(EchoRenderer::new()),
        gateway_config,
    ));
    gateway.register_handlers();

    // Ingest and classify, in name order for reproducible runs.
    let mut paths: Vec<PathBuf> = std::fs::read_dir(evidence_dir)
        .with_context(|| format!("reading evidence dir {}", evidence_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    let mut manual_review = 0usize;
    for path in &paths {
        let item = match locker.ingest(path) {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping file");
                continue;
            }
        };
        match locker.classify(&item.evidence_id) {
            Ok(classification) => tracing::info!(
                path = %path.display(),
                section = %classification.assigned_section,
                confidence = classification.confidence,
                "classified"
            ),
            Err(LockerError::ClassificationFailure { .. }) => {
                manual_review += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    let outcomes = gateway.run_ready_sections(&case_id).await?;
    gateway.process_revisions(&case_id).await;
    let stalls = gateway.check_stalls();

    // Summary.
    println!("case {case}");
    println!(
        "  evidence: {} item(s), manifest v{}, {} flagged for manual review",
        locker.evidence_count(),
        locker.manifest_version(),
        manual_review
    );
    for contract in controller.contracts().iter() {
        let status = controller.section_status(&contract.section_id, &case_id)?;
        println!(
            "  {:<12} {:<20} {}",
            contract.section_id.to_string(),
            status.to_string(),
            contract.title
        );
    }
    let completed = outcomes
        .iter()
        .filter(|o| matches!(o, RunOutcome::Completed { .. }))
        .count();
    println!("  sections completed this run: {completed}");
    if stalls > 0 {
        println!("  stall alerts emitted: {stalls}");
    }
    Ok(())
}

fn show_manifest(data_dir: &Path, case: &str) -> Result<()> {
    parse_case(case)?;
    let store = ManifestStore::new(data_dir.join(case))?;
    let Some(manifest) = store.load()? else {
        println!("no manifest stored for case {case}");
        return Ok(());
    };

    println!(
        "case {} — manifest v{}, {} item(s), updated {}",
        manifest.case_id(),
        manifest.version(),
        manifest.evidence_count(),
        manifest.updated_at().to_rfc3339()
    );
    for item in manifest.items() {
        let section = item
            .classification
            .as_ref()
            .map_or_else(|| "unclassified".to_string(), |c| c.assigned_section.to_string());
        println!(
            "  {} {:<10} {:<12} {}",
            item.evidence_id,
            item.status.to_string(),
            section,
            item.file_ref.display()
        );
    }
    Ok(())
}

fn list_contracts(config: &DossierConfig) -> Result<()> {
    let contracts = config.contract_set()?;
    println!("{} section contract(s)", contracts.len());
    for contract in contracts.iter() {
        let predecessors = if contract.predecessors.is_empty() {
            "-".to_string()
        } else {
            contract
                .predecessors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "  {:<12} after [{}] max_reruns={}  {}",
            contract.section_id.to_string(),
            predecessors,
            contract.max_reruns,
            contract.title
        );
    }
    Ok(())
}
