use anyhow::{Context as AnyhowContext, Result};
use clap::{Args, Parser, Subcommand};
use pbxfix_engine::{
    ApplyMode, ApplyOutcome, DuplicateFileRefPolicy, EditSet, Engine, MembershipInsertion,
    ObjectId, RepairConfig, RepairError,
};
use pbxfix_protocol::{
    review_edit_schema, serialize_json, ErrorEnvelope, FindingRecord, ReviewDocument,
    REVIEW_SCHEMA_VERSION,
};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

mod report;

const PROJECT_FILE: &str = "project.pbxproj";

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

#[derive(Parser)]
#[command(name = "pbxfix")]
#[command(about = "Repair duplicate and missing build-file entries in Xcode projects", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Repair policy file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON on stdout (errors become an error envelope)
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Report duplicate and dangling entries
    Check(ProjectArgs),

    /// Remove duplicate build files and list entries
    Clean {
        #[command(flatten)]
        project: ProjectArgs,

        #[command(flatten)]
        apply: ApplyArgs,

        /// Also remove the lines of duplicate file references
        #[arg(long)]
        remove_duplicate_file_refs: bool,
    },

    /// Add unlinked source files to a build phase
    Link {
        #[command(flatten)]
        project: ProjectArgs,

        #[command(flatten)]
        phase: PhaseArgs,

        #[command(flatten)]
        apply: ApplyArgs,

        /// Insert new entries at the top of the files list
        #[arg(long)]
        prepend: bool,
    },

    /// Clean, then link into one phase, as a single edit
    Repair {
        #[command(flatten)]
        project: ProjectArgs,

        #[command(flatten)]
        phase: PhaseArgs,

        #[command(flatten)]
        apply: ApplyArgs,
    },

    /// List build phases with their entry counts
    Phases(ProjectArgs),

    /// Print the JSON Schema of a review edit
    Schema,
}

#[derive(Args)]
struct ProjectArgs {
    /// Path to project.pbxproj or its .xcodeproj directory
    project: PathBuf,
}

#[derive(Args)]
struct PhaseArgs {
    /// Identifier of the target build phase (24 hex digits)
    #[arg(long)]
    phase: String,
}

#[derive(Args)]
struct ApplyArgs {
    /// Print the planned edits instead of rewriting the file
    #[arg(long)]
    dry_run: bool,
}

impl ApplyArgs {
    const fn mode(&self) -> ApplyMode {
        if self.dry_run {
            ApplyMode::Report
        } else {
            ApplyMode::InPlace
        }
    }
}

pub fn main_entry() -> Result<()> {
    let mut cli = Cli::parse();
    if cli.json {
        cli.quiet = true;
    }

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let json = cli.json;
    match run(cli) {
        Ok(()) => Ok(()),
        Err(err) if json => {
            print_stdout(&serialize_json(&error_envelope(&err))?)?;
            std::process::exit(1);
        }
        Err(err) => Err(err),
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Check(args) => {
            let path = resolve_project(&args.project)?;
            let engine = Engine::new(config)?;
            let findings = engine.find_violations(&path)?;
            if json {
                let records: Vec<FindingRecord> =
                    findings.iter().map(|finding| finding.to_record()).collect();
                print_stdout(&serialize_json(&records)?)?;
            } else {
                print_stdout(report::render_findings(&display(&path), &findings).trim_end())?;
            }
        }
        Commands::Clean {
            project,
            apply,
            remove_duplicate_file_refs,
        } => {
            if remove_duplicate_file_refs {
                config.duplicate_file_refs = DuplicateFileRefPolicy::Remove;
            }
            let path = resolve_project(&project.project)?;
            let engine = Engine::new(config)?;
            let edits = engine.plan_removals(&path)?;
            if !json {
                print_plan(&edits)?;
            }
            let outcome = engine.apply_edits(&path, &edits, apply.mode())?;
            emit_outcome(&path, &outcome, json)?;
        }
        Commands::Link {
            project,
            phase,
            apply,
            prepend,
        } => {
            if prepend {
                config.membership_insertion = MembershipInsertion::AfterOpening;
            }
            let phase_id = ObjectId::parse(&phase.phase)?;
            let path = resolve_project(&project.project)?;
            let engine = Engine::new(config)?;
            let store = Engine::load(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let fill = engine.additions_in(&store, &phase_id)?;
            if !json {
                print_stdout(report::render_linked(&fill.linked).trim_end())?;
            }
            let outcome = engine.apply_edits(&path, &fill.edits, apply.mode())?;
            emit_outcome(&path, &outcome, json)?;
        }
        Commands::Repair {
            project,
            phase,
            apply,
        } => {
            let path = resolve_project(&project.project)?;
            let engine = Engine::new(config)?;
            let edits = engine.plan_repair(&path, &phase.phase)?;
            if !json {
                print_plan(&edits)?;
            }
            let outcome = engine.apply_edits(&path, &edits, apply.mode())?;
            emit_outcome(&path, &outcome, json)?;
        }
        Commands::Phases(args) => {
            let path = resolve_project(&args.project)?;
            let phases = Engine::new(config)?.phases(&path)?;
            if json {
                print_stdout(&serialize_json(&phases)?)?;
            } else {
                print_stdout(report::render_phases(&phases).trim_end())?;
            }
        }
        Commands::Schema => {
            print_stdout(&review_edit_schema()?)?;
        }
    }

    Ok(())
}

fn print_plan(edits: &EditSet) -> Result<()> {
    let plan = report::render_plan(edits);
    if plan.is_empty() {
        return Ok(());
    }
    print_stdout(plan.trim_end())
}

fn emit_outcome(path: &Path, outcome: &ApplyOutcome, json: bool) -> Result<()> {
    if json {
        let document = ReviewDocument {
            schema_version: REVIEW_SCHEMA_VERSION,
            summary: outcome.summary(),
            edits: outcome.edits.clone(),
        };
        return print_stdout(&serialize_json(&document)?);
    }
    print_stdout(report::render_outcome(&display(path), outcome).trim_end())
}

fn load_config(path: Option<&Path>) -> Result<RepairConfig> {
    let Some(path) = path else {
        return Ok(RepairConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: RepairConfig = toml::from_str(&raw)
        .with_context(|| format!("Failed to parse config {}", path.display()))?;
    log::debug!("Loaded repair config from {}", path.display());
    Ok(config)
}

/// A `.xcodeproj` bundle resolves to the project file inside it
fn resolve_project(path: &Path) -> Result<PathBuf> {
    let resolved = if path.is_dir() {
        path.join(PROJECT_FILE)
    } else {
        path.to_path_buf()
    };
    if !resolved.is_file() {
        anyhow::bail!("Project file not found: {}", resolved.display());
    }
    Ok(resolved)
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

#[derive(Serialize)]
struct DriftDetails {
    line: usize,
    expected: String,
    found: String,
}

fn error_envelope(err: &anyhow::Error) -> ErrorEnvelope {
    let message = format!("{err:#}");
    let Some(repair) = err.downcast_ref::<RepairError>() else {
        return ErrorEnvelope {
            code: "internal".to_string(),
            message,
            details: None,
            hint: None,
        };
    };

    let (details, hint) = match repair {
        RepairError::MissingPhase { .. } => (
            None,
            Some("Run `pbxfix phases <project>` to list phase identifiers".to_string()),
        ),
        RepairError::Drift {
            line,
            expected,
            found,
        } => (
            serde_json::to_value(DriftDetails {
                line: *line,
                expected: expected.clone(),
                found: found.clone(),
            })
            .ok(),
            Some("The file changed while planning; run the command again".to_string()),
        ),
        RepairError::InvalidIdentifier(_) => (
            None,
            Some("Identifiers are 24 uppercase hex digits".to_string()),
        ),
        _ => (None, None),
    };

    ErrorEnvelope {
        code: repair.code().to_string(),
        message,
        details,
        hint,
    }
}
