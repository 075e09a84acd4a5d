//! docx-settings CLI - inspect and edit Word document settings
//!
//! A command-line tool for reading and changing the zoom level, editing
//! protection and related options stored in a .docx settings part.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use docx_settings::{ProtectionKind, SettingsSummary};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Inspect and edit the settings part of Word documents
#[derive(Parser)]
#[command(
    name = "docx-settings",
    author = "iyulab",
    version,
    about = "Inspect and edit Word document settings",
    long_about = "docx-settings - read and change the settings part of .docx files.\n\n\
                  Edits keep every setting the tool does not touch exactly as it was."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the settings of a document
    Show {
        /// Input file path
        input: PathBuf,

        /// Output JSON instead of text
        #[arg(long)]
        json: bool,

        /// Output compact JSON (no indentation)
        #[arg(long, requires = "json")]
        compact: bool,
    },

    /// Set the zoom percentage
    Zoom {
        /// Input file path
        input: PathBuf,

        /// Zoom percentage
        percent: i64,

        /// Output file path (default: overwrite input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Enforce editing protection
    Protect {
        /// Input file path
        input: PathBuf,

        /// Kind of protection
        kind: Protection,

        /// Output file path (default: overwrite input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Turn editing protection off
    Unprotect {
        /// Input file path
        input: PathBuf,

        /// Output file path (default: overwrite input)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show version information
    Version,
}

/// Editing protection kind
#[derive(Clone, Copy, ValueEnum)]
enum Protection {
    /// No restriction (protection marker only)
    None,
    /// No edits allowed
    ReadOnly,
    /// Comments only
    Comments,
    /// Edits are always tracked
    TrackedChanges,
    /// Form fields only
    Forms,
}

impl From<Protection> for ProtectionKind {
    fn from(kind: Protection) -> Self {
        match kind {
            Protection::None => ProtectionKind::None,
            Protection::ReadOnly => ProtectionKind::ReadOnly,
            Protection::Comments => ProtectionKind::Comments,
            Protection::TrackedChanges => ProtectionKind::TrackedChanges,
            Protection::Forms => ProtectionKind::Forms,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Show {
            input,
            json,
            compact,
        } => {
            let summary = docx_settings::read_settings(&input)?;
            if json {
                let text = if compact {
                    serde_json::to_string(&summary)?
                } else {
                    summary.to_json()?
                };
                println!("{}", text);
            } else {
                print_summary(&input, &summary);
            }
        }

        Commands::Zoom {
            input,
            percent,
            output,
        } => {
            let output = output.unwrap_or_else(|| input.clone());
            docx_settings::edit_settings(&input, &output, |settings| {
                settings.set_zoom_percent(percent)
            })?;
            report(&format!("Zoom set to {}%", percent), &output);
        }

        Commands::Protect {
            input,
            kind,
            output,
        } => {
            let kind = ProtectionKind::from(kind);
            let output = output.unwrap_or_else(|| input.clone());
            docx_settings::edit_settings(&input, &output, |settings| {
                settings.set_enforcement_edit_value(kind)
            })?;
            report(&format!("Protection enforced ({})", kind), &output);
        }

        Commands::Unprotect { input, output } => {
            let output = output.unwrap_or_else(|| input.clone());
            docx_settings::edit_settings(&input, &output, |settings| {
                if !settings.is_enforced() {
                    debug!("document was not protected");
                }
                settings.remove_enforcement()
            })?;
            report("Protection removed", &output);
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

fn print_summary(input: &std::path::Path, summary: &SettingsSummary) {
    println!("{}", "Document Settings".cyan().bold());
    println!("{}", "─".repeat(40));
    println!(
        "{}: {}",
        "File".bold(),
        input.file_name().unwrap_or_default().to_string_lossy()
    );

    match summary.zoom_percent {
        Some(percent) => println!("{}: {}%", "Zoom".bold(), percent),
        None => println!("{}: {}", "Zoom".bold(), "default".dimmed()),
    }

    match summary.protection {
        Some(ref protection) => {
            let kind = protection
                .edit
                .map(|kind| kind.to_string())
                .unwrap_or_else(|| "unspecified".to_string());
            let state = if protection.enforced {
                "enforced".green()
            } else {
                "not enforced".yellow()
            };
            println!("{}: {} ({})", "Protection".bold(), kind, state);
        }
        None => println!("{}: {}", "Protection".bold(), "none".dimmed()),
    }

    println!("{}: {}", "Track revisions".bold(), summary.track_revisions);
    println!("{}: {}", "Update fields".bold(), summary.update_fields);
}

fn report(message: &str, output: &std::path::Path) {
    println!("{} {}: {}", "✓".green().bold(), message, output.display());
}

fn print_version() {
    println!("{} {}", "docx-settings".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("Inspect and edit the settings part of Word documents");
    println!();
    println!("Repository: https://github.com/iyulab/docx-settings");
}
