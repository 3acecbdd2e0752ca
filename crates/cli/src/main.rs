//! `tally`: weekly payout reconciliation from the command line.

mod exit_codes;
mod job;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use tally_config::Settings;
use tally_recon::profiles;
use tally_recon::weeks::parse_day_pair;
use tally_recon::{build_week_structure, Profile, ReconError, WeekBoundaries};

use exit_codes::*;

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Weekly payout reconciliation for food-delivery and payment platforms")]
#[command(version)]
struct Cli {
    /// Log at debug level (overrides TALLY_LOG)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Settings file to use instead of the per-user one
    #[arg(long, global = true, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile one month of statements into a copy of the template
    #[command(after_help = "\
Examples:
  tally run --profile zomato --month October --first 27-2 --last 26-31 \\
      --template recon.xlsx --bank bank.xlsx invoices/
  tally run --profile paytm --month March --first 1-7 --last 29-31 \\
      --template paytm.xlsx --output march.xlsx settlement.csv --json")]
    Run {
        /// Built-in profile name or path to a profile TOML
        #[arg(long, short = 'p')]
        profile: String,

        /// Target month name ("October" or "Oct")
        #[arg(long, short = 'm')]
        month: String,

        /// First week as START-END days; START > END begins in the previous month
        #[arg(long)]
        first: String,

        /// Last week as START-END days; END < START ends in the next month
        #[arg(long)]
        last: String,

        /// Report template workbook (default: settings run.defaultTemplate)
        #[arg(long, short = 't')]
        template: Option<PathBuf>,

        /// Output workbook (default: {profile}_{month}_{year}_recon.xlsx)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Client name written to the summary sheet
        #[arg(long)]
        client: Option<String>,

        /// Bank statement used to map actual receipts
        #[arg(long)]
        bank: Option<PathBuf>,

        /// Working year (default: settings run.workingYear, then the current year)
        #[arg(long)]
        year: Option<i32>,

        /// Print the outcome as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Exit 5 when invoices go unmatched or source sheets fail
        #[arg(long)]
        strict: bool,

        /// Statement files or folders holding them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },

    /// Show the week partition for a month
    #[command(after_help = "\
Examples:
  tally weeks --month October --first 27-2 --last 26-31
  tally weeks --month December --first 1-7 --last 29-4 --year 2025 --json")]
    Weeks {
        #[arg(long, short = 'm')]
        month: String,

        #[arg(long)]
        first: String,

        #[arg(long)]
        last: String,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        json: bool,
    },

    /// List built-in profiles
    Profiles {
        #[arg(long)]
        json: bool,
    },

    /// Check a profile TOML without running
    #[command(after_help = "\
Examples:
  tally validate my-zomato.toml")]
    Validate {
        /// Path to the profile TOML
        profile: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    };

    let result = match cli.command {
        Commands::Run {
            profile,
            month,
            first,
            last,
            template,
            output,
            client,
            bank,
            year,
            json,
            strict,
            inputs,
        } => job::cmd_run(
            job::RunArgs {
                profile,
                month,
                first,
                last,
                template,
                output,
                client,
                bank,
                year,
                json,
                strict,
                inputs,
            },
            &settings,
        ),
        Commands::Weeks { month, first, last, year, json } => {
            cmd_weeks(&month, &first, &last, year.or(settings.working_year), json)
        }
        Commands::Profiles { json } => cmd_profiles(json),
        Commands::Validate { profile } => cmd_validate(&profile),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("TALLY_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(filter),
        )
        .init();
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn usage(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn job(msg: impl Into<String>) -> Self {
        Self { code: EXIT_JOB_FAILED, message: msg.into(), hint: None }
    }

    pub fn profile(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INVALID_PROFILE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_ERROR, message: msg.into(), hint: None }
    }

    /// Map an engine error to its exit code.
    pub fn recon(err: ReconError) -> Self {
        match &err {
            ReconError::InvalidWeekBoundary(_) => Self::usage(err.to_string())
                .with_hint("boundaries are START-END days, e.g. --first 27-2 --last 26-31"),
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
                Self::profile(err.to_string())
            }
            ReconError::UnknownProfile(_) => Self::profile(err.to_string())
                .with_hint("run `tally profiles` to list built-in profiles, or pass a .toml path"),
            ReconError::MissingTemplateSheet(_) => Self::job(err.to_string())
                .with_hint("check that --template is the report workbook for this profile"),
            _ => Self::job(err.to_string()),
        }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Built-in name, or a path when the argument names an existing file or ends in `.toml`.
pub fn resolve_profile(arg: &str) -> Result<Profile, CliError> {
    let path = Path::new(arg);
    if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("toml")) || path.is_file() {
        return load_profile_file(path);
    }
    profiles::builtin(arg).map_err(CliError::recon)
}

fn load_profile_file(path: &Path) -> Result<Profile, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::profile(format!("cannot read profile {}: {e}", path.display())))?;
    Profile::from_toml(&text).map_err(|e| CliError::profile(format!("{}: {e}", path.display())))
}

pub fn parse_boundaries(first: &str, last: &str) -> Result<WeekBoundaries, CliError> {
    let first = parse_day_pair(first).map_err(CliError::recon)?;
    let last = parse_day_pair(last).map_err(CliError::recon)?;
    Ok(WeekBoundaries::new(first, last))
}

pub fn current_year() -> i32 {
    use chrono::Datelike;
    chrono::Local::now().year()
}

// ============================================================================
// weeks
// ============================================================================

fn cmd_weeks(month: &str, first: &str, last: &str, year: Option<i32>, json: bool) -> Result<(), CliError> {
    let bounds = parse_boundaries(first, last)?;
    let structure =
        build_week_structure(month, bounds, year.unwrap_or_else(current_year)).map_err(CliError::recon)?;

    if json {
        let out = serde_json::to_string_pretty(&structure).map_err(|e| CliError::io(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    println!("{} {}", structure.month_name(), structure.year);
    for w in &structure.weeks {
        let flag = if w.is_opening_spillover {
            "  (opening spillover)"
        } else if w.is_closing_spillover {
            "  (closing spillover)"
        } else {
            ""
        };
        println!(
            "  Week {}  {} .. {}  {:<16} {} day(s){}",
            w.week_number,
            w.start_date.format("%d/%m/%Y"),
            w.end_date.format("%d/%m/%Y"),
            w.label,
            w.days(),
            flag
        );
    }
    Ok(())
}

// ============================================================================
// profiles
// ============================================================================

#[derive(serde::Serialize)]
struct ProfileEntry {
    name: String,
    description: String,
    input: String,
    flow: String,
}

fn cmd_profiles(json: bool) -> Result<(), CliError> {
    let mut entries = Vec::new();
    for name in profiles::names() {
        let p = profiles::builtin(name).map_err(CliError::recon)?;
        entries.push(ProfileEntry {
            name: p.name.clone(),
            description: p.description.clone(),
            input: format!("{:?}", p.input).to_lowercase(),
            flow: format!("{:?}", p.flow).to_lowercase(),
        });
    }

    if json {
        let out = serde_json::to_string_pretty(&entries).map_err(|e| CliError::io(e.to_string()))?;
        println!("{out}");
    } else {
        for e in &entries {
            println!("{:<22} {}", e.name, e.description);
        }
    }
    Ok(())
}

// ============================================================================
// validate
// ============================================================================

fn cmd_validate(path: &Path) -> Result<(), CliError> {
    let profile = load_profile_file(path)?;
    eprintln!(
        "valid: profile '{}' ({} flow) with {} source(s), {} rule(s)",
        profile.name,
        format!("{:?}", profile.flow).to_lowercase(),
        profile.sources.len(),
        profile.report.rules.len(),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_accept_dash_pairs() {
        let b = parse_boundaries("27-2", "26-31").unwrap();
        assert_eq!(b, WeekBoundaries::new((27, 2), (26, 31)));
    }

    #[test]
    fn bad_boundaries_are_usage_errors() {
        let err = parse_boundaries("27", "26-31").unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
        assert!(err.hint.is_some());
    }

    #[test]
    fn builtin_and_unknown_profiles() {
        assert_eq!(resolve_profile("swiggy").unwrap().name, "swiggy");
        let err = resolve_profile("ubereats").unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_PROFILE);
        assert!(err.hint.unwrap().contains("tally profiles"));
    }

    #[test]
    fn missing_profile_file_is_a_profile_error() {
        let err = resolve_profile("/nonexistent/custom.toml").unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_PROFILE);
    }

    #[test]
    fn template_sheet_errors_fail_the_job() {
        let err = CliError::recon(ReconError::MissingTemplateSheet("Cashflow".into()));
        assert_eq!(err.code, EXIT_JOB_FAILED);
    }
}
