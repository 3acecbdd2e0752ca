//! `tally run`: one reconciliation job from files on disk to a saved report.

use std::path::{Path, PathBuf};

use serde::Serialize;

use tally_config::Settings;
use tally_io::{export_report, import_template, load_source, WorkbookError};
use tally_recon::dates::{month_from_name, month_name};
use tally_recon::{run, Diagnostics, JobInputs, JobParams, RunReport, SourceBook, WeekDescriptor};

use crate::exit_codes::{EXIT_JOB_FAILED, EXIT_PARTIAL};
use crate::{current_year, parse_boundaries, resolve_profile, CliError};

const SOURCE_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods", "csv"];

pub struct RunArgs {
    pub profile: String,
    pub month: String,
    pub first: String,
    pub last: String,
    pub template: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub client: Option<String>,
    pub bank: Option<PathBuf>,
    pub year: Option<i32>,
    pub json: bool,
    pub strict: bool,
    pub inputs: Vec<PathBuf>,
}

/// Job result as printed with `--json`.
#[derive(Debug, Serialize)]
pub struct JobOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_file: Option<String>,
    pub weeks_processed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub weeks: Vec<WeekDescriptor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

impl JobOutcome {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            output_file: None,
            weeks_processed: 0,
            weeks: Vec::new(),
            diagnostics: None,
        }
    }

    fn completed(report: RunReport, output: &Path) -> Self {
        Self {
            success: true,
            message: format!(
                "Processed {} week(s) for {}",
                report.weeks_processed,
                report.weeks.month_name()
            ),
            output_file: Some(output.display().to_string()),
            weeks_processed: report.weeks_processed,
            weeks: report.weeks.weeks,
            diagnostics: Some(report.diagnostics),
        }
    }
}

pub fn cmd_run(args: RunArgs, settings: &Settings) -> Result<(), CliError> {
    let json = args.json;
    let strict = args.strict || settings.strict;
    match execute(args, settings) {
        Ok(outcome) => {
            let partial = outcome.diagnostics.as_ref().is_some_and(Diagnostics::is_partial);
            print_outcome(&outcome, json)?;
            if strict && partial {
                return Err(CliError {
                    code: EXIT_PARTIAL,
                    message: "report written, but some inputs were not reconciled".into(),
                    hint: Some("see unmatched_invoices and sheet_errors in --json output".into()),
                });
            }
            Ok(())
        }
        Err(err) => {
            if json {
                print_outcome(&JobOutcome::failed(err.message.clone()), true)?;
            }
            Err(err)
        }
    }
}

fn execute(args: RunArgs, settings: &Settings) -> Result<JobOutcome, CliError> {
    let profile = resolve_profile(&args.profile)?;
    let boundaries = parse_boundaries(&args.first, &args.last)?;
    let month = month_from_name(&args.month)
        .ok_or_else(|| CliError::usage(format!("unknown month '{}'", args.month)))?;
    let year = args.year.or(settings.working_year).unwrap_or_else(current_year);

    let template = args
        .template
        .or_else(|| settings.default_template.clone())
        .ok_or_else(|| {
            CliError::usage("no template given")
                .with_hint("pass --template or set run.defaultTemplate in settings")
        })?;
    let output = args.output.unwrap_or_else(|| {
        let name = default_output_name(&profile.name, month_name(month), year);
        match &settings.output_dir {
            Some(dir) => dir.join(name),
            None => PathBuf::from(name),
        }
    });
    if output == template {
        return Err(CliError::usage("output would overwrite the template")
            .with_hint("choose a different --output path"));
    }

    let files = expand_inputs(&args.inputs)?;
    if files.is_empty() {
        return Err(CliError::usage("no statement files found in the given inputs")
            .with_hint(format!("accepted extensions: {}", SOURCE_EXTENSIONS.join(", "))));
    }
    tracing::info!(profile = %profile.name, files = files.len(), template = %template.display(), "loading inputs");

    let mut report = import_template(&template).map_err(workbook_err)?;
    let sources = files
        .iter()
        .map(|f| load_source(f))
        .collect::<Result<Vec<SourceBook>, _>>()
        .map_err(workbook_err)?;
    let bank = args
        .bank
        .as_deref()
        .map(load_source)
        .transpose()
        .map_err(workbook_err)?;

    let params = JobParams {
        month: args.month,
        boundaries,
        working_year: year,
        client: args.client,
    };
    let inputs = JobInputs { sources, bank };
    let mut progress = |percent: u8| tracing::info!(percent, "progress");

    let result = run(&profile, &params, &inputs, &mut report, &mut progress).map_err(CliError::recon)?;

    if let Some(dir) = output.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| CliError::job(format!("cannot create {}: {e}", dir.display())))?;
    }
    let stats = export_report(&report, &output).map_err(workbook_err)?;
    tracing::debug!(sheets = stats.sheets, cells = stats.cells, formulas = stats.formulas, "report written");
    progress(100);

    Ok(JobOutcome::completed(result, &output))
}

fn workbook_err(err: WorkbookError) -> CliError {
    match err {
        WorkbookError::Recon(e) => CliError::recon(e),
        other => CliError { code: EXIT_JOB_FAILED, message: other.to_string(), hint: None },
    }
}

fn default_output_name(profile: &str, month: &str, year: i32) -> String {
    format!("{profile}_{month}_{year}_recon.xlsx")
}

fn is_source_file(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') || n.starts_with("~$"));
    let known = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| SOURCE_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)));
    !hidden && known
}

/// Files are taken as given; folders contribute their statement files in name order.
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, CliError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = std::fs::read_dir(input)
                .map_err(|e| CliError::job(format!("cannot read {}: {e}", input.display())))?;
            let mut found = entries
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_source_file(p))
                .collect::<Vec<_>>();
            found.sort();
            tracing::debug!(folder = %input.display(), files = found.len(), "expanded input folder");
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn print_outcome(outcome: &JobOutcome, json: bool) -> Result<(), CliError> {
    if json {
        let out = serde_json::to_string_pretty(outcome).map_err(|e| CliError::io(e.to_string()))?;
        println!("{out}");
        return Ok(());
    }

    if !outcome.success {
        return Ok(());
    }
    eprintln!("{}", outcome.message);
    if let Some(path) = &outcome.output_file {
        eprintln!("  output: {path}");
    }
    let Some(d) = &outcome.diagnostics else {
        return Ok(());
    };
    eprintln!("  {}", d.summary_line());
    if d.opening_spillover != 0.0 || d.closing_spillover != 0.0 {
        eprintln!("  spillover: opening {:.2}, closing {:.2}", d.opening_spillover, d.closing_spillover);
    }
    for u in &d.unmatched_invoices {
        eprintln!("  unmatched: {} ({})", u.file, u.reason);
    }
    for s in &d.sheet_errors {
        eprintln!("  skipped: {}: {}", s.file, s.message);
    }
    for label in &d.missing_labels {
        eprintln!("  label not found: {label}");
    }
    for m in &d.rule_mismatches {
        eprintln!("  rule skipped: {m}");
    }
    Ok(())
}
