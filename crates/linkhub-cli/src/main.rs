//! LinkHub CLI: sandboxed launching, installing and importing of portable software.
//!
//! Every command goes through the same [`linkhub::Bridge`] the dashboard uses,
//! so the whitelist is enforced here exactly as it is over the driver protocol.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes

use clap::{ArgAction, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use linkhub::config::{load_config_file, resolve_data_dir, BridgeConfig};
use linkhub::driver::run_driver;
use linkhub::install::Upload;
use linkhub::platform::{self, PlatformProcessService, RecordingPlatform, SpawnMode};
use linkhub::{
    Bridge, BridgeError, BridgeResult, BrowseResponse, DirKind, InstallationResult, OsActionResponse,
    RecordId, RecordListing, ScanReport, ScanStatus, SetupStatus, WhitelistEntry,
};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod progress;

use progress::Spinner;

/// Color output mode
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and `NO_COLOR` env
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum KindArg {
    Software,
    Workspace,
}

impl From<KindArg> for DirKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Software => Self::Software,
            KindArg::Workspace => Self::Workspace,
        }
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "linkhub",
    version,
    about = "Sandboxed launcher and installer for portable software"
)]
struct Cli {
    /// Directory holding settings.json, catalog.json and index.json
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Static configuration file (.json, .yaml or .yml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Raise log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Control color output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorMode,
    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    json: bool,
    /// Record spawns instead of starting processes
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Launch an executable inside a whitelisted directory
    Launch { path: String },
    /// Open a whitelisted directory in the file browser
    Open { path: String },
    /// List sub-directories (drive roots when no path is given)
    Browse { path: Option<String> },
    /// Install a zip archive into the first software root
    Install {
        archive: PathBuf,
        #[arg(long, help = "Program name (defaults to the archive file name)")]
        name: Option<String>,
    },
    /// Import every sub-directory of the whitelisted roots of one kind
    Scan {
        #[arg(value_enum)]
        kind: KindArg,
    },
    /// Manage the directory whitelist
    Whitelist {
        #[command(subcommand)]
        action: WhitelistCommand,
    },
    /// Show first-run setup status
    Status,
    /// List or remove catalog records
    Records {
        #[command(subcommand)]
        action: RecordsCommand,
    },
    /// Serve NDJSON driver requests
    Driver {
        #[arg(long)]
        stdio: bool,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum WhitelistCommand {
    List,
    /// Replace the whitelist with a JSON array (object or legacy string items)
    Set { entries: String },
    Add {
        path: String,
        #[arg(long, value_enum, default_value = "software")]
        kind: KindArg,
        #[arg(long)]
        label: Option<String>,
    },
    Remove { path: String },
}

#[derive(Debug, Subcommand)]
enum RecordsCommand {
    List,
    /// Forget a record; its files stay on disk
    Remove { id: String },
}

/// The bridge plus, in `--dry-run` mode, the recorder standing in for the OS.
struct Context {
    bridge: Bridge,
    recorder: Option<Arc<RecordingPlatform>>,
    json: bool,
}

impl Context {
    fn open(cli: &Cli) -> BridgeResult<Self> {
        let config = match cli.config.as_deref() {
            Some(path) => load_config_file(path)?,
            None => BridgeConfig::default(),
        };
        let data_dir = resolve_data_dir(cli.data_dir.clone(), &config);
        let recorder = cli.dry_run.then(|| Arc::new(RecordingPlatform::new()));
        let platform: Arc<dyn PlatformProcessService> = match &recorder {
            Some(recorder) => recorder.clone(),
            None => platform::host(),
        };
        tracing::debug!(data_dir = %data_dir.display(), dry_run = cli.dry_run, "opening bridge");
        Ok(Self {
            bridge: Bridge::open(&data_dir, config, platform)?,
            recorder,
            json: cli.json,
        })
    }

    fn report_dry_run(&self) {
        let Some(recorder) = &self.recorder else {
            return;
        };
        for call in recorder.calls() {
            let mode = match call.mode {
                SpawnMode::Detached => "spawn",
                SpawnMode::Elevated => "spawn elevated",
            };
            let mut line = format!("dry-run: would {mode} {}", call.spec.program.display());
            for arg in &call.spec.args {
                line.push(' ');
                line.push_str(arg);
            }
            if let Some(cwd) = &call.spec.cwd {
                line.push_str(&format!(" (in {})", cwd.display()));
            }
            eprintln!("{line}");
        }
    }

    fn emit<T: Serialize>(&self, result: BridgeResult<T>, render: impl FnOnce(&T)) -> Result<()> {
        self.report_dry_run();
        match result {
            Ok(value) => {
                if self.json {
                    let payload = serde_json::to_string(&value).into_diagnostic()?;
                    println!("{payload}");
                } else {
                    render(&value);
                }
                Ok(())
            }
            Err(err) => emit_error(self.json, &err),
        }
    }
}

/// Configure color output based on CLI flag and environment
fn configure_colors(mode: ColorMode) -> bool {
    let use_color = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            // Respect NO_COLOR environment variable
            if std::env::var("NO_COLOR").is_ok() {
                false
            } else {
                supports_color::on(supports_color::Stream::Stderr).is_some()
            }
        }
    };

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(use_color)
                .unicode(use_color)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
    use_color
}

/// Logs go to stderr; stdout is reserved for results and driver responses.
fn init_tracing(verbose: u8, use_color: bool) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(use_color)
        .with_target(false)
        .try_init()
        .ok();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let use_color = configure_colors(cli.color);
    init_tracing(cli.verbose, use_color);

    if let Commands::Completions { shell } = cli.command {
        return cmd_completions(shell);
    }
    let ctx = match Context::open(&cli) {
        Ok(ctx) => ctx,
        Err(err) => return emit_error(cli.json, &err),
    };

    match cli.command {
        Commands::Launch { path } => ctx.emit(ctx.bridge.launch(&path), render_action),
        Commands::Open { path } => ctx.emit(ctx.bridge.open_directory(&path), render_action),
        Commands::Browse { path } => {
            ctx.emit(ctx.bridge.browse_directory(path.as_deref()), render_browse)
        }
        Commands::Install { archive, name } => cmd_install(&ctx, &archive, name),
        Commands::Scan { kind } => cmd_scan(&ctx, kind.into()),
        Commands::Whitelist { action } => cmd_whitelist(&ctx, action),
        Commands::Status => ctx.emit(ctx.bridge.setup_status(), render_status),
        Commands::Records { action } => cmd_records(&ctx, action),
        Commands::Driver { stdio } => cmd_driver(&ctx, stdio),
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

// =============================================================================
// Command Handlers
// =============================================================================

fn cmd_install(ctx: &Context, archive: &Path, name: Option<String>) -> Result<()> {
    let mut upload = Upload::file(archive);
    if let Some(name) = name {
        // Keep the archive's suffix so the format check still applies.
        let filename = match archive.extension() {
            Some(ext) => format!("{name}.{}", ext.to_string_lossy()),
            None => name,
        };
        upload = upload.with_filename(filename);
    }
    let spinner = Spinner::start(!ctx.json, format!("installing {}", upload.filename));
    let result = ctx.bridge.install(upload);
    drop(spinner);
    ctx.emit(result, render_install)
}

fn cmd_scan(ctx: &Context, kind: DirKind) -> Result<()> {
    let spinner = Spinner::start(!ctx.json, format!("scanning {kind} directories"));
    let result = ctx.bridge.scan_directories(kind);
    drop(spinner);
    ctx.emit(result, render_scan)
}

fn cmd_whitelist(ctx: &Context, action: WhitelistCommand) -> Result<()> {
    let result = match action {
        WhitelistCommand::List => ctx.bridge.list_allowed_dirs(),
        WhitelistCommand::Set { entries } => {
            match serde_json::from_str::<Vec<serde_json::Value>>(&entries) {
                Ok(items) => ctx.bridge.set_allowed_dirs(items),
                Err(err) => Err(BridgeError::cli_invalid_arg(format!(
                    "whitelist set expects a JSON array: {err}"
                ))),
            }
        }
        WhitelistCommand::Add { path, kind, label } => {
            let mut entry = WhitelistEntry::new(path.trim(), kind.into());
            if let Some(label) = label {
                entry = entry.with_label(label);
            }
            ctx.bridge.add_allowed_dir(entry)
        }
        WhitelistCommand::Remove { path } => match ctx.bridge.remove_allowed_dir(&path) {
            Ok(true) => ctx.bridge.list_allowed_dirs(),
            Ok(false) => Err(BridgeError::not_found(
                "directory is not in the whitelist",
                serde_json::json!({ "path": path }),
            )),
            Err(err) => Err(err),
        },
    };
    ctx.emit(result, |entries| render_whitelist(entries))
}

fn cmd_records(ctx: &Context, action: RecordsCommand) -> Result<()> {
    match action {
        RecordsCommand::List => ctx.emit(ctx.bridge.records(), render_records),
        RecordsCommand::Remove { id } => {
            let result = id
                .parse::<RecordId>()
                .map_err(|err| BridgeError::cli_invalid_arg(format!("invalid record id: {err}")))
                .and_then(|id| {
                    if ctx.bridge.remove_record(id)? {
                        Ok(serde_json::json!({ "removed": id }))
                    } else {
                        Err(BridgeError::not_found(
                            "no record with this id",
                            serde_json::json!({ "id": id }),
                        ))
                    }
                });
            ctx.emit(result, |_| println!("record removed"))
        }
    }
}

fn cmd_driver(ctx: &Context, stdio: bool) -> Result<()> {
    if !stdio {
        return emit_error(ctx.json, &BridgeError::cli_invalid_arg("driver requires --stdio"));
    }
    match run_driver(&ctx.bridge) {
        Ok(summary) => {
            ctx.report_dry_run();
            tracing::debug!(requests = summary.requests, errors = summary.errors, "driver finished");
            Ok(())
        }
        Err(err) => {
            ctx.report_dry_run();
            emit_error(ctx.json, &err)
        }
    }
}

/// Handle the completions command.
fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

fn emit_error(json: bool, err: &BridgeError) -> Result<()> {
    if json {
        let payload = serde_json::to_string(&err.to_error_info()).into_diagnostic()?;
        println!("{payload}");
    } else {
        eprintln!("error: {err}");
        if let Some(context) = &err.context {
            eprintln!("  {context}");
        }
    }
    std::process::exit(err.exit_code());
}

// =============================================================================
// Human-readable output
// =============================================================================

fn render_action(response: &OsActionResponse) {
    println!("{}: {}", response.message, response.resolved_path);
}

fn render_browse(listing: &BrowseResponse) {
    if !listing.current.is_empty() {
        println!("{}", listing.current);
    }
    for item in &listing.items {
        println!("  {}", item.path);
    }
}

fn render_install(result: &InstallationResult) {
    println!("{}: {}", result.message, result.name);
    println!("  directory:  {}", result.install_directory);
    if !result.executable_path.is_empty() {
        println!("  executable: {}", result.executable_path);
    }
    if !result.description.is_empty() {
        println!("  {}", result.description);
    }
    if result.candidate_executables.len() > 1 {
        println!("  candidates:");
        for candidate in &result.candidate_executables {
            println!("    {candidate}");
        }
    }
    warn_degraded(&result.degraded);
}

fn warn_degraded(notes: &[linkhub::Degradation]) {
    for note in notes {
        let (step, reason) = match note {
            linkhub::Degradation::DescriptionSkipped { reason } => ("description", reason),
            linkhub::Degradation::IndexSkipped { reason } => ("search index", reason),
        };
        eprintln!("warning: {step} skipped: {reason}");
    }
}

fn render_scan(report: &ScanReport) {
    println!("{}", report.message);
    for detail in &report.details {
        let status = match detail.status {
            ScanStatus::Imported => "imported",
            ScanStatus::Skipped => "skipped",
            ScanStatus::Failed => "failed",
        };
        match &detail.reason {
            Some(reason) => println!("  {status:<8} {} ({reason})", detail.name),
            None => println!("  {status:<8} {}", detail.name),
        }
        warn_degraded(&detail.degraded);
    }
}

fn render_whitelist(entries: &[WhitelistEntry]) {
    if entries.is_empty() {
        println!("no allowed directories configured");
    }
    for entry in entries {
        match &entry.label {
            Some(label) => println!("{:<9} {} ({label})", entry.kind.as_str(), entry.path.display()),
            None => println!("{:<9} {}", entry.kind.as_str(), entry.path.display()),
        }
    }
}

fn render_status(status: &SetupStatus) {
    println!("needs setup:            {}", yes_no(status.needs_setup));
    println!("description configured: {}", yes_no(status.description_configured));
    render_whitelist(&status.allowed_dirs);
}

fn render_records(listing: &RecordListing) {
    for record in &listing.software {
        println!("software  {}  {}  {}", record.id, record.name, record.executable_path);
    }
    for record in &listing.workspaces {
        println!("workspace {}  {}  {}", record.id, record.name, record.directory_path);
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
