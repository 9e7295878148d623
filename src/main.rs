// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Haavi - ZAP Scan Orchestrator CLI
 * Drives containerized OWASP ZAP scans from a declarative configuration
 * and turns the raw alerts into a scored, severity-graded report.
 *
 * (c) 2026 Bountyy Oy
 */

use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{Local, Utc};
use clap::{Parser, ValueEnum};
use tracing::{error, info, warn, Level};

use haavi_scanner::auth::AuthDirective;
use haavi_scanner::automation::{load_preset, AutomationPlan};
use haavi_scanner::collector::collect_findings;
use haavi_scanner::config::{RawScanRequest, ScanConfig};
use haavi_scanner::errors::ScannerError;
use haavi_scanner::orchestrator::{report_basename, EngineLauncher, EngineRunSpec, RunOutcome};
use haavi_scanner::report::render_markdown;
use haavi_scanner::types::{AuthMode, RunStatus, ScanReport, ScanType};

/// Haavi - ZAP-driven web application security scan orchestrator
#[derive(Parser)]
#[command(name = "haavi")]
#[command(author = "Bountyy Oy <info@bountyy.fi>")]
#[command(version = "1.0.0")]
#[command(about = "Containerized ZAP scans with scored reports. Declarative, supervised, Rust.", long_about = None)]
struct Cli {
    /// Type of scan to perform
    #[arg(value_enum)]
    scan_type: ScanTypeArg,

    /// Target URL to scan
    target_url: String,

    /// Username for authentication
    #[arg(long, help_heading = "Authentication")]
    username: Option<String>,

    /// Password for authentication
    #[arg(long, help_heading = "Authentication")]
    password: Option<String>,

    /// Authentication type
    #[arg(long, value_enum, default_value = "none", help_heading = "Authentication")]
    auth_type: AuthModeArg,

    /// Login endpoint URL (form/json auth)
    #[arg(long, help_heading = "Authentication")]
    login_url: Option<String>,

    /// Username field name
    #[arg(long, help_heading = "Authentication")]
    username_field: Option<String>,

    /// Password field name
    #[arg(long, help_heading = "Authentication")]
    password_field: Option<String>,

    /// Regex to detect the logged-in state
    #[arg(long, help_heading = "Authentication")]
    logged_in_indicator: Option<String>,

    /// Regex to detect the logged-out state
    #[arg(long, help_heading = "Authentication")]
    logged_out_indicator: Option<String>,

    /// Bearer token (JWT, API key, ...)
    #[arg(long, help_heading = "Authentication")]
    auth_token: Option<String>,

    /// Header name for token authentication
    #[arg(long, help_heading = "Authentication")]
    auth_header: Option<String>,

    /// Token prefix; use 'none' for no prefix
    #[arg(long, help_heading = "Authentication")]
    token_prefix: Option<String>,

    /// Enable the AJAX spider for JavaScript-heavy sites
    #[arg(long, help_heading = "Scan options")]
    ajax_spider: bool,

    /// Spider duration limit in minutes
    #[arg(long, help_heading = "Scan options")]
    spider_duration: Option<u32>,

    /// Maximum scan duration in minutes
    #[arg(long, help_heading = "Scan options")]
    max_duration: Option<u32>,

    /// Maximum crawl depth
    #[arg(long, help_heading = "Scan options")]
    max_depth: Option<u32>,

    /// Maximum children per node
    #[arg(long, help_heading = "Scan options")]
    max_children: Option<u32>,

    /// Active-scan threads per host
    #[arg(long, help_heading = "Scan options")]
    thread_per_host: Option<u32>,

    /// Hosts scanned in parallel
    #[arg(long, help_heading = "Scan options")]
    hosts_per_scan: Option<u32>,

    /// Engine addon to install (repeatable)
    #[arg(long = "addon", help_heading = "Scan options")]
    addons: Vec<String>,

    /// Scan preset file (automation scan type only)
    #[arg(long, help_heading = "Scan options")]
    config_file: Option<PathBuf>,

    /// Docker network name (auto-detected when omitted)
    #[arg(long = "network", help_heading = "Scan options")]
    network_name: Option<String>,

    /// Engine container image
    #[arg(long, help_heading = "Scan options")]
    image: Option<String>,

    /// Directory to save reports
    #[arg(long, help_heading = "Scan options")]
    report_dir: Option<PathBuf>,

    /// Locale for the engine and reports
    #[arg(long, help_heading = "Scan options")]
    language: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Quiet mode - only show errors
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum ScanTypeArg {
    Baseline,
    Full,
    Api,
    Automation,
}

impl From<ScanTypeArg> for ScanType {
    fn from(arg: ScanTypeArg) -> Self {
        match arg {
            ScanTypeArg::Baseline => ScanType::Baseline,
            ScanTypeArg::Full => ScanType::Full,
            ScanTypeArg::Api => ScanType::Api,
            ScanTypeArg::Automation => ScanType::Automation,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum AuthModeArg {
    None,
    Form,
    Json,
    Basic,
    Bearer,
}

impl From<AuthModeArg> for AuthMode {
    fn from(arg: AuthModeArg) -> Self {
        match arg {
            AuthModeArg::None => AuthMode::None,
            AuthModeArg::Form => AuthMode::Form,
            AuthModeArg::Json => AuthMode::Json,
            AuthModeArg::Basic => AuthMode::Basic,
            AuthModeArg::Bearer => AuthMode::Bearer,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(num_cpus::get())
        .thread_name("haavi-orchestrator")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(cli))
}

fn print_banner() {
    println!();
    println!("    __  _____    ___ _    ______");
    println!("   / / / /   |  /   | |  / /  _/");
    println!("  / /_/ / /| | / /| | | / // /  ");
    println!(" / __  / ___ |/ ___ | |/ // /   ");
    println!("/_/ /_/_/  |_/_/  |_|___/___/   ");
    println!();
    println!("      ZAP Scan Orchestrator v1.0.0 - (c) 2026 Bountyy Oy");
    println!();
}

async fn async_main(cli: Cli) -> Result<()> {
    print_banner();

    let request = RawScanRequest {
        scan_type: cli.scan_type.into(),
        target_url: cli.target_url,
        auth_mode: cli.auth_type.into(),
        username: cli.username,
        password: cli.password,
        auth_token: cli.auth_token,
        auth_header: cli.auth_header,
        token_prefix: cli.token_prefix,
        login_url: cli.login_url,
        username_field: cli.username_field,
        password_field: cli.password_field,
        logged_in_indicator: cli.logged_in_indicator,
        logged_out_indicator: cli.logged_out_indicator,
        ajax_spider: cli.ajax_spider,
        spider_duration: cli.spider_duration,
        max_duration: cli.max_duration,
        max_depth: cli.max_depth,
        max_children: cli.max_children,
        thread_per_host: cli.thread_per_host,
        hosts_per_scan: cli.hosts_per_scan,
        network_name: cli.network_name,
        addons: cli.addons,
        language: cli.language,
        config_file: cli.config_file,
        report_dir: cli.report_dir,
        image: cli.image,
    };

    let config = match request.validate() {
        Ok(config) => config,
        Err(e) => fail(e, 1),
    };

    info!("[Config] Scan type: {}", config.scan_type);
    info!("[Config] Target URL: {}", config.target_url);
    info!("[Config] Authentication: {}", config.auth_mode);
    info!("[Config] AJAX spider: {}", config.ajax_spider);
    info!("[Config] Max duration: {} minutes", config.max_duration);

    let directive = match AuthDirective::resolve(&config) {
        Ok(directive) => directive,
        Err(e) => fail(e, 1),
    };

    match run_scan(&config, &directive).await {
        Ok(report) => {
            print_summary(&report);
            Ok(())
        }
        Err(e) => match e {
            ScannerError::Launch { .. } => fail(e, 2),
            ScannerError::Collection { .. } => fail(e, 3),
            other => fail(other, 1),
        },
    }
}

async fn run_scan(config: &ScanConfig, directive: &AuthDirective) -> Result<ScanReport, ScannerError> {
    // Work dirs: reports are engine-writable, the config mount is read-only
    // and lives beside the report dir, never inside it.
    fs::create_dir_all(&config.report_dir)?;
    let report_dir = fs::canonicalize(&config.report_dir)?;
    let config_dir = sibling_config_dir(&report_dir);
    fs::create_dir_all(&config_dir)?;
    info!("[Config] Report directory: {}", report_dir.display());

    let preset = match (&config.scan_type, &config.config_file) {
        (ScanType::Automation, Some(path)) => Some(load_preset(path)?),
        _ => None,
    };

    let started_local = Local::now();
    let started_at = Utc::now();
    let report_base = report_basename(config, started_local);

    let mut plan = AutomationPlan::generate(config, directive, preset.as_ref());
    plan.push_report_jobs(&report_base, config.target_url.as_str());
    let plan_path = plan.write_to(&config_dir)?;
    info!("[Config] Engine configuration written: {}", plan_path.display());

    let launcher = EngineLauncher::new();
    let network = match config.network_name.clone() {
        Some(network) => Some(network),
        None => launcher.detect_network().await,
    };
    let user = launcher.current_user().await;

    let spec = EngineRunSpec::build(
        config,
        directive,
        &report_dir,
        &config_dir,
        network,
        user,
        started_local,
    );

    let status = match launcher.execute(&spec).await {
        RunOutcome::Completed { exit_code } => {
            if exit_code != 0 {
                // ZAP exits non-zero when it raised warnings or findings
                info!("[Engine] Engine reported findings (exit code {})", exit_code);
            }
            RunStatus::Completed
        }
        RunOutcome::TimedOut => {
            warn!("[Engine] Scan timed out; continuing with partial findings");
            RunStatus::TimedOut
        }
        RunOutcome::LaunchFailed { reason } => {
            return Err(ScannerError::Launch { reason });
        }
    };

    let artifact_path = report_dir.join(format!("{}.json", report_base));
    let findings = match collect_findings(&artifact_path) {
        Ok(collected) => {
            if collected.truncated {
                warn!("[Collect] Findings artifact was truncated, report is partial");
            }
            info!("[Collect] {} finding(s) collected", collected.findings.len());
            collected.findings
        }
        Err(e) if status == RunStatus::TimedOut => {
            // The timed-out run still gets its caveated report
            warn!("[Collect] No usable findings after timeout: {}", e);
            Vec::new()
        }
        Err(e) => return Err(e),
    };

    let report = ScanReport::build(config, status, findings, started_at, Utc::now());
    persist_report(config, &report, &report_dir, started_local)?;
    Ok(report)
}

fn sibling_config_dir(report_dir: &std::path::Path) -> PathBuf {
    match report_dir.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join("zap-config"),
        _ => PathBuf::from("zap-config"),
    }
}

fn persist_report(
    config: &ScanConfig,
    report: &ScanReport,
    report_dir: &std::path::Path,
    started_local: chrono::DateTime<Local>,
) -> Result<(), ScannerError> {
    let stem = format!(
        "haavi-report-{}-{}",
        config.scan_type,
        started_local.format("%Y%m%d_%H%M%S")
    );

    let json_path = report_dir.join(format!("{}.json", stem));
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| ScannerError::Collection {
            path: json_path.clone(),
            reason: format!("report serialization failed: {}", e),
        })?;
    fs::write(&json_path, json)?;
    info!("[Report] Machine-readable report: {}", json_path.display());

    let md_path = report_dir.join(format!("{}.md", stem));
    fs::write(&md_path, render_markdown(report))?;
    info!("[Report] Narrative report: {}", md_path.display());

    Ok(())
}

fn print_summary(report: &ScanReport) {
    println!();
    println!("{}", "=".repeat(60));
    println!("SCAN COMPLETE");
    println!("{}", "=".repeat(60));
    println!("Target:             {}", report.target);
    println!("Scan type:          {}", report.scan_type);
    println!("Run status:         {}", report.status);
    println!(
        "Security score:     {}/100 (grade {})",
        report.score.score, report.score.grade
    );
    println!(
        "Findings:           {} high, {} medium, {} low, {} informational",
        report.score.high_count,
        report.score.medium_count,
        report.score.low_count,
        report.score.informational_count
    );
    if report.status == RunStatus::TimedOut {
        println!("Note:               score is based on partial data (timeout)");
    }
    println!("{}", "=".repeat(60));
}

fn fail(error: ScannerError, code: i32) -> ! {
    error!("[{}] {}", error.classification(), error);
    std::process::exit(code);
}
