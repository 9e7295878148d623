// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Haavi - Process Orchestrator
 * Runs the scanning engine as a supervised docker container: builds the
 * invocation, enforces the wall-clock limit, and guarantees teardown on
 * every exit path including timeout.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::auth::AuthDirective;
use crate::automation::{CONFIG_FILE_NAME, ENGINE_CONFIG_DIR, ENGINE_WORK_DIR};
use crate::config::ScanConfig;

/// Extra wall-clock allowance on top of the configured max duration,
/// covering image start and report writing.
pub const STARTUP_GRACE_SECS: u64 = 120;

/// Exit codes reserved by the docker client for launch failures.
/// Anything else is the engine's own exit status - ZAP exits non-zero when
/// it finds vulnerabilities, which is not an orchestration failure.
const DOCKER_RESERVED_EXIT_CODES: [i32; 3] = [125, 126, 127];

/// Networks every docker host has; never auto-selected
const BUILTIN_NETWORKS: [&str; 3] = ["bridge", "host", "none"];

/// Fully resolved launch parameters for one engine run.
/// Constructed fresh per run and discarded afterwards.
#[derive(Debug, Clone)]
pub struct EngineRunSpec {
    pub image: String,
    pub container_name: String,
    pub command: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub report_dir: PathBuf,
    pub config_dir: PathBuf,
    pub network: Option<String>,
    pub user: Option<String>,
    pub timeout: Duration,
}

/// Definite end state of one supervised run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { exit_code: i32 },
    TimedOut,
    LaunchFailed { reason: String },
}

impl EngineRunSpec {
    /// Resolve the launch parameters for a validated config.
    /// `started_at` feeds the container name so concurrent runs never
    /// collide on container identity.
    pub fn build(
        config: &ScanConfig,
        directive: &AuthDirective,
        report_dir: &Path,
        config_dir: &Path,
        network: Option<String>,
        user: Option<String>,
        started_at: DateTime<Local>,
    ) -> EngineRunSpec {
        let mut env = directive.env_vars();
        env.insert("LC_ALL".to_string(), format!("{}.UTF-8", config.language));

        let command = vec![
            "zap.sh".to_string(),
            "-cmd".to_string(),
            "-autorun".to_string(),
            format!("{}/{}", ENGINE_CONFIG_DIR, CONFIG_FILE_NAME),
            "-config".to_string(),
            format!("view.locale={}", config.language),
        ];

        EngineRunSpec {
            image: config.image.clone(),
            container_name: container_name(config, started_at),
            command,
            env,
            report_dir: report_dir.to_path_buf(),
            config_dir: config_dir.to_path_buf(),
            network,
            user,
            timeout: Duration::from_secs(u64::from(config.max_duration) * 60 + STARTUP_GRACE_SECS),
        }
    }

    /// docker argv, without the leading binary.
    /// Env values are not inlined: each variable is exported on the client
    /// process and forwarded with a bare `-e KEY` so tokens stay off argv.
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--name".to_string(),
            self.container_name.clone(),
        ];
        if let Some(user) = &self.user {
            args.push("--user".to_string());
            args.push(user.clone());
        }
        args.push("-v".to_string());
        args.push(format!("{}:{}:rw", self.report_dir.display(), ENGINE_WORK_DIR));
        args.push("-v".to_string());
        args.push(format!("{}:{}:ro", self.config_dir.display(), ENGINE_CONFIG_DIR));
        if let Some(network) = &self.network {
            args.push("--network".to_string());
            args.push(network.clone());
        }
        for key in self.env.keys() {
            args.push("-e".to_string());
            args.push(key.clone());
        }
        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

fn container_name(config: &ScanConfig, started_at: DateTime<Local>) -> String {
    format!(
        "haavi-{}-{}",
        config.scan_type,
        started_at.format("%Y%m%d%H%M%S")
    )
}

/// Report file stem shared by the engine's report jobs and the collector
pub fn report_basename(config: &ScanConfig, started_at: DateTime<Local>) -> String {
    format!(
        "zap-report-{}-{}",
        config.scan_type,
        started_at.format("%Y%m%d_%H%M%S")
    )
}

/// Launches and supervises engine containers through the docker client
pub struct EngineLauncher {
    docker_bin: String,
}

impl Default for EngineLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineLauncher {
    pub fn new() -> Self {
        Self {
            docker_bin: "docker".to_string(),
        }
    }

    /// Point the launcher at a different client binary (tests)
    pub fn with_binary(docker_bin: &str) -> Self {
        Self {
            docker_bin: docker_bin.to_string(),
        }
    }

    /// Run one engine container to a definite end state.
    /// Teardown runs exactly once on every path, timeout included.
    pub async fn execute(&self, spec: &EngineRunSpec) -> RunOutcome {
        info!(
            "[Engine] Launching {} as container {}",
            spec.image, spec.container_name
        );
        let outcome = self.launch_and_wait(spec).await;
        self.remove_container(&spec.container_name).await;
        outcome
    }

    async fn launch_and_wait(&self, spec: &EngineRunSpec) -> RunOutcome {
        let args = spec.docker_args();
        debug!("[Engine] {} {}", self.docker_bin, args.join(" "));

        let mut cmd = Command::new(&self.docker_bin);
        cmd.args(&args);
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome::LaunchFailed {
                    reason: format!("failed to launch {}: {}", self.docker_bin, e),
                }
            }
        };

        info!(
            "[Engine] Waiting for scan to finish (limit {}s)",
            spec.timeout.as_secs()
        );
        match timeout(spec.timeout, child.wait()).await {
            Ok(Ok(status)) => {
                let exit_code = status.code().unwrap_or(-1);
                if DOCKER_RESERVED_EXIT_CODES.contains(&exit_code) {
                    RunOutcome::LaunchFailed {
                        reason: format!(
                            "container could not be started (docker exit code {})",
                            exit_code
                        ),
                    }
                } else {
                    info!("[Engine] Scan finished with exit code {}", exit_code);
                    RunOutcome::Completed { exit_code }
                }
            }
            Ok(Err(e)) => RunOutcome::LaunchFailed {
                reason: format!("failed waiting for engine: {}", e),
            },
            Err(_) => {
                warn!(
                    "[Engine] Scan exceeded the {}s limit, forcing stop",
                    spec.timeout.as_secs()
                );
                if let Err(e) = child.start_kill() {
                    warn!("[Engine] Could not signal engine process: {}", e);
                }
                let _ = child.wait().await;
                RunOutcome::TimedOut
            }
        }
    }

    /// Force-remove the run's container. Failures are expected when the
    /// container already exited under --rm and are only logged.
    async fn remove_container(&self, name: &str) {
        let result = Command::new(&self.docker_bin)
            .args(["rm", "-f", name])
            .output()
            .await;
        match result {
            Ok(output) if output.status.success() => {
                debug!("[Engine] Removed container {}", name);
            }
            Ok(_) => debug!("[Engine] Container {} already gone", name),
            Err(e) => warn!("[Engine] Cleanup of {} failed: {}", name, e),
        }
    }

    /// Auto-detect a user-defined network when none was configured.
    /// Advisory: any failure falls back to the default network.
    pub async fn detect_network(&self) -> Option<String> {
        let output = Command::new(&self.docker_bin)
            .args(["network", "ls", "--format", "{{.Name}}"])
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let selected = select_user_network(&String::from_utf8_lossy(&output.stdout));
        match &selected {
            Some(name) => info!("[Engine] Auto-detected docker network: {}", name),
            None => debug!("[Engine] No single user-defined network, using default"),
        }
        selected
    }

    /// uid:gid of the invoking user, so report files land with sane
    /// ownership on bind mounts. Best effort.
    pub async fn current_user(&self) -> Option<String> {
        let uid = id_output(&["-u"]).await?;
        let gid = id_output(&["-g"]).await?;
        Some(format!("{}:{}", uid, gid))
    }
}

async fn id_output(args: &[&str]) -> Option<String> {
    let output = Command::new("id").args(args).output().await.ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Pick the single user-defined network from a `docker network ls` listing
pub fn select_user_network(listing: &str) -> Option<String> {
    let candidates: Vec<&str> = listing
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !BUILTIN_NETWORKS.contains(line))
        .collect();
    if candidates.len() == 1 {
        Some(candidates[0].to_string())
    } else {
        None
    }
}
