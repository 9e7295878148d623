// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Haavi - Engine Config Generator
 * Renders the declarative Automation Framework document consumed by ZAP:
 * env/context (scope, authentication, addon install list) plus the ordered
 * job list appropriate to the scan type.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::auth::{AuthDirective, Verification, BROWSER_ID, LOGIN_PAGE_WAIT_SECS};
use crate::config::ScanConfig;
use crate::errors::{ScannerError, ScannerResult};
use crate::types::ScanType;

pub const CONTEXT_NAME: &str = "Target Application";
pub const CONFIG_FILE_NAME: &str = "automation.yaml";

/// In-container paths fixed by the engine image
pub const ENGINE_WORK_DIR: &str = "/zap/wrk";
pub const ENGINE_CONFIG_DIR: &str = "/zap/config";

/// Trailing passive-scan wait after spider/active jobs, in minutes
const PASSIVE_WAIT_MINS: u32 = 5;

/// Full Automation Framework document. Fixed top-level sections:
/// environment/context, addon install list, ordered jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationPlan {
    pub env: EnvSection,
    #[serde(rename = "addOns")]
    pub add_ons: AddOnsSection,
    pub jobs: Vec<Job>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvSection {
    pub contexts: Vec<Context>,
    pub parameters: EnvParameters,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvParameters {
    pub fail_on_error: bool,
    pub fail_on_warning: bool,
    pub progress_to_stdout: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    pub name: String,
    pub urls: Vec<String>,
    pub include_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_management: Option<SessionManagement>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<ContextUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationSection {
    pub method: String,
    pub parameters: Mapping,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification: Option<VerificationSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationSection {
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_in_regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_out_regex: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionManagement {
    pub method: String,
    pub parameters: Mapping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextUser {
    pub name: String,
    pub credentials: Credentials,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddOnsSection {
    pub install: Vec<String>,
}

/// One engine job. Parameters stay an open mapping so automation presets
/// keep their tuning verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    #[serde(rename = "type")]
    pub job_type: String,
    #[serde(default, skip_serializing_if = "Mapping::is_empty")]
    pub parameters: Mapping,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Job {
    fn new(job_type: &str, parameters: Mapping) -> Self {
        Self {
            job_type: job_type.to_string(),
            parameters,
            extra: BTreeMap::new(),
        }
    }
}

impl AutomationPlan {
    /// Generate the document for a validated config and resolved directive.
    /// Pure: no filesystem access, no mutation of the inputs. For the
    /// `automation` scan type the already-parsed preset supplies the job
    /// list; target/auth/addon sections are always computed here so a stale
    /// preset can never re-target the scan or skip authentication.
    pub fn generate(
        config: &ScanConfig,
        directive: &AuthDirective,
        preset: Option<&Value>,
    ) -> AutomationPlan {
        let context = build_context(config, directive);

        let jobs = match config.scan_type {
            ScanType::Baseline => vec![passive_scan_wait(config.max_duration)],
            ScanType::Full => full_jobs(config),
            ScanType::Api => {
                let mut jobs = vec![openapi_job(config)];
                jobs.push(active_scan_job(config));
                jobs.push(passive_scan_wait(PASSIVE_WAIT_MINS));
                jobs
            }
            ScanType::Automation => preset
                .and_then(preset_jobs)
                .filter(|jobs| !jobs.is_empty())
                .unwrap_or_else(|| full_jobs(config)),
        };

        AutomationPlan {
            env: EnvSection {
                contexts: vec![context],
                parameters: EnvParameters {
                    fail_on_error: false,
                    fail_on_warning: false,
                    progress_to_stdout: true,
                },
            },
            add_ons: AddOnsSection {
                install: config.addons.clone(),
            },
            jobs,
        }
    }

    /// Append the engine's report jobs so the run leaves collectible
    /// artifacts in the work dir. The JSON report is the one the finding
    /// collector reads.
    pub fn push_report_jobs(&mut self, report_base: &str, target: &str) {
        for (template, ext) in [
            ("traditional-html", "html"),
            ("traditional-json", "json"),
            ("traditional-xml", "xml"),
        ] {
            let mut params = Mapping::new();
            insert(&mut params, "template", template);
            insert(&mut params, "reportDir", ENGINE_WORK_DIR);
            insert(&mut params, "reportFile", format!("{}.{}", report_base, ext));
            insert(&mut params, "reportTitle", "Security Scanning Report");
            insert(&mut params, "reportDescription", format!("Target: {}", target));
            self.jobs.push(Job::new("report", params));
        }
    }

    /// Serialize the plan into `<dir>/automation.yaml` and return the path
    pub fn write_to(&self, dir: &Path) -> ScannerResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(CONFIG_FILE_NAME);
        let yaml = serde_yaml::to_string(self)?;
        fs::write(&path, yaml)?;
        Ok(path)
    }
}

/// Parse an automation preset file into a YAML value
pub fn load_preset(path: &Path) -> ScannerResult<Value> {
    let content = fs::read_to_string(path).map_err(|e| ScannerError::Configuration(format!(
        "cannot read preset file {}: {}",
        path.display(),
        e
    )))?;
    let value: Value = serde_yaml::from_str(&content)?;
    Ok(value)
}

fn build_context(config: &ScanConfig, directive: &AuthDirective) -> Context {
    let target = config.target_url.to_string();
    let authentication = authentication_section(config, directive);
    let session_management = if directive.is_none() || matches!(directive, AuthDirective::Bearer { .. }) {
        None
    } else {
        // session tracking is auto-detected, never configured per target
        Some(SessionManagement {
            method: "autodetect".to_string(),
            parameters: Mapping::new(),
        })
    };
    let users = directive
        .context_credentials()
        .map(|(username, password)| {
            vec![ContextUser {
                name: username.to_string(),
                credentials: Credentials {
                    username: username.to_string(),
                    password: password.to_string(),
                },
            }]
        })
        .unwrap_or_default();

    Context {
        name: CONTEXT_NAME.to_string(),
        urls: vec![target.clone()],
        include_paths: vec![format!("{}.*", target)],
        authentication,
        session_management,
        users,
    }
}

fn authentication_section(
    config: &ScanConfig,
    directive: &AuthDirective,
) -> Option<AuthenticationSection> {
    let verification = verification_section(&Verification::resolve(config));
    match directive {
        // Unauthenticated runs have no authentication block; bearer rides
        // on env-var header injection instead of the context.
        AuthDirective::None | AuthDirective::Bearer { .. } => None,
        AuthDirective::FormBrowser(login) | AuthDirective::JsonBrowser(login) => {
            let mut params = Mapping::new();
            insert(&mut params, "loginPageUrl", login.login_page_url.as_str());
            insert_u64(&mut params, "loginPageWait", LOGIN_PAGE_WAIT_SECS as u64);
            insert(&mut params, "browserId", BROWSER_ID);
            Some(AuthenticationSection {
                method: "browser".to_string(),
                parameters: params,
                verification: Some(verification),
            })
        }
        AuthDirective::Basic {
            hostname, port, ..
        } => {
            let mut params = Mapping::new();
            insert(&mut params, "hostname", hostname.as_str());
            insert_u64(&mut params, "port", *port as u64);
            insert(&mut params, "realm", "");
            Some(AuthenticationSection {
                method: "http".to_string(),
                parameters: params,
                verification: Some(verification),
            })
        }
    }
}

fn verification_section(verification: &Verification) -> VerificationSection {
    match verification {
        Verification::AutoDetect => VerificationSection {
            method: "autodetect".to_string(),
            logged_in_regex: None,
            logged_out_regex: None,
        },
        Verification::Regex {
            logged_in,
            logged_out,
        } => VerificationSection {
            method: "response".to_string(),
            logged_in_regex: logged_in.clone(),
            logged_out_regex: logged_out.clone(),
        },
    }
}

fn full_jobs(config: &ScanConfig) -> Vec<Job> {
    let mut jobs = vec![spider_job(config)];
    if config.ajax_spider {
        jobs.push(ajax_spider_job(config));
    }
    jobs.push(active_scan_job(config));
    jobs.push(passive_scan_wait(PASSIVE_WAIT_MINS));
    jobs
}

fn spider_job(config: &ScanConfig) -> Job {
    let mut params = Mapping::new();
    insert_u64(&mut params, "maxDuration", config.spider_duration as u64);
    insert_u64(&mut params, "maxDepth", config.max_depth as u64);
    insert_u64(&mut params, "maxChildren", config.max_children as u64);
    Job::new("spider", params)
}

fn ajax_spider_job(config: &ScanConfig) -> Job {
    let mut params = Mapping::new();
    insert_u64(&mut params, "maxDuration", config.spider_duration as u64);
    insert_u64(&mut params, "maxCrawlDepth", config.max_depth as u64);
    insert_u64(&mut params, "numberOfBrowsers", 2);
    insert(&mut params, "browserId", BROWSER_ID);
    Job::new("spiderAjax", params)
}

fn active_scan_job(config: &ScanConfig) -> Job {
    let mut params = Mapping::new();
    insert(&mut params, "policy", "Default Policy");
    insert_u64(&mut params, "maxScanDurationInMins", config.max_duration as u64);
    insert_u64(&mut params, "threadPerHost", config.thread_per_host as u64);
    insert_u64(&mut params, "hostPerScan", config.hosts_per_scan as u64);
    Job::new("activeScan", params)
}

fn passive_scan_wait(max_duration: u32) -> Job {
    let mut params = Mapping::new();
    insert_u64(&mut params, "maxDuration", max_duration as u64);
    Job::new("passiveScan-wait", params)
}

fn openapi_job(config: &ScanConfig) -> Job {
    let mut params = Mapping::new();
    insert(&mut params, "apiUrl", config.target_url.to_string());
    insert(&mut params, "targetUrl", config.target_url.to_string());
    Job::new("openapi", params)
}

fn preset_jobs(preset: &Value) -> Option<Vec<Job>> {
    let jobs = preset.get("jobs")?.as_sequence()?;
    let mut parsed = Vec::with_capacity(jobs.len());
    for job in jobs {
        match serde_yaml::from_value::<Job>(job.clone()) {
            Ok(job) => parsed.push(job),
            Err(e) => {
                tracing::warn!("[Config] Skipping unreadable preset job: {}", e);
            }
        }
    }
    Some(parsed)
}

fn insert(map: &mut Mapping, key: &str, value: impl Into<String>) {
    map.insert(Value::from(key), Value::from(value.into()));
}

fn insert_u64(map: &mut Mapping, key: &str, value: u64) {
    map.insert(Value::from(key), Value::from(value));
}
