// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Haavi - Scan Configuration Model
 * Validates a raw scan request into an immutable ScanConfig
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::path::PathBuf;

use regex::Regex;
use url::Url;

use crate::errors::{ScannerError, ScannerResult};
use crate::types::{AuthMode, ScanType};

/// Baseline addon set installed into the engine when none is requested:
/// authentication helper, active-scan rules, brute-force detection,
/// AJAX spider, advanced SQL-injection scanner, access-control tester.
pub const DEFAULT_ADDONS: [&str; 6] = [
    "authhelper",
    "ascanrules",
    "bruteforce",
    "spiderAjax",
    "sqliplus",
    "accessControl",
];

pub const DEFAULT_IMAGE: &str = "ghcr.io/zaproxy/zaproxy:stable";

pub const DEFAULT_AUTH_HEADER: &str = "Authorization";
pub const DEFAULT_TOKEN_PREFIX: &str = "Bearer";
pub const DEFAULT_USERNAME_FIELD: &str = "username";
pub const DEFAULT_PASSWORD_FIELD: &str = "password";
pub const DEFAULT_LANGUAGE: &str = "ja_JP";

pub const DEFAULT_SPIDER_DURATION_MINS: u32 = 5;
pub const DEFAULT_MAX_DURATION_MINS: u32 = 30;
pub const DEFAULT_MAX_DEPTH: u32 = 10;
pub const DEFAULT_MAX_CHILDREN: u32 = 20;
pub const DEFAULT_THREAD_PER_HOST: u32 = 10;
pub const DEFAULT_HOSTS_PER_SCAN: u32 = 5;

/// Unvalidated scan request as assembled by the CLI.
/// Optional fields left as None pick up the documented defaults.
#[derive(Debug, Clone)]
pub struct RawScanRequest {
    pub scan_type: ScanType,
    pub target_url: String,
    pub auth_mode: AuthMode,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_token: Option<String>,
    pub auth_header: Option<String>,
    pub token_prefix: Option<String>,
    pub login_url: Option<String>,
    pub username_field: Option<String>,
    pub password_field: Option<String>,
    pub logged_in_indicator: Option<String>,
    pub logged_out_indicator: Option<String>,
    pub ajax_spider: bool,
    pub spider_duration: Option<u32>,
    pub max_duration: Option<u32>,
    pub max_depth: Option<u32>,
    pub max_children: Option<u32>,
    pub thread_per_host: Option<u32>,
    pub hosts_per_scan: Option<u32>,
    pub network_name: Option<String>,
    pub addons: Vec<String>,
    pub language: Option<String>,
    pub config_file: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub image: Option<String>,
}

/// Validated, immutable description of one scan request.
/// Created once per invocation; no downstream component mutates it.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub scan_type: ScanType,
    pub target_url: Url,
    pub auth_mode: AuthMode,
    pub username: Option<String>,
    pub password: Option<String>,
    pub auth_token: Option<String>,
    pub auth_header: String,
    pub token_prefix: String,
    pub login_url: Option<Url>,
    pub username_field: String,
    pub password_field: String,
    pub logged_in_indicator: Option<String>,
    pub logged_out_indicator: Option<String>,
    pub ajax_spider: bool,
    pub spider_duration: u32,
    pub max_duration: u32,
    pub max_depth: u32,
    pub max_children: u32,
    pub thread_per_host: u32,
    pub hosts_per_scan: u32,
    pub network_name: Option<String>,
    pub addons: Vec<String>,
    pub language: String,
    pub config_file: Option<PathBuf>,
    pub report_dir: PathBuf,
    pub image: String,
}

impl RawScanRequest {
    /// Apply defaults, then validate everything up front.
    /// Rejections name the offending field; nothing is launched before this passes.
    pub fn validate(self) -> ScannerResult<ScanConfig> {
        let target_url = parse_http_url("target_url", &self.target_url)?;

        let login_url = match &self.login_url {
            Some(raw) => Some(parse_http_url("login_url", raw)?),
            None => None,
        };

        let spider_duration = positive(
            "spider_duration",
            self.spider_duration.unwrap_or(DEFAULT_SPIDER_DURATION_MINS),
        )?;
        let max_duration = positive(
            "max_duration",
            self.max_duration.unwrap_or(DEFAULT_MAX_DURATION_MINS),
        )?;
        let max_depth = positive("max_depth", self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH))?;
        let max_children = positive(
            "max_children",
            self.max_children.unwrap_or(DEFAULT_MAX_CHILDREN),
        )?;
        let thread_per_host = positive(
            "thread_per_host",
            self.thread_per_host.unwrap_or(DEFAULT_THREAD_PER_HOST),
        )?;
        let hosts_per_scan = positive(
            "hosts_per_scan",
            self.hosts_per_scan.unwrap_or(DEFAULT_HOSTS_PER_SCAN),
        )?;

        let addons = if self.addons.is_empty() {
            DEFAULT_ADDONS.iter().map(|a| a.to_string()).collect()
        } else {
            self.addons
        };
        if addons.iter().any(|a| a.trim().is_empty()) {
            return Err(ScannerError::validation(
                "addons",
                "addon identifiers must not be blank",
            ));
        }

        check_auth_requirements(
            self.auth_mode,
            self.username.as_deref(),
            self.password.as_deref(),
            self.auth_token.as_deref(),
            login_url.as_ref(),
        )?;

        compile_indicator("logged_in_indicator", self.logged_in_indicator.as_deref())?;
        compile_indicator("logged_out_indicator", self.logged_out_indicator.as_deref())?;

        Ok(ScanConfig {
            scan_type: self.scan_type,
            target_url,
            auth_mode: self.auth_mode,
            username: self.username,
            password: self.password,
            auth_token: self.auth_token,
            auth_header: self
                .auth_header
                .unwrap_or_else(|| DEFAULT_AUTH_HEADER.to_string()),
            token_prefix: self
                .token_prefix
                .unwrap_or_else(|| DEFAULT_TOKEN_PREFIX.to_string()),
            login_url,
            username_field: self
                .username_field
                .unwrap_or_else(|| DEFAULT_USERNAME_FIELD.to_string()),
            password_field: self
                .password_field
                .unwrap_or_else(|| DEFAULT_PASSWORD_FIELD.to_string()),
            logged_in_indicator: self.logged_in_indicator,
            logged_out_indicator: self.logged_out_indicator,
            ajax_spider: self.ajax_spider,
            spider_duration,
            max_duration,
            max_depth,
            max_children,
            thread_per_host,
            hosts_per_scan,
            network_name: self.network_name,
            addons,
            language: self.language.unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            config_file: self.config_file,
            report_dir: self.report_dir.unwrap_or_else(|| PathBuf::from("report")),
            image: self.image.unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
        })
    }
}

fn parse_http_url(field: &str, raw: &str) -> ScannerResult<Url> {
    let url = Url::parse(raw)
        .map_err(|e| ScannerError::validation(field, format!("'{}' is not a valid URL: {}", raw, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ScannerError::validation(
            field,
            format!("'{}' must use http:// or https://", raw),
        ));
    }
    Ok(url)
}

fn positive(field: &str, value: u32) -> ScannerResult<u32> {
    if value == 0 {
        return Err(ScannerError::validation(field, "value must be positive"));
    }
    Ok(value)
}

fn compile_indicator(field: &str, pattern: Option<&str>) -> ScannerResult<()> {
    if let Some(pattern) = pattern {
        Regex::new(pattern)
            .map_err(|e| ScannerError::validation(field, format!("invalid regex: {}", e)))?;
    }
    Ok(())
}

fn check_auth_requirements(
    mode: AuthMode,
    username: Option<&str>,
    password: Option<&str>,
    token: Option<&str>,
    login_url: Option<&Url>,
) -> ScannerResult<()> {
    let has = |v: Option<&str>| v.map(|s| !s.trim().is_empty()).unwrap_or(false);

    match mode {
        AuthMode::None => Ok(()),
        AuthMode::Bearer => {
            if !has(token) {
                return Err(ScannerError::validation(
                    "auth_token",
                    "auth_token is required when auth mode is 'bearer'",
                ));
            }
            Ok(())
        }
        AuthMode::Form | AuthMode::Json => {
            if login_url.is_none() {
                return Err(ScannerError::validation(
                    "login_url",
                    format!("login_url is required when auth mode is '{}'", mode),
                ));
            }
            if !has(username) || !has(password) {
                return Err(ScannerError::validation(
                    "username",
                    format!(
                        "username and password are required when auth mode is '{}'",
                        mode
                    ),
                ));
            }
            Ok(())
        }
        AuthMode::Basic => {
            if !has(username) || !has(password) {
                return Err(ScannerError::validation(
                    "username",
                    "username and password are required when auth mode is 'basic'",
                ));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_request() -> RawScanRequest {
        RawScanRequest {
            scan_type: ScanType::Baseline,
            target_url: "http://example.com".to_string(),
            auth_mode: AuthMode::None,
            username: None,
            password: None,
            auth_token: None,
            auth_header: None,
            token_prefix: None,
            login_url: None,
            username_field: None,
            password_field: None,
            logged_in_indicator: None,
            logged_out_indicator: None,
            ajax_spider: false,
            spider_duration: None,
            max_duration: None,
            max_depth: None,
            max_children: None,
            thread_per_host: None,
            hosts_per_scan: None,
            network_name: None,
            addons: vec![],
            language: None,
            config_file: None,
            report_dir: None,
            image: None,
        }
    }

    #[test]
    fn test_defaults_applied() {
        let config = base_request().validate().unwrap();
        assert_eq!(config.max_duration, 30);
        assert_eq!(config.max_depth, 10);
        assert_eq!(config.max_children, 20);
        assert_eq!(config.thread_per_host, 10);
        assert_eq!(config.spider_duration, 5);
        assert_eq!(config.auth_header, "Authorization");
        assert_eq!(config.token_prefix, "Bearer");
        assert_eq!(config.language, "ja_JP");
        assert_eq!(config.addons.len(), DEFAULT_ADDONS.len());
        assert!(config.addons.contains(&"authhelper".to_string()));
        assert!(config.addons.contains(&"sqliplus".to_string()));
    }

    #[test]
    fn test_rejects_malformed_target() {
        let mut req = base_request();
        req.target_url = "not-a-url".to_string();
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("target_url"));

        let mut req = base_request();
        req.target_url = "ftp://example.com".to_string();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timing_values() {
        let mut req = base_request();
        req.max_duration = Some(0);
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("max_duration"));

        let mut req = base_request();
        req.thread_per_host = Some(0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_bearer_requires_token() {
        let mut req = base_request();
        req.auth_mode = AuthMode::Bearer;
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("auth_token"));

        req = base_request();
        req.auth_mode = AuthMode::Bearer;
        req.auth_token = Some("eyJhbGciOiJIUzI1NiJ9.e30.sig".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_form_requires_login_url_and_credentials() {
        let mut req = base_request();
        req.auth_mode = AuthMode::Form;
        req.username = Some("admin".to_string());
        req.password = Some("secret".to_string());
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("login_url"));

        req = base_request();
        req.auth_mode = AuthMode::Form;
        req.login_url = Some("http://example.com/login".to_string());
        assert!(req.validate().is_err());

        req = base_request();
        req.auth_mode = AuthMode::Form;
        req.login_url = Some("http://example.com/login".to_string());
        req.username = Some("admin".to_string());
        req.password = Some("secret".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_basic_requires_credentials() {
        let mut req = base_request();
        req.auth_mode = AuthMode::Basic;
        assert!(req.clone().validate().is_err());

        req.username = Some("admin".to_string());
        req.password = Some("secret".to_string());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_rejects_blank_addon() {
        let mut req = base_request();
        req.addons = vec!["authhelper".to_string(), "  ".to_string()];
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("addons"));
    }

    #[test]
    fn test_rejects_bad_indicator_regex() {
        let mut req = base_request();
        req.logged_in_indicator = Some("Welcome (".to_string());
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("logged_in_indicator"));
    }

    #[test]
    fn test_explicit_addons_kept_verbatim() {
        let mut req = base_request();
        req.addons = vec!["jwt".to_string(), "graphql".to_string()];
        let config = req.validate().unwrap();
        assert_eq!(config.addons, vec!["jwt", "graphql"]);
    }
}
