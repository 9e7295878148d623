// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Authentication Strategy Resolver
//!
//! Maps an auth mode to the concrete directive the engine needs:
//! header injection for bearer tokens, browser-driven login for form/JSON
//! applications, http authentication for basic, nothing for unauthenticated
//! runs. Login verification is resolved independently of the mode.

use std::collections::BTreeMap;

use crate::config::ScanConfig;
use crate::errors::{ScannerError, ScannerResult};
use crate::types::AuthMode;

/// Environment variables the engine's headless auth path reads at startup
pub const ENV_AUTH_HEADER: &str = "ZAP_AUTH_HEADER";
pub const ENV_AUTH_HEADER_VALUE: &str = "ZAP_AUTH_HEADER_VALUE";

/// Fixed post-navigation wait; the login page needs time for its JS to settle
pub const LOGIN_PAGE_WAIT_SECS: u32 = 5;

/// Headless browser the engine drives for form/JSON logins
pub const BROWSER_ID: &str = "firefox-headless";

/// Browser-driven login parameters shared by the form and JSON variants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserLogin {
    pub login_page_url: String,
    pub username: String,
    pub password: String,
}

/// Resolved authentication directive, one variant per auth mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthDirective {
    None,
    Bearer { header: String, value: String },
    FormBrowser(BrowserLogin),
    JsonBrowser(BrowserLogin),
    Basic {
        username: String,
        password: String,
        hostname: String,
        port: u16,
    },
}

impl AuthDirective {
    /// Resolve the directive for a validated config. Missing required fields
    /// surface as Configuration errors here even though the configuration
    /// model checks them first.
    pub fn resolve(config: &ScanConfig) -> ScannerResult<Self> {
        match config.auth_mode {
            AuthMode::None => Ok(AuthDirective::None),
            AuthMode::Bearer => {
                let token = config.auth_token.as_deref().ok_or_else(|| {
                    ScannerError::Configuration(
                        "bearer auth requires an auth token".to_string(),
                    )
                })?;
                Ok(AuthDirective::Bearer {
                    header: config.auth_header.clone(),
                    value: bearer_value(&config.token_prefix, token),
                })
            }
            AuthMode::Form | AuthMode::Json => {
                let login = browser_login(config)?;
                if config.auth_mode == AuthMode::Form {
                    Ok(AuthDirective::FormBrowser(login))
                } else {
                    Ok(AuthDirective::JsonBrowser(login))
                }
            }
            AuthMode::Basic => {
                let (username, password) = credentials_of(config)?;
                let hostname = config
                    .target_url
                    .host_str()
                    .ok_or_else(|| {
                        ScannerError::Configuration(
                            "target URL has no hostname for basic auth".to_string(),
                        )
                    })?
                    .to_string();
                let port = config
                    .target_url
                    .port_or_known_default()
                    .unwrap_or(80);
                Ok(AuthDirective::Basic {
                    username,
                    password,
                    hostname,
                    port,
                })
            }
        }
    }

    /// Process environment assignments required by this directive.
    /// Only the bearer variant is stateless/headless and rides on env vars.
    pub fn env_vars(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        if let AuthDirective::Bearer { header, value } = self {
            vars.insert(ENV_AUTH_HEADER.to_string(), header.clone());
            vars.insert(ENV_AUTH_HEADER_VALUE.to_string(), value.clone());
        }
        vars
    }

    /// Credentials to register as a context user, when the mode carries any
    pub fn context_credentials(&self) -> Option<(&str, &str)> {
        match self {
            AuthDirective::FormBrowser(login) | AuthDirective::JsonBrowser(login) => {
                Some((login.username.as_str(), login.password.as_str()))
            }
            AuthDirective::Basic {
                username, password, ..
            } => Some((username.as_str(), password.as_str())),
            AuthDirective::None | AuthDirective::Bearer { .. } => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AuthDirective::None)
    }
}

/// How the engine decides "am I still logged in?"
///
/// Explicit indicator regexes take precedence when supplied; otherwise the
/// engine auto-detects. The two are never merged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    AutoDetect,
    Regex {
        logged_in: Option<String>,
        logged_out: Option<String>,
    },
}

impl Verification {
    pub fn resolve(config: &ScanConfig) -> Self {
        if config.logged_in_indicator.is_some() || config.logged_out_indicator.is_some() {
            Verification::Regex {
                logged_in: config.logged_in_indicator.clone(),
                logged_out: config.logged_out_indicator.clone(),
            }
        } else {
            Verification::AutoDetect
        }
    }
}

fn bearer_value(prefix: &str, token: &str) -> String {
    if prefix.eq_ignore_ascii_case("none") {
        token.trim().to_string()
    } else {
        format!("{} {}", prefix, token).trim().to_string()
    }
}

fn browser_login(config: &ScanConfig) -> ScannerResult<BrowserLogin> {
    let login_url = config.login_url.as_ref().ok_or_else(|| {
        ScannerError::Configuration(format!(
            "auth mode '{}' requires a login URL",
            config.auth_mode
        ))
    })?;
    let (username, password) = credentials_of(config)?;
    Ok(BrowserLogin {
        login_page_url: login_url.to_string(),
        username,
        password,
    })
}

fn credentials_of(config: &ScanConfig) -> ScannerResult<(String, String)> {
    match (&config.username, &config.password) {
        (Some(u), Some(p)) if !u.trim().is_empty() && !p.trim().is_empty() => {
            Ok((u.clone(), p.clone()))
        }
        _ => Err(ScannerError::Configuration(format!(
            "auth mode '{}' requires username and password",
            config.auth_mode
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RawScanRequest;
    use crate::types::ScanType;

    fn config_with(auth_mode: AuthMode, mutate: impl FnOnce(&mut RawScanRequest)) -> ScanConfig {
        let mut req = RawScanRequest {
            scan_type: ScanType::Full,
            target_url: "https://example.com:8443/app".to_string(),
            auth_mode,
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
        };
        mutate(&mut req);
        req.validate().unwrap()
    }

    #[test]
    fn test_none_mode_is_empty_directive() {
        let config = config_with(AuthMode::None, |_| {});
        let directive = AuthDirective::resolve(&config).unwrap();
        assert!(directive.is_none());
        assert!(directive.env_vars().is_empty());
        assert!(directive.context_credentials().is_none());
    }

    #[test]
    fn test_bearer_env_map_is_exact() {
        let config = config_with(AuthMode::Bearer, |req| {
            req.auth_token = Some("abc123".to_string());
        });
        let directive = AuthDirective::resolve(&config).unwrap();
        let vars = directive.env_vars();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get(ENV_AUTH_HEADER).unwrap(), "Authorization");
        assert_eq!(vars.get(ENV_AUTH_HEADER_VALUE).unwrap(), "Bearer abc123");
    }

    #[test]
    fn test_bearer_prefix_none_drops_prefix() {
        let config = config_with(AuthMode::Bearer, |req| {
            req.auth_token = Some("abc123".to_string());
            req.token_prefix = Some("none".to_string());
        });
        let directive = AuthDirective::resolve(&config).unwrap();
        assert_eq!(
            directive.env_vars().get(ENV_AUTH_HEADER_VALUE).unwrap(),
            "abc123"
        );
    }

    #[test]
    fn test_bearer_custom_header() {
        let config = config_with(AuthMode::Bearer, |req| {
            req.auth_token = Some("key-1".to_string());
            req.auth_header = Some("X-API-Key".to_string());
            req.token_prefix = Some("none".to_string());
        });
        let directive = AuthDirective::resolve(&config).unwrap();
        assert_eq!(directive.env_vars().get(ENV_AUTH_HEADER).unwrap(), "X-API-Key");
    }

    #[test]
    fn test_form_and_json_share_browser_shape() {
        let setup = |req: &mut RawScanRequest| {
            req.login_url = Some("https://example.com/login".to_string());
            req.username = Some("admin".to_string());
            req.password = Some("secret".to_string());
        };
        let form = AuthDirective::resolve(&config_with(AuthMode::Form, setup)).unwrap();
        let json = AuthDirective::resolve(&config_with(AuthMode::Json, setup)).unwrap();

        match (&form, &json) {
            (AuthDirective::FormBrowser(a), AuthDirective::JsonBrowser(b)) => {
                assert_eq!(a, b);
                assert_eq!(a.login_page_url, "https://example.com/login");
            }
            other => panic!("unexpected directives: {:?}", other),
        }
        assert!(form.env_vars().is_empty());
        assert_eq!(form.context_credentials(), Some(("admin", "secret")));
    }

    #[test]
    fn test_basic_carries_target_host() {
        let config = config_with(AuthMode::Basic, |req| {
            req.username = Some("admin".to_string());
            req.password = Some("secret".to_string());
        });
        match AuthDirective::resolve(&config).unwrap() {
            AuthDirective::Basic { hostname, port, .. } => {
                assert_eq!(hostname, "example.com");
                assert_eq!(port, 8443);
            }
            other => panic!("unexpected directive: {:?}", other),
        }
    }

    #[test]
    fn test_verification_prefers_explicit_regex() {
        let config = config_with(AuthMode::None, |req| {
            req.logged_in_indicator = Some("Logout".to_string());
        });
        assert_eq!(
            Verification::resolve(&config),
            Verification::Regex {
                logged_in: Some("Logout".to_string()),
                logged_out: None,
            }
        );

        let config = config_with(AuthMode::None, |_| {});
        assert_eq!(Verification::resolve(&config), Verification::AutoDetect);
    }
}
