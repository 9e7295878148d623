// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Haavi - Finding Collector
 * Reads the engine's traditional-json findings artifact from the run work
 * dir and normalizes alerts into Finding values. Tolerates a partially
 * written artifact after a forced stop: every syntactically complete alert
 * record is kept, a trailing incomplete one is dropped.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use tracing::warn;

use crate::errors::{ScannerError, ScannerResult};
use crate::types::{Confidence, Finding, FindingInstance, Severity};

/// Findings read from one run's artifact
#[derive(Debug, Clone)]
pub struct CollectedFindings {
    pub site: String,
    pub findings: Vec<Finding>,
    /// True when the artifact was truncated and records were salvaged
    pub truncated: bool,
}

#[derive(Debug, Deserialize)]
struct ZapReport {
    #[serde(default)]
    site: Vec<ZapSite>,
}

#[derive(Debug, Deserialize)]
struct ZapSite {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(default)]
    alerts: Vec<ZapAlert>,
}

/// Raw alert record; field names are the engine's contract
#[derive(Debug, Deserialize)]
struct ZapAlert {
    #[serde(default)]
    pluginid: String,
    #[serde(default)]
    alert: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    riskdesc: String,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    solution: String,
    #[serde(default)]
    reference: String,
    #[serde(default)]
    count: Option<serde_json::Value>,
    #[serde(default)]
    instances: Vec<ZapInstance>,
}

#[derive(Debug, Deserialize)]
struct ZapInstance {
    #[serde(default)]
    uri: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    param: String,
    #[serde(default)]
    attack: String,
    #[serde(default)]
    evidence: String,
    #[serde(default)]
    otherinfo: String,
}

/// Read and normalize the findings artifact at `report_path`.
/// Fails only when the artifact is absent or yields no parsable structure.
pub fn collect_findings(report_path: &Path) -> ScannerResult<CollectedFindings> {
    let raw = fs::read_to_string(report_path).map_err(|e| ScannerError::Collection {
        path: report_path.to_path_buf(),
        reason: format!("findings artifact not readable: {}", e),
    })?;

    match serde_json::from_str::<ZapReport>(&raw) {
        Ok(report) => {
            let site = report
                .site
                .first()
                .map(|s| s.name.clone())
                .unwrap_or_default();
            let findings = report
                .site
                .into_iter()
                .flat_map(|s| s.alerts)
                .map(convert_alert)
                .collect();
            Ok(CollectedFindings {
                site,
                findings,
                truncated: false,
            })
        }
        Err(parse_err) => {
            // Forced stops can leave the artifact cut mid-record; keep what
            // is complete rather than failing the whole collection.
            if !raw.contains("\"site\"") {
                return Err(ScannerError::Collection {
                    path: report_path.to_path_buf(),
                    reason: format!("artifact is not a findings report: {}", parse_err),
                });
            }
            let alerts = salvage_alerts(&raw);
            warn!(
                "[Collect] Artifact truncated, salvaged {} complete alert record(s)",
                alerts.len()
            );
            Ok(CollectedFindings {
                site: salvage_site_name(&raw).unwrap_or_default(),
                findings: alerts.into_iter().map(convert_alert).collect(),
                truncated: true,
            })
        }
    }
}

fn convert_alert(alert: ZapAlert) -> Finding {
    let (severity, confidence) = parse_riskdesc(&alert.riskdesc);
    let instance_count = alert.instances.len();
    let instances = alert.instances.into_iter().map(convert_instance).collect();
    Finding {
        plugin_id: alert.pluginid,
        name: if alert.alert.is_empty() {
            alert.name
        } else {
            alert.alert
        },
        severity,
        confidence,
        description: strip_tags(&alert.desc),
        solution: strip_tags(&alert.solution),
        reference_urls: extract_reference_urls(&alert.reference),
        instances,
        count: parse_count(alert.count.as_ref(), instance_count),
    }
}

fn convert_instance(instance: ZapInstance) -> FindingInstance {
    FindingInstance {
        uri: instance.uri,
        method: if instance.method.is_empty() {
            "GET".to_string()
        } else {
            instance.method
        },
        param: non_empty(instance.param),
        attack: non_empty(instance.attack),
        evidence: non_empty(instance.evidence),
        other_info: non_empty(instance.otherinfo),
    }
}

/// riskdesc carries risk plus confidence, e.g. "High (Medium)".
/// Localized reports label risk as 高/中/低 and are handled the same way.
fn parse_riskdesc(riskdesc: &str) -> (Severity, Confidence) {
    // only the part before the parenthetical is the risk level;
    // "Informational (Low)" must not read as Low
    let risk = riskdesc.split('(').next().unwrap_or(riskdesc);
    let severity = if risk.contains('高') || risk.contains("High") {
        Severity::High
    } else if risk.contains('中') || risk.contains("Medium") {
        Severity::Medium
    } else if risk.contains('低') || risk.contains("Low") {
        Severity::Low
    } else {
        Severity::Informational
    };

    let confidence = riskdesc
        .split_once('(')
        .map(|(_, rest)| {
            let inner = rest.trim_end_matches(')').trim();
            if inner.contains("False") {
                Confidence::FalsePositive
            } else if inner.contains("High") || inner.contains('高') {
                Confidence::High
            } else if inner.contains("Low") || inner.contains('低') {
                Confidence::Low
            } else {
                Confidence::Medium
            }
        })
        .unwrap_or(Confidence::Medium);

    (severity, confidence)
}

fn parse_count(count: Option<&serde_json::Value>, fallback: usize) -> u32 {
    match count {
        Some(serde_json::Value::String(s)) => s.parse().unwrap_or(fallback as u32),
        Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(fallback as u64) as u32,
        _ => fallback as u32,
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn strip_tags(text: &str) -> String {
    text.replace("<p>", "").replace("</p>", "").trim().to_string()
}

fn extract_reference_urls(reference: &str) -> Vec<String> {
    let cleaned = strip_tags(reference);
    if cleaned.is_empty() {
        return Vec::new();
    }
    let re = Regex::new(r"https?://[^\s]+").expect("static regex");
    let urls: Vec<String> = re
        .find_iter(&cleaned)
        .map(|m| m.as_str().to_string())
        .collect();
    if urls.is_empty() {
        vec![cleaned]
    } else {
        urls
    }
}

fn salvage_site_name(raw: &str) -> Option<String> {
    let re = Regex::new(r#""@name"\s*:\s*"([^"]*)""#).expect("static regex");
    re.captures(raw).map(|c| c[1].to_string())
}

/// Extract every complete alert object from the artifact's alerts array.
/// String-aware brace matching; a trailing incomplete record never matches
/// a closing brace at object depth and is dropped.
fn salvage_alerts(raw: &str) -> Vec<ZapAlert> {
    let alerts_key = match raw.find("\"alerts\"") {
        Some(idx) => idx,
        None => return Vec::new(),
    };
    let array_start = match raw[alerts_key..].find('[') {
        Some(offset) => alerts_key + offset,
        None => return Vec::new(),
    };

    let bytes = raw.as_bytes();
    let mut alerts = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut object_start: Option<usize> = None;

    for (i, &b) in bytes.iter().enumerate().skip(array_start + 1) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    object_start = Some(i);
                }
                depth += 1;
            }
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(start) = object_start.take() {
                            match serde_json::from_str::<ZapAlert>(&raw[start..=i]) {
                                Ok(alert) => alerts.push(alert),
                                Err(e) => {
                                    warn!("[Collect] Skipping unreadable alert record: {}", e);
                                }
                            }
                        }
                    }
                }
            }
            b']' => {
                if depth == 0 {
                    break;
                }
            }
            _ => {}
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn fixture_json() -> String {
        r#"{
            "@version": "2.15.0",
            "created": "2026-08-04T01:41:56Z",
            "site": [
                {
                    "@name": "http://example.com",
                    "alerts": [
                        {
                            "pluginid": "40018",
                            "alert": "SQL Injection",
                            "riskdesc": "High (Medium)",
                            "desc": "<p>Injection via parameter</p>",
                            "solution": "<p>Use parameterized queries</p>",
                            "reference": "<p>https://owasp.org/Top10 and https://cwe.mitre.org/89</p>",
                            "count": "2",
                            "instances": [
                                {"uri": "http://example.com/item", "method": "GET", "param": "id", "attack": "' OR 1=1", "evidence": "syntax error", "otherinfo": ""},
                                {"uri": "http://example.com/search", "method": "POST", "param": "q", "attack": "", "evidence": "", "otherinfo": ""}
                            ]
                        },
                        {
                            "pluginid": "10021",
                            "alert": "X-Content-Type-Options Missing",
                            "riskdesc": "Low (Medium)",
                            "desc": "Header missing",
                            "solution": "Set the header",
                            "reference": "",
                            "count": "1",
                            "instances": [
                                {"uri": "http://example.com/", "method": "GET", "param": "", "attack": "", "evidence": "", "otherinfo": ""}
                            ]
                        }
                    ]
                }
            ]
        }"#
        .to_string()
    }

    fn write_artifact(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_collect_complete_artifact() {
        let file = write_artifact(&fixture_json());
        let collected = collect_findings(file.path()).unwrap();

        assert!(!collected.truncated);
        assert_eq!(collected.site, "http://example.com");
        assert_eq!(collected.findings.len(), 2);

        let sqli = &collected.findings[0];
        assert_eq!(sqli.name, "SQL Injection");
        assert_eq!(sqli.severity, Severity::High);
        assert_eq!(sqli.confidence, Confidence::Medium);
        assert_eq!(sqli.count, 2);
        assert_eq!(sqli.description, "Injection via parameter");
        assert_eq!(sqli.reference_urls.len(), 2);
        assert_eq!(sqli.instances[0].param.as_deref(), Some("id"));
        assert!(sqli.instances[1].attack.is_none());
    }

    #[test]
    fn test_collect_truncated_artifact_salvages_complete_records() {
        let full = fixture_json();
        // cut inside the second alert record
        let cut = full.find("X-Content-Type-Options").unwrap();
        let file = write_artifact(&full[..cut]);

        let collected = collect_findings(file.path()).unwrap();
        assert!(collected.truncated);
        assert_eq!(collected.site, "http://example.com");
        assert_eq!(collected.findings.len(), 1);
        assert_eq!(collected.findings[0].name, "SQL Injection");
        assert_eq!(collected.findings[0].instances.len(), 2);
    }

    #[test]
    fn test_collect_missing_artifact_fails() {
        let err = collect_findings(Path::new("/nonexistent/zap-report.json")).unwrap_err();
        assert_eq!(err.classification(), "COLLECTION");
    }

    #[test]
    fn test_collect_garbage_fails() {
        let file = write_artifact("<html>definitely not the report</html>");
        let err = collect_findings(file.path()).unwrap_err();
        assert_eq!(err.classification(), "COLLECTION");
    }

    #[test]
    fn test_japanese_riskdesc() {
        let (severity, _) = parse_riskdesc("高 (High)");
        assert_eq!(severity, Severity::High);
        let (severity, _) = parse_riskdesc("中 (Medium)");
        assert_eq!(severity, Severity::Medium);
        let (severity, _) = parse_riskdesc("低 (Low)");
        assert_eq!(severity, Severity::Low);
        let (severity, _) = parse_riskdesc("情報 (Informational)");
        assert_eq!(severity, Severity::Informational);
    }

    #[test]
    fn test_informational_with_low_confidence() {
        let (severity, confidence) = parse_riskdesc("Informational (Low)");
        assert_eq!(severity, Severity::Informational);
        assert_eq!(confidence, Confidence::Low);
    }

    #[test]
    fn test_riskdesc_confidence() {
        assert_eq!(parse_riskdesc("High (Low)").1, Confidence::Low);
        assert_eq!(parse_riskdesc("Medium (High)").1, Confidence::High);
        assert_eq!(
            parse_riskdesc("Low (False Positive)").1,
            Confidence::FalsePositive
        );
        // no parenthetical: default Medium
        assert_eq!(parse_riskdesc("High").1, Confidence::Medium);
    }

    #[test]
    fn test_count_falls_back_to_instances() {
        let alert = ZapAlert {
            pluginid: "1".into(),
            alert: "A".into(),
            name: String::new(),
            riskdesc: "Low".into(),
            desc: String::new(),
            solution: String::new(),
            reference: String::new(),
            count: None,
            instances: vec![ZapInstance {
                uri: "http://example.com".into(),
                method: String::new(),
                param: String::new(),
                attack: String::new(),
                evidence: String::new(),
                otherinfo: String::new(),
            }],
        };
        let finding = convert_alert(alert);
        assert_eq!(finding.count, 1);
        assert_eq!(finding.instances[0].method, "GET");
    }

    #[test]
    fn test_reference_without_urls_kept_as_text() {
        let urls = extract_reference_urls("<p>See vendor advisory</p>");
        assert_eq!(urls, vec!["See vendor advisory"]);
        assert!(extract_reference_urls("").is_empty());
    }
}
