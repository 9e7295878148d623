// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Haavi - Core Scan Types
 * Shared enums and wire types for scan requests, findings and reports
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use serde::{Deserialize, Serialize};

/// Scan type determines which engine jobs are generated for the run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    Baseline,
    Full,
    Api,
    Automation,
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Baseline => "baseline",
            ScanType::Full => "full",
            ScanType::Api => "api",
            ScanType::Automation => "automation",
        }
    }
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Authentication mode for the scanned application
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    None,
    Form,
    Json,
    Basic,
    Bearer,
}

impl AuthMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::None => "none",
            AuthMode::Form => "form",
            AuthMode::Json => "json",
            AuthMode::Basic => "basic",
            AuthMode::Bearer => "bearer",
        }
    }

    /// Form and JSON logins are driven through a headless browser
    pub fn is_browser_based(&self) -> bool {
        matches!(self, AuthMode::Form | AuthMode::Json)
    }
}

impl std::fmt::Display for AuthMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert risk level as reported by the engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Severity {
    High,
    Medium,
    Low,
    Informational,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "High",
            Severity::Medium => "Medium",
            Severity::Low => "Low",
            Severity::Informational => "Informational",
        }
    }

    /// Sort rank, most severe first
    pub fn rank(&self) -> u8 {
        match self {
            Severity::High => 0,
            Severity::Medium => 1,
            Severity::Low => 2,
            Severity::Informational => 3,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Engine confidence in an alert, parsed from the riskdesc field
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
    FalsePositive,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Confidence::High => write!(f, "High"),
            Confidence::Medium => write!(f, "Medium"),
            Confidence::Low => write!(f, "Low"),
            Confidence::FalsePositive => write!(f, "False Positive"),
        }
    }
}

/// One occurrence of an alert at a concrete URL
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingInstance {
    pub uri: String,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub other_info: Option<String>,
}

/// One raw alert collected from the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub plugin_id: String,
    pub name: String,
    pub severity: Severity,
    pub confidence: Confidence,
    pub description: String,
    pub solution: String,
    pub reference_urls: Vec<String>,
    pub instances: Vec<FindingInstance>,
    pub count: u32,
}

/// Terminal state of one supervised engine run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Completed,
    TimedOut,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "COMPLETED"),
            RunStatus::TimedOut => write!(f, "TIMED_OUT"),
            RunStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// Letter grade derived from the numeric security score
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Grade {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Grade {
    pub fn color(&self) -> &'static str {
        match self {
            Grade::A => "green",
            Grade::B => "blue",
            Grade::C => "yellow",
            Grade::D => "orange",
            Grade::E | Grade::F => "red",
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::E => "E",
            Grade::F => "F",
        };
        write!(f, "{}", letter)
    }
}

/// Deterministic score computed from one run's finding sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub score: u8,
    pub grade: Grade,
    pub grade_color: String,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub informational_count: usize,
}

/// Findings of one severity level, grouped for report readability
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeverityGroup {
    pub severity: Severity,
    pub findings: Vec<Finding>,
}

/// The final artifact of a scan run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub scan_id: String,
    pub target: String,
    pub scan_type: ScanType,
    pub auth_mode: AuthMode,
    pub status: RunStatus,
    pub started_at: String,
    pub completed_at: String,
    pub score: ScoreResult,
    pub groups: Vec<SeverityGroup>,
    pub total_findings: usize,
}
