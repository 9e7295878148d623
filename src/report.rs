// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Haavi - Scoring & Report Builder
 * Aggregates collected findings into a deterministic security score,
 * a letter grade and the final scan report.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use chrono::{DateTime, Utc};

use crate::config::ScanConfig;
use crate::types::{
    Finding, Grade, RunStatus, ScanReport, ScoreResult, Severity, SeverityGroup,
};

/// Linear penalty per finding. Simple on purpose: an operator must be able
/// to reconstruct the score by hand from the finding list.
const HIGH_PENALTY: i64 = 10;
const MEDIUM_PENALTY: i64 = 3;
const LOW_PENALTY: i64 = 1;

impl ScoreResult {
    /// Score one run's full finding sequence. Order-independent, clamped
    /// to [0, 100]; informational findings never move the score.
    pub fn from_findings(findings: &[Finding]) -> ScoreResult {
        let high = findings
            .iter()
            .filter(|f| f.severity == Severity::High)
            .count();
        let medium = findings
            .iter()
            .filter(|f| f.severity == Severity::Medium)
            .count();
        let low = findings
            .iter()
            .filter(|f| f.severity == Severity::Low)
            .count();
        let informational = findings
            .iter()
            .filter(|f| f.severity == Severity::Informational)
            .count();

        let raw = 100
            - HIGH_PENALTY * high as i64
            - MEDIUM_PENALTY * medium as i64
            - LOW_PENALTY * low as i64;
        let score = raw.clamp(0, 100) as u8;
        let grade = grade_for(score);

        ScoreResult {
            score,
            grade,
            grade_color: grade.color().to_string(),
            high_count: high,
            medium_count: medium,
            low_count: low,
            informational_count: informational,
        }
    }
}

fn grade_for(score: u8) -> Grade {
    match score {
        80..=100 => Grade::A,
        60..=79 => Grade::B,
        40..=59 => Grade::C,
        20..=39 => Grade::D,
        1..=19 => Grade::E,
        0 => Grade::F,
        _ => unreachable!("score is clamped to [0, 100]"),
    }
}

impl ScanReport {
    /// Assemble the final report for one run. Findings are grouped by
    /// severity, then ordered by affected URL inside each finding, so the
    /// narrative reads top-down from worst to informational.
    pub fn build(
        config: &ScanConfig,
        status: RunStatus,
        findings: Vec<Finding>,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> ScanReport {
        let score = ScoreResult::from_findings(&findings);
        let total_findings = findings.len();

        let mut groups: Vec<SeverityGroup> = Vec::new();
        for severity in [
            Severity::High,
            Severity::Medium,
            Severity::Low,
            Severity::Informational,
        ] {
            let mut in_group: Vec<Finding> = findings
                .iter()
                .filter(|f| f.severity == severity)
                .cloned()
                .collect();
            if in_group.is_empty() {
                continue;
            }
            in_group.sort_by(|a, b| a.name.cmp(&b.name));
            for finding in &mut in_group {
                finding.instances.sort_by(|a, b| a.uri.cmp(&b.uri));
            }
            groups.push(SeverityGroup {
                severity,
                findings: in_group,
            });
        }

        ScanReport {
            scan_id: format!("scan_{}", uuid::Uuid::new_v4()),
            target: config.target_url.to_string(),
            scan_type: config.scan_type,
            auth_mode: config.auth_mode,
            status,
            started_at: started_at.to_rfc3339(),
            completed_at: completed_at.to_rfc3339(),
            score,
            groups,
            total_findings,
        }
    }
}

/// Render the human-readable narrative for a scan report
pub fn render_markdown(report: &ScanReport) -> String {
    let mut md = String::new();

    md.push_str("# Haavi Security Scan Report\n\n");
    md.push_str(&format!("**Target:** {}\n\n", report.target));
    md.push_str(&format!("**Scan ID:** {}\n\n", report.scan_id));
    md.push_str(&format!("**Scan Type:** {}\n\n", report.scan_type));
    md.push_str(&format!("**Authentication:** {}\n\n", report.auth_mode));
    md.push_str(&format!("**Started:** {}\n\n", report.started_at));
    md.push_str(&format!("**Completed:** {}\n\n", report.completed_at));
    md.push_str(&format!("**Run Status:** {}\n\n", report.status));

    if report.status == RunStatus::TimedOut {
        md.push_str(
            "> The scan hit its wall-clock limit and was stopped. \
             Score and findings below are based on partial data.\n\n",
        );
    }

    md.push_str("---\n\n");
    md.push_str("## Security Score\n\n");
    md.push_str(&format!(
        "**{}/100** - Grade **{}**\n\n",
        report.score.score, report.score.grade
    ));
    md.push_str("| Severity | Count |\n");
    md.push_str("|----------|-------|\n");
    md.push_str(&format!("| High | {} |\n", report.score.high_count));
    md.push_str(&format!("| Medium | {} |\n", report.score.medium_count));
    md.push_str(&format!("| Low | {} |\n", report.score.low_count));
    md.push_str(&format!(
        "| Informational | {} |\n",
        report.score.informational_count
    ));
    md.push_str(&format!("| **Total** | **{}** |\n\n", report.total_findings));

    for group in &report.groups {
        md.push_str(&format!("## {} Findings\n\n", group.severity));
        for finding in &group.findings {
            md.push_str(&format!(
                "### {} (plugin {})\n\n",
                finding.name, finding.plugin_id
            ));
            md.push_str(&format!("**Confidence:** {}\n\n", finding.confidence));
            if !finding.description.is_empty() {
                md.push_str(&format!("{}\n\n", finding.description));
            }
            if !finding.instances.is_empty() {
                md.push_str("**Affected URLs:**\n\n");
                for instance in &finding.instances {
                    let mut line = format!("- `{}` {}", instance.method, instance.uri);
                    if let Some(param) = &instance.param {
                        line.push_str(&format!(" (param: {})", param));
                    }
                    if let Some(evidence) = &instance.evidence {
                        line.push_str(&format!(" - evidence: `{}`", evidence));
                    }
                    md.push_str(&line);
                    md.push('\n');
                }
                md.push('\n');
            }
            if !finding.solution.is_empty() {
                md.push_str(&format!("**Remediation:** {}\n\n", finding.solution));
            }
            if !finding.reference_urls.is_empty() {
                md.push_str("**References:**\n\n");
                for url in &finding.reference_urls {
                    md.push_str(&format!("- {}\n", url));
                }
                md.push('\n');
            }
        }
    }

    md
}
