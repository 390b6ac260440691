//! Report message composition.
//!
//! Builds the MarkdownV2 report from token statistics, the declarative
//! security-check table, and the parsed audit issues. All functions here
//! are pure: identical input yields byte-identical output.

use super::types::{AuditIssue, AuditReport, TokenStatistics};
use crate::config::AUDIT_ISSUE_MAX_CHARS;
use serde_json::Value;

/// Audit section shown while generation is still in progress.
///
/// Stored pre-escaped so it can be embedded into (and later replaced
/// inside) a MarkdownV2 message verbatim.
pub const WAITING_GENERATION_AUDIT_MESSAGE: &str =
    "⏳ The AI audit report is being generated\\.\\.\\.";

/// Escape MarkdownV2 structural characters in free text.
///
/// # Examples
///
/// ```
/// use luckblock_bot::analyzer::format::escape_markdown;
/// assert_eq!(escape_markdown("a_b*c"), "a\\_b\\*c");
/// ```
#[must_use]
pub fn escape_markdown(text: &str) -> String {
    const STRUCTURAL: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
        '\\',
    ];

    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        if STRUCTURAL.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Escape text placed inside an inline-code entity, where only the
/// backtick and backslash are structural.
fn escape_code(text: &str) -> String {
    text.replace('\\', "\\\\").replace('`', "\\`")
}

/// Value extracted from the raw security map
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CheckValue {
    /// Boolean flag ("0"/"1" on the wire)
    Flag(bool),
    /// Fractional ratio, e.g. a 0.05 buy tax
    Ratio(f64),
}

/// A single entry of the declarative security-check table.
///
/// The table is data, not behavior: each entry names the raw field, how to
/// parse it, when the parsed value counts as a positive outcome, and how to
/// render the optional value detail.
pub struct SecurityCheck {
    /// Field name in the provider's security map
    pub field: &'static str,
    /// Human-readable label shown in the report
    pub label: &'static str,
    /// Extract a typed value from the raw JSON field
    pub parse: fn(&Value) -> Option<CheckValue>,
    /// Whether the value is a good outcome for the token holder
    pub is_positive: fn(CheckValue) -> bool,
    /// Render the value detail appended after the label (may be empty)
    pub format: fn(CheckValue) -> String,
}

fn parse_flag(value: &Value) -> Option<CheckValue> {
    match value {
        Value::Bool(b) => Some(CheckValue::Flag(*b)),
        Value::String(s) => match s.as_str() {
            "1" => Some(CheckValue::Flag(true)),
            "0" => Some(CheckValue::Flag(false)),
            _ => None,
        },
        Value::Number(n) => n.as_f64().map(|v| CheckValue::Flag(v != 0.0)),
        _ => None,
    }
}

fn parse_ratio(value: &Value) -> Option<CheckValue> {
    match value {
        Value::String(s) => s.parse::<f64>().ok().map(CheckValue::Ratio),
        Value::Number(n) => n.as_f64().map(CheckValue::Ratio),
        _ => None,
    }
}

fn flag_set(value: CheckValue) -> bool {
    matches!(value, CheckValue::Flag(true))
}

fn flag_clear(value: CheckValue) -> bool {
    matches!(value, CheckValue::Flag(false))
}

fn low_tax(value: CheckValue) -> bool {
    matches!(value, CheckValue::Ratio(r) if r <= 0.10)
}

fn no_detail(_: CheckValue) -> String {
    String::new()
}

fn tax_percent(value: CheckValue) -> String {
    match value {
        CheckValue::Ratio(r) => format!(": {:.0}%", r * 100.0),
        CheckValue::Flag(_) => String::new(),
    }
}

/// Security checks rendered into the report, in display order.
pub const SECURITY_CHECKS: &[SecurityCheck] = &[
    SecurityCheck {
        field: "is_open_source",
        label: "Contract source verified",
        parse: parse_flag,
        is_positive: flag_set,
        format: no_detail,
    },
    SecurityCheck {
        field: "is_honeypot",
        label: "Honeypot",
        parse: parse_flag,
        is_positive: flag_clear,
        format: no_detail,
    },
    SecurityCheck {
        field: "is_mintable",
        label: "Mintable",
        parse: parse_flag,
        is_positive: flag_clear,
        format: no_detail,
    },
    SecurityCheck {
        field: "is_proxy",
        label: "Upgradeable proxy",
        parse: parse_flag,
        is_positive: flag_clear,
        format: no_detail,
    },
    SecurityCheck {
        field: "can_take_back_ownership",
        label: "Ownership can be reclaimed",
        parse: parse_flag,
        is_positive: flag_clear,
        format: no_detail,
    },
    SecurityCheck {
        field: "hidden_owner",
        label: "Hidden owner",
        parse: parse_flag,
        is_positive: flag_clear,
        format: no_detail,
    },
    SecurityCheck {
        field: "selfdestruct",
        label: "Self-destruct",
        parse: parse_flag,
        is_positive: flag_clear,
        format: no_detail,
    },
    SecurityCheck {
        field: "external_call",
        label: "External calls",
        parse: parse_flag,
        is_positive: flag_clear,
        format: no_detail,
    },
    SecurityCheck {
        field: "transfer_pausable",
        label: "Transfers pausable",
        parse: parse_flag,
        is_positive: flag_clear,
        format: no_detail,
    },
    SecurityCheck {
        field: "is_blacklisted",
        label: "Blacklist",
        parse: parse_flag,
        is_positive: flag_clear,
        format: no_detail,
    },
    SecurityCheck {
        field: "buy_tax",
        label: "Buy tax",
        parse: parse_ratio,
        is_positive: low_tax,
        format: tax_percent,
    },
    SecurityCheck {
        field: "sell_tax",
        label: "Sell tax",
        parse: parse_ratio,
        is_positive: low_tax,
        format: tax_percent,
    },
];

fn format_usd(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000_000.0 {
        format!("${:.2}B", value / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("${:.2}M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("${:.2}K", value / 1_000.0)
    } else if abs >= 1.0 {
        format!("${value:.2}")
    } else {
        format!("${value:.6}")
    }
}

fn format_percent(value: f64) -> String {
    format!("{value:+.2}%")
}

fn format_count(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (digits.len() - idx) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Compose the full report message for a token.
///
/// The message accumulates a statistics section, a security section driven
/// by [`SECURITY_CHECKS`], and an audit section: the formatted issue list
/// when `audit` is present, otherwise [`WAITING_GENERATION_AUDIT_MESSAGE`].
#[must_use]
pub fn format_token_statistics(stats: &TokenStatistics, audit: Option<&AuditReport>) -> String {
    let mut message = String::new();

    message.push_str(&format!(
        "*{} \\({}\\)*\n",
        escape_markdown(&stats.name),
        escape_markdown(&stats.symbol)
    ));
    message.push_str(&format!("`{}`\n\n", escape_code(&stats.address)));

    message.push_str("📊 *Statistics*\n");
    push_stat(&mut message, "Price", &format_usd(stats.price_usd));
    push_stat(&mut message, "Market cap", &format_usd(stats.market_cap_usd));
    push_stat(&mut message, "Liquidity", &format_usd(stats.liquidity_usd));
    push_stat(&mut message, "Volume 24h", &format_usd(stats.volume_24h_usd));
    push_stat(
        &mut message,
        "Change 24h",
        &format_percent(stats.price_change_24h),
    );
    push_stat(&mut message, "Holders", &format_count(stats.holder_count));
    message.push('\n');

    message.push_str("🛡 *Security*\n");
    for check in SECURITY_CHECKS {
        let Some(raw) = stats.security.get(check.field) else {
            continue;
        };
        let Some(value) = (check.parse)(raw) else {
            continue;
        };
        let icon = if (check.is_positive)(value) {
            "✅"
        } else {
            "⚠️"
        };
        let detail = (check.format)(value);
        message.push_str(&format!(
            "{icon} {}{}\n",
            escape_markdown(check.label),
            escape_markdown(&detail)
        ));
    }
    message.push('\n');

    message.push_str("🤖 *AI Audit*\n");
    match audit {
        Some(report) if report.issues.is_empty() => {
            message.push_str("No issues found\\.\n");
        }
        Some(report) => {
            for (idx, issue) in report.issues.iter().enumerate() {
                message.push_str(&format_issue(idx + 1, issue));
            }
        }
        None => {
            message.push_str(WAITING_GENERATION_AUDIT_MESSAGE);
            message.push('\n');
        }
    }

    message.trim_end().to_string()
}

fn push_stat(message: &mut String, label: &str, value: &str) {
    message.push_str(&format!("• {label}: {}\n", escape_markdown(value)));
}

/// Render one audit issue block: index, title, severity tag, then the
/// description truncated to [`AUDIT_ISSUE_MAX_CHARS`] characters with an
/// ellipsis marker when anything was cut.
fn format_issue(index: usize, issue: &AuditIssue) -> String {
    let severity = issue.severity.as_deref().unwrap_or("info");
    let truncated = crate::utils::truncate_str(&issue.description, AUDIT_ISSUE_MAX_CHARS);
    let marker = if issue.description.chars().count() > AUDIT_ISSUE_MAX_CHARS {
        "…"
    } else {
        ""
    };

    format!(
        "{index}\\. *{}* \\[{}\\]\n{}{}\n",
        escape_markdown(&issue.title),
        escape_markdown(&severity.to_uppercase()),
        escape_markdown(&truncated),
        marker,
    )
}

/// Replace the waiting-for-audit section with a link to the web app, used
/// when generation fails and the report can no longer complete.
#[must_use]
pub fn with_audit_fallback(report: &str, webapp_url: &str) -> String {
    let fallback = format!("[Use our web app]({webapp_url}) to generate the audit report\\.");
    report.replace(WAITING_GENERATION_AUDIT_MESSAGE, &fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_statistics() -> TokenStatistics {
        TokenStatistics {
            name: "Mock Token".to_string(),
            symbol: "MOCK".to_string(),
            address: "0x00000000000000000000000000000000deadbeef".to_string(),
            price_usd: 0.004_217,
            market_cap_usd: 12_400_000.0,
            liquidity_usd: 384_000.0,
            volume_24h_usd: 95_200.0,
            price_change_24h: -3.41,
            holder_count: 10_432,
            security: json!({
                "is_open_source": "1",
                "is_honeypot": "0",
                "is_mintable": "1",
                "buy_tax": "0.05",
                "sell_tax": "0.25",
                "hidden_owner": "not a flag",
            }),
        }
    }

    #[test]
    fn test_escape_markdown_structural_set() {
        let input = "_*[]()~`>#+-=|{}.!\\";
        let escaped = escape_markdown(input);
        for ch in input.chars() {
            assert!(escaped.contains(&format!("\\{ch}")), "missing escape for {ch}");
        }
        assert_eq!(escape_markdown("plain text"), "plain text");
    }

    #[test]
    fn test_security_section_uses_declarative_table() {
        let message = format_token_statistics(&sample_statistics(), None);

        assert!(message.contains("✅ Contract source verified"));
        assert!(message.contains("✅ Honeypot"));
        assert!(message.contains("⚠️ Mintable"));
        assert!(message.contains("✅ Buy tax: 5%"));
        assert!(message.contains("⚠️ Sell tax: 25%"));
        // Unparseable field is skipped, absent fields too
        assert!(!message.contains("Hidden owner"));
        assert!(!message.contains("Blacklist"));
    }

    #[test]
    fn test_waiting_section_present_without_audit() {
        let message = format_token_statistics(&sample_statistics(), None);
        assert!(message.contains(WAITING_GENERATION_AUDIT_MESSAGE));
    }

    #[test]
    fn test_fallback_replaces_waiting_section() {
        let message = format_token_statistics(&sample_statistics(), None);
        let fallback = with_audit_fallback(&message, "https://app.luckblock.io/audit");

        assert!(!fallback.contains(WAITING_GENERATION_AUDIT_MESSAGE));
        assert!(fallback.contains("[Use our web app](https://app.luckblock.io/audit)"));
    }

    #[test]
    fn test_issue_blocks_truncated_and_escaped() {
        let long_description = "a_b".repeat(120); // 360 chars, full of underscores
        let report = AuditReport {
            issues: vec![
                AuditIssue {
                    severity: Some("high".to_string()),
                    title: "Owner can pause trading".to_string(),
                    description: long_description.clone(),
                },
                AuditIssue {
                    severity: None,
                    title: "Unchecked return value".to_string(),
                    description: "short".to_string(),
                },
            ],
        };

        let message = format_token_statistics(&sample_statistics(), Some(&report));

        assert!(message.contains("1\\. *Owner can pause trading* \\[HIGH\\]"));
        assert!(message.contains("2\\. *Unchecked return value* \\[INFO\\]"));
        assert!(message.contains('…'));
        assert!(!message.contains(WAITING_GENERATION_AUDIT_MESSAGE));

        // The truncated block keeps at most 200 original characters
        let truncated = crate::utils::truncate_str(&long_description, AUDIT_ISSUE_MAX_CHARS);
        assert!(message.contains(&escape_markdown(&truncated)));
        assert!(!message.contains(&escape_markdown(&long_description)));
    }

    #[test]
    fn test_empty_issue_list_reports_clean() {
        let report = AuditReport { issues: vec![] };
        let message = format_token_statistics(&sample_statistics(), Some(&report));
        assert!(message.contains("No issues found\\."));
    }

    #[test]
    fn test_formatting_is_idempotent() {
        let report = AuditReport {
            issues: vec![AuditIssue {
                severity: Some("medium".to_string()),
                title: "Fee can be changed".to_string(),
                description: "x".repeat(500),
            }],
        };
        let first = format_token_statistics(&sample_statistics(), Some(&report));
        let second = format_token_statistics(&sample_statistics(), Some(&report));
        assert_eq!(first, second);
    }

    #[test]
    fn test_usd_formatting_ranges() {
        assert_eq!(format_usd(2_340_000_000.0), "$2.34B");
        assert_eq!(format_usd(12_400_000.0), "$12.40M");
        assert_eq!(format_usd(384_000.0), "$384.00K");
        assert_eq!(format_usd(42.5), "$42.50");
        assert_eq!(format_usd(0.004_217), "$0.004217");
    }

    #[test]
    fn test_count_grouping() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(10_432), "10,432");
        assert_eq!(format_count(1_234_567), "1,234,567");
    }
}
