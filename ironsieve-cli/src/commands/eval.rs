//! `ironsieve eval` command handler

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;
use tracing::{info, warn};

use ironsieve_core::config::IronsieveConfig;
use ironsieve_core::event::Event;
use ironsieve_filter::{FilterChain, FilterDecision, StatisticsSnapshot};

use crate::cli::EvalArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

use super::{build_chain, collect_specs};

/// Execute the `eval` command.
pub async fn execute(
    args: EvalArgs,
    config_path: &std::path::Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let config = IronsieveConfig::load(config_path).await?;
    let specs = collect_specs(&config, args.filter_dir.as_deref()).await?;
    let chain = build_chain(&config, &specs)?;

    info!(
        input = %args.input.display(),
        filters = chain.len(),
        "evaluating events"
    );
    let content = tokio::fs::read_to_string(&args.input).await?;
    let mut report = evaluate_lines(
        &chain,
        &content,
        args.correlation_id.as_deref(),
        &args.input.display().to_string(),
    );
    chain.dispose();

    let malformed = report.malformed.len();
    if args.suppressed_only {
        report.events.retain(|v| !v.decision.is_pass());
    }
    writer.render(&report)?;

    if malformed > 0 {
        return Err(CliError::Input(format!(
            "{malformed} malformed event line(s) in {}",
            report.source
        )));
    }
    Ok(())
}

/// Run every JSON line through the chain and collect verdicts and statistics.
///
/// Blank lines and lines starting with `#` are skipped. Malformed lines are
/// reported and do not stop evaluation.
pub fn evaluate_lines(
    chain: &FilterChain,
    content: &str,
    correlation_id: Option<&str>,
    source: &str,
) -> EvalReport {
    let mut events = Vec::new();
    let mut malformed = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line_no = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let event: Event = match serde_json::from_str(trimmed) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed event");
                malformed.push(LineError {
                    line: line_no,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let cid = correlation_id.unwrap_or_else(|| event.correlation_id());
        let outcome = chain.evaluate(&event, cid);
        events.push(EventVerdict {
            line: line_no,
            id: event.id().to_owned(),
            event_type: event.event_type(),
            severity: event.severity().as_str(),
            source: event.source().to_owned(),
            decision: outcome.decision,
            deciding_filter: outcome.deciding_filter,
            reason: outcome.reason,
            modified_message: outcome.event.map(|e| e.message().to_owned()),
        });
    }

    EvalReport {
        source: source.to_owned(),
        summary: chain.statistics(),
        filters: chain.filter_statistics(),
        events,
        malformed,
    }
}

/// Result of a batch evaluation.
#[derive(Serialize)]
pub struct EvalReport {
    /// Input file
    pub source: String,
    /// Final-decision statistics for the whole batch
    pub summary: StatisticsSnapshot,
    /// Per-filter statistics
    pub filters: BTreeMap<String, StatisticsSnapshot>,
    /// Per-event verdicts
    pub events: Vec<EventVerdict>,
    /// Lines that could not be parsed
    pub malformed: Vec<LineError>,
}

#[derive(Serialize)]
pub struct EventVerdict {
    pub line: usize,
    pub id: String,
    pub event_type: &'static str,
    pub severity: &'static str,
    pub source: String,
    pub decision: FilterDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deciding_filter: Option<String>,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_message: Option<String>,
}

#[derive(Serialize)]
pub struct LineError {
    pub line: usize,
    pub error: String,
}

impl Render for EvalReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Evaluation: {}", self.source.bold())?;
        writeln!(w)?;
        writeln!(
            w,
            "{:<6} {:<6} {:<9} {:<32} {:<10} {}",
            "LINE", "TYPE", "SEVERITY", "SOURCE", "DECISION", "REASON"
        )?;
        writeln!(w, "{}", "-".repeat(96))?;

        for v in &self.events {
            let decision = match v.decision {
                FilterDecision::Allow => v.decision.as_str().green(),
                FilterDecision::Modify => v.decision.as_str().cyan(),
                FilterDecision::Defer => v.decision.as_str().yellow(),
                FilterDecision::Suppress => v.decision.as_str().red(),
            };
            let reason = match &v.deciding_filter {
                Some(filter) => format!("[{filter}] {}", v.reason),
                None => v.reason.clone(),
            };
            writeln!(
                w,
                "{:<6} {:<6} {:<9} {:<32} {:<10} {}",
                v.line, v.event_type, v.severity, v.source, decision, reason
            )?;
            if let Some(message) = &v.modified_message {
                writeln!(w, "{:<6} -> {}", "", message.dimmed())?;
            }
        }

        writeln!(w)?;
        let s = &self.summary;
        writeln!(
            w,
            "Summary: {} total, {} allowed, {} modified, {} suppressed, {} deferred",
            s.total.to_string().bold(),
            s.allowed.to_string().green(),
            s.modified.to_string().cyan(),
            s.suppressed.to_string().red(),
            s.deferred.to_string().yellow(),
        )?;

        if !self.filters.is_empty() {
            writeln!(w)?;
            writeln!(
                w,
                "{:<24} {:>8} {:>8} {:>8} {:>10} {:>8}",
                "FILTER", "TOTAL", "ALLOWED", "MODIFIED", "SUPPRESSED", "ERRORS"
            )?;
            for (name, st) in &self.filters {
                writeln!(
                    w,
                    "{:<24} {:>8} {:>8} {:>8} {:>10} {:>8}",
                    name,
                    st.total,
                    st.allowed,
                    st.modified,
                    st.suppressed + st.deferred,
                    st.errors
                )?;
            }
        }

        if !self.malformed.is_empty() {
            writeln!(w)?;
            for e in &self.malformed {
                writeln!(w, "  Line {}: {}", e.line, e.error.red())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ironsieve_core::types::Severity;
    use ironsieve_filter::{ChainOptions, LevelFilter};

    fn chain() -> FilterChain {
        let chain = FilterChain::new(&ChainOptions::default());
        chain
            .add_filter(Arc::new(LevelFilter::with_min_level("min-warning", Severity::Warning)))
            .unwrap();
        chain
    }

    const INPUT: &str = r#"
# comment
{"type": "log", "level": "info", "channel": "net", "message": "connected", "source_context": "App.Net"}
{"type": "alert", "severity": "critical", "source": "Db", "message": "down"}
not json
"#;

    #[test]
    fn evaluates_each_line_and_reports_malformed() {
        let report = evaluate_lines(&chain(), INPUT, None, "events.jsonl");
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.events[0].line, 3);
        assert_eq!(report.events[0].decision, FilterDecision::Suppress);
        assert_eq!(report.events[0].deciding_filter.as_deref(), Some("min-warning"));
        assert_eq!(report.events[1].decision, FilterDecision::Allow);
        assert_eq!(report.malformed.len(), 1);
        assert_eq!(report.malformed[0].line, 5);
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.filters["min-warning"].suppressed, 1);
    }

    #[test]
    fn text_rendering_lists_verdicts_and_summary() {
        colored::control::set_override(false);
        let report = evaluate_lines(&chain(), INPUT, Some("batch"), "events.jsonl");
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("Evaluation: events.jsonl"));
        assert!(output.contains("suppress"));
        assert!(output.contains("[min-warning]"));
        assert!(output.contains("Summary: 2 total, 1 allowed"));
        assert!(output.contains("Line 5:"));
    }

    #[test]
    fn json_report_shape() {
        let report = evaluate_lines(&chain(), INPUT, None, "events.jsonl");
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["events"][0]["decision"], "suppress");
        assert_eq!(json["events"][1]["severity"], "critical");
        assert!(json["events"][1].get("deciding_filter").is_none());
        assert_eq!(json["summary"]["total"], 2);
    }
}
