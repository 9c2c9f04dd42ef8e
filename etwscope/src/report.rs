//! Plain-text rendering of an aggregate report

use std::fmt::Write;

use crate::report_data::{AggregateReport, SessionReport};

const BANNER: &str = "===== ETW Sessions and Consumers =====";

/// Render `report` for a terminal.
///
/// Sessions without consumer entries are listed only when `include_empty`
/// is set; the summary always counts every session.
#[must_use]
pub fn render_text(report: &AggregateReport, include_empty: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{BANNER}");
    let _ = writeln!(out);

    for session in &report.sessions {
        if session.consumers.is_empty() && !include_empty {
            continue;
        }
        render_session(&mut out, session);
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "Summary:");
    let _ = writeln!(out, "Total sessions: {}", report.total_sessions);
    let _ = writeln!(out, "Sessions with consumers: {}", report.sessions_with_consumers);
    let _ = writeln!(out, "Total consumers: {}", report.total_consumers);
    let _ = writeln!(out, "Resolved consumers: {}", report.resolved_consumers);
    out
}

fn render_session(out: &mut String, session: &SessionReport) {
    let logger = &session.logger;
    let _ = writeln!(out, "Session: {} (ID: {})", logger.name, logger.logger_id);
    let _ = writeln!(out, "Logger Context: {}", logger.address);
    if let Some(error) = &session.error {
        let _ = writeln!(out, "Unreadable: {error}");
        return;
    }
    let _ = writeln!(out, "Consumers ({}):", session.consumers.len());
    for consumer in &session.consumers {
        let _ = writeln!(
            out,
            "  - PID: {} ({})",
            consumer.identity.pid, consumer.identity.image_name
        );
        let _ = writeln!(
            out,
            "    Consumer: {}, EPROCESS: {}",
            consumer.node, consumer.process_object
        );
    }
}
