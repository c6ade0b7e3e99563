use std::fmt::Write;

use crate::models::{Manager, ManagerScorecard, PeriodSelector, Polarity, RankedManager};
use crate::period;

pub fn build_report(
    manager: &Manager,
    selector: &PeriodSelector,
    scorecard: &ManagerScorecard,
) -> String {
    let mut output = String::new();
    let stats = &scorecard.stats;

    let _ = writeln!(output, "# Manager Scorecard");
    let _ = writeln!(
        output,
        "Generated for {} ({}) covering {}",
        manager.full_name,
        manager.email,
        period::label(selector)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Totals");
    let _ = writeln!(output, "- Messages: {}", stats.total_messages);
    let _ = writeln!(output, "- Positive events: {}", stats.total_positive);
    let _ = writeln!(output, "- Negative events: {}", stats.total_negative);
    let _ = writeln!(output, "- Score: {}", stats.score);
    let _ = writeln!(
        output,
        "_Score is messages minus negative events; positive events are not added._"
    );

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly History");

    if scorecard.weekly.is_empty() {
        let _ = writeln!(output, "No activity recorded for this period.");
    } else {
        let _ = writeln!(output, "| Week | Messages | Positive | Negative | Score |");
        let _ = writeln!(output, "|------|----------|----------|----------|-------|");
        for bucket in &scorecard.weekly {
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} | {} |",
                bucket.week, bucket.messages, bucket.positive, bucket.negative, bucket.score
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Observations");

    if scorecard.observations.is_empty() {
        let _ = writeln!(output, "No notes recorded for this period.");
    } else {
        for entry in &scorecard.observations {
            let marker = match entry.polarity {
                Polarity::Positive => "+",
                Polarity::Negative => "-",
            };
            let repeat = if entry.multiplicity > 1 {
                format!(" (x{})", entry.multiplicity)
            } else {
                String::new()
            };
            let _ = writeln!(
                output,
                "- [{}] {} {}{}: {}",
                marker, entry.occurred_on, entry.category, repeat, entry.note
            );
        }
    }

    output
}

pub fn build_ranking(selector: &PeriodSelector, ranked: &[RankedManager], limit: usize) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Managers by score for {}:", period::label(selector));

    for entry in ranked.iter().take(limit) {
        let _ = writeln!(
            output,
            "{}. {} ({}) score {} from {} messages, {} negative, {} positive",
            entry.position,
            entry.manager_name,
            entry.manager_email,
            entry.stats.score,
            entry.stats.total_messages,
            entry.stats.total_negative,
            entry.stats.total_positive
        );
    }

    output
}
