//! Template analysis of recorded performance.

use crate::coach::{ErrorDetail, PerformanceSnapshot, Trend};

const TOP_KEYS: usize = 3;

/// Accuracy below which the coach recommends slowing down.
const ACCURACY_FLOOR: f64 = 90.0;

/// Speed below which the coach recommends rhythm work.
const SPEED_FLOOR: f64 = 30.0;

/// Multi-line summary of the statistics and the most error-prone keys,
/// ending with a recommendation.
#[must_use]
pub fn analysis_summary(snapshot: &PerformanceSnapshot, errors: Option<&ErrorDetail>) -> String {
    if !snapshot.has_sessions() {
        return format!(
            "Sessions completed: 0\nThere is nothing to analyze yet.\nRecommendation: {}",
            recommendation(snapshot, errors)
        );
    }

    let mut lines = vec![
        format!("Sessions completed: {}", snapshot.session_count),
        format!("Average speed: {:.0} WPM", snapshot.average_wpm),
        format!("Average accuracy: {:.0}%", snapshot.average_accuracy),
    ];
    if snapshot.trend != Trend::Unknown {
        lines.push(format!("Trend: {}", snapshot.trend.as_str()));
    }

    let keys = error_prone_keys(snapshot, errors);
    if !keys.is_empty() {
        lines.push(format!("Most error-prone keys: {}", keys.join(", ")));
    }

    lines.push(format!("Recommendation: {}", recommendation(snapshot, errors)));
    lines.join("\n")
}

/// One actionable sentence for the user's current level.
#[must_use]
pub fn recommendation(snapshot: &PerformanceSnapshot, errors: Option<&ErrorDetail>) -> String {
    if !snapshot.has_sessions() {
        return "complete a short practice session so there is a baseline to work from."
            .to_string();
    }
    if snapshot.average_accuracy < ACCURACY_FLOOR {
        return "slow down slightly and aim for accuracy above 90% before pushing speed."
            .to_string();
    }
    let keys = error_prone_keys(snapshot, errors);
    if let Some(first) = keys.first() {
        let key = first.split_whitespace().next().unwrap_or(first.as_str());
        return format!("practice a short key drill focused on '{key}' to clean up your weakest key.");
    }
    if snapshot.average_wpm < SPEED_FLOOR {
        return "build rhythm with ten minutes of daily drills on the home row.".to_string();
    }
    "try longer passages to push your pace while keeping accuracy steady.".to_string()
}

/// Up to three keys, from the last session's errors when available,
/// otherwise from the snapshot's weak keys.
fn error_prone_keys(snapshot: &PerformanceSnapshot, errors: Option<&ErrorDetail>) -> Vec<String> {
    let from_errors: Vec<String> = errors
        .map(|e| {
            e.top_error_keys(TOP_KEYS)
                .into_iter()
                .map(|(key, count)| format!("{key} ({count})"))
                .collect()
        })
        .unwrap_or_default();

    if from_errors.is_empty() {
        snapshot
            .weak_keys
            .iter()
            .filter(|k| !k.trim().is_empty())
            .take(TOP_KEYS)
            .cloned()
            .collect()
    } else {
        from_errors
    }
}
