//! Metrics and observability utilities
//!
//! Records question-answering metrics through the `metrics` facade with
//! standardized naming. Nothing is exported unless the embedding
//! application installs a recorder.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all KBQA metrics
pub const METRICS_PREFIX: &str = "kbqa";

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_questions_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of questions answered"
    );

    describe_histogram!(
        format!("{}_answer_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "End-to-end answer latency in seconds"
    );

    describe_gauge!(
        format!("{}_answers_count", METRICS_PREFIX),
        Unit::Count,
        "Number of answers returned for the last question"
    );

    describe_gauge!(
        format!("{}_linked_entities_count", METRICS_PREFIX),
        Unit::Count,
        "Number of linked entities after fusion and expansion"
    );

    describe_counter!(
        format!("{}_root_fallback_total", METRICS_PREFIX),
        Unit::Count,
        "Questions answered through the root-entity fallback"
    );

    describe_counter!(
        format!("{}_constraint_match_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Constraint matcher failures recovered per candidate"
    );

    describe_counter!(
        format!("{}_pipeline_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Questions aborted by an error"
    );

    tracing::info!("Metrics registered");
}

/// Record a completed question
pub fn record_answer(duration_secs: f64, linked_count: usize, answer_count: usize, is_list: bool) {
    let kind = if is_list { "list" } else { "relation" };

    counter!(
        format!("{}_questions_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_answer_duration_seconds", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .record(duration_secs);

    gauge!(format!("{}_answers_count", METRICS_PREFIX)).set(answer_count as f64);
    gauge!(format!("{}_linked_entities_count", METRICS_PREFIX)).set(linked_count as f64);
}

/// Record an activation of the root-entity fallback
pub fn record_root_fallback(produced: usize) {
    let outcome = if produced > 0 { "answered" } else { "empty" };

    counter!(
        format!("{}_root_fallback_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a recovered constraint matcher failure
pub fn record_constraint_match_error() {
    counter!(format!("{}_constraint_match_errors_total", METRICS_PREFIX)).increment(1);
}

/// Record a question aborted by an error
pub fn record_pipeline_error(code: u16) {
    counter!(
        format!("{}_pipeline_errors_total", METRICS_PREFIX),
        "code" => code.to_string()
    )
    .increment(1);
}
