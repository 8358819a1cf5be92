// Terminal rendering of outcomes.

use gridask_engine::render::render_table;
use gridask_query::{Outcome, ResultData, Tier};

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub max_rows: usize,
    /// Print generated or equivalent code under the result
    pub show_code: bool,
}

pub fn render_data(data: &ResultData, max_rows: usize) -> String {
    match data {
        ResultData::Scalar(s) => s.clone(),
        ResultData::Table(ds) => render_table(ds, max_rows),
        ResultData::Sequence(items) => items.join("\n"),
    }
}

/// Human-readable rendering. Failures go through [`render_failure`].
pub fn render_outcome(outcome: &Outcome, opts: RenderOptions) -> String {
    let Some(data) = outcome.data() else {
        return render_failure(outcome);
    };

    let mut out = render_data(data, opts.max_rows);
    if let Some(explanation) = outcome.explanation().filter(|e| !e.is_empty()) {
        out.push_str("\n\n");
        out.push_str(explanation);
    }
    if opts.show_code {
        if let Some(code) = outcome.generated_code().or(outcome.code()) {
            let label = match outcome.tier() {
                Some(Tier::AiResolved) => "generated code",
                _ => "code",
            };
            out.push_str(&format!("\n\n-- {} --\n{}", label, code));
        }
    }
    out
}

pub fn render_failure(outcome: &Outcome) -> String {
    match (outcome.error_kind(), outcome.error_message()) {
        (Some(kind), Some(message)) => format!("[{}] {}", kind.as_str(), message),
        _ => outcome.summary(),
    }
}

pub fn render_json(outcome: &Outcome) -> String {
    serde_json::to_string_pretty(outcome).unwrap_or_else(|e| {
        format!("{{\"success\": false, \"error_message\": \"serialization failed: {}\"}}", e)
    })
}
