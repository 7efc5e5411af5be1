//! JSON reporter for machine-readable output

use crate::analyzer::BatchResult;
use crate::CompositeResult;
use serde::Serialize;

/// Reporter for JSON output
pub struct JsonReporter {
    /// Whether to pretty-print JSON
    pretty: bool,
}

impl JsonReporter {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }

    /// Report a single analysis result as JSON
    pub fn report(&self, result: &CompositeResult) -> String {
        self.render(result, "{}")
    }

    /// Report a batch with its labels alongside the results
    pub fn report_batch(&self, labels: &[String], batch: &BatchResult) -> String {
        let output = JsonBatch { inputs: labels, batch };
        self.render(&output, "{}")
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T, fallback: &str) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|_| fallback.to_string())
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonBatch<'a> {
    inputs: &'a [String],
    #[serde(flatten)]
    batch: &'a BatchResult,
}
