use trellis_types::ResponseBody;

use crate::error::EngineError;

/// Result of one lifecycle operation: report location, error and the
/// task's JSON output, any of which may be absent.
#[derive(Debug)]
pub struct OperationOutcome {
    pub report: Option<String>,
    pub error: Option<EngineError>,
    pub output: Option<serde_json::Value>,
    success_message: String,
}

impl OperationOutcome {
    pub(crate) fn completed(success_message: impl Into<String>) -> Self {
        Self {
            report: None,
            error: None,
            output: None,
            success_message: success_message.into(),
        }
    }

    pub fn failed(error: EngineError) -> Self {
        Self {
            report: error.report_url().map(String::from),
            error: Some(error),
            output: None,
            success_message: String::new(),
        }
    }

    pub(crate) fn with_report(mut self, report: Option<String>) -> Self {
        self.report = report;
        self
    }

    pub(crate) fn with_output(mut self, output: Option<serde_json::Value>) -> Self {
        self.output = output;
        self
    }

    pub(crate) fn with_error(mut self, error: Option<EngineError>) -> Self {
        self.error = error;
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Render as a `{ Code, Message, Output }` body.
    ///
    /// A successful run with a report answers with the report URL; an error
    /// always carries its own code.
    pub fn response(&self) -> ResponseBody {
        match (&self.error, &self.report) {
            (Some(error), Some(report)) => {
                let message = if error.report_url().is_some() {
                    error.to_string()
                } else {
                    format!("{error}. Report: {report}")
                };
                ResponseBody::error(error.code(), message).with_output(self.output.clone())
            }
            (Some(error), None) => error.response(),
            (None, Some(report)) => ResponseBody::ok(report.clone()).with_output(self.output.clone()),
            (None, None) => {
                ResponseBody::ok(self.success_message.clone()).with_output(self.output.clone())
            }
        }
    }
}
