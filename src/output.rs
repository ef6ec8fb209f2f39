//! Result types returned by the exporter.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a finished artifact can be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOutput {
    /// Public URL: `{base_url}/{folder}/{filename}`.
    pub url: String,

    /// Location on disk.
    pub path: PathBuf,

    /// Final filename relative to the export folder, after collision
    /// suffixing.
    pub filename: String,
}

impl ExportOutput {
    /// JSON payload handed back to tool callers: `{"url": "..."}`.
    pub fn to_response(&self) -> serde_json::Value {
        serde_json::json!({ "url": self.url })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_carries_only_the_url() {
        let out = ExportOutput {
            url: "http://h/files/export_x/a.pdf".into(),
            path: PathBuf::from("/tmp/export_x/a.pdf"),
            filename: "a.pdf".into(),
        };
        assert_eq!(
            out.to_response(),
            serde_json::json!({"url": "http://h/files/export_x/a.pdf"})
        );
    }
}
