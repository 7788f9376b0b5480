//! Extraction response.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ExtractError;
use crate::types::trace::UrlTrace;

/// Final result of an extraction request.
///
/// Failures carry the trace ledger accumulated up to the failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    #[serde(rename = "scrape_id")]
    pub scrape_id: Uuid,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub url_trace: Vec<UrlTrace>,

    /// HTTP-style status; not part of the body
    #[serde(skip, default = "ok_status")]
    status: u16,
}

fn ok_status() -> u16 {
    200
}

impl ExtractResponse {
    /// Successful (possibly partial) extraction.
    pub fn completed(
        scrape_id: Uuid,
        data: Option<serde_json::Value>,
        warning: Option<String>,
        url_trace: Vec<UrlTrace>,
    ) -> Self {
        Self {
            success: true,
            data,
            scrape_id,
            warning,
            error: None,
            url_trace,
            status: 200,
        }
    }

    /// Terminal failure.
    pub fn failed(scrape_id: Uuid, error: &ExtractError, url_trace: Vec<UrlTrace>) -> Self {
        Self {
            success: false,
            data: None,
            scrape_id,
            warning: None,
            error: Some(error.to_string()),
            url_trace,
            status: error.status_code(),
        }
    }

    /// HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// Trace for a URL, if present.
    pub fn trace(&self, url: &str) -> Option<&UrlTrace> {
        let key = crate::types::document::url_key(url);
        self.url_trace
            .iter()
            .find(|t| crate::types::document::url_key(&t.url) == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_response_keeps_trace() {
        let id = Uuid::new_v4();
        let trace = vec![UrlTrace::mapped("https://a.com")];
        let response = ExtractResponse::failed(id, &ExtractError::NoLinks, trace);

        assert!(!response.success);
        assert_eq!(response.status_code(), 400);
        assert_eq!(response.url_trace.len(), 1);
        assert!(response.error.unwrap().starts_with("No valid URLs"));
    }

    #[test]
    fn test_wire_shape() {
        let id = Uuid::new_v4();
        let response = ExtractResponse::completed(
            id,
            Some(serde_json::json!({"name": "Acme"})),
            None,
            vec![],
        );
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["scrape_id"], id.to_string());
        assert!(json["urlTrace"].is_array());
        assert!(json.get("status").is_none());
        assert!(json.get("warning").is_none());
    }
}
