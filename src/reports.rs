//! Client for the external report generation service.
//!
//! Quarterly progress reports are rendered by a separate service; this
//! client posts the ids involved and returns the finished document
//! bytes. A failed call is abandoned and retried manually by invoking
//! the action again.

use reqwest::Client;
use serde::Serialize;

use crate::error::Error;
use crate::fetch::Fetch;

/// Input to one report generation call
#[derive(Debug, Clone, Serialize)]
pub struct ReportRequest {
    pub student_id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub program_id: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub educator_id: Option<i64>,

    /// Quarter label as shown on the report, for example `Q2 2023-24`
    pub quarter: String,
}

impl ReportRequest {
    pub fn new(student_id: i64, quarter: &str) -> Self {
        Self {
            student_id,
            program_id: None,
            educator_id: None,
            quarter: quarter.to_string(),
        }
    }

    /// Set the program the report covers
    pub fn with_program(mut self, program_id: i64) -> Self {
        self.program_id = Some(program_id);
        self
    }

    /// Set the educator signing the report
    pub fn with_educator(mut self, educator_id: i64) -> Self {
        self.educator_id = Some(educator_id);
        self
    }
}

/// Client for the report generation endpoint
pub struct ReportClient {
    /// Full URL of the generation endpoint
    url: String,

    /// HTTP client
    client: Client,
}

impl ReportClient {
    pub(crate) fn new(url: &str, client: Client) -> Self {
        Self {
            url: url.to_string(),
            client,
        }
    }

    /// Generate one report and return the document bytes
    pub async fn generate(&self, request: &ReportRequest) -> Result<Vec<u8>, Error> {
        Fetch::post(&self.client, &self.url)
            .json(request)?
            .execute_bytes()
            .await
            .map_err(|e| {
                Error::report(format!(
                    "report for student {} failed: {}",
                    request.student_id, e
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_ids_stay_out_of_the_request_body() {
        let request = ReportRequest::new(31, "Q2 2023-24").with_program(5);
        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["student_id"], 31);
        assert_eq!(body["program_id"], 5);
        assert_eq!(body["quarter"], "Q2 2023-24");
        assert!(body.get("educator_id").is_none());
    }

    #[tokio::test]
    async fn generate_returns_the_document_bytes() {
        let mut server = mockito::Server::new_async().await;
        let document = b"%PDF-1.7 report".to_vec();

        let mock = server
            .mock("POST", "/generate")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(document.clone())
            .create_async()
            .await;

        let client = ReportClient::new(&format!("{}/generate", server.url()), Client::new());
        let bytes = client
            .generate(&ReportRequest::new(31, "Q2 2023-24"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(bytes, document);
    }

    #[tokio::test]
    async fn failures_surface_as_report_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/generate")
            .with_status(502)
            .with_body("renderer offline")
            .create_async()
            .await;

        let client = ReportClient::new(&format!("{}/generate", server.url()), Client::new());
        let result = client
            .generate(&ReportRequest::new(31, "Q2 2023-24"))
            .await;

        match result {
            Err(Error::Report(message)) => {
                assert!(message.contains("31"));
                assert!(message.contains("502"));
            }
            other => panic!("expected a report error, got {:?}", other),
        }
    }
}
