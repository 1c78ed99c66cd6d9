//! HTTP JSON client for the requester API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{MarketplaceError, MarketplaceResult};
use crate::types::*;
use crate::Marketplace;

/// Prefix of the `X-Amz-Target` action header.
pub const TARGET_PREFIX: &str = "MTurkRequesterServiceV20170117";

const TARGET_HEADER: &str = "X-Amz-Target";
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Page size for list operations (the service maximum).
const PAGE_SIZE: u32 = 100;

/// Requester endpoint for a region. The sandbox endpoint accepts the same
/// calls without paying workers.
pub fn endpoint_for_region(region: &str, sandbox: bool) -> String {
    if sandbox {
        format!("https://mturk-requester-sandbox.{region}.amazonaws.com")
    } else {
        format!("https://mturk-requester.{region}.amazonaws.com")
    }
}

/// Marketplace client speaking the JSON 1.1 protocol.
#[derive(Debug, Clone)]
pub struct HttpMarketplace {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpMarketplace {
    /// Create a client for `endpoint` with a per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> MarketplaceResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Invoke one action and decode its response.
    async fn call<B, T>(&self, action: &str, body: &B) -> MarketplaceResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|source| MarketplaceError::Encode {
            action: action.to_string(),
            source,
        })?;

        debug!(action, bytes = payload.len(), "Calling marketplace");

        let response = self
            .client
            .post(format!("{}/", self.endpoint))
            .header(TARGET_HEADER, format!("{TARGET_PREFIX}.{action}"))
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            return Err(api_error(action, status.as_u16(), &bytes));
        }

        // Some actions answer with an empty body.
        let body: &[u8] = if bytes.is_empty() { b"{}" } else { &bytes };
        serde_json::from_slice(body).map_err(|source| MarketplaceError::Decode {
            action: action.to_string(),
            source,
        })
    }
}

/// Error document returned with non-2xx responses.
#[derive(Debug, Deserialize)]
struct ServiceErrorBody {
    #[serde(rename = "__type", default)]
    kind: Option<String>,
    #[serde(rename = "Message", alias = "message", default)]
    message: Option<String>,
}

fn api_error(action: &str, status: u16, body: &[u8]) -> MarketplaceError {
    let parsed: Option<ServiceErrorBody> = serde_json::from_slice(body).ok();
    let (code, message) = match parsed {
        Some(err) => (
            err.kind
                .map(|k| k.rsplit('#').next().unwrap_or_default().to_string())
                .unwrap_or_else(|| "unknown".to_string()),
            err.message.unwrap_or_else(|| "no message".to_string()),
        ),
        None => (
            "unknown".to_string(),
            String::from_utf8_lossy(body).into_owned(),
        ),
    };

    MarketplaceError::Api {
        action: action.to_string(),
        status,
        code,
        message,
    }
}

#[async_trait]
impl Marketplace for HttpMarketplace {
    #[instrument(skip_all, fields(title = %request.title))]
    async fn create_hit_type(&self, request: &CreateHitTypeRequest) -> MarketplaceResult<String> {
        let response: CreateHitTypeResponse = self.call("CreateHITType", request).await?;
        Ok(response.hit_type_id)
    }

    #[instrument(skip_all, fields(name = %request.name))]
    async fn create_qualification_type(
        &self,
        request: &CreateQualificationTypeRequest,
    ) -> MarketplaceResult<String> {
        let response: CreateQualificationTypeResponse =
            self.call("CreateQualificationType", request).await?;
        Ok(response.qualification_type.qualification_type_id)
    }

    #[instrument(skip_all, fields(hit_type_id = %request.hit_type_id))]
    async fn create_hit_with_hit_type(
        &self,
        request: &CreateHitWithHitTypeRequest,
    ) -> MarketplaceResult<String> {
        let response: CreateHitResponse = self.call("CreateHITWithHITType", request).await?;
        Ok(response.hit.hit_id)
    }

    #[instrument(skip(self, statuses))]
    async fn list_assignments_for_hit(
        &self,
        hit_id: &str,
        statuses: &[AssignmentStatus],
    ) -> MarketplaceResult<Vec<Assignment>> {
        let mut assignments = Vec::new();
        let mut next_token = None;

        loop {
            let request = ListAssignmentsRequest {
                hit_id,
                max_results: PAGE_SIZE,
                statuses,
                next_token: next_token.take(),
            };
            let page: ListAssignmentsResponse = self.call("ListAssignmentsForHIT", &request).await?;
            assignments.extend(page.assignments);

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        debug!(count = assignments.len(), "Listed assignments");
        Ok(assignments)
    }

    #[instrument(skip(self))]
    async fn list_reviewable_hits(&self) -> MarketplaceResult<Vec<String>> {
        let mut hit_ids = Vec::new();
        let mut next_token = None;

        loop {
            let request = ListReviewableHitsRequest {
                status: "Reviewable",
                max_results: PAGE_SIZE,
                next_token: next_token.take(),
            };
            let page: ListReviewableHitsResponse = self.call("ListReviewableHITs", &request).await?;
            hit_ids.extend(page.hits.into_iter().map(|h| h.hit_id));

            match page.next_token {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(hit_ids)
    }

    #[instrument(skip(self))]
    async fn approve_assignment(&self, assignment_id: &str) -> MarketplaceResult<()> {
        let request = AssignmentDecision {
            assignment_id,
            requester_feedback: None,
        };
        let _: IgnoredAny = self.call("ApproveAssignment", &request).await?;
        Ok(())
    }

    #[instrument(skip(self, feedback))]
    async fn reject_assignment(&self, assignment_id: &str, feedback: &str) -> MarketplaceResult<()> {
        let request = AssignmentDecision {
            assignment_id,
            requester_feedback: Some(feedback),
        };
        let _: IgnoredAny = self.call("RejectAssignment", &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_for_region() {
        assert_eq!(
            endpoint_for_region("us-east-1", true),
            "https://mturk-requester-sandbox.us-east-1.amazonaws.com"
        );
        assert_eq!(
            endpoint_for_region("us-east-1", false),
            "https://mturk-requester.us-east-1.amazonaws.com"
        );
    }

    #[test]
    fn test_api_error_extracts_code() {
        let body = br#"{"__type":"com.amazonaws.mturk#ServiceFault","Message":"try again"}"#;
        let err = api_error("CreateHITType", 500, body);

        match &err {
            MarketplaceError::Api { code, message, status, .. } => {
                assert_eq!(code, "ServiceFault");
                assert_eq!(message, "try again");
                assert_eq!(*status, 500);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.is_retryable());
    }

    #[test]
    fn test_api_error_with_plain_body() {
        let err = api_error("ApproveAssignment", 400, b"bad request");
        assert!(err.to_string().contains("bad request"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = HttpMarketplace::new("http://localhost:9000/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:9000");
    }
}
