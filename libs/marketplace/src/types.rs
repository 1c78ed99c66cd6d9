//! Request and response documents.
//!
//! Field names follow the marketplace wire format (PascalCase, with `HIT`
//! spelled in capitals).

use serde::{Deserialize, Serialize};

/// Assignment review status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssignmentStatus {
    Submitted,
    Approved,
    Rejected,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::Approved => "Approved",
            Self::Rejected => "Rejected",
        }
    }
}

impl std::fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locale constraint on a qualification requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Locale {
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subdivision: Option<String>,
}

/// Worker qualification a HIT type requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QualificationRequirement {
    pub qualification_type_id: String,
    pub comparator: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integer_values: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale_values: Option<Vec<Locale>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actions_guarded: Option<String>,
}

/// `CreateHITType` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateHitTypeRequest {
    pub title: String,
    pub description: String,
    /// Reward per assignment in USD, e.g. `"0.50"`.
    pub reward: String,
    pub assignment_duration_in_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_approval_delay_in_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualification_requirements: Option<Vec<QualificationRequirement>>,
}

/// `CreateQualificationType` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateQualificationTypeRequest {
    pub name: String,
    pub description: String,
    #[serde(default = "default_qualification_status")]
    pub qualification_type_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_delay_in_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_duration_in_seconds: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_granted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_granted_value: Option<i64>,
}

fn default_qualification_status() -> String {
    "Active".to_string()
}

/// `CreateHITWithHITType` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateHitWithHitTypeRequest {
    #[serde(rename = "HITTypeId")]
    pub hit_type_id: String,
    #[serde(rename = "MaxAssignments")]
    pub max_assignments: u32,
    #[serde(rename = "LifetimeInSeconds")]
    pub lifetime_in_seconds: u64,
    /// QuestionForm XML.
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "RequesterAnnotation", skip_serializing_if = "Option::is_none")]
    pub requester_annotation: Option<String>,
    /// Idempotency token; a retried request with the same token is not
    /// posted twice.
    #[serde(rename = "UniqueRequestToken", skip_serializing_if = "Option::is_none")]
    pub unique_request_token: Option<String>,
}

/// A worker's assignment on a HIT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    #[serde(rename = "AssignmentId")]
    pub assignment_id: String,
    #[serde(rename = "WorkerId")]
    pub worker_id: String,
    #[serde(rename = "HITId")]
    pub hit_id: String,
    #[serde(rename = "AssignmentStatus")]
    pub status: AssignmentStatus,
    /// QuestionFormAnswers XML.
    #[serde(rename = "Answer", default)]
    pub answer: String,
}

// =============================================================================
// Wire responses
// =============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct CreateHitTypeResponse {
    #[serde(rename = "HITTypeId")]
    pub hit_type_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateQualificationTypeResponse {
    #[serde(rename = "QualificationType")]
    pub qualification_type: QualificationTypeSummary,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QualificationTypeSummary {
    #[serde(rename = "QualificationTypeId")]
    pub qualification_type_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateHitResponse {
    #[serde(rename = "HIT")]
    pub hit: HitSummary,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HitSummary {
    #[serde(rename = "HITId")]
    pub hit_id: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ListAssignmentsRequest<'a> {
    #[serde(rename = "HITId")]
    pub hit_id: &'a str,
    #[serde(rename = "MaxResults")]
    pub max_results: u32,
    #[serde(rename = "AssignmentStatuses")]
    pub statuses: &'a [AssignmentStatus],
    #[serde(rename = "NextToken", skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListAssignmentsResponse {
    #[serde(rename = "Assignments", default)]
    pub assignments: Vec<Assignment>,
    #[serde(rename = "NextToken", default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ListReviewableHitsRequest {
    #[serde(rename = "Status")]
    pub status: &'static str,
    #[serde(rename = "MaxResults")]
    pub max_results: u32,
    #[serde(rename = "NextToken", skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListReviewableHitsResponse {
    #[serde(rename = "HITs", default)]
    pub hits: Vec<HitSummary>,
    #[serde(rename = "NextToken", default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AssignmentDecision<'a> {
    #[serde(rename = "AssignmentId")]
    pub assignment_id: &'a str,
    #[serde(rename = "RequesterFeedback", skip_serializing_if = "Option::is_none")]
    pub requester_feedback: Option<&'a str>,
}
