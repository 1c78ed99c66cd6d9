//! HttpMarketplace against a mock requester endpoint.

use std::time::Duration;

use mtools_marketplace::{
    AssignmentStatus, CreateHitWithHitTypeRequest, HttpMarketplace, Marketplace, MarketplaceError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpMarketplace {
    HttpMarketplace::new(server.uri(), Duration::from_secs(5)).unwrap()
}

fn target(action: &str) -> String {
    format!("MTurkRequesterServiceV20170117.{action}")
}

#[tokio::test]
async fn test_create_hit_sends_target_header() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("x-amz-target", target("CreateHITWithHITType").as_str()))
        .and(header("content-type", "application/x-amz-json-1.1"))
        .and(body_partial_json(json!({
            "HITTypeId": "HT-1",
            "MaxAssignments": 3,
            "UniqueRequestToken": "tok-1",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "HIT": { "HITId": "H-42", "HITTypeId": "HT-1" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = CreateHitWithHitTypeRequest {
        hit_type_id: "HT-1".into(),
        max_assignments: 3,
        lifetime_in_seconds: 86_400,
        question: "<QuestionForm/>".into(),
        requester_annotation: None,
        unique_request_token: Some("tok-1".into()),
    };

    let hit_id = client(&server).create_hit_with_hit_type(&request).await.unwrap();
    assert_eq!(hit_id, "H-42");
}

#[tokio::test]
async fn test_api_error_is_mapped() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "com.amazonaws.mturk#RequestError",
            "Message": "Assignment is not in Submitted state",
        })))
        .mount(&server)
        .await;

    let err = client(&server).approve_assignment("as-1").await.unwrap_err();

    match err {
        MarketplaceError::Api {
            action,
            status,
            code,
            message,
        } => {
            assert_eq!(action, "ApproveAssignment");
            assert_eq!(status, 400);
            assert_eq!(code, "RequestError");
            assert!(message.contains("Submitted"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_approve_accepts_empty_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", target("ApproveAssignment").as_str()))
        .and(body_partial_json(json!({ "AssignmentId": "as-7" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    client(&server).approve_assignment("as-7").await.unwrap();
}

#[tokio::test]
async fn test_reject_sends_feedback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", target("RejectAssignment").as_str()))
        .and(body_partial_json(json!({
            "AssignmentId": "as-9",
            "RequesterFeedback": "We detected no variability in your answers.",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server)
        .reject_assignment("as-9", "We detected no variability in your answers.")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_list_assignments_follows_next_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", target("ListAssignmentsForHIT").as_str()))
        .and(body_partial_json(json!({ "NextToken": "page-2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Assignments": [
                { "AssignmentId": "as-2", "WorkerId": "W2", "HITId": "H1", "AssignmentStatus": "Approved", "Answer": "" }
            ]
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", target("ListAssignmentsForHIT").as_str()))
        .and(body_partial_json(json!({
            "HITId": "H1",
            "AssignmentStatuses": ["Submitted", "Approved"],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Assignments": [
                { "AssignmentId": "as-1", "WorkerId": "W1", "HITId": "H1", "AssignmentStatus": "Submitted", "Answer": "" }
            ],
            "NextToken": "page-2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let assignments = client(&server)
        .list_assignments_for_hit("H1", &[AssignmentStatus::Submitted, AssignmentStatus::Approved])
        .await
        .unwrap();

    let ids: Vec<_> = assignments.iter().map(|a| a.assignment_id.as_str()).collect();
    assert_eq!(ids, vec!["as-1", "as-2"]);
    assert_eq!(assignments[1].status, AssignmentStatus::Approved);
}

#[tokio::test]
async fn test_list_reviewable_hits() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", target("ListReviewableHITs").as_str()))
        .and(body_partial_json(json!({ "Status": "Reviewable" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "NumResults": 2,
            "HITs": [{ "HITId": "H1" }, { "HITId": "H2" }],
        })))
        .mount(&server)
        .await;

    let hits = client(&server).list_reviewable_hits().await.unwrap();
    assert_eq!(hits, vec!["H1".to_string(), "H2".to_string()]);
}

#[tokio::test]
async fn test_undecodable_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Unexpected": true })))
        .mount(&server)
        .await;

    // HITs defaults to empty, so an unknown document still decodes.
    let hits = client(&server).list_reviewable_hits().await.unwrap();
    assert!(hits.is_empty());

    let err = client(&server)
        .create_hit_with_hit_type(&CreateHitWithHitTypeRequest {
            hit_type_id: "HT".into(),
            max_assignments: 1,
            lifetime_in_seconds: 60,
            question: String::new(),
            requester_annotation: None,
            unique_request_token: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, MarketplaceError::Decode { .. }));
}
