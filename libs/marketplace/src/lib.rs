//! # mtools-marketplace
//!
//! Requester-side access to the task marketplace.
//!
//! - [`Marketplace`] is the capability the rest of the system depends on.
//! - [`HttpMarketplace`] implements it over the JSON 1.1 wire format
//!   (`POST /` with an `X-Amz-Target` action header).
//!
//! Request signing is not performed here: the client talks to the
//! configured endpoint as-is, which is expected to be a signing proxy or a
//! sandbox double.

mod client;
mod error;
mod types;

use async_trait::async_trait;

pub use client::{endpoint_for_region, HttpMarketplace, TARGET_PREFIX};
pub use error::{MarketplaceError, MarketplaceResult};
pub use types::*;

/// Requester operations used by the campaign tooling.
#[async_trait]
pub trait Marketplace: Send + Sync {
    /// Register a HIT type. Returns its marketplace id.
    async fn create_hit_type(&self, request: &CreateHitTypeRequest) -> MarketplaceResult<String>;

    /// Register a qualification type. Returns its marketplace id.
    async fn create_qualification_type(
        &self,
        request: &CreateQualificationTypeRequest,
    ) -> MarketplaceResult<String>;

    /// Post a HIT under an existing HIT type. Returns the HIT id.
    async fn create_hit_with_hit_type(
        &self,
        request: &CreateHitWithHitTypeRequest,
    ) -> MarketplaceResult<String>;

    /// All assignments of a HIT in any of `statuses`, across every page.
    async fn list_assignments_for_hit(
        &self,
        hit_id: &str,
        statuses: &[AssignmentStatus],
    ) -> MarketplaceResult<Vec<Assignment>>;

    /// Ids of every reviewable HIT, across every page.
    async fn list_reviewable_hits(&self) -> MarketplaceResult<Vec<String>>;

    async fn approve_assignment(&self, assignment_id: &str) -> MarketplaceResult<()>;

    async fn reject_assignment(&self, assignment_id: &str, feedback: &str) -> MarketplaceResult<()>;
}
