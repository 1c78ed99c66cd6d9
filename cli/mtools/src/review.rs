//! Bulk approval of submitted work.

use mtools_marketplace::{AssignmentStatus, Marketplace, MarketplaceError};
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewReport {
    pub reviewable_hits: usize,
    pub approved: Vec<String>,
}

/// Approve every Submitted assignment of every reviewable HIT.
#[instrument(skip_all)]
pub async fn accept_all<M>(marketplace: &M) -> Result<ReviewReport, MarketplaceError>
where
    M: Marketplace + ?Sized,
{
    let hit_ids = marketplace.list_reviewable_hits().await?;
    info!(hits = hit_ids.len(), "Accepting all submitted assignments");

    let mut approved = Vec::new();
    for hit_id in &hit_ids {
        let assignments = marketplace
            .list_assignments_for_hit(hit_id, &[AssignmentStatus::Submitted])
            .await?;

        for assignment in assignments {
            debug!(%hit_id, assignment_id = %assignment.assignment_id, "Approving assignment");
            marketplace
                .approve_assignment(&assignment.assignment_id)
                .await?;
            approved.push(assignment.assignment_id);
        }
    }

    info!(approved = approved.len(), "Approval complete");
    Ok(ReviewReport {
        reviewable_hits: hit_ids.len(),
        approved,
    })
}
