//! Reserve-carrying allocation across pools.
//!
//! Each pool is given the quota `total_slots / pools`. The quota is kept as
//! an exact fraction: all demand is tracked in units of `1 / pools`, so a
//! quota of 10/3 never loses its remainder to rounding. A pool is asked for
//! the ceiling of its fractional want; what it fails to supply (or the
//! credit from what it over-supplied) flows to the next pool.

use std::collections::HashSet;
use std::hash::Hash;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::error::{AllocateError, AllocateResult};
use crate::pool::Pool;

/// How many times pools may be visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PassMode {
    /// Visit each pool once, in order. Demand left after the last pool is
    /// reported as shortfall even if an earlier pool had spare supply.
    #[default]
    SinglePass,

    /// After the single pass, sweep the pools again in order asking for the
    /// remaining shortfall, until it is filled or a sweep finds nothing new.
    Rebalance,
}

impl std::fmt::Display for PassMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SinglePass => write!(f, "single-pass"),
            Self::Rebalance => write!(f, "rebalance"),
        }
    }
}

impl std::str::FromStr for PassMode {
    type Err = AllocateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-pass" | "single_pass" => Ok(Self::SinglePass),
            "rebalance" => Ok(Self::Rebalance),
            other => Err(AllocateError::Configuration(format!(
                "unknown pass mode '{other}' (expected single-pass or rebalance)"
            ))),
        }
    }
}

/// A demand for `total_slots` items in batches of `slots_per_batch`.
#[derive(Debug)]
pub struct AllocationRequest<'a, P> {
    pub total_slots: usize,
    pub slots_per_batch: usize,
    /// Pools in traversal order. Reserve flows from each pool to the next.
    pub pools: &'a [P],
}

impl<'a, P> AllocationRequest<'a, P> {
    pub fn new(total_slots: usize, slots_per_batch: usize, pools: &'a [P]) -> Self {
        Self {
            total_slots,
            slots_per_batch,
            pools,
        }
    }

    /// Number of batches a fully supplied allocation would produce.
    pub fn requested_batches(&self) -> usize {
        if self.slots_per_batch == 0 {
            return 0;
        }
        self.total_slots.div_ceil(self.slots_per_batch)
    }

    fn validate(&self) -> AllocateResult<()> {
        if self.slots_per_batch == 0 {
            return Err(AllocateError::Configuration(
                "slots_per_batch must be at least 1".to_string(),
            ));
        }
        if self.pools.is_empty() && self.total_slots > 0 {
            return Err(AllocateError::Configuration(format!(
                "{} slots requested but no pools were given",
                self.total_slots
            )));
        }
        Ok(())
    }
}

/// One `fetch` call made during an allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReport {
    pub pool: String,
    pub asked: usize,
    pub received: usize,
}

/// Outcome of an allocation.
#[derive(Debug, Clone)]
pub struct AllocationResult<T> {
    /// Shuffled items chunked into batches. Only the last may be short.
    pub batches: Vec<Vec<T>>,

    /// Slots no pool could fill.
    pub shortfall: usize,

    /// Every fetch made, in call order.
    pub pools: Vec<PoolReport>,
}

impl<T> AllocationResult<T> {
    fn empty() -> Self {
        Self {
            batches: Vec::new(),
            shortfall: 0,
            pools: Vec::new(),
        }
    }

    /// Total number of items allocated.
    pub fn allocated(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Returns true if every requested slot was filled.
    pub fn is_fulfilled(&self) -> bool {
        self.shortfall == 0
    }
}

/// Exact reserve bookkeeping, scaled by the number of pools.
///
/// With `k` pools the quota `total / k` becomes the integer `total`, and a
/// reserve of `r` items is stored as `r * k`.
#[derive(Debug)]
struct ReserveLedger {
    scaled_quota: i128,
    scale: i128,
    scaled_reserve: i128,
}

impl ReserveLedger {
    fn new(total_slots: usize, pool_count: usize) -> Self {
        Self {
            scaled_quota: total_slots as i128,
            scale: pool_count as i128,
            scaled_reserve: 0,
        }
    }

    /// Items to request from the next pool: `ceil(quota + reserve)`, or
    /// zero once accumulated credit covers the quota.
    fn next_ask(&self) -> usize {
        let want = self.scaled_quota + self.scaled_reserve;
        if want <= 0 {
            return 0;
        }
        ((want + self.scale - 1) / self.scale) as usize
    }

    /// Record what the pool supplied against `quota + reserve`.
    fn settle(&mut self, received: usize) {
        let want = self.scaled_quota + self.scaled_reserve;
        self.scaled_reserve = want - received as i128 * self.scale;
    }

    /// Whole slots still unfilled.
    fn shortfall(&self) -> usize {
        if self.scaled_reserve <= 0 {
            return 0;
        }
        (self.scaled_reserve / self.scale) as usize
    }
}

/// Allocates pool supply into fixed-size batches.
#[derive(Debug, Clone, Default)]
pub struct Allocator {
    mode: PassMode,
}

impl Allocator {
    /// Create an allocator with the given pass mode.
    pub fn new(mode: PassMode) -> Self {
        Self { mode }
    }

    /// Run one allocation.
    ///
    /// Pools are fetched strictly in sequence; a pool is never queried
    /// before the previous fetch has returned. Any fetch failure aborts the
    /// whole call.
    #[instrument(
        skip_all,
        fields(
            total_slots = request.total_slots,
            slots_per_batch = request.slots_per_batch,
            pool_count = request.pools.len(),
            mode = %self.mode,
        )
    )]
    pub async fn allocate<P, R>(
        &self,
        request: &AllocationRequest<'_, P>,
        rng: &mut R,
    ) -> AllocateResult<AllocationResult<P::Item>>
    where
        P: Pool,
        P::Item: Clone + Eq + Hash,
        R: Rng + ?Sized,
    {
        request.validate()?;

        if request.total_slots == 0 {
            debug!("Zero demand, no pools queried");
            return Ok(AllocationResult::empty());
        }

        let mut ledger = ReserveLedger::new(request.total_slots, request.pools.len());
        let mut collected = Vec::new();
        let mut reports = Vec::with_capacity(request.pools.len());
        let mut taken = Vec::with_capacity(request.pools.len());

        for pool in request.pools {
            let ask = ledger.next_ask();
            let got = fetch_bounded(pool, ask).await?;
            ledger.settle(got.len());

            debug!(
                pool = pool.name(),
                asked = ask,
                received = got.len(),
                "Fetched from pool"
            );

            reports.push(PoolReport {
                pool: pool.name().to_string(),
                asked: ask,
                received: got.len(),
            });
            taken.push(got.len());
            collected.extend(got);
        }

        let mut shortfall = ledger.shortfall();

        if self.mode == PassMode::Rebalance && shortfall > 0 {
            shortfall = rebalance(
                request.pools,
                &mut taken,
                &mut collected,
                &mut reports,
                shortfall,
            )
            .await?;
        }

        collected.shuffle(rng);
        let batches = chunk(collected, request.slots_per_batch);

        if shortfall > 0 {
            warn!(
                shortfall,
                requested_batches = request.requested_batches(),
                produced_batches = batches.len(),
                "Pools could not supply every requested slot; fewer items than requested were allocated"
            );
        } else {
            info!(batches = batches.len(), "Allocation fulfilled");
        }

        Ok(AllocationResult {
            batches,
            shortfall,
            pools: reports,
        })
    }
}

/// Sweep the pools again, in order, for the remaining demand.
///
/// A pool returns its unclaimed items from the front, so it is asked for
/// what it already gave plus what is still missing, and items already
/// collected are skipped by identity.
async fn rebalance<P>(
    pools: &[P],
    taken: &mut [usize],
    collected: &mut Vec<P::Item>,
    reports: &mut Vec<PoolReport>,
    mut remaining: usize,
) -> AllocateResult<usize>
where
    P: Pool,
    P::Item: Clone + Eq + Hash,
{
    let mut seen: HashSet<P::Item> = collected.iter().cloned().collect();

    while remaining > 0 {
        let mut progressed = false;

        for (pool, pool_taken) in pools.iter().zip(taken.iter_mut()) {
            if remaining == 0 {
                break;
            }

            let ask = pool_taken.saturating_add(remaining);
            let got = fetch_bounded(pool, ask).await?;
            let received = got.len();

            let fresh: Vec<_> = got
                .into_iter()
                .filter(|item| !seen.contains(item))
                .take(remaining)
                .collect();

            debug!(
                pool = pool.name(),
                asked = ask,
                received,
                new_items = fresh.len(),
                "Rebalance fetch"
            );

            reports.push(PoolReport {
                pool: pool.name().to_string(),
                asked: ask,
                received,
            });

            if fresh.is_empty() {
                continue;
            }

            progressed = true;
            remaining -= fresh.len();
            *pool_taken += fresh.len();
            seen.extend(fresh.iter().cloned());
            collected.extend(fresh);
        }

        if !progressed {
            break;
        }
    }

    Ok(remaining)
}

/// Fetch from a pool, rejecting responses larger than the request.
async fn fetch_bounded<P: Pool>(pool: &P, n: usize) -> AllocateResult<Vec<P::Item>> {
    let items = pool
        .fetch(n)
        .await
        .map_err(|source| AllocateError::PoolFetch {
            pool: pool.name().to_string(),
            source,
        })?;

    if items.len() > n {
        return Err(AllocateError::PoolFetch {
            pool: pool.name().to_string(),
            source: format!("returned {} items for a request of {}", items.len(), n).into(),
        });
    }

    Ok(items)
}

/// Split into consecutive batches of `size`. The last batch keeps the rest.
fn chunk<T>(items: Vec<T>, size: usize) -> Vec<Vec<T>> {
    let mut batches = Vec::with_capacity(items.len().div_ceil(size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{MemoryPool, PoolError};
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rstest::rstest;

    fn supply(prefix: &str, n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{prefix}{i}")).collect()
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn sizes<T>(result: &AllocationResult<T>) -> Vec<usize> {
        result.batches.iter().map(Vec::len).collect()
    }

    struct FailingPool;

    #[async_trait]
    impl Pool for FailingPool {
        type Item = String;

        fn name(&self) -> &str {
            "broken"
        }

        async fn fetch(&self, _n: usize) -> Result<Vec<String>, PoolError> {
            Err("connection reset".into())
        }
    }

    struct GreedyPool;

    #[async_trait]
    impl Pool for GreedyPool {
        type Item = String;

        fn name(&self) -> &str {
            "greedy"
        }

        async fn fetch(&self, n: usize) -> Result<Vec<String>, PoolError> {
            Ok(supply("g", n + 1))
        }
    }

    #[test]
    fn test_ledger_carries_fraction() {
        // 10 slots over 3 pools: quota 10/3
        let mut ledger = ReserveLedger::new(10, 3);
        assert_eq!(ledger.next_ask(), 4);
        ledger.settle(4);
        assert_eq!(ledger.next_ask(), 3);
        ledger.settle(3);
        assert_eq!(ledger.next_ask(), 3);
        ledger.settle(3);
        assert_eq!(ledger.shortfall(), 0);
    }

    #[test]
    fn test_ledger_credit_suppresses_asks() {
        // 1 slot over 3 pools: the first pool's item covers everyone
        let mut ledger = ReserveLedger::new(1, 3);
        assert_eq!(ledger.next_ask(), 1);
        ledger.settle(1);
        assert_eq!(ledger.next_ask(), 0);
        ledger.settle(0);
        assert_eq!(ledger.next_ask(), 0);
        ledger.settle(0);
        assert_eq!(ledger.shortfall(), 0);
    }

    #[test]
    fn test_chunk_keeps_short_tail() {
        let batches = chunk((0..7).collect::<Vec<_>>(), 3);
        assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
        assert!(chunk(Vec::<u8>::new(), 3).is_empty());
    }

    #[test]
    fn test_pass_mode_parse() {
        assert_eq!("single-pass".parse::<PassMode>().unwrap(), PassMode::SinglePass);
        assert_eq!("rebalance".parse::<PassMode>().unwrap(), PassMode::Rebalance);
        assert!("twice".parse::<PassMode>().is_err());
        assert_eq!(PassMode::default(), PassMode::SinglePass);
    }

    #[tokio::test]
    async fn test_scenario_exhausted_second_pool() {
        let pools = vec![MemoryPool::new("a", supply("a", 100)), MemoryPool::empty("b")];
        let request = AllocationRequest::new(10, 5, &pools);

        let result = Allocator::default().allocate(&request, &mut rng()).await.unwrap();

        assert_eq!(pools[0].asks(), vec![5]);
        assert_eq!(pools[1].asks(), vec![5]);
        assert_eq!(result.shortfall, 5);
        assert_eq!(sizes(&result), vec![5]);
        assert!(result.batches[0].iter().all(|item| item.starts_with('a')));
        assert!(!result.is_fulfilled());
    }

    #[tokio::test]
    async fn test_scenario_reserve_carried_forward() {
        let pools = vec![
            MemoryPool::new("a", supply("a", 2)),
            MemoryPool::new("b", supply("b", 100)),
        ];
        let request = AllocationRequest::new(10, 5, &pools);

        let result = Allocator::default().allocate(&request, &mut rng()).await.unwrap();

        assert_eq!(pools[0].asks(), vec![5]);
        assert_eq!(pools[1].asks(), vec![8]);
        assert_eq!(result.allocated(), 10);
        assert_eq!(result.shortfall, 0);
        assert_eq!(
            result.pools,
            vec![
                PoolReport { pool: "a".into(), asked: 5, received: 2 },
                PoolReport { pool: "b".into(), asked: 8, received: 8 },
            ]
        );
    }

    #[rstest]
    #[case::even_split(9, 3, 3, vec![3, 3, 3])]
    #[case::single_pool_short_tail(7, 3, 1, vec![3, 3, 1])]
    #[case::fractional_quota(10, 4, 3, vec![4, 4, 2])]
    #[case::batch_larger_than_demand(2, 5, 2, vec![2])]
    #[tokio::test]
    async fn test_batch_shapes_with_ample_supply(
        #[case] total: usize,
        #[case] per_batch: usize,
        #[case] pool_count: usize,
        #[case] expected: Vec<usize>,
    ) {
        let pools: Vec<_> = (0..pool_count)
            .map(|i| MemoryPool::new(format!("p{i}"), supply(&format!("p{i}-"), 100)))
            .collect();
        let request = AllocationRequest::new(total, per_batch, &pools);

        let result = Allocator::default().allocate(&request, &mut rng()).await.unwrap();

        assert_eq!(sizes(&result), expected);
        assert_eq!(result.shortfall, 0);
        for pool in &pools {
            assert_eq!(pool.asks().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_fractional_quota_asks_ceiling() {
        let pools: Vec<_> = (0..3)
            .map(|i| MemoryPool::new(format!("p{i}"), supply(&format!("p{i}-"), 100)))
            .collect();
        let request = AllocationRequest::new(10, 5, &pools);

        Allocator::default().allocate(&request, &mut rng()).await.unwrap();

        let asks: Vec<_> = pools.iter().flat_map(|p| p.asks()).collect();
        assert_eq!(asks, vec![4, 3, 3]);
    }

    #[rstest]
    #[case::single_pass(PassMode::SinglePass)]
    #[case::rebalance(PassMode::Rebalance)]
    #[tokio::test]
    async fn test_huge_demand_over_empty_pool_is_shortfall(#[case] mode: PassMode) {
        for total in [1usize << 40, usize::MAX] {
            let pools = vec![MemoryPool::<String>::empty("a")];
            let request = AllocationRequest::new(total, 10, &pools);

            let result = Allocator::new(mode).allocate(&request, &mut rng()).await.unwrap();

            assert!(result.batches.is_empty());
            assert_eq!(result.shortfall, total);
            assert_eq!(pools[0].asks()[0], total);
        }
    }

    #[tokio::test]
    async fn test_zero_demand_touches_no_pool() {
        let pools = vec![MemoryPool::new("a", supply("a", 3))];
        let request = AllocationRequest::new(0, 4, &pools);

        let result = Allocator::default().allocate(&request, &mut rng()).await.unwrap();

        assert!(result.batches.is_empty());
        assert_eq!(result.shortfall, 0);
        assert!(pools[0].asks().is_empty());
    }

    #[tokio::test]
    async fn test_zero_demand_without_pools() {
        let pools: Vec<MemoryPool<String>> = Vec::new();
        let request = AllocationRequest::new(0, 1, &pools);

        let result = Allocator::default().allocate(&request, &mut rng()).await.unwrap();
        assert!(result.batches.is_empty());
    }

    #[tokio::test]
    async fn test_demand_without_pools_is_configuration_error() {
        let pools: Vec<MemoryPool<String>> = Vec::new();
        let request = AllocationRequest::new(3, 1, &pools);

        let err = Allocator::default().allocate(&request, &mut rng()).await.unwrap_err();
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_configuration_error() {
        let pools = vec![MemoryPool::new("a", supply("a", 3))];
        let request = AllocationRequest::new(3, 0, &pools);

        let err = Allocator::default().allocate(&request, &mut rng()).await.unwrap_err();
        assert!(err.is_configuration());
        assert!(pools[0].asks().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_aborts_whole_call() {
        let pools: Vec<Box<dyn Pool<Item = String>>> = vec![
            Box::new(MemoryPool::new("a", supply("a", 10))),
            Box::new(FailingPool),
            Box::new(MemoryPool::new("c", supply("c", 10))),
        ];
        let request = AllocationRequest::new(9, 3, &pools);

        let err = Allocator::default().allocate(&request, &mut rng()).await.unwrap_err();

        assert_eq!(err.pool(), Some("broken"));
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_oversized_fetch_is_rejected() {
        let pools = vec![GreedyPool];
        let request = AllocationRequest::new(4, 2, &pools);

        let err = Allocator::default().allocate(&request, &mut rng()).await.unwrap_err();
        assert_eq!(err.pool(), Some("greedy"));
    }

    #[tokio::test]
    async fn test_same_seed_same_batches() {
        let pools = vec![
            MemoryPool::new("a", supply("a", 10)),
            MemoryPool::new("b", supply("b", 10)),
        ];
        let request = AllocationRequest::new(12, 4, &pools);
        let allocator = Allocator::default();

        let first = allocator
            .allocate(&request, &mut StdRng::seed_from_u64(99))
            .await
            .unwrap();
        let second = allocator
            .allocate(&request, &mut StdRng::seed_from_u64(99))
            .await
            .unwrap();

        assert_eq!(first.batches, second.batches);
    }

    #[tokio::test]
    async fn test_shuffle_preserves_item_set() {
        let pools = vec![
            MemoryPool::new("a", supply("a", 3)),
            MemoryPool::new("b", supply("b", 3)),
        ];
        let request = AllocationRequest::new(6, 4, &pools);

        let result = Allocator::default().allocate(&request, &mut rng()).await.unwrap();

        let mut items: Vec<_> = result.batches.into_iter().flatten().collect();
        items.sort();
        assert_eq!(items, vec!["a0", "a1", "a2", "b0", "b1", "b2"]);
    }

    #[tokio::test]
    async fn test_single_pass_leaves_earlier_surplus_unused() {
        let pools = vec![
            MemoryPool::new("a", supply("a", 100)),
            MemoryPool::new("b", supply("b", 1)),
        ];
        let request = AllocationRequest::new(10, 5, &pools);

        let result = Allocator::new(PassMode::SinglePass)
            .allocate(&request, &mut rng())
            .await
            .unwrap();

        assert_eq!(result.shortfall, 4);
        assert_eq!(result.allocated(), 6);
        assert_eq!(pools[0].asks(), vec![5]);
    }

    #[tokio::test]
    async fn test_rebalance_fills_from_earlier_pool() {
        let pools = vec![
            MemoryPool::new("a", supply("a", 100)),
            MemoryPool::new("b", supply("b", 1)),
        ];
        let request = AllocationRequest::new(10, 5, &pools);

        let result = Allocator::new(PassMode::Rebalance)
            .allocate(&request, &mut rng())
            .await
            .unwrap();

        assert_eq!(result.shortfall, 0);
        assert_eq!(sizes(&result), vec![5, 5]);
        assert_eq!(pools[0].asks(), vec![5, 9]);
        assert_eq!(pools[1].asks(), vec![5]);

        let mut items: Vec<_> = result.batches.into_iter().flatten().collect();
        items.sort();
        items.dedup();
        assert_eq!(items.len(), 10);
    }

    #[tokio::test]
    async fn test_rebalance_stops_when_supply_runs_out() {
        let pools = vec![
            MemoryPool::new("a", supply("a", 3)),
            MemoryPool::new("b", supply("b", 2)),
        ];
        let request = AllocationRequest::new(10, 5, &pools);

        let result = Allocator::new(PassMode::Rebalance)
            .allocate(&request, &mut rng())
            .await
            .unwrap();

        assert_eq!(result.allocated(), 5);
        assert_eq!(result.shortfall, 5);
    }
}
