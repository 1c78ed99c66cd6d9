//! # mtools-allocate
//!
//! Allocation of question slots across a sequence of source pools.
//!
//! ## Model
//!
//! - A [`Pool`] is a named source of unclaimed items. Its supply is unknown
//!   until queried with [`Pool::fetch`].
//! - An [`AllocationRequest`] asks for `total_slots` items packed into
//!   batches of `slots_per_batch`, drawn from an ordered list of pools.
//! - Each pool is given an equal (possibly fractional) quota. Whatever a
//!   pool cannot supply is carried forward as reserve to the next pool.
//! - The collected items are shuffled and chunked into batches. Demand no
//!   pool could satisfy is reported as `shortfall`, never as an error.
//!
//! ## Invariants
//!
//! - `sum(len(batch)) + shortfall == total_slots`
//! - Every batch except the last holds exactly `slots_per_batch` items
//! - In [`PassMode::SinglePass`] each pool is fetched exactly once
//! - Zero demand never touches a pool
//!
//! The allocator only reads from pools. Persisting the claim on allocated
//! items, and serializing allocate-and-claim cycles against the same pools,
//! is the caller's job.

mod allocator;
mod error;
mod pool;

pub use allocator::{AllocationRequest, AllocationResult, Allocator, PassMode, PoolReport};
pub use error::{AllocateError, AllocateResult};
pub use pool::{MemoryPool, Pool, PoolError};
