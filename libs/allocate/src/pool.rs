//! The pool capability and an in-memory implementation.

use std::sync::Mutex;

use async_trait::async_trait;

/// Error type pools report from `fetch`.
pub type PoolError = Box<dyn std::error::Error + Send + Sync>;

/// A bounded, queryable source of unclaimed items.
#[async_trait]
pub trait Pool: Send + Sync {
    /// The allocatable unit. Must have a stable identity.
    type Item: Send;

    /// Human-readable pool name, used in logs and error reports.
    fn name(&self) -> &str;

    /// Return up to `n` currently unclaimed items.
    ///
    /// Must never return more than `n` items, and must never return an
    /// item the caller has already claimed.
    async fn fetch(&self, n: usize) -> Result<Vec<Self::Item>, PoolError>;
}

#[async_trait]
impl<P: Pool + ?Sized> Pool for Box<P> {
    type Item = P::Item;

    fn name(&self) -> &str {
        (**self).name()
    }

    async fn fetch(&self, n: usize) -> Result<Vec<Self::Item>, PoolError> {
        (**self).fetch(n).await
    }
}

/// In-memory pool backed by a vector of items.
///
/// `fetch` returns the first unclaimed items in insertion order without
/// removing them; [`MemoryPool::claim`] removes them. Every request size is
/// recorded so the fetch sequence can be inspected afterwards.
#[derive(Debug)]
pub struct MemoryPool<T> {
    name: String,
    state: Mutex<MemoryPoolState<T>>,
}

#[derive(Debug)]
struct MemoryPoolState<T> {
    items: Vec<T>,
    asks: Vec<usize>,
}

impl<T: Clone> MemoryPool<T> {
    /// Create a pool holding `items`.
    pub fn new(name: impl Into<String>, items: Vec<T>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(MemoryPoolState {
                items,
                asks: Vec::new(),
            }),
        }
    }

    /// Create a pool with no supply.
    pub fn empty(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Number of unclaimed items left.
    pub fn remaining(&self) -> usize {
        self.lock().items.len()
    }

    /// Request sizes passed to `fetch`, in call order.
    pub fn asks(&self) -> Vec<usize> {
        self.lock().asks.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryPoolState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone + PartialEq> MemoryPool<T> {
    /// Mark items as claimed so later fetches skip them.
    pub fn claim(&self, claimed: &[T]) {
        self.lock().items.retain(|item| !claimed.contains(item));
    }
}

#[async_trait]
impl<T> Pool for MemoryPool<T>
where
    T: Clone + Send + Sync,
{
    type Item = T;

    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, n: usize) -> Result<Vec<T>, PoolError> {
        let mut state = self.lock();
        state.asks.push(n);
        Ok(state.items.iter().take(n).cloned().collect())
    }
}
