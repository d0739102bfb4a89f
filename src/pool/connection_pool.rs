use super::RingBuffer;
use async_trait::async_trait;
use std::convert::Infallible;
use std::fmt;
use tracing::{debug, trace};

/// Creates and disposes of the resources a [`ConnectionPool`] hands out.
///
/// The pool never looks inside `T`; it could be a TCP stream, a file handle
/// or anything else a unit of work needs to borrow.
#[async_trait]
pub trait Factory<T>: Send + Sync {
    /// Build a fresh resource. `None` reports a creation failure; the pool
    /// passes it straight through to the caller without retrying.
    async fn create(&self) -> Option<T>;

    /// Dispose of a resource that will not be reused.
    fn destroy(&self, item: T);
}

/// Reuse layer over a [`RingBuffer`].
///
/// `get` prefers an idle resource and falls back to the factory. `release`
/// keeps healthy resources while there is room and destroys everything else,
/// so the pool never retains more than its capacity.
pub struct ConnectionPool<T, F> {
    factory: F,
    ring: RingBuffer<T>,
}

impl<T, F> ConnectionPool<T, F>
where
    T: Send,
    F: Factory<T>,
{
    pub fn new(factory: F, capacity: usize) -> Self {
        Self {
            factory,
            ring: RingBuffer::new(capacity),
        }
    }

    /// Borrow a resource, reusing an idle one when available.
    pub async fn get(&self) -> Option<T> {
        if let Some(item) = self.ring.get() {
            trace!("Reusing pooled resource");
            return Some(item);
        }
        self.factory.create().await
    }

    /// Hand a resource back after use.
    ///
    /// Returns `true` if the resource was retained for reuse. A resource
    /// released together with an error, or one that does not fit because the
    /// pool is at capacity, is destroyed instead.
    pub fn release<E>(&self, item: T, error: Option<&E>) -> bool
    where
        E: fmt::Display + ?Sized,
    {
        if let Some(err) = error {
            debug!("Destroying pooled resource released with error: {}", err);
            self.factory.destroy(item);
            return false;
        }
        match self.ring.push(item) {
            Ok(()) => true,
            Err(item) => {
                trace!("Pool at capacity; destroying surplus resource");
                self.factory.destroy(item);
                false
            }
        }
    }

    /// Release a resource that was used without error.
    pub fn recycle(&self, item: T) -> bool {
        self.release::<Infallible>(item, None)
    }

    /// Number of idle resources currently retained.
    pub fn idle(&self) -> usize {
        self.ring.len()
    }

    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Destroy every idle resource, returning how many were dropped.
    pub fn drain(&self) -> usize {
        let mut drained = 0;
        while let Some(item) = self.ring.get() {
            self.factory.destroy(item);
            drained += 1;
        }
        drained
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }
}

impl<T, F> fmt::Debug for ConnectionPool<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("ring", &self.ring)
            .finish_non_exhaustive()
    }
}
