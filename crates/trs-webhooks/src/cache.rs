//! Time-bounded cache of active webhook endpoints.
//!
//! The publish path consults the active endpoint set on every domain event;
//! the set is small and read-mostly, so a one-minute snapshot behind an
//! async `RwLock` is sufficient. Staleness is bounded: an endpoint change
//! takes effect within the TTL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use sqlx::PgPool;
use tokio::sync::RwLock;

use trs_db::WebhookEndpoint;

/// Default snapshot lifetime.
const DEFAULT_TTL: Duration = Duration::from_secs(60);

struct Snapshot {
    fetched_at: Instant,
    endpoints: Arc<Vec<WebhookEndpoint>>,
}

/// Cached view of endpoints eligible for delivery.
pub struct EndpointCache {
    pool: PgPool,
    ttl: Duration,
    inner: RwLock<Option<Snapshot>>,
}

impl EndpointCache {
    /// Create a cache with the default one-minute TTL.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_ttl(pool, DEFAULT_TTL)
    }

    /// Create a cache with a custom TTL (used by tests).
    #[must_use]
    pub fn with_ttl(pool: PgPool, ttl: Duration) -> Self {
        Self {
            pool,
            ttl,
            inner: RwLock::new(None),
        }
    }

    /// The current active endpoint set, refreshed from the database when the
    /// snapshot has expired.
    pub async fn active_endpoints(&self) -> Result<Arc<Vec<WebhookEndpoint>>, sqlx::Error> {
        {
            let guard = self.inner.read().await;
            if let Some(snapshot) = guard.as_ref() {
                if snapshot.fetched_at.elapsed() < self.ttl {
                    return Ok(snapshot.endpoints.clone());
                }
            }
        }

        let mut guard = self.inner.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(snapshot) = guard.as_ref() {
            if snapshot.fetched_at.elapsed() < self.ttl {
                return Ok(snapshot.endpoints.clone());
            }
        }

        let endpoints = Arc::new(WebhookEndpoint::find_active(&self.pool).await?);
        tracing::debug!(
            target: "webhook_delivery",
            count = endpoints.len(),
            "Refreshed active endpoint cache"
        );

        *guard = Some(Snapshot {
            fetched_at: Instant::now(),
            endpoints: endpoints.clone(),
        });

        Ok(endpoints)
    }

    /// Drop the snapshot so the next read refreshes immediately.
    pub async fn invalidate(&self) {
        *self.inner.write().await = None;
    }
}
