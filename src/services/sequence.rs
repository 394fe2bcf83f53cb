use metrics::counter;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::errors::ServiceError;
use crate::repositories::SequenceStore;

/// How the trailing counter of a new identifier is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStrategy {
    /// Atomic per-prefix counter, seeded from the existing identifiers on first use
    #[default]
    Counter,
    /// Greatest existing identifier plus one; relies on the unique index and retries
    MaxScan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum SequenceKind {
    #[strum(serialize = "ORD")]
    Order,
    #[strum(serialize = "INV")]
    Invoice,
}

impl SequenceKind {
    pub fn prefix(self, year: i32) -> String {
        format!("{}-{}-", self, year)
    }
}

pub fn format_identifier(prefix: &str, counter: i64) -> String {
    format!("{}{:06}", prefix, counter)
}

/// Trailing counter of `identifier` when it carries `prefix`.
pub fn parse_counter(identifier: &str, prefix: &str) -> Option<i64> {
    identifier
        .strip_prefix(prefix)
        .filter(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse().ok())
}

/// Hands out `ORD-<year>-NNNNNN` and `INV-<year>-NNNNNN` identifiers.
///
/// The allocator only proposes values; the store's unique indexes decide. Callers wrap the
/// allocate-and-persist step in [`retry_on_collision`].
#[derive(Clone)]
pub struct SequenceAllocator {
    store: Arc<dyn SequenceStore>,
    strategy: SequenceStrategy,
}

impl SequenceAllocator {
    pub fn new(store: Arc<dyn SequenceStore>, strategy: SequenceStrategy) -> Self {
        Self { store, strategy }
    }

    pub fn strategy(&self) -> SequenceStrategy {
        self.strategy
    }

    pub async fn next_order_number(&self, year: i32) -> Result<String, ServiceError> {
        self.next(SequenceKind::Order, year).await
    }

    pub async fn next_invoice_number(&self, year: i32) -> Result<String, ServiceError> {
        self.next(SequenceKind::Invoice, year).await
    }

    #[instrument(skip(self), fields(strategy = ?self.strategy))]
    pub async fn next(&self, kind: SequenceKind, year: i32) -> Result<String, ServiceError> {
        let prefix = kind.prefix(year);
        let counter = match self.strategy {
            SequenceStrategy::MaxScan => self.greatest_counter(kind, &prefix).await? + 1,
            SequenceStrategy::Counter => self.next_from_counter(kind, &prefix).await?,
        };
        let identifier = format_identifier(&prefix, counter);
        debug!(identifier = %identifier, "Proposed identifier");
        Ok(identifier)
    }

    async fn greatest_counter(&self, kind: SequenceKind, prefix: &str) -> Result<i64, ServiceError> {
        let greatest = self.store.greatest_with_prefix(kind, prefix).await?;
        Ok(greatest
            .as_deref()
            .and_then(|identifier| parse_counter(identifier, prefix))
            .unwrap_or(0))
    }

    async fn next_from_counter(&self, kind: SequenceKind, prefix: &str) -> Result<i64, ServiceError> {
        if let Some(value) = self.store.increment_counter(prefix).await? {
            return Ok(value);
        }

        // First use of this prefix: continue after whatever already exists
        let seeded = self.greatest_counter(kind, prefix).await? + 1;
        match self.store.create_counter(prefix, seeded).await {
            Ok(()) => Ok(seeded),
            Err(ServiceError::SequenceCollision(_)) => self
                .store
                .increment_counter(prefix)
                .await?
                .ok_or_else(|| {
                    ServiceError::InternalError(format!("Counter {} vanished after creation", prefix))
                }),
            Err(e) => Err(e),
        }
    }
}

/// Runs `op` until it stops failing with `SequenceCollision`, at most `max_attempts` times.
/// `op` receives the 1-based attempt number. Exhaustion surfaces as `Conflict`.
pub async fn retry_on_collision<T, F, Fut>(max_attempts: u32, mut op: F) -> Result<T, ServiceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let attempts = max_attempts.max(1);
    let mut last_identifier = String::new();

    for attempt in 1..=attempts {
        match op(attempt).await {
            Err(ServiceError::SequenceCollision(identifier)) => {
                counter!("fresheats.sequence.collisions", 1);
                warn!(attempt, identifier = %identifier, "Identifier already taken, retrying");
                last_identifier = identifier;
            }
            other => return other,
        }
    }

    Err(ServiceError::Conflict(format!(
        "Could not allocate a unique identifier after {} attempts (last tried {})",
        attempts, last_identifier
    )))
}
