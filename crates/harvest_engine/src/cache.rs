use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use harvest_core::{Query, QuerySignature};
use harvest_logging::{harvest_debug, harvest_info};

use crate::{HarvestError, HarvestResult, Harvester, ProgressSink};

const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct CacheEntry {
    result: Arc<HarvestResult>,
    expires_at: Instant,
}

/// Per-signature slot. Holding its lock across a harvest is what makes
/// concurrent callers for one signature share a single harvest.
///
/// A slot stays in the map while anyone holds a clone of it; `generation`
/// moves on each invalidation so a harvest already running does not store
/// its result.
#[derive(Default)]
struct SlotState {
    entry: tokio::sync::Mutex<Option<CacheEntry>>,
    generation: AtomicU64,
}

type Slot = Arc<SlotState>;

/// Memoizes complete harvests by query signature for a time-to-live.
///
/// Only complete results are stored: failed harvests and best-effort
/// results with missing offsets are returned to the caller but never cached.
pub struct HarvestCache {
    harvester: Harvester,
    clock: Arc<dyn Clock>,
    slots: Mutex<HashMap<QuerySignature, Slot>>,
}

impl HarvestCache {
    pub fn new(harvester: Harvester) -> Self {
        Self::with_clock(harvester, Arc::new(SystemClock))
    }

    pub fn with_clock(harvester: Harvester, clock: Arc<dyn Clock>) -> Self {
        Self {
            harvester,
            clock,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn harvester(&self) -> &Harvester {
        &self.harvester
    }

    pub async fn get_or_harvest(
        &self,
        query: &Query,
        ttl: Duration,
        sink: &dyn ProgressSink,
    ) -> Result<Arc<HarvestResult>, HarvestError> {
        query.validate()?;
        let signature = query.signature();
        let slot = self.slot(&signature);
        let mut entry = slot.entry.lock().await;

        if let Some(live) = entry.as_ref().filter(|e| e.expires_at > self.clock.now()) {
            harvest_debug!("cache hit for {}", signature.short());
            return Ok(Arc::clone(&live.result));
        }

        harvest_info!("cache miss for {}, harvesting", signature.short());
        let generation = slot.generation.load(Ordering::Acquire);
        *entry = None;
        let result = Arc::new(self.harvester.harvest(query, sink).await?);
        if !result.is_complete() {
            return Ok(result);
        }
        if slot.generation.load(Ordering::Acquire) != generation {
            harvest_debug!(
                "cache entry for {} invalidated during harvest, not stored",
                signature.short()
            );
            return Ok(result);
        }
        let now = self.clock.now();
        *entry = Some(CacheEntry {
            result: Arc::clone(&result),
            expires_at: now.checked_add(ttl).unwrap_or(now + MAX_TTL),
        });
        Ok(result)
    }

    /// A live cached result, without harvesting. Returns `None` while a
    /// harvest for the signature is in flight.
    pub fn cached(&self, signature: &QuerySignature) -> Option<Arc<HarvestResult>> {
        let slot = self.lock_slots().get(signature).cloned()?;
        let entry = slot.entry.try_lock().ok()?;
        entry
            .as_ref()
            .filter(|e| e.expires_at > self.clock.now())
            .map(|e| Arc::clone(&e.result))
    }

    /// Drop the entry for `signature`. A harvest already in flight finishes
    /// for its callers but its result is not stored. Returns whether there
    /// was an entry or a harvest to invalidate.
    ///
    /// The slot itself stays, so callers already queued on it keep sharing
    /// one harvest.
    pub fn invalidate(&self, signature: &QuerySignature) -> bool {
        let Some(slot) = self.lock_slots().get(signature).cloned() else {
            return false;
        };
        slot.generation.fetch_add(1, Ordering::AcqRel);
        let invalidated = match slot.entry.try_lock() {
            Ok(mut entry) => entry.take().is_some(),
            Err(_) => true,
        };
        invalidated
    }

    /// Remove slots whose entry is expired or empty and that no caller holds.
    /// Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut slots = self.lock_slots();
        let before = slots.len();
        slots.retain(|_, slot| {
            // Clones are only taken under the map lock, so a count of one
            // means no caller is between `slot()` and locking the entry.
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.entry.try_lock() {
                Ok(entry) => entry.as_ref().is_some_and(|e| e.expires_at > now),
                Err(_) => true,
            }
        });
        before - slots.len()
    }

    fn slot(&self, signature: &QuerySignature) -> Slot {
        Arc::clone(self.lock_slots().entry(signature.clone()).or_default())
    }

    fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<QuerySignature, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
