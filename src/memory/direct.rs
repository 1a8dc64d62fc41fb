use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{
    align_up, zeroed_buffer, Allocation, AllocationMode, Ledger, MemoryResource, MemoryStats,
};
use crate::error::{Error, Result};

/// Alignment of plain allocations
const PLAIN_ALIGNMENT: usize = 256;
/// Granularity of managed allocations
const MANAGED_PAGE_SIZE: usize = 4096;

/// Memory resource that serves every request with a fresh block
///
/// Used for both the plain and the managed mode; they differ only in the
/// granularity blocks are rounded up to.
#[derive(Debug)]
pub struct DirectMemoryResource {
    mode: AllocationMode,
    granularity: usize,
    ledger: Mutex<Ledger>,
    finalized: AtomicBool,
}

impl DirectMemoryResource {
    pub fn plain() -> Self {
        Self::with_granularity(AllocationMode::Plain, PLAIN_ALIGNMENT)
    }

    pub fn managed() -> Self {
        Self::with_granularity(AllocationMode::Managed, MANAGED_PAGE_SIZE)
    }

    fn with_granularity(mode: AllocationMode, granularity: usize) -> Self {
        Self {
            mode,
            granularity,
            ledger: Mutex::new(Ledger::default()),
            finalized: AtomicBool::new(false),
        }
    }

    pub fn granularity(&self) -> usize {
        self.granularity
    }

    fn ledger(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.ledger.lock().map_err(|_| {
            Error::Allocation(format!("{} memory resource lock poisoned", self.mode))
        })
    }
}

impl MemoryResource for DirectMemoryResource {
    fn mode(&self) -> AllocationMode {
        self.mode
    }

    fn allocate(&self, bytes: usize) -> Result<Allocation> {
        if self.is_finalized() {
            return Err(Error::AllocatorUnavailable(format!(
                "{} memory resource has been finalized",
                self.mode
            )));
        }

        let capacity = align_up(bytes, self.granularity)?;
        let allocation = Allocation::new(bytes, zeroed_buffer(capacity)?);

        let mut ledger = self.ledger()?;
        ledger.stats.cache_misses += 1;
        ledger.record_allocation(&allocation);
        ledger.stats.reserved_bytes = ledger.stats.outstanding_bytes;
        Ok(allocation)
    }

    fn deallocate(&self, allocation: Allocation) -> Result<()> {
        let mut ledger = self.ledger()?;
        drop(ledger.record_deallocation(allocation)?);
        ledger.stats.reserved_bytes = ledger.stats.outstanding_bytes;
        Ok(())
    }

    fn stats(&self) -> Result<MemoryStats> {
        Ok(self.ledger()?.stats.clone())
    }

    fn finalize(&self) -> Result<()> {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return Err(Error::AllocatorFinalize(format!(
                "{} memory resource was already finalized",
                self.mode
            )));
        }
        self.ledger()?.ensure_drained(self.mode)
    }

    fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }
}
