//! Memory pooling for the pooled allocation mode
//!
//! Reduces the cost of the many short-lived allocations tests make by keeping
//! returned blocks in size-keyed free lists and handing them out again.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{
    align_up, zeroed_buffer, Allocation, AllocationMode, Ledger, MemoryResource, MemoryStats,
};
use crate::error::{Error, Result};

/// Configuration for the memory pool
#[derive(Debug, Clone)]
pub struct MemoryPoolConfig {
    /// Bytes reserved when the pool is created
    pub initial_size: usize,
    /// Maximum pool size in bytes
    pub max_size: usize,
    /// Minimum allocation size in bytes; every block is a multiple of it
    pub min_allocation_size: usize,
}

impl Default for MemoryPoolConfig {
    fn default() -> Self {
        Self {
            initial_size: 1024 * 1024,     // 1MB
            max_size: 256 * 1024 * 1024,   // 256MB
            min_allocation_size: 4096,     // 4KB
        }
    }
}

impl MemoryPoolConfig {
    /// Size of the chunks the initial reservation is split into
    ///
    /// `None` when the minimum allocation size is too large to form a chunk.
    pub fn chunk_size(&self) -> Option<usize> {
        self.min_allocation_size.checked_mul(16)
    }

    fn validate(&self) -> Result<()> {
        if self.min_allocation_size == 0 {
            return Err(Error::AllocatorInit(
                "minimum allocation size must be positive".to_string(),
            ));
        }
        if self.chunk_size().is_none() {
            return Err(Error::AllocatorInit(format!(
                "minimum allocation size {} is too large",
                self.min_allocation_size
            )));
        }
        if self.initial_size > self.max_size {
            return Err(Error::AllocatorInit(format!(
                "initial pool size {} exceeds maximum size {}",
                self.initial_size, self.max_size
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PoolState {
    /// Free blocks keyed by their size
    free_blocks: BTreeMap<usize, VecDeque<Box<[u8]>>>,
    ledger: Ledger,
    /// Bytes held by the pool, free or in use
    current_size: usize,
}

/// Memory resource that recycles blocks through a pool
#[derive(Debug)]
pub struct PoolMemoryResource {
    config: MemoryPoolConfig,
    state: Mutex<PoolState>,
    finalized: AtomicBool,
}

impl PoolMemoryResource {
    /// Create a new pool and reserve its initial size
    pub fn new(config: MemoryPoolConfig) -> Result<Self> {
        config.validate()?;

        let mut state = PoolState::default();
        expand_pool(&mut state, &config, config.initial_size)
            .map_err(|e| Error::AllocatorInit(e.to_string()))?;

        Ok(Self {
            config,
            state: Mutex::new(state),
            finalized: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &MemoryPoolConfig {
        &self.config
    }

    /// Bytes currently held by the pool
    pub fn current_size(&self) -> Result<usize> {
        Ok(self.state()?.current_size)
    }

    /// Number of blocks waiting to be reused
    pub fn free_block_count(&self) -> Result<usize> {
        Ok(self.state()?.free_blocks.values().map(VecDeque::len).sum())
    }

    fn state(&self) -> Result<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|_| Error::Allocation("memory pool lock poisoned".to_string()))
    }

    /// Align size to minimum allocation boundary
    fn align_size(&self, size: usize) -> Result<usize> {
        align_up(size, self.config.min_allocation_size)
    }
}

/// Reserve `additional_size` bytes as free chunks
fn expand_pool(
    state: &mut PoolState,
    config: &MemoryPoolConfig,
    additional_size: usize,
) -> Result<()> {
    if !fits(state.current_size, additional_size, config.max_size) {
        return Err(Error::Allocation(
            "cannot expand pool beyond maximum size".to_string(),
        ));
    }

    let chunk_size = config
        .chunk_size()
        .ok_or_else(|| Error::Allocation("pool chunk size overflows".to_string()))?;
    let num_chunks = additional_size / chunk_size;

    for _ in 0..num_chunks {
        let block = zeroed_buffer(chunk_size)?;
        state
            .free_blocks
            .entry(chunk_size)
            .or_default()
            .push_back(block);
    }

    state.current_size += num_chunks * chunk_size;
    log::debug!(
        "Memory pool reserved {} chunks of {} bytes",
        num_chunks,
        chunk_size
    );

    Ok(())
}

/// Whether `additional` more bytes keep the pool within `max_size`
fn fits(current_size: usize, additional: usize, max_size: usize) -> bool {
    current_size
        .checked_add(additional)
        .is_some_and(|total| total <= max_size)
}

/// Find the smallest free block that can hold `size` bytes
fn find_free_block(state: &mut PoolState, size: usize) -> Option<Box<[u8]>> {
    let (&block_size, _) = state
        .free_blocks
        .range(size..)
        .find(|(_, blocks)| !blocks.is_empty())?;

    let blocks = state.free_blocks.get_mut(&block_size)?;
    let block = blocks.pop_front();
    if blocks.is_empty() {
        state.free_blocks.remove(&block_size);
    }
    block
}

impl MemoryResource for PoolMemoryResource {
    fn mode(&self) -> AllocationMode {
        AllocationMode::Pooled
    }

    fn allocate(&self, bytes: usize) -> Result<Allocation> {
        if self.is_finalized() {
            return Err(Error::AllocatorUnavailable(
                "pool memory resource has been finalized".to_string(),
            ));
        }

        let aligned_size = self.align_size(bytes)?;
        let mut state = self.state()?;

        let buffer = match find_free_block(&mut state, aligned_size) {
            Some(mut block) => {
                block.fill(0);
                state.ledger.stats.cache_hits += 1;
                block
            }
            None => {
                if !fits(state.current_size, aligned_size, self.config.max_size) {
                    return Err(Error::Allocation(format!(
                        "memory pool size limit exceeded: {} + {} > {} bytes",
                        state.current_size, aligned_size, self.config.max_size
                    )));
                }
                let block = zeroed_buffer(aligned_size)?;
                state.current_size += aligned_size;
                state.ledger.stats.cache_misses += 1;
                block
            }
        };

        let allocation = Allocation::new(bytes, buffer);
        state.ledger.record_allocation(&allocation);
        state.ledger.stats.reserved_bytes = state.current_size;
        Ok(allocation)
    }

    fn deallocate(&self, allocation: Allocation) -> Result<()> {
        let mut state = self.state()?;
        let buffer = state.ledger.record_deallocation(allocation)?.into_buffer();

        // A finalized pool keeps no free lists
        if self.is_finalized() {
            state.current_size -= buffer.len();
            return Ok(());
        }

        state
            .free_blocks
            .entry(buffer.len())
            .or_default()
            .push_back(buffer);
        Ok(())
    }

    fn stats(&self) -> Result<MemoryStats> {
        let state = self.state()?;
        let mut stats = state.ledger.stats.clone();
        stats.reserved_bytes = state.current_size;
        Ok(stats)
    }

    fn finalize(&self) -> Result<()> {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return Err(Error::AllocatorFinalize(
                "pool memory resource was already finalized".to_string(),
            ));
        }

        let mut state = self.state()?;
        let released: usize = state
            .free_blocks
            .values()
            .flat_map(|blocks| blocks.iter().map(|b| b.len()))
            .sum();
        state.free_blocks.clear();
        state.current_size -= released;
        log::debug!("Memory pool released {} bytes", released);

        state.ledger.ensure_drained(AllocationMode::Pooled)
    }

    fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::SeqCst)
    }
}
