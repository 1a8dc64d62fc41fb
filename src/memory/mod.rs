//! Pluggable memory resources backing test-time allocations
//!
//! A test run selects one [`AllocationMode`]; the allocator environment builds
//! the matching [`MemoryResource`] at setup and finalizes it at teardown.
//! Fixtures only ever see a [`MemoryResourceHandle`], which stops working once
//! the resource has been finalized.

mod direct;
mod memory_pool;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::error::{Error, Result};

pub use self::direct::DirectMemoryResource;
pub use self::memory_pool::{MemoryPoolConfig, PoolMemoryResource};

/// Mode string used when none is configured
pub const DEFAULT_ALLOCATION_MODE: &str = "pool";

static NEXT_ALLOCATION_ID: AtomicU64 = AtomicU64::new(1);

/// Memory-allocation strategy backing a test run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AllocationMode {
    /// Every request is served by a fresh allocation
    Plain,
    /// Requests are served from a growable pool of recycled blocks
    #[default]
    Pooled,
    /// Fresh allocations at page granularity
    Managed,
}

impl AllocationMode {
    pub const ALL: [AllocationMode; 3] = [
        AllocationMode::Plain,
        AllocationMode::Pooled,
        AllocationMode::Managed,
    ];

    /// Canonical configuration name of the mode
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationMode::Plain => "cuda",
            AllocationMode::Pooled => "pool",
            AllocationMode::Managed => "managed",
        }
    }
}

impl FromStr for AllocationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cuda" | "plain" => Ok(AllocationMode::Plain),
            "pool" | "pooled" => Ok(AllocationMode::Pooled),
            "managed" => Ok(AllocationMode::Managed),
            other => Err(Error::InvalidAllocationMode(other.to_string())),
        }
    }
}

impl fmt::Display for AllocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A block of memory handed out by a [`MemoryResource`]
///
/// Must be returned with [`MemoryResource::deallocate`]; a resource refuses to
/// finalize while allocations are outstanding.
pub struct Allocation {
    id: u64,
    size: usize,
    buffer: Box<[u8]>,
}

impl Allocation {
    fn new(size: usize, buffer: Box<[u8]>) -> Self {
        Self {
            id: NEXT_ALLOCATION_ID.fetch_add(1, Ordering::Relaxed),
            size,
            buffer,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Requested size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Size of the underlying block, at least [`size`](Self::size)
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..self.size]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buffer[..self.size]
    }

    fn into_buffer(self) -> Box<[u8]> {
        self.buffer
    }
}

impl fmt::Debug for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocation")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// Allocation statistics of a memory resource
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStats {
    /// Total number of allocations
    pub total_allocations: u64,
    /// Total number of deallocations
    pub total_deallocations: u64,
    /// Allocations served from recycled blocks
    pub cache_hits: u64,
    /// Allocations that needed a new block
    pub cache_misses: u64,
    /// Total bytes requested
    pub total_bytes_allocated: u64,
    /// Total bytes returned
    pub total_bytes_deallocated: u64,
    /// Allocations not yet returned
    pub outstanding_allocations: usize,
    /// Capacity of the allocations not yet returned
    pub outstanding_bytes: usize,
    /// Highest value `outstanding_bytes` has reached
    pub peak_bytes: usize,
    /// Bytes currently held by the resource, in use or not
    pub reserved_bytes: usize,
}

impl MemoryStats {
    pub fn avg_allocation_size(&self) -> f64 {
        if self.total_allocations == 0 {
            0.0
        } else {
            self.total_bytes_allocated as f64 / self.total_allocations as f64
        }
    }
}

/// Allocator backing a test run
pub trait MemoryResource: Send + Sync + fmt::Debug {
    fn mode(&self) -> AllocationMode;

    /// Allocate at least `bytes` bytes of zeroed memory
    fn allocate(&self, bytes: usize) -> Result<Allocation>;

    /// Return an allocation obtained from this resource
    fn deallocate(&self, allocation: Allocation) -> Result<()>;

    fn stats(&self) -> Result<MemoryStats>;

    /// Release everything the resource holds
    ///
    /// Fails if allocations are still outstanding or the resource was already
    /// finalized. The resource refuses further allocations either way.
    fn finalize(&self) -> Result<()>;

    fn is_finalized(&self) -> bool;
}

/// Builds the resource for `mode`
pub fn initialize(
    mode: AllocationMode,
    pool_config: &MemoryPoolConfig,
) -> Result<Arc<dyn MemoryResource>> {
    let resource: Arc<dyn MemoryResource> = match mode {
        AllocationMode::Plain => Arc::new(DirectMemoryResource::plain()),
        AllocationMode::Pooled => Arc::new(PoolMemoryResource::new(pool_config.clone())?),
        AllocationMode::Managed => Arc::new(DirectMemoryResource::managed()),
    };
    log::info!("Initialized {} memory resource", mode);
    Ok(resource)
}

/// Non-owning reference to the active memory resource
///
/// Handed to fixtures by the allocator environment. Once the environment has
/// been torn down every operation fails with [`Error::AllocatorUnavailable`].
#[derive(Clone)]
pub struct MemoryResourceHandle {
    mode: AllocationMode,
    inner: Weak<dyn MemoryResource>,
}

impl MemoryResourceHandle {
    pub(crate) fn new(resource: &Arc<dyn MemoryResource>) -> Self {
        Self {
            mode: resource.mode(),
            inner: Arc::downgrade(resource),
        }
    }

    pub fn mode(&self) -> AllocationMode {
        self.mode
    }

    /// Whether the referenced resource is still alive and not finalized
    pub fn is_valid(&self) -> bool {
        self.resource().is_ok()
    }

    /// The referenced resource, if it is still usable
    pub fn resource(&self) -> Result<Arc<dyn MemoryResource>> {
        match self.inner.upgrade() {
            Some(resource) if !resource.is_finalized() => Ok(resource),
            Some(_) => Err(Error::AllocatorUnavailable(format!(
                "{} memory resource has been finalized",
                self.mode
            ))),
            None => Err(Error::AllocatorUnavailable(format!(
                "{} memory resource has been released",
                self.mode
            ))),
        }
    }

    pub fn allocate(&self, bytes: usize) -> Result<Allocation> {
        self.resource()?.allocate(bytes)
    }

    pub fn deallocate(&self, allocation: Allocation) -> Result<()> {
        self.resource()?.deallocate(allocation)
    }

    pub fn stats(&self) -> Result<MemoryStats> {
        self.resource()?.stats()
    }
}

impl fmt::Debug for MemoryResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryResourceHandle")
            .field("mode", &self.mode)
            .field("valid", &self.is_valid())
            .finish()
    }
}

/// Bookkeeping shared by the resource implementations
#[derive(Debug, Default)]
struct Ledger {
    live: HashMap<u64, usize>,
    stats: MemoryStats,
}

impl Ledger {
    fn record_allocation(&mut self, allocation: &Allocation) {
        let capacity = allocation.capacity();
        self.live.insert(allocation.id(), capacity);

        self.stats.total_allocations += 1;
        self.stats.total_bytes_allocated += allocation.size() as u64;
        self.stats.outstanding_allocations = self.live.len();
        self.stats.outstanding_bytes += capacity;
        self.stats.peak_bytes = self.stats.peak_bytes.max(self.stats.outstanding_bytes);
    }

    /// Marks `allocation` as returned and hands it back for release
    ///
    /// An allocation this ledger never recorded is returned inside
    /// [`Error::ForeignAllocation`] so its owner can still take it back.
    fn record_deallocation(&mut self, allocation: Allocation) -> Result<Allocation> {
        let Some(capacity) = self.live.remove(&allocation.id()) else {
            return Err(Error::ForeignAllocation(Box::new(allocation)));
        };

        self.stats.total_deallocations += 1;
        self.stats.total_bytes_deallocated += allocation.size() as u64;
        self.stats.outstanding_allocations = self.live.len();
        self.stats.outstanding_bytes -= capacity;
        Ok(allocation)
    }

    fn ensure_drained(&self, mode: AllocationMode) -> Result<()> {
        if self.live.is_empty() {
            Ok(())
        } else {
            Err(Error::AllocatorFinalize(format!(
                "{} memory resource still has {} outstanding allocations ({} bytes)",
                mode,
                self.live.len(),
                self.stats.outstanding_bytes
            )))
        }
    }
}

/// Rounds `size` up to a multiple of `alignment`; zero-byte requests get one unit
fn align_up(size: usize, alignment: usize) -> Result<usize> {
    let units = size.max(1).div_ceil(alignment);
    units
        .checked_mul(alignment)
        .ok_or_else(|| Error::Allocation(format!("allocation of {size} bytes overflows")))
}

/// Zeroed buffer whose allocation failure is reported instead of aborting
fn zeroed_buffer(capacity: usize) -> Result<Box<[u8]>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(capacity)
        .map_err(|e| Error::Allocation(format!("failed to allocate {capacity} bytes: {e}")))?;
    buffer.resize(capacity, 0);
    Ok(buffer.into_boxed_slice())
}
