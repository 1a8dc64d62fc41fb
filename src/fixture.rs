//! Base fixture for tests that allocate through the active memory resource

use crate::environment::allocator::ENVIRONMENT_NAME;
use crate::environment::AllocatorModeEnvironment;
use crate::error::{Error, Result};
use crate::memory::MemoryResourceHandle;

/// Per-test fixture exposing the memory resource of the running allocator
///
/// Tests allocate through [`BaseFixture::mr`] instead of reaching for the
/// allocator environment directly. The handle is only valid while the
/// environment the fixture was built from stays set up.
#[derive(Debug, Clone)]
pub struct BaseFixture {
    mr: MemoryResourceHandle,
}

impl BaseFixture {
    pub fn new(allocator: &AllocatorModeEnvironment) -> Result<Self> {
        let mr = allocator.resource().ok_or_else(|| Error::InvalidState {
            environment: ENVIRONMENT_NAME.to_string(),
            action: "provide a memory resource",
            state: allocator.state_name(),
        })?;
        Ok(Self { mr })
    }

    /// Memory resource for test allocations
    pub fn mr(&self) -> &MemoryResourceHandle {
        &self.mr
    }
}
