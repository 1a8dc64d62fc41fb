use std::sync::Arc;

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::memory::{self, AllocationMode, MemoryPoolConfig, MemoryResource, MemoryResourceHandle};

pub(crate) const ENVIRONMENT_NAME: &str = "allocator";

#[derive(Debug)]
enum AllocatorState {
    Uninitialized,
    Active(Arc<dyn MemoryResource>),
    Finalized,
}

/// Brings up the memory resource selected by name for the whole test run
///
/// The mode string is only parsed in [`Environment::set_up`], so an
/// unrecognized name fails the run before anything is allocated.
#[derive(Debug)]
pub struct AllocatorModeEnvironment {
    mode: String,
    pool_config: MemoryPoolConfig,
    state: AllocatorState,
}

impl AllocatorModeEnvironment {
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            mode: mode.into(),
            pool_config: MemoryPoolConfig::default(),
            state: AllocatorState::Uninitialized,
        }
    }

    /// Sizing used when the pooled mode is selected
    pub fn with_pool_config(mut self, config: MemoryPoolConfig) -> Self {
        self.pool_config = config;
        self
    }

    /// The requested mode name, as given
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// The mode of the running resource, while the environment is set up
    pub fn active_mode(&self) -> Option<AllocationMode> {
        match &self.state {
            AllocatorState::Active(resource) => Some(resource.mode()),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, AllocatorState::Active(_))
    }

    /// Handle to the running resource
    ///
    /// `None` before set-up and after teardown. Handles obtained earlier
    /// become invalid once the environment is torn down.
    pub fn resource(&self) -> Option<MemoryResourceHandle> {
        match &self.state {
            AllocatorState::Active(resource) => Some(MemoryResourceHandle::new(resource)),
            _ => None,
        }
    }

    pub(crate) fn state_name(&self) -> &'static str {
        match self.state {
            AllocatorState::Uninitialized => "uninitialized",
            AllocatorState::Active(_) => "active",
            AllocatorState::Finalized => "finalized",
        }
    }

    fn invalid_state(&self, action: &'static str) -> Error {
        Error::InvalidState {
            environment: ENVIRONMENT_NAME.to_string(),
            action,
            state: self.state_name(),
        }
    }
}

impl Environment for AllocatorModeEnvironment {
    fn name(&self) -> &str {
        ENVIRONMENT_NAME
    }

    fn set_up(&mut self) -> Result<()> {
        if !matches!(self.state, AllocatorState::Uninitialized) {
            return Err(self.invalid_state("set up"));
        }

        let mode: AllocationMode = self.mode.parse()?;
        let resource = memory::initialize(mode, &self.pool_config).map_err(|e| match e {
            Error::AllocatorInit(_) => e,
            other => Error::AllocatorInit(other.to_string()),
        })?;

        log::info!("Allocation mode '{}' active", mode);
        self.state = AllocatorState::Active(resource);
        Ok(())
    }

    fn tear_down(&mut self) -> Result<()> {
        if !self.is_active() {
            return Err(self.invalid_state("tear down"));
        }

        match std::mem::replace(&mut self.state, AllocatorState::Finalized) {
            AllocatorState::Active(resource) => {
                let mode = resource.mode();
                resource.finalize()?;
                log::info!("Finalized {} memory resource", mode);
                Ok(())
            }
            _ => Ok(()),
        }
    }
}

impl Drop for AllocatorModeEnvironment {
    fn drop(&mut self) {
        if self.is_active() {
            log::warn!("Allocator environment dropped while active; finalizing");
            if let Err(e) = self.tear_down() {
                log::warn!("{}", e);
            }
        }
    }
}
