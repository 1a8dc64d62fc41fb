//! Test support for PandRS
//!
//! Typed random data generation, a per-run temporary directory, and a
//! selectable memory-allocation mode, tied together by a small driver that
//! sets the environments up before the tests and tears them down afterwards.

pub mod environment;
pub mod error;
pub mod fixture;
pub mod memory;
pub mod options;
pub mod random;
pub mod temporal;

// Re-export commonly used types
pub use environment::{
    run_main, AllocatorModeEnvironment, Environment, TempDirEnvironment, TestHarness,
};
pub use error::{Error, ErrorKind, Result};
pub use fixture::BaseFixture;
pub use memory::{AllocationMode, MemoryResource, MemoryResourceHandle};
pub use options::TestOptions;
pub use random::{RandomValue, UniformRandomGenerator, ValueCategory};

// Export version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
