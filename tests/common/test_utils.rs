//! Test utilities for scratch directories and reproducible data

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use pandrs_testkit::environment::default_temp_root;
use pandrs_testkit::random::{RandomValue, UniformRandomGenerator};
use rand::rngs::StdRng;

static SCRATCH_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// RAII scratch directory used as the root for a temporary directory environment
///
/// The directory and its contents are deleted when this struct is dropped
pub struct ScratchRoot {
    path: PathBuf,
}

impl ScratchRoot {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchRoot {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Create a unique scratch directory under the default temp root
pub fn scratch_root(test_name: &str) -> ScratchRoot {
    let counter = SCRATCH_COUNTER.fetch_add(1, Ordering::SeqCst);
    let path = default_temp_root().join(format!(
        "pandrs_testkit_{}_{}_{}",
        test_name,
        std::process::id(),
        counter
    ));
    fs::create_dir_all(&path).expect("Failed to create scratch root");
    ScratchRoot { path }
}

/// Number of entries directly inside `dir`
pub fn count_entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Reproducible generator over `[lower, upper]`
pub fn seeded_generator<T: RandomValue>(
    lower: T,
    upper: T,
    seed: u64,
) -> UniformRandomGenerator<T, StdRng> {
    UniformRandomGenerator::<T, StdRng>::seeded(lower, upper, seed)
        .expect("Failed to build seeded generator")
}
