//! Command-line and environment configuration of a test program

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use crate::error::Result;
use crate::memory::DEFAULT_ALLOCATION_MODE;

/// Long flags understood by [`TestOptions`]; everything else on the command
/// line belongs to the test runner and is ignored.
const KNOWN_FLAGS: &[&str] = &["--alloc-mode", "--alloc_mode", "--temp-root"];

/// Options shared by every test program
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "pandrs-tests", about = "PandRS test program options")]
pub struct TestOptions {
    /// Allocation mode backing test-time allocations (cuda, pool or managed)
    #[arg(
        long = "alloc-mode",
        visible_alias = "alloc_mode",
        env = "PANDRS_TEST_ALLOC_MODE",
        default_value = DEFAULT_ALLOCATION_MODE
    )]
    pub alloc_mode: String,

    /// Directory under which the per-run temporary directory is created
    #[arg(long = "temp-root", env = "PANDRS_TEST_TEMP_ROOT")]
    pub temp_root: Option<PathBuf>,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            alloc_mode: DEFAULT_ALLOCATION_MODE.to_string(),
            temp_root: None,
        }
    }
}

impl TestOptions {
    /// Parse options from the process arguments and environment
    pub fn from_env_args() -> Result<Self> {
        Self::parse_from_args(std::env::args_os())
    }

    /// Parse options from `args`, whose first item is the program name
    ///
    /// Unknown arguments, such as the test runner's own flags and filters,
    /// are skipped. A known flag without a value, or with a value that is not
    /// valid for it, is an error.
    pub fn parse_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args = retain_known_args(args.into_iter().map(Into::into));
        Ok(Self::try_parse_from(args)?)
    }
}

fn retain_known_args(mut args: impl Iterator<Item = OsString>) -> Vec<OsString> {
    let mut kept = vec![args
        .next()
        .unwrap_or_else(|| OsString::from("pandrs-tests"))];

    while let Some(arg) = args.next() {
        // Arguments need not be UTF-8; only the flag name before `=` is matched
        let bytes = arg.as_encoded_bytes();
        let (flag, has_inline_value) = match bytes.iter().position(|b| *b == b'=') {
            Some(eq) => (&bytes[..eq], true),
            None => (bytes, false),
        };
        if !KNOWN_FLAGS.iter().any(|known| known.as_bytes() == flag) {
            continue;
        }

        kept.push(arg);
        if !has_inline_value {
            if let Some(value) = args.next() {
                kept.push(value);
            }
        }
    }

    kept
}
