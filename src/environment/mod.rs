//! Process-wide test environments and the driver that runs them
//!
//! A test program sets up the allocator environment, then the temporary
//! directory environment, then any environment it registered itself. They are
//! torn down in the reverse order once the tests are done.

pub(crate) mod allocator;
mod temp_dir;

use std::path::PathBuf;
use std::process::ExitCode;

use crate::error::{Error, Result};
use crate::fixture::BaseFixture;
use crate::options::TestOptions;

pub use self::allocator::AllocatorModeEnvironment;
pub use self::temp_dir::{
    default_temp_root, remove_tree, CleanupReport, TempDirEnvironment, TEMP_DIR_PREFIX,
};

const HARNESS_NAME: &str = "test-harness";

/// Global set-up and teardown around a whole test run
pub trait Environment {
    /// Short name used in log messages and errors
    fn name(&self) -> &str;

    fn set_up(&mut self) -> Result<()>;

    fn tear_down(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HarnessState {
    Idle,
    Running,
    Finished,
}

impl HarnessState {
    fn as_str(&self) -> &'static str {
        match self {
            HarnessState::Idle => "idle",
            HarnessState::Running => "running",
            HarnessState::Finished => "finished",
        }
    }
}

/// Owns the environments of a test program and drives their lifecycle
pub struct TestHarness {
    allocator: AllocatorModeEnvironment,
    temp_dir: Option<TempDirEnvironment>,
    temp_root: Option<PathBuf>,
    environments: Vec<Box<dyn Environment>>,
    state: HarnessState,
}

impl TestHarness {
    pub fn new(allocator: AllocatorModeEnvironment) -> Self {
        Self {
            allocator,
            temp_dir: None,
            temp_root: None,
            environments: Vec::new(),
            state: HarnessState::Idle,
        }
    }

    pub fn from_options(options: &TestOptions) -> Self {
        let mut harness = Self::new(AllocatorModeEnvironment::new(options.alloc_mode.as_str()));
        harness.temp_root = options.temp_root.clone();
        harness
    }

    /// Adds the temporary directory environment
    ///
    /// The directory is created under the configured temp root, or under
    /// [`default_temp_root`] when none was given.
    pub fn with_temp_dir(mut self) -> Self {
        let env = match &self.temp_root {
            Some(root) => TempDirEnvironment::with_root(root),
            None => TempDirEnvironment::new(),
        };
        self.temp_dir = Some(env);
        self
    }

    /// Adds an environment set up after the built-in ones
    pub fn register<E: Environment + 'static>(&mut self, env: E) {
        self.environments.push(Box::new(env));
    }

    pub fn allocator(&self) -> &AllocatorModeEnvironment {
        &self.allocator
    }

    pub fn temp_dir(&self) -> Result<&TempDirEnvironment> {
        self.temp_dir.as_ref().ok_or_else(|| Error::InvalidState {
            environment: HARNESS_NAME.to_string(),
            action: "provide a temporary directory",
            state: "configured without one",
        })
    }

    /// A fresh fixture bound to the active memory resource
    pub fn fixture(&self) -> Result<BaseFixture> {
        BaseFixture::new(&self.allocator)
    }

    pub fn is_running(&self) -> bool {
        self.state == HarnessState::Running
    }

    fn ordered_mut(&mut self) -> Vec<&mut (dyn Environment + 'static)> {
        let mut envs: Vec<&mut (dyn Environment + 'static)> = Vec::new();
        envs.push(&mut self.allocator);
        if let Some(temp_dir) = self.temp_dir.as_mut() {
            envs.push(temp_dir);
        }
        envs.extend(self.environments.iter_mut().map(|env| env.as_mut()));
        envs
    }

    fn invalid_state(&self, action: &'static str) -> Error {
        Error::InvalidState {
            environment: HARNESS_NAME.to_string(),
            action,
            state: self.state.as_str(),
        }
    }

    /// Sets up every environment in order
    ///
    /// When one fails, the environments already set up are torn down again in
    /// reverse order and the failure is returned.
    pub fn set_up(&mut self) -> Result<()> {
        if self.state != HarnessState::Idle {
            return Err(self.invalid_state("set up"));
        }

        let mut envs = self.ordered_mut();
        let mut ready = 0;
        let mut failure = None;
        for env in envs.iter_mut() {
            log::info!("Setting up environment '{}'", env.name());
            match env.set_up() {
                Ok(()) => ready += 1,
                Err(e) => {
                    log::error!("Setting up environment '{}' failed: {}", env.name(), e);
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(err) = failure {
            for env in envs[..ready].iter_mut().rev() {
                if let Err(e) = env.tear_down() {
                    log::error!("Tearing down environment '{}' failed: {}", env.name(), e);
                }
            }
            self.state = HarnessState::Finished;
            return Err(err);
        }

        self.state = HarnessState::Running;
        Ok(())
    }

    /// Tears down every environment in reverse order
    ///
    /// All environments are attempted; the first failure is returned.
    pub fn tear_down(&mut self) -> Result<()> {
        if self.state != HarnessState::Running {
            return Err(self.invalid_state("tear down"));
        }

        let mut first_error = None;
        for env in self.ordered_mut().into_iter().rev() {
            log::info!("Tearing down environment '{}'", env.name());
            if let Err(e) = env.tear_down() {
                log::error!("Tearing down environment '{}' failed: {}", env.name(), e);
                first_error.get_or_insert(e);
            }
        }

        self.state = HarnessState::Finished;
        first_error.map_or(Ok(()), Err)
    }

    /// Runs `body` between set-up and teardown
    ///
    /// Teardown happens even when `body` fails. The body's error wins over a
    /// teardown error.
    pub fn run<T, F>(&mut self, body: F) -> Result<T>
    where
        F: FnOnce(&TestHarness) -> Result<T>,
    {
        self.set_up()?;
        let outcome = body(&*self);
        let teardown = self.tear_down();
        let value = outcome?;
        teardown?;
        Ok(value)
    }
}

impl std::fmt::Debug for TestHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<&str> = self.environments.iter().map(|env| env.name()).collect();
        f.debug_struct("TestHarness")
            .field("allocator", &self.allocator)
            .field("temp_dir", &self.temp_dir)
            .field("environments", &registered)
            .field("state", &self.state)
            .finish()
    }
}

/// Entry point of a test program
///
/// Reads [`TestOptions`] from the command line, brings up the allocator and
/// temporary directory environments, runs `body` and tears everything down.
/// Configuration and set-up errors end the process with a failure status.
pub fn run_main<F>(body: F) -> ExitCode
where
    F: FnOnce(&TestHarness) -> Result<()>,
{
    let options = match TestOptions::from_env_args() {
        Ok(options) => options,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut harness = TestHarness::from_options(&options).with_temp_dir();
    match harness.run(body) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Test run failed: {}", e);
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Defines `main` for a test program built with `harness = false`
///
/// ```no_run
/// pandrs_testkit::test_program_main!(|harness| {
///     let fixture = harness.fixture()?;
///     let block = fixture.mr().allocate(64)?;
///     fixture.mr().deallocate(block)
/// });
/// ```
#[macro_export]
macro_rules! test_program_main {
    ($body:expr) => {
        fn main() -> ::std::process::ExitCode {
            $crate::environment::run_main($body)
        }
    };
}
