use std::io;
use thiserror::Error;

pub type BuildrootResult<T> = Result<T, BuildrootError>;

/// Every failure the build root reports. Each kind maps to a fixed process
/// exit code, which is the only machine readable failure signal; the
/// persisted state file keeps whatever phase was last entered.
#[derive(Error, Debug)]
pub enum BuildrootError {
    #[error("{0}")]
    Generic(String),

    #[error("command exceeded its {timeout} second timeout: {command}")]
    CommandTimeoutExpired {
        command: String,
        timeout: u64,
        /// Output captured before the process group was killed
        output: String,
    },

    #[error("{0}")]
    Build(String),

    #[error("{0}")]
    Root(String),

    #[error("{0}")]
    PackageManager(String),

    #[error("{0}")]
    Package(String),
}

impl BuildrootError {
    pub fn exit_code(&self) -> i32 {
        match self {
            BuildrootError::Generic(_) => 1,
            BuildrootError::CommandTimeoutExpired { .. } => 1,
            BuildrootError::Build(_) => 10,
            BuildrootError::Root(_) => 20,
            BuildrootError::PackageManager(_) => 30,
            BuildrootError::Package(_) => 40,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BuildrootError::Generic(_) => "Error",
            BuildrootError::CommandTimeoutExpired { .. } => {
                "CommandTimeoutExpired"
            }
            BuildrootError::Build(_) => "BuildError",
            BuildrootError::Root(_) => "RootError",
            BuildrootError::PackageManager(_) => "PackageManagerError",
            BuildrootError::Package(_) => "PackageError",
        }
    }
}

impl From<io::Error> for BuildrootError {
    fn from(e: io::Error) -> Self {
        BuildrootError::Generic(e.to_string())
    }
}

/// Picks the exit code for an error that reached the top of the binary.
/// Anything that isn't one of ours is unclassified.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<BuildrootError>())
        .map(BuildrootError::exit_code)
        .unwrap_or(1)
}
