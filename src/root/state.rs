use crate::error::{BuildrootError, BuildrootResult};
use log::info;
use std::path::{Path, PathBuf};

/// Lifecycle phases of a build root, in the order a single pass visits
/// them. The cache states are entered from inside `prep`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unstarted,
    Init,
    Clean,
    Prep,
    UnpackCache,
    CreateCache,
    Setup,
    Build,
    Ending,
    Done,
}

impl State {
    pub const ALL: [State; 10] = [
        State::Unstarted,
        State::Init,
        State::Clean,
        State::Prep,
        State::UnpackCache,
        State::CreateCache,
        State::Setup,
        State::Build,
        State::Ending,
        State::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Unstarted => "unstarted",
            State::Init => "init",
            State::Clean => "clean",
            State::Prep => "prep",
            State::UnpackCache => "unpack cache",
            State::CreateCache => "create cache",
            State::Setup => "setup",
            State::Build => "build",
            State::Ending => "ending",
            State::Done => "done",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for State {
    type Err = BuildrootError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        State::ALL
            .iter()
            .find(|state| state.as_str() == s)
            .copied()
            .ok_or_else(|| {
                BuildrootError::Generic(format!("Unknown state: {}", s))
            })
    }
}

pub const STATUS_FILE: &str = "status";

/// The current phase, mirrored to `<statedir>/status` for outside
/// observers. The file is replaced with a rename so a reader never sees a
/// half written line.
pub struct StateTracker {
    path: PathBuf,
    current: State,
}

impl StateTracker {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(STATUS_FILE),
            current: State::Unstarted,
        }
    }

    pub fn get(&self) -> State {
        self.current
    }

    pub fn set(&mut self, state: State) -> BuildrootResult<()> {
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, format!("{}\n", state)).map_err(|e| {
            BuildrootError::Generic(format!(
                "Failed to write state to {}: {}",
                tmp.display(),
                e
            ))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            BuildrootError::Generic(format!(
                "Failed to write state to {}: {}",
                self.path.display(),
                e
            ))
        })?;
        self.current = state;
        info!("{}", state);
        Ok(())
    }
}

/// Reads the state another process last recorded.
pub fn read_state(state_dir: &Path) -> BuildrootResult<State> {
    let path = state_dir.join(STATUS_FILE);
    match std::fs::read_to_string(&path) {
        Ok(contents) => contents.trim_end().parse(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Ok(State::Unstarted)
        }
        Err(e) => Err(e.into()),
    }
}
