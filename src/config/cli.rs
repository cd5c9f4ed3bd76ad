use super::resolve::CONFIG_DIR;
use clap::Parser;
use clap_complete::engine::{ArgValueCompleter, CompletionCandidate};
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[command(version, about = "Builds source packages inside a clean, disposable build root",
    long_about = None,
    override_usage = "\n    buildroot [OPTIONS] <ACTION> [ACTION_ARGUMENTS...]")]
pub struct Args {
    /********************/
    /* Flags and settings */
    /********************/
    /// Set the log level to one of trace, debug, info, warn, or error.
    /// `-v` is shorthand for enabling verbose (trace) logging.
    #[arg(short = 'v',
        long,
        global = true,
        default_missing_value = "trace",
        num_args = 0..=1,
        require_equals = true,
        value_parser = parse_log_level
    )]
    pub log_level: Option<log::LevelFilter>,

    /// Echo everything written to root.log on the console
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub verbose: bool,

    /// Name of the build root. Settings are also read from
    /// /etc/buildroot/<ROOT>.toml
    #[arg(short = 'r', long, global = true, value_hint = clap::ValueHint::Other, add = ArgValueCompleter::new(root_name_completion))]
    pub root: Option<String>,

    /// Additional configuration file, may be given more than once. Later
    /// files take precedence.
    #[arg(long, global = true, action = clap::ArgAction::Append)]
    pub config: Vec<PathBuf>,

    /// Do not load configuration files from /etc/buildroot
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub no_config: bool,

    /// Where built packages and logs are written. Defaults to <root>/result
    #[arg(long, global = true)]
    pub resultdir: Option<PathBuf>,

    /// Where the lifecycle status file is written. Defaults to <root>/state
    #[arg(long, global = true)]
    pub statedir: Option<PathBuf>,

    /// Suffix that lets several copies of the same root exist side by side
    #[arg(long, global = true)]
    pub uniqueext: Option<String>,

    /// Target architecture passed to the build tool
    #[arg(long, global = true)]
    pub arch: Option<String>,

    /// Reuse the existing root instead of removing it first
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub no_clean: bool,

    /// Never restore the root from, or save it to, the cache
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub no_cache: bool,

    /// Bootstrap from scratch and regenerate the cache
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub rebuild_cache: bool,

    /// Seconds the compile step may run before it is killed. 0 disables.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Formats action output as a JSON blob.
    #[arg(long, global = true, action = clap::ArgAction::SetTrue)]
    pub json: bool,

    /***************/
    /* Subcommands */
    /***************/
    #[command(subcommand)]
    pub action: Action,
}

#[derive(clap::Subcommand, Clone, Debug)]
#[command(subcommand_help_heading = "Actions")]
pub enum Action {
    /// Prepare the build root without building anything
    Init,

    /// Remove the build root and everything in it
    Clean,

    /// Prepare the build root and install a source package's build
    /// dependencies into it
    Installdeps {
        /// Source package to read build dependencies from
        #[arg(value_name = "SRPM")]
        srpm: PathBuf,
    },

    /// Prepare the build root and rebuild a source package into binary
    /// packages
    Rebuild {
        /// Source package to build
        #[arg(value_name = "SRPM")]
        srpm: PathBuf,
    },

    /// Get current configuration options
    Config {
        /// The keys to get from the configuration
        #[arg(value_name = "KEYS", num_args = 0..)]
        keys: Option<Vec<String>>,
    },
}

pub fn root_name_completion(
    current: &std::ffi::OsStr,
) -> Vec<CompletionCandidate> {
    let mut completions = vec![];
    let Some(current) = current.to_str() else {
        return completions;
    };

    let entries = match std::fs::read_dir(CONFIG_DIR) {
        Ok(entries) => entries,
        Err(_) => return completions,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("toml") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if stem == "defaults" || !stem.starts_with(current) {
            continue;
        }
        completions.push(CompletionCandidate::new(stem.to_string()));
    }

    completions
}

fn parse_log_level(s: &str) -> Result<log::LevelFilter, String> {
    s.parse::<log::LevelFilter>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rebuild() {
        let args = Args::try_parse_from([
            "buildroot",
            "-r",
            "fedora-39-x86_64",
            "--no-clean",
            "--timeout",
            "300",
            "rebuild",
            "foo-1.0-1.src.rpm",
        ])
        .unwrap();
        assert_eq!(args.root.as_deref(), Some("fedora-39-x86_64"));
        assert!(args.no_clean);
        assert_eq!(args.timeout, Some(300));
        assert!(matches!(
            args.action,
            Action::Rebuild { ref srpm } if srpm == &PathBuf::from("foo-1.0-1.src.rpm")
        ));
    }

    #[test]
    fn test_log_level_shorthand() {
        let args = Args::try_parse_from(["buildroot", "-v", "init"]).unwrap();
        assert_eq!(args.log_level, Some(log::LevelFilter::Trace));
        let args =
            Args::try_parse_from(["buildroot", "--log-level=warn", "clean"])
                .unwrap();
        assert_eq!(args.log_level, Some(log::LevelFilter::Warn));
    }

    #[test]
    fn test_action_is_required() {
        assert!(Args::try_parse_from(["buildroot"]).is_err());
    }
}
