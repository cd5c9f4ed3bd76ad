#![deny(
    clippy::get_unwrap,
    clippy::panic,
    clippy::print_stdout,
    clippy::unwrap_used,
    clippy::use_debug
)]

use anyhow::{Context, Result, anyhow};
use buildroot::actions;
use buildroot::config::{Config, cli, resolve_config};
use buildroot::error::{BuildrootError, exit_code_for};
use buildroot::logger::BuildrootLogger;
use buildroot::root::{Collaborators, Root};
use buildroot::util::{
    Lock, LogSinks, ensure_dir, print_json_output, set_json_output,
    set_should_print_output,
};
use clap::{CommandFactory, Parser};
use clap_complete::CompleteEnv;
use log::{Log, error};
use nix::unistd::geteuid;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

pub fn main() -> ExitCode {
    // Does not return when the shell asked for completions
    CompleteEnv::with_factory(cli::Args::command).complete();

    let logger = match BuildrootLogger::new(log::LevelFilter::Trace).init() {
        Ok(logger) => logger,
        Err(e) => {
            eprintln!("Failed to initialize logger: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let cli: cli::Args = cli::Args::parse();
    let json = cli.json;

    let result = run(logger, cli);

    // Anything logged before the level was settled still has to be seen
    logger.print_deferred();
    if json {
        if let Err(e) = report_json(&result) {
            error!("{:#}", e);
        }
    }
    if let Err(e) = &result {
        error!("{:#}", e);
    }
    logger.flush();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => ExitCode::from(u8::try_from(exit_code_for(&e)).unwrap_or(1)),
    }
}

fn run(logger: &BuildrootLogger, cli: cli::Args) -> Result<()> {
    logger.set_level(cli.log_level.unwrap_or(log::LevelFilter::Info));

    let config = resolve_config(cli.clone()).context("Resolving config")?;

    logger.set_level(config.log_level);
    logger.print_deferred();
    set_should_print_output(!cli.json);

    if let cli::Action::Config { keys } = cli.action {
        return actions::config(&config, keys);
    }

    if !geteuid().is_root() {
        return Err(anyhow!(
            "Insufficient permissions to manage build roots, please retry using `sudo` or setuid flags"
        ));
    }

    ensure_dir(&config.basedir).context("Creating base directory")?;
    let root_name = match &config.unique_ext {
        Some(ext) => format!("{}-{}", config.root, ext),
        None => config.root.clone(),
    };
    let _lock = Lock::root(&config.basedir, &root_name)?;

    match cli.action {
        cli::Action::Init => with_root(config, actions::init),
        cli::Action::Clean => {
            // Preparing a fresh root only to remove it again would be wasted work
            let config = Config {
                clean: false,
                ..config
            };
            with_root(config, actions::clean)
        }
        cli::Action::Installdeps { srpm } => {
            let srpm = source_package(&srpm)?;
            with_root(config, |root| actions::installdeps(root, &srpm))
        }
        cli::Action::Rebuild { srpm } => {
            let srpm = source_package(&srpm)?;
            with_root(config, |root| actions::rebuild(root, &srpm))
        }
        cli::Action::Config { .. } => Ok(()),
    }
}

fn with_root(
    config: Config,
    action: impl FnOnce(&mut Root) -> Result<()>,
) -> Result<()> {
    let collaborators = Collaborators::system(&config);
    let logs = LogSinks::files(config.verbose);
    let mut root = Root::new(config, collaborators, logs)?;
    let result = action(&mut root);
    set_json_output("state", root.state().as_str())?;
    result
}

/// The source package must exist before anything is touched.
fn source_package(srpm: &Path) -> Result<PathBuf> {
    if !srpm.is_file() {
        return Err(BuildrootError::Package(format!(
            "Cannot find source package {}",
            srpm.display()
        ))
        .into());
    }
    std::fs::canonicalize(srpm)
        .context(format!("Resolving path of {}", srpm.display()))
}

fn report_json(result: &Result<()>) -> Result<()> {
    match result {
        Ok(()) => set_json_output("status", "success")?,
        Err(e) => {
            set_json_output("status", "error")?;
            set_json_output("error", &format!("{:#}", e))?;
            set_json_output("exit_code", &exit_code_for(e))?;
            if let Some(kind) = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<BuildrootError>())
                .map(BuildrootError::kind)
            {
                set_json_output("kind", kind)?;
            }
        }
    }
    print_json_output()
}
