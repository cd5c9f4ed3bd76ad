use super::cli::Args;
use super::{Config, PartialConfig};
use crate::util::resolve_invoking_user;
use anyhow::{Context, Result, anyhow};
use log::trace;
use std::collections::HashMap;
use std::env;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_DIR: &str = "/etc/buildroot";
const DEFAULTS_FILE: &str = "defaults.toml";

pub fn resolve_config(cli: Args) -> Result<Config> {
    resolve_config_in(cli, Path::new(CONFIG_DIR))
}

/// Layers, lowest precedence first: built-in defaults, `defaults.toml`,
/// `<root>.toml`, files given with `--config`, `BUILDROOT_*` environment
/// variables, command line flags.
pub fn resolve_config_in(cli: Args, config_dir: &Path) -> Result<Config> {
    let user = resolve_invoking_user().context("Resolving invoking user")?;
    let mut sources = HashMap::new();
    let mut merged = PartialConfig::default();

    if !cli.no_config {
        let defaults = config_dir.join(DEFAULTS_FILE);
        if defaults.exists() {
            merge_file(&mut merged, &mut sources, &defaults)?;
        }
    }

    // The root name picks the per-root file, so it has to be settled first
    let root_name = cli
        .root
        .clone()
        .or_else(|| non_empty_env("BUILDROOT_ROOT"))
        .or_else(|| merged.root.clone())
        .unwrap_or_else(|| "default".to_string());

    if !cli.no_config {
        let root_file = config_dir.join(format!("{}.toml", root_name));
        if root_file.exists() {
            merge_file(&mut merged, &mut sources, &root_file)?;
        } else {
            trace!("No configuration file {}", root_file.display());
        }
    }

    // Explicitly named files are loaded even with --no-config
    for path in &cli.config {
        if !path.exists() {
            return Err(anyhow!(
                "Configuration file {} does not exist",
                path.display()
            ));
        }
        merge_file(&mut merged, &mut sources, path)?;
    }

    merged.merge(env_layer()?, &mut sources, "environment");
    merged.merge(cli_layer(&cli), &mut sources, "cli");

    let mut config = Config {
        chroot_uid: user.uid.as_raw(),
        chroot_gid: user.gid.as_raw(),
        ..Config::default()
    };
    merged.apply_to(&mut config);

    for key in ["root", "basedir", "resultdir", "statedir", "chroot_uid", "chroot_gid"] {
        if !sources.contains_key(key) {
            sources.insert(key.into(), "default".into());
        }
    }
    config.sources = sources;

    validate_config(&config)?;

    trace!("Build root: {:?}", config.root);
    trace!("Base dir: {:?}", config.basedir);

    Ok(config)
}

fn merge_file(
    merged: &mut PartialConfig,
    sources: &mut HashMap<String, String>,
    path: &Path,
) -> Result<()> {
    let config_str = std::fs::read_to_string(path).context(format!(
        "Failed to read config file {}",
        path.display()
    ))?;
    let layer: PartialConfig = toml::from_str(&config_str)
        .context(format!("Failed to parse config file {}", path.display()))?;
    merged.merge(
        layer,
        sources,
        path.to_str()
            .context("Failed to convert config path to str")?,
    );
    trace!("Loaded config file: {}", path.display());
    Ok(())
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_layer() -> Result<PartialConfig> {
    let mut layer = PartialConfig::default();

    if let Some(log_level) = non_empty_env("BUILDROOT_LOG_LEVEL") {
        layer.log_level = Some(
            log::LevelFilter::from_str(&log_level)
                .map_err(|_| anyhow!("Invalid log level: {}", log_level))?,
        );
    }
    layer.root = non_empty_env("BUILDROOT_ROOT");
    layer.resultdir = non_empty_env("BUILDROOT_RESULTDIR").map(PathBuf::from);
    if let Some(timeout) = non_empty_env("BUILDROOT_BUILD_TIMEOUT") {
        layer.build_timeout = Some(timeout.parse::<u64>().map_err(|_| {
            anyhow!("Invalid value for BUILDROOT_BUILD_TIMEOUT: {}", timeout)
        })?);
    }

    Ok(layer)
}

fn cli_layer(cli: &Args) -> PartialConfig {
    PartialConfig {
        log_level: cli.log_level,
        verbose: cli.verbose.then_some(true),
        root: cli.root.clone(),
        unique_ext: cli.uniqueext.clone(),
        resultdir: cli.resultdir.clone(),
        statedir: cli.statedir.clone(),
        target_arch: cli.arch.clone(),
        clean: cli.no_clean.then_some(false),
        use_cache: cli.no_cache.then_some(false),
        rebuild_cache: cli.rebuild_cache.then_some(true),
        build_timeout: cli.timeout,
        ..PartialConfig::default()
    }
}

fn validate_config(config: &Config) -> Result<()> {
    if !is_valid_name(&config.root) {
        return Err(anyhow!("Invalid build root name: {:?}", config.root));
    }
    if let Some(ext) = &config.unique_ext {
        if !is_valid_name(ext) {
            return Err(anyhow!("Invalid unique extension: {:?}", ext));
        }
    }
    for (key, path) in [
        ("basedir", Some(&config.basedir)),
        ("chroot_home", Some(&config.chroot_home)),
        ("resultdir", config.resultdir.as_ref()),
        ("statedir", config.statedir.as_ref()),
    ] {
        if let Some(path) = path {
            if !path.is_absolute() {
                return Err(anyhow!(
                    "{} must be an absolute path: {}",
                    key,
                    path.display()
                ));
            }
        }
    }
    if !is_under(&config.basedir, &config.storage_prefix) {
        return Err(anyhow!(
            "basedir {} is not under {}",
            config.basedir.display(),
            config.storage_prefix.display()
        ));
    }

    Ok(())
}

/// True when `path` is `prefix` or below it without climbing out through
/// `..` components.
pub fn is_under(path: &Path, prefix: &Path) -> bool {
    path.starts_with(prefix)
        && !path.components().any(|c| matches!(c, Component::ParentDir))
}

/// A build root lives in a directory of its own below the prefix, never
/// at the prefix itself.
pub fn is_strictly_under(path: &Path, prefix: &Path) -> bool {
    is_under(path, prefix) && path != prefix
}

/// Root names and unique extensions become a single path component.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains('/') && name != "." && name != ".."
}
