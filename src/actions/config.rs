#![allow(clippy::option_map_unit_fn)]
use crate::config::Config;
use crate::outln;
use crate::util::set_json_output;
use anyhow::{Result, anyhow};
use log::debug;
use std::collections::HashMap;

const DEFAULT_KEYS: &[&str] = &[
    "root",
    "unique_ext",
    "basedir",
    "resultdir",
    "statedir",
    "target_arch",
    "use_cache",
    "clean",
    "build_timeout",
    "log_level",
];

pub fn config(config: &Config, keys: Option<Vec<String>>) -> Result<()> {
    let keys = keys
        .filter(|keys| !keys.is_empty())
        .unwrap_or_else(|| DEFAULT_KEYS.iter().map(|k| k.to_string()).collect());
    let multi_line = keys.len() > 1;

    for key in keys {
        // Accept the flag spelling too
        let key = key.replace('-', "_");
        let value = config
            .value_of(&key)
            .ok_or_else(|| anyhow!("Unknown key: {}", key))?;
        print_config_line(&key, &value, multi_line, &config.sources)?;
    }

    Ok(())
}

fn print_config_line(
    key: &str,
    value: &str,
    multi_line: bool,
    sources: &HashMap<String, String>,
) -> Result<()> {
    sources.get(key).map(|s| {
        debug!("{}={} set from {}", key, value, s);
    });
    set_json_output(key, value)?;

    if multi_line {
        outln!("{}={}", key, value);
    } else {
        outln!("{}", value);
    }
    Ok(())
}
