use crate::outln;
use crate::root::Root;
use crate::util::set_json_output;
use anyhow::Result;
use log::warn;
use std::path::Path;

/// Builds binary packages from a source package in a freshly prepared root.
pub fn rebuild(root: &mut Root, srpm: &Path) -> Result<()> {
    let artifacts = root.run_and_close(|root| {
        root.prep()?;
        root.build(srpm)
    })?;

    if artifacts.is_empty() {
        warn!("The build succeeded but produced no packages");
    }
    for path in artifacts.iter() {
        outln!("{}", path.display());
    }
    set_json_output("artifacts", &artifacts)?;
    Ok(())
}
