use crate::root::Root;
use anyhow::Result;
use log::info;

/// Prepares the build root and leaves it ready for builds.
pub fn init(root: &mut Root) -> Result<()> {
    root.run_and_close(|root| root.prep())?;
    info!("Build root {} is ready", root.root_dir.display());
    Ok(())
}
