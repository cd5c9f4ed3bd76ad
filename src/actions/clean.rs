use crate::outln;
use crate::root::Root;
use anyhow::Result;

/// Removes the build root. The state directory and logs go with it unless
/// they were placed elsewhere.
pub fn clean(root: &mut Root) -> Result<()> {
    root.clean()?;
    outln!("Removed {}", root.base_dir.display());
    Ok(())
}
