use crate::outln;
use crate::root::Root;
use crate::util::set_json_output;
use anyhow::Result;
use std::path::Path;

pub fn installdeps(root: &mut Root, srpm: &Path) -> Result<()> {
    let rebuilt = root.run_and_close(|root| {
        root.prep()?;
        root.install_build_deps(srpm)
    })?;
    outln!("Installed build dependencies of {}", rebuilt.display());
    set_json_output("srpm", &rebuilt)?;
    Ok(())
}
