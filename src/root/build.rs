use super::root_struct::Root;
use super::state::State;
use crate::error::{BuildrootError, BuildrootResult};
use crate::util::{Invocation, find_files, quote_path};
use log::{error, info};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Packages a build produced, as copied into the result directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildArtifactSet {
    pub binaries: Vec<PathBuf>,
    pub sources: Vec<PathBuf>,
}

impl BuildArtifactSet {
    pub fn is_empty(&self) -> bool {
        self.binaries.is_empty() && self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathBuf> {
        self.binaries.iter().chain(self.sources.iter())
    }
}

impl Root {
    /// Rebuilds a source package into binary packages, with its build
    /// dependencies installed first. The compile step runs as the build
    /// user, bounded by `build_timeout`.
    pub fn build(&mut self, srpm: &Path) -> BuildrootResult<BuildArtifactSet> {
        let rebuilt = self.install_build_deps(srpm)?;
        let name = srpm
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| srpm.display().to_string());

        self.set_state(State::Build)?;
        let mut scope = self.unmount_on_failure();
        let artifacts = scope.build_mounted(&rebuilt, &name)?;
        scope.succeed();
        Ok(artifacts)
    }

    fn build_mounted(
        &mut self,
        rebuilt: &Path,
        name: &str,
    ) -> BuildrootResult<BuildArtifactSet> {
        let command = format!(
            "cd /; {}",
            self.as_build_user(&format!(
                "rpmbuild --rebuild --target {} --nodeps {}",
                self.config.target_arch,
                quote_path(rebuilt)
            ))
        );
        let invocation = Invocation::chroot(&self.root_dir, command)
            .with_timeout(self.config.build_timeout);

        match self.exec.run_build(&invocation) {
            Ok(out) if out.success() => (),
            Ok(out) => {
                error!("rpmbuild exited with {}", out.status);
                return Err(self.fail(BuildrootError::Build(format!(
                    "Error building package from {}, See build log",
                    name
                ))));
            }
            Err(BuildrootError::CommandTimeoutExpired { timeout, .. }) => {
                return Err(self.fail(BuildrootError::Build(format!(
                    "Error building package from {}. Exceeded build_timeout which was set to {} seconds.",
                    name, timeout
                ))));
            }
            Err(e) => {
                return Err(self.fail(BuildrootError::Build(format!(
                    "Error building package from {}: {}",
                    name, e
                ))));
            }
        }

        let build_dir = self.host_path(&self.build_dir);
        let artifacts = BuildArtifactSet {
            binaries: self.collect(&build_dir.join("RPMS"))?,
            sources: self.collect(&build_dir.join("SRPMS"))?,
        };
        info!(
            "Built {} package(s) from {} into {}",
            artifacts.iter().count(),
            name,
            self.result_dir.display()
        );
        Ok(artifacts)
    }

    /// Copies every package in `dir` to the result directory.
    fn collect(&mut self, dir: &Path) -> BuildrootResult<Vec<PathBuf>> {
        let mut copied = Vec::new();
        for package in find_files(dir, "*.rpm") {
            let Some(file_name) = package.file_name() else {
                continue;
            };
            let dest = self.result_dir.join(file_name);
            self.exec.logs.root(&format!(
                "Copying packages: {} to {}",
                package.display(),
                dest.display()
            ));
            fs::copy(&package, &dest).map_err(|e| {
                BuildrootError::Generic(format!(
                    "Failed to copy {} to {}: {}",
                    package.display(),
                    dest.display(),
                    e
                ))
            })?;
            copied.push(dest);
        }
        Ok(copied)
    }
}
