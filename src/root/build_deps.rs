use super::root_struct::Root;
use super::state::State;
use crate::error::{BuildrootError, BuildrootResult};
use crate::util::{find_files, output_checks, quote, quote_path};
use log::{debug, error, warn};
use std::fs;
use std::path::{Path, PathBuf};

impl Root {
    /// Installs everything `srpm` needs to build into the root.
    ///
    /// The package is copied in, installed as the build user and rebuilt
    /// from its spec so the requirements match the root's own rpm macros.
    /// Returns the path, inside the root, of that rebuilt source package.
    pub fn install_build_deps(&mut self, srpm: &Path) -> BuildrootResult<PathBuf> {
        self.set_state(State::Setup)?;
        let mut scope = self.unmount_on_failure();
        let rebuilt = scope.install_build_deps_mounted(srpm)?;
        scope.succeed();
        Ok(rebuilt)
    }

    fn install_build_deps_mounted(&mut self, srpm: &Path) -> BuildrootResult<PathBuf> {
        self.mount_all()?;
        self.build_dir_setup()?;

        let Some(file_name) = srpm.file_name() else {
            return Err(self.fail(BuildrootError::Package(format!(
                "Not a source package: {}",
                srpm.display()
            ))));
        };
        let file_name = file_name.to_owned();
        let host_build_dir = self.host_path(&self.build_dir);

        fs::copy(srpm, host_build_dir.join("originals").join(&file_name)).map_err(
            |e| {
                self.fail(BuildrootError::Package(format!(
                    "Cannot read source package {}: {}",
                    srpm.display(),
                    e
                )))
            },
        )?;

        let inner_srpm = self.build_dir.join("originals").join(&file_name);
        let command =
            self.as_build_user(&format!("rpm -Uvh --nodeps {}", quote_path(&inner_srpm)));
        let out = self.do_chroot(command)?;
        if !out.success() {
            error!("{}", out.output.trim_end());
            return Err(self.fail(BuildrootError::Root(format!(
                "Error installing srpm: {}",
                file_name.to_string_lossy()
            ))));
        }

        let specs = find_files(&host_build_dir.join("SPECS"), "*.spec");
        let Some(spec) = specs.first() else {
            return Err(self.fail(BuildrootError::Package(format!(
                "No Spec file found in srpm: {}",
                file_name.to_string_lossy()
            ))));
        };
        if specs.len() > 1 {
            warn!("More than one spec file in srpm, using {}", spec.display());
        }

        let command = self.as_build_user(&format!(
            "rpmbuild -bs --target {} --nodeps {}",
            self.config.target_arch,
            quote_path(&self.inner_path(spec))
        ));
        let out = self.do_chroot(command)?;
        if !out.success() {
            error!("{}", out.output.trim_end());
            return Err(self.fail(BuildrootError::Package(
                "Error building srpm from installed spec. See root log.".to_string(),
            )));
        }

        let srpms = find_files(&host_build_dir.join("SRPMS"), "*.src.rpm");
        let Some(rebuilt) = srpms.first().cloned() else {
            return Err(self.fail(BuildrootError::Package(format!(
                "No srpm created from specfile from srpm: {}",
                file_name.to_string_lossy()
            ))));
        };

        let requires =
            self.requires
                .build_requires(&mut self.exec, &rebuilt, &self.root_dir)?;
        debug!("build requires: {:?}", requires);

        if !requires.is_empty() {
            let args = requires
                .iter()
                .map(|r| quote(r))
                .collect::<Vec<_>>()
                .join(" ");

            let (command, out) =
                self.package_manager_output(&format!("resolvedep {}", args))?;
            // One missing prerequisite sinks the lot, before anything is installed
            if let Some(missing) = output_checks::unresolved_dependency(&out.output) {
                return Err(self.fail(BuildrootError::Package(format!(
                    "Cannot find build req {}. Exiting.",
                    missing
                ))));
            }
            if !out.success() {
                return Err(self.fail(BuildrootError::PackageManager(format!(
                    "Error performing package manager command: {}",
                    command
                ))));
            }

            self.package_manager(&format!("install {}", args))?;
        }

        Ok(self.inner_path(&rebuilt))
    }
}
