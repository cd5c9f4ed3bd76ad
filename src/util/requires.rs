use crate::error::{BuildrootError, BuildrootResult};
use crate::util::output_checks::is_rpmlib_capability;
use crate::util::{Executor, Invocation, quote_path};
use std::path::Path;

/// Reads the build prerequisites a source package declares.
pub trait RequiresReader {
    fn build_requires(
        &self,
        exec: &mut Executor,
        package: &Path,
        install_root: &Path,
    ) -> BuildrootResult<Vec<String>>;
}

/// Asks the host's `rpm` for the requirements recorded in the package
/// header.
pub struct RpmQuery {
    rpm_cmd: String,
}

impl RpmQuery {
    pub fn new(rpm_cmd: impl Into<String>) -> Self {
        Self {
            rpm_cmd: rpm_cmd.into(),
        }
    }
}

impl Default for RpmQuery {
    fn default() -> Self {
        Self::new("/bin/rpm")
    }
}

impl RequiresReader for RpmQuery {
    fn build_requires(
        &self,
        exec: &mut Executor,
        package: &Path,
        install_root: &Path,
    ) -> BuildrootResult<Vec<String>> {
        let out = exec.run(&Invocation::host(format!(
            "{} --root {} -qp --requires {}",
            self.rpm_cmd,
            quote_path(install_root),
            quote_path(package)
        )))?;
        if !out.success() {
            return Err(BuildrootError::Package(format!(
                "Could not read build requirements from {}",
                package.display()
            )));
        }
        Ok(parse_requires(&out.output))
    }
}

/// One requirement per line, rpmlib capabilities and duplicates dropped,
/// original order kept.
pub fn parse_requires(output: &str) -> Vec<String> {
    let mut requires: Vec<String> = Vec::new();
    for line in output.lines().map(str::trim) {
        if line.is_empty() || is_rpmlib_capability(line) {
            continue;
        }
        if !requires.iter().any(|r| r == line) {
            requires.push(line.to_string());
        }
    }
    requires
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requires() {
        let output = "gcc\n\
            rpmlib(CompressedFileNames) <= 3.0.4-1\n\
            libfoo-devel >= 1.2\n\
            \n\
            gcc\n\
            rpmlib(FileDigests) <= 4.6.0-1\n";
        assert_eq!(
            parse_requires(output),
            vec!["gcc".to_string(), "libfoo-devel >= 1.2".to_string()]
        );
        assert!(parse_requires("").is_empty());
    }
}
