//! Heuristics over the text external tools print. These depend on the tools
//! speaking English in their usual format and will misfire under other
//! locales or versions, so every one of them lives here and nowhere else.

/// `mount` reports that the target already carries this filesystem.
pub fn already_mounted(output: &str) -> bool {
    output.contains("already mounted")
}

const UNRESOLVED_MARKER: &str = "No Package found for";

/// The first build prerequisite the package manager's `resolvedep` could not
/// satisfy, if any.
pub fn unresolved_dependency(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        line.find(UNRESOLVED_MARKER).map(|_| {
            line.replace(UNRESOLVED_MARKER, "").trim().to_string()
        })
    })
}

/// rpm's internal feature capabilities show up as requirements but are never
/// installable packages.
pub fn is_rpmlib_capability(requirement: &str) -> bool {
    requirement.starts_with("rpmlib(")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_mounted() {
        assert!(already_mounted(
            "mount: /var/lib/buildroot/x/root/proc: proc already mounted on /proc."
        ));
        assert!(!already_mounted("mount: permission denied"));
        assert!(!already_mounted(""));
    }

    #[test]
    fn test_unresolved_dependency() {
        let output = "Loading plugins\n\
            0:gcc-13.2.1-1.x86_64\n\
            No Package found for libfoo-devel\n\
            No Package found for libbar-devel\n";
        assert_eq!(
            unresolved_dependency(output),
            Some("libfoo-devel".to_string())
        );
        assert_eq!(unresolved_dependency("0:gcc-13.2.1-1.x86_64\n"), None);
        assert_eq!(unresolved_dependency(""), None);
    }

    #[test]
    fn test_rpmlib_capability() {
        assert!(is_rpmlib_capability("rpmlib(CompressedFileNames) <= 3.0.4-1"));
        assert!(!is_rpmlib_capability("gcc"));
    }
}
