mod fixtures;

use buildroot::error::BuildrootError;
use buildroot::util::{Executor, Invocation, LogSinks, MountKind, MountTable};
use fixtures::*;
use rstest::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Mounts {
    dir: TempDir,
    table: MountTable,
    exec: Executor,
    calls: CallLog,
}

impl Mounts {
    fn root_dir(&self) -> PathBuf {
        self.dir.path().join("root")
    }

    fn track_file(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("mounted-locations")).unwrap()
    }
}

fn mounts_with(runner: FakeRunner) -> Mounts {
    let dir = tempfile::tempdir().unwrap();
    let calls = runner.calls();
    let (logs, _, _) = LogSinks::shared(false);
    let table = MountTable::new(
        &dir.path().join("root"),
        "/bin/mount",
        "/bin/umount",
        &dir.path().join("mounted-locations"),
    );
    Mounts {
        dir,
        table,
        exec: Executor::new(Box::new(runner), logs),
        calls,
    }
}

#[fixture]
fn mounts() -> Mounts {
    mounts_with(FakeRunner::new())
}

fn unmounted(calls: &CallLog) -> Vec<String> {
    calls
        .matching("/bin/umount -n ")
        .into_iter()
        .map(|c| c.trim_start_matches("/bin/umount -n ").to_string())
        .collect()
}

fn target(root: &Path, rel: &str) -> String {
    root.join(rel).display().to_string()
}

#[rstest]
fn test_detach_reverses_attach(mut mounts: Mounts) {
    mounts.table.attach_all(&mut mounts.exec).unwrap();
    let kinds: Vec<MountKind> = mounts.table.entries().iter().map(|e| e.kind).collect();
    assert_eq!(kinds, MountKind::ATTACH_ORDER.to_vec());
    assert_eq!(mounts.track_file(), "proc\ndev\ndev/pts\n");

    mounts.table.detach_all(&mut mounts.exec).unwrap();
    let root = mounts.root_dir();
    assert_eq!(
        unmounted(&mounts.calls),
        vec![target(&root, "dev/pts"), target(&root, "dev"), target(&root, "proc")]
    );
    assert!(mounts.table.entries().is_empty());
    assert_eq!(mounts.track_file(), "");
}

#[rstest]
#[case::in_order(vec![MountKind::Proc, MountKind::DevBind, MountKind::DevPts])]
#[case::devpts_alone(vec![MountKind::DevPts])]
#[case::mixed(vec![MountKind::DevBind, MountKind::Proc])]
fn test_detach_is_reverse_of_any_sequence(#[case] sequence: Vec<MountKind>) {
    let mut mounts = mounts_with(FakeRunner::new());
    for kind in &sequence {
        mounts.table.attach(*kind, &mut mounts.exec).unwrap();
    }
    mounts.table.detach_all(&mut mounts.exec).unwrap();

    let root = mounts.root_dir();
    let expected: Vec<String> = sequence
        .iter()
        .rev()
        .map(|k| target(&root, k.relative_target()))
        .collect();
    assert_eq!(unmounted(&mounts.calls), expected);
}

#[rstest]
fn test_attach_twice_mounts_once(mut mounts: Mounts) {
    mounts.table.attach_all(&mut mounts.exec).unwrap();
    mounts.table.attach_all(&mut mounts.exec).unwrap();
    mounts.table.attach(MountKind::Proc, &mut mounts.exec).unwrap();

    assert_eq!(mounts.calls.count("/bin/mount "), 3);
    assert_eq!(mounts.table.entries().len(), 3);

    // Attaching again after a detach is a fresh mount
    mounts.table.detach_all(&mut mounts.exec).unwrap();
    mounts.table.attach(MountKind::Proc, &mut mounts.exec).unwrap();
    assert_eq!(mounts.calls.count("-t proc proc"), 2);
}

#[rstest]
fn test_attach_creates_targets(mut mounts: Mounts) {
    mounts.table.attach_all(&mut mounts.exec).unwrap();
    for kind in MountKind::ATTACH_ORDER {
        assert!(mounts.root_dir().join(kind.relative_target()).is_dir());
    }
    assert!(mounts.calls.matching("--bind /dev ")[0].ends_with("/root/dev"));
}

#[rstest]
#[case::proc("-t proc proc")]
#[case::dev("--bind /dev")]
fn test_already_mounted_is_tolerated(#[case] needle: &str) {
    let mut mounts = mounts_with(
        FakeRunner::new().on(needle, |_| exit(32, "mount: /x: proc already mounted on /x.\n")),
    );
    mounts.table.attach_all(&mut mounts.exec).unwrap();
    assert_eq!(mounts.table.entries().len(), 3);
}

#[rstest]
fn test_devpts_already_mounted_is_fatal() {
    let mut mounts = mounts_with(
        FakeRunner::new().on("devpts", |_| exit(32, "mount: devpts already mounted on /x.\n")),
    );
    let err = mounts.table.attach_all(&mut mounts.exec).unwrap_err();
    assert_eq!(err.exit_code(), 20);
    assert_eq!(mounts.table.entries().len(), 2);
}

#[rstest]
fn test_proc_failure_is_not_fatal(#[values("-t proc proc", "--bind /dev")] needle: &str) {
    let mut mounts = mounts_with(
        FakeRunner::new().on(needle, |_| exit(32, "mount: permission denied\n")),
    );
    mounts.table.attach_all(&mut mounts.exec).unwrap();
    // Only successful mounts are tracked
    assert_eq!(mounts.table.entries().len(), 2);
}

#[rstest]
fn test_devpts_failure_is_fatal() {
    let mut mounts = mounts_with(
        FakeRunner::new().on("devpts", |_| exit(32, "mount: permission denied\n")),
    );
    let err = mounts.table.attach_all(&mut mounts.exec).unwrap_err();
    assert!(matches!(err, BuildrootError::Root(_)));
    assert_eq!(err.exit_code(), 20);
    assert!(!mounts.table.is_attached(MountKind::DevPts));
    assert!(mounts.table.is_attached(MountKind::Proc));
}

#[rstest]
fn test_detach_continues_past_failures() {
    let mut mounts = mounts_with(
        FakeRunner::new().on("/bin/umount -n", |inv| {
            if inv.command.ends_with("/dev") {
                exit(32, "umount: target is busy.\n")
            } else {
                ok("")
            }
        }),
    );
    mounts.table.attach_all(&mut mounts.exec).unwrap();
    let err = mounts.table.detach_all(&mut mounts.exec).unwrap_err();

    assert_eq!(err.exit_code(), 20);
    assert!(err.to_string().contains("/root/dev"));
    assert_eq!(unmounted(&mounts.calls).len(), 3);
    assert!(mounts.table.entries().is_empty());
}

#[rstest]
#[case(ok(""), true)]
#[case(exit(32, "umount: target is busy.\n"), false)]
fn test_detach_path_reports_outcome(
    #[case] response: buildroot::error::BuildrootResult<buildroot::util::CommandOutput>,
    #[case] detached: bool,
) {
    let mut response = Some(response);
    let mut mounts = mounts_with(FakeRunner::new().on("/bin/umount -n", move |_| {
        response.take().unwrap_or_else(|| ok(""))
    }));
    let stale = mounts.root_dir().join("proc");

    assert_eq!(
        mounts.table.detach_path(&stale, &mut mounts.exec).unwrap(),
        detached
    );
    assert_eq!(unmounted(&mounts.calls), vec![stale.display().to_string()]);
}

#[rstest]
fn test_timeout_leaves_mounts_attached(mut mounts: Mounts) {
    let runner = FakeRunner::new().on("make", |inv| {
        Err(BuildrootError::CommandTimeoutExpired {
            command: inv.command.clone(),
            timeout: 1,
            output: "partial\n".to_string(),
        })
    });
    let (logs, _, build_log) = LogSinks::shared(false);
    let mut build_exec = Executor::new(Box::new(runner), logs);

    mounts.table.attach_all(&mut mounts.exec).unwrap();
    let err = build_exec
        .run_build(&Invocation::chroot(mounts.root_dir(), "make").with_timeout(1))
        .unwrap_err();

    assert!(matches!(err, BuildrootError::CommandTimeoutExpired { .. }));
    assert!(build_log.contains("partial"));
    assert_eq!(mounts.table.entries().len(), 3);
    assert_eq!(mounts.calls.count("umount"), 0);
}
