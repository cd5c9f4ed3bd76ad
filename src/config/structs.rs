use super::impls::deserialize_level_filter;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Destructive operations are only ever performed below this directory.
pub const STORAGE_PREFIX: &str = "/var/lib/buildroot";

pub const DEFAULT_PACKAGE_MANAGER_CONF: &str = "[main]
cachedir=/var/cache/yum
debuglevel=1
logfile=/var/log/yum.log
reposdir=/dev/null
retries=20
obsoletes=1
gpgcheck=0
assumeyes=1
";

pub const DEFAULT_MACROS: &str = "%_topdir /builddir/build
%_rpmfilename %%{NAME}-%%{VERSION}-%%{RELEASE}.%%{ARCH}.rpm
";

/// One configuration layer. Every field is optional so layers can be merged;
/// keys this struct doesn't know are an error rather than silently ignored.
#[derive(Deserialize, Default, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(deserialize_with = "deserialize_level_filter", default)]
    pub log_level: Option<log::LevelFilter>,
    pub verbose: Option<bool>,
    pub root: Option<String>,
    pub unique_ext: Option<String>,
    pub basedir: Option<PathBuf>,
    pub target_arch: Option<String>,
    pub chroot_home: Option<PathBuf>,
    pub resultdir: Option<PathBuf>,
    pub statedir: Option<PathBuf>,
    pub cache_topdir: Option<String>,
    pub cache_ext: Option<String>,
    pub max_cache_age_days: Option<u64>,
    pub use_cache: Option<bool>,
    pub rebuild_cache: Option<bool>,
    pub clean: Option<bool>,
    pub package_manager: Option<String>,
    pub chroot_setup_cmd: Option<String>,
    pub package_manager_conf: Option<String>,
    pub mount: Option<String>,
    pub umount: Option<String>,
    pub chmod: Option<String>,
    pub chown: Option<String>,
    pub rm: Option<String>,
    pub chroot: Option<String>,
    pub runuser: Option<String>,
    pub rpm: Option<String>,
    pub pack_cmd: Option<String>,
    pub unpack_cmd: Option<String>,
    pub build_timeout: Option<u64>,
    pub chroot_uid: Option<u32>,
    pub chroot_gid: Option<u32>,
    pub chroot_user: Option<String>,
    pub chroot_group: Option<String>,
    pub files: Option<BTreeMap<String, String>>,
    pub macros: Option<String>,
    pub use_host_resolv: Option<bool>,
}

/// Fully resolved settings for one build root. Immutable once the root is
/// constructed.
#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: log::LevelFilter,
    /// Mirror `root.log` to the console at info level
    pub verbose: bool,
    /// Name of the build root, e.g. `fedora-39-x86_64`
    pub root: String,
    /// Lets several roots of the same name coexist as `<root>-<ext>`
    pub unique_ext: Option<String>,
    pub basedir: PathBuf,
    /// `basedir` must sit under this; not settable from files or the CLI
    pub storage_prefix: PathBuf,
    pub target_arch: String,
    /// Home of the build user, as seen from inside the root
    pub chroot_home: PathBuf,
    pub resultdir: Option<PathBuf>,
    pub statedir: Option<PathBuf>,
    pub cache_topdir: String,
    pub cache_ext: String,
    /// Caches older than this are rebuilt. 0 disables the check.
    pub max_cache_age_days: u64,
    pub use_cache: bool,
    pub rebuild_cache: bool,
    /// Remove the whole root before preparing it again
    pub clean: bool,
    pub package_manager: String,
    /// Package manager subcommand that bootstraps an empty root
    pub chroot_setup_cmd: String,
    /// Written to `etc/yum.conf` inside the root on every prep
    pub package_manager_conf: String,
    pub mount: String,
    pub umount: String,
    pub chmod: String,
    pub chown: String,
    pub rm: String,
    pub chroot: String,
    pub runuser: String,
    pub rpm: String,
    /// Archive command template, `{basedir}` and `{cache}` are substituted
    pub pack_cmd: String,
    pub unpack_cmd: String,
    /// Seconds the compile step may take. 0 means no limit.
    pub build_timeout: u64,
    pub chroot_uid: u32,
    pub chroot_gid: u32,
    pub chroot_user: String,
    pub chroot_group: String,
    /// Files created inside the root (path -> content) unless already there
    pub files: BTreeMap<String, String>,
    pub macros: String,
    pub use_host_resolv: bool,
    /// Where each setting came from, for `buildroot config`
    pub sources: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: log::LevelFilter::Info,
            verbose: false,
            root: "default".to_string(),
            unique_ext: None,
            basedir: PathBuf::from(STORAGE_PREFIX),
            storage_prefix: PathBuf::from(STORAGE_PREFIX),
            target_arch: std::env::consts::ARCH.to_string(),
            chroot_home: PathBuf::from("/builddir"),
            resultdir: None,
            statedir: None,
            cache_topdir: "root-cache".to_string(),
            cache_ext: ".tar.gz".to_string(),
            max_cache_age_days: 15,
            use_cache: true,
            rebuild_cache: false,
            clean: true,
            package_manager: "/usr/bin/yum".to_string(),
            chroot_setup_cmd: "groupinstall buildsys-build".to_string(),
            package_manager_conf: DEFAULT_PACKAGE_MANAGER_CONF.to_string(),
            mount: "/bin/mount".to_string(),
            umount: "/bin/umount".to_string(),
            chmod: "/bin/chmod".to_string(),
            chown: "/bin/chown".to_string(),
            rm: "/bin/rm".to_string(),
            chroot: "/usr/sbin/chroot".to_string(),
            runuser: "/sbin/runuser".to_string(),
            rpm: "/bin/rpm".to_string(),
            pack_cmd: "/bin/tar --one-file-system -C {basedir} -czf {cache} root".to_string(),
            unpack_cmd: "/bin/tar -C {basedir} -xzf {cache}".to_string(),
            build_timeout: 0,
            chroot_uid: nix::unistd::getuid().as_raw(),
            chroot_gid: nix::unistd::getgid().as_raw(),
            chroot_user: "mockbuild".to_string(),
            chroot_group: "mockbuild".to_string(),
            files: BTreeMap::new(),
            macros: DEFAULT_MACROS.to_string(),
            use_host_resolv: true,
            sources: HashMap::new(),
        }
    }
}
