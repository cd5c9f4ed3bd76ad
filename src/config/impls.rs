use super::structs::{Config, PartialConfig};

use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;

pub(crate) fn deserialize_level_filter<'de, D>(
    deserializer: D,
) -> Result<Option<log::LevelFilter>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: Option<String> = Option::deserialize(deserializer)?;
    s.map_or(Ok(None), |s| {
        log::LevelFilter::from_str(&s)
            .map(Some)
            .map_err(serde::de::Error::custom)
    })
}

/* Copies every field set in `layer` over `base`, remembering where it came from */
macro_rules! merge_fields {
    ($base:expr, $layer:expr, $sources:expr, $source:expr; $($field:ident),* $(,)?) => {
        $(
            if let Some(value) = $layer.$field {
                $base.$field = Some(value);
                $sources.insert(stringify!($field).to_string(), $source.to_string());
            }
        )*
    };
}

/* Fills resolved settings from a merged layer, leaving defaults where unset */
macro_rules! apply_fields {
    ($config:expr, $partial:expr; $($field:ident),* $(,)?) => {
        $(
            if let Some(value) = $partial.$field {
                $config.$field = value;
            }
        )*
    };
}

impl PartialConfig {
    pub fn merge(
        &mut self,
        layer: PartialConfig,
        sources: &mut HashMap<String, String>,
        source: &str,
    ) {
        // files are additive, later layers override individual paths
        if let Some(files) = layer.files {
            self.files.get_or_insert_with(Default::default).extend(files);
            sources.insert("files".to_string(), source.to_string());
        }
        merge_fields!(self, layer, sources, source;
            log_level, verbose, root, unique_ext, basedir, target_arch,
            chroot_home, resultdir, statedir, cache_topdir, cache_ext,
            max_cache_age_days, use_cache, rebuild_cache, clean,
            package_manager, chroot_setup_cmd, package_manager_conf,
            mount, umount, chmod, chown, rm, chroot, runuser, rpm,
            pack_cmd, unpack_cmd, build_timeout, chroot_uid, chroot_gid,
            chroot_user, chroot_group, macros, use_host_resolv,
        );
    }

    pub fn apply_to(self, config: &mut Config) {
        if self.unique_ext.is_some() {
            config.unique_ext = self.unique_ext;
        }
        if self.resultdir.is_some() {
            config.resultdir = self.resultdir;
        }
        if self.statedir.is_some() {
            config.statedir = self.statedir;
        }
        apply_fields!(config, self;
            log_level, verbose, root, basedir, target_arch, chroot_home,
            cache_topdir, cache_ext, max_cache_age_days, use_cache,
            rebuild_cache, clean, package_manager, chroot_setup_cmd,
            package_manager_conf, mount, umount, chmod, chown, rm, chroot,
            runuser, rpm, pack_cmd, unpack_cmd, build_timeout, chroot_uid,
            chroot_gid, chroot_user, chroot_group, files, macros,
            use_host_resolv,
        );
    }
}

impl Config {
    /// The value of a setting as `buildroot config` prints it.
    pub fn value_of(&self, key: &str) -> Option<String> {
        let opt_path = |p: &Option<std::path::PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        };
        let value = match key {
            "log_level" => self.log_level.to_string(),
            "verbose" => self.verbose.to_string(),
            "root" => self.root.clone(),
            "unique_ext" => self.unique_ext.clone().unwrap_or_default(),
            "basedir" => self.basedir.display().to_string(),
            "target_arch" => self.target_arch.clone(),
            "chroot_home" => self.chroot_home.display().to_string(),
            "resultdir" => opt_path(&self.resultdir),
            "statedir" => opt_path(&self.statedir),
            "cache_topdir" => self.cache_topdir.clone(),
            "cache_ext" => self.cache_ext.clone(),
            "max_cache_age_days" => self.max_cache_age_days.to_string(),
            "use_cache" => self.use_cache.to_string(),
            "rebuild_cache" => self.rebuild_cache.to_string(),
            "clean" => self.clean.to_string(),
            "package_manager" => self.package_manager.clone(),
            "chroot_setup_cmd" => self.chroot_setup_cmd.clone(),
            "build_timeout" => self.build_timeout.to_string(),
            "chroot_uid" => self.chroot_uid.to_string(),
            "chroot_gid" => self.chroot_gid.to_string(),
            "chroot_user" => self.chroot_user.clone(),
            "chroot_group" => self.chroot_group.clone(),
            "use_host_resolv" => self.use_host_resolv.to_string(),
            _ => return None,
        };
        Some(value)
    }
}
