//! Where plugin modules are looked for.
use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReadDirStream;

/// Environment variable replacing the platform's default search directories.
pub const PLUGIN_DIRS_ENV: &str = "PELORUS_PLUGIN_DIRS";

/// File extension of loadable modules on this platform, without the dot.
pub const fn module_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

pub fn is_module_file(path: &Path) -> bool {
    path.extension().and_then(OsStr::to_str).is_some_and(|ext| ext.eq_ignore_ascii_case(module_extension()))
}

/// The plugin's name as derived from its file: stem without the platform
/// `lib` prefix, e.g. `libdashboard_pi.so` gives `dashboard_pi`.
pub fn module_short_name(path: &Path) -> String {
    let stem = path.file_stem().and_then(OsStr::to_str).unwrap_or_default();
    if cfg!(not(windows)) {
        if let Some(stripped) = stem.strip_prefix("lib") {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    stem.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DirectoryKind {
    /// Writable by the user; plugins installed by the user live here.
    User,
    /// Shipped with or installed alongside the host.
    System,
}

/// The user-writable plugin directory plus the ordered list of directories
/// scanned for modules. Earlier directories win authority ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginPaths {
    user_libdir: PathBuf,
    libdirs: Vec<PathBuf>,
}

impl PluginPaths {
    pub fn new(user_libdir: impl Into<PathBuf>, libdirs: Vec<PathBuf>) -> Self {
        Self { user_libdir: user_libdir.into(), libdirs }
    }

    /// Platform defaults, honouring [`PLUGIN_DIRS_ENV`].
    pub fn from_env() -> Self {
        let home = env::var_os("HOME")
            .or_else(|| env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let overrides = env::var(PLUGIN_DIRS_ENV).ok();
        Self::resolve(&home, overrides.as_deref())
    }

    /// Builds the paths for `home`. A non-empty `overrides` list replaces the
    /// search directories entirely; the user directory stays the platform one.
    pub fn resolve(home: &Path, overrides: Option<&str>) -> Self {
        let user_libdir = Self::default_user_libdir(home);
        let libdirs = match overrides.map(str::trim).filter(|s| !s.is_empty()) {
            Some(list) => env::split_paths(list).filter(|dir| !dir.as_os_str().is_empty()).collect(),
            None => {
                let mut dirs = vec![user_libdir.clone()];
                dirs.extend(Self::default_system_dirs());
                dirs
            }
        };
        Self { user_libdir, libdirs }
    }

    #[cfg(target_os = "macos")]
    fn default_user_libdir(home: &Path) -> PathBuf {
        home.join("Library/Application Support/Pelorus/PlugIns")
    }

    #[cfg(windows)]
    fn default_user_libdir(home: &Path) -> PathBuf {
        home.join("AppData").join("Local").join("pelorus").join("plugins")
    }

    #[cfg(not(any(target_os = "macos", windows)))]
    fn default_user_libdir(home: &Path) -> PathBuf {
        home.join(".local/lib/pelorus")
    }

    #[cfg(target_os = "macos")]
    fn default_system_dirs() -> Vec<PathBuf> {
        vec![PathBuf::from("/Applications/Pelorus.app/Contents/PlugIns")]
    }

    #[cfg(windows)]
    fn default_system_dirs() -> Vec<PathBuf> {
        let program_files = env::var_os("ProgramFiles").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("C:\\Program Files"));
        vec![program_files.join("Pelorus").join("plugins")]
    }

    #[cfg(not(any(target_os = "macos", windows)))]
    fn default_system_dirs() -> Vec<PathBuf> {
        vec![PathBuf::from("/usr/local/lib/pelorus"), PathBuf::from("/usr/lib/pelorus")]
    }

    pub fn user_libdir(&self) -> &Path {
        &self.user_libdir
    }

    pub fn libdirs(&self) -> &[PathBuf] {
        &self.libdirs
    }

    /// Classifies the directory holding `file`.
    pub fn directory_kind(&self, file: &Path) -> DirectoryKind {
        match file.parent() {
            Some(dir) if dir == self.user_libdir => DirectoryKind::User,
            _ => DirectoryKind::System,
        }
    }
}

impl Default for PluginPaths {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Lists module files directly inside `dir`, sorted by file name.
pub async fn discover_modules(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let entries = tokio::fs::read_dir(dir).await?;
    let mut stream = ReadDirStream::new(entries);
    let mut found = Vec::new();
    while let Some(entry) = stream.next().await {
        let path = entry?.path();
        if !is_module_file(&path) {
            continue;
        }
        // Follows symlinks, so linked modules are picked up too.
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => found.push(path),
            Ok(_) => {}
            Err(e) => log::warn!("Skipping {}: {}", path.display(), e),
        }
    }
    found.sort();
    Ok(found)
}
