//! Module loading and SDK version checks.
//!
//! A module is a shared library built against `capi-extra`. The loader reads
//! three well-known symbols from it:
//!
//! - `SkipSDKVersionCheck`: presence alone accepts the module,
//! - `GetSDKVersion`: compared against the host's SDK version,
//! - `resource_module_main`: returns the module's script runtime handle.
//!
//! The policy itself lives in [`check_compatibility`] so it can be tested
//! without a shared library.

use capi_extra::{
    alt_IScriptRuntime, GetSdkVersionFn, ModuleEntryFn, SkipVersionCheckFn, MODULE_ENTRY_SYMBOL,
    SDK_VERSION_SYMBOL, SKIP_VERSION_CHECK_SYMBOL,
};
use chrono::{DateTime, Utc};
use libloading::Library;
use resource_runtime::RuntimeConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::HostSection;

/// Errors raised while loading a module.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open module {}: {source}", .path.display())]
    LibraryOpen {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("module was built against SDK version {module}, host expects {host}")]
    VersionMismatch { module: u32, host: u32 },

    #[error("module exports neither `SkipSDKVersionCheck` nor `GetSDKVersion`")]
    MissingVersion,

    #[error("module {} does not export `resource_module_main`", .path.display())]
    MissingEntry { path: PathBuf },

    #[error("module {} returned a null script runtime", .path.display())]
    NullRuntime { path: PathBuf },
}

/// Version markers found in a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSymbols {
    /// `SkipSDKVersionCheck` is exported.
    pub skip_version_check: bool,
    /// Value returned by `GetSDKVersion`, if exported.
    pub sdk_version: Option<u32>,
    /// `resource_module_main` is exported.
    pub has_entry: bool,
}

impl ModuleSymbols {
    /// Read the markers from an opened library.
    ///
    /// # Safety
    ///
    /// Symbols with the well-known names must have the facade's signatures.
    pub unsafe fn read(library: &Library) -> Self {
        let skip_version_check = library
            .get::<SkipVersionCheckFn>(SKIP_VERSION_CHECK_SYMBOL.as_bytes())
            .is_ok();
        let sdk_version = library
            .get::<GetSdkVersionFn>(SDK_VERSION_SYMBOL.as_bytes())
            .ok()
            .map(|get_version| get_version());
        let has_entry = library
            .get::<ModuleEntryFn>(MODULE_ENTRY_SYMBOL.as_bytes())
            .is_ok();

        Self {
            skip_version_check,
            sdk_version,
            has_entry,
        }
    }
}

/// Why a module was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compatibility {
    /// The module exports the skip marker.
    Skipped,
    /// The module's SDK version equals the host's.
    Matched,
    /// The module declares no version and enforcement is off.
    Unchecked,
}

/// Decide whether a module with `symbols` may run on a host at `host_version`.
///
/// The skip marker wins over everything else, including a mismatching version.
pub fn check_compatibility(
    symbols: &ModuleSymbols,
    host_version: u32,
    enforce_version: bool,
) -> Result<Compatibility, LoadError> {
    if symbols.skip_version_check {
        return Ok(Compatibility::Skipped);
    }

    match symbols.sdk_version {
        Some(module) if module == host_version => Ok(Compatibility::Matched),
        Some(module) => Err(LoadError::VersionMismatch {
            module,
            host: host_version,
        }),
        None if enforce_version => Err(LoadError::MissingVersion),
        None => Ok(Compatibility::Unchecked),
    }
}

/// Result of inspecting one module, printed by `capi-host inspect`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleReport {
    pub path: PathBuf,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<Compatibility>,
    pub skip_version_check: bool,
    pub module_sdk_version: Option<u32>,
    pub host_sdk_version: u32,
    pub has_entry: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub inspected_at: DateTime<Utc>,
}

/// A module that passed the version check.
///
/// The library stays loaded for as long as this value lives; every runtime
/// obtained from it must be destroyed first.
pub struct LoadedModule {
    path: PathBuf,
    symbols: ModuleSymbols,
    compatibility: Compatibility,
    runtime_config: Option<PathBuf>,
    library: Library,
}

impl LoadedModule {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn symbols(&self) -> &ModuleSymbols {
        &self.symbols
    }

    pub fn compatibility(&self) -> Compatibility {
        self.compatibility
    }

    /// Runtime config file handed to the module entry, if any.
    pub fn runtime_config(&self) -> Option<&Path> {
        self.runtime_config.as_deref()
    }

    /// Call the module entry and return its script runtime handle.
    ///
    /// The module reads its configuration inside the entry, so
    /// `RESOURCE_RUNTIME_CONFIG` is pointed at this module's file (or removed)
    /// right before the call. Entries of different modules must not run
    /// concurrently.
    ///
    /// # Safety
    ///
    /// The returned handle points into this module and must not outlive it.
    pub unsafe fn create_runtime(&self) -> Result<*mut alt_IScriptRuntime, LoadError> {
        let entry = self
            .library
            .get::<ModuleEntryFn>(MODULE_ENTRY_SYMBOL.as_bytes())
            .map_err(|_| LoadError::MissingEntry {
                path: self.path.clone(),
            })?;

        match &self.runtime_config {
            Some(config) => std::env::set_var(RuntimeConfig::ENV_VAR, config),
            None => std::env::remove_var(RuntimeConfig::ENV_VAR),
        }
        let runtime = entry();
        if runtime.is_null() {
            return Err(LoadError::NullRuntime {
                path: self.path.clone(),
            });
        }

        debug!(path = %self.path.display(), "Module returned script runtime");
        Ok(runtime)
    }
}

impl std::fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModule")
            .field("path", &self.path)
            .field("symbols", &self.symbols)
            .field("compatibility", &self.compatibility)
            .field("runtime_config", &self.runtime_config)
            .finish_non_exhaustive()
    }
}

/// Opens modules and applies the version policy.
#[derive(Debug, Clone)]
pub struct ModuleLoader {
    host_version: u32,
    enforce_version: bool,
}

impl ModuleLoader {
    pub fn new(host_version: u32, enforce_version: bool) -> Self {
        Self {
            host_version,
            enforce_version,
        }
    }

    pub fn from_config(host: &HostSection) -> Self {
        Self::new(host.sdk_version, host.enforce_version)
    }

    pub fn host_version(&self) -> u32 {
        self.host_version
    }

    /// Open `path` and accept it if its version markers allow.
    ///
    /// The module's entry runs with default runtime configuration.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<LoadedModule, LoadError> {
        self.load_with_config(path, None)
    }

    /// Like [`ModuleLoader::load`], remembering a runtime config file that
    /// [`LoadedModule::create_runtime`] hands to the module entry.
    pub fn load_with_config(
        &self,
        path: impl AsRef<Path>,
        config: Option<&Path>,
    ) -> Result<LoadedModule, LoadError> {
        let path = path.as_ref();
        let (library, symbols) = self.open(path)?;

        let compatibility =
            match check_compatibility(&symbols, self.host_version, self.enforce_version) {
                Ok(compatibility) => compatibility,
                Err(e) => {
                    warn!(path = %path.display(), "Rejected module: {}", e);
                    return Err(e);
                }
            };

        info!(
            path = %path.display(),
            ?compatibility,
            module_version = ?symbols.sdk_version,
            "Loaded module"
        );

        Ok(LoadedModule {
            path: path.to_path_buf(),
            symbols,
            compatibility,
            runtime_config: config.map(Path::to_path_buf),
            library,
        })
    }

    /// Open `path` and report on it without keeping it loaded.
    pub fn inspect(&self, path: impl AsRef<Path>) -> ModuleReport {
        let path = path.as_ref();
        let mut report = ModuleReport {
            path: path.to_path_buf(),
            accepted: false,
            compatibility: None,
            skip_version_check: false,
            module_sdk_version: None,
            host_sdk_version: self.host_version,
            has_entry: false,
            error: None,
            inspected_at: Utc::now(),
        };

        let symbols = match self.open(path) {
            Ok((_library, symbols)) => symbols,
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        };

        report.skip_version_check = symbols.skip_version_check;
        report.module_sdk_version = symbols.sdk_version;
        report.has_entry = symbols.has_entry;

        match check_compatibility(&symbols, self.host_version, self.enforce_version) {
            Ok(compatibility) => {
                report.accepted = true;
                report.compatibility = Some(compatibility);
            }
            Err(e) => report.error = Some(e.to_string()),
        }
        report
    }

    fn open(&self, path: &Path) -> Result<(Library, ModuleSymbols), LoadError> {
        // SAFETY: loading a module runs its initialisers; modules are trusted by the host.
        let library = unsafe { Library::new(path) }.map_err(|source| LoadError::LibraryOpen {
            path: path.to_path_buf(),
            source,
        })?;

        // SAFETY: the well-known symbol names carry the facade's signatures.
        let symbols = unsafe { ModuleSymbols::read(&library) };
        debug!(path = %path.display(), ?symbols, "Read module symbols");
        Ok((library, symbols))
    }
}

impl Default for ModuleLoader {
    fn default() -> Self {
        Self::from_config(&HostSection::default())
    }
}
