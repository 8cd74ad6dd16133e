//! SDK version markers and well-known module symbols.
//!
//! A module declares its compatibility to the host through exported symbols
//! rather than through return values:
//!
//! - `SkipSDKVersionCheck`: presence alone tells the loader to bypass the
//!   version comparison. The function body does nothing.
//! - `GetSDKVersion`: the SDK version the module was built against.
//!
//! Use [`export_skip_version_check!`](crate::export_skip_version_check) and
//! [`export_sdk_version!`](crate::export_sdk_version) from the module crate
//! root to emit them.

use crate::types::alt_IScriptRuntime;

/// SDK version this build of the facade implements.
pub const SDK_VERSION: u32 = 36;

pub const SKIP_VERSION_CHECK_SYMBOL: &str = "SkipSDKVersionCheck";
pub const SDK_VERSION_SYMBOL: &str = "GetSDKVersion";

/// Entry point a module exports so the host can obtain its script runtime.
pub const MODULE_ENTRY_SYMBOL: &str = "resource_module_main";

pub type SkipVersionCheckFn = unsafe extern "C" fn();
pub type GetSdkVersionFn = unsafe extern "C" fn() -> u32;
pub type ModuleEntryFn = unsafe extern "C" fn() -> *mut alt_IScriptRuntime;

/// Host-process builds report their own SDK version.
#[cfg(feature = "host")]
#[no_mangle]
pub extern "C" fn alt_GetSDKVersion() -> u32 {
    SDK_VERSION
}

/// Export the `SkipSDKVersionCheck` marker from the invoking crate.
#[macro_export]
macro_rules! export_skip_version_check {
    () => {
        #[no_mangle]
        pub extern "C" fn SkipSDKVersionCheck() {}
    };
}

/// Export `GetSDKVersion` from the invoking crate.
///
/// Defaults to [`SDK_VERSION`](crate::SDK_VERSION); pass an expression to
/// report something else.
#[macro_export]
macro_rules! export_sdk_version {
    () => {
        $crate::export_sdk_version!($crate::SDK_VERSION);
    };
    ($version:expr) => {
        #[no_mangle]
        pub extern "C" fn GetSDKVersion() -> u32 {
            $version
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    mod exported {
        crate::export_skip_version_check!();
        crate::export_sdk_version!();
    }

    #[test]
    fn test_markers_are_callable() {
        exported::SkipSDKVersionCheck();
        assert_eq!(exported::GetSDKVersion(), SDK_VERSION);
    }

    #[test]
    fn test_symbol_names_match_exports() {
        assert_eq!(SKIP_VERSION_CHECK_SYMBOL, "SkipSDKVersionCheck");
        assert_eq!(SDK_VERSION_SYMBOL, "GetSDKVersion");
    }

    #[cfg(feature = "host")]
    #[test]
    fn test_host_reports_sdk_version() {
        assert_eq!(alt_GetSDKVersion(), SDK_VERSION);
    }
}
