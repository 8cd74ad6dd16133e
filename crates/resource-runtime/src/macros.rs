//! Module export macro.

/// Export a script runtime module.
///
/// Emits, in the invoking crate:
/// - `resource_module_main`, which builds the runtime with the given factory
///   (a `FnOnce(&RuntimeConfig) -> impl ScriptRuntime`) and returns its handle,
/// - `GetSDKVersion`, reporting the SDK version the module was built against,
/// - `SkipSDKVersionCheck`, only with the `skip_version_check` flag.
///
/// ```ignore
/// resource_runtime::export_module!(|config: &RuntimeConfig| MyRuntime::new(config));
/// resource_runtime::export_module!(MyRuntime::from_config, skip_version_check);
/// ```
#[macro_export]
macro_rules! export_module {
    (@entry $factory:expr) => {
        #[no_mangle]
        pub extern "C" fn resource_module_main() -> *mut $crate::capi::alt_IScriptRuntime {
            $crate::bootstrap($factory)
        }
    };
    ($factory:expr, skip_version_check) => {
        $crate::capi::export_skip_version_check!();
        $crate::capi::export_sdk_version!();
        $crate::export_module!(@entry $factory);
    };
    ($factory:expr) => {
        $crate::capi::export_sdk_version!();
        $crate::export_module!(@entry $factory);
    };
}
