//! # capi-extra
//!
//! C-ABI registration facade shared by the host process and script runtime
//! modules.
//!
//! This crate provides:
//! - Opaque handle types for host-owned objects (`alt_IResource`, `alt_CEvent`, ...)
//! - The script runtime factory (`alt_CAPIScriptRuntime_Create`)
//! - The resource implementation factory (`alt_CAPIResource_Impl_Create`)
//! - The per-resource "extra" pointer slot
//! - SDK version markers (`SkipSDKVersionCheck`, `GetSDKVersion`)
//!
//! ## Ownership
//!
//! Handles returned by the factories belong to the host. The facade never
//! invokes a callback on its own; the host drives every callback through the
//! invoke methods on [`ScriptRuntimeHandle`] and [`ResourceImplHandle`].
//!
//! ## Features
//!
//! - `server-api` (default): the resource factory takes a make-client callback.
//! - `host`: exports `alt_GetSDKVersion` for host-process builds.

#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]

pub mod resource_impl;
pub mod script_runtime;
pub mod symbols;
pub mod types;

pub use resource_impl::{
    alt_CAPIResource_Impl_Create, alt_CAPIResource_Impl_GetExtra, alt_CAPIResource_Impl_SetExtra,
    ResourceCallbacks, ResourceImplHandle,
};
pub use script_runtime::{alt_CAPIScriptRuntime_Create, ScriptRuntimeCallbacks, ScriptRuntimeHandle};
pub use symbols::{
    GetSdkVersionFn, ModuleEntryFn, SkipVersionCheckFn, MODULE_ENTRY_SYMBOL, SDK_VERSION,
    SDK_VERSION_SYMBOL, SKIP_VERSION_CHECK_SYMBOL,
};
#[cfg(feature = "host")]
pub use symbols::alt_GetSDKVersion;
pub use types::*;
