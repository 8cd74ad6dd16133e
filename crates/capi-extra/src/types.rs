//! Opaque types and callback signatures shared across the C boundary.
//!
//! Host-owned types are declared as zero-sized `#[repr(C)]` structs that can
//! only be handled by pointer. Their layout is never inspected on this side.

use core::marker::{PhantomData, PhantomPinned};

macro_rules! opaque_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[repr(C)]
        pub struct $name {
            _data: [u8; 0],
            _marker: PhantomData<(*mut u8, PhantomPinned)>,
        }
    };
}

opaque_type!(
    /// Host core instance.
    alt_ICore
);
opaque_type!(
    /// A loaded unit of resource content.
    alt_IResource
);
opaque_type!(
    /// Creation parameters the host fills in when materializing a client resource.
    alt_IResource_CreationInfo
);
opaque_type!(
    /// Host string array (client file list).
    alt_Array_String
);
opaque_type!(
    /// An event delivered to a resource.
    alt_CEvent
);
opaque_type!(
    /// Ref-counted store wrapping a host base object.
    alt_RefBase_RefStore_IBaseObject
);
opaque_type!(
    /// Script runtime interface as seen by the host. Backed by [`crate::ScriptRuntimeHandle`].
    alt_IScriptRuntime
);
opaque_type!(
    /// Resource implementation interface as seen by the host. Backed by [`crate::ResourceImplHandle`].
    alt_IResource_Impl
);

// =============================================================================
// Script runtime callbacks
// =============================================================================

/// Builds the implementation for a resource the host is about to load.
pub type CreateImplFn = Option<
    unsafe extern "C" fn(
        runtime: *mut alt_IScriptRuntime,
        resource: *mut alt_IResource,
    ) -> *mut alt_IResource_Impl,
>;

/// Tears down an implementation previously returned by [`CreateImplFn`].
pub type DestroyImplFn = Option<
    unsafe extern "C" fn(runtime: *mut alt_IScriptRuntime, implementation: *mut alt_IResource_Impl),
>;

pub type RuntimeTickFn = Option<unsafe extern "C" fn(runtime: *mut alt_IScriptRuntime)>;

// =============================================================================
// Resource implementation callbacks
// =============================================================================

/// Server API only: fills in the client-side resource description.
pub type MakeClientFn = Option<
    unsafe extern "C" fn(
        resource: *mut alt_IResource,
        info: *mut alt_IResource_CreationInfo,
        files: *mut alt_Array_String,
    ) -> bool,
>;

pub type StartFn = Option<unsafe extern "C" fn(resource: *mut alt_IResource) -> bool>;

pub type StopFn = Option<unsafe extern "C" fn(resource: *mut alt_IResource) -> bool>;

pub type OnEventFn =
    Option<unsafe extern "C" fn(resource: *mut alt_IResource, event: *mut alt_CEvent) -> bool>;

pub type ResourceTickFn = Option<unsafe extern "C" fn(resource: *mut alt_IResource)>;

pub type OnCreateBaseObjectFn = Option<
    unsafe extern "C" fn(resource: *mut alt_IResource, object: *mut alt_RefBase_RefStore_IBaseObject),
>;

pub type OnRemoveBaseObjectFn = Option<
    unsafe extern "C" fn(resource: *mut alt_IResource, object: *mut alt_RefBase_RefStore_IBaseObject),
>;
