//! Resource implementation handle, its factory, and the extra pointer slot.

use crate::types::{
    alt_Array_String, alt_CEvent, alt_IResource, alt_IResource_CreationInfo, alt_IResource_Impl,
    alt_RefBase_RefStore_IBaseObject, OnCreateBaseObjectFn, OnEventFn, OnRemoveBaseObjectFn,
    ResourceTickFn, StartFn, StopFn,
};
#[cfg(feature = "server-api")]
use crate::types::MakeClientFn;
use core::ffi::c_void;
use core::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use tracing::trace;

/// Callbacks registered for one resource. Fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct ResourceCallbacks {
    #[cfg(feature = "server-api")]
    pub make_client: MakeClientFn,
    pub start: StartFn,
    pub stop: StopFn,
    pub on_event: OnEventFn,
    pub on_tick: ResourceTickFn,
    pub on_create_base_object: OnCreateBaseObjectFn,
    pub on_remove_base_object: OnRemoveBaseObjectFn,
}

/// Concrete object behind an `alt_IResource_Impl*`.
///
/// The extra slot is an atomic pointer: concurrent set/get never tear, and the
/// last writer wins. The pointee is never read, copied or freed here.
#[derive(Debug)]
pub struct ResourceImplHandle {
    resource: *mut alt_IResource,
    callbacks: ResourceCallbacks,
    extra: AtomicPtr<c_void>,
}

impl ResourceImplHandle {
    /// Allocate a handle and hand its ownership to the caller as a raw pointer.
    pub fn into_raw(
        resource: *mut alt_IResource,
        callbacks: ResourceCallbacks,
    ) -> *mut alt_IResource_Impl {
        Box::into_raw(Box::new(Self {
            resource,
            callbacks,
            extra: AtomicPtr::new(ptr::null_mut()),
        }))
        .cast()
    }

    /// Borrow the handle behind a raw pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by [`ResourceImplHandle::into_raw`].
    pub unsafe fn from_raw<'a>(ptr: *mut alt_IResource_Impl) -> Option<&'a Self> {
        ptr.cast::<Self>().as_ref()
    }

    /// Free a handle. The extra pointer is left untouched.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`ResourceImplHandle::into_raw`] and must not be used afterwards.
    pub unsafe fn release(ptr: *mut alt_IResource_Impl) {
        if !ptr.is_null() {
            drop(Box::from_raw(ptr.cast::<Self>()));
        }
    }

    pub fn as_raw(&self) -> *mut alt_IResource_Impl {
        self as *const Self as *mut alt_IResource_Impl
    }

    /// The resource this implementation was created for.
    pub fn resource(&self) -> *mut alt_IResource {
        self.resource
    }

    pub fn callbacks(&self) -> &ResourceCallbacks {
        &self.callbacks
    }

    /// Replace the extra pointer. The previous value is dropped on the floor.
    pub fn set_extra(&self, extra: *mut c_void) {
        self.extra.store(extra, Ordering::Release);
    }

    /// The last stored extra pointer, or null if none was ever set.
    pub fn extra(&self) -> *mut c_void {
        self.extra.load(Ordering::Acquire)
    }

    // Host-side invocation. A missing callback yields the neutral value.

    /// # Safety
    ///
    /// `info` and `files` must be valid host objects for the duration of the call.
    #[cfg(feature = "server-api")]
    pub unsafe fn make_client(
        &self,
        info: *mut alt_IResource_CreationInfo,
        files: *mut alt_Array_String,
    ) -> bool {
        match self.callbacks.make_client {
            Some(f) => f(self.resource, info, files),
            None => false,
        }
    }

    /// # Safety
    ///
    /// The owning resource must still be alive.
    pub unsafe fn start(&self) -> bool {
        match self.callbacks.start {
            Some(f) => f(self.resource),
            None => false,
        }
    }

    /// # Safety
    ///
    /// The owning resource must still be alive.
    pub unsafe fn stop(&self) -> bool {
        match self.callbacks.stop {
            Some(f) => f(self.resource),
            None => false,
        }
    }

    /// # Safety
    ///
    /// `event` must be valid for the duration of the call.
    pub unsafe fn on_event(&self, event: *mut alt_CEvent) -> bool {
        match self.callbacks.on_event {
            Some(f) => f(self.resource, event),
            None => false,
        }
    }

    /// # Safety
    ///
    /// The owning resource must still be alive.
    pub unsafe fn tick(&self) {
        if let Some(f) = self.callbacks.on_tick {
            f(self.resource);
        }
    }

    /// # Safety
    ///
    /// `object` must be valid for the duration of the call.
    pub unsafe fn on_create_base_object(&self, object: *mut alt_RefBase_RefStore_IBaseObject) {
        if let Some(f) = self.callbacks.on_create_base_object {
            f(self.resource, object);
        }
    }

    /// # Safety
    ///
    /// `object` must be valid for the duration of the call.
    pub unsafe fn on_remove_base_object(&self, object: *mut alt_RefBase_RefStore_IBaseObject) {
        if let Some(f) = self.callbacks.on_remove_base_object {
            f(self.resource, object);
        }
    }
}

/// Bind a resource to the module's callbacks.
///
/// Nothing is invoked here; the host is the only caller of the stored
/// callbacks. Ownership of the returned handle passes to the host.
#[no_mangle]
#[allow(clippy::too_many_arguments)]
pub extern "C" fn alt_CAPIResource_Impl_Create(
    resource: *mut alt_IResource,
    #[cfg(feature = "server-api")] make_client: MakeClientFn,
    start: StartFn,
    stop: StopFn,
    on_event: OnEventFn,
    on_tick: ResourceTickFn,
    on_create_base_object: OnCreateBaseObjectFn,
    on_remove_base_object: OnRemoveBaseObjectFn,
) -> *mut alt_IResource_Impl {
    let handle = ResourceImplHandle::into_raw(
        resource,
        ResourceCallbacks {
            #[cfg(feature = "server-api")]
            make_client,
            start,
            stop,
            on_event,
            on_tick,
            on_create_base_object,
            on_remove_base_object,
        },
    );
    trace!(handle = ?handle, resource = ?resource, "Created resource implementation handle");
    handle
}

/// Store `extra` on the handle, replacing any previous value without freeing it.
///
/// A null handle is ignored.
#[no_mangle]
pub unsafe extern "C" fn alt_CAPIResource_Impl_SetExtra(
    resource: *mut alt_IResource_Impl,
    extra: *mut c_void,
) {
    if let Some(handle) = ResourceImplHandle::from_raw(resource) {
        handle.set_extra(extra);
    }
}

/// Read the extra pointer. Null if never set or if the handle is null.
#[no_mangle]
pub unsafe extern "C" fn alt_CAPIResource_Impl_GetExtra(
    resource: *mut alt_IResource_Impl,
) -> *mut c_void {
    match ResourceImplHandle::from_raw(resource) {
        Some(handle) => handle.extra(),
        None => ptr::null_mut(),
    }
}
