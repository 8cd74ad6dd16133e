//! Integration tests for the registration facade.
//!
//! These tests cover:
//! - Extra pointer slot semantics (set/get, replace, independence)
//! - Resource callbacks receiving the bound resource
//! - Factories producing distinct handles

use capi_extra::{
    alt_CAPIResource_Impl_Create, alt_CAPIResource_Impl_GetExtra, alt_CAPIResource_Impl_SetExtra,
    alt_CEvent, alt_IResource, alt_IResource_Impl, alt_RefBase_RefStore_IBaseObject,
    ResourceImplHandle,
};
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

// ==============================================================================
// Test Fixture Helpers
// ==============================================================================

static LAST_RESOURCE: AtomicUsize = AtomicUsize::new(0);
static EVENTS: AtomicUsize = AtomicUsize::new(0);
static LIVE_OBJECTS: Mutex<Vec<usize>> = Mutex::new(Vec::new());

unsafe extern "C" fn start(resource: *mut alt_IResource) -> bool {
    LAST_RESOURCE.store(resource as usize, Ordering::SeqCst);
    true
}

unsafe extern "C" fn stop(resource: *mut alt_IResource) -> bool {
    LAST_RESOURCE.store(resource as usize, Ordering::SeqCst);
    true
}

unsafe extern "C" fn on_event(_resource: *mut alt_IResource, event: *mut alt_CEvent) -> bool {
    EVENTS.fetch_add(1, Ordering::SeqCst);
    !event.is_null()
}

unsafe extern "C" fn on_tick(resource: *mut alt_IResource) {
    LAST_RESOURCE.store(resource as usize, Ordering::SeqCst);
}

unsafe extern "C" fn on_create(
    _resource: *mut alt_IResource,
    object: *mut alt_RefBase_RefStore_IBaseObject,
) {
    LIVE_OBJECTS.lock().unwrap().push(object as usize);
}

unsafe extern "C" fn on_remove(
    _resource: *mut alt_IResource,
    object: *mut alt_RefBase_RefStore_IBaseObject,
) {
    LIVE_OBJECTS
        .lock()
        .unwrap()
        .retain(|addr| *addr != object as usize);
}

#[cfg(feature = "server-api")]
unsafe extern "C" fn make_client(
    _resource: *mut alt_IResource,
    _info: *mut capi_extra::alt_IResource_CreationInfo,
    _files: *mut capi_extra::alt_Array_String,
) -> bool {
    true
}

fn create_handle(resource: *mut alt_IResource) -> *mut alt_IResource_Impl {
    alt_CAPIResource_Impl_Create(
        resource,
        #[cfg(feature = "server-api")]
        Some(make_client),
        Some(start),
        Some(stop),
        Some(on_event),
        Some(on_tick),
        Some(on_create),
        Some(on_remove),
    )
}

fn opaque<T, U>(value: &mut T) -> *mut U {
    (value as *mut T).cast()
}

// ==============================================================================
// Extra Slot Tests
// ==============================================================================

#[test]
fn test_set_then_get_returns_same_pointer() {
    let mut res = 1u8;
    let mut payload = String::from("state");
    let handle = create_handle(opaque(&mut res));

    unsafe {
        alt_CAPIResource_Impl_SetExtra(handle, opaque(&mut payload));
        assert_eq!(
            alt_CAPIResource_Impl_GetExtra(handle),
            opaque::<String, c_void>(&mut payload)
        );
        ResourceImplHandle::release(handle);
    }
}

#[test]
fn test_second_set_replaces_first() {
    let mut res = 1u8;
    let mut first = 10u32;
    let mut second = 20u32;
    let handle = create_handle(opaque(&mut res));

    unsafe {
        alt_CAPIResource_Impl_SetExtra(handle, opaque(&mut first));
        alt_CAPIResource_Impl_SetExtra(handle, opaque(&mut second));

        let extra = alt_CAPIResource_Impl_GetExtra(handle);
        assert_eq!(extra, opaque::<u32, c_void>(&mut second));
        assert_eq!(*extra.cast::<u32>(), 20);

        // The replaced value is untouched
        assert_eq!(first, 10);
        ResourceImplHandle::release(handle);
    }
}

#[test]
fn test_handles_have_independent_slots() {
    let mut res_a = 1u8;
    let mut res_b = 2u8;
    let mut extra_a = 'a';
    let mut extra_b = 'b';

    let a = create_handle(opaque(&mut res_a));
    let b = create_handle(opaque(&mut res_b));
    assert_ne!(a, b);

    unsafe {
        alt_CAPIResource_Impl_SetExtra(a, opaque(&mut extra_a));
        assert!(alt_CAPIResource_Impl_GetExtra(b).is_null());

        alt_CAPIResource_Impl_SetExtra(b, opaque(&mut extra_b));
        assert_eq!(alt_CAPIResource_Impl_GetExtra(a), opaque::<char, c_void>(&mut extra_a));
        assert_eq!(alt_CAPIResource_Impl_GetExtra(b), opaque::<char, c_void>(&mut extra_b));

        ResourceImplHandle::release(a);
        ResourceImplHandle::release(b);
    }
}

#[test]
fn test_clearing_extra_with_null() {
    let mut res = 1u8;
    let mut payload = 5i64;
    let handle = create_handle(opaque(&mut res));

    unsafe {
        alt_CAPIResource_Impl_SetExtra(handle, opaque(&mut payload));
        alt_CAPIResource_Impl_SetExtra(handle, std::ptr::null_mut());
        assert!(alt_CAPIResource_Impl_GetExtra(handle).is_null());
        ResourceImplHandle::release(handle);
    }
}

// ==============================================================================
// Callback Dispatch Tests
// ==============================================================================

#[test]
fn test_callbacks_receive_bound_resource() {
    let mut res = 42u64;
    let resource: *mut alt_IResource = opaque(&mut res);
    let raw = create_handle(resource);

    unsafe {
        let handle = ResourceImplHandle::from_raw(raw).unwrap();

        assert!(handle.start());
        assert_eq!(LAST_RESOURCE.load(Ordering::SeqCst), resource as usize);

        handle.tick();
        assert_eq!(LAST_RESOURCE.load(Ordering::SeqCst), resource as usize);

        assert!(handle.stop());
        ResourceImplHandle::release(raw);
    }
}

#[test]
fn test_event_and_object_callbacks() {
    let mut res = 0u8;
    let mut event = 0u8;
    let mut object = 0u16;
    let raw = create_handle(opaque(&mut res));
    let object_ptr: *mut alt_RefBase_RefStore_IBaseObject = opaque(&mut object);

    unsafe {
        let handle = ResourceImplHandle::from_raw(raw).unwrap();

        let before = EVENTS.load(Ordering::SeqCst);
        assert!(handle.on_event(opaque(&mut event)));
        assert!(!handle.on_event(std::ptr::null_mut()));
        assert_eq!(EVENTS.load(Ordering::SeqCst), before + 2);

        handle.on_create_base_object(object_ptr);
        assert!(LIVE_OBJECTS.lock().unwrap().contains(&(object_ptr as usize)));

        handle.on_remove_base_object(object_ptr);
        assert!(!LIVE_OBJECTS.lock().unwrap().contains(&(object_ptr as usize)));

        ResourceImplHandle::release(raw);
    }
}

#[cfg(feature = "server-api")]
#[test]
fn test_make_client_dispatch() {
    let mut res = 0u8;
    let mut info = 0u8;
    let mut files = 0u8;
    let raw = create_handle(opaque(&mut res));

    unsafe {
        let handle = ResourceImplHandle::from_raw(raw).unwrap();
        assert!(handle.make_client(opaque(&mut info), opaque(&mut files)));
        ResourceImplHandle::release(raw);
    }
}
