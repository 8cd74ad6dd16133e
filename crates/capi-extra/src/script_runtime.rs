//! Script runtime handle and its factory.

use crate::types::{
    alt_IResource, alt_IResource_Impl, alt_IScriptRuntime, CreateImplFn, DestroyImplFn,
    RuntimeTickFn,
};
use tracing::trace;

/// Callbacks registered for one script runtime. Fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct ScriptRuntimeCallbacks {
    pub create_impl: CreateImplFn,
    pub destroy_impl: DestroyImplFn,
    pub on_tick: RuntimeTickFn,
}

/// Concrete object behind an `alt_IScriptRuntime*`.
#[derive(Debug)]
pub struct ScriptRuntimeHandle {
    callbacks: ScriptRuntimeCallbacks,
}

impl ScriptRuntimeHandle {
    /// Allocate a handle and hand its ownership to the caller as a raw pointer.
    pub fn into_raw(callbacks: ScriptRuntimeCallbacks) -> *mut alt_IScriptRuntime {
        Box::into_raw(Box::new(Self { callbacks })).cast()
    }

    /// Borrow the handle behind a raw pointer.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live pointer returned by [`ScriptRuntimeHandle::into_raw`].
    pub unsafe fn from_raw<'a>(ptr: *mut alt_IScriptRuntime) -> Option<&'a Self> {
        ptr.cast::<Self>().as_ref()
    }

    /// Free a handle. The host calls this once it is done with the runtime.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`ScriptRuntimeHandle::into_raw`] and must not be used afterwards.
    pub unsafe fn release(ptr: *mut alt_IScriptRuntime) {
        if !ptr.is_null() {
            drop(Box::from_raw(ptr.cast::<Self>()));
        }
    }

    pub fn as_raw(&self) -> *mut alt_IScriptRuntime {
        self as *const Self as *mut alt_IScriptRuntime
    }

    pub fn callbacks(&self) -> &ScriptRuntimeCallbacks {
        &self.callbacks
    }

    /// Ask the runtime for a resource implementation. Null means the runtime declined.
    ///
    /// # Safety
    ///
    /// `resource` must be valid for as long as the returned implementation lives.
    pub unsafe fn create_impl(&self, resource: *mut alt_IResource) -> *mut alt_IResource_Impl {
        match self.callbacks.create_impl {
            Some(f) => f(self.as_raw(), resource),
            None => core::ptr::null_mut(),
        }
    }

    /// # Safety
    ///
    /// `implementation` must have been produced by [`ScriptRuntimeHandle::create_impl`] on this runtime.
    pub unsafe fn destroy_impl(&self, implementation: *mut alt_IResource_Impl) {
        if let Some(f) = self.callbacks.destroy_impl {
            f(self.as_raw(), implementation);
        }
    }

    /// # Safety
    ///
    /// The registered tick callback must be sound to call from the current thread.
    pub unsafe fn tick(&self) {
        if let Some(f) = self.callbacks.on_tick {
            f(self.as_raw());
        }
    }
}

/// Create a script runtime handle from the module's callbacks.
///
/// The callbacks are stored as given; nothing is invoked here. Ownership of the
/// returned handle passes to the host.
#[no_mangle]
pub extern "C" fn alt_CAPIScriptRuntime_Create(
    create_impl: CreateImplFn,
    destroy_impl: DestroyImplFn,
    on_tick: RuntimeTickFn,
) -> *mut alt_IScriptRuntime {
    let handle = ScriptRuntimeHandle::into_raw(ScriptRuntimeCallbacks {
        create_impl,
        destroy_impl,
        on_tick,
    });
    trace!(handle = ?handle, "Created script runtime handle");
    handle
}
