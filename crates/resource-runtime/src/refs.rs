//! Non-null references to host-owned objects.
//!
//! These wrap the opaque pointers the host passes to callbacks. They carry no
//! lifetime: the host decides how long the pointee lives, and nothing here
//! dereferences it.

use capi_extra::{alt_CEvent, alt_IResource, alt_RefBase_RefStore_IBaseObject};
#[cfg(feature = "server-api")]
use capi_extra::{alt_Array_String, alt_IResource_CreationInfo};
use std::fmt;
use std::ptr::NonNull;

macro_rules! host_ref {
    ($(#[$meta:meta])* $name:ident => $raw:ty) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(NonNull<$raw>);

        // Opaque address handed out by the host. Callers are responsible for lifetime validity.
        unsafe impl Send for $name {}

        impl $name {
            /// Wrap a raw pointer, rejecting null.
            ///
            /// # Safety
            ///
            /// A non-null `ptr` must point to a host object of the matching type.
            pub unsafe fn from_raw(ptr: *mut $raw) -> Option<Self> {
                NonNull::new(ptr).map(Self)
            }

            pub fn as_ptr(self) -> *mut $raw {
                self.0.as_ptr()
            }

            /// Address used as a lookup key.
            pub fn addr(self) -> usize {
                self.0.as_ptr() as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:#x})"), self.addr())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:#x}", self.addr())
            }
        }
    };
}

host_ref!(
    /// A resource loaded by the host.
    ResourceRef => alt_IResource
);
host_ref!(
    /// An event delivered to a resource.
    EventRef => alt_CEvent
);
host_ref!(
    /// A base object the host created or removed.
    BaseObjectRef => alt_RefBase_RefStore_IBaseObject
);

/// Arguments of a make-client request.
#[cfg(feature = "server-api")]
#[derive(Debug, Clone, Copy)]
pub struct ClientRequest {
    /// Creation info the host fills in for the client-side resource.
    pub info: *mut alt_IResource_CreationInfo,
    /// Files the host will ship to clients.
    pub files: *mut alt_Array_String,
}
