//! Native fixture whose factory returns null, as a module does when its
//! own setup fails.
use std::ffi::c_void;
use std::sync::atomic::{AtomicUsize, Ordering};

static DESTROY_CALLS: AtomicUsize = AtomicUsize::new(0);

#[no_mangle]
pub extern "C-unwind" fn pelorus_create_plugin() -> *mut c_void {
    std::ptr::null_mut()
}

#[no_mangle]
pub extern "C-unwind" fn pelorus_destroy_plugin(_table: *mut c_void) {
    DESTROY_CALLS.fetch_add(1, Ordering::SeqCst);
}
