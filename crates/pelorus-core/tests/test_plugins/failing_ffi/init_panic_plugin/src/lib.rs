//! Native fixture whose factory panics.
use std::ffi::c_void;

#[no_mangle]
pub extern "C-unwind" fn pelorus_create_plugin() -> *mut c_void {
    panic!("plugin factory deliberately failed");
}

#[no_mangle]
pub extern "C-unwind" fn pelorus_destroy_plugin(_table: *mut c_void) {}
