//! Native fixture exporting a factory but no destroy entry point.
//!
//! The loader must refuse it before calling the factory: a table it could
//! never hand back would leak.

#[no_mangle]
pub extern "C-unwind" fn pelorus_create_plugin() -> *mut std::ffi::c_void {
    std::ptr::null_mut()
}

// Misspelled on purpose; the host looks for `pelorus_destroy_plugin`.
#[no_mangle]
pub extern "C-unwind" fn pelorus_destroy_plugins(_table: *mut std::ffi::c_void) {}
