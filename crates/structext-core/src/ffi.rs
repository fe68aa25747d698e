// SPDX-License-Identifier: AGPL-3.0-or-later
//! C FFI exports for embedding hosts
//!
//! A host hands over markup and gets the published document back as a
//! NUL-terminated string owned by this library.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use crate::publish::publish_to_string;
use crate::store::DocumentStore;
use crate::traits::{OutputFormat, PublishConfig};

/// Result code for FFI operations
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResult {
    Success = 0,
    InvalidInput = 1,
    RenderError = 2,
    NullPointer = 3,
    Utf8Error = 4,
}

/// Output format for FFI
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiFormat {
    Text = 0,
    Html = 1,
    Xml = 2,
}

impl From<FfiFormat> for OutputFormat {
    fn from(f: FfiFormat) -> Self {
        match f {
            FfiFormat::Text => OutputFormat::Text,
            FfiFormat::Html => OutputFormat::Html,
            FfiFormat::Xml => OutputFormat::Xml,
        }
    }
}

/// Parse markup and publish it in the given format
///
/// # Safety
/// - `content` must be a valid null-terminated UTF-8 string
/// - `out_content` and `out_length` must be valid pointers
/// - the string stored in `out_content` must be released with
///   `structext_free_string`
#[no_mangle]
pub unsafe extern "C" fn structext_publish(
    content: *const c_char,
    format: FfiFormat,
    out_content: *mut *mut c_char,
    out_length: *mut usize,
) -> FfiResult {
    if content.is_null() || out_content.is_null() || out_length.is_null() {
        return FfiResult::NullPointer;
    }

    let content_str = match CStr::from_ptr(content).to_str() {
        Ok(s) => s,
        Err(_) => return FfiResult::Utf8Error,
    };

    let mut store = DocumentStore::new();
    let root = store.parse_text(content_str);
    let output = match publish_to_string(&mut store, root, format.into(), &PublishConfig::default()) {
        Ok(s) => s,
        Err(_) => return FfiResult::RenderError,
    };

    let length = output.len();
    let c_string = match CString::new(output) {
        Ok(s) => s,
        Err(_) => return FfiResult::InvalidInput,
    };

    *out_length = length;
    *out_content = c_string.into_raw();

    FfiResult::Success
}

/// Free a string allocated by the library
///
/// # Safety
/// - `s` must be a valid string from this library or null
#[no_mangle]
pub unsafe extern "C" fn structext_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

/// Get library version
///
/// Returns a static string, do not free
#[no_mangle]
pub extern "C" fn structext_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
