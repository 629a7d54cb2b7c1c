//! FFI bindings for Wheel Flux
//!
//! This module provides C-compatible functions for driving a processor from
//! other languages. Structured values cross the boundary as JSON in null-terminated
//! C strings; returned strings must be freed by the caller using `wheel_free_string`.
//!
//! Callbacks stay on the Rust side: every handler added through this API writes
//! its deliveries to an outbox on the handle, which the host drains with
//! `wheel_processor_drain`.

use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::ptr;
use std::rc::Rc;

use crate::config::{HandlerConfig, WheelConfig};
use crate::host::StaticHost;
use crate::pipeline::WheelProcessor;
use crate::schema::RawWheelEvent;
use crate::types::{DeliveryRecord, ElementGeometry, ElementId, WheelEvent};

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message
fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

/// Clear the last error message
fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert C string to Rust string
unsafe fn cstr_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    CStr::from_ptr(ptr).to_str().ok().map(|s| s.to_string())
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

/// Pointer event kinds accepted by `wheel_processor_pointer`
pub const WHEEL_POINTER_ENTER: i32 = 0;
pub const WHEEL_POINTER_MOVE: i32 = 1;
pub const WHEEL_POINTER_LEAVE: i32 = 2;

/// Opaque handle to a WheelProcessor
pub struct WheelProcessorHandle {
    processor: WheelProcessor<StaticHost>,
    outbox: Rc<RefCell<Vec<WheelEvent>>>,
}

/// Create a new processor.
///
/// # Safety
/// - `config_json` may be NULL for defaults, otherwise a valid null-terminated
///   C string holding a `WheelConfig`.
/// - Returns a pointer to a newly allocated processor that must be freed with
///   `wheel_processor_free`.
/// - Returns NULL on error; call `wheel_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wheel_processor_new(
    config_json: *const c_char,
) -> *mut WheelProcessorHandle {
    clear_last_error();

    let config = if config_json.is_null() {
        WheelConfig::default()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return ptr::null_mut();
            }
        };
        match WheelConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    match WheelProcessor::with_config(StaticHost::default(), &config) {
        Ok(processor) => {
            let handle = Box::new(WheelProcessorHandle {
                processor,
                outbox: Rc::new(RefCell::new(Vec::new())),
            });
            Box::into_raw(handle)
        }
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Free a processor.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wheel_processor_new`.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn wheel_processor_free(processor: *mut WheelProcessorHandle) {
    if !processor.is_null() {
        drop(Box::from_raw(processor));
    }
}

/// Set up an element with its line and page heights in pixels.
///
/// Non-positive heights keep the processor defaults. Geometry is captured
/// once: setting up an element again leaves it unchanged.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wheel_processor_new`.
/// - Returns 0 when the element was set up, 1 when it already was, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn wheel_processor_setup(
    processor: *mut WheelProcessorHandle,
    element: u64,
    line_height: f64,
    page_height: f64,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;
    let element = ElementId(element);

    if handle.processor.is_setup(element) {
        return 1;
    }

    if line_height > 0.0 && page_height > 0.0 {
        handle
            .processor
            .host_mut()
            .set_geometry(element, ElementGeometry::new(line_height, page_height));
    }
    handle.processor.setup(element);
    0
}

/// Tear down an element.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wheel_processor_new`.
/// - Returns 1 if the element was set up, 0 if not, negative on error.
#[no_mangle]
pub unsafe extern "C" fn wheel_processor_teardown(
    processor: *mut WheelProcessorHandle,
    element: u64,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;
    i32::from(handle.processor.teardown(ElementId(element)))
}

/// Add a handler to an element. Its deliveries go to the handle's outbox.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wheel_processor_new`.
/// - `config_json` may be NULL for a plain handler, otherwise a valid
///   null-terminated C string holding a `HandlerConfig`.
/// - Returns the handler id, or a negative value on error.
#[no_mangle]
pub unsafe extern "C" fn wheel_processor_add_handler(
    processor: *mut WheelProcessorHandle,
    element: u64,
    config_json: *const c_char,
) -> i64 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let config = if config_json.is_null() {
        HandlerConfig::default()
    } else {
        let json_str = match cstr_to_string(config_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid config string pointer");
                return -1;
            }
        };
        match HandlerConfig::from_json(&json_str) {
            Ok(config) => config,
            Err(e) => {
                set_last_error(&e.to_string());
                return -1;
            }
        }
    };

    let sink = Rc::clone(&handle.outbox);
    let id = handle.processor.add_handler(
        ElementId(element),
        move |event: &WheelEvent| sink.borrow_mut().push(event.clone()),
        &config,
    );
    id.0 as i64
}

/// Dispatch a native wheel event and return the outcome as JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wheel_processor_new`.
/// - `event_json` must be a valid null-terminated C string holding the native
///   event fields.
/// - `args_json` may be NULL, otherwise a JSON array of extra arguments.
/// - Returns a newly allocated string that must be freed with `wheel_free_string`.
/// - Returns NULL on error; call `wheel_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wheel_processor_trigger(
    processor: *mut WheelProcessorHandle,
    element: u64,
    event_json: *const c_char,
    args_json: *const c_char,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &mut *processor;

    let event_str = match cstr_to_string(event_json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid event string pointer");
            return ptr::null_mut();
        }
    };

    let raw: RawWheelEvent = match serde_json::from_str(&event_str) {
        Ok(raw) => raw,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    let args: Vec<serde_json::Value> = if args_json.is_null() {
        Vec::new()
    } else {
        let args_str = match cstr_to_string(args_json) {
            Some(s) => s,
            None => {
                set_last_error("Invalid args string pointer");
                return ptr::null_mut();
            }
        };
        match serde_json::from_str(&args_str) {
            Ok(args) => args,
            Err(e) => {
                set_last_error(&e.to_string());
                return ptr::null_mut();
            }
        }
    };

    let outcome = match handle.processor.trigger(ElementId(element), &raw, args) {
        Ok(outcome) => outcome,
        Err(e) => {
            set_last_error(&e.to_string());
            return ptr::null_mut();
        }
    };

    match serde_json::to_string(&outcome) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Report a pointer event on an element.
///
/// `kind` is one of `WHEEL_POINTER_ENTER`, `WHEEL_POINTER_MOVE` or
/// `WHEEL_POINTER_LEAVE`; coordinates are ignored for a leave.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wheel_processor_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn wheel_processor_pointer(
    processor: *mut WheelProcessorHandle,
    element: u64,
    kind: i32,
    x: f64,
    y: f64,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;
    let element = ElementId(element);

    let result = match kind {
        WHEEL_POINTER_ENTER => handle.processor.pointer_enter(element, x, y),
        WHEEL_POINTER_MOVE => handle.processor.pointer_move(element, x, y),
        WHEEL_POINTER_LEAVE => handle.processor.pointer_leave(element),
        other => {
            set_last_error(&format!("Unknown pointer event kind: {}", other));
            return -1;
        }
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

/// Advance the virtual clock to `now_ms`, firing due timers.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wheel_processor_new`.
/// - Returns 0 on success, non-zero on error.
#[no_mangle]
pub unsafe extern "C" fn wheel_processor_advance(
    processor: *mut WheelProcessorHandle,
    now_ms: u64,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;
    handle.processor.advance_to(now_ms);
    0
}

/// Take every delivery recorded since the last drain, as a JSON array.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wheel_processor_new`.
/// - Returns a newly allocated string that must be freed with `wheel_free_string`.
/// - Returns NULL on error; call `wheel_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wheel_processor_drain(
    processor: *mut WheelProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;
    let records: Vec<DeliveryRecord> = handle
        .outbox
        .take()
        .iter()
        .map(DeliveryRecord::from)
        .collect();

    match serde_json::to_string(&records) {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Save calibration state to JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wheel_processor_new`.
/// - Returns a newly allocated string that must be freed with `wheel_free_string`.
/// - Returns NULL on error; call `wheel_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wheel_processor_save_calibration(
    processor: *mut WheelProcessorHandle,
) -> *mut c_char {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return ptr::null_mut();
    }

    let handle = &*processor;

    match handle.processor.save_calibration() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

/// Load calibration state from JSON.
///
/// # Safety
/// - `processor` must be a valid pointer returned by `wheel_processor_new`.
/// - `json` must be a valid null-terminated C string.
/// - Returns 0 on success, non-zero on error.
/// - On error, call `wheel_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn wheel_processor_load_calibration(
    processor: *mut WheelProcessorHandle,
    json: *const c_char,
) -> i32 {
    clear_last_error();

    if processor.is_null() {
        set_last_error("Null processor pointer");
        return -1;
    }

    let handle = &mut *processor;

    let json_str = match cstr_to_string(json) {
        Some(s) => s,
        None => {
            set_last_error("Invalid JSON string pointer");
            return -1;
        }
    };

    match handle.processor.load_calibration(&json_str) {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Wheel Flux functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Wheel Flux function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn wheel_free_string(ptr: *mut c_char) {
    if !ptr.is_null() {
        drop(CString::from_raw(ptr));
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Get the last error message.
///
/// # Safety
/// - Returns a pointer to a thread-local error string.
/// - The returned pointer is valid until the next Wheel Flux call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn wheel_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn wheel_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}
