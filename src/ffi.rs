//! FFI bindings for Reflex Timer
//!
//! This module provides C-compatible functions for driving the timer from a
//! scripting host. Timers and series are opaque handles created and freed by
//! this library. Status-returning functions yield 0 on success and -1 on error;
//! `*_stop` functions return NaN on error. After any failure, call
//! `reflex_last_error` for the message.

use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;
use std::ptr;

use crate::error::TimerError;
use crate::series::MeasurementSeries;
use crate::timer::HighPrecisionTimer;

// Thread-local storage for the last error message
thread_local! {
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

fn set_last_error(msg: &str) {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = CString::new(msg).ok();
    });
}

fn clear_last_error() {
    LAST_ERROR.with(|e| {
        *e.borrow_mut() = None;
    });
}

/// Helper to convert Rust string to C string (caller must free)
fn string_to_cstr(s: &str) -> *mut c_char {
    match CString::new(s) {
        Ok(cstr) => cstr.into_raw(),
        Err(_) => ptr::null_mut(),
    }
}

fn status(result: Result<(), TimerError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            set_last_error(&e.to_string());
            -1
        }
    }
}

fn elapsed_or_nan(result: Result<f64, TimerError>) -> f64 {
    match result {
        Ok(ms) => ms,
        Err(e) => {
            set_last_error(&e.to_string());
            f64::NAN
        }
    }
}

// ============================================================================
// Timer API
// ============================================================================

/// Opaque handle to a HighPrecisionTimer
pub struct ReflexTimerHandle {
    timer: HighPrecisionTimer,
}

/// Create an idle timer.
///
/// # Safety
/// - Returns a pointer to a newly allocated timer.
/// - Must be freed with `reflex_timer_free`.
#[no_mangle]
pub unsafe extern "C" fn reflex_timer_new() -> *mut ReflexTimerHandle {
    clear_last_error();
    Box::into_raw(Box::new(ReflexTimerHandle {
        timer: HighPrecisionTimer::new(),
    }))
}

/// Free a timer.
///
/// # Safety
/// - `timer` must be a valid pointer returned by `reflex_timer_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn reflex_timer_free(timer: *mut ReflexTimerHandle) {
    if !timer.is_null() {
        drop(Box::from_raw(timer));
    }
}

/// Start a measurement.
///
/// # Safety
/// - `timer` must be a valid pointer returned by `reflex_timer_new`.
/// - Returns 0 on success, -1 if the timer is already running or NULL.
#[no_mangle]
pub unsafe extern "C" fn reflex_timer_start(timer: *mut ReflexTimerHandle) -> i32 {
    clear_last_error();

    if timer.is_null() {
        set_last_error("Null timer pointer");
        return -1;
    }

    let handle = &mut *timer;
    status(handle.timer.start())
}

/// Stop the measurement and return elapsed milliseconds.
///
/// # Safety
/// - `timer` must be a valid pointer returned by `reflex_timer_new`.
/// - Returns NaN if the timer is not running or NULL.
#[no_mangle]
pub unsafe extern "C" fn reflex_timer_stop(timer: *mut ReflexTimerHandle) -> f64 {
    clear_last_error();

    if timer.is_null() {
        set_last_error("Null timer pointer");
        return f64::NAN;
    }

    let handle = &mut *timer;
    elapsed_or_nan(handle.timer.stop())
}

/// Report whether a measurement is in progress.
///
/// # Safety
/// - `timer` must be a valid pointer returned by `reflex_timer_new`.
/// - Returns 1 if running, 0 if idle, -1 if NULL.
#[no_mangle]
pub unsafe extern "C" fn reflex_timer_is_running(timer: *const ReflexTimerHandle) -> i32 {
    clear_last_error();

    if timer.is_null() {
        set_last_error("Null timer pointer");
        return -1;
    }

    let handle = &*timer;
    i32::from(handle.timer.is_running())
}

// ============================================================================
// Measurement Series API
// ============================================================================

/// Opaque handle to a MeasurementSeries
pub struct ReflexSeriesHandle {
    series: MeasurementSeries,
}

/// Create an empty measurement series.
///
/// # Safety
/// - Returns a pointer to a newly allocated series.
/// - Must be freed with `reflex_series_free`.
#[no_mangle]
pub unsafe extern "C" fn reflex_series_new() -> *mut ReflexSeriesHandle {
    clear_last_error();
    Box::into_raw(Box::new(ReflexSeriesHandle {
        series: MeasurementSeries::new(),
    }))
}

/// Free a measurement series.
///
/// # Safety
/// - `series` must be a valid pointer returned by `reflex_series_new`, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn reflex_series_free(series: *mut ReflexSeriesHandle) {
    if !series.is_null() {
        drop(Box::from_raw(series));
    }
}

/// Start a measurement on the series' timer.
///
/// # Safety
/// - `series` must be a valid pointer returned by `reflex_series_new`.
/// - Returns 0 on success, -1 on error.
#[no_mangle]
pub unsafe extern "C" fn reflex_series_start(series: *mut ReflexSeriesHandle) -> i32 {
    clear_last_error();

    if series.is_null() {
        set_last_error("Null series pointer");
        return -1;
    }

    let handle = &mut *series;
    status(handle.series.start_measurement())
}

/// Stop the measurement, record it, and return elapsed milliseconds.
///
/// # Safety
/// - `series` must be a valid pointer returned by `reflex_series_new`.
/// - Returns NaN on error; nothing is recorded in that case.
#[no_mangle]
pub unsafe extern "C" fn reflex_series_stop(series: *mut ReflexSeriesHandle) -> f64 {
    clear_last_error();

    if series.is_null() {
        set_last_error("Null series pointer");
        return f64::NAN;
    }

    let handle = &mut *series;
    elapsed_or_nan(handle.series.stop_measurement())
}

/// Stop the measurement without recording it.
///
/// # Safety
/// - `series` must be a valid pointer returned by `reflex_series_new`.
/// - Returns the discarded elapsed milliseconds, or NaN on error.
#[no_mangle]
pub unsafe extern "C" fn reflex_series_abandon(series: *mut ReflexSeriesHandle) -> f64 {
    clear_last_error();

    if series.is_null() {
        set_last_error("Null series pointer");
        return f64::NAN;
    }

    let handle = &mut *series;
    elapsed_or_nan(handle.series.abandon_measurement())
}

/// Number of recorded measurements.
///
/// # Safety
/// - `series` must be a valid pointer returned by `reflex_series_new`.
/// - Returns -1 if NULL.
#[no_mangle]
pub unsafe extern "C" fn reflex_series_count(series: *const ReflexSeriesHandle) -> i64 {
    clear_last_error();

    if series.is_null() {
        set_last_error("Null series pointer");
        return -1;
    }

    let handle = &*series;
    handle.series.len() as i64
}

/// Summary statistics as a JSON object `{count, average, min, max}`.
///
/// # Safety
/// - `series` must be a valid pointer returned by `reflex_series_new`.
/// - Returns a newly allocated string that must be freed with `reflex_free_string`.
/// - Returns NULL on error; call `reflex_last_error` to get the error message.
#[no_mangle]
pub unsafe extern "C" fn reflex_series_statistics(series: *const ReflexSeriesHandle) -> *mut c_char {
    clear_last_error();

    if series.is_null() {
        set_last_error("Null series pointer");
        return ptr::null_mut();
    }

    let handle = &*series;

    match handle.series.statistics().to_json() {
        Ok(json) => string_to_cstr(&json),
        Err(e) => {
            set_last_error(&e.to_string());
            ptr::null_mut()
        }
    }
}

// ============================================================================
// Memory Management
// ============================================================================

/// Free a string returned by Reflex functions.
///
/// # Safety
/// - `ptr` must be a valid pointer returned by a Reflex function, or NULL.
/// - After calling this function, the pointer is invalid.
#[no_mangle]
pub unsafe extern "C" fn reflex_free_string(ptr: *mut c_char) {
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
/// - The returned pointer is valid until the next Reflex function call on this thread.
/// - Do NOT free the returned pointer.
/// - Returns NULL if no error occurred.
#[no_mangle]
pub unsafe extern "C" fn reflex_last_error() -> *const c_char {
    LAST_ERROR.with(|e| match &*e.borrow() {
        Some(cstr) => cstr.as_ptr(),
        None => ptr::null(),
    })
}

// ============================================================================
// Version Information
// ============================================================================

/// Get the library version.
///
/// # Safety
/// - Returns a pointer to a static string. Do NOT free.
#[no_mangle]
pub unsafe extern "C" fn reflex_version() -> *const c_char {
    static VERSION: &[u8] = concat!(env!("CARGO_PKG_VERSION"), "\0").as_bytes();
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CStr;
    use std::thread;
    use std::time::Duration;

    unsafe fn last_error() -> String {
        let error = reflex_last_error();
        assert!(!error.is_null());
        CStr::from_ptr(error).to_str().unwrap().to_string()
    }

    #[test]
    fn test_ffi_timer_lifecycle() {
        unsafe {
            let timer = reflex_timer_new();
            assert!(!timer.is_null());
            assert_eq!(reflex_timer_is_running(timer), 0);

            assert_eq!(reflex_timer_start(timer), 0);
            assert_eq!(reflex_timer_is_running(timer), 1);
            thread::sleep(Duration::from_millis(20));

            let elapsed = reflex_timer_stop(timer);
            assert!(elapsed >= 20.0, "Expected at least 20ms, got {elapsed}ms");
            assert!(reflex_last_error().is_null());

            reflex_timer_free(timer);
        }
    }

    #[test]
    fn test_ffi_timer_misuse_reports_errors() {
        unsafe {
            let timer = reflex_timer_new();

            assert!(reflex_timer_stop(timer).is_nan());
            assert_eq!(last_error(), "Timer is not running");

            assert_eq!(reflex_timer_start(timer), 0);
            assert_eq!(reflex_timer_start(timer), -1);
            assert_eq!(last_error(), "Timer is already running");

            // the rejected start leaves the measurement running
            assert!(reflex_timer_stop(timer) >= 0.0);

            reflex_timer_free(timer);
        }
    }

    #[test]
    fn test_ffi_series_statistics() {
        unsafe {
            let series = reflex_series_new();

            let empty = reflex_series_statistics(series);
            assert!(!empty.is_null());
            let value: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(empty).to_str().unwrap()).unwrap();
            assert_eq!(value["count"], 0);
            assert!(value["average"].is_null());
            reflex_free_string(empty);

            for _ in 0..2 {
                assert_eq!(reflex_series_start(series), 0);
                assert!(reflex_series_stop(series) >= 0.0);
            }
            assert_eq!(reflex_series_start(series), 0);
            assert!(reflex_series_abandon(series) >= 0.0);
            assert!(reflex_series_stop(series).is_nan());
            assert_eq!(reflex_series_count(series), 2);

            let stats = reflex_series_statistics(series);
            let value: serde_json::Value =
                serde_json::from_str(CStr::from_ptr(stats).to_str().unwrap()).unwrap();
            assert_eq!(value["count"], 2);
            assert!(value["min"].as_f64().is_some());
            reflex_free_string(stats);

            reflex_series_free(series);
        }
    }

    #[test]
    fn test_ffi_null_handles() {
        unsafe {
            assert_eq!(reflex_timer_start(ptr::null_mut()), -1);
            assert_eq!(last_error(), "Null timer pointer");
            assert!(reflex_series_stop(ptr::null_mut()).is_nan());
            assert!(reflex_series_statistics(ptr::null()).is_null());
            assert_eq!(reflex_series_count(ptr::null()), -1);
        }
    }

    #[test]
    fn test_ffi_version() {
        unsafe {
            let version = reflex_version();
            assert!(!version.is_null());

            let version_str = CStr::from_ptr(version).to_str().unwrap();
            assert_eq!(version_str, env!("CARGO_PKG_VERSION"));
        }
    }
}
