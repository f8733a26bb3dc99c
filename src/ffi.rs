// FFI bindings for C/C++/C#
use std::ffi::CStr;
use std::os::raw::{c_char, c_int};
use std::slice;

use crate::{
    align_symbols, find_label, find_symbols_horizontally, find_symbols_vertically, imread, imwrite,
    AlignConfig, HorizontalConfig, LabelConfig, Mat, NoopObserver, PipelineError, VerticalConfig,
};

pub const LBLC_OK: c_int = 0;
pub const LBLC_ERR_INIT: c_int = -1;
pub const LBLC_ERR_NO_MATCH: c_int = -2;
pub const LBLC_ERR_INVALID_GEOMETRY: c_int = -3;
pub const LBLC_ERR_IO: c_int = -4;

/// Opaque handle to a working image
pub struct LBLCImage {
    inner: Mat,
}

fn status(res: Result<(), PipelineError>) -> c_int {
    match res {
        Ok(()) => LBLC_OK,
        Err(e) => e.status_code(),
    }
}

unsafe fn path_arg<'a>(path: *const c_char) -> Option<&'a str> {
    if path.is_null() {
        return None;
    }
    CStr::from_ptr(path).to_str().ok()
}

/// Load an image file into a new working image
///
/// # Safety
/// path must be a valid null-terminated UTF-8 string
#[no_mangle]
pub unsafe extern "C" fn lblc_image_load(path: *const c_char) -> *mut LBLCImage {
    let Some(path) = path_arg(path) else {
        return std::ptr::null_mut();
    };
    match imread(path) {
        Ok(img) => Box::into_raw(Box::new(LBLCImage { inner: img })),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Decode encoded image data in memory into a new working image
///
/// # Safety
/// data must point to valid image bytes of length len
#[no_mangle]
pub unsafe extern "C" fn lblc_image_load_data(data: *const u8, len: usize) -> *mut LBLCImage {
    if data.is_null() {
        return std::ptr::null_mut();
    }
    let bytes = slice::from_raw_parts(data, len);
    match Mat::from_bytes(bytes) {
        Ok(img) => Box::into_raw(Box::new(LBLCImage { inner: img })),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Write the working image to a file; the format follows the extension
///
/// # Safety
/// - handle must be a valid pointer returned from lblc_image_load
/// - path must be a valid null-terminated UTF-8 string
#[no_mangle]
pub unsafe extern "C" fn lblc_image_save(handle: *const LBLCImage, path: *const c_char) -> c_int {
    if handle.is_null() {
        return LBLC_ERR_INIT;
    }
    let Some(path) = path_arg(path) else {
        return LBLC_ERR_IO;
    };
    status(imwrite(path, &(*handle).inner))
}

/// Width of the working image, 0 for a null handle
///
/// # Safety
/// handle must be null or a valid pointer returned from lblc_image_load
#[no_mangle]
pub unsafe extern "C" fn lblc_image_width(handle: *const LBLCImage) -> c_int {
    if handle.is_null() {
        return 0;
    }
    (*handle).inner.cols()
}

/// Height of the working image, 0 for a null handle
///
/// # Safety
/// handle must be null or a valid pointer returned from lblc_image_load
#[no_mangle]
pub unsafe extern "C" fn lblc_image_height(handle: *const LBLCImage) -> c_int {
    if handle.is_null() {
        return 0;
    }
    (*handle).inner.rows()
}

/// Free a working image
///
/// # Safety
/// handle must be a valid pointer returned from lblc_image_load
#[no_mangle]
pub unsafe extern "C" fn lblc_image_free(handle: *mut LBLCImage) {
    if !handle.is_null() {
        drop(Box::from_raw(handle));
    }
}

/// Crop the working image to the label it shows
///
/// # Safety
/// handle must be a valid pointer returned from lblc_image_load
#[no_mangle]
pub unsafe extern "C" fn lblc_find_label(handle: *mut LBLCImage) -> c_int {
    if handle.is_null() {
        return LBLC_ERR_INIT;
    }
    status(find_label(&mut (*handle).inner, &LabelConfig::default(), &mut NoopObserver))
}

/// Keep the strip around the symbol band
///
/// # Safety
/// handle must be a valid pointer returned from lblc_image_load
#[no_mangle]
pub unsafe extern "C" fn lblc_find_symbols_vertically(handle: *mut LBLCImage) -> c_int {
    if handle.is_null() {
        return LBLC_ERR_INIT;
    }
    status(find_symbols_vertically(&mut (*handle).inner, &VerticalConfig::default(), &mut NoopObserver))
}

/// Trim the strip to the run of symbols
///
/// # Safety
/// handle must be a valid pointer returned from lblc_image_load
#[no_mangle]
pub unsafe extern "C" fn lblc_find_symbols_horizontally(handle: *mut LBLCImage) -> c_int {
    if handle.is_null() {
        return LBLC_ERR_INIT;
    }
    status(find_symbols_horizontally(&mut (*handle).inner, &HorizontalConfig::default(), &mut NoopObserver))
}

/// Level the symbol run and crop to it
///
/// # Safety
/// handle must be a valid pointer returned from lblc_image_load
#[no_mangle]
pub unsafe extern "C" fn lblc_align_symbols(handle: *mut LBLCImage) -> c_int {
    if handle.is_null() {
        return LBLC_ERR_INIT;
    }
    status(align_symbols(&mut (*handle).inner, &AlignConfig::default(), &mut NoopObserver))
}

/// Get library version
#[no_mangle]
pub extern "C" fn lblc_version() -> *const c_char {
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");
    VERSION.as_ptr() as *const c_char
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::ffi::CString;

    #[test]
    fn test_handle_lifecycle_and_status_codes() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("flat.png");
        RgbImage::from_pixel(32, 24, Rgb([255, 255, 255])).save(&input).unwrap();
        let input = CString::new(input.to_str().unwrap()).unwrap();

        unsafe {
            let handle = lblc_image_load(input.as_ptr());
            assert!(!handle.is_null());
            assert_eq!((lblc_image_width(handle), lblc_image_height(handle)), (32, 24));
            assert_eq!(lblc_find_label(handle), LBLC_ERR_NO_MATCH);

            let output = CString::new(dir.path().join("out.png").to_str().unwrap()).unwrap();
            assert_eq!(lblc_image_save(handle, output.as_ptr()), LBLC_OK);
            lblc_image_free(handle);

            assert_eq!(lblc_find_label(std::ptr::null_mut()), LBLC_ERR_INIT);
            assert!(lblc_image_load(std::ptr::null()).is_null());
        }
    }

    #[test]
    fn test_version_is_terminated() {
        let version = unsafe { CStr::from_ptr(lblc_version()) };
        assert_eq!(version.to_str().unwrap(), env!("CARGO_PKG_VERSION"));
    }
}
