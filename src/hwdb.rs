// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! USB vendor names from udev's hardware database.

use crate::Error;
use crate::Result;

const VENDOR_KEY: &str = "ID_VENDOR_FROM_DATABASE";

/// Looks up the name of the USB vendor `vendor_id`, e.g. the Vendor ID field
/// of a Discover Identity ID Header.
pub fn vendor_name(vendor_id: u16) -> Result<String> {
    let hwdb = udev::Hwdb::new()?;
    let modalias = format!("usb:v{vendor_id:04X}");

    hwdb.query(modalias)
        .find(|entry| entry.name() == VENDOR_KEY)
        .map(|entry| entry.value().to_string_lossy().into_owned())
        .ok_or_else(Error::not_supported)
}

/// Copies `text` into `buf` as a NUL-terminated string, truncating as needed.
/// Returns the length of `text`.
#[cfg(any(feature = "c_api", test))]
fn fill_c_buffer(buf: &mut [u8], text: &str) -> usize {
    if let Some(room) = buf.len().checked_sub(1) {
        let n = text.len().min(room);
        buf[..n].copy_from_slice(&text.as_bytes()[..n]);
        buf[n] = 0;
    }
    text.len()
}

#[cfg(feature = "c_api")]
#[no_mangle]
/// Writes the name of the USB vendor `vendor_id` into `buf`, which holds `len`
/// bytes. The name is truncated to fit and NUL-terminated.
///
/// # Returns
/// The length of the full name on success, -ENOTSUP if the vendor is not in
/// the database, -EINVAL if `buf` is NULL while `len` is not zero, or another
/// -errno on failure.
///
/// # Safety
/// `buf` must be valid for writes of `len` bytes.
extern "C" fn libtypec_rs_get_vendor_name(
    vendor_id: u16,
    buf: *mut std::ffi::c_char,
    len: usize,
) -> std::ffi::c_int {
    if buf.is_null() && len != 0 {
        return -nix::libc::EINVAL;
    }

    match vendor_name(vendor_id) {
        Ok(name) => {
            let buf: &mut [u8] = if len == 0 {
                &mut []
            } else {
                unsafe { std::slice::from_raw_parts_mut(buf as *mut u8, len) }
            };
            let n = fill_c_buffer(buf, &name);
            std::ffi::c_int::try_from(n).unwrap_or(std::ffi::c_int::MAX)
        }
        Err(err) => -crate::CError::from(err).0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c_buffer_is_terminated() {
        let mut buf = [0xffu8; 8];
        assert_eq!(fill_c_buffer(&mut buf, "Google Inc."), 11);
        assert_eq!(&buf, b"Google \0");

        let mut buf = [0xffu8; 16];
        assert_eq!(fill_c_buffer(&mut buf, "Intel"), 5);
        assert_eq!(&buf[..6], b"Intel\0");

        assert_eq!(fill_c_buffer(&mut [], "Intel"), 5);
    }
}
