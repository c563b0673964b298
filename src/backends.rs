// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! The OS specific backends.
//!
//! Both backends implement [`crate::OsBackend`] and answer UCSI commands with
//! UCSI-formatted payloads. The sysfs backend synthesizes them from the
//! kernel's Type-C class, the debug backend reads them off the PPM registers.

pub mod sysfs;
pub mod ucsi_debugfs;
