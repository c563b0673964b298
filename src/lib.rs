// SPDX-License-Identifier: Apache-2.0 OR MIT

//! libtypec-rs is a library that aims to provide a generic interface
//! abstracting all platform complexity for user space to develop tools for
//! efficient USB-C port management and efficient diagnostic and debugging
//! tools to debug of system issues around USB-C/USB PD topology.
//!
//! The data structures and interface APIs are based on USB Type-C® Connector
//! System Software Interface (UCSI) Specification for the most part.
//!
//! Every backend speaks UCSI: it receives a [`ucsi::Command`] and answers with
//! the raw little-endian response payload. Pagination, version handling and
//! decoding happen once, in [`TypecRs`].

// Note: this library is written in Rust, but one of its goals is to provide a C
// FFI. Cbindgen is a tool that generates C bindings for Rust code. It is used
// to generate a compatible header file. It does *not* understand namespacing,
// since namespaces are not officially in the C language. This means that the
// Rust types used throughout the library retain a (more verbose) full name in
// spite of the module they are declared in.

#![cfg_attr(feature = "backtrace", feature(error_generic_member_access))]

use std::io::Cursor;

use bitstream_io::LittleEndian;

use ucsi::Command;

pub mod backends;
#[cfg(any(feature = "c_api", test))]
mod ffi;
#[cfg(feature = "hwdb")]
pub mod hwdb;
pub mod pd;
pub mod typec;
pub mod ucsi;

pub use typec::BackendConfig;
pub use typec::OsBackends;
pub use typec::TypecRs;

pub type BitWriter<'a> = bitstream_io::BitWriter<Cursor<&'a mut [u8]>, LittleEndian>;
pub type BitReader<'a> = bitstream_io::BitReader<Cursor<&'a [u8]>, LittleEndian>;
pub type Result<T> = std::result::Result<T, crate::Error>;

/// Wrap a bitflags! invocation.
///
/// cbindgen does not support both parse.expand *and* bitflags=true, because it
/// will also expand the bitflags macro. We have our own wrapper instead.
///
/// This will give Rust users a nice, idiomatic API with the bitflags crate,
/// while giving C users a typedef and #defines.
///
/// A module is used to gate the constants to pub(crate).
#[macro_export]
macro_rules! bitflags_wrapper {
    (
        $prefix:ident,
        $(#[$outer:meta])*
        $vis:vis struct $name:ident: $t:ty {
            $(
                const $flag:ident = $value:expr;
            )*
        }) => {
        bitflags::bitflags! {
            $(#[$outer])*
            /// cbindgen:ignore
            $vis struct $name: $t {
                $(
                    const $flag = $value;
                )*
            }
        }

        paste::paste! {
            #[repr(transparent)]
            $(#[$outer])*
            #[cfg(feature="c_api")]
            pub(crate) struct [< $prefix $name >] {
                bits: $t,
            }

            #[cfg(feature="c_api")]
            pub(crate) mod [< $prefix:snake:lower _ $name:snake:lower _ flags >] {
                $(
                    #[allow(dead_code)]
                    pub const [< $prefix:snake:upper _ $name:snake:upper _ $flag  >]: $t = $value;
                )*
            }

            #[cfg(feature="c_api")]
            impl From<$name> for [< $prefix $name >] {
                fn from(original: $name) -> Self {
                    Self { bits: original.bits() }
                }
            }

            #[cfg(feature="c_api")]
            impl From<[< $prefix $name >]> for $name {
                fn from(prefixed: [< $prefix $name >]) -> Self {
                    Self::from_bits_truncate(prefixed.bits)
                }
            }
        }
    };
}

/// A transport that can carry UCSI commands to a PPM.
///
/// Implementations only move bytes. They answer a command with the raw
/// response payload, which may be shorter than what was asked for. Everything
/// that needs to understand the payload lives above this trait.
#[cfg_attr(test, mockall::automock)]
pub trait OsBackend {
    /// Acquires the resources needed to talk to the PPM.
    fn open(&mut self) -> Result<()>;

    /// Releases the resources acquired in `open`. Subsequent submissions fail.
    fn close(&mut self);

    /// Executes `command` synchronously and returns the response payload.
    fn submit(&mut self, command: &Command) -> Result<Vec<u8>>;

    /// Clears a pending completion so that the PPM accepts a new command.
    fn acknowledge(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A trait for serializing an object to a byte stream.
///
/// This is used to write an object to a byte array when needed.
pub trait ToBytes {
    /// Serializes the object to a byte stream.
    fn to_bytes(&self, bit_writer: &mut BitWriter) -> Result<()>;

    /// Serializes the object into a zero-filled buffer of `len` bytes.
    fn to_vec(&self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0; len];
        {
            let mut writer = BitWriter::new(Cursor::new(&mut buf[..]));
            self.to_bytes(&mut writer)?;
        }
        Ok(buf)
    }
}

/// A trait for deserializing an object from a byte stream.
///
/// This is used to read an object from a byte array when needed.
pub trait FromBytes: Sized {
    /// Deserializes the object from a byte stream.
    fn from_bytes(bit_reader: &mut BitReader) -> Result<Self>;

    /// Deserializes the object from `bytes`. Running out of input is reported
    /// as [`Error::Decode`] with the input attached.
    fn from_slice(bytes: &[u8]) -> Result<Self> {
        let mut reader = BitReader::new(Cursor::new(bytes));
        Self::from_bytes(&mut reader).map_err(|err| err.into_decode(type_name::<Self>(), bytes))
    }

    /// Like `from_slice`, but zero-extends `bytes` to `len` first. Used for
    /// structures that grew across UCSI revisions.
    fn from_padded_slice(bytes: &[u8], len: usize) -> Result<Self> {
        if bytes.len() >= len {
            return Self::from_slice(bytes);
        }
        let mut padded = bytes.to_vec();
        padded.resize(len, 0);
        Self::from_slice(&padded)
    }
}

fn type_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// A wrapper that can pretty-print the underlying BCD value.
///
/// Revisions are stored as `0xMMmS`: 0x0300 is 3.0, 0x0310 is 3.1 and 0x0320
/// is 3.2.
pub struct BcdWrapper(pub u32);

impl BcdWrapper {
    pub const PD2P0: Self = Self(0x0200);
    pub const PD3P0: Self = Self(0x0300);
    pub const PD3P1: Self = Self(0x0310);
    pub const PD3P2: Self = Self(0x0320);

    /// The major revision, e.g. 3 for 3.1.
    pub fn major(&self) -> u32 {
        (self.0 >> 8) & 0xff
    }

    /// The minor revision, e.g. 1 for 3.1.
    pub fn minor(&self) -> u32 {
        (self.0 >> 4) & 0xf
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == 0
    }

    /// Parses the dotted form used by sysfs, e.g. "3.1" or "1.2".
    pub fn from_dotted(text: &str) -> Option<Self> {
        let text = text.trim();
        let (major, minor) = text.split_once('.').unwrap_or((text, "0"));
        let major = major.parse::<u32>().ok()?;
        let mut minor_digits = minor.chars().map(|c| c.to_digit(10));
        let minor = minor_digits.next().flatten().unwrap_or(0);
        let subminor = minor_digits.next().flatten().unwrap_or(0);
        if major > 0xff {
            return None;
        }
        Some(Self((major << 8) | (minor << 4) | subminor))
    }
}

impl std::fmt::Debug for BcdWrapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:x}.{:x}", self.major(), self.minor())?;
        if self.0 & 0xf != 0 {
            write!(f, ".{:x}", self.0 & 0xf)?;
        }
        Ok(())
    }
}

#[derive(thiserror::Error)]
/// An error type for the library.
pub enum Error {
    #[error("This operation is not supported")]
    NotSupported {
        #[cfg(feature = "backtrace")]
        backtrace: std::backtrace::Backtrace,
    },
    #[error("Invalid value {value} for parameter {parameter}")]
    InvalidParameter {
        parameter: String,
        value: u64,
        #[cfg(feature = "backtrace")]
        backtrace: std::backtrace::Backtrace,
    },
    #[error("The PPM is busy")]
    Busy {
        #[cfg(feature = "backtrace")]
        backtrace: std::backtrace::Backtrace,
    },
    #[error("Timed out waiting for a response")]
    Timeout {
        #[cfg(feature = "backtrace")]
        backtrace: std::backtrace::Backtrace,
    },
    #[error("The PPM reported an error, error information {error_information:#06x}")]
    HardwareFault {
        error_information: u16,
        #[cfg(feature = "backtrace")]
        backtrace: std::backtrace::Backtrace,
    },
    #[error("Could not decode {field} from {raw:02x?}")]
    Decode {
        field: String,
        raw: Vec<u8>,
        #[cfg(feature = "backtrace")]
        backtrace: std::backtrace::Backtrace,
    },
    #[error("{source}")]
    Io {
        #[from]
        source: std::io::Error,
        #[cfg(feature = "backtrace")]
        backtrace: std::backtrace::Backtrace,
    },
}

impl Error {
    pub fn not_supported() -> Self {
        Self::NotSupported {
            #[cfg(feature = "backtrace")]
            backtrace: std::backtrace::Backtrace::capture(),
        }
    }

    pub fn invalid_parameter(parameter: &str, value: u64) -> Self {
        Self::InvalidParameter {
            parameter: parameter.into(),
            value,
            #[cfg(feature = "backtrace")]
            backtrace: std::backtrace::Backtrace::capture(),
        }
    }

    pub fn busy() -> Self {
        Self::Busy {
            #[cfg(feature = "backtrace")]
            backtrace: std::backtrace::Backtrace::capture(),
        }
    }

    pub fn timeout() -> Self {
        Self::Timeout {
            #[cfg(feature = "backtrace")]
            backtrace: std::backtrace::Backtrace::capture(),
        }
    }

    pub fn hardware_fault(error_information: u16) -> Self {
        Self::HardwareFault {
            error_information,
            #[cfg(feature = "backtrace")]
            backtrace: std::backtrace::Backtrace::capture(),
        }
    }

    pub fn decode(field: &str, raw: &[u8]) -> Self {
        Self::Decode {
            field: field.into(),
            raw: raw.to_vec(),
            #[cfg(feature = "backtrace")]
            backtrace: std::backtrace::Backtrace::capture(),
        }
    }

    /// A field held a value that has no meaning in its enumeration.
    pub(crate) fn invalid_value(field: &str, value: u32) -> Self {
        Self::decode(field, &value.to_le_bytes())
    }

    /// Turns an early end of input into a decode error for `field`.
    pub(crate) fn into_decode(self, field: &str, raw: &[u8]) -> Self {
        match self {
            Self::Io { source, .. } if source.kind() == std::io::ErrorKind::UnexpectedEof => {
                Self::decode(field, raw)
            }
            other => other,
        }
    }

    pub fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported { .. })
    }

    #[cfg(feature = "backtrace")]
    fn backtrace(&self) -> &std::backtrace::Backtrace {
        match self {
            Self::NotSupported { backtrace }
            | Self::InvalidParameter { backtrace, .. }
            | Self::Busy { backtrace }
            | Self::Timeout { backtrace }
            | Self::HardwareFault { backtrace, .. }
            | Self::Decode { backtrace, .. }
            | Self::Io { backtrace, .. } => backtrace,
        }
    }
}

impl From<nix::Error> for Error {
    fn from(errno: nix::Error) -> Self {
        std::io::Error::from(errno).into()
    }
}

impl From<walkdir::Error> for Error {
    fn from(err: walkdir::Error) -> Self {
        std::io::Error::from(err).into()
    }
}

// Some boilerplate to make the backtraces more readable
impl std::fmt::Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotSupported { .. } => f.debug_struct("NotSupported").finish()?,
            Self::InvalidParameter {
                parameter, value, ..
            } => f
                .debug_struct("InvalidParameter")
                .field("parameter", parameter)
                .field("value", value)
                .finish()?,
            Self::Busy { .. } => f.debug_struct("Busy").finish()?,
            Self::Timeout { .. } => f.debug_struct("Timeout").finish()?,
            Self::HardwareFault {
                error_information, ..
            } => f
                .debug_struct("HardwareFault")
                .field("error_information", error_information)
                .finish()?,
            Self::Decode { field, raw, .. } => f
                .debug_struct("Decode")
                .field("field", field)
                .field("raw", raw)
                .finish()?,
            Self::Io { source, .. } => f.debug_struct("Io").field("source", source).finish()?,
        }

        #[cfg(feature = "backtrace")]
        write!(f, "\n\nerror stack backtrace:\n{}", self.backtrace())?;

        Ok(())
    }
}

#[repr(transparent)]
pub struct CError(pub std::ffi::c_int);

impl From<Error> for CError {
    /// Converts an Error to a C error number
    fn from(err: Error) -> Self {
        match err {
            Error::NotSupported { .. } => CError(nix::libc::ENOTSUP),
            Error::InvalidParameter { .. } => CError(nix::libc::EINVAL),
            Error::Busy { .. } => CError(nix::libc::EBUSY),
            Error::Timeout { .. } => CError(nix::libc::ETIMEDOUT),
            Error::HardwareFault { .. } => CError(nix::libc::EPROTO),
            Error::Decode { .. } => CError(nix::libc::EBADMSG),
            Error::Io { source, .. } => CError(source.raw_os_error().unwrap_or(nix::libc::EIO)),
        }
    }
}

#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
/// A wrapper that can pretty-print the underlying millivolt value.
pub struct Millivolt(pub u32);

impl std::fmt::Debug for Millivolt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}mV", self.0)
    }
}

impl From<u32> for Millivolt {
    fn from(val: u32) -> Self {
        Millivolt(val)
    }
}

#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
/// A wrapper that can pretty-print the underlying milliamp value.
pub struct Milliamp(pub u32);

impl std::fmt::Debug for Milliamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}mA", self.0)
    }
}

impl From<u32> for Milliamp {
    fn from(val: u32) -> Self {
        Milliamp(val)
    }
}

#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
/// A wrapper that can pretty-print the underlying milliwatt value.
pub struct Milliwatt(pub u32);

impl std::fmt::Debug for Milliwatt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}mW", self.0)
    }
}

impl From<u32> for Milliwatt {
    fn from(val: u32) -> Self {
        Milliwatt(val)
    }
}

#[repr(transparent)]
#[derive(Clone, Copy, Default, PartialEq, Eq)]
/// A wrapper that can pretty-print the underlying milliohm value.
pub struct Milliohm(pub u32);

impl std::fmt::Debug for Milliohm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}mΩ", self.0)
    }
}

impl From<u32> for Milliohm {
    fn from(val: u32) -> Self {
        Self(val)
    }
}
