// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! The UCSI backend.
//!
//! This backend drives the PPM through its register map, exposed as a
//! character device by a debug driver. A command is written to CONTROL, the
//! CCI register is polled until the PPM is done and the response is then read
//! from MESSAGE_IN before the completion is acknowledged.

use std::fs::File;
use std::os::unix::fs::FileExt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use log::debug;
use log::trace;
use log::warn;

use crate::ucsi::Cci;
use crate::ucsi::Command;
use crate::ucsi::ErrorInformation;
use crate::ucsi::UCSI_MAX_DATA_LENGTH;
use crate::BcdWrapper;
use crate::Error;
use crate::FromBytes;
use crate::OsBackend;
use crate::Result;

const DEFAULT_DEVICE: &str = "/dev/ucsi0";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);
const MIN_TIMEOUT: Duration = Duration::from_millis(100);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// The location of the UCSI data structures in the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOffsets {
    pub version: u64,
    pub cci: u64,
    pub control: u64,
    pub message_in: u64,
    pub message_out: u64,
}

impl Default for RegisterOffsets {
    fn default() -> Self {
        Self {
            version: 0x00,
            cci: 0x04,
            control: 0x08,
            message_in: 0x10,
            message_out: 0x20,
        }
    }
}

/// Configures a [`UcsiDebugfsBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UcsiDebugfsConfig {
    /// The character device exposing the registers.
    pub device: PathBuf,
    pub offsets: RegisterOffsets,
    /// How long to wait for the PPM to settle. Never shorter than 100ms.
    pub timeout: Duration,
    /// How long to sleep between two reads of CCI.
    pub poll_interval: Duration,
}

impl Default for UcsiDebugfsConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from(DEFAULT_DEVICE),
            offsets: RegisterOffsets::default(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl UcsiDebugfsConfig {
    /// The default configuration, overridden by `LIBTYPEC_RS_UCSI_DEVICE` and
    /// `LIBTYPEC_RS_UCSI_TIMEOUT_MS` when they are set.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(device) = std::env::var_os("LIBTYPEC_RS_UCSI_DEVICE") {
            config.device = PathBuf::from(device);
        }

        if let Ok(timeout) = std::env::var("LIBTYPEC_RS_UCSI_TIMEOUT_MS") {
            match timeout.trim().parse::<u64>() {
                Ok(ms) => config.timeout = Duration::from_millis(ms),
                Err(_) => warn!("Ignoring LIBTYPEC_RS_UCSI_TIMEOUT_MS={timeout}"),
            }
        }

        config
    }

    fn effective_timeout(&self) -> Duration {
        self.timeout.max(MIN_TIMEOUT)
    }
}

/// Byte-level access to the UCSI data structures.
#[cfg_attr(test, mockall::automock)]
pub trait UcsiRegisters: Send {
    /// Fills `buf` from the register block at `offset`.
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;
    /// Writes `data` to the register block at `offset`.
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()>;
}

/// The registers behind a character device.
struct DeviceRegisters {
    file: File,
}

impl UcsiRegisters for DeviceRegisters {
    fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        Ok(self.file.read_exact_at(buf, offset)?)
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        Ok(self.file.write_all_at(data, offset)?)
    }
}

pub struct UcsiDebugfsBackend {
    config: UcsiDebugfsConfig,
    /// Serializes whole command sequences. `None` while closed.
    registers: Mutex<Option<Box<dyn UcsiRegisters>>>,
    /// Registers handed over by the caller, installed on the next `open`.
    pending: Option<Box<dyn UcsiRegisters>>,
    version: BcdWrapper,
}

impl UcsiDebugfsBackend {
    /// Instantiates a new UCSI backend. Nothing is touched until `open`.
    pub fn new(config: UcsiDebugfsConfig) -> Self {
        Self {
            config,
            registers: Mutex::new(None),
            pending: None,
            version: BcdWrapper::default(),
        }
    }

    /// Instantiates a backend over an already open register block instead of
    /// the configured device.
    pub fn with_registers(config: UcsiDebugfsConfig, registers: Box<dyn UcsiRegisters>) -> Self {
        Self {
            pending: Some(registers),
            ..Self::new(config)
        }
    }

    /// The UCSI version the PPM implements, as read when opening.
    pub fn version(&self) -> BcdWrapper {
        self.version
    }

    fn read_cci(&self, registers: &mut dyn UcsiRegisters) -> Result<Cci> {
        let mut cci = [0u8; 4];
        registers.read(self.config.offsets.cci, &mut cci)?;
        Ok(Cci::from_u32(u32::from_le_bytes(cci)))
    }

    fn write_control(&self, registers: &mut dyn UcsiRegisters, command: &Command) -> Result<()> {
        let control = command.to_control()?;
        trace!("CONTROL <- {control:#018x}");
        registers.write(self.config.offsets.control, &control.to_le_bytes())
    }

    /// Polls CCI until `done` holds or the timeout expires.
    fn poll(&self, registers: &mut dyn UcsiRegisters, done: impl Fn(&Cci) -> bool) -> Result<Cci> {
        let deadline = Instant::now() + self.config.effective_timeout();
        loop {
            let cci = self.read_cci(registers)?;
            if done(&cci) {
                trace!("CCI -> {:#010x}", cci.to_u32());
                return Ok(cci);
            }
            if Instant::now() >= deadline {
                return Err(Error::timeout());
            }
            std::thread::sleep(self.config.poll_interval);
        }
    }

    /// Acknowledges a completion and waits for the PPM to confirm it.
    fn ack(
        &self,
        registers: &mut dyn UcsiRegisters,
        connector_change: bool,
        command_completed: bool,
    ) -> Result<()> {
        let ack = Command::AckCcCi {
            connector_change,
            command_completed,
        };
        self.write_control(registers, &ack)?;
        self.poll(registers, |cci| cci.acknowledge_command)?;
        Ok(())
    }

    fn run(&self, registers: &mut dyn UcsiRegisters, command: &Command) -> Result<Vec<u8>> {
        self.write_control(registers, command)?;

        let cci = match self.poll(registers, Cci::is_settled) {
            Ok(cci) => cci,
            Err(err) => {
                warn!("Timed out waiting for {command:?}");
                let ack = Command::AckCcCi {
                    connector_change: false,
                    command_completed: true,
                };
                if let Err(ack_err) = self.write_control(registers, &ack) {
                    debug!("Could not acknowledge after a timeout: {ack_err}");
                }
                return Err(err);
            }
        };

        if cci.busy {
            self.ack(registers, false, true)?;
            return Err(Error::busy());
        }

        if cci.not_supported {
            self.ack(registers, false, true)?;
            return Err(Error::not_supported());
        }

        if cci.error {
            self.ack(registers, false, true)?;
            // An error reading the error status has nothing left to report.
            if matches!(command, Command::GetErrorStatus { .. }) {
                return Err(Error::hardware_fault(0));
            }
            let connector_nr = command.connector_nr();
            let status = self.run(registers, &Command::GetErrorStatus { connector_nr })?;
            let info = ErrorInformation::from_padded_slice(&status, 2)?;
            debug!("{command:?} failed with {info:?}");
            return Err(info.into_error(connector_nr));
        }

        let len = usize::from(cci.data_length)
            .min(UCSI_MAX_DATA_LENGTH)
            .min(command.max_response_len());
        let mut response = vec![0u8; len];
        if len > 0 {
            registers.read(self.config.offsets.message_in, &mut response)?;
        }
        trace!("MESSAGE_IN -> {response:02x?}");

        self.ack(registers, false, true)?;
        Ok(response)
    }

    fn with_registers_locked<T>(
        &self,
        f: impl FnOnce(&mut dyn UcsiRegisters) -> Result<T>,
    ) -> Result<T> {
        let mut guard = self
            .registers
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "register lock poisoned"))?;
        match guard.as_mut() {
            Some(registers) => f(registers.as_mut()),
            None => Err(std::io::Error::from(std::io::ErrorKind::NotConnected).into()),
        }
    }
}

impl OsBackend for UcsiDebugfsBackend {
    fn open(&mut self) -> Result<()> {
        let mut registers = match self.pending.take() {
            Some(registers) => registers,
            None => {
                debug!("Opening {}", self.config.device.display());
                let file = std::fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&self.config.device)?;
                Box::new(DeviceRegisters { file })
            }
        };

        let mut version = [0u8; 2];
        registers.read(self.config.offsets.version, &mut version)?;
        self.version = BcdWrapper(u32::from(u16::from_le_bytes(version)));
        debug!("UCSI version {:?}", self.version);

        match self.registers.get_mut() {
            Ok(slot) => *slot = Some(registers),
            Err(poisoned) => *poisoned.into_inner() = Some(registers),
        }
        Ok(())
    }

    fn close(&mut self) {
        debug!("Closing {}", self.config.device.display());
        match self.registers.get_mut() {
            Ok(slot) => *slot = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    fn submit(&mut self, command: &Command) -> Result<Vec<u8>> {
        debug!("Submitting {command:?}");
        self.with_registers_locked(|registers| self.run(registers, command))
    }

    fn acknowledge(&mut self) -> Result<()> {
        self.with_registers_locked(|registers| self.ack(registers, true, true))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use mockall::Sequence;

    use super::*;
    use crate::ucsi::Capability;

    const CC: u32 = 1 << 31;
    const ACK: u32 = 1 << 29;
    const BUSY: u32 = 1 << 28;
    const ERROR: u32 = 1 << 30;
    const NOT_SUPPORTED: u32 = 1 << 25;

    #[derive(Clone)]
    enum Reply {
        Data(Vec<u8>),
        Busy,
        NotSupported,
        Error,
        Silent,
    }

    #[derive(Default)]
    struct PpmState {
        cci: u32,
        message_in: Vec<u8>,
        replies: HashMap<u8, Reply>,
        commands: Vec<u64>,
    }

    /// A PPM that answers from a table of replies keyed by command code.
    #[derive(Clone, Default)]
    struct FakePpm(Arc<std::sync::Mutex<PpmState>>);

    impl FakePpm {
        fn reply(&self, command: u8, reply: Reply) {
            self.0.lock().unwrap().replies.insert(command, reply);
        }

        fn commands(&self) -> Vec<u64> {
            self.0.lock().unwrap().commands.clone()
        }
    }

    impl UcsiRegisters for FakePpm {
        fn read(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
            let state = self.0.lock().unwrap();
            match offset {
                0x00 => buf.copy_from_slice(&0x0201u16.to_le_bytes()[..buf.len()]),
                0x04 => buf.copy_from_slice(&state.cci.to_le_bytes()[..buf.len()]),
                0x10 => {
                    buf.fill(0);
                    let n = buf.len().min(state.message_in.len());
                    buf[..n].copy_from_slice(&state.message_in[..n]);
                }
                _ => panic!("unexpected read at {offset:#x}"),
            }
            Ok(())
        }

        fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
            assert_eq!(offset, 0x08);
            let mut state = self.0.lock().unwrap();
            let control = u64::from_le_bytes(data.try_into().unwrap());
            state.commands.push(control);

            let code = data[0];
            if code == 0x04 {
                state.cci = ACK;
                return Ok(());
            }

            match state.replies.get(&code).cloned().unwrap_or(Reply::NotSupported) {
                Reply::Data(bytes) => {
                    state.cci = CC | ((bytes.len() as u32) << 8);
                    state.message_in = bytes;
                }
                Reply::Busy => state.cci = BUSY,
                Reply::NotSupported => state.cci = NOT_SUPPORTED | CC,
                Reply::Error => state.cci = ERROR | CC,
                Reply::Silent => state.cci = 0,
            }
            Ok(())
        }
    }

    fn backend(ppm: &FakePpm) -> UcsiDebugfsBackend {
        let mut backend =
            UcsiDebugfsBackend::with_registers(UcsiDebugfsConfig::default(), Box::new(ppm.clone()));
        backend.open().unwrap();
        backend
    }

    #[test]
    fn open_reads_version() {
        let ppm = FakePpm::default();
        let backend = backend(&ppm);
        assert_eq!(backend.version(), BcdWrapper(0x0201));
    }

    #[test]
    fn get_capability_then_ack() {
        let ppm = FakePpm::default();
        let capability = Capability {
            num_connectors: 2,
            pd_version: BcdWrapper::PD3P1,
            ..Default::default()
        };
        ppm.reply(0x06, Reply::Data(crate::ToBytes::to_vec(&capability, 16).unwrap()));

        let mut backend = backend(&ppm);
        let response = backend.submit(&Command::GetCapability).unwrap();
        assert_eq!(Capability::from_slice(&response).unwrap(), capability);
        assert_eq!(ppm.commands(), vec![0x06, 0x0002_0004]);
    }

    #[test]
    fn response_is_limited_to_the_command() {
        let ppm = FakePpm::default();
        ppm.reply(0x07, Reply::Data(vec![0xff; 16]));

        let mut backend = backend(&ppm);
        let response = backend
            .submit(&Command::GetConnectorCapability { connector_nr: 0 })
            .unwrap();
        assert_eq!(response.len(), 4);
    }

    #[test]
    fn busy_and_not_supported() {
        let ppm = FakePpm::default();
        ppm.reply(0x06, Reply::Busy);
        let mut backend = backend(&ppm);
        assert!(matches!(
            backend.submit(&Command::GetCapability),
            Err(Error::Busy { .. })
        ));

        let err = backend
            .submit(&Command::GetCableProperty { connector_nr: 0 })
            .unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn error_fetches_error_status() {
        let ppm = FakePpm::default();
        ppm.reply(0x11, Reply::Error);
        ppm.reply(0x13, Reply::Data(vec![0b10, 0]));

        let mut backend = backend(&ppm);
        let err = backend
            .submit(&Command::GetCableProperty { connector_nr: 3 })
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidParameter { ref parameter, value: 3, .. } if parameter == "connector_nr"
        ));

        let commands = ppm.commands();
        assert_eq!(commands[0] & 0xff, 0x11);
        assert_eq!(commands[1] & 0xff, 0x04);
        assert_eq!(commands[2], 0x0004_0013);
        assert_eq!(commands[3] & 0xff, 0x04);
    }

    #[test]
    fn error_status_hardware_fault() {
        let ppm = FakePpm::default();
        ppm.reply(0x12, Reply::Error);
        ppm.reply(0x13, Reply::Data(vec![0x80, 0]));

        let mut backend = backend(&ppm);
        let err = backend
            .submit(&Command::GetConnectorStatus { connector_nr: 0 })
            .unwrap_err();
        assert!(matches!(
            err,
            Error::HardwareFault {
                error_information: 0x80,
                ..
            }
        ));
    }

    #[test]
    fn timeout_acknowledges() {
        let ppm = FakePpm::default();
        ppm.reply(0x06, Reply::Silent);

        let config = UcsiDebugfsConfig {
            timeout: Duration::from_millis(1),
            ..Default::default()
        };
        let mut backend = UcsiDebugfsBackend::with_registers(config, Box::new(ppm.clone()));
        backend.open().unwrap();

        let start = Instant::now();
        let err = backend.submit(&Command::GetCapability).unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        // The timeout is clamped.
        assert!(start.elapsed() >= MIN_TIMEOUT);
        assert_eq!(ppm.commands().last().copied(), Some(0x0002_0004));
    }

    #[test]
    fn timeout_leaves_the_instance_usable() {
        let ppm = FakePpm::default();
        ppm.reply(0x06, Reply::Silent);

        let config = UcsiDebugfsConfig {
            timeout: MIN_TIMEOUT,
            ..Default::default()
        };
        let backend = UcsiDebugfsBackend::with_registers(config, Box::new(ppm.clone()));
        let mut typec = crate::TypecRs::with_backend(Box::new(backend)).unwrap();

        let start = Instant::now();
        let err = typec.capabilities().unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(start.elapsed() < Duration::from_millis(200));

        // The PPM comes back and the same instance carries on.
        let capability = Capability {
            num_connectors: 2,
            pd_version: BcdWrapper::PD3P1,
            ..Default::default()
        };
        ppm.reply(0x06, Reply::Data(crate::ToBytes::to_vec(&capability, 16).unwrap()));
        assert_eq!(typec.capabilities().unwrap(), capability);
    }

    #[test]
    fn closed_backend_fails() {
        let ppm = FakePpm::default();
        let mut backend = backend(&ppm);
        backend.close();
        let err = backend.submit(&Command::GetCapability).unwrap_err();
        assert!(matches!(
            err,
            Error::Io { ref source, .. } if source.kind() == std::io::ErrorKind::NotConnected
        ));
    }

    #[test]
    fn exact_register_sequence() {
        let mut registers = MockUcsiRegisters::new();
        let mut seq = Sequence::new();

        registers
            .expect_read()
            .withf(|offset, _| *offset == 0x00)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, buf| {
                buf.copy_from_slice(&[0x00, 0x03]);
                Ok(())
            });
        registers
            .expect_write()
            .withf(|offset, data| *offset == 0x08 && *data == 0x0001_0007u64.to_le_bytes())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        registers
            .expect_read()
            .withf(|offset, _| *offset == 0x04)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, buf| {
                buf.copy_from_slice(&(CC | (4 << 8)).to_le_bytes());
                Ok(())
            });
        registers
            .expect_read()
            .withf(|offset, buf| *offset == 0x10 && buf.len() == 4)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, buf| {
                buf.copy_from_slice(&[0x24, 0x07, 0x01, 0x10]);
                Ok(())
            });
        registers
            .expect_write()
            .withf(|offset, data| *offset == 0x08 && *data == 0x0002_0004u64.to_le_bytes())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        registers
            .expect_read()
            .withf(|offset, _| *offset == 0x04)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, buf| {
                buf.copy_from_slice(&ACK.to_le_bytes());
                Ok(())
            });

        let mut backend =
            UcsiDebugfsBackend::with_registers(UcsiDebugfsConfig::default(), Box::new(registers));
        backend.open().unwrap();
        assert_eq!(backend.version(), BcdWrapper::PD3P0);

        let response = backend
            .submit(&Command::GetConnectorCapability { connector_nr: 0 })
            .unwrap();
        assert_eq!(response, vec![0x24, 0x07, 0x01, 0x10]);
    }

    #[test]
    fn config_from_env() {
        std::env::set_var("LIBTYPEC_RS_UCSI_DEVICE", "/dev/ucsi7");
        std::env::set_var("LIBTYPEC_RS_UCSI_TIMEOUT_MS", "250");
        let config = UcsiDebugfsConfig::from_env();
        std::env::remove_var("LIBTYPEC_RS_UCSI_DEVICE");
        std::env::remove_var("LIBTYPEC_RS_UCSI_TIMEOUT_MS");

        assert_eq!(config.device, PathBuf::from("/dev/ucsi7"));
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.offsets, RegisterOffsets::default());
    }
}
