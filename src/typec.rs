// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! The main interface for the library

use std::str::FromStr;

use log::debug;
use log::warn;

use crate::backends::sysfs::SysfsBackend;
use crate::backends::sysfs::SysfsConfig;
use crate::backends::ucsi_debugfs::UcsiDebugfsBackend;
use crate::backends::ucsi_debugfs::UcsiDebugfsConfig;
use crate::pd::MAX_EPR_PDOS;
use crate::pd::MAX_SPR_PDOS;
use crate::pd::Message;
use crate::pd::MessageRecipient;
use crate::pd::MessageResponseType;
use crate::pd::Pdo;
use crate::ucsi::AlternateMode;
use crate::ucsi::CableProperty;
use crate::ucsi::Capability;
use crate::ucsi::Command;
use crate::ucsi::ConnectorCapability;
use crate::ucsi::ConnectorStatus;
use crate::ucsi::GetAlternateModesRecipient;
use crate::ucsi::PdoSourceCapabilitiesType;
use crate::ucsi::PdoType;
use crate::ucsi::UCSI_CONNECTOR_STATUS_LENGTH;
use crate::ucsi::UCSI_MAX_ALT_MODES_PER_CALL;
use crate::ucsi::UCSI_MAX_DATA_LENGTH;
use crate::ucsi::UCSI_MAX_NUM_ALT_MODE;
use crate::ucsi::UCSI_MAX_PDOS_PER_CALL;
use crate::BcdWrapper;
#[cfg(feature = "c_api")]
use crate::CError;
use crate::Error;
use crate::FromBytes;
use crate::OsBackend;
use crate::Result;

/// The main library struct.
/// # Examples
///
/// ```no_run
/// use libtypec_rs::TypecRs;
/// use libtypec_rs::OsBackends;
///
/// let mut typec = TypecRs::new(OsBackends::Sysfs)?;
/// let capabilities = typec.capabilities()?;
/// for connector_nr in 0..capabilities.num_connectors {
///     println!("{:#?}", typec.connector_status(connector_nr)?);
/// }
/// # Ok::<(), libtypec_rs::Error>(())
/// ```
pub struct TypecRs {
    /// The OS backend used for this instance.
    os_backend: Box<dyn OsBackend>,
    /// Fetched by the first command.
    capabilities: Option<Capability>,
    closed: bool,
}

/// The OS backends supported by the library.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OsBackends {
    /// Whatever suits the host best, sysfs on Linux.
    #[default]
    Default = 0,
    /// A sysfs backend.
    Sysfs = 1,
    /// A UCSI debugfs backend.
    UcsiDebugfs = 2,
}

impl FromStr for OsBackends {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "sysfs" => Ok(Self::Sysfs),
            "ucsi_debugfs" | "debugfs" => Ok(Self::UcsiDebugfs),
            _ => Err(Error::not_supported()),
        }
    }
}

/// A backend together with its configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    Sysfs(SysfsConfig),
    UcsiDebugfs(UcsiDebugfsConfig),
}

impl From<OsBackends> for BackendConfig {
    fn from(backend: OsBackends) -> Self {
        match backend {
            OsBackends::Default | OsBackends::Sysfs => Self::Sysfs(SysfsConfig::default()),
            OsBackends::UcsiDebugfs => Self::UcsiDebugfs(UcsiDebugfsConfig::from_env()),
        }
    }
}

// The Rust API.
impl TypecRs {
    /// Initializes the library with the given `backend` in its default
    /// configuration.
    pub fn new(backend: OsBackends) -> Result<Self> {
        Self::with_config(backend.into())
    }

    /// Initializes the library with a configured backend.
    pub fn with_config(config: BackendConfig) -> Result<Self> {
        let os_backend: Box<dyn OsBackend> = match config {
            BackendConfig::Sysfs(config) => Box::new(SysfsBackend::new(config)),
            BackendConfig::UcsiDebugfs(config) => Box::new(UcsiDebugfsBackend::new(config)),
        };
        Self::with_backend(os_backend)
    }

    /// Initializes the library on top of any [`OsBackend`].
    pub fn with_backend(mut os_backend: Box<dyn OsBackend>) -> Result<Self> {
        os_backend.open()?;
        Ok(Self {
            os_backend,
            capabilities: None,
            closed: false,
        })
    }

    /// Releases the backend. Every later call fails.
    pub fn close(&mut self) {
        if !self.closed {
            self.os_backend.close();
            self.closed = true;
        }
    }

    /// Submits `command`, retrying once if the PPM was busy.
    fn execute(&mut self, command: &Command) -> Result<Vec<u8>> {
        if self.closed {
            return Err(std::io::Error::from(std::io::ErrorKind::NotConnected).into());
        }

        match self.os_backend.submit(command) {
            Err(Error::Busy { .. }) => {
                warn!("PPM busy on {command:?}, retrying once");
                self.os_backend.acknowledge()?;
                self.os_backend.submit(command)
            }
            result => result,
        }
    }

    fn check_connector(&mut self, connector_nr: usize) -> Result<()> {
        let num_connectors = self.capabilities()?.num_connectors;
        if connector_nr >= num_connectors {
            return Err(Error::invalid_parameter(
                "connector_nr",
                connector_nr as u64,
            ));
        }
        Ok(())
    }

    /// The PD revision the PPM operates at, zero if unknown.
    fn revision(&mut self) -> Result<BcdWrapper> {
        Ok(self.capabilities()?.pd_version)
    }

    /// Returns the platform policy capabilities.
    pub fn capabilities(&mut self) -> Result<Capability> {
        if let Some(capabilities) = &self.capabilities {
            return Ok(capabilities.clone());
        }

        let response = self.execute(&Command::GetCapability)?;
        let capabilities = Capability::from_padded_slice(&response, 16)?;
        debug!("PPM capabilities: {capabilities:?}");
        self.capabilities = Some(capabilities.clone());
        Ok(capabilities)
    }

    /// Returns the capability of connector `connector_nr`
    pub fn connector_capabilities(&mut self, connector_nr: usize) -> Result<ConnectorCapability> {
        self.check_connector(connector_nr)?;
        let response = self.execute(&Command::GetConnectorCapability { connector_nr })?;
        ConnectorCapability::from_padded_slice(&response, 4)
    }

    /// Returns the alternate modes that the connector/cable/attached device is
    /// able to support.
    ///
    /// # Arguments
    /// `recipient` Represents alternate mode to be retrieved from local, SOP,
    /// SOP' or SOP"
    /// `connector_nr` The connector number to query.
    pub fn alternate_modes(
        &mut self,
        recipient: GetAlternateModesRecipient,
        connector_nr: usize,
    ) -> Result<Vec<AlternateMode>> {
        self.check_connector(connector_nr)?;

        let mut modes: Vec<AlternateMode> = vec![];
        'pages: while modes.len() < UCSI_MAX_NUM_ALT_MODE {
            let response = self.execute(&Command::GetAlternateModes {
                recipient,
                connector_nr,
                offset: modes.len(),
                nr_modes: UCSI_MAX_ALT_MODES_PER_CALL,
            })?;

            let mut page_len = 0;
            for chunk in response.chunks_exact(6) {
                let mode = AlternateMode::from_slice(chunk)?;
                if mode.svid == 0 {
                    break 'pages;
                }
                modes.push(mode);
                page_len += 1;
            }
            if page_len < UCSI_MAX_ALT_MODES_PER_CALL {
                break;
            }
        }
        modes.truncate(UCSI_MAX_NUM_ALT_MODE);

        for i in 0..modes.len() {
            let svid = modes[i].svid;
            let earlier = modes[..i].iter().filter(|mode| mode.svid == svid).count();
            modes[i].mode_index = earlier as u8;
        }

        Ok(modes)
    }

    /// Returns the cable properties of `connector_nr`.
    pub fn cable_properties(&mut self, connector_nr: usize) -> Result<CableProperty> {
        self.check_connector(connector_nr)?;
        let response = self.execute(&Command::GetCableProperty { connector_nr })?;
        CableProperty::from_padded_slice(&response, 5)
    }

    /// Returns the connector status for `connector_nr`.
    pub fn connector_status(&mut self, connector_nr: usize) -> Result<ConnectorStatus> {
        self.check_connector(connector_nr)?;
        let response = self.execute(&Command::GetConnectorStatus { connector_nr })?;
        ConnectorStatus::from_padded_slice(&response, UCSI_CONNECTOR_STATUS_LENGTH)
    }

    /// Get a USB PD message.
    ///
    /// The message is read in chunks until it is complete or the PPM returns
    /// less than asked.
    ///
    /// # Arguments
    /// `connector_nr` The connector number to query.
    /// `recipient` Represents the PD message to be retrieved from local, SOP,
    /// SOP' or SOP"
    /// `response_type` Represents the type of response to be retrieved.
    pub fn pd_message(
        &mut self,
        connector_nr: usize,
        recipient: MessageRecipient,
        response_type: MessageResponseType,
    ) -> Result<Message> {
        self.check_connector(connector_nr)?;

        let message_len = response_type.message_len();
        if message_len == 0 {
            return Err(Error::invalid_parameter(
                "response_type",
                response_type as u64,
            ));
        }

        let mut payload = Vec::with_capacity(message_len);
        while payload.len() < message_len {
            let nr_bytes = (message_len - payload.len()).min(UCSI_MAX_DATA_LENGTH);
            let response = self.execute(&Command::GetPdMessage {
                connector_nr,
                recipient,
                offset: payload.len(),
                nr_bytes,
                response_type,
            })?;
            payload.extend(response.iter().take(nr_bytes));
            if response.len() < nr_bytes {
                break;
            }
        }

        let revision = self.revision()?;
        Message::decode(&payload, response_type, recipient, revision)
    }

    #[allow(clippy::too_many_arguments)]
    /// Get PDOs from local and partner Policy Managers.
    ///
    /// #Arguments
    ///
    /// `connector_nr` Represents connector to be queried
    /// `partner_pdo` Whether to retrieve partner PDOs
    /// `pdo_offset` Index from which PDO needs to be retrieved
    /// `nr_pdos` Represents number of PDOs to be retrieved, 0 for all of them
    /// `pdo_type` Whether to retrieve source or sink PDOs
    /// `source_capabilities_type` Represents the type of Source PDOs requested.
    /// `revision` Indicates the USB PD revision used to interpret the read
    /// data, 0 for the revision reported by the PPM.
    pub fn pdos(
        &mut self,
        connector_nr: usize,
        partner_pdo: bool,
        pdo_offset: u32,
        nr_pdos: usize,
        pdo_type: PdoType,
        source_capabilities_type: PdoSourceCapabilitiesType,
        revision: BcdWrapper,
    ) -> Result<Vec<Pdo>> {
        self.check_connector(connector_nr)?;

        let revision = if revision.is_unknown() {
            self.revision()?
        } else {
            revision
        };
        let max_pdos = if revision.is_unknown() || revision >= BcdWrapper::PD3P1 {
            MAX_EPR_PDOS
        } else {
            MAX_SPR_PDOS
        };
        let wanted = if nr_pdos == 0 {
            max_pdos
        } else {
            nr_pdos.min(max_pdos)
        };

        let mut words = vec![];
        let mut offset = pdo_offset as usize;
        'pages: while words.len() < wanted && offset < max_pdos {
            let count = (wanted - words.len())
                .min(UCSI_MAX_PDOS_PER_CALL)
                .min(max_pdos - offset);
            let response = self.execute(&Command::GetPdos {
                connector_nr,
                partner_pdo,
                pdo_offset: offset as u32,
                nr_pdos: count,
                pdo_type,
                source_capabilities_type,
            })?;

            let mut page_len = 0;
            for chunk in response.chunks_exact(4).take(count) {
                let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                if word == 0 {
                    break 'pages;
                }
                words.push(word);
                page_len += 1;
            }
            if page_len < count {
                break;
            }
            offset += count;
        }

        Ok(words
            .into_iter()
            .map(|word| Pdo::from_u32(word, pdo_type, revision))
            .collect())
    }
}

impl Drop for TypecRs {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(feature = "c_api")]
impl crate::ffi::Tagged for crate::pd::PdPdo {
    const TAG: u8 = 0x5d;
}

#[cfg(feature = "c_api")]
impl crate::ffi::Tagged for crate::ucsi::UcsiAlternateMode {
    const TAG: u8 = 0xa7;
}

/// Turns a C pointer into a reference, rejecting NULL.
///
/// # Safety
/// `ptr` must be NULL or valid for the returned lifetime.
#[cfg(feature = "c_api")]
unsafe fn non_null<'a, T>(ptr: *mut T, parameter: &str) -> Result<&'a mut T> {
    ptr.as_mut()
        .ok_or_else(|| Error::invalid_parameter(parameter, 0))
}

#[cfg(feature = "c_api")]
fn to_c_int(result: Result<()>) -> std::ffi::c_int {
    match result {
        Ok(()) => 0,
        Err(err) => -CError::from(err).0,
    }
}

// The C API.
#[cfg(feature = "c_api")]
impl TypecRs {
    #[no_mangle]
    /// Initializes the library given a `backend`.
    ///
    /// # Arguments
    /// `backend` The backend to use, see `OsBackends` for available options.
    /// `out_typec` An opaque pointer that gets initialized with the new
    /// `TypecRs` instance.
    ///
    /// # Safety
    /// The caller must call libtypec_rs_destroy() at a later point to free up
    /// any allocated resources.
    ///
    /// # Returns
    /// 0 on success, -errno on failure.
    extern "C" fn libtypec_rs_new(
        backend: OsBackends,
        out_typec: *mut *mut Self,
    ) -> std::ffi::c_int {
        to_c_int((|| -> Result<()> {
            let out_typec = unsafe { non_null(out_typec, "out_typec")? };
            *out_typec = std::ptr::null_mut();
            let typec = Self::new(backend)?;
            *out_typec = Box::into_raw(Box::new(typec));
            Ok(())
        })())
    }

    #[no_mangle]
    /// Destroys the `typec` instance. NULL is ignored.
    ///
    /// # Safety
    /// Must be called with a pointer that was previously acquired from
    /// libtypec_rs_new().
    extern "C" fn libtypec_rs_destroy(typec: *mut Self) {
        if !typec.is_null() {
            drop(unsafe { Box::from_raw(typec) });
        }
    }

    #[no_mangle]
    /// Returns the platform policy capabilities in `out_capabilities`
    /// and 0 on success, -errno on failure.
    ///
    /// # Safety
    /// The caller must ensure that out_capabilities is a valid pointer.
    extern "C" fn libtypec_rs_get_capabilities(
        typec: *mut Self,
        out_capabilities: *mut crate::ucsi::UcsiCapability,
    ) -> std::ffi::c_int {
        to_c_int((|| -> Result<()> {
            let typec = unsafe { non_null(typec, "typec")? };
            let out_capabilities = unsafe { non_null(out_capabilities, "out_capabilities")? };
            *out_capabilities = typec.capabilities()?.into();
            Ok(())
        })())
    }

    #[no_mangle]
    /// Returns the connector capabilities in `out_conn_capabilities`
    /// and 0 on success, -errno on failure.
    ///
    /// # Arguments
    /// `connector_nr` The connector number to query.
    ///
    /// # Safety
    /// The caller must ensure that out_conn_capabilities is a valid pointer.
    extern "C" fn libtypec_rs_get_conn_capabilities(
        typec: *mut Self,
        connector_nr: usize,
        out_conn_capabilities: *mut crate::ucsi::UcsiConnectorCapability,
    ) -> std::ffi::c_int {
        to_c_int((|| -> Result<()> {
            let typec = unsafe { non_null(typec, "typec")? };
            let out = unsafe { non_null(out_conn_capabilities, "out_conn_capabilities")? };
            *out = typec.connector_capabilities(connector_nr)?.into();
            Ok(())
        })())
    }

    #[no_mangle]
    /// Returns the alternate modes that the connector/cable/attached device is
    /// able to support in in `out_modes` and 0 on success, -errno on failure.
    ///
    /// # Arguments
    /// `recipient` Represents alternate mode to be retrieved from local or SOP
    /// or SOP' or SOP"
    /// `connector_nr` The connector number to query.
    ///
    /// # Safety
    /// The caller must ensure that `out_modes`, `out_nmodes` and `out_mem_sz`
    /// are valid pointers. The caller must call
    /// libtypec_rs_destroy_alternate_modes with the three values at a later
    /// point to free the memory allocated for `out_modes`.
    extern "C" fn libtypec_rs_get_alternate_modes(
        typec: *mut Self,
        recipient: crate::ucsi::UcsiGetAlternateModesRecipient,
        connector_nr: usize,
        out_modes: *mut *mut crate::ucsi::UcsiAlternateMode,
        out_nmodes: *mut usize,
        out_mem_sz: *mut usize,
    ) -> std::ffi::c_int {
        to_c_int((|| -> Result<()> {
            let typec = unsafe { non_null(typec, "typec")? };
            let out_modes = unsafe { non_null(out_modes, "out_modes")? };
            let out_nmodes = unsafe { non_null(out_nmodes, "out_nmodes")? };
            let out_mem_sz = unsafe { non_null(out_mem_sz, "out_mem_sz")? };

            let modes: Vec<crate::ucsi::UcsiAlternateMode> = typec
                .alternate_modes(recipient.into(), connector_nr)?
                .into_iter()
                .map(Into::into)
                .collect();
            (*out_modes, *out_nmodes, *out_mem_sz) = crate::ffi::leak(modes);
            Ok(())
        })())
    }

    #[no_mangle]
    /// Frees the memory returned by libtypec_rs_get_alternate_modes.
    ///
    /// # Safety
    /// The caller must ensure that `modes`, `nmodes` and `mem_sz` are the
    /// values returned from a previous call to
    /// libtypec_rs_get_alternate_modes().
    extern "C" fn libtypec_rs_destroy_alternate_modes(
        modes: *mut crate::ucsi::UcsiAlternateMode,
        nmodes: usize,
        mem_sz: usize,
    ) {
        unsafe { crate::ffi::reclaim(modes, nmodes, mem_sz) }
    }

    #[no_mangle]
    /// Returns the cable property of a connector in `out_cable_properties` and
    /// 0 on success, -errno on failure.
    ///
    /// # Arguments
    /// `connector_nr` The connector number to query.
    ///
    /// # Safety
    /// The caller must ensure that out_cable_properties is a valid pointer.
    extern "C" fn libtypec_rs_get_cable_properties(
        typec: *mut Self,
        connector_nr: usize,
        out_cable_properties: *mut crate::ucsi::UcsiCableProperty,
    ) -> std::ffi::c_int {
        to_c_int((|| -> Result<()> {
            let typec = unsafe { non_null(typec, "typec")? };
            let out = unsafe { non_null(out_cable_properties, "out_cable_properties")? };
            *out = typec.cable_properties(connector_nr)?.into();
            Ok(())
        })())
    }

    #[no_mangle]
    /// Returns the connector status in `out_connector_status` and 0 on success,
    /// -errno on failure.
    ///
    /// # Arguments
    /// `connector_nr` The connector number to query.
    ///
    /// # Safety
    /// The caller must ensure that out_connector_status is a valid pointer.
    extern "C" fn libtypec_rs_get_connector_status(
        typec: *mut Self,
        connector_nr: usize,
        out_connector_status: *mut crate::ucsi::UcsiConnectorStatus,
    ) -> std::ffi::c_int {
        to_c_int((|| -> Result<()> {
            let typec = unsafe { non_null(typec, "typec")? };
            let out = unsafe { non_null(out_connector_status, "out_connector_status")? };
            *out = typec.connector_status(connector_nr)?.into();
            Ok(())
        })())
    }

    #[no_mangle]
    /// Returns the USB PD response message in `out_pd_message` and 0 on
    /// success, -errno on failure.
    ///
    /// # Arguments
    /// `connector_nr` the connector number to retrieve the message from.
    ///
    /// `recipient` represents the PD message to be retrieved from local or SOP
    /// or SOP' or SOP"
    ///
    /// `response_type` indicates the type of response to be retrieved.
    ///
    /// # Safety
    /// The caller must ensure that out_pd_message is a valid pointer.
    extern "C" fn libtypec_rs_get_pd_message(
        typec: *mut Self,
        connector_nr: usize,
        recipient: crate::pd::PdMessageRecipient,
        response_type: crate::pd::PdMessageResponseType,
        out_pd_message: *mut crate::pd::PdMessage,
    ) -> std::ffi::c_int {
        to_c_int((|| -> Result<()> {
            let typec = unsafe { non_null(typec, "typec")? };
            let out = unsafe { non_null(out_pd_message, "out_pd_message")? };
            *out = typec
                .pd_message(connector_nr, recipient.into(), response_type.into())?
                .into();
            Ok(())
        })())
    }

    #[no_mangle]
    /// Gets PDOs from local and partner Policy Managers
    ///
    /// # Arguments
    /// `connector_nr` Represents connector to be queried
    /// `partner_pdo` Set to true to retrieve partner PDOs
    /// `pdo_offset` Index from which PDO needs to be retrieved
    /// `nr_pdos` Represents number of PDOs to be retrieved, 0 for all of them
    /// `src_or_sink_pdos` controls whether Source or Sink PDOs are requested
    /// `source_capabilities_type` represents the type of Source PDOs requested
    /// `revision` the PD revision to decode with, 0 for the PPM's
    ///
    /// # Safety
    /// The caller must ensure that `out_pdos`, `out_npdos` and `out_mem_sz` are
    /// valid pointers. The caller must call libtypec_rs_destroy_pdos with the
    /// three values to free the memory allocated for `out_pdos` at a later
    /// point.
    ///
    /// # Returns
    /// Returns 0 on success, -errno on failures.
    #[allow(clippy::too_many_arguments)]
    extern "C" fn libtypec_rs_get_pdos(
        typec: *mut Self,
        connector_nr: usize,
        partner_pdo: bool,
        pdo_offset: u32,
        nr_pdos: usize,
        src_or_sink_pdos: crate::ucsi::UcsiPdoType,
        source_capabilities_type: crate::ucsi::UcsiPdoSourceCapabilitiesType,
        revision: BcdWrapper,
        out_pdos: *mut *mut crate::pd::PdPdo,
        out_npdos: *mut usize,
        out_mem_sz: *mut usize,
    ) -> std::ffi::c_int {
        to_c_int((|| -> Result<()> {
            let typec = unsafe { non_null(typec, "typec")? };
            let out_pdos = unsafe { non_null(out_pdos, "out_pdos")? };
            let out_npdos = unsafe { non_null(out_npdos, "out_npdos")? };
            let out_mem_sz = unsafe { non_null(out_mem_sz, "out_mem_sz")? };

            let pdos: Vec<crate::pd::PdPdo> = typec
                .pdos(
                    connector_nr,
                    partner_pdo,
                    pdo_offset,
                    nr_pdos,
                    src_or_sink_pdos.into(),
                    source_capabilities_type.into(),
                    revision,
                )?
                .into_iter()
                .map(Into::into)
                .collect();
            (*out_pdos, *out_npdos, *out_mem_sz) = crate::ffi::leak(pdos);
            Ok(())
        })())
    }

    #[no_mangle]
    /// Frees the memory returned by libtypec_rs_get_pdos.
    ///
    /// # Safety
    /// The caller must ensure that `pdos`, `npdos` and `mem_sz` are the values
    /// returned from a previous call to libtypec_rs_get_pdos().
    extern "C" fn libtypec_rs_destroy_pdos(
        pdos: *mut crate::pd::PdPdo,
        npdos: usize,
        mem_sz: usize,
    ) {
        unsafe { crate::ffi::reclaim(pdos, npdos, mem_sz) }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use mockall::predicate::eq;
    use mockall::Sequence;

    use super::*;
    use crate::ucsi::BmAttributes;
    use crate::MockOsBackend;
    use crate::ToBytes;

    /// A PPM answering from a script, one response per command.
    struct ScriptedPpm {
        capability: Capability,
        responses: VecDeque<Result<Vec<u8>>>,
        submitted: std::sync::Arc<std::sync::Mutex<Vec<Command>>>,
    }

    impl OsBackend for ScriptedPpm {
        fn open(&mut self) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) {}

        fn submit(&mut self, command: &Command) -> Result<Vec<u8>> {
            if let Ok(mut submitted) = self.submitted.lock() {
                submitted.push(command.clone());
            }
            if *command == Command::GetCapability {
                return self.capability.to_vec(16);
            }
            self.responses.pop_front().unwrap_or_else(|| Ok(vec![]))
        }
    }

    fn capability(num_connectors: usize, pd_version: BcdWrapper) -> Capability {
        Capability {
            bm_attributes: BmAttributes {
                usb_power_delivery: true,
                ..Default::default()
            },
            num_connectors,
            pd_version,
            ..Default::default()
        }
    }

    fn scripted(
        pd_version: BcdWrapper,
        responses: Vec<Result<Vec<u8>>>,
    ) -> (TypecRs, std::sync::Arc<std::sync::Mutex<Vec<Command>>>) {
        let submitted = std::sync::Arc::new(std::sync::Mutex::new(vec![]));
        let ppm = ScriptedPpm {
            capability: capability(2, pd_version),
            responses: responses.into(),
            submitted: submitted.clone(),
        };
        (TypecRs::with_backend(Box::new(ppm)).unwrap(), submitted)
    }

    fn words(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    fn source_pdos(typec: &mut TypecRs, nr_pdos: usize) -> Result<Vec<Pdo>> {
        typec.pdos(
            0,
            false,
            0,
            nr_pdos,
            PdoType::Source,
            PdoSourceCapabilitiesType::CurrentSupportedSourceCapabilities,
            BcdWrapper(0),
        )
    }

    #[test]
    fn backend_names() {
        assert_eq!("sysfs".parse::<OsBackends>().unwrap(), OsBackends::Sysfs);
        assert_eq!(
            "UCSI_DEBUGFS".parse::<OsBackends>().unwrap(),
            OsBackends::UcsiDebugfs
        );
        assert!("usb".parse::<OsBackends>().unwrap_err().is_not_supported());
        assert_eq!(
            BackendConfig::from(OsBackends::Default),
            BackendConfig::Sysfs(SysfsConfig::default())
        );
    }

    #[test]
    fn pdos_are_assembled_across_pages() {
        let fixed = [
            0x0801_912c,
            0x0002_d12c,
            0x0003_c12c,
            0x0004_b12c,
            0x0006_412c,
            0x0006_412c,
            0xc0dc_213c,
        ];
        let (mut typec, submitted) = scripted(
            BcdWrapper::PD3P1,
            vec![Ok(words(&fixed[..4])), Ok(words(&fixed[4..]))],
        );

        let pdos = source_pdos(&mut typec, 0).unwrap();
        assert_eq!(pdos.len(), 7);
        let decoded: Vec<u32> = pdos.iter().map(Pdo::to_u32).collect();
        assert_eq!(decoded, fixed);
        assert!(matches!(pdos[6], Pdo::Pd3p2SprProgrammableSupplyPdo(_)));

        let submitted = submitted.lock().unwrap();
        assert_eq!(submitted.len(), 3);
        assert!(matches!(
            submitted[2],
            Command::GetPdos {
                pdo_offset: 4,
                nr_pdos: 4,
                ..
            }
        ));
    }

    #[test]
    fn pdos_stop_at_a_zero_word() {
        let (mut typec, _) = scripted(
            BcdWrapper::PD3P0,
            vec![Ok(words(&[0x0801_912c, 0x0002_d12c, 0, 0]))],
        );
        assert_eq!(source_pdos(&mut typec, 0).unwrap().len(), 2);
    }

    #[test]
    fn pdos_are_capped_by_revision() {
        let page = words(&[0x0801_912c; 4]);
        let (mut typec, submitted) = scripted(
            BcdWrapper::PD3P0,
            vec![Ok(page.clone()), Ok(page.clone()), Ok(page)],
        );

        assert_eq!(source_pdos(&mut typec, 0).unwrap().len(), 7);
        let submitted = submitted.lock().unwrap();
        assert!(matches!(
            submitted.last(),
            Some(Command::GetPdos {
                pdo_offset: 4,
                nr_pdos: 3,
                ..
            })
        ));
    }

    #[test]
    fn source_capabilities_type_only_selects_the_list() {
        let page = words(&[0x0801_912c, 0xc0dc_213c]);
        let (mut typec, submitted) =
            scripted(BcdWrapper::PD3P1, vec![Ok(page.clone()), Ok(page)]);

        let mut decoded = vec![];
        for source_capabilities_type in [
            PdoSourceCapabilitiesType::AdvertisedCapabilities,
            PdoSourceCapabilitiesType::MaximumSupportedSourceCapabilities,
        ] {
            decoded.push(
                typec
                    .pdos(
                        0,
                        false,
                        0,
                        2,
                        PdoType::Source,
                        source_capabilities_type,
                        BcdWrapper(0),
                    )
                    .unwrap(),
            );
        }
        assert_eq!(decoded[0], decoded[1]);
        assert!(matches!(decoded[0][1], Pdo::Pd3p2SprProgrammableSupplyPdo(_)));

        let submitted = submitted.lock().unwrap();
        assert!(matches!(
            submitted.last(),
            Some(Command::GetPdos {
                source_capabilities_type:
                    PdoSourceCapabilitiesType::MaximumSupportedSourceCapabilities,
                ..
            })
        ));
    }

    #[test]
    fn augmented_pdos_follow_the_cached_revision() {
        // An EPR AVS APDO is unknown before PD 3.1.
        let (mut typec, _) = scripted(BcdWrapper::PD3P0, vec![Ok(words(&[0xd12c_1f40]))]);
        let pdos = source_pdos(&mut typec, 1).unwrap();
        assert_eq!(pdos, vec![Pdo::UnknownAugmented(0xd12c_1f40)]);
    }

    #[test]
    fn missing_partner_is_not_fatal() {
        let (mut typec, _) = scripted(
            BcdWrapper::PD3P1,
            vec![
                Err(Error::not_supported()),
                Ok(ConnectorStatus::default().to_vec(19).unwrap()),
            ],
        );

        let err = typec
            .pdos(
                0,
                true,
                0,
                0,
                PdoType::Source,
                PdoSourceCapabilitiesType::CurrentSupportedSourceCapabilities,
                BcdWrapper(0),
            )
            .unwrap_err();
        assert!(err.is_not_supported());
        assert!(!typec.connector_status(0).unwrap().connect_status);
    }

    #[test]
    fn connector_range_is_checked() {
        let (mut typec, submitted) = scripted(BcdWrapper::PD3P1, vec![]);
        let err = typec.connector_status(2).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { ref parameter, value: 2, .. } if parameter == "connector_nr"));
        // Only the capability query reached the PPM.
        assert_eq!(*submitted.lock().unwrap(), vec![Command::GetCapability]);
    }

    #[test]
    fn alternate_modes_are_indexed() {
        let mode = |svid, vdo| AlternateMode {
            svid,
            mode_index: 0,
            vdo,
        };
        let page = |modes: &[AlternateMode]| {
            Ok(modes
                .iter()
                .flat_map(|mode| mode.to_vec(6).unwrap())
                .collect::<Vec<u8>>())
        };
        let (mut typec, _) = scripted(
            BcdWrapper::PD3P1,
            vec![
                page(&[mode(0xff01, 0x405), mode(0x8087, 0x1)]),
                page(&[mode(0xff01, 0xc05), mode(0, 0)]),
            ],
        );

        let modes = typec
            .alternate_modes(GetAlternateModesRecipient::Sop, 0)
            .unwrap();
        assert_eq!(modes.len(), 3);
        assert_eq!(modes[0].mode_index, 0);
        assert_eq!(modes[1].mode_index, 0);
        assert_eq!(modes[2].svid, 0xff01);
        assert_eq!(modes[2].mode_index, 1);
    }

    #[test]
    fn pd_message_is_read_in_chunks() {
        let mut payload = words(&[0xff00_a041, 0x6c00_18d1, 0, 0x5000_0110]);
        payload.resize(28, 0);
        let (mut typec, submitted) = scripted(
            BcdWrapper::PD3P1,
            vec![Ok(payload[..16].to_vec()), Ok(payload[16..].to_vec())],
        );

        let message = typec
            .pd_message(0, MessageRecipient::Sop, MessageResponseType::DiscoverIdentity)
            .unwrap();
        let Message::Pd3p2DiscoverIdentityResponse(identity) = message else {
            panic!("unexpected message {message:?}");
        };
        assert_eq!(identity.id_header_vdo.vendor_id, 0x18d1);

        let submitted = submitted.lock().unwrap();
        assert!(matches!(
            submitted[2],
            Command::GetPdMessage {
                offset: 16,
                nr_bytes: 12,
                ..
            }
        ));
    }

    #[test]
    fn empty_identity_is_not_supported() {
        let (mut typec, _) = scripted(BcdWrapper::PD3P1, vec![Ok(vec![0; 16]), Ok(vec![0; 12])]);
        let err = typec
            .pd_message(0, MessageRecipient::SopPrime, MessageResponseType::DiscoverIdentity)
            .unwrap_err();
        assert!(err.is_not_supported());
    }

    #[test]
    fn busy_is_retried_once() {
        let mut backend = MockOsBackend::new();
        let mut seq = Sequence::new();
        backend.expect_open().times(1).returning(|| Ok(()));
        backend
            .expect_submit()
            .with(eq(Command::GetCapability))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(Error::busy()));
        backend
            .expect_acknowledge()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        backend
            .expect_submit()
            .with(eq(Command::GetCapability))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| capability(1, BcdWrapper::PD3P2).to_vec(16));
        backend
            .expect_submit()
            .with(eq(Command::GetCableProperty { connector_nr: 0 }))
            .times(2)
            .returning(|_| Err(Error::busy()));
        backend.expect_acknowledge().returning(|| Ok(()));
        backend.expect_close().times(1).return_const(());

        let mut typec = TypecRs::with_backend(Box::new(backend)).unwrap();
        assert_eq!(typec.capabilities().unwrap().pd_version, BcdWrapper::PD3P2);
        assert!(matches!(
            typec.cable_properties(0).unwrap_err(),
            Error::Busy { .. }
        ));
    }

    #[test]
    fn closed_instance_refuses_commands() {
        let mut backend = MockOsBackend::new();
        backend.expect_open().returning(|| Ok(()));
        backend.expect_close().times(1).return_const(());

        let mut typec = TypecRs::with_backend(Box::new(backend)).unwrap();
        typec.close();
        let err = typec.capabilities().unwrap_err();
        assert!(matches!(
            err,
            Error::Io { ref source, .. } if source.kind() == std::io::ErrorKind::NotConnected
        ));
        // Dropping does not close twice.
        drop(typec);
    }

    #[test]
    fn failing_open_is_reported() {
        let mut backend = MockOsBackend::new();
        backend
            .expect_open()
            .returning(|| Err(Error::not_supported()));
        assert!(TypecRs::with_backend(Box::new(backend))
            .err()
            .is_some_and(|err| err.is_not_supported()));
    }
}

#[cfg(all(test, feature = "c_api"))]
mod c_api_tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::ffi::Misuse;
    use crate::ffi::Tagged;
    use crate::pd::PdPdo;
    use crate::ucsi::BmAttributes;
    use crate::ucsi::UcsiAlternateMode;
    use crate::MockOsBackend;
    use crate::ToBytes;

    /// A one-connector PD 3.1 PPM that expects the capability query.
    fn ppm() -> MockOsBackend {
        let mut backend = MockOsBackend::new();
        backend.expect_open().times(1).returning(|| Ok(()));
        backend.expect_close().times(1).return_const(());
        backend
            .expect_submit()
            .with(eq(Command::GetCapability))
            .times(1)
            .returning(|_| {
                Capability {
                    bm_attributes: BmAttributes {
                        usb_power_delivery: true,
                        ..Default::default()
                    },
                    num_connectors: 1,
                    pd_version: BcdWrapper::PD3P1,
                    ..Default::default()
                }
                .to_vec(16)
            });
        backend
    }

    fn expect_source_pdos(backend: &mut MockOsBackend, words: &'static [u32]) {
        backend
            .expect_submit()
            .with(eq(Command::GetPdos {
                connector_nr: 0,
                partner_pdo: false,
                pdo_offset: 0,
                nr_pdos: 4,
                pdo_type: PdoType::Source,
                source_capabilities_type:
                    PdoSourceCapabilitiesType::CurrentSupportedSourceCapabilities,
            }))
            .times(1)
            .returning(move |_| Ok(words.iter().flat_map(|word| word.to_le_bytes()).collect()));
    }

    fn into_raw(backend: MockOsBackend) -> *mut TypecRs {
        Box::into_raw(Box::new(TypecRs::with_backend(Box::new(backend)).unwrap()))
    }

    fn get_source_pdos(typec: *mut TypecRs) -> (std::ffi::c_int, *mut PdPdo, usize, usize) {
        let mut pdos: *mut PdPdo = std::ptr::null_mut();
        let mut npdos = 0;
        let mut mem_sz = 0;
        let ret = TypecRs::libtypec_rs_get_pdos(
            typec,
            0,
            false,
            0,
            0,
            PdoType::Source.into(),
            PdoSourceCapabilitiesType::CurrentSupportedSourceCapabilities.into(),
            BcdWrapper(0),
            &mut pdos,
            &mut npdos,
            &mut mem_sz,
        );
        (ret, pdos, npdos, mem_sz)
    }

    #[test]
    fn pdos_round_trip() {
        let mut backend = ppm();
        expect_source_pdos(&mut backend, &[0x0801_912c, 0x0002_d12c]);
        let typec = into_raw(backend);

        let (ret, pdos, npdos, mem_sz) = get_source_pdos(typec);
        assert_eq!(ret, 0);
        assert_eq!(npdos, 2);
        assert_eq!(mem_sz & 0xff, usize::from(PdPdo::TAG));
        assert!(mem_sz >> 8 >= npdos);

        let words: Vec<u32> = unsafe { std::slice::from_raw_parts(pdos, npdos) }
            .iter()
            .cloned()
            .map(|pdo| Pdo::from(pdo).to_u32())
            .collect();
        assert_eq!(words, vec![0x0801_912c, 0x0002_d12c]);

        TypecRs::libtypec_rs_destroy_pdos(pdos, npdos, mem_sz);
        TypecRs::libtypec_rs_destroy(typec);
    }

    #[test]
    fn alternate_modes_round_trip() {
        let mut backend = ppm();
        backend
            .expect_submit()
            .with(eq(Command::GetAlternateModes {
                recipient: GetAlternateModesRecipient::Sop,
                connector_nr: 0,
                offset: 0,
                nr_modes: 2,
            }))
            .times(1)
            .returning(|_| {
                AlternateMode {
                    svid: 0xff01,
                    mode_index: 0,
                    vdo: 0xc05,
                }
                .to_vec(6)
            });
        let typec = into_raw(backend);

        let mut modes: *mut UcsiAlternateMode = std::ptr::null_mut();
        let mut nmodes = 0;
        let mut mem_sz = 0;
        let ret = TypecRs::libtypec_rs_get_alternate_modes(
            typec,
            GetAlternateModesRecipient::Sop.into(),
            0,
            &mut modes,
            &mut nmodes,
            &mut mem_sz,
        );
        assert_eq!(ret, 0);
        assert_eq!(nmodes, 1);
        assert_eq!(mem_sz & 0xff, usize::from(UcsiAlternateMode::TAG));

        let mode = AlternateMode::from(unsafe { (*modes).clone() });
        assert_eq!(mode.svid, 0xff01);
        assert_eq!(mode.vdo, 0xc05);

        TypecRs::libtypec_rs_destroy_alternate_modes(modes, nmodes, mem_sz);
        TypecRs::libtypec_rs_destroy(typec);
    }

    #[test]
    fn pdo_token_is_refused_by_the_alternate_mode_destroyer() {
        let mut backend = ppm();
        expect_source_pdos(&mut backend, &[0x0801_912c]);
        let typec = into_raw(backend);

        let (ret, pdos, npdos, mem_sz) = get_source_pdos(typec);
        assert_eq!(ret, 0);
        assert_eq!(
            crate::ffi::validate::<UcsiAlternateMode>(pdos.cast(), mem_sz),
            Err(Misuse::ForeignTag {
                expected: UcsiAlternateMode::TAG,
                found: PdPdo::TAG,
            })
        );

        // The refusal leaves the token intact for the right destroyer.
        TypecRs::libtypec_rs_destroy_pdos(pdos, npdos, mem_sz);
        TypecRs::libtypec_rs_destroy(typec);
    }

    #[test]
    fn null_pointers_are_invalid() {
        let einval = -nix::libc::EINVAL;

        assert_eq!(
            TypecRs::libtypec_rs_new(OsBackends::Sysfs, std::ptr::null_mut()),
            einval
        );

        let mut capabilities = crate::ucsi::UcsiCapability::from(Capability::default());
        assert_eq!(
            TypecRs::libtypec_rs_get_capabilities(std::ptr::null_mut(), &mut capabilities),
            einval
        );

        // Nothing reaches the PPM when an out-pointer is missing.
        let mut backend = MockOsBackend::new();
        backend.expect_open().times(1).returning(|| Ok(()));
        backend.expect_close().times(1).return_const(());
        let typec = into_raw(backend);

        let mut pdos: *mut PdPdo = std::ptr::null_mut();
        let mut mem_sz = 0;
        let ret = TypecRs::libtypec_rs_get_pdos(
            typec,
            0,
            false,
            0,
            0,
            PdoType::Source.into(),
            PdoSourceCapabilitiesType::CurrentSupportedSourceCapabilities.into(),
            BcdWrapper(0),
            &mut pdos,
            std::ptr::null_mut(),
            &mut mem_sz,
        );
        assert_eq!(ret, einval);
        assert!(pdos.is_null());

        assert_eq!(
            TypecRs::libtypec_rs_get_capabilities(typec, std::ptr::null_mut()),
            einval
        );

        TypecRs::libtypec_rs_destroy(typec);
        TypecRs::libtypec_rs_destroy(std::ptr::null_mut());
    }
}
