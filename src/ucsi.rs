// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! UCSI data structures and commands.
//!
//! Every structure here has a fixed little-endian layout defined by the UCSI
//! specification. Decoders read fields least significant bit first, in the
//! order the tables list them.

use bitstream_io::BitRead;
use bitstream_io::BitWrite;
use enumn::N;
use proc_macros::CApiWrapper;

use crate::bitflags_wrapper;
use crate::pd::MessageRecipient;
use crate::pd::MessageResponseType;
use crate::BcdWrapper;
use crate::BitReader;
use crate::BitWriter;
use crate::Error;
use crate::FromBytes;
use crate::Milliamp;
use crate::Result;
use crate::ToBytes;

/// See UCSI - Table A-2 Parameter Values
pub const UCSI_MAX_NUM_ALT_MODE: usize = 128;
/// The size of the MESSAGE_IN data structure.
pub const UCSI_MAX_DATA_LENGTH: usize = 16;
/// GET_PDOS returns at most this many PDOs per call.
pub const UCSI_MAX_PDOS_PER_CALL: usize = 4;
/// GET_ALTERNATE_MODES returns at most this many modes per call.
pub const UCSI_MAX_ALT_MODES_PER_CALL: usize = 2;
/// The size of the GET_CONNECTOR_STATUS data as of UCSI 2.0.
pub const UCSI_CONNECTOR_STATUS_LENGTH: usize = 19;

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
/// See Table 6-24: GET_ALTERNATE_MODES Command.
pub enum GetAlternateModesRecipient {
    #[default]
    Connector = 0,
    // SOP
    Sop = 1,
    // SOP'
    SopPrime = 2,
    // SOP''
    SopDoublePrime = 3,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum PdoType {
    #[default]
    Sink,
    Source,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum PdoSourceCapabilitiesType {
    #[default]
    CurrentSupportedSourceCapabilities,
    AdvertisedCapabilities,
    MaximumSupportedSourceCapabilities,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// This command is used to get the PPM capabilities.
    GetCapability,
    /// This command is used to get the capabilities of a connector.
    GetConnectorCapability {
        /// This field shall be set to the connector being queried.
        connector_nr: usize,
    },
    /// This command is used to get the Alternate Modes that the
    /// Connector/Cable/Attached Device is capable of supporting. If the
    /// Connector/Cable/Attached device does not support the number of Alternate
    /// Modes requested, starting from the value in the Alternate Mode offset
    /// field, it shall return only (six times the number of Alternate Mode)
    /// bytes to report the number of Alternate Modes it supports.
    GetAlternateModes {
        recipient: GetAlternateModesRecipient,
        /// This field shall be set to the connector being queried.
        connector_nr: usize,
        /// The offset to query.
        offset: usize,
        /// How many modes to return, 1 or 2.
        nr_modes: usize,
    },
    /// This command is used to get the Sink or Source PDOs associated with the
    /// connector identified with the command. For the connector, this command
    /// can be used to get the Source PDOs/Capabilities
    GetPdos {
        /// This field shall be set to the connector being queried.
        connector_nr: usize,
        /// Should be set if the OPM wants to retrieve the PDOS of the device
        /// attached to the connector.
        partner_pdo: bool,
        /// Starting offset of the first PDO to be returned. Valid values are 0
        /// through 7 for the SPR range, 0 through 4 for the EPR range, 0
        /// through 11 for SPR and EPR ranges. Other values shall not be used.
        pdo_offset: u32,
        /// Number of PDOs to return starting from the PDO Offset, 1 through 4.
        nr_pdos: usize,
        /// This field shall be set if the OPM wants to retrieve the Source PDOs
        /// otherwise it will retrieve the Sink PDOs.
        pdo_type: PdoType,
        /// The type of source capabilities requested, this field is only valid
        /// if `partner` is false and `pdo_type` is `PdoType::Source`.
        source_capabilities_type: PdoSourceCapabilitiesType,
    },
    /// This command is used to get the Cable properties on the connector
    /// identified by this command.
    GetCableProperty {
        /// This field shall be set to the connector being queried.
        connector_nr: usize,
    },
    /// This command is used to get the current status of the connector
    /// identified by this command.
    GetConnectorStatus {
        /// This field shall be set to the connector being queried.
        connector_nr: usize,
    },
    /// This command is used to get the details about an error, if there is a
    /// failure in executing a command.
    GetErrorStatus {
        /// The connector the failed command targeted, if any.
        connector_nr: Option<usize>,
    },
    /// This command is used to get the PD message from the connector
    GetPdMessage {
        /// This field shall be set to the connector being queried.
        connector_nr: usize,
        /// This field indicates the recipient of the PD message.
        recipient: MessageRecipient,
        /// Byte offset into the response message.
        offset: usize,
        /// Number of bytes to return, at most 16.
        nr_bytes: usize,
        /// Response message type.
        response_type: MessageResponseType,
    },
    /// Acknowledges a command completion and/or a connector change.
    AckCcCi {
        connector_change: bool,
        command_completed: bool,
    },
}

impl Command {
    /// See UCSI 3.0 - Table A.1
    pub fn cmd_number(&self) -> u32 {
        match &self {
            Command::AckCcCi { .. } => 0x04,
            Command::GetCapability => 0x06,
            Command::GetConnectorCapability { .. } => 0x07,
            Command::GetAlternateModes { .. } => 0x0c,
            Command::GetPdos { .. } => 0x10,
            Command::GetCableProperty { .. } => 0x11,
            Command::GetConnectorStatus { .. } => 0x12,
            Command::GetErrorStatus { .. } => 0x13,
            Command::GetPdMessage { .. } => 0x15,
        }
    }

    /// The connector this command targets, if any.
    pub fn connector_nr(&self) -> Option<usize> {
        match self {
            Command::GetConnectorCapability { connector_nr }
            | Command::GetAlternateModes { connector_nr, .. }
            | Command::GetPdos { connector_nr, .. }
            | Command::GetCableProperty { connector_nr }
            | Command::GetConnectorStatus { connector_nr }
            | Command::GetPdMessage { connector_nr, .. } => Some(*connector_nr),
            Command::GetErrorStatus { connector_nr } => *connector_nr,
            Command::GetCapability | Command::AckCcCi { .. } => None,
        }
    }

    /// The largest response the PPM may return for this command.
    pub fn max_response_len(&self) -> usize {
        match self {
            Command::GetCapability => 16,
            Command::GetConnectorCapability { .. } => 4,
            Command::GetAlternateModes { nr_modes, .. } => 6 * nr_modes,
            Command::GetPdos { nr_pdos, .. } => 4 * nr_pdos,
            Command::GetCableProperty { .. } => 5,
            Command::GetConnectorStatus { .. } => UCSI_CONNECTOR_STATUS_LENGTH,
            Command::GetErrorStatus { .. } => 2,
            Command::GetPdMessage { nr_bytes, .. } => *nr_bytes,
            Command::AckCcCi { .. } => 0,
        }
        .min(UCSI_MAX_DATA_LENGTH.max(UCSI_CONNECTOR_STATUS_LENGTH))
    }

    /// Encodes the command as the 64-bit CONTROL register value.
    pub fn to_control(&self) -> Result<u64> {
        let bytes = self.to_vec(8)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(&bytes);
        Ok(u64::from_le_bytes(word))
    }
}

/// Connector numbers are 1-based and 7 bits wide on the wire.
fn wire_connector(connector_nr: usize) -> Result<u32> {
    if connector_nr >= 0x7f {
        return Err(Error::invalid_parameter(
            "connector_nr",
            connector_nr as u64,
        ));
    }
    Ok(connector_nr as u32 + 1)
}

fn count_field(parameter: &str, count: usize, max: usize) -> Result<u32> {
    if count == 0 || count > max {
        return Err(Error::invalid_parameter(parameter, count as u64));
    }
    Ok(count as u32 - 1)
}

impl ToBytes for Command {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        let command = self.cmd_number();
        bw.write(8, command)?;
        // Data length
        bw.write(8, 0u32)?;
        match self {
            Command::GetCapability => {}
            Command::GetConnectorCapability { connector_nr }
            | Command::GetCableProperty { connector_nr }
            | Command::GetConnectorStatus { connector_nr } => {
                bw.write(7, wire_connector(*connector_nr)?)?;
            }
            Command::GetErrorStatus { connector_nr } => {
                let connector = match connector_nr {
                    Some(nr) => wire_connector(*nr)?,
                    None => 0,
                };
                bw.write(7, connector)?;
            }
            Command::GetAlternateModes {
                recipient,
                connector_nr,
                offset,
                nr_modes,
            } => {
                bw.write(3, *recipient as u32)?;
                // Reserved
                bw.write(5, 0u32)?;
                bw.write(7, wire_connector(*connector_nr)?)?;
                // Reserved
                bw.write(1, 0u32)?;
                if *offset > 0xff {
                    return Err(Error::invalid_parameter("offset", *offset as u64));
                }
                bw.write(8, *offset as u32)?;
                bw.write(
                    2,
                    count_field("nr_modes", *nr_modes, UCSI_MAX_ALT_MODES_PER_CALL)?,
                )?;
            }
            Command::GetPdos {
                connector_nr,
                partner_pdo,
                pdo_offset,
                nr_pdos,
                pdo_type,
                source_capabilities_type,
            } => {
                bw.write(7, wire_connector(*connector_nr)?)?;
                bw.write_bit(*partner_pdo)?;
                if *pdo_offset > 0xff {
                    return Err(Error::invalid_parameter("pdo_offset", *pdo_offset as u64));
                }
                bw.write(8, *pdo_offset)?;
                bw.write(
                    2,
                    count_field("nr_pdos", *nr_pdos, UCSI_MAX_PDOS_PER_CALL)?,
                )?;
                bw.write(1, *pdo_type as u32)?;
                bw.write(2, *source_capabilities_type as u32)?;
            }
            Command::GetPdMessage {
                connector_nr,
                recipient,
                offset,
                nr_bytes,
                response_type,
            } => {
                bw.write(7, wire_connector(*connector_nr)?)?;
                bw.write(3, *recipient as u32)?;
                if *offset > 0xff {
                    return Err(Error::invalid_parameter("offset", *offset as u64));
                }
                bw.write(8, *offset as u32)?;
                if *nr_bytes == 0 || *nr_bytes > UCSI_MAX_DATA_LENGTH {
                    return Err(Error::invalid_parameter("nr_bytes", *nr_bytes as u64));
                }
                bw.write(8, *nr_bytes as u32)?;
                bw.write(6, *response_type as u32)?;
            }
            Command::AckCcCi {
                connector_change,
                command_completed,
            } => {
                bw.write_bit(*connector_change)?;
                bw.write_bit(*command_completed)?;
            }
        }

        bw.byte_align()?;
        Ok(())
    }
}

/// The Command Status and Connector Change Indication register.
///
/// See UCSI - Table 4-4: CCI Data Structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cci {
    /// The 1-based number of the connector that changed, zero if none.
    pub connector_change: u8,
    /// Number of valid bytes in MESSAGE_IN.
    pub data_length: u8,
    pub not_supported: bool,
    pub cancel_completed: bool,
    pub reset_completed: bool,
    pub busy: bool,
    pub acknowledge_command: bool,
    pub error: bool,
    pub command_completed: bool,
}

impl Cci {
    const NOT_SUPPORTED: u32 = 1 << 25;
    const CANCEL_COMPLETED: u32 = 1 << 26;
    const RESET_COMPLETED: u32 = 1 << 27;
    const BUSY: u32 = 1 << 28;
    const ACKNOWLEDGE_COMMAND: u32 = 1 << 29;
    const ERROR: u32 = 1 << 30;
    const COMMAND_COMPLETED: u32 = 1 << 31;

    pub fn from_u32(value: u32) -> Self {
        Self {
            connector_change: ((value >> 1) & 0x7f) as u8,
            data_length: ((value >> 8) & 0xff) as u8,
            not_supported: value & Self::NOT_SUPPORTED != 0,
            cancel_completed: value & Self::CANCEL_COMPLETED != 0,
            reset_completed: value & Self::RESET_COMPLETED != 0,
            busy: value & Self::BUSY != 0,
            acknowledge_command: value & Self::ACKNOWLEDGE_COMMAND != 0,
            error: value & Self::ERROR != 0,
            command_completed: value & Self::COMMAND_COMPLETED != 0,
        }
    }

    pub fn to_u32(&self) -> u32 {
        let flag = |set: bool, bit: u32| if set { bit } else { 0 };
        (u32::from(self.connector_change & 0x7f) << 1)
            | (u32::from(self.data_length) << 8)
            | flag(self.not_supported, Self::NOT_SUPPORTED)
            | flag(self.cancel_completed, Self::CANCEL_COMPLETED)
            | flag(self.reset_completed, Self::RESET_COMPLETED)
            | flag(self.busy, Self::BUSY)
            | flag(self.acknowledge_command, Self::ACKNOWLEDGE_COMMAND)
            | flag(self.error, Self::ERROR)
            | flag(self.command_completed, Self::COMMAND_COMPLETED)
    }

    /// Whether the PPM finished processing the last command, one way or
    /// another.
    pub fn is_settled(&self) -> bool {
        self.command_completed || self.busy || self.error || self.not_supported
    }
}

bitflags_wrapper! {
    Ucsi,
    #[derive(Debug, Clone, PartialEq, Default, Copy)]
    /// See UCSI - Table 6-48: GET_ERROR_STATUS Data
    pub struct ErrorInformation: u16 {
        const UNRECOGNIZED_COMMAND = 1 << 0;
        const NON_EXISTENT_CONNECTOR_NUMBER = 1 << 1;
        const INVALID_COMMAND_SPECIFIC_PARAMETERS = 1 << 2;
        const INCOMPATIBLE_CONNECTOR_PARTNER = 1 << 3;
        const CC_COMMUNICATION_ERROR = 1 << 4;
        const DEAD_BATTERY = 1 << 5;
        const CONTRACT_NEGOTIATION_FAILURE = 1 << 6;
        const OVERCURRENT = 1 << 7;
        const UNDEFINED = 1 << 8;
        const PORT_PARTNER_REJECTED_SWAP = 1 << 9;
        const HARD_RESET = 1 << 10;
        const PPM_POLICY_CONFLICT = 1 << 11;
        const SWAP_REJECTED = 1 << 12;
        const REVERSE_CURRENT_PROTECTION = 1 << 13;
        const SET_SINK_PATH_REJECTED = 1 << 14;
    }
}

impl FromBytes for ErrorInformation {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        Ok(Self::from_bits_retain(reader.read::<u16>(16)?))
    }
}

impl ErrorInformation {
    /// Maps the firmware error bitmap onto the library's error kinds.
    pub fn into_error(self, connector_nr: Option<usize>) -> Error {
        if self.contains(Self::UNRECOGNIZED_COMMAND) {
            Error::not_supported()
        } else if self.contains(Self::NON_EXISTENT_CONNECTOR_NUMBER) {
            Error::invalid_parameter("connector_nr", connector_nr.unwrap_or_default() as u64)
        } else if self.contains(Self::INVALID_COMMAND_SPECIFIC_PARAMETERS) {
            Error::invalid_parameter("command", u64::from(self.bits()))
        } else {
            Error::hardware_fault(self.bits())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
/// This struct represents the GET_CONNECTOR_STATUS data.
pub struct ConnectorStatus {
    /// A bitmap indicating the types of status changes that have occurred on
    /// the connector. See table 6-44 for a description of each bit.
    pub connector_status_change: ConnectorStatusChange,
    /// This field shall indicate the current power operation mode of the
    /// connector.
    pub power_operation_mode: PowerOperationMode,
    /// This field indicates the current connect status of the connector.
    pub connect_status: bool,
    /// This field shall indicate whether the connector is operating as a
    /// consumer or provider.
    pub power_direction: PowerDirection,
    /// This field is only valid when the Connect Status field is set.This field
    /// indicates the current mode the connector is operating in.
    pub connector_partner_flags: ConnectorPartnerFlags,
    /// This field indicates the type of connector partner detected on this
    /// connector.
    pub connector_partner_type: ConnectorPartnerType,
    /// This field shall return the currently negotiated power level, as the
    /// Request Data Object of the contract.
    ///
    /// This field is only valid when the Connect Status field is set to one and
    /// the Power Operation Mode field is set to PD.
    pub negotiated_power_level: u32,
    /// This field is only valid if the connector is operating as a Sink.
    pub battery_charging_capability_status: BatteryChargingCapabilityStatus,
    /// A bitmap indicating the reasons why the Provider capabilities of the
    /// connector have been limited.
    ///
    /// See Table 6-45 for description of each bit.
    pub provider_capabilities_limited_reason: u8,
    /// This field indicates the USB Power Delivery Specification Revision
    /// Number the connector uses during an Explicit Contract.
    pub pd_version_operation_mode: BcdWrapper,
    /// This field shall be set to 0 when the connection is in the direct
    /// orientation.
    pub orientation: ConnectorOrientation,
    /// This field shall indicate the status of the Sink Path.
    pub sink_path_status: SinkPathStatus,
    /// This field shall be set to one when the Reverse Current Protection
    /// happens.
    pub reverse_current_protection_status: bool,
    /// This field is set if the power reading is valid.
    pub power_reading_ready: bool,
    /// This field indicates the current resolution, in 5mA units.
    pub scale_current: u8,
    /// This field is a peak current measurement reading.
    pub peak_current: u16,
    /// This field represents the moving average for the minimum time interval
    /// specified.
    pub average_current: u16,
    /// This field indicates the voltage resolution, in 5mV units.
    pub scale_voltage: u8,
    /// This field is the most recent VBUS voltage measurement.
    pub voltage_reading: u16,
}

impl FromBytes for ConnectorStatus {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let connector_status_change = ConnectorStatusChange::from_bits_retain(reader.read(16)?);
        let power_operation_mode = reader.read::<u32>(3)?;
        let power_operation_mode = PowerOperationMode::n(power_operation_mode)
            .ok_or_else(|| Error::invalid_value("power_operation_mode", power_operation_mode))?;
        let connect_status = reader.read_bit()?;
        let power_direction = reader.read::<u32>(1)?;
        let power_direction = PowerDirection::n(power_direction)
            .ok_or_else(|| Error::invalid_value("power_direction", power_direction))?;
        let connector_partner_flags = ConnectorPartnerFlags::from_bits_retain(reader.read(8)?);
        let connector_partner_type = reader.read::<u32>(3)?;
        let connector_partner_type = ConnectorPartnerType::n(connector_partner_type)
            .ok_or_else(|| Error::invalid_value("connector_partner_type", connector_partner_type))?;
        let negotiated_power_level = reader.read::<u32>(32)?;
        let battery_charging_capability_status = reader.read::<u32>(2)?;
        let battery_charging_capability_status =
            BatteryChargingCapabilityStatus::n(battery_charging_capability_status).ok_or_else(
                || {
                    Error::invalid_value(
                        "battery_charging_capability_status",
                        battery_charging_capability_status,
                    )
                },
            )?;
        let provider_capabilities_limited_reason = reader.read::<u8>(4)?;
        let pd_version_operation_mode = BcdWrapper(reader.read(16)?);
        let orientation = if reader.read_bit()? {
            ConnectorOrientation::Reverse
        } else {
            ConnectorOrientation::Normal
        };
        let sink_path_status = if reader.read_bit()? {
            SinkPathStatus::Ready
        } else {
            SinkPathStatus::NotReady
        };
        let reverse_current_protection_status = reader.read_bit()?;
        let power_reading_ready = reader.read_bit()?;
        let scale_current = reader.read::<u8>(3)?;
        let peak_current = reader.read::<u16>(16)?;
        let average_current = reader.read::<u16>(16)?;
        let scale_voltage = reader.read::<u8>(4)?;
        let voltage_reading = reader.read::<u16>(16)?;

        Ok(Self {
            connector_status_change,
            power_operation_mode,
            connect_status,
            power_direction,
            connector_partner_flags,
            connector_partner_type,
            negotiated_power_level,
            battery_charging_capability_status,
            provider_capabilities_limited_reason,
            pd_version_operation_mode,
            orientation,
            sink_path_status,
            reverse_current_protection_status,
            power_reading_ready,
            scale_current,
            peak_current,
            average_current,
            scale_voltage,
            voltage_reading,
        })
    }
}

impl ToBytes for ConnectorStatus {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        bw.write(16, self.connector_status_change.bits())?;
        bw.write(3, self.power_operation_mode as u32)?;
        bw.write_bit(self.connect_status)?;
        bw.write(1, self.power_direction as u32)?;
        bw.write(8, self.connector_partner_flags.bits())?;
        bw.write(3, self.connector_partner_type as u32)?;
        bw.write(32, self.negotiated_power_level)?;
        bw.write(2, self.battery_charging_capability_status as u32)?;
        bw.write(4, u32::from(self.provider_capabilities_limited_reason & 0xf))?;
        bw.write(16, self.pd_version_operation_mode.0 & 0xffff)?;
        bw.write_bit(self.orientation == ConnectorOrientation::Reverse)?;
        bw.write_bit(self.sink_path_status == SinkPathStatus::Ready)?;
        bw.write_bit(self.reverse_current_protection_status)?;
        bw.write_bit(self.power_reading_ready)?;
        bw.write(3, u32::from(self.scale_current & 0x7))?;
        bw.write(16, self.peak_current)?;
        bw.write(16, self.average_current)?;
        bw.write(4, u32::from(self.scale_voltage & 0xf))?;
        bw.write(16, self.voltage_reading)?;
        bw.byte_align()?;
        Ok(())
    }
}

bitflags_wrapper! {
    Ucsi,
    #[derive(Debug, Clone, PartialEq, Default, Copy)]
    /// Connector Status Change Field Description for GET_CONNECTOR_STATUS. See
    /// UCSI Table 6-44 for more information.
    pub struct ConnectorStatusChange: u16 {
        const EXTERNAL_SUPPLY_CHANGE = 1 << 1;
        const POWER_OPERATION_MODE_CHANGE = 1 << 2;
        const ATTENTION = 1 << 3;
        const SUPPORTED_PROVIDER_CAPABILITIES_CHANGE = 1 << 5;
        const NEGOTIATED_POWER_LEVEL_CHANGE = 1 << 6;
        const PD_RESET_COMPLETE = 1 << 7;
        const SUPPORTED_CAM_CHANGE = 1 << 8;
        const BATTERY_CHARGING_STATUS_CHANGE = 1 << 9;
        const CONNECTOR_PARTNER_CHANGED = 1 << 11;
        const POWER_DIRECTION_CHANGED = 1 << 12;
        const SINK_PATH_STATUS_CHANGE = 1 << 13;
        const CONNECT_CHANGE = 1 << 14;
        const ERROR = 1 << 15;
    }
}

bitflags_wrapper! {
    Ucsi,
    #[derive(Debug, Clone, PartialEq, Default, Copy)]
    /// The mode the connector is operating in. Only valid while connected.
    pub struct ConnectorPartnerFlags: u8 {
        const USB = 1 << 0;
        const ALTERNATE_MODE = 1 << 1;
        const USB4_GEN3 = 1 << 2;
        const USB4_GEN4 = 1 << 3;
    }
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum ConnectorOrientation {
    /// The connection is in the normal orientation.
    #[default]
    Normal = 0,
    /// The connection is in the reverse orientation.
    Reverse = 1,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum SinkPathStatus {
    /// The Sink Path is not ready.
    #[default]
    NotReady = 0,
    /// The Sink Path is ready.
    Ready = 1,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum PowerOperationMode {
    #[default]
    Reserved = 0,
    UsbDefaultOperation = 1,
    BatteryCharging = 2,
    PowerDelivery = 3,
    UsbTypeCCurrent1_5A = 4,
    UsbTypeCCurrent3A = 5,
    UsbTypeCCurrent5A = 6,
    Reserved2 = 7,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum PowerDirection {
    #[default]
    Consumer = 0,
    Provider = 1,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum ConnectorPartnerType {
    #[default]
    Reserved = 0,
    DfpAttached = 1,
    UfpAttached = 2,
    PoweredCableNoUfpAttached = 3,
    PoweredCableUfpAttached = 4,
    DebugAccessoryAttached = 5,
    AudioAdapterAccessoryAttached = 6,
    Reserved2 = 7,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum BatteryChargingCapabilityStatus {
    #[default]
    NotCharging = 0,
    NominalChargingRate = 1,
    SlowChargingRate = 2,
    VerySlowChargingRate = 3,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum CablePropertySpeedExponent {
    #[default]
    Bps = 0,
    Kbps = 1,
    Mbps = 2,
    Gbps = 3,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum CablePropertyPlugEndType {
    #[default]
    UsbTypeA,
    UsbTypeB,
    UsbTypeC,
    OtherNotUsb,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum CablePropertyType {
    #[default]
    Passive = 0,
    Active = 1,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum CablePropertyDirectionality {
    #[default]
    Configurable = 0,
    Fixed = 1,
}

/// Round trip propagation delay of a cable. See USB PD - Table 6.41.
#[derive(Debug, Clone, Copy, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub enum CableLatency {
    #[default]
    LessThan10ns,
    From10To20ns,
    From20To30ns,
    From30To40ns,
    From40To50ns,
    From50To60ns,
    From60To70ns,
    MoreThan70ns,
    /// Active optical cables only.
    Optical1000ns,
    Optical2000ns,
    Optical3000ns,
    /// A value the tables do not define, kept verbatim.
    Unknown(u8),
}

impl CableLatency {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0b0001 => Self::LessThan10ns,
            0b0010 => Self::From10To20ns,
            0b0011 => Self::From20To30ns,
            0b0100 => Self::From30To40ns,
            0b0101 => Self::From40To50ns,
            0b0110 => Self::From50To60ns,
            0b0111 => Self::From60To70ns,
            0b1000 => Self::MoreThan70ns,
            0b1001 => Self::Optical1000ns,
            0b1010 => Self::Optical2000ns,
            0b1011 => Self::Optical3000ns,
            other => Self::Unknown(other),
        }
    }

    pub fn raw(&self) -> u8 {
        match self {
            Self::LessThan10ns => 0b0001,
            Self::From10To20ns => 0b0010,
            Self::From20To30ns => 0b0011,
            Self::From30To40ns => 0b0100,
            Self::From40To50ns => 0b0101,
            Self::From50To60ns => 0b0110,
            Self::From60To70ns => 0b0111,
            Self::MoreThan70ns => 0b1000,
            Self::Optical1000ns => 0b1001,
            Self::Optical2000ns => 0b1010,
            Self::Optical3000ns => 0b1011,
            Self::Unknown(raw) => raw & 0xf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
/// See UCSI Table 6-40: GET_CABLE_PROPERTY Data
pub struct CableProperty {
    /// Speed Exponent (SE). This field defines the base 10 exponent times 3,
    /// that shall be applied to the Speed Mantissa (SM) when calculating the
    /// maximum bit rate that this Cable supports.
    pub speed_exponent: CablePropertySpeedExponent,
    /// This field defines the mantissa that shall be applied to the SE when
    /// calculating the maximum bit rate.
    pub speed_mantissa: u16,
    /// The amount of current the cable is designed for in 50ma units.
    pub raw_current_capability: u8,
    /// `raw_current_capability` scaled.
    pub current_capability: Milliamp,
    /// The PPM shall set this field to a one if the cable has a VBUS connection
    /// from end to end.
    pub vbus_in_cable: bool,
    /// The PPM shall set this field to one if the cable is an Active cable
    /// otherwise it shall set this field to zero if the cable is a Passive
    /// cable.
    pub cable_type: CablePropertyType,
    /// The PPM shall set this field to one if the lane directionality is
    /// configurable else it shall set this field to zero if the lane
    /// directionality is fixed in the cable.
    pub directionality: CablePropertyDirectionality,
    pub plug_end_type: CablePropertyPlugEndType,
    /// This field shall only be valid if the CableType field is set to one.
    /// This field shall indicate that the cable supports Alternate Modes.
    pub mode_support: bool,
    /// Cable’s major USB PD Revision from the Specification Revision field of
    /// the USB PD Message Header
    pub cable_pd_revision: u8,
    pub latency: CableLatency,
}

impl CableProperty {
    /// The maximum bit rate of the cable, in bits per second.
    pub fn max_speed_bps(&self) -> u64 {
        let scale = match self.speed_exponent {
            CablePropertySpeedExponent::Bps => 1,
            CablePropertySpeedExponent::Kbps => 1_000,
            CablePropertySpeedExponent::Mbps => 1_000_000,
            CablePropertySpeedExponent::Gbps => 1_000_000_000,
        };
        u64::from(self.speed_mantissa) * scale
    }
}

impl FromBytes for CableProperty {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let speed_exponent = reader.read::<u32>(2)?;
        let speed_exponent = CablePropertySpeedExponent::n(speed_exponent)
            .ok_or_else(|| Error::invalid_value("speed_exponent", speed_exponent))?;
        let speed_mantissa = reader.read::<u16>(14)?;
        let raw_current_capability = reader.read::<u8>(8)?;
        let vbus_in_cable = reader.read_bit()?;
        let cable_type = if reader.read_bit()? {
            CablePropertyType::Active
        } else {
            CablePropertyType::Passive
        };
        let directionality = if reader.read_bit()? {
            CablePropertyDirectionality::Fixed
        } else {
            CablePropertyDirectionality::Configurable
        };
        let plug_end_type = reader.read::<u32>(2)?;
        let plug_end_type = CablePropertyPlugEndType::n(plug_end_type)
            .ok_or_else(|| Error::invalid_value("plug_end_type", plug_end_type))?;
        let mode_support = reader.read_bit()?;
        let cable_pd_revision = reader.read::<u8>(2)?;
        let latency = CableLatency::from_raw(reader.read::<u8>(4)?);
        // The remaining four bits are reserved.

        Ok(Self {
            speed_exponent,
            speed_mantissa,
            raw_current_capability,
            current_capability: Milliamp(u32::from(raw_current_capability) * 50),
            vbus_in_cable,
            cable_type,
            directionality,
            plug_end_type,
            mode_support,
            cable_pd_revision,
            latency,
        })
    }
}

impl ToBytes for CableProperty {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        bw.write(2, self.speed_exponent as u32)?;
        bw.write(14, u32::from(self.speed_mantissa & 0x3fff))?;
        bw.write(8, self.raw_current_capability)?;
        bw.write_bit(self.vbus_in_cable)?;
        bw.write(1, self.cable_type as u32)?;
        bw.write(1, self.directionality as u32)?;
        bw.write(2, self.plug_end_type as u32)?;
        bw.write_bit(self.mode_support)?;
        bw.write(2, u32::from(self.cable_pd_revision & 0x3))?;
        bw.write(4, u32::from(self.latency.raw()))?;
        bw.write(4, 0u32)?;
        Ok(())
    }
}

/// An alternate mode as reported by GET_ALTERNATE_MODES.
///
/// See USCI 3.0 - Table 6.26.
#[derive(Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub struct AlternateMode {
    /// The Standard or Vendor ID.
    pub svid: u16,
    /// The position of this mode among the modes sharing `svid`, starting at
    /// zero.
    pub mode_index: u8,
    /// The mode's VDO (the MID field).
    pub vdo: u32,
}

impl FromBytes for AlternateMode {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let svid = reader.read::<u16>(16)?;
        let vdo = reader.read::<u32>(32)?;

        Ok(Self {
            svid,
            mode_index: 0,
            vdo,
        })
    }
}

impl ToBytes for AlternateMode {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        bw.write(16, self.svid)?;
        bw.write(32, self.vdo)?;
        Ok(())
    }
}

impl std::fmt::Debug for AlternateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let svid = format!("{:#06x}", self.svid);
        let vdo = format!("{:#010x}", self.vdo);
        f.debug_struct("UcsiAlternateMode")
            .field("svid", &svid)
            .field("mode_index", &self.mode_index)
            .field("vdo", &vdo)
            .finish()
    }
}

bitflags_wrapper! {
    Ucsi,
    #[derive(Debug, Clone, PartialEq, Default, Copy)]
    /// Connector capability data operation mode.
    pub struct ConnectorCapabilityOperationMode: u8 {
        const RP_ONLY = 0b00000001;
        const RD_ONLY = 0b00000010;
        const DRP = 0b00000100;
        const ANALOG_AUDIO_ACCESSORY_MODE = 0b00001000;
        const DEBUG_ACCESSORY_MODE = 0b00010000;
        const USB2 = 0b00100000;
        const USB3 = 0b01000000;
        const ALTERNATE_MODE = 0b10000000;
    }
}

bitflags_wrapper! {
    Ucsi,
    #[derive(Debug, Clone, PartialEq, Default, Copy)]
    /// Connector capability data extended operation mode.
    pub struct ConnectorCapabilityExtendedOperationMode: u8 {
        const USB4_GEN2 = 1 << 0;
        const EPR_SOURCE = 1 << 1;
        const EPR_SINK = 1 << 2;
        const USB4_GEN3 = 1 << 3;
        const USB4_GEN4 = 1 << 4;
    }
}

bitflags_wrapper! {
    Ucsi,
    #[derive(Debug, Clone, PartialEq, Default, Copy)]
    /// Connector capability data miscellaneous capabilities.
    pub struct ConnectorCapabilityMiscellaneousCapabilities: u8 {
        const FW_UPDATE = 1 << 0;
        const SECURITY = 1 << 1;
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
/// The response to a `GET_CONNECTOR_CAPABILITY` command.
/// See UCSI - Table 6-17: GET_CONNECTOR_CAPABILTY Data
pub struct ConnectorCapability {
    /// This field shall indicate the mode that the connector can support.
    ///
    /// Note: Additional capabilities are described in the Extended Operation
    /// Mode field.
    pub operation_mode: ConnectorCapabilityOperationMode,
    /// True only when the operation mode is DRP or Rp only. This shall be true
    /// if the connector is capable of providing power on this connector.
    /// [Either PD, USB Type-C Current or BC 1.2].
    pub provider: bool,
    /// This field is valid only when the operation mode is DRP or Rd only. This
    /// shall be true if the connector is capable of consuming power on this
    /// connector. [Either PD, USB Type-C Current or BC 1.2].
    pub consumer: bool,
    /// This field is valid only when the operation mode is DRP or Rp only or Rd
    /// only. This shall be true if the connector is capable of accepting swap
    /// to DFP
    pub swap_to_dfp: bool,
    /// This field is valid only when the operation mode is DRP or Rp only or Rd
    /// only. This shall be true if the connector is capable of accepting swap
    /// to UFP
    pub swap_to_ufp: bool,
    /// This field is valid only when the operation mode is DRP. This field
    /// shall be true if the connector is capable of accepting swap to SRC.
    pub swap_to_src: bool,
    /// This bit is valid only when the operation mode is DRP. This bit shall be
    /// set to one if the connector is capable of accepting swap to SNK.
    pub swap_to_snk: bool,
    pub extended_operation_mode: ConnectorCapabilityExtendedOperationMode,
    pub miscellaneous_capabilities: ConnectorCapabilityMiscellaneousCapabilities,
    /// This is debug level information. True if the LPM supports this feature.
    /// Otherwise, false.
    pub reverse_current_protection_support: bool,
    /// Partner’s major USB PD Revision from the Specification Revision field of
    /// the USB PD message Header.
    pub partner_pd_revision: u8,
}

impl FromBytes for ConnectorCapability {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let operation_mode = ConnectorCapabilityOperationMode::from_bits_retain(reader.read(8)?);
        let provider = reader.read_bit()?;
        let consumer = reader.read_bit()?;
        let swap_to_dfp = reader.read_bit()?;
        let swap_to_ufp = reader.read_bit()?;
        let swap_to_src = reader.read_bit()?;
        let swap_to_snk = reader.read_bit()?;
        let extended_operation_mode =
            ConnectorCapabilityExtendedOperationMode::from_bits_retain(reader.read(8)?);
        let miscellaneous_capabilities =
            ConnectorCapabilityMiscellaneousCapabilities::from_bits_retain(reader.read(4)?);
        let reverse_current_protection_support = reader.read_bit()?;
        let partner_pd_revision = reader.read::<u8>(2)?;

        Ok(Self {
            operation_mode,
            provider,
            consumer,
            swap_to_dfp,
            swap_to_ufp,
            swap_to_src,
            swap_to_snk,
            extended_operation_mode,
            miscellaneous_capabilities,
            reverse_current_protection_support,
            partner_pd_revision,
        })
    }
}

impl ToBytes for ConnectorCapability {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        bw.write(8, self.operation_mode.bits())?;
        bw.write_bit(self.provider)?;
        bw.write_bit(self.consumer)?;
        bw.write_bit(self.swap_to_dfp)?;
        bw.write_bit(self.swap_to_ufp)?;
        bw.write_bit(self.swap_to_src)?;
        bw.write_bit(self.swap_to_snk)?;
        bw.write(8, self.extended_operation_mode.bits())?;
        bw.write(4, self.miscellaneous_capabilities.bits() & 0xf)?;
        bw.write_bit(self.reverse_current_protection_support)?;
        bw.write(2, u32::from(self.partner_pd_revision & 0x3))?;
        bw.byte_align()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub struct Capability {
    /// The supported PPM features.
    pub bm_attributes: BmAttributes,
    /// This field indicates the number of Connectors that this PPM supports.
    ///
    ///  A value of zero is illegal in this field.
    pub num_connectors: usize,
    /// Optional features supported.
    pub bm_optional_features: BmOptionalFeatures,
    /// This field indicates the number of Alternate Modes that this PPM
    /// supports.
    ///
    /// A value of zero in this field indicates that the PPM does not support
    /// Alternate Modes.
    ///
    /// The complete list of Alternate Modes supported by the PPM can be
    /// obtained using the GET_ALTERNATE_MODE command.
    ///
    /// The maximum number of Alternate Modes a PP can support is limited to
    /// MAX_NUM_ALT_MODE.
    pub num_alt_modes: usize,
    /// Battery Charging Specification Release Number.
    ///
    /// This field shall only be valid if the device indicates that it supports
    /// BC in the bmAttributes field.
    pub bc_version: BcdWrapper,
    /// USB Power Delivery Specification Revision Number.
    ///
    /// This field shall only be valid if the device indicates that it supports
    /// PD in the bmAttributes field.
    pub pd_version: BcdWrapper,
    /// USB Type-C Specification Release Number.
    ///
    /// This field shall only be valid if the device indicates that it supports
    /// USB Type -C in the bmAttributes field.
    pub usb_type_c_version: BcdWrapper,
}

impl FromBytes for Capability {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let bm_attributes = BmAttributes::from_bytes(reader)?;
        let num_connectors = reader.read::<u32>(7)? as usize;
        reader.skip(1)?; // Skip reserved bit
        let bm_optional_features = BmOptionalFeatures::from_bytes(reader)?;
        let num_alt_modes: usize = reader.read::<u32>(8)? as usize;
        reader.skip(8)?; // Skip reserved bits
        let bc_version = BcdWrapper(reader.read(16)?);
        let pd_version = BcdWrapper(reader.read(16)?);
        let usb_type_c_version = BcdWrapper(reader.read(16)?);

        Ok(Self {
            bm_attributes,
            bm_optional_features,
            num_connectors,
            num_alt_modes,
            bc_version,
            pd_version,
            usb_type_c_version,
        })
    }
}

impl ToBytes for Capability {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        self.bm_attributes.to_bytes(bw)?;
        bw.write(7, (self.num_connectors as u32).min(0x7f))?;
        bw.write(1, 0u32)?;
        self.bm_optional_features.to_bytes(bw)?;
        bw.write(8, (self.num_alt_modes as u32).min(0xff))?;
        bw.write(8, 0u32)?;
        bw.write(16, self.bc_version.0 & 0xffff)?;
        bw.write(16, self.pd_version.0 & 0xffff)?;
        bw.write(16, self.usb_type_c_version.0 & 0xffff)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub struct BmAttributes {
    /// Indicates whether this platform supports the Disabled State as defined
    /// in Section 4.5.2.2.1 in the [USBTYPEC].
    pub disabled_state_support: bool,
    /// Indicates whether this platform supports the Battery Charging
    /// Specification as per the value reported in the bcdBCVersion field.
    pub battery_charging: bool,
    /// Indicates whether this platform supports the USB Power Delivery
    /// Specification as per the value reported in the bcdPDVersion field.
    pub usb_power_delivery: bool,
    /// Indicates whether this platform supports power capabilities defined in
    /// the USB Type-C Specification as per the value reported in the
    /// bcdUSBTypeCVersion field.
    pub usb_type_c_current: bool,
    /// Indicates which sources are supported.
    pub bm_power_source: BmPowerSource,
}

impl FromBytes for BmAttributes {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let disabled_state_support: bool = reader.read_bit()?;
        let battery_charging: bool = reader.read_bit()?;
        let usb_power_delivery: bool = reader.read_bit()?;
        reader.skip(3)?; // Skip reserved bits
        let usb_type_c_current: bool = reader.read_bit()?;
        reader.skip(1)?; // Skip reserved bit
        let bm_power_source = BmPowerSource::from_bytes(reader)?;
        reader.skip(16)?; // Skip reserved bits

        Ok(Self {
            disabled_state_support,
            battery_charging,
            usb_power_delivery,
            usb_type_c_current,
            bm_power_source,
        })
    }
}

impl ToBytes for BmAttributes {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        bw.write_bit(self.disabled_state_support)?;
        bw.write_bit(self.battery_charging)?;
        bw.write_bit(self.usb_power_delivery)?;
        bw.write(3, 0u32)?;
        bw.write_bit(self.usb_type_c_current)?;
        bw.write(1, 0u32)?;
        self.bm_power_source.to_bytes(bw)?;
        bw.write(16, 0u32)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub struct BmOptionalFeatures {
    /// This feature indicates that the PPM supports the SET_CCOM command.
    pub set_ccom_supported: bool,
    /// This command is required and shall be set to always supported.
    pub set_power_level_supported: bool,
    /// This feature indicates that the PPM can report details about supported
    /// alternate modes to the OPM.
    pub alternate_mode_details_supported: bool,
    /// This feature indicates that the PPM allows the OPM to change the
    /// currently negotiated alternate mode using the SET_NEW_CAM command.
    pub alternate_mode_override_supported: bool,
    /// This feature indicates that the PPM can report details of Power Delivery
    /// Power Data Objects to the OPM.
    pub pdo_details_supported: bool,
    /// This feature indicates that the PPM supports the GET_CABLE_PROPERTY
    /// command.
    pub cable_details_supported: bool,
    /// This feature indicates that the PPM supports the External Supply Change
    /// notification.
    pub external_supply_notification_supported: bool,
    /// This feature indicates that the PPM supports the PD Reset notification.
    pub pd_reset_notification_supported: bool,
    /// This feature indicates that the LPM supports the GET_PD_MESSAGE command.
    pub get_pd_message_supported: bool,
    /// This feature indicates that the LPM supports GET_ATTENTION_VDO command.
    pub get_attention_vdo_supported: bool,
    /// This feature indicates that the PPM supports FW_UPDATE_REQUEST command.
    pub fw_update_request_supported: bool,
    /// This feature indicates that the PPM supports Power Level Notifications.
    pub negotiated_power_level_change_supported: bool,
    /// This feature indicates that the PPM supports SECURITY_REQUEST command.
    pub security_request_supported: bool,
    /// This feature indicates that the PPM supports SET_RETIMER_MODE command.
    pub set_retimer_mode_supported: bool,
    /// This feature indicates that the PPM supports the chunking of MESSAGE_IN
    /// and MESSAGE_OUT.
    pub chunking_supported: bool,
}

impl FromBytes for BmOptionalFeatures {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let set_ccom_supported: bool = reader.read_bit()?;
        let set_power_level_supported: bool = reader.read_bit()?;
        let alternate_mode_details_supported: bool = reader.read_bit()?;
        let alternate_mode_override_supported: bool = reader.read_bit()?;
        let pdo_details_supported: bool = reader.read_bit()?;
        let cable_details_supported: bool = reader.read_bit()?;
        let external_supply_notification_supported: bool = reader.read_bit()?;
        let pd_reset_notification_supported: bool = reader.read_bit()?;
        let get_pd_message_supported: bool = reader.read_bit()?;
        let get_attention_vdo_supported: bool = reader.read_bit()?;
        let fw_update_request_supported: bool = reader.read_bit()?;
        let negotiated_power_level_change_supported: bool = reader.read_bit()?;
        let security_request_supported: bool = reader.read_bit()?;
        let set_retimer_mode_supported: bool = reader.read_bit()?;
        let chunking_supported: bool = reader.read_bit()?;
        // The field is 24 bits wide, the rest is reserved.
        reader.skip(9)?;

        Ok(Self {
            set_ccom_supported,
            set_power_level_supported,
            alternate_mode_details_supported,
            alternate_mode_override_supported,
            pdo_details_supported,
            cable_details_supported,
            external_supply_notification_supported,
            pd_reset_notification_supported,
            get_pd_message_supported,
            get_attention_vdo_supported,
            fw_update_request_supported,
            negotiated_power_level_change_supported,
            security_request_supported,
            set_retimer_mode_supported,
            chunking_supported,
        })
    }
}

impl ToBytes for BmOptionalFeatures {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        for bit in [
            self.set_ccom_supported,
            self.set_power_level_supported,
            self.alternate_mode_details_supported,
            self.alternate_mode_override_supported,
            self.pdo_details_supported,
            self.cable_details_supported,
            self.external_supply_notification_supported,
            self.pd_reset_notification_supported,
            self.get_pd_message_supported,
            self.get_attention_vdo_supported,
            self.fw_update_request_supported,
            self.negotiated_power_level_change_supported,
            self.security_request_supported,
            self.set_retimer_mode_supported,
            self.chunking_supported,
        ] {
            bw.write_bit(bit)?;
        }
        bw.write(9, 0u32)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Ucsi", repr_c)]
pub struct BmPowerSource {
    pub ac_supply: bool,
    pub other: bool,
    pub uses_vbus: bool,
}

impl FromBytes for BmPowerSource {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let ac_supply: bool = reader.read_bit()?;
        reader.skip(1)?; // Skip reserved bit
        let other: bool = reader.read_bit()?;
        reader.skip(3)?; // Skip reserved bits
        let uses_vbus: bool = reader.read_bit()?;
        reader.skip(1)?; // Skip reserved bit

        Ok(Self {
            ac_supply,
            other,
            uses_vbus,
        })
    }
}

impl ToBytes for BmPowerSource {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        bw.write_bit(self.ac_supply)?;
        bw.write(1, 0u32)?;
        bw.write_bit(self.other)?;
        bw.write(3, 0u32)?;
        bw.write_bit(self.uses_vbus)?;
        bw.write(1, 0u32)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_pdos_control_word() {
        let command = Command::GetPdos {
            connector_nr: 0,
            partner_pdo: true,
            pdo_offset: 4,
            nr_pdos: 4,
            pdo_type: PdoType::Source,
            source_capabilities_type: PdoSourceCapabilitiesType::CurrentSupportedSourceCapabilities,
        };
        assert_eq!(command.to_control().unwrap(), 0x0000_0007_0481_0010);
    }

    #[test]
    fn get_alternate_modes_control_word() {
        let command = Command::GetAlternateModes {
            recipient: GetAlternateModesRecipient::Sop,
            connector_nr: 0,
            offset: 2,
            nr_modes: 2,
        };
        assert_eq!(command.to_control().unwrap(), 0x0000_0102_0101_000c);
    }

    #[test]
    fn get_pd_message_control_word() {
        let command = Command::GetPdMessage {
            connector_nr: 1,
            recipient: MessageRecipient::Sop,
            offset: 16,
            nr_bytes: 12,
            response_type: MessageResponseType::DiscoverIdentity,
        };
        assert_eq!(command.to_control().unwrap(), 0x1030_4082_0015);
    }

    #[test]
    fn ack_and_simple_commands() {
        let ack = Command::AckCcCi {
            connector_change: false,
            command_completed: true,
        };
        assert_eq!(ack.to_control().unwrap(), 0x0002_0004);
        assert_eq!(Command::GetCapability.to_control().unwrap(), 0x06);
        let status = Command::GetConnectorStatus { connector_nr: 2 };
        assert_eq!(status.to_control().unwrap(), 0x0003_0012);
    }

    #[test]
    fn out_of_range_arguments_are_rejected() {
        let command = Command::GetPdos {
            connector_nr: 0,
            partner_pdo: false,
            pdo_offset: 0,
            nr_pdos: 5,
            pdo_type: PdoType::Sink,
            source_capabilities_type: Default::default(),
        };
        assert!(matches!(
            command.to_control(),
            Err(Error::InvalidParameter { .. })
        ));

        let command = Command::GetCableProperty { connector_nr: 200 };
        assert!(matches!(
            command.to_control(),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn cci_bits() {
        let cci = Cci::from_u32(0x8000_0c04);
        assert!(cci.command_completed);
        assert!(!cci.error);
        assert_eq!(cci.data_length, 12);
        assert_eq!(cci.connector_change, 2);
        assert_eq!(cci.to_u32(), 0x8000_0c04);

        let busy = Cci::from_u32(1 << 28);
        assert!(busy.busy);
        assert!(busy.is_settled());
        assert!(!Cci::default().is_settled());
    }

    #[test]
    fn error_information_translation() {
        let err = ErrorInformation::UNRECOGNIZED_COMMAND.into_error(None);
        assert!(err.is_not_supported());

        let err = ErrorInformation::NON_EXISTENT_CONNECTOR_NUMBER.into_error(Some(3));
        assert!(matches!(err, Error::InvalidParameter { value: 3, .. }));

        let err = ErrorInformation::OVERCURRENT.into_error(Some(0));
        assert!(matches!(
            err,
            Error::HardwareFault {
                error_information: 0x80,
                ..
            }
        ));
    }

    #[test]
    fn cable_property_decoding() {
        // 10 Gbps, 5A, VBUS, passive, Type-C, PD 3.0 (2), latency 0b0001.
        let bytes = [0x0b, 0x00, 0x64, 0x91, 0x01];
        let cable = CableProperty::from_slice(&bytes).unwrap();
        assert_eq!(cable.speed_exponent, CablePropertySpeedExponent::Gbps);
        assert_eq!(cable.speed_mantissa, 2);
        assert_eq!(cable.raw_current_capability, 100);
        assert_eq!(cable.current_capability, Milliamp(5000));
        assert!(cable.vbus_in_cable);
        assert_eq!(cable.cable_type, CablePropertyType::Passive);
        assert_eq!(cable.plug_end_type, CablePropertyPlugEndType::UsbTypeC);
        assert!(!cable.mode_support);
        assert_eq!(cable.cable_pd_revision, 2);
        assert_eq!(cable.latency, CableLatency::LessThan10ns);
        assert_eq!(cable.max_speed_bps(), 2_000_000_000);
        assert_eq!(cable.to_vec(5).unwrap(), bytes);
    }

    #[test]
    fn cable_property_unknown_latency_and_reserved_bits() {
        // Latency 0b1111 is undefined, the top nibble is reserved.
        let bytes = [0x00, 0x00, 0x3c, 0xe0, 0xff];
        let cable = CableProperty::from_slice(&bytes).unwrap();
        assert_eq!(cable.latency, CableLatency::Unknown(0xf));
        assert_eq!(cable.cable_pd_revision, 3);
        assert!(cable.mode_support);
        assert_eq!(cable.to_vec(5).unwrap(), [0x00, 0x00, 0x3c, 0xe0, 0x0f]);
    }

    #[test]
    fn short_cable_property_is_a_decode_error() {
        assert!(matches!(
            CableProperty::from_slice(&[0x00, 0x01]),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn alternate_mode_layout() {
        let mode = AlternateMode {
            svid: 0xff01,
            mode_index: 0,
            vdo: 0x0000_1c46,
        };
        let bytes = mode.to_vec(6).unwrap();
        assert_eq!(bytes, [0x01, 0xff, 0x46, 0x1c, 0x00, 0x00]);
        assert_eq!(AlternateMode::from_slice(&bytes).unwrap(), mode);
    }

    #[test]
    fn capability_layout() {
        let capability = Capability {
            bm_attributes: BmAttributes {
                usb_power_delivery: true,
                usb_type_c_current: true,
                ..Default::default()
            },
            num_connectors: 2,
            bm_optional_features: BmOptionalFeatures {
                pdo_details_supported: true,
                get_pd_message_supported: true,
                ..Default::default()
            },
            num_alt_modes: 3,
            bc_version: BcdWrapper(0x0120),
            pd_version: BcdWrapper::PD3P1,
            usb_type_c_version: BcdWrapper(0x0200),
        };
        let bytes = capability.to_vec(16).unwrap();
        assert_eq!(bytes[0], 0b0100_0100);
        assert_eq!(bytes[4], 2);
        assert_eq!(bytes[5], 0b0001_0000);
        assert_eq!(bytes[6], 0b0000_0001);
        assert_eq!(bytes[8], 3);
        assert_eq!(&bytes[12..14], &[0x10, 0x03]);
        assert_eq!(Capability::from_slice(&bytes).unwrap(), capability);
    }

    #[test]
    fn connector_capability_layout() {
        let capability = ConnectorCapability {
            operation_mode: ConnectorCapabilityOperationMode::DRP
                | ConnectorCapabilityOperationMode::USB2,
            provider: true,
            consumer: true,
            swap_to_dfp: true,
            extended_operation_mode: ConnectorCapabilityExtendedOperationMode::EPR_SINK,
            partner_pd_revision: 2,
            ..Default::default()
        };
        let bytes = capability.to_vec(4).unwrap();
        assert_eq!(bytes, [0x24, 0x07, 0x01, 0x10]);
        assert_eq!(ConnectorCapability::from_slice(&bytes).unwrap(), capability);
    }

    #[test]
    fn connector_status_from_a_ucsi1_ppm() {
        // Only the first 9 bytes are provided, the rest reads as zero.
        let status = ConnectorStatus {
            connector_status_change: ConnectorStatusChange::CONNECT_CHANGE,
            power_operation_mode: PowerOperationMode::PowerDelivery,
            connect_status: true,
            power_direction: PowerDirection::Consumer,
            connector_partner_flags: ConnectorPartnerFlags::USB,
            connector_partner_type: ConnectorPartnerType::DfpAttached,
            negotiated_power_level: 0x1304_b12c,
            ..Default::default()
        };
        let bytes = status.to_vec(UCSI_CONNECTOR_STATUS_LENGTH).unwrap();
        let decoded =
            ConnectorStatus::from_padded_slice(&bytes[..9], UCSI_CONNECTOR_STATUS_LENGTH).unwrap();
        assert_eq!(decoded, status);
    }
}
