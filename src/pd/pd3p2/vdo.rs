// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! USB Power Delivery 3.2 (PD3.2) Vendor Defined Objects.
//!
//! VDOs are 32-bit little-endian words. Fields are read starting at bit 0, so
//! the decoders list them in the reverse order of the tables in the USB PD
//! specification.

use bitstream_io::BitRead;
use bitstream_io::BitWrite;
use enumn::N;
use proc_macros::CApiWrapper;

use crate::bitflags_wrapper;
use crate::ucsi::CableLatency;
use crate::BitReader;
use crate::BitWriter;
use crate::Error;
use crate::FromBytes;
use crate::Milliohm;
use crate::Result;
use crate::ToBytes;

#[cfg(feature = "c_api")]
mod c_api {
    pub(crate) use super::Pd3p2VdoActiveCable1 as ActiveCable1;
    pub(crate) use super::Pd3p2VdoActiveCable2 as ActiveCable2;
    pub(crate) use super::Pd3p2VdoAma as Ama;
    pub(crate) use super::Pd3p2VdoDfp as Dfp;
    pub(crate) use super::Pd3p2VdoPassiveCable as PassiveCable;
    pub(crate) use super::Pd3p2VdoUfp as Ufp;
    pub(crate) use super::Pd3p2VdoVpd as Vpd;
}

/// Reads an enum field that has a variant for every possible value.
macro_rules! read_enum {
    ($reader:expr, $bits:expr, $ty:ty, $field:literal) => {{
        let raw = $reader.read::<u32>($bits)?;
        <$ty>::n(raw).ok_or_else(|| Error::invalid_value($field, raw))?
    }};
}

/// USB Highest Speed, shared by the UFP, AMA and cable VDOs.
#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub enum UsbHighestSpeed {
    #[default]
    /// [USB 2.0] only, no SuperSpeed support
    Usb2_0 = 0,
    /// [USB 3.2] Gen1
    Usb3_2Gen1,
    /// [USB 3.2]/[USB4] Gen2
    Usb3_2Gen2,
    /// [USB4] Gen3
    Usb4Gen3,
    /// [USB4] Gen4
    Usb4Gen4,
    Reserved5,
    Reserved6,
    Reserved7,
}

/// VCONN power needed by an AMA or a UFP.
#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub enum VconnPower {
    #[default]
    /// 1W
    W1 = 0,
    /// 1.5W
    W1_5,
    /// 2W
    W2,
    /// 3W
    W3,
    /// 4W
    W4,
    /// 5W
    W5,
    /// 6W
    W6,
    Reserved,
}

/// Maximum VBUS Voltage of a cable or VPD.
#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub enum MaxVbusVoltage {
    #[default]
    /// 20V
    V20 = 0,
    /// 30V (Deprecated)
    V30,
    /// 40V (Deprecated)
    V40,
    /// 50V
    V50,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub enum ConnectorType {
    /// Not specified, used by products predating PD 3.1.
    #[default]
    NotSpecified = 0,
    Reserved,
    /// USB Type-C Receptacle
    Receptacle,
    /// USB Type-C Plug
    Plug,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub enum VbusCurrentHandling {
    #[default]
    Reserved = 0,
    /// 3A
    A3,
    /// 5A
    A5,
    Reserved3,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub enum CableTermination {
    /// VCONN not required. Passive cables only.
    #[default]
    VconnNotRequired = 0,
    /// VCONN required. Passive cables only.
    VconnRequired,
    /// One end active, one end passive, VCONN required.
    OneEndActive,
    /// Both ends active, VCONN required.
    BothEndsActive,
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
/// USB Type-C plug to USB Type-C/Captive
pub enum CablePlug {
    #[default]
    Reserved0 = 0,
    Reserved1,
    /// USB Type-C
    TypeC,
    /// Captive
    Captive,
}

/// The ID Header VDO. See USB PD 3.2 - Table 6.33.
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub struct IdHeader {
    /// USB Vendor ID
    pub vendor_id: u16,
    /// Whether the plug or receptacle is captive.
    pub connector_type: ConnectorType,
    /// Product Type (DFP). Only meaningful for SOP.
    pub product_type_dfp: u8,
    /// Modal Operation Supported
    pub modal_operation_supported: bool,
    /// Product Type (UFP) for SOP, Product Type (Cable Plug/VPD) for SOP'.
    pub product_type_ufp: u8,
    /// USB Communications Capable as a USB Device
    pub usb_communications_capable_as_device: bool,
    /// USB Communications Capable as USB Host
    pub usb_communications_capable_as_host: bool,
}

impl IdHeader {
    /// SOP Product Type (UFP): PDUSB Hub.
    pub const UFP_HUB: u8 = 0b001;
    /// SOP Product Type (UFP): PDUSB Peripheral.
    pub const UFP_PERIPHERAL: u8 = 0b010;
    /// SOP Product Type (UFP): PSD.
    pub const UFP_PSD: u8 = 0b011;
    /// SOP Product Type (UFP): Alternate Mode Adapter. Removed in PD 3.1.
    pub const UFP_AMA: u8 = 0b101;
    /// SOP' Product Type: Passive Cable.
    pub const CABLE_PASSIVE: u8 = 0b011;
    /// SOP' Product Type: Active Cable.
    pub const CABLE_ACTIVE: u8 = 0b100;
    /// SOP' Product Type: VCONN-Powered USB Device.
    pub const CABLE_VPD: u8 = 0b110;
    /// SOP Product Type (DFP): PDUSB Hub.
    pub const DFP_HUB: u8 = 0b001;
    /// SOP Product Type (DFP): PDUSB Host.
    pub const DFP_HOST: u8 = 0b010;
    /// SOP Product Type (DFP): Power Brick.
    pub const DFP_POWER_BRICK: u8 = 0b011;
}

impl FromBytes for IdHeader {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let vendor_id = reader.read::<u16>(16)?;
        reader.skip(5)?; // Reserved
        let connector_type = read_enum!(reader, 2, ConnectorType, "connector_type");
        let product_type_dfp = reader.read::<u8>(3)?;
        let modal_operation_supported = reader.read_bit()?;
        let product_type_ufp = reader.read::<u8>(3)?;
        let usb_communications_capable_as_device = reader.read_bit()?;
        let usb_communications_capable_as_host = reader.read_bit()?;

        Ok(Self {
            vendor_id,
            connector_type,
            product_type_dfp,
            modal_operation_supported,
            product_type_ufp,
            usb_communications_capable_as_device,
            usb_communications_capable_as_host,
        })
    }
}

impl ToBytes for IdHeader {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        bw.write(16, self.vendor_id)?;
        bw.write(5, 0u32)?;
        bw.write(2, self.connector_type as u32)?;
        bw.write(3, u32::from(self.product_type_dfp & 0x7))?;
        bw.write_bit(self.modal_operation_supported)?;
        bw.write(3, u32::from(self.product_type_ufp & 0x7))?;
        bw.write_bit(self.usb_communications_capable_as_device)?;
        bw.write_bit(self.usb_communications_capable_as_host)?;
        Ok(())
    }
}

/// The Cert Stat VDO. See USB PD 3.2 - Table 6.37.
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub struct CertStat {
    /// The XID assigned by USB-IF to the product before certification.
    pub xid: u32,
}

impl FromBytes for CertStat {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        Ok(Self {
            xid: reader.read(32)?,
        })
    }
}

impl ToBytes for CertStat {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        bw.write(32, self.xid)?;
        Ok(())
    }
}

/// The Product VDO. See USB PD 3.2 - Table 6.38.
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub struct Product {
    /// Device release number, in BCD.
    pub bcd_device: u16,
    /// Product ID (assigned by the manufacturer)
    pub product_id: u16,
}

impl FromBytes for Product {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let bcd_device = reader.read::<u16>(16)?;
        let product_id = reader.read::<u16>(16)?;
        Ok(Self {
            bcd_device,
            product_id,
        })
    }
}

impl ToBytes for Product {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        bw.write(16, self.bcd_device)?;
        bw.write(16, self.product_id)?;
        Ok(())
    }
}

bitflags_wrapper! {
    Pd3p2Vdo,
    #[derive(Debug, Clone, PartialEq, Default, Copy)]
    /// UFP VDO Device Capability.
    pub struct UfpDeviceCapability: u8 {
        const USB2 = 1 << 0;
        const USB2_BILLBOARD = 1 << 1;
        const USB3_2 = 1 << 2;
        const USB4 = 1 << 3;
    }
}

bitflags_wrapper! {
    Pd3p2Vdo,
    #[derive(Debug, Clone, PartialEq, Default, Copy)]
    /// UFP VDO Alternate Modes.
    pub struct UfpAlternateModes: u8 {
        const TBT3 = 1 << 0;
        const RECONFIGURABLE = 1 << 1;
        const NON_RECONFIGURABLE = 1 << 2;
    }
}

/// The UFP VDO. See USB PD 3.2 - Table 6.39.
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub struct Ufp {
    pub usb_highest_speed: UsbHighestSpeed,
    pub alternate_modes: UfpAlternateModes,
    pub vbus_required: bool,
    pub vconn_required: bool,
    pub vconn_power: VconnPower,
    pub connector_type: ConnectorType,
    pub device_capability: UfpDeviceCapability,
    /// Version Number of the VDO (not this specification Version)
    pub vdo_version: u8,
}

impl FromBytes for Ufp {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let usb_highest_speed = read_enum!(reader, 3, UsbHighestSpeed, "usb_highest_speed");
        let alternate_modes = UfpAlternateModes::from_bits_retain(reader.read(3)?);
        let vbus_required = reader.read_bit()?;
        let vconn_required = reader.read_bit()?;
        let vconn_power = read_enum!(reader, 3, VconnPower, "vconn_power");
        reader.skip(11)?; // Reserved
        let connector_type = read_enum!(reader, 2, ConnectorType, "connector_type");
        let device_capability = UfpDeviceCapability::from_bits_retain(reader.read(4)?);
        reader.skip(1)?; // Reserved
        let vdo_version = reader.read::<u8>(3)?;

        Ok(Self {
            usb_highest_speed,
            alternate_modes,
            vbus_required,
            vconn_required,
            vconn_power,
            connector_type,
            device_capability,
            vdo_version,
        })
    }
}

bitflags_wrapper! {
    Pd3p2Vdo,
    #[derive(Debug, Clone, PartialEq, Default, Copy)]
    /// DFP VDO Host Capability.
    pub struct DfpHostCapability: u8 {
        const USB2 = 1 << 0;
        const USB3_2 = 1 << 1;
        const USB4 = 1 << 2;
    }
}

/// The DFP VDO. See USB PD 3.2 - Table 6.40.
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub struct Dfp {
    /// Unique port number to identify a specific port on a multi-port device.
    pub port_number: u8,
    pub connector_type: ConnectorType,
    pub host_capability: DfpHostCapability,
    /// Version Number of the VDO (not this specification Version)
    pub vdo_version: u8,
}

impl FromBytes for Dfp {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let port_number = reader.read::<u8>(5)?;
        reader.skip(17)?; // Reserved
        let connector_type = read_enum!(reader, 2, ConnectorType, "connector_type");
        let host_capability = DfpHostCapability::from_bits_retain(reader.read(3)?);
        reader.skip(2)?; // Reserved
        let vdo_version = reader.read::<u8>(3)?;

        Ok(Self {
            port_number,
            connector_type,
            host_capability,
            vdo_version,
        })
    }
}

/// The Alternate Mode Adapter VDO. Only defined up to USB PD 3.0.
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub struct Ama {
    pub usb_highest_speed: UsbHighestSpeed,
    pub vbus_required: bool,
    pub vconn_required: bool,
    pub vconn_power: VconnPower,
    pub vdo_version: u8,
    pub firmware_version: u8,
    pub hw_version: u8,
}

impl FromBytes for Ama {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let usb_highest_speed = read_enum!(reader, 3, UsbHighestSpeed, "usb_highest_speed");
        let vbus_required = reader.read_bit()?;
        let vconn_required = reader.read_bit()?;
        let vconn_power = read_enum!(reader, 3, VconnPower, "vconn_power");
        reader.skip(13)?; // Reserved
        let vdo_version = reader.read::<u8>(3)?;
        let firmware_version = reader.read::<u8>(4)?;
        let hw_version = reader.read::<u8>(4)?;

        Ok(Self {
            usb_highest_speed,
            vbus_required,
            vconn_required,
            vconn_power,
            vdo_version,
            firmware_version,
            hw_version,
        })
    }
}

/// The Passive Cable VDO. See USB PD 3.2 - Table 6.41.
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub struct PassiveCable {
    pub usb_highest_speed: UsbHighestSpeed,
    pub vbus_current_handling: VbusCurrentHandling,
    pub max_vbus_voltage: MaxVbusVoltage,
    pub cable_termination: CableTermination,
    #[c_api(rename_type = "crate::ucsi::UcsiCableLatency")]
    pub cable_latency: CableLatency,
    pub epr_capable: bool,
    pub plug: CablePlug,
    pub vdo_version: u8,
    pub firmware_version: u8,
    pub hw_version: u8,
}

impl FromBytes for PassiveCable {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let usb_highest_speed = read_enum!(reader, 3, UsbHighestSpeed, "usb_highest_speed");
        reader.skip(2)?; // Reserved
        let vbus_current_handling =
            read_enum!(reader, 2, VbusCurrentHandling, "vbus_current_handling");
        reader.skip(2)?; // Reserved
        let max_vbus_voltage = read_enum!(reader, 2, MaxVbusVoltage, "max_vbus_voltage");
        let cable_termination = read_enum!(reader, 2, CableTermination, "cable_termination");
        let cable_latency = CableLatency::from_raw(reader.read::<u8>(4)?);
        let epr_capable = reader.read_bit()?;
        let plug = read_enum!(reader, 2, CablePlug, "plug");
        reader.skip(1)?; // Reserved
        let vdo_version = reader.read::<u8>(3)?;
        let firmware_version = reader.read::<u8>(4)?;
        let hw_version = reader.read::<u8>(4)?;

        Ok(Self {
            usb_highest_speed,
            vbus_current_handling,
            max_vbus_voltage,
            cable_termination,
            cable_latency,
            epr_capable,
            plug,
            vdo_version,
            firmware_version,
            hw_version,
        })
    }
}

/// Active Cable VDO1. See USB PD 3.2 - Table 6.42.
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub struct ActiveCable1 {
    pub usb_highest_speed: UsbHighestSpeed,
    /// Whether the far end of the cable answers SOP''.
    pub sop_double_prime_controller_present: bool,
    pub vbus_through_cable: bool,
    pub vbus_current_handling: VbusCurrentHandling,
    /// Set for active SBU, clear for passive SBU.
    pub sbu_active: bool,
    pub sbu_supported: bool,
    pub max_vbus_voltage: MaxVbusVoltage,
    pub cable_termination: CableTermination,
    #[c_api(rename_type = "crate::ucsi::UcsiCableLatency")]
    pub cable_latency: CableLatency,
    pub epr_capable: bool,
    pub plug: CablePlug,
    pub vdo_version: u8,
    pub firmware_version: u8,
    pub hw_version: u8,
}

impl FromBytes for ActiveCable1 {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let usb_highest_speed = read_enum!(reader, 3, UsbHighestSpeed, "usb_highest_speed");
        let sop_double_prime_controller_present = reader.read_bit()?;
        let vbus_through_cable = reader.read_bit()?;
        let vbus_current_handling =
            read_enum!(reader, 2, VbusCurrentHandling, "vbus_current_handling");
        let sbu_active = reader.read_bit()?;
        // Zero means SBUs are supported.
        let sbu_supported = !reader.read_bit()?;
        let max_vbus_voltage = read_enum!(reader, 2, MaxVbusVoltage, "max_vbus_voltage");
        let cable_termination = read_enum!(reader, 2, CableTermination, "cable_termination");
        let cable_latency = CableLatency::from_raw(reader.read::<u8>(4)?);
        let epr_capable = reader.read_bit()?;
        let plug = read_enum!(reader, 2, CablePlug, "plug");
        reader.skip(1)?; // Reserved
        let vdo_version = reader.read::<u8>(3)?;
        let firmware_version = reader.read::<u8>(4)?;
        let hw_version = reader.read::<u8>(4)?;

        Ok(Self {
            usb_highest_speed,
            sop_double_prime_controller_present,
            vbus_through_cable,
            vbus_current_handling,
            sbu_active,
            sbu_supported,
            max_vbus_voltage,
            cable_termination,
            cable_latency,
            epr_capable,
            plug,
            vdo_version,
            firmware_version,
            hw_version,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub enum U3CldPower {
    #[default]
    MoreThan10mW = 0,
    From5To10mW,
    From1To5mW,
    From500uWTo1mW,
    From200To500uW,
    From50To200uW,
    LessThan50uW,
    Reserved,
}

/// Active Cable VDO2. See USB PD 3.2 - Table 6.43.
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub struct ActiveCable2 {
    /// Set for Gen 2 or higher, clear for Gen 1.
    pub usb_gen2_or_higher: bool,
    pub usb4_asymmetric_mode_supported: bool,
    pub optically_isolated: bool,
    /// Set when two lanes are supported.
    pub two_lanes: bool,
    pub usb3_2_supported: bool,
    pub usb2_supported: bool,
    pub usb2_hub_hops_consumed: u8,
    pub usb4_supported: bool,
    /// Set for a re-timer, clear for a re-driver.
    pub active_element_retimer: bool,
    /// Set for optical, clear for copper.
    pub physical_connection_optical: bool,
    /// Set for U3 to U0 transition through U3S.
    pub u3_to_u0_through_u3s: bool,
    pub u3_cld_power: U3CldPower,
    /// Shutdown temperature in °C.
    pub shutdown_temperature: u8,
    /// Maximum operating temperature in °C.
    pub max_operating_temperature: u8,
}

impl FromBytes for ActiveCable2 {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let usb_gen2_or_higher = reader.read_bit()?;
        let usb4_asymmetric_mode_supported = reader.read_bit()?;
        let optically_isolated = reader.read_bit()?;
        let two_lanes = reader.read_bit()?;
        // The three support bits below are active low.
        let usb3_2_supported = !reader.read_bit()?;
        let usb2_supported = !reader.read_bit()?;
        let usb2_hub_hops_consumed = reader.read::<u8>(2)?;
        let usb4_supported = !reader.read_bit()?;
        let active_element_retimer = reader.read_bit()?;
        let physical_connection_optical = reader.read_bit()?;
        let u3_to_u0_through_u3s = reader.read_bit()?;
        let u3_cld_power = read_enum!(reader, 3, U3CldPower, "u3_cld_power");
        reader.skip(1)?; // Reserved
        let shutdown_temperature = reader.read::<u8>(8)?;
        let max_operating_temperature = reader.read::<u8>(8)?;

        Ok(Self {
            usb_gen2_or_higher,
            usb4_asymmetric_mode_supported,
            optically_isolated,
            two_lanes,
            usb3_2_supported,
            usb2_supported,
            usb2_hub_hops_consumed,
            usb4_supported,
            active_element_retimer,
            physical_connection_optical,
            u3_to_u0_through_u3s,
            u3_cld_power,
            shutdown_temperature,
            max_operating_temperature,
        })
    }
}

/// VPD VDO. USB PD 3.2 VPD VDO (Section 6.4.4.3.1.9)
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub struct Vpd {
    /// Charge Through Support
    pub charge_through_support: bool,
    /// Ground Impedance, in 1mΩ increments
    pub ground_impedance: Milliohm,
    /// VBUS Impedance, in 2mΩ increments
    pub vbus_impedance: Milliohm,
    /// Set for 5A, clear for 3A.
    pub charge_through_current_5a: bool,
    /// Maximum VPD VBUS Voltage
    pub max_vbus_voltage: MaxVbusVoltage,
    /// Version Number of the VDO (not this specification Version)
    pub vdo_version: u8,
    /// Firmware Version 0000b…1111b assigned by the VID owner
    pub firmware_version: u8,
    /// HW Version 0000b…1111b assigned by the VID owner
    pub hw_version: u8,
}

impl FromBytes for Vpd {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let charge_through_support = reader.read_bit()?;
        let ground_impedance = reader.read::<u32>(6)?.into();
        let vbus_impedance = (reader.read::<u32>(6)? * 2).into();
        reader.skip(1)?; // Reserved
        let charge_through_current_5a = reader.read_bit()?;
        let max_vbus_voltage = read_enum!(reader, 2, MaxVbusVoltage, "max_vbus_voltage");
        reader.skip(4)?; // Reserved
        let vdo_version = reader.read::<u8>(3)?;
        let firmware_version = reader.read::<u8>(4)?;
        let hw_version = reader.read::<u8>(4)?;

        Ok(Self {
            charge_through_support,
            ground_impedance,
            vbus_impedance,
            charge_through_current_5a,
            max_vbus_voltage,
            vdo_version,
            firmware_version,
            hw_version,
        })
    }
}

/// The Product Type VDOs that may follow the Product VDO in a Discover
/// Identity response.
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2Vdo", repr_c)]
pub enum ProductTypeVdo {
    /// The slot is not populated.
    #[default]
    None,
    Ufp(Ufp),
    Dfp(Dfp),
    Ama(Ama),
    PassiveCable(PassiveCable),
    ActiveCable1(ActiveCable1),
    ActiveCable2(ActiveCable2),
    Vpd(Vpd),
    /// The 32-bit pad between the UFP and DFP VDOs of a DRD.
    Pad,
    /// A VDO that the ID Header does not account for, kept verbatim.
    Unknown(u32),
}

impl ProductTypeVdo {
    /// Decodes `word` as a VDO of the given kind.
    pub(crate) fn decode(kind: ProductTypeVdoKind, word: u32) -> Result<Self> {
        let bytes = word.to_le_bytes();
        Ok(match kind {
            ProductTypeVdoKind::Ufp => Self::Ufp(Ufp::from_slice(&bytes)?),
            ProductTypeVdoKind::Dfp => Self::Dfp(Dfp::from_slice(&bytes)?),
            ProductTypeVdoKind::Ama => Self::Ama(Ama::from_slice(&bytes)?),
            ProductTypeVdoKind::PassiveCable => {
                Self::PassiveCable(PassiveCable::from_slice(&bytes)?)
            }
            ProductTypeVdoKind::ActiveCable1 => {
                Self::ActiveCable1(ActiveCable1::from_slice(&bytes)?)
            }
            ProductTypeVdoKind::ActiveCable2 => {
                Self::ActiveCable2(ActiveCable2::from_slice(&bytes)?)
            }
            ProductTypeVdoKind::Vpd => Self::Vpd(Vpd::from_slice(&bytes)?),
            ProductTypeVdoKind::Pad => Self::Pad,
        })
    }
}

/// Which decoder applies to a product type VDO slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProductTypeVdoKind {
    Ufp,
    Dfp,
    Ama,
    PassiveCable,
    ActiveCable1,
    ActiveCable2,
    Vpd,
    Pad,
}
