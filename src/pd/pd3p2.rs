// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! USB Power Delivery 3.2 (PD3.2) functionality.

use bitstream_io::BitRead;
use bitstream_io::BitWrite;
use enumn::N;
use proc_macros::CApiWrapper;

use crate::pd::MessageRecipient;
use crate::pd::VdmHeader;
use crate::pd::CommandType;
use crate::ucsi::PdoType;
use crate::BcdWrapper;
use crate::BitReader;
use crate::BitWriter;
use crate::Error;
use crate::FromBytes;
use crate::Milliamp;
use crate::Millivolt;
use crate::Milliwatt;
use crate::Result;
use crate::ToBytes;

use crate::pd::pd3p2::vdo::CertStat;
use crate::pd::pd3p2::vdo::IdHeader;
use crate::pd::pd3p2::vdo::Product;
use crate::pd::pd3p2::vdo::ProductTypeVdo;
use crate::pd::pd3p2::vdo::ProductTypeVdoKind;

pub mod vdo;

/// Extracts `width` bits of `word` starting at bit `lsb`.
fn field(word: u32, lsb: u32, width: u32) -> u32 {
    (word >> lsb) & ((1 << width) - 1)
}

fn flag(word: u32, bit: u32) -> bool {
    word & (1 << bit) != 0
}

fn set(value: bool, bit: u32) -> u32 {
    u32::from(value) << bit
}

fn put(value: u32, lsb: u32, width: u32) -> u32 {
    (value & ((1 << width) - 1)) << lsb
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// See USB PD 3.2 - Table 6.17 “Fixed Supply PDO – Sink”
pub enum FastRoleSwap {
    #[default]
    NotSupported,
    DefaultUsbPower,
    OnePointFiveAAtFiveV,
    ThreeAAtFiveV,
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// See USB PD 3.2 - Table 6.9 “Fixed Supply PDO – Source” and Table 6.17
/// “Fixed Supply PDO – Sink”.
///
/// Fields that only exist for one role are left at their default for the
/// other.
pub struct FixedSupplyPdo {
    #[c_api(rename_type = "crate::ucsi::UcsiPdoType")]
    pub pdo_type: PdoType,
    pub dual_role_power: bool,
    /// Source only.
    pub usb_suspend_supported: bool,
    /// Sink only.
    pub higher_capability: bool,
    pub unconstrained_power: bool,
    pub usb_communications_capable: bool,
    pub dual_role_data: bool,
    /// Source only.
    pub unchunked_extended_messages_supported: bool,
    /// Source only.
    pub epr_capable: bool,
    /// Sink only. The current the sink needs after a Fast Role Swap.
    pub fast_role_swap: FastRoleSwap,
    /// Source only. The overload capability, 0 meaning peak current equals
    /// IOC.
    pub peak_current: u8,
    pub voltage: Millivolt,
    /// Maximum current for a source, operational current for a sink.
    pub operational_current: Milliamp,
    /// Reserved bits, kept in place.
    pub reserved: u32,
}

impl FixedSupplyPdo {
    const SOURCE_RESERVED: u32 = 1 << 22;
    const SINK_RESERVED: u32 = 0b111 << 20;

    pub fn from_u32(word: u32, pdo_type: PdoType) -> Self {
        let mut pdo = Self {
            pdo_type,
            dual_role_power: flag(word, 29),
            unconstrained_power: flag(word, 27),
            usb_communications_capable: flag(word, 26),
            dual_role_data: flag(word, 25),
            voltage: Millivolt(field(word, 10, 10) * 50),
            operational_current: Milliamp(field(word, 0, 10) * 10),
            ..Default::default()
        };

        match pdo_type {
            PdoType::Source => {
                pdo.usb_suspend_supported = flag(word, 28);
                pdo.unchunked_extended_messages_supported = flag(word, 24);
                pdo.epr_capable = flag(word, 23);
                pdo.peak_current = field(word, 20, 2) as u8;
                pdo.reserved = word & Self::SOURCE_RESERVED;
            }
            PdoType::Sink => {
                pdo.higher_capability = flag(word, 28);
                // Every 2-bit value is a variant.
                pdo.fast_role_swap = FastRoleSwap::n(field(word, 23, 2)).unwrap_or_default();
                pdo.reserved = word & Self::SINK_RESERVED;
            }
        }

        pdo
    }

    pub fn to_u32(&self) -> u32 {
        let common = set(self.dual_role_power, 29)
            | set(self.unconstrained_power, 27)
            | set(self.usb_communications_capable, 26)
            | set(self.dual_role_data, 25)
            | put(self.raw_voltage(), 10, 10)
            | put(self.raw_operational_current(), 0, 10);

        match self.pdo_type {
            PdoType::Source => {
                common
                    | set(self.usb_suspend_supported, 28)
                    | set(self.unchunked_extended_messages_supported, 24)
                    | set(self.epr_capable, 23)
                    | put(u32::from(self.peak_current), 20, 2)
                    | (self.reserved & Self::SOURCE_RESERVED)
            }
            PdoType::Sink => {
                common
                    | set(self.higher_capability, 28)
                    | put(self.fast_role_swap as u32, 23, 2)
                    | (self.reserved & Self::SINK_RESERVED)
            }
        }
    }

    /// The voltage field, in 50mV units.
    pub fn raw_voltage(&self) -> u32 {
        self.voltage.0 / 50
    }

    /// The current field, in 10mA units.
    pub fn raw_operational_current(&self) -> u32 {
        self.operational_current.0 / 10
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// See USB PD 3.2 - Table 6.12 “Battery Supply PDO – Source”
pub struct BatterySupplyPdo {
    #[c_api(rename_type = "crate::ucsi::UcsiPdoType")]
    pub pdo_type: PdoType,
    pub max_voltage: Millivolt,
    pub min_voltage: Millivolt,
    /// Maximum allowable power for a source, operational power for a sink.
    pub operational_power: Milliwatt,
}

impl BatterySupplyPdo {
    pub fn from_u32(word: u32, pdo_type: PdoType) -> Self {
        Self {
            pdo_type,
            max_voltage: Millivolt(field(word, 20, 10) * 50),
            min_voltage: Millivolt(field(word, 10, 10) * 50),
            operational_power: Milliwatt(field(word, 0, 10) * 250),
        }
    }

    pub fn to_u32(&self) -> u32 {
        put(0b01, 30, 2)
            | put(self.raw_max_voltage(), 20, 10)
            | put(self.raw_min_voltage(), 10, 10)
            | put(self.raw_operational_power(), 0, 10)
    }

    /// In 50mV units.
    pub fn raw_max_voltage(&self) -> u32 {
        self.max_voltage.0 / 50
    }

    /// In 50mV units.
    pub fn raw_min_voltage(&self) -> u32 {
        self.min_voltage.0 / 50
    }

    /// In 250mW units.
    pub fn raw_operational_power(&self) -> u32 {
        self.operational_power.0 / 250
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// See USB PD 3.2 - Table 6.11 “Variable Supply (non-Battery) PDO – Source”
pub struct VariableSupplyPdo {
    #[c_api(rename_type = "crate::ucsi::UcsiPdoType")]
    pub pdo_type: PdoType,
    pub max_voltage: Millivolt,
    pub min_voltage: Millivolt,
    /// Maximum current for a source, operational current for a sink.
    pub max_current: Milliamp,
}

impl VariableSupplyPdo {
    pub fn from_u32(word: u32, pdo_type: PdoType) -> Self {
        Self {
            pdo_type,
            max_voltage: Millivolt(field(word, 20, 10) * 50),
            min_voltage: Millivolt(field(word, 10, 10) * 50),
            max_current: Milliamp(field(word, 0, 10) * 10),
        }
    }

    pub fn to_u32(&self) -> u32 {
        put(0b10, 30, 2)
            | put(self.raw_max_voltage(), 20, 10)
            | put(self.raw_min_voltage(), 10, 10)
            | put(self.raw_max_current(), 0, 10)
    }

    /// In 50mV units.
    pub fn raw_max_voltage(&self) -> u32 {
        self.max_voltage.0 / 50
    }

    /// In 50mV units.
    pub fn raw_min_voltage(&self) -> u32 {
        self.min_voltage.0 / 50
    }

    /// In 10mA units.
    pub fn raw_max_current(&self) -> u32 {
        self.max_current.0 / 10
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// See USB PD 3.2 - Table 6.13 “SPR Programmable Power Supply APDO – Source”
pub struct SprProgrammableSupplyPdo {
    #[c_api(rename_type = "crate::ucsi::UcsiPdoType")]
    pub pdo_type: PdoType,
    /// Source only.
    pub power_limited: bool,
    pub max_voltage: Millivolt,
    pub min_voltage: Millivolt,
    pub max_current: Milliamp,
    /// Reserved bits, kept in place.
    pub reserved: u32,
}

impl SprProgrammableSupplyPdo {
    const RESERVED: u32 = (0b11 << 25) | (1 << 16) | (1 << 7);

    pub fn from_u32(word: u32, pdo_type: PdoType) -> Self {
        Self {
            pdo_type,
            power_limited: pdo_type == PdoType::Source && flag(word, 27),
            max_voltage: Millivolt(field(word, 17, 8) * 100),
            min_voltage: Millivolt(field(word, 8, 8) * 100),
            max_current: Milliamp(field(word, 0, 7) * 50),
            reserved: word & (Self::RESERVED | if pdo_type == PdoType::Sink { 1 << 27 } else { 0 }),
        }
    }

    pub fn to_u32(&self) -> u32 {
        put(0b11, 30, 2)
            | set(self.power_limited, 27)
            | put(self.raw_max_voltage(), 17, 8)
            | put(self.raw_min_voltage(), 8, 8)
            | put(self.raw_max_current(), 0, 7)
            | (self.reserved & (Self::RESERVED | (1 << 27)))
    }

    /// In 100mV units.
    pub fn raw_max_voltage(&self) -> u32 {
        self.max_voltage.0 / 100
    }

    /// In 100mV units.
    pub fn raw_min_voltage(&self) -> u32 {
        self.min_voltage.0 / 100
    }

    /// In 50mA units.
    pub fn raw_max_current(&self) -> u32 {
        self.max_current.0 / 50
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// See USB PD 3.2 - Table 6.14 “EPR Adjustable Voltage Supply APDO – Source”
pub struct EprAdjustableVoltageSupplyPdo {
    #[c_api(rename_type = "crate::ucsi::UcsiPdoType")]
    pub pdo_type: PdoType,
    /// The overload capability, 0 meaning peak current equals IOC.
    pub peak_current: u8,
    pub max_voltage: Millivolt,
    pub min_voltage: Millivolt,
    /// PD Power.
    pub pdp: Milliwatt,
    /// Reserved bits, kept in place.
    pub reserved: u32,
}

impl EprAdjustableVoltageSupplyPdo {
    const RESERVED: u32 = 1 << 16;

    pub fn from_u32(word: u32, pdo_type: PdoType) -> Self {
        Self {
            pdo_type,
            peak_current: field(word, 26, 2) as u8,
            max_voltage: Millivolt(field(word, 17, 9) * 100),
            min_voltage: Millivolt(field(word, 8, 8) * 100),
            pdp: Milliwatt(field(word, 0, 8) * 1000),
            reserved: word & Self::RESERVED,
        }
    }

    pub fn to_u32(&self) -> u32 {
        put(0b11, 30, 2)
            | put(0b01, 28, 2)
            | put(u32::from(self.peak_current), 26, 2)
            | put(self.raw_max_voltage(), 17, 9)
            | put(self.raw_min_voltage(), 8, 8)
            | put(self.raw_pdp(), 0, 8)
            | (self.reserved & Self::RESERVED)
    }

    /// In 100mV units.
    pub fn raw_max_voltage(&self) -> u32 {
        self.max_voltage.0 / 100
    }

    /// In 100mV units.
    pub fn raw_min_voltage(&self) -> u32 {
        self.min_voltage.0 / 100
    }

    /// In 1W units.
    pub fn raw_pdp(&self) -> u32 {
        self.pdp.0 / 1000
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// See USB PD 3.2 - Table 6.15 “SPR Adjustable Voltage Supply APDO – Source”
pub struct SprAdjustableVoltageSupplyPdo {
    #[c_api(rename_type = "crate::ucsi::UcsiPdoType")]
    pub pdo_type: PdoType,
    /// The overload capability, 0 meaning peak current equals IOC.
    pub peak_current: u8,
    /// Maximum current for 9V to 15V.
    pub max_current_15v: Milliamp,
    /// Maximum current for 15V to 20V.
    pub max_current_20v: Milliamp,
    /// Reserved bits, kept in place.
    pub reserved: u32,
}

impl SprAdjustableVoltageSupplyPdo {
    const RESERVED: u32 = 0b11_1111 << 20;

    pub fn from_u32(word: u32, pdo_type: PdoType) -> Self {
        Self {
            pdo_type,
            peak_current: field(word, 26, 2) as u8,
            max_current_15v: Milliamp(field(word, 10, 10) * 10),
            max_current_20v: Milliamp(field(word, 0, 10) * 10),
            reserved: word & Self::RESERVED,
        }
    }

    pub fn to_u32(&self) -> u32 {
        put(0b11, 30, 2)
            | put(0b10, 28, 2)
            | put(u32::from(self.peak_current), 26, 2)
            | put(self.raw_max_current_15v(), 10, 10)
            | put(self.raw_max_current_20v(), 0, 10)
            | (self.reserved & Self::RESERVED)
    }

    /// In 10mA units.
    pub fn raw_max_current_15v(&self) -> u32 {
        self.max_current_15v.0 / 10
    }

    /// In 10mA units.
    pub fn raw_max_current_20v(&self) -> u32 {
        self.max_current_20v.0 / 10
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// The response to a Discover Identity command.
pub struct DiscoverIdentityResponse {
    #[c_api(rename_type = "crate::pd::PdVdmHeader")]
    pub header: VdmHeader,
    #[c_api(rename_type = "vdo::Pd3p2VdoIdHeader")]
    pub id_header_vdo: IdHeader,
    #[c_api(rename_type = "vdo::Pd3p2VdoCertStat")]
    pub cert_stat: CertStat,
    #[c_api(rename_type = "vdo::Pd3p2VdoProduct")]
    pub product_vdo: Product,
    #[c_api(rename_type = "vdo::Pd3p2VdoProductTypeVdo")]
    pub product_type_vdo1: ProductTypeVdo,
    #[c_api(rename_type = "vdo::Pd3p2VdoProductTypeVdo")]
    pub product_type_vdo2: ProductTypeVdo,
    #[c_api(rename_type = "vdo::Pd3p2VdoProductTypeVdo")]
    pub product_type_vdo3: ProductTypeVdo,
}

impl DiscoverIdentityResponse {
    /// Decodes a Discover Identity response as returned by GET_PD_MESSAGE:
    /// the VDM header followed by the VDOs.
    ///
    /// Which product type VDOs follow the Product VDO depends on who answered
    /// (`recipient`), on the product types in the ID Header and on the PD
    /// `revision`. A zero revision decodes with the newest layouts.
    pub fn decode(bytes: &[u8], recipient: MessageRecipient, revision: BcdWrapper) -> Result<Self> {
        if bytes.iter().all(|byte| *byte == 0) {
            return Err(Error::not_supported());
        }

        let words: Vec<[u8; 4]> = bytes
            .chunks_exact(4)
            .map(|chunk| [chunk[0], chunk[1], chunk[2], chunk[3]])
            .collect();

        let header = match words.first() {
            Some(word) => VdmHeader::from_slice(word)?,
            None => return Err(Error::decode("DiscoverIdentityResponse", bytes)),
        };

        // NAK and BUSY carry no VDOs.
        if matches!(header.command_type, CommandType::Nak | CommandType::Busy) {
            return Ok(Self {
                header,
                ..Default::default()
            });
        }

        if words.len() < 4 {
            return Err(Error::decode("DiscoverIdentityResponse", bytes));
        }

        let id_header_vdo = IdHeader::from_slice(&words[1])?;
        let cert_stat = CertStat::from_slice(&words[2])?;
        let product_vdo = Product::from_slice(&words[3])?;

        let kinds = product_type_vdo_kinds(&id_header_vdo, recipient, revision);
        let mut slots = [ProductTypeVdo::None, ProductTypeVdo::None, ProductTypeVdo::None];
        for (i, word) in words.iter().skip(4).take(slots.len()).enumerate() {
            let word = u32::from_le_bytes(*word);
            slots[i] = match kinds.get(i) {
                Some(kind) => ProductTypeVdo::decode(*kind, word)?,
                None if word != 0 => ProductTypeVdo::Unknown(word),
                None => ProductTypeVdo::None,
            };
        }
        let [product_type_vdo1, product_type_vdo2, product_type_vdo3] = slots;

        Ok(Self {
            header,
            id_header_vdo,
            cert_stat,
            product_vdo,
            product_type_vdo1,
            product_type_vdo2,
            product_type_vdo3,
        })
    }
}

/// Selects the product type VDO layouts that follow the Product VDO.
///
/// See USB PD 3.2 - Section 6.4.4.3.1 “Discover Identity”.
fn product_type_vdo_kinds(
    id_header: &IdHeader,
    recipient: MessageRecipient,
    revision: BcdWrapper,
) -> Vec<ProductTypeVdoKind> {
    let newest = revision.is_unknown();
    let before = |introduced: BcdWrapper| !newest && revision < introduced;

    match recipient {
        MessageRecipient::Sop => {
            // PD 2.0 only defines the AMA VDO.
            if before(BcdWrapper::PD3P0) {
                return if id_header.product_type_ufp == IdHeader::UFP_AMA {
                    vec![ProductTypeVdoKind::Ama]
                } else {
                    vec![]
                };
            }

            let ufp = match id_header.product_type_ufp {
                IdHeader::UFP_HUB | IdHeader::UFP_PERIPHERAL => Some(ProductTypeVdoKind::Ufp),
                IdHeader::UFP_AMA if before(BcdWrapper::PD3P1) => Some(ProductTypeVdoKind::Ama),
                _ => None,
            };
            let dfp = matches!(
                id_header.product_type_dfp,
                IdHeader::DFP_HUB | IdHeader::DFP_HOST | IdHeader::DFP_POWER_BRICK
            );

            match (ufp, dfp) {
                (Some(ufp), true) => vec![ufp, ProductTypeVdoKind::Pad, ProductTypeVdoKind::Dfp],
                (Some(ufp), false) => vec![ufp],
                (None, true) => vec![ProductTypeVdoKind::Dfp],
                (None, false) => vec![],
            }
        }
        MessageRecipient::SopPrime | MessageRecipient::SopDoublePrime => {
            match id_header.product_type_ufp {
                IdHeader::CABLE_PASSIVE => vec![ProductTypeVdoKind::PassiveCable],
                IdHeader::CABLE_ACTIVE if before(BcdWrapper::PD3P0) => {
                    vec![ProductTypeVdoKind::ActiveCable1]
                }
                IdHeader::CABLE_ACTIVE => vec![
                    ProductTypeVdoKind::ActiveCable1,
                    ProductTypeVdoKind::ActiveCable2,
                ],
                IdHeader::CABLE_VPD => vec![ProductTypeVdoKind::Vpd],
                _ => vec![],
            }
        }
        MessageRecipient::Connector => vec![],
    }
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
pub enum LoadStep {
    /// 150mA/µs Load Step (default)
    #[default]
    Ma150PerUs,
    /// 500mA/µs Load Step
    Ma500PerUs,
    Reserved2,
    Reserved3,
}

#[derive(Debug, Clone, PartialEq, Default, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// The safety standard touch temperatures conform to.
pub enum TouchTemp {
    #[default]
    NotApplicable,
    Iec60950_1,
    Iec62368_1Ts1,
    Iec62368_1Ts2,
    Reserved(u8),
}

impl TouchTemp {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            0 => Self::NotApplicable,
            1 => Self::Iec60950_1,
            2 => Self::Iec62368_1Ts1,
            3 => Self::Iec62368_1Ts2,
            other => Self::Reserved(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// A peak current or sink load characteristic descriptor.
///
/// See USB PD 3.2 - Table 6.63 “Source Capabilities Extended Data Block”.
pub struct PeakCurrent {
    /// Percent overload in 10% increments. Values higher than 25 (11001b)
    /// are clipped to 250%.
    pub percent_overload: u8,
    /// Overload period in 20ms.
    pub overload_period: u8,
    /// Duty cycle in 5% increments.
    pub duty_cycle: u8,
    /// VBUS Voltage droop
    pub vbus_voltage_droop: bool,
}

impl FromBytes for PeakCurrent {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let percent_overload = reader.read::<u8>(5)?;
        let overload_period = reader.read::<u8>(6)?;
        let duty_cycle = reader.read::<u8>(4)?;
        let vbus_voltage_droop = reader.read_bit()?;

        Ok(Self {
            percent_overload,
            overload_period,
            duty_cycle,
            vbus_voltage_droop,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
pub struct SceCompliance {
    /// LPS compliant when set
    pub lps_compliant: bool,
    /// PS1 compliant when set
    pub ps1_compliant: bool,
    /// PS2 compliant when set
    pub ps2_compliant: bool,
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
pub struct SceTouchCurrent {
    /// Low touch Current EPS when set
    pub low_touch_current_eps: bool,
    /// Ground pin supported when set
    pub ground_pin_supported: bool,
    /// Ground pin intended for protective earth when set
    pub ground_pin_for_protective_earth: bool,
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
pub struct SceSourceInputs {
    /// An external supply is present when set
    pub external_supply_present: bool,
    /// The external supply is unconstrained when set
    pub external_supply_unconstrained: bool,
    /// Internal battery is present when set
    pub internal_battery_present: bool,
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// See USB PD 3.2 - Table 6.63 “Source Capabilities Extended Data Block
/// (SCEDB)”
pub struct SourceCapabilitiesExtended {
    /// Numeric Vendor ID (assigned by the USB-IF)
    pub vid: u16,
    /// Numeric Product ID (assigned by the manufacturer)
    pub pid: u16,
    /// Numeric Value provided by the USB-IF assigned to the product
    pub xid: u32,
    /// Numeric Firmware version number
    pub fw_version: u8,
    /// Numeric Hardware version number
    pub hw_version: u8,
    pub load_step: LoadStep,
    /// Set for 90% IoC, clear for 25% IoC.
    pub ioc_90_percent: bool,
    /// Holdup Time in ms
    pub holdup_time: u8,
    pub compliance: SceCompliance,
    pub touch_current: SceTouchCurrent,
    pub peak_current1: PeakCurrent,
    pub peak_current2: PeakCurrent,
    pub peak_current3: PeakCurrent,
    /// Touch Temperature conforms to:
    pub touch_temp: TouchTemp,
    pub source_inputs: SceSourceInputs,
    pub num_fixed_batteries: u8,
    pub num_hot_swappable_battery_slots: u8,
    /// SPR Source PDP Rating, in W
    pub spr_source_pdp_rating: u8,
    /// EPR Source PDP Rating, in W
    pub epr_source_pdp_rating: u8,
}

impl FromBytes for SourceCapabilitiesExtended {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let vid = reader.read::<u16>(16)?;
        let pid = reader.read::<u16>(16)?;
        let xid = reader.read::<u32>(32)?;
        let fw_version = reader.read::<u8>(8)?;
        let hw_version = reader.read::<u8>(8)?;
        let load_step = reader.read::<u32>(2)?;
        let load_step =
            LoadStep::n(load_step).ok_or_else(|| Error::invalid_value("load_step", load_step))?;
        let ioc_90_percent = reader.read_bit()?;
        reader.skip(5)?; // Reserved
        let holdup_time = reader.read::<u8>(8)?;
        let lps_compliant = reader.read_bit()?;
        let ps1_compliant = reader.read_bit()?;
        let ps2_compliant = reader.read_bit()?;
        reader.skip(5)?; // Reserved
        let low_touch_current_eps = reader.read_bit()?;
        let ground_pin_supported = reader.read_bit()?;
        let ground_pin_for_protective_earth = reader.read_bit()?;
        reader.skip(5)?; // Reserved
        let peak_current1 = PeakCurrent::from_bytes(reader)?;
        let peak_current2 = PeakCurrent::from_bytes(reader)?;
        let peak_current3 = PeakCurrent::from_bytes(reader)?;
        let touch_temp = TouchTemp::from_raw(reader.read::<u8>(8)?);
        let external_supply_present = reader.read_bit()?;
        let external_supply_unconstrained = reader.read_bit()?;
        let internal_battery_present = reader.read_bit()?;
        reader.skip(5)?; // Reserved
        let num_fixed_batteries = reader.read::<u8>(4)?;
        let num_hot_swappable_battery_slots = reader.read::<u8>(4)?;
        let spr_source_pdp_rating = reader.read::<u8>(8)?;
        let epr_source_pdp_rating = reader.read::<u8>(8)?;

        Ok(Self {
            vid,
            pid,
            xid,
            fw_version,
            hw_version,
            load_step,
            ioc_90_percent,
            holdup_time,
            compliance: SceCompliance {
                lps_compliant,
                ps1_compliant,
                ps2_compliant,
            },
            touch_current: SceTouchCurrent {
                low_touch_current_eps,
                ground_pin_supported,
                ground_pin_for_protective_earth,
            },
            peak_current1,
            peak_current2,
            peak_current3,
            touch_temp,
            source_inputs: SceSourceInputs {
                external_supply_present,
                external_supply_unconstrained,
                internal_battery_present,
            },
            num_fixed_batteries,
            num_hot_swappable_battery_slots,
            spr_source_pdp_rating,
            epr_source_pdp_rating,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
pub struct SkedbCompliance {
    /// Requires LPS Source when set
    pub requires_lps_source: bool,
    /// Requires PS1 Source when set
    pub requires_ps1_source: bool,
    /// Requires PS2 Source when set
    pub requires_ps2_source: bool,
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
pub struct SkedbSinkModes {
    pub pps_charging_supported: bool,
    pub vbus_powered: bool,
    pub mains_powered: bool,
    pub battery_powered: bool,
    pub battery_essentially_unlimited: bool,
    pub avs_supported: bool,
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// See USB PD 3.2 - Table 6.72 “Sink Capabilities Extended Data Block
/// (SKEDB)”
pub struct SinkCapabilitiesExtended {
    /// Numeric Vendor ID (assigned by the USB-IF)
    pub vid: u16,
    /// Numeric Product ID (assigned by the manufacturer)
    pub pid: u16,
    /// Numeric Value provided by the USB-IF assigned to the product
    pub xid: u32,
    /// Numeric Firmware version number
    pub fw_version: u8,
    /// Numeric Hardware version number
    pub hw_version: u8,
    /// Numeric SKEDB Version (not the specification Version): Version 1.0 = 1
    pub skedb_version: u8,
    pub load_step: LoadStep,
    pub sink_load_characteristics: PeakCurrent,
    pub compliance: SkedbCompliance,
    /// Touch Temperature conforms to:
    pub touch_temp: TouchTemp,
    pub num_fixed_batteries: u8,
    pub num_hot_swappable_battery_slots: u8,
    pub sink_modes: SkedbSinkModes,
    /// In W.
    pub spr_sink_minimum_pdp: u8,
    /// In W.
    pub spr_sink_operational_pdp: u8,
    /// In W.
    pub spr_sink_maximum_pdp: u8,
    /// In W. Zero for PD 3.0 sinks.
    pub epr_sink_minimum_pdp: u8,
    /// In W. Zero for PD 3.0 sinks.
    pub epr_sink_operational_pdp: u8,
    /// In W. Zero for PD 3.0 sinks.
    pub epr_sink_maximum_pdp: u8,
}

impl FromBytes for SinkCapabilitiesExtended {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let vid = reader.read::<u16>(16)?;
        let pid = reader.read::<u16>(16)?;
        let xid = reader.read::<u32>(32)?;
        let fw_version = reader.read::<u8>(8)?;
        let hw_version = reader.read::<u8>(8)?;
        let skedb_version = reader.read::<u8>(8)?;
        let load_step = reader.read::<u32>(2)?;
        let load_step =
            LoadStep::n(load_step).ok_or_else(|| Error::invalid_value("load_step", load_step))?;
        reader.skip(6)?; // Reserved
        let sink_load_characteristics = PeakCurrent::from_bytes(reader)?;
        let requires_lps_source = reader.read_bit()?;
        let requires_ps1_source = reader.read_bit()?;
        let requires_ps2_source = reader.read_bit()?;
        reader.skip(5)?; // Reserved
        let touch_temp = TouchTemp::from_raw(reader.read::<u8>(8)?);
        let num_fixed_batteries = reader.read::<u8>(4)?;
        let num_hot_swappable_battery_slots = reader.read::<u8>(4)?;
        let pps_charging_supported = reader.read_bit()?;
        let vbus_powered = reader.read_bit()?;
        let mains_powered = reader.read_bit()?;
        let battery_powered = reader.read_bit()?;
        let battery_essentially_unlimited = reader.read_bit()?;
        let avs_supported = reader.read_bit()?;
        reader.skip(2)?; // Reserved
        let spr_sink_minimum_pdp = reader.read::<u8>(8)?;
        let spr_sink_operational_pdp = reader.read::<u8>(8)?;
        let spr_sink_maximum_pdp = reader.read::<u8>(8)?;
        let epr_sink_minimum_pdp = reader.read::<u8>(8)?;
        let epr_sink_operational_pdp = reader.read::<u8>(8)?;
        let epr_sink_maximum_pdp = reader.read::<u8>(8)?;

        Ok(Self {
            vid,
            pid,
            xid,
            fw_version,
            hw_version,
            skedb_version,
            load_step,
            sink_load_characteristics,
            compliance: SkedbCompliance {
                requires_lps_source,
                requires_ps1_source,
                requires_ps2_source,
            },
            touch_temp,
            num_fixed_batteries,
            num_hot_swappable_battery_slots,
            sink_modes: SkedbSinkModes {
                pps_charging_supported,
                vbus_powered,
                mains_powered,
                battery_powered,
                battery_essentially_unlimited,
                avs_supported,
            },
            spr_sink_minimum_pdp,
            spr_sink_operational_pdp,
            spr_sink_maximum_pdp,
            epr_sink_minimum_pdp,
            epr_sink_operational_pdp,
            epr_sink_maximum_pdp,
        })
    }
}

/// See USB PD 3.2 - Table 6.70 “Battery Capability Data Block (BCDB)”
#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
pub struct BatteryCapabilitiesData {
    /// Numeric Vendor ID (assigned by the USB-IF)
    pub vid: u16,
    /// Numeric Product ID (assigned by the manufacturer)
    pub pid: u16,
    /// Battery’s design capacity in 0.1 WH. 0 means no battery, 0xFFFF means
    /// the design capacity is unknown.
    pub design_capacity: u16,
    /// Battery’s last full charge capacity in 0.1 WH. Same special values as
    /// `design_capacity`.
    pub last_full_charge_capacity: u16,
    pub invalid_battery_reference: bool,
}

impl FromBytes for BatteryCapabilitiesData {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let vid = reader.read::<u16>(16)?;
        let pid = reader.read::<u16>(16)?;
        let design_capacity = reader.read::<u16>(16)?;
        let last_full_charge_capacity = reader.read::<u16>(16)?;
        let invalid_battery_reference = reader.read_bit()?;
        reader.skip(7)?; // Reserved

        Ok(Self {
            vid,
            pid,
            design_capacity,
            last_full_charge_capacity,
            invalid_battery_reference,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
pub enum BatteryChargingStatus {
    #[default]
    Charging,
    Discharging,
    Idle,
    Reserved,
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// See USB PD 3.2 - Table 6.47 “Battery Status Data Object (BSDO)”
pub struct BatteryStatusData {
    /// Invalid Battery reference
    pub invalid_battery_reference: bool,
    /// Battery is present when set
    pub battery_present: bool,
    /// Only valid when `battery_present` is set.
    pub charging_status: BatteryChargingStatus,
    /// Battery’s State of Charge (SoC) in 0.1 WH increments
    /// Note: 0xFFFF = Battery’s SOC unknown
    pub battery_present_capacity: u16,
}

impl FromBytes for BatteryStatusData {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        reader.skip(8)?; // Reserved
        let invalid_battery_reference = reader.read_bit()?;
        let battery_present = reader.read_bit()?;
        let charging_status = reader.read::<u32>(2)?;
        let charging_status = BatteryChargingStatus::n(charging_status)
            .ok_or_else(|| Error::invalid_value("charging_status", charging_status))?;
        reader.skip(4)?; // Reserved
        let battery_present_capacity = reader.read::<u16>(16)?;

        Ok(Self {
            invalid_battery_reference,
            battery_present,
            charging_status,
            battery_present_capacity,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd3p2", repr_c)]
/// See USB PD 3.2 - Table 6.54 “Revision Message Data Object (RMDO)”
pub struct RevisionMessageData {
    /// Version.minor
    pub version_minor: u8,
    /// Version.major
    pub version_major: u8,
    /// Revision.minor
    pub revision_minor: u8,
    /// Revision.major
    pub revision_major: u8,
}

impl RevisionMessageData {
    /// The revision as a BCD value, e.g. 0x0310 for 3.1.
    pub fn revision(&self) -> BcdWrapper {
        BcdWrapper((u32::from(self.revision_major) << 8) | (u32::from(self.revision_minor) << 4))
    }
}

impl FromBytes for RevisionMessageData {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        reader.skip(16)?; // Reserved
        let version_minor = reader.read::<u8>(4)?;
        let version_major = reader.read::<u8>(4)?;
        let revision_minor = reader.read::<u8>(4)?;
        let revision_major = reader.read::<u8>(4)?;

        Ok(Self {
            version_minor,
            version_major,
            revision_minor,
            revision_major,
        })
    }
}

impl ToBytes for RevisionMessageData {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        bw.write(16, 0u32)?;
        bw.write(4, u32::from(self.version_minor & 0xf))?;
        bw.write(4, u32::from(self.version_major & 0xf))?;
        bw.write(4, u32::from(self.revision_minor & 0xf))?;
        bw.write(4, u32::from(self.revision_major & 0xf))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::vdo::Ama;
    use super::vdo::UsbHighestSpeed;
    use super::*;
    use crate::pd::Message;
    use crate::pd::MessageResponseType;

    fn identity(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|word| word.to_le_bytes()).collect()
    }

    const ACK_HEADER: u32 = 0xff00_a041;

    #[test]
    fn fixed_sink_pdo_uses_fast_role_swap() {
        // 5V 3A sink, higher capability, FRS 1.5A.
        let word: u32 = (1 << 28) | (0b10 << 23) | (100 << 10) | 300;
        let pdo = FixedSupplyPdo::from_u32(word, PdoType::Sink);
        assert!(pdo.higher_capability);
        assert!(!pdo.usb_suspend_supported);
        assert_eq!(pdo.fast_role_swap, FastRoleSwap::OnePointFiveAAtFiveV);
        assert_eq!(pdo.peak_current, 0);
        assert_eq!(pdo.voltage, Millivolt(5000));
        assert_eq!(pdo.raw_voltage(), 100);
        assert_eq!(pdo.operational_current, Milliamp(3000));
        assert_eq!(pdo.raw_operational_current(), 300);
        assert_eq!(pdo.to_u32(), word);

        // The same bits on a source are the unchunked and EPR flags.
        let pdo = FixedSupplyPdo::from_u32(word, PdoType::Source);
        assert!(pdo.usb_suspend_supported);
        assert!(pdo.unchunked_extended_messages_supported);
        assert!(!pdo.epr_capable);
        assert_eq!(pdo.fast_role_swap, FastRoleSwap::NotSupported);
        assert_eq!(pdo.to_u32(), word);
    }

    #[test]
    fn battery_and_variable_pdos() {
        // 9V to 20V, 60W.
        let word: u32 = (0b01 << 30) | (400 << 20) | (180 << 10) | 240;
        let battery = BatterySupplyPdo::from_u32(word, PdoType::Source);
        assert_eq!(battery.max_voltage, Millivolt(20000));
        assert_eq!(battery.min_voltage, Millivolt(9000));
        assert_eq!(battery.operational_power, Milliwatt(60000));
        assert_eq!(battery.raw_max_voltage(), 400);
        assert_eq!(battery.raw_min_voltage(), 180);
        assert_eq!(battery.raw_operational_power(), 240);
        assert_eq!(battery.to_u32(), word);

        let word: u32 = (0b10 << 30) | (400 << 20) | (180 << 10) | 150;
        let variable = VariableSupplyPdo::from_u32(word, PdoType::Sink);
        assert_eq!(variable.max_current, Milliamp(1500));
        assert_eq!(variable.raw_max_current(), 150);
        assert_eq!(variable.raw_max_voltage(), 400);
        assert_eq!(variable.raw_min_voltage(), 180);
        assert_eq!(variable.to_u32(), word);
    }

    #[test]
    fn discover_identity_drd_has_ufp_pad_and_dfp() {
        let id_header: u32 = (1 << 31) | (1 << 30) | (0b010 << 27) | (0b010 << 23) | 0x18d1;
        let ufp: u32 = (0b011 << 29) | 0b001;
        let dfp: u32 = (0b010 << 29) | (0b001 << 24) | 1;
        let bytes = identity(&[ACK_HEADER, id_header, 0x1234, 0x5000_0110, ufp, 0, dfp]);

        let response =
            DiscoverIdentityResponse::decode(&bytes, MessageRecipient::Sop, BcdWrapper::PD3P1)
                .unwrap();
        assert_eq!(response.id_header_vdo.vendor_id, 0x18d1);
        assert_eq!(response.cert_stat.xid, 0x1234);
        assert_eq!(response.product_vdo.product_id, 0x5000);
        assert!(matches!(response.product_type_vdo1, ProductTypeVdo::Ufp(_)));
        assert_eq!(response.product_type_vdo2, ProductTypeVdo::Pad);
        let ProductTypeVdo::Dfp(dfp) = &response.product_type_vdo3 else {
            panic!("unexpected {:?}", response.product_type_vdo3);
        };
        assert_eq!(dfp.port_number, 1);
    }

    #[test]
    fn discover_identity_ama_depends_on_revision() {
        let id_header: u32 = (0b101 << 27) | 0x1d5c;
        let ama: u32 = (1 << 3) | 0b001;
        let bytes = identity(&[ACK_HEADER, id_header, 0, 0, ama]);

        let response =
            DiscoverIdentityResponse::decode(&bytes, MessageRecipient::Sop, BcdWrapper::PD3P0)
                .unwrap();
        assert_eq!(
            response.product_type_vdo1,
            ProductTypeVdo::Ama(Ama {
                usb_highest_speed: UsbHighestSpeed::Usb3_2Gen1,
                vbus_required: true,
                ..Default::default()
            })
        );

        let response =
            DiscoverIdentityResponse::decode(&bytes, MessageRecipient::Sop, BcdWrapper::PD3P1)
                .unwrap();
        assert_eq!(response.product_type_vdo1, ProductTypeVdo::Unknown(ama));
        assert_eq!(response.product_type_vdo2, ProductTypeVdo::None);
    }

    #[test]
    fn discover_identity_active_cable() {
        let id_header: u32 = (0b100 << 27) | 0x2109;
        let bytes = identity(&[ACK_HEADER, id_header, 0, 0, 0b100, 1]);

        let response =
            DiscoverIdentityResponse::decode(&bytes, MessageRecipient::SopPrime, BcdWrapper(0))
                .unwrap();
        assert!(matches!(response.product_type_vdo1, ProductTypeVdo::ActiveCable1(_)));
        let ProductTypeVdo::ActiveCable2(vdo2) = &response.product_type_vdo2 else {
            panic!("unexpected {:?}", response.product_type_vdo2);
        };
        assert!(vdo2.usb_gen2_or_higher);
        assert_eq!(response.product_type_vdo3, ProductTypeVdo::None);
    }

    #[test]
    fn discover_identity_nak_and_empty() {
        let nak: u32 = 0xff00_a081;
        let response = DiscoverIdentityResponse::decode(
            &identity(&[nak]),
            MessageRecipient::Sop,
            BcdWrapper::PD3P1,
        )
        .unwrap();
        assert_eq!(response.header.command_type, CommandType::Nak);
        assert_eq!(response.id_header_vdo, IdHeader::default());

        let err = DiscoverIdentityResponse::decode(&[0; 28], MessageRecipient::Sop, BcdWrapper(0))
            .unwrap_err();
        assert!(err.is_not_supported());

        let err = DiscoverIdentityResponse::decode(
            &identity(&[ACK_HEADER, 1]),
            MessageRecipient::Sop,
            BcdWrapper(0),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn sink_capabilities_extended_from_pd3p0_sink() {
        let mut bytes = vec![0u8; 21];
        bytes[0..2].copy_from_slice(&0x18d1u16.to_le_bytes());
        bytes[10] = 1; // SKEDB version
        bytes[11] = 0b01; // 500mA/µs
        bytes[17] = 0b0000_0011; // PPS charging, VBUS powered
        bytes[18] = 15;
        bytes[19] = 27;
        bytes[20] = 45;

        let message = Message::decode(
            &bytes,
            MessageResponseType::SinkCapabilitiesExtended,
            MessageRecipient::Sop,
            BcdWrapper::PD3P0,
        )
        .unwrap();
        let Message::Pd3p2SinkCapabilitiesExtended(skedb) = message else {
            panic!("unexpected {message:?}");
        };
        assert_eq!(skedb.vid, 0x18d1);
        assert_eq!(skedb.skedb_version, 1);
        assert_eq!(skedb.load_step, LoadStep::Ma500PerUs);
        assert!(skedb.sink_modes.pps_charging_supported);
        assert!(skedb.sink_modes.vbus_powered);
        assert!(!skedb.sink_modes.mains_powered);
        assert_eq!(skedb.spr_sink_minimum_pdp, 15);
        assert_eq!(skedb.spr_sink_operational_pdp, 27);
        assert_eq!(skedb.spr_sink_maximum_pdp, 45);
        assert_eq!(skedb.epr_sink_maximum_pdp, 0);
    }

    #[test]
    fn source_capabilities_extended() {
        let mut bytes = vec![0u8; 25];
        bytes[10] = 0b101; // 500mA/µs, 90% IoC
        bytes[11] = 3;
        bytes[14..16].copy_from_slice(&((1u16 << 15) | (4 << 11) | (5 << 5) | 15).to_le_bytes());
        bytes[20] = 2;
        bytes[22] = 0x21;
        bytes[23] = 65;
        bytes[24] = 140;

        let scedb = SourceCapabilitiesExtended::from_slice(&bytes).unwrap();
        assert_eq!(scedb.load_step, LoadStep::Ma500PerUs);
        assert!(scedb.ioc_90_percent);
        assert_eq!(scedb.holdup_time, 3);
        assert_eq!(
            scedb.peak_current1,
            PeakCurrent {
                percent_overload: 15,
                overload_period: 5,
                duty_cycle: 4,
                vbus_voltage_droop: true,
            }
        );
        assert_eq!(scedb.touch_temp, TouchTemp::Iec62368_1Ts1);
        assert_eq!(scedb.num_fixed_batteries, 1);
        assert_eq!(scedb.num_hot_swappable_battery_slots, 2);
        assert_eq!(scedb.spr_source_pdp_rating, 65);
        assert_eq!(scedb.epr_source_pdp_rating, 140);

        assert!(matches!(
            SourceCapabilitiesExtended::from_slice(&bytes[..24]),
            Err(Error::Decode { .. })
        ));
    }

    #[test]
    fn battery_messages() {
        let bsdo: u32 = (520 << 16) | (0b01 << 10) | (1 << 9);
        let status = BatteryStatusData::from_slice(&bsdo.to_le_bytes()).unwrap();
        assert!(status.battery_present);
        assert!(!status.invalid_battery_reference);
        assert_eq!(status.charging_status, BatteryChargingStatus::Discharging);
        assert_eq!(status.battery_present_capacity, 520);

        let bcdb = [0xd1, 0x18, 0x01, 0x50, 0x20, 0x03, 0xff, 0xff, 0x00];
        let caps = BatteryCapabilitiesData::from_slice(&bcdb).unwrap();
        assert_eq!(caps.vid, 0x18d1);
        assert_eq!(caps.pid, 0x5001);
        assert_eq!(caps.design_capacity, 800);
        assert_eq!(caps.last_full_charge_capacity, 0xffff);
        assert!(!caps.invalid_battery_reference);
    }

    #[test]
    fn revision_message() {
        let rmdo: u32 = (3 << 28) | (1 << 24) | (1 << 20) | (8 << 16);
        let revision = RevisionMessageData::from_slice(&rmdo.to_le_bytes()).unwrap();
        assert_eq!(revision.revision_major, 3);
        assert_eq!(revision.revision_minor, 1);
        assert_eq!(revision.version_major, 1);
        assert_eq!(revision.version_minor, 8);
        assert_eq!(revision.revision(), BcdWrapper::PD3P1);
        assert_eq!(revision.to_vec(4).unwrap(), rmdo.to_le_bytes());
    }
}
