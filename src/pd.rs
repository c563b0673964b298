// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! USB Power Delivery (PD) functionality.
//!
//! See "Universal Serial Bus Power Delivery Specification"

use bitstream_io::BitRead;
use bitstream_io::BitWrite;
use enumn::N;
use proc_macros::CApiWrapper;

use crate::ucsi::PdoType;
use crate::BcdWrapper;
use crate::BitReader;
use crate::BitWriter;
use crate::Error;
use crate::FromBytes;
use crate::Result;
use crate::ToBytes;

use crate::pd::pd3p2::BatteryCapabilitiesData as Pd3p2BatteryCapabilitiesData;
use crate::pd::pd3p2::BatteryStatusData as Pd3p2BatteryStatusData;
use crate::pd::pd3p2::BatterySupplyPdo as Pd3p2BatterySupplyPdo;
use crate::pd::pd3p2::DiscoverIdentityResponse as Pd3p2DiscoverIdentityResponse;
use crate::pd::pd3p2::EprAdjustableVoltageSupplyPdo as Pd3p2EprAdjustableVoltageSupplyPdo;
use crate::pd::pd3p2::FixedSupplyPdo as Pd3p2FixedSupplyPdo;
use crate::pd::pd3p2::RevisionMessageData as Pd3p2RevisionMessageData;
use crate::pd::pd3p2::SinkCapabilitiesExtended as Pd3p2SinkCapabilitiesExtended;
use crate::pd::pd3p2::SourceCapabilitiesExtended as Pd3p2SourceCapabilitiesExtended;
use crate::pd::pd3p2::SprAdjustableVoltageSupplyPdo as Pd3p2SprAdjustableVoltageSupplyPdo;
use crate::pd::pd3p2::SprProgrammableSupplyPdo as Pd3p2SprProgrammableSupplyPdo;
use crate::pd::pd3p2::VariableSupplyPdo as Pd3p2VariableSupplyPdo;

#[cfg(feature = "c_api")]
mod c_api {
    pub(crate) use crate::pd::pd3p2::Pd3p2BatteryCapabilitiesData;
    pub(crate) use crate::pd::pd3p2::Pd3p2BatteryStatusData;
    pub(crate) use crate::pd::pd3p2::Pd3p2BatterySupplyPdo;
    pub(crate) use crate::pd::pd3p2::Pd3p2DiscoverIdentityResponse;
    pub(crate) use crate::pd::pd3p2::Pd3p2EprAdjustableVoltageSupplyPdo;
    pub(crate) use crate::pd::pd3p2::Pd3p2FixedSupplyPdo;
    pub(crate) use crate::pd::pd3p2::Pd3p2RevisionMessageData;
    pub(crate) use crate::pd::pd3p2::Pd3p2SinkCapabilitiesExtended;
    pub(crate) use crate::pd::pd3p2::Pd3p2SourceCapabilitiesExtended;
    pub(crate) use crate::pd::pd3p2::Pd3p2SprAdjustableVoltageSupplyPdo;
    pub(crate) use crate::pd::pd3p2::Pd3p2SprProgrammableSupplyPdo;
    pub(crate) use crate::pd::pd3p2::Pd3p2VariableSupplyPdo;
}

pub mod pd3p2;

/// The largest number of PDOs in an SPR capabilities message.
pub const MAX_SPR_PDOS: usize = 7;
/// The largest number of PDOs in an EPR capabilities message.
pub const MAX_EPR_PDOS: usize = 13;

#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd", repr_c)]
pub enum CommandType {
    /// Request from initiator port.
    #[default]
    Request,
    /// Acknowledge response from responder port.
    Ack,
    /// Negative acknowledge response from responder port.
    Nak,
    /// Busy response from responder port.
    Busy,
}

/// A structured VDM command. See USB PD 3.2 - Table 6.29.
#[derive(Debug, Clone, PartialEq, Default, Copy, CApiWrapper)]
#[c_api(prefix = "Pd", repr_c)]
pub enum Command {
    /// The Discover Identity Command is provided to enable an Initiator to
    /// identify its Port Partner and for an Initiator (VCONN Source) to
    /// identify the Responder (Cable Plug or VPD). The Discover Identity
    /// Command is also used to determine whether a Cable Plug or VPD is
    /// PD-Capable by looking for a GoodCRC Message Response.
    #[default]
    DiscoverIdentity,
    DiscoverSvids,
    DiscoverModes,
    EnterMode,
    ExitMode,
    Attention,
    /// Commands 16 through 31, defined by the SVID owner.
    SvidSpecific(u8),
    Reserved(u8),
}

impl Command {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::DiscoverIdentity,
            2 => Self::DiscoverSvids,
            3 => Self::DiscoverModes,
            4 => Self::EnterMode,
            5 => Self::ExitMode,
            6 => Self::Attention,
            16..=31 => Self::SvidSpecific(raw),
            other => Self::Reserved(other),
        }
    }

    pub fn raw(&self) -> u8 {
        match self {
            Self::DiscoverIdentity => 1,
            Self::DiscoverSvids => 2,
            Self::DiscoverModes => 3,
            Self::EnterMode => 4,
            Self::ExitMode => 5,
            Self::Attention => 6,
            Self::SvidSpecific(raw) | Self::Reserved(raw) => raw & 0x1f,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, CApiWrapper)]
#[c_api(prefix = "Pd", repr_c)]
/// The VDM header. See table 6.29 in the USB PD Specification for more
/// information.
pub struct VdmHeader {
    /// The command.
    pub command: Command,
    /// The command type.
    pub command_type: CommandType,
    /// For Enter Mode, Exit Mode and Attention commands:
    ///
    /// Index into the list of VDOs to identify the desired Mode
    ///
    /// For Exit Mode only: 0b111 to exit all Active Modes
    ///
    /// Zero otherwise.
    pub object_position: u8,
    // Them minor version number of this VDM.
    pub minor: u8,
    // The major version number of this VDM.
    pub major: u8,
    // Whether this is a structured VDM.
    pub structured: bool,
    /// The Standard or Vendor ID.
    pub svid: u16,
}

impl FromBytes for VdmHeader {
    fn from_bytes(reader: &mut BitReader) -> Result<Self> {
        let command = Command::from_raw(reader.read::<u8>(5)?);
        reader.skip(1)?; // Reserved
        let command_type = reader.read::<u32>(2)?;
        let command_type = CommandType::n(command_type)
            .ok_or_else(|| Error::invalid_value("command_type", command_type))?;
        let object_position = reader.read::<u8>(3)?;
        let minor = reader.read::<u8>(2)?;
        let major = reader.read::<u8>(2)?;
        let structured = reader.read_bit()?;
        let svid = reader.read::<u16>(16)?;

        Ok(Self {
            command,
            command_type,
            object_position,
            minor,
            major,
            structured,
            svid,
        })
    }
}

impl ToBytes for VdmHeader {
    fn to_bytes(&self, bw: &mut BitWriter) -> Result<()> {
        bw.write(5, u32::from(self.command.raw()))?;
        bw.write(1, 0u32)?;
        bw.write(2, self.command_type as u32)?;
        bw.write(3, u32::from(self.object_position & 0x7))?;
        bw.write(2, u32::from(self.minor & 0x3))?;
        bw.write(2, u32::from(self.major & 0x3))?;
        bw.write_bit(self.structured)?;
        bw.write(16, self.svid)?;
        Ok(())
    }
}

/// A Power Data Object.
///
/// Decoding is total: every 32-bit word maps to a variant. Augmented PDOs
/// whose sub-type the negotiated revision does not define are kept verbatim
/// in `UnknownAugmented`.
#[derive(Debug, Clone, PartialEq, CApiWrapper)]
#[c_api(prefix = "Pd", repr_c)]
pub enum Pdo {
    Pd3p2FixedSupplyPdo(Pd3p2FixedSupplyPdo),
    Pd3p2BatterySupplyPdo(Pd3p2BatterySupplyPdo),
    Pd3p2VariableSupplyPdo(Pd3p2VariableSupplyPdo),
    Pd3p2SprProgrammableSupplyPdo(Pd3p2SprProgrammableSupplyPdo),
    Pd3p2EprAdjustableVoltageSupplyPdo(Pd3p2EprAdjustableVoltageSupplyPdo),
    Pd3p2SprAdjustableVoltageSupplyPdo(Pd3p2SprAdjustableVoltageSupplyPdo),
    UnknownAugmented(u32),
}

impl Pdo {
    /// Decodes `word`. The role is not part of the object, so the caller must
    /// say whether it came from a source or a sink capabilities list. A
    /// `revision` of zero decodes with the newest known layouts.
    ///
    /// The source capabilities type asked for in GET_PDOS is not an input:
    /// current, advertised and maximum source capabilities share the same
    /// PDO layouts up to PD 3.2.
    pub fn from_u32(word: u32, pdo_type: PdoType, revision: BcdWrapper) -> Self {
        // See USB PD 3.2. - Table 6.7 “Power Data Object”
        match word >> 30 {
            0b00 => Pdo::Pd3p2FixedSupplyPdo(Pd3p2FixedSupplyPdo::from_u32(word, pdo_type)),
            0b01 => Pdo::Pd3p2BatterySupplyPdo(Pd3p2BatterySupplyPdo::from_u32(word, pdo_type)),
            0b10 => Pdo::Pd3p2VariableSupplyPdo(Pd3p2VariableSupplyPdo::from_u32(word, pdo_type)),
            _ => Self::augmented_from_u32(word, pdo_type, revision),
        }
    }

    fn augmented_from_u32(word: u32, pdo_type: PdoType, revision: BcdWrapper) -> Self {
        let defined_since = |introduced: BcdWrapper| revision.is_unknown() || revision >= introduced;

        // See USB PD 3.2 - Table 6.8 “Augmented Power Data Object”
        match (word >> 28) & 0b11 {
            0b00 if defined_since(BcdWrapper::PD3P0) => Pdo::Pd3p2SprProgrammableSupplyPdo(
                Pd3p2SprProgrammableSupplyPdo::from_u32(word, pdo_type),
            ),
            0b01 if defined_since(BcdWrapper::PD3P1) => Pdo::Pd3p2EprAdjustableVoltageSupplyPdo(
                Pd3p2EprAdjustableVoltageSupplyPdo::from_u32(word, pdo_type),
            ),
            0b10 if defined_since(BcdWrapper::PD3P2) => Pdo::Pd3p2SprAdjustableVoltageSupplyPdo(
                Pd3p2SprAdjustableVoltageSupplyPdo::from_u32(word, pdo_type),
            ),
            _ => Pdo::UnknownAugmented(word),
        }
    }

    /// Encodes the PDO back into its wire form.
    pub fn to_u32(&self) -> u32 {
        match self {
            Pdo::Pd3p2FixedSupplyPdo(pdo) => pdo.to_u32(),
            Pdo::Pd3p2BatterySupplyPdo(pdo) => pdo.to_u32(),
            Pdo::Pd3p2VariableSupplyPdo(pdo) => pdo.to_u32(),
            Pdo::Pd3p2SprProgrammableSupplyPdo(pdo) => pdo.to_u32(),
            Pdo::Pd3p2EprAdjustableVoltageSupplyPdo(pdo) => pdo.to_u32(),
            Pdo::Pd3p2SprAdjustableVoltageSupplyPdo(pdo) => pdo.to_u32(),
            Pdo::UnknownAugmented(word) => *word,
        }
    }

    /// Decodes a list of little-endian PDO words. Trailing bytes that do not
    /// form a whole word are ignored.
    pub fn from_le_bytes(bytes: &[u8], pdo_type: PdoType, revision: BcdWrapper) -> Vec<Self> {
        bytes
            .chunks_exact(4)
            .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .map(|word| Self::from_u32(word, pdo_type, revision))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, CApiWrapper)]
#[c_api(prefix = "Pd", repr_c)]
pub enum Message {
    /// Sink Capabilities Extended (Extended Message)
    Pd3p2SinkCapabilitiesExtended(Pd3p2SinkCapabilitiesExtended),
    /// Source Capabilities Extended (Extended Message)
    Pd3p2SourceCapabilitiesExtended(Pd3p2SourceCapabilitiesExtended),
    /// Battery Capabilities (Extended Message)
    Pd3p2BatteryCapabilities(Pd3p2BatteryCapabilitiesData),
    /// Battery Status (Data Message)
    Pd3p2BatteryStatus(Pd3p2BatteryStatusData),
    /// Discover Identity Response – ACK, NAK or BUSY (Structured VDM)
    Pd3p2DiscoverIdentityResponse(Pd3p2DiscoverIdentityResponse),
    /// Revision (Data Message)
    Pd3p2Revision(Pd3p2RevisionMessageData),
}

impl Message {
    /// Decodes the payload returned by GET_PD_MESSAGE.
    ///
    /// `recipient` and `revision` select the Discover Identity layout.
    pub fn decode(
        bytes: &[u8],
        response_type: MessageResponseType,
        recipient: MessageRecipient,
        revision: BcdWrapper,
    ) -> Result<Self> {
        let message = match response_type {
            MessageResponseType::SinkCapabilitiesExtended => {
                // PD 3.0 sinks omit the three EPR bytes.
                Message::Pd3p2SinkCapabilitiesExtended(
                    Pd3p2SinkCapabilitiesExtended::from_padded_slice(
                        bytes,
                        response_type.message_len(),
                    )?,
                )
            }
            MessageResponseType::SourceCapabilitiesExtended => {
                Message::Pd3p2SourceCapabilitiesExtended(
                    Pd3p2SourceCapabilitiesExtended::from_slice(bytes)?,
                )
            }
            MessageResponseType::BatteryCapabilities => Message::Pd3p2BatteryCapabilities(
                Pd3p2BatteryCapabilitiesData::from_slice(bytes)?,
            ),
            MessageResponseType::BatteryStatus => {
                Message::Pd3p2BatteryStatus(Pd3p2BatteryStatusData::from_slice(bytes)?)
            }
            MessageResponseType::DiscoverIdentity => Message::Pd3p2DiscoverIdentityResponse(
                Pd3p2DiscoverIdentityResponse::decode(bytes, recipient, revision)?,
            ),
            MessageResponseType::Revision => {
                Message::Pd3p2Revision(Pd3p2RevisionMessageData::from_slice(bytes)?)
            }
            MessageResponseType::Reserved => {
                return Err(Error::invalid_parameter(
                    "response_type",
                    response_type as u64,
                ))
            }
        };

        Ok(message)
    }
}

/// This enum represents the recipient of the PD message.
#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd", repr_c)]
pub enum MessageRecipient {
    #[default]
    /// The OPM wants to retrieve the USB PD response message from the
    /// identified connector.
    Connector,
    /// The OPM wants to retrieve the USB PD response message from the port
    /// partner of the identified connector.
    Sop,
    /// The OPM wants to retrieve the USB PD response message from the cable
    /// plug of the identified connector.
    SopPrime,
    /// The OPM wants to retrieve the USB PD response message from the far end
    /// cable plug of the identified connector.
    SopDoublePrime,
}

/// This enum represents the type of the PD response message.
#[derive(Debug, Clone, PartialEq, Default, N, Copy, CApiWrapper)]
#[c_api(prefix = "Pd", repr_c)]
pub enum MessageResponseType {
    #[default]
    /// Sink Capabilities Extended (Extended Message)
    SinkCapabilitiesExtended,
    /// Source Capabilities Extended (Extended Message)
    SourceCapabilitiesExtended,
    /// Battery Capabilities (Extended Message)
    BatteryCapabilities,
    /// Battery Status (Data Message)
    BatteryStatus,
    /// Discover Identity Response – ACK, NAK or BUSY (Structured VDM)
    DiscoverIdentity,
    /// Revision (Data Message)
    Revision,
    /// Reserved values.
    Reserved,
}

impl MessageResponseType {
    /// The size of the full message payload, in bytes.
    pub fn message_len(&self) -> usize {
        match self {
            MessageResponseType::SinkCapabilitiesExtended => 24,
            MessageResponseType::SourceCapabilitiesExtended => 25,
            MessageResponseType::BatteryCapabilities => 9,
            MessageResponseType::BatteryStatus => 4,
            // The VDM header followed by up to six VDOs.
            MessageResponseType::DiscoverIdentity => 28,
            MessageResponseType::Revision => 4,
            MessageResponseType::Reserved => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_source_pdo() {
        let pdo = Pdo::from_u32(0x0801_912c, PdoType::Source, BcdWrapper::PD3P1);
        let Pdo::Pd3p2FixedSupplyPdo(fixed) = &pdo else {
            panic!("unexpected PDO {pdo:?}");
        };
        assert_eq!(fixed.voltage, crate::Millivolt(5000));
        assert_eq!(fixed.operational_current, crate::Milliamp(3000));
        assert_eq!(fixed.raw_voltage(), 100);
        assert_eq!(fixed.raw_operational_current(), 300);
        assert!(fixed.unconstrained_power);
        assert!(!fixed.dual_role_power);
        assert_eq!(fixed.peak_current, 0);
        assert_eq!(pdo.to_u32(), 0x0801_912c);
    }

    #[test]
    fn pps_apdo() {
        let pdo = Pdo::from_u32(0xc0dc_213c, PdoType::Source, BcdWrapper::PD3P0);
        let Pdo::Pd3p2SprProgrammableSupplyPdo(pps) = &pdo else {
            panic!("unexpected PDO {pdo:?}");
        };
        assert_eq!(pps.min_voltage, crate::Millivolt(3300));
        assert_eq!(pps.max_voltage, crate::Millivolt(11000));
        assert_eq!(pps.max_current, crate::Milliamp(3000));
        assert_eq!(pps.raw_min_voltage(), 33);
        assert_eq!(pps.raw_max_voltage(), 110);
        assert_eq!(pps.raw_max_current(), 60);
        assert_eq!(pdo.to_u32(), 0xc0dc_213c);

        // Same range, with the reserved bit 7 set and 4.8A.
        let pdo = Pdo::from_u32(0xc0dc_21e0, PdoType::Source, BcdWrapper::PD3P0);
        let Pdo::Pd3p2SprProgrammableSupplyPdo(pps) = &pdo else {
            panic!("unexpected PDO {pdo:?}");
        };
        assert_eq!(pps.min_voltage, crate::Millivolt(3300));
        assert_eq!(pps.max_voltage, crate::Millivolt(11000));
        assert_eq!(pps.max_current, crate::Milliamp(4800));
        assert_eq!(pps.raw_max_current(), 96);
        assert_eq!(pdo.to_u32(), 0xc0dc_21e0);
    }

    #[test]
    fn epr_avs_is_gated_by_revision() {
        let word = 0xd230_968c;
        let pdo = Pdo::from_u32(word, PdoType::Source, BcdWrapper::PD3P1);
        let Pdo::Pd3p2EprAdjustableVoltageSupplyPdo(avs) = &pdo else {
            panic!("unexpected PDO {pdo:?}");
        };
        assert_eq!(avs.max_voltage, crate::Millivolt(28000));
        assert_eq!(avs.min_voltage, crate::Millivolt(15000));
        assert_eq!(avs.pdp, crate::Milliwatt(140_000));
        assert_eq!(avs.raw_max_voltage(), 280);
        assert_eq!(avs.raw_min_voltage(), 150);
        assert_eq!(avs.raw_pdp(), 140);

        assert_eq!(
            Pdo::from_u32(word, PdoType::Source, BcdWrapper::PD3P0),
            Pdo::UnknownAugmented(word)
        );
        // An unknown revision decodes with the newest layouts.
        assert!(matches!(
            Pdo::from_u32(word, PdoType::Source, BcdWrapper(0)),
            Pdo::Pd3p2EprAdjustableVoltageSupplyPdo(_)
        ));
    }

    #[test]
    fn spr_avs_and_reserved_subtype() {
        // 3A at 15V, 2.5A at 20V.
        let word: u32 = (0b11 << 30) | (0b10 << 28) | (300 << 10) | 250;
        let pdo = Pdo::from_u32(word, PdoType::Source, BcdWrapper::PD3P2);
        let Pdo::Pd3p2SprAdjustableVoltageSupplyPdo(avs) = &pdo else {
            panic!("unexpected PDO {pdo:?}");
        };
        assert_eq!(avs.max_current_15v, crate::Milliamp(3000));
        assert_eq!(avs.max_current_20v, crate::Milliamp(2500));
        assert_eq!(avs.raw_max_current_15v(), 300);
        assert_eq!(avs.raw_max_current_20v(), 250);
        assert_eq!(
            Pdo::from_u32(word, PdoType::Source, BcdWrapper::PD3P1),
            Pdo::UnknownAugmented(word)
        );

        let reserved = 0xf000_0000;
        assert_eq!(
            Pdo::from_u32(reserved, PdoType::Sink, BcdWrapper(0)),
            Pdo::UnknownAugmented(reserved)
        );
        assert_eq!(
            Pdo::from_u32(0xc0dc_213c, PdoType::Source, BcdWrapper::PD2P0),
            Pdo::UnknownAugmented(0xc0dc_213c)
        );
    }

    #[test]
    fn non_augmented_pdos_round_trip() {
        // A small xorshift keeps the sample reproducible.
        let mut state: u32 = 0x2545_f491;
        for _ in 0..2000 {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            for pdo_type in [PdoType::Source, PdoType::Sink] {
                let word = state & !(0b11 << 30) | ((state % 3) << 30);
                let pdo = Pdo::from_u32(word, pdo_type, BcdWrapper::PD3P2);
                assert_eq!(pdo.to_u32(), word, "{pdo:?}");
            }
        }
    }

    #[test]
    fn pdo_list_from_bytes() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x0801_912cu32.to_le_bytes());
        bytes.extend_from_slice(&0x0002_d12cu32.to_le_bytes());
        bytes.push(0xff);
        let pdos = Pdo::from_le_bytes(&bytes, PdoType::Sink, BcdWrapper::PD3P1);
        assert_eq!(pdos.len(), 2);
        assert_eq!(pdos[1].to_u32(), 0x0002_d12c);
    }

    #[test]
    fn vdm_header_layout() {
        let header = VdmHeader::from_slice(&0xff00_a041u32.to_le_bytes()).unwrap();
        assert_eq!(header.svid, 0xff00);
        assert!(header.structured);
        assert_eq!(header.major, 1);
        assert_eq!(header.minor, 0);
        assert_eq!(header.command_type, CommandType::Ack);
        assert_eq!(header.command, Command::DiscoverIdentity);
        assert_eq!(header.to_vec(4).unwrap(), 0xff00_a041u32.to_le_bytes());

        let header = VdmHeader::from_slice(&0xff01_8011u32.to_le_bytes()).unwrap();
        assert_eq!(header.command, Command::SvidSpecific(0x11));
    }

    #[test]
    fn reserved_response_type_is_rejected() {
        assert!(matches!(
            Message::decode(
                &[0; 4],
                MessageResponseType::Reserved,
                MessageRecipient::Sop,
                BcdWrapper::PD3P1
            ),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
