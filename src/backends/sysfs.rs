// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! The sysfs backend.
//!
//! The kernel's Type-C class already talks to the PPM. This backend reads what
//! it exported and answers every UCSI command the way a PPM would, so that the
//! facade can treat it exactly like the register backend.

use std::path::Path;
use std::path::PathBuf;

use log::debug;
use log::trace;
use log::warn;
use walkdir::WalkDir;

use crate::pd::pd3p2::BatterySupplyPdo;
use crate::pd::pd3p2::FastRoleSwap;
use crate::pd::pd3p2::FixedSupplyPdo;
use crate::pd::pd3p2::RevisionMessageData;
use crate::pd::pd3p2::SprProgrammableSupplyPdo;
use crate::pd::pd3p2::VariableSupplyPdo;
use crate::pd::MessageRecipient;
use crate::pd::MessageResponseType;
use crate::ucsi::AlternateMode;
use crate::ucsi::BmAttributes;
use crate::ucsi::BmOptionalFeatures;
use crate::ucsi::CableLatency;
use crate::ucsi::CableProperty;
use crate::ucsi::CablePropertySpeedExponent;
use crate::ucsi::Capability;
use crate::ucsi::Command;
use crate::ucsi::ConnectorCapability;
use crate::ucsi::ConnectorCapabilityOperationMode;
use crate::ucsi::ConnectorOrientation;
use crate::ucsi::ConnectorPartnerFlags;
use crate::ucsi::ConnectorPartnerType;
use crate::ucsi::ConnectorStatus;
use crate::ucsi::GetAlternateModesRecipient;
use crate::ucsi::PdoType;
use crate::ucsi::PowerDirection;
use crate::ucsi::PowerOperationMode;
use crate::ucsi::UCSI_CONNECTOR_STATUS_LENGTH;
use crate::BcdWrapper;
use crate::Error;
use crate::Milliamp;
use crate::Millivolt;
use crate::Milliwatt;
use crate::OsBackend;
use crate::Result;
use crate::ToBytes;

use sysfs_reader::SysfsReader;

const SYSFS_TYPEC_PATH: &str = "/sys/class/typec";
const SYSFS_PSY_PATH: &str = "/sys/class/power_supply";

/// The VDM header of an ACKed Discover Identity, which sysfs does not keep.
const DISCOVER_IDENTITY_ACK: u32 = 0xff00_a041;

/// Where the backend finds the kernel's view of the ports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsConfig {
    pub typec_root: PathBuf,
    pub power_supply_root: PathBuf,
}

impl Default for SysfsConfig {
    fn default() -> Self {
        Self {
            typec_root: PathBuf::from(SYSFS_TYPEC_PATH),
            power_supply_root: PathBuf::from(SYSFS_PSY_PATH),
        }
    }
}

mod sysfs_reader {
    use std::io;
    use std::path::Path;
    use std::path::PathBuf;

    use regex::Regex;
    use walkdir::WalkDir;

    use super::SysfsConfig;
    use crate::BcdWrapper;
    use crate::Error;
    use crate::Result;

    /// Builds the paths of a port's objects and parses their attributes.
    pub struct SysfsReader {
        pub config: SysfsConfig,
    }

    fn attribute_name(path: &Path) -> String {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Compiles a pattern that is known to be valid.
    pub fn pattern(re: &str) -> Result<Regex> {
        Regex::new(re).map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err).into())
    }

    /// Turns a missing attribute into `None`.
    pub fn optional<T>(result: Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_supported() => Ok(None),
            Err(err) => Err(err),
        }
    }

    impl SysfsReader {
        pub fn new(config: SysfsConfig) -> Self {
            Self { config }
        }

        pub fn port(&self, connector_nr: usize) -> PathBuf {
            self.config.typec_root.join(format!("port{connector_nr}"))
        }

        pub fn partner(&self, connector_nr: usize) -> PathBuf {
            self.config
                .typec_root
                .join(format!("port{connector_nr}-partner"))
        }

        pub fn cable(&self, connector_nr: usize) -> PathBuf {
            self.config
                .typec_root
                .join(format!("port{connector_nr}-cable"))
        }

        pub fn plug(&self, connector_nr: usize, plug: usize) -> PathBuf {
            self.config
                .typec_root
                .join(format!("port{connector_nr}-plug{plug}"))
        }

        /// The power supply the UCSI driver registers for a connector.
        pub fn power_supply(&self, connector_nr: usize) -> PathBuf {
            self.config
                .power_supply_root
                .join(format!("ucsi-source-psy-USBC000:00{}", connector_nr + 1))
        }

        /// The entries of `dir` whose names match `re`, with the first
        /// capture group parsed as their position, sorted by position.
        pub fn list(&self, dir: &Path, re: &Regex) -> Result<Vec<(usize, String, PathBuf)>> {
            let mut entries = vec![];
            for entry in WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .follow_links(true)
            {
                let entry = entry?;
                let name = entry.file_name().to_string_lossy().into_owned();
                let Some(captures) = re.captures(&name) else {
                    continue;
                };
                let position = captures
                    .get(1)
                    .and_then(|position| position.as_str().parse::<usize>().ok())
                    .unwrap_or_default();
                entries.push((position, name, entry.path().to_path_buf()));
            }
            entries.sort_by_key(|(position, _, _)| *position);
            Ok(entries)
        }

        /// Reads an attribute. A missing attribute is reported as
        /// `NotSupported`.
        pub fn read_string(&self, path: &Path) -> Result<String> {
            match std::fs::read_to_string(path) {
                Ok(content) => Ok(content.trim().to_string()),
                Err(err) if err.kind() == io::ErrorKind::NotFound => Err(Error::not_supported()),
                Err(err) => Err(err.into()),
            }
        }

        /// Reads a decimal attribute. Unit suffixes such as "mV" are ignored.
        pub fn read_u32(&self, path: &Path) -> Result<u32> {
            let content = self.read_string(path)?;
            let digits: String = content.chars().filter(|c| c.is_ascii_digit()).collect();
            digits
                .parse::<u32>()
                .map_err(|_| Error::decode(&attribute_name(path), content.as_bytes()))
        }

        pub fn read_hex_u32(&self, path: &Path) -> Result<u32> {
            let content = self.read_string(path)?;
            let hex = content.trim_start_matches("0x");
            u32::from_str_radix(hex, 16)
                .map_err(|_| Error::decode(&attribute_name(path), content.as_bytes()))
        }

        pub fn read_bool(&self, path: &Path) -> Result<bool> {
            let content = self.read_string(path)?;
            match content.as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" => Ok(false),
                _ => Err(Error::decode(&attribute_name(path), content.as_bytes())),
            }
        }

        /// Reads a flag that older kernels may not export.
        pub fn read_flag(&self, path: &Path) -> Result<bool> {
            Ok(optional(self.read_bool(path))?.unwrap_or_default())
        }

        /// Reads a dotted revision such as "3.1".
        pub fn read_bcd(&self, path: &Path) -> Result<BcdWrapper> {
            let content = self.read_string(path)?;
            BcdWrapper::from_dotted(&content)
                .ok_or_else(|| Error::decode(&attribute_name(path), content.as_bytes()))
        }

        /// Reads the selected value of a "[a] b" style attribute along with all
        /// the values it offers.
        pub fn read_choice(&self, path: &Path) -> Result<(String, Vec<String>)> {
            let content = self.read_string(path)?;
            let mut selected = String::new();
            let mut choices = vec![];
            for word in content.split_whitespace() {
                let choice = word.trim_start_matches('[').trim_end_matches(']');
                if word.starts_with('[') || content.split_whitespace().count() == 1 {
                    selected = choice.to_string();
                }
                choices.push(choice.to_string());
            }
            Ok((selected, choices))
        }
    }
}

/// The speed of a cable from the USB Highest Speed field of its VDO.
fn cable_speed(usb_highest_speed: u32) -> (CablePropertySpeedExponent, u16) {
    match usb_highest_speed {
        0 => (CablePropertySpeedExponent::Mbps, 480),
        1 => (CablePropertySpeedExponent::Gbps, 5),
        2 => (CablePropertySpeedExponent::Gbps, 10),
        3 => (CablePropertySpeedExponent::Gbps, 20),
        4 => (CablePropertySpeedExponent::Gbps, 40),
        _ => (CablePropertySpeedExponent::Bps, 0),
    }
}

/// Maps a dotted PD revision onto the 2-bit Specification Revision field.
fn spec_revision(revision: BcdWrapper) -> u8 {
    match revision.major() {
        0 | 1 => 0,
        2 => 1,
        _ => 2,
    }
}

pub struct SysfsBackend {
    /// Reads the sysfs files.
    reader: SysfsReader,
    opened: bool,
}

impl SysfsBackend {
    /// Instantiates the sysfs backend. Nothing is read until `open`.
    pub fn new(config: SysfsConfig) -> Self {
        Self {
            reader: SysfsReader::new(config),
            opened: false,
        }
    }

    fn ports(&self) -> Result<Vec<usize>> {
        let re = sysfs_reader::pattern(r"^port(\d+)$")?;
        Ok(self
            .reader
            .list(&self.reader.config.typec_root, &re)?
            .into_iter()
            .map(|(position, _, _)| position)
            .collect())
    }

    /// The alternate mode directories of a port, partner or plug, in order.
    fn alternate_mode_dirs(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let name = dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let re = sysfs_reader::pattern(&format!(r"^{}\.(\d+)$", regex::escape(&name)))?;
        Ok(self
            .reader
            .list(dir, &re)?
            .into_iter()
            .map(|(_, _, path)| path)
            .collect())
    }

    fn capability(&self) -> Result<Capability> {
        let mut num_connectors = 0;
        let mut num_alt_modes = 0;
        let mut pd_version = BcdWrapper::default();
        let mut usb_type_c_version = BcdWrapper::default();

        for connector_nr in self.ports()? {
            let port = self.reader.port(connector_nr);
            num_connectors += 1;
            num_alt_modes += self.alternate_mode_dirs(&port)?.len();

            if pd_version.is_unknown() {
                let revision = port.join("usb_power_delivery_revision");
                pd_version = sysfs_reader::optional(self.reader.read_bcd(&revision))?
                    .unwrap_or_default();
            }
            if usb_type_c_version.is_unknown() {
                let revision = port.join("usb_typec_revision");
                usb_type_c_version = sysfs_reader::optional(self.reader.read_bcd(&revision))?
                    .unwrap_or_default();
            }
        }

        Ok(Capability {
            bm_attributes: BmAttributes {
                usb_power_delivery: !pd_version.is_unknown(),
                usb_type_c_current: true,
                ..Default::default()
            },
            num_connectors,
            bm_optional_features: BmOptionalFeatures {
                alternate_mode_details_supported: num_alt_modes > 0,
                pdo_details_supported: true,
                cable_details_supported: true,
                get_pd_message_supported: true,
                ..Default::default()
            },
            num_alt_modes,
            pd_version,
            usb_type_c_version,
            ..Default::default()
        })
    }

    fn connector_capability(&self, connector_nr: usize) -> Result<ConnectorCapability> {
        let port = self.reader.port(connector_nr);
        let (_, power_roles) = self.reader.read_choice(&port.join("power_role"))?;
        let data_roles =
            sysfs_reader::optional(self.reader.read_choice(&port.join("data_role")))?
                .map(|(_, roles)| roles)
                .unwrap_or_default();

        let source = power_roles.iter().any(|role| role == "source");
        let sink = power_roles.iter().any(|role| role == "sink");
        let dual_role_data =
            data_roles.iter().any(|role| role == "host") && data_roles.iter().any(|r| r == "device");

        let mut capability = ConnectorCapability {
            operation_mode: match (source, sink) {
                (true, true) => ConnectorCapabilityOperationMode::DRP,
                (true, false) => ConnectorCapabilityOperationMode::RP_ONLY,
                _ => ConnectorCapabilityOperationMode::RD_ONLY,
            },
            provider: source,
            consumer: sink || !source,
            swap_to_dfp: dual_role_data,
            swap_to_ufp: dual_role_data,
            swap_to_src: source && sink,
            swap_to_snk: source && sink,
            ..Default::default()
        };

        let partner_revision = self
            .reader
            .partner(connector_nr)
            .join("usb_power_delivery_revision");
        if let Some(revision) = sysfs_reader::optional(self.reader.read_bcd(&partner_revision))? {
            capability.partner_pd_revision = spec_revision(revision);
        }

        Ok(capability)
    }

    fn read_pdo(&self, dir: &Path, kind: &str, pdo_type: PdoType) -> Result<Option<u32>> {
        let source = pdo_type == PdoType::Source;
        let reader = &self.reader;
        let current = |dir: &Path| -> Result<u32> {
            match sysfs_reader::optional(reader.read_u32(&dir.join("maximum_current")))? {
                Some(current) => Ok(current),
                None => reader.read_u32(&dir.join("operational_current")),
            }
        };

        let word = match kind {
            "fixed_supply" => {
                let mut pdo = FixedSupplyPdo {
                    pdo_type,
                    dual_role_power: reader.read_flag(&dir.join("dual_role_power"))?,
                    unconstrained_power: reader.read_flag(&dir.join("unconstrained_power"))?,
                    usb_communications_capable: reader
                        .read_flag(&dir.join("usb_communication_capable"))?,
                    dual_role_data: reader.read_flag(&dir.join("dual_role_data"))?,
                    voltage: Millivolt(reader.read_u32(&dir.join("voltage"))?),
                    operational_current: Milliamp(current(dir)?),
                    ..Default::default()
                };
                if source {
                    pdo.usb_suspend_supported = reader.read_flag(&dir.join("usb_suspend_supported"))?;
                    pdo.unchunked_extended_messages_supported =
                        reader.read_flag(&dir.join("unchunked_extended_messages_supported"))?;
                    pdo.peak_current = sysfs_reader::optional(
                        reader.read_u32(&dir.join("peak_current")),
                    )?
                    .unwrap_or_default() as u8;
                } else {
                    pdo.higher_capability = reader.read_flag(&dir.join("higher_capability"))?;
                    let frs = sysfs_reader::optional(
                        reader.read_u32(&dir.join("fast_role_swap_current")),
                    )?
                    .unwrap_or_default();
                    pdo.fast_role_swap = FastRoleSwap::n(frs).unwrap_or_default();
                }
                pdo.to_u32()
            }
            "variable_supply" => VariableSupplyPdo {
                pdo_type,
                max_voltage: Millivolt(reader.read_u32(&dir.join("maximum_voltage"))?),
                min_voltage: Millivolt(reader.read_u32(&dir.join("minimum_voltage"))?),
                max_current: Milliamp(current(dir)?),
            }
            .to_u32(),
            "battery" => {
                let power = match sysfs_reader::optional(
                    reader.read_u32(&dir.join("maximum_power")),
                )? {
                    Some(power) => power,
                    None => reader.read_u32(&dir.join("operational_power"))?,
                };
                BatterySupplyPdo {
                    pdo_type,
                    max_voltage: Millivolt(reader.read_u32(&dir.join("maximum_voltage"))?),
                    min_voltage: Millivolt(reader.read_u32(&dir.join("minimum_voltage"))?),
                    operational_power: Milliwatt(power),
                }
                .to_u32()
            }
            "programmable_supply" => {
                // The kernel names it pps_power_limited, older trees power_limited.
                let power_limited = match sysfs_reader::optional(
                    reader.read_bool(&dir.join("pps_power_limited")),
                )? {
                    Some(limited) => limited,
                    None => reader.read_flag(&dir.join("power_limited"))?,
                };
                SprProgrammableSupplyPdo {
                    pdo_type,
                    power_limited: source && power_limited,
                    max_voltage: Millivolt(reader.read_u32(&dir.join("maximum_voltage"))?),
                    min_voltage: Millivolt(reader.read_u32(&dir.join("minimum_voltage"))?),
                    max_current: Milliamp(current(dir)?),
                    reserved: 0,
                }
                .to_u32()
            }
            other => {
                warn!("Skipping PDO {} of unknown kind {other}", dir.display());
                return Ok(None);
            }
        };

        Ok(Some(word))
    }

    fn pdos(&self, connector_nr: usize, partner_pdo: bool, pdo_type: PdoType) -> Result<Vec<u32>> {
        let base = if partner_pdo {
            self.reader.partner(connector_nr)
        } else {
            self.reader.port(connector_nr)
        };
        let dir = base.join("usb_power_delivery").join(match pdo_type {
            PdoType::Source => "source-capabilities",
            PdoType::Sink => "sink-capabilities",
        });
        if !dir.is_dir() {
            return Err(Error::not_supported());
        }

        let re = sysfs_reader::pattern(r"^(\d+):(\w+)$")?;
        let mut words = vec![];
        for (_, name, path) in self.reader.list(&dir, &re)? {
            let kind = name.split_once(':').map(|(_, kind)| kind).unwrap_or_default();
            if let Some(word) = self.read_pdo(&path, kind, pdo_type)? {
                words.push(word);
            }
        }

        Ok(words)
    }

    fn cable_property(&self, connector_nr: usize) -> Result<CableProperty> {
        let cable = self.reader.cable(connector_nr);
        if !cable.is_dir() {
            return Err(Error::not_supported());
        }

        let mut property = CableProperty::default();

        let cable_type = self.reader.read_string(&cable.join("type"))?;
        property.cable_type = if cable_type.contains("active") {
            crate::ucsi::CablePropertyType::Active
        } else if cable_type.contains("passive") {
            crate::ucsi::CablePropertyType::Passive
        } else {
            return Err(Error::decode("type", cable_type.as_bytes()));
        };

        let plug_type = sysfs_reader::optional(self.reader.read_string(&cable.join("plug_type")))?
            .unwrap_or_default();
        property.plug_end_type = if plug_type.contains("type-c") {
            crate::ucsi::CablePropertyPlugEndType::UsbTypeC
        } else if plug_type.contains("type-a") {
            crate::ucsi::CablePropertyPlugEndType::UsbTypeA
        } else if plug_type.contains("type-b") {
            crate::ucsi::CablePropertyPlugEndType::UsbTypeB
        } else {
            crate::ucsi::CablePropertyPlugEndType::OtherNotUsb
        };

        let modes = self
            .reader
            .plug(connector_nr, 0)
            .join("number_of_alternate_modes");
        property.mode_support = sysfs_reader::optional(self.reader.read_u32(&modes))?
            .is_some_and(|modes| modes > 0);

        let revision = cable.join("usb_power_delivery_revision");
        if let Some(revision) = sysfs_reader::optional(self.reader.read_bcd(&revision))? {
            property.cable_pd_revision = spec_revision(revision);
        }

        let vdo = cable.join("identity").join("product_type_vdo1");
        if let Some(vdo) = sysfs_reader::optional(self.reader.read_hex_u32(&vdo))? {
            // Passive and active VDO1 share these fields.
            let (exponent, mantissa) = cable_speed(vdo & 0x7);
            property.speed_exponent = exponent;
            property.speed_mantissa = mantissa;
            property.raw_current_capability = match (vdo >> 5) & 0x3 {
                1 => 60,
                2 => 100,
                _ => 0,
            };
            property.current_capability = Milliamp(u32::from(property.raw_current_capability) * 50);
            property.latency = CableLatency::from_raw(((vdo >> 13) & 0xf) as u8);
            property.vbus_in_cable = match property.cable_type {
                crate::ucsi::CablePropertyType::Passive => true,
                crate::ucsi::CablePropertyType::Active => vdo & (1 << 4) != 0,
            };
        }

        Ok(property)
    }

    fn alternate_modes(
        &self,
        recipient: GetAlternateModesRecipient,
        connector_nr: usize,
    ) -> Result<Vec<AlternateMode>> {
        let dir = match recipient {
            GetAlternateModesRecipient::Connector => self.reader.port(connector_nr),
            GetAlternateModesRecipient::Sop => self.reader.partner(connector_nr),
            GetAlternateModesRecipient::SopPrime => self.reader.plug(connector_nr, 0),
            GetAlternateModesRecipient::SopDoublePrime => self.reader.plug(connector_nr, 1),
        };
        if !dir.is_dir() {
            return Err(Error::not_supported());
        }

        let mut modes = vec![];
        for path in self.alternate_mode_dirs(&dir)? {
            let svid = self.reader.read_hex_u32(&path.join("svid"))?;
            let vdo = self.reader.read_hex_u32(&path.join("vdo"))?;
            modes.push(AlternateMode {
                svid: svid as u16,
                mode_index: 0,
                vdo,
            });
        }

        Ok(modes)
    }

    fn connector_status(&self, connector_nr: usize) -> Result<ConnectorStatus> {
        let port = self.reader.port(connector_nr);
        if !port.is_dir() {
            return Err(Error::invalid_parameter(
                "connector_nr",
                connector_nr as u64,
            ));
        }

        let partner = self.reader.partner(connector_nr);
        let mut status = ConnectorStatus {
            connect_status: partner.is_dir(),
            ..Default::default()
        };

        if let Some((power_role, _)) =
            sysfs_reader::optional(self.reader.read_choice(&port.join("power_role")))?
        {
            status.power_direction = if power_role == "source" {
                PowerDirection::Provider
            } else {
                PowerDirection::Consumer
            };
        }

        if !status.connect_status {
            return Ok(status);
        }

        status.connector_partner_flags = ConnectorPartnerFlags::USB;
        if let Some((data_role, _)) =
            sysfs_reader::optional(self.reader.read_choice(&port.join("data_role")))?
        {
            status.connector_partner_type = if data_role == "host" {
                ConnectorPartnerType::UfpAttached
            } else {
                ConnectorPartnerType::DfpAttached
            };
        }

        let mode = sysfs_reader::optional(
            self.reader.read_string(&port.join("power_operation_mode")),
        )?
        .unwrap_or_default();
        status.power_operation_mode = match mode.as_str() {
            "usb_power_delivery" => PowerOperationMode::PowerDelivery,
            "3.0A" => PowerOperationMode::UsbTypeCCurrent3A,
            "1.5A" => PowerOperationMode::UsbTypeCCurrent1_5A,
            _ => PowerOperationMode::UsbDefaultOperation,
        };

        if let Some(orientation) =
            sysfs_reader::optional(self.reader.read_string(&port.join("orientation")))?
        {
            if orientation == "reverse" {
                status.orientation = ConnectorOrientation::Reverse;
            }
        }

        let revision = partner.join("usb_power_delivery_revision");
        if let Some(revision) = sysfs_reader::optional(self.reader.read_bcd(&revision))? {
            status.pd_version_operation_mode = revision;
        }

        let psy = self.reader.power_supply(connector_nr);
        let online = sysfs_reader::optional(self.reader.read_u32(&psy.join("online")))?;
        if online.unwrap_or_default() != 0 {
            // Power supply readings are in µA and µV.
            let current = self.reader.read_u32(&psy.join("current_now"))? / 1000;
            let voltage = self.reader.read_u32(&psy.join("voltage_now"))? / 1000;
            let operating = (current * voltage) / (250 * 1000);

            let max_current = self.reader.read_u32(&psy.join("current_max"))? / 1000;
            let max_voltage = self.reader.read_u32(&psy.join("voltage_max"))? / 1000;
            let maximum = (max_current * max_voltage) / (250 * 1000);

            status.negotiated_power_level = ((operating & 0x3ff) << 10) | (maximum & 0x3ff);

            // 5mA and 5mV resolution.
            status.power_reading_ready = true;
            status.scale_current = 1;
            status.average_current = (current / 5) as u16;
            status.peak_current = (max_current / 5) as u16;
            status.scale_voltage = 1;
            status.voltage_reading = (voltage / 5) as u16;
        }

        Ok(status)
    }

    fn identity_dir(&self, connector_nr: usize, recipient: MessageRecipient) -> Result<PathBuf> {
        match recipient {
            MessageRecipient::Sop => Ok(self.reader.partner(connector_nr).join("identity")),
            MessageRecipient::SopPrime => Ok(self.reader.cable(connector_nr).join("identity")),
            MessageRecipient::Connector | MessageRecipient::SopDoublePrime => {
                Err(Error::not_supported())
            }
        }
    }

    /// Builds the complete payload of a PD message.
    fn pd_message(
        &self,
        connector_nr: usize,
        recipient: MessageRecipient,
        response_type: MessageResponseType,
    ) -> Result<Vec<u8>> {
        match response_type {
            MessageResponseType::DiscoverIdentity => {
                let identity = self.identity_dir(connector_nr, recipient)?;
                if !identity.is_dir() {
                    return Err(Error::not_supported());
                }

                let mut words = vec![DISCOVER_IDENTITY_ACK];
                for vdo in [
                    "id_header",
                    "cert_stat",
                    "product",
                    "product_type_vdo1",
                    "product_type_vdo2",
                    "product_type_vdo3",
                ] {
                    let value = sysfs_reader::optional(self.reader.read_hex_u32(&identity.join(vdo)))?;
                    words.push(value.unwrap_or_default());
                }
                Ok(words.iter().flat_map(|word| word.to_le_bytes()).collect())
            }
            MessageResponseType::Revision => {
                let base = match recipient {
                    MessageRecipient::Connector => self.reader.port(connector_nr),
                    MessageRecipient::Sop => self.reader.partner(connector_nr),
                    MessageRecipient::SopPrime => self.reader.cable(connector_nr),
                    MessageRecipient::SopDoublePrime => return Err(Error::not_supported()),
                };
                let revision = self
                    .reader
                    .read_bcd(&base.join("usb_power_delivery_revision"))?;
                RevisionMessageData {
                    revision_major: revision.major() as u8,
                    revision_minor: revision.minor() as u8,
                    ..Default::default()
                }
                .to_vec(4)
            }
            _ => Err(Error::not_supported()),
        }
    }

    fn answer(&self, command: &Command) -> Result<Vec<u8>> {
        match command {
            Command::GetCapability => self.capability()?.to_vec(16),
            Command::GetConnectorCapability { connector_nr } => {
                self.connector_capability(*connector_nr)?.to_vec(4)
            }
            Command::GetAlternateModes {
                recipient,
                connector_nr,
                offset,
                nr_modes,
            } => {
                let mut response = vec![];
                for mode in self
                    .alternate_modes(*recipient, *connector_nr)?
                    .iter()
                    .skip(*offset)
                    .take(*nr_modes)
                {
                    response.extend(mode.to_vec(6)?);
                }
                Ok(response)
            }
            Command::GetPdos {
                connector_nr,
                partner_pdo,
                pdo_offset,
                nr_pdos,
                pdo_type,
                ..
            } => Ok(self
                .pdos(*connector_nr, *partner_pdo, *pdo_type)?
                .iter()
                .skip(*pdo_offset as usize)
                .take(*nr_pdos)
                .flat_map(|word| word.to_le_bytes())
                .collect()),
            Command::GetCableProperty { connector_nr } => {
                self.cable_property(*connector_nr)?.to_vec(5)
            }
            Command::GetConnectorStatus { connector_nr } => self
                .connector_status(*connector_nr)?
                .to_vec(UCSI_CONNECTOR_STATUS_LENGTH),
            // The kernel does not expose PPM errors.
            Command::GetErrorStatus { .. } => Ok(vec![0, 0]),
            Command::GetPdMessage {
                connector_nr,
                recipient,
                offset,
                nr_bytes,
                response_type,
            } => Ok(self
                .pd_message(*connector_nr, *recipient, *response_type)?
                .into_iter()
                .skip(*offset)
                .take(*nr_bytes)
                .collect()),
            Command::AckCcCi { .. } => Ok(vec![]),
        }
    }
}

impl OsBackend for SysfsBackend {
    fn open(&mut self) -> Result<()> {
        let root = &self.reader.config.typec_root;
        debug!("Opening {}", root.display());
        if !root.is_dir() || WalkDir::new(root).min_depth(1).max_depth(1).into_iter().next().is_none() {
            return Err(Error::not_supported());
        }
        self.opened = true;
        Ok(())
    }

    fn close(&mut self) {
        debug!("Closing {}", self.reader.config.typec_root.display());
        self.opened = false;
    }

    fn submit(&mut self, command: &Command) -> Result<Vec<u8>> {
        if !self.opened {
            return Err(std::io::Error::from(std::io::ErrorKind::NotConnected).into());
        }

        debug!("Submitting {command:?}");
        let response = self.answer(command)?;
        trace!("Response {response:02x?}");
        Ok(response)
    }
}
