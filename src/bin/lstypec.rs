// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! Implements listing of typec port and port partner details

use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use log::debug;
use log::error;

use libtypec_rs::backends::sysfs::SysfsConfig;
use libtypec_rs::backends::ucsi_debugfs::UcsiDebugfsConfig;
use libtypec_rs::pd::Message;
use libtypec_rs::pd::MessageRecipient;
use libtypec_rs::pd::MessageResponseType;
use libtypec_rs::typec::BackendConfig;
use libtypec_rs::typec::OsBackends;
use libtypec_rs::typec::TypecRs;
use libtypec_rs::ucsi::GetAlternateModesRecipient;
use libtypec_rs::ucsi::PdoSourceCapabilitiesType;
use libtypec_rs::ucsi::PdoType;
use libtypec_rs::BcdWrapper;

/// The backend could not be opened.
const EXIT_NO_BACKEND: u8 = 2;

#[derive(FromArgs)]
/// List typec port and port partner details
struct Args {
    /// enable verbose mode
    #[argh(switch, short = 'v')]
    verbose: bool,
    /// the backend to use, sysfs or ucsi_debugfs
    #[argh(option)]
    backend: Option<OsBackends>,
    /// the sysfs class directory holding typec and power_supply
    #[argh(option)]
    sysfs_root: Option<PathBuf>,
    /// the UCSI character device
    #[argh(option)]
    device: Option<PathBuf>,
}

impl Args {
    fn backend_configs(&self) -> Vec<BackendConfig> {
        let mut sysfs = SysfsConfig::default();
        if let Some(root) = &self.sysfs_root {
            sysfs.typec_root = root.join("typec");
            sysfs.power_supply_root = root.join("power_supply");
        }

        let mut debugfs = UcsiDebugfsConfig::from_env();
        if let Some(device) = &self.device {
            debugfs.device = device.clone();
        }

        match self.backend {
            Some(OsBackends::Sysfs) => vec![BackendConfig::Sysfs(sysfs)],
            Some(OsBackends::UcsiDebugfs) => vec![BackendConfig::UcsiDebugfs(debugfs)],
            // Try the backends in order.
            Some(OsBackends::Default) | None => vec![
                BackendConfig::Sysfs(sysfs),
                BackendConfig::UcsiDebugfs(debugfs),
            ],
        }
    }
}

/// Prints the outcome of one query. Returns false on a real failure.
fn report<T: std::fmt::Debug>(title: &str, result: libtypec_rs::Result<T>) -> bool {
    match result {
        Ok(value) => {
            println!("{title}");
            println!("{value:#?}");
            println!();
            true
        }
        Err(err) if err.is_not_supported() => {
            debug!("{title}: not supported");
            true
        }
        Err(err) => {
            error!("{title}: {err}");
            false
        }
    }
}

#[cfg(feature = "hwdb")]
fn print_vendor(message: &libtypec_rs::Result<Message>) {
    if let Ok(Message::Pd3p2DiscoverIdentityResponse(identity)) = message {
        let vendor_id = identity.id_header_vdo.vendor_id;
        match libtypec_rs::hwdb::vendor_name(vendor_id) {
            Ok(name) => println!("Vendor {vendor_id:#06x}: {name}"),
            Err(err) => debug!("No vendor name for {vendor_id:#06x}: {err}"),
        }
    }
}

#[cfg(not(feature = "hwdb"))]
fn print_vendor(_message: &libtypec_rs::Result<Message>) {}

fn list_connector(typec: &mut TypecRs, connector_nr: usize) -> bool {
    let mut ok = true;

    ok &= report(
        &format!("Connector {connector_nr} Capability"),
        typec.connector_capabilities(connector_nr),
    );
    ok &= report(
        &format!("Connector {connector_nr} Status"),
        typec.connector_status(connector_nr),
    );

    for (partner_pdo, pdo_type, title) in [
        (false, PdoType::Source, "Source PDOs"),
        (false, PdoType::Sink, "Sink PDOs"),
        (true, PdoType::Source, "Partner Source PDOs"),
        (true, PdoType::Sink, "Partner Sink PDOs"),
    ] {
        let pdos = typec.pdos(
            connector_nr,
            partner_pdo,
            0,
            0,
            pdo_type,
            PdoSourceCapabilitiesType::CurrentSupportedSourceCapabilities,
            BcdWrapper::default(),
        );
        ok &= report(&format!("Connector {connector_nr} {title}"), pdos);
    }

    ok &= report(
        &format!("Connector {connector_nr} Cable Properties"),
        typec.cable_properties(connector_nr),
    );

    for (recipient, title) in [
        (GetAlternateModesRecipient::Connector, "Alternate Modes"),
        (GetAlternateModesRecipient::Sop, "SOP Alternate Modes"),
        (GetAlternateModesRecipient::SopPrime, "SOP' Alternate Modes"),
    ] {
        ok &= report(
            &format!("Connector {connector_nr} {title}"),
            typec.alternate_modes(recipient, connector_nr),
        );
    }

    for (recipient, title) in [
        (MessageRecipient::Sop, "SOP"),
        (MessageRecipient::SopPrime, "SOP'"),
    ] {
        let message =
            typec.pd_message(connector_nr, recipient, MessageResponseType::DiscoverIdentity);
        print_vendor(&message);
        ok &= report(
            &format!("Connector {connector_nr} {title} DiscoverIdentity PD Message"),
            message,
        );
    }

    ok
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let Some(mut typec) = args
        .backend_configs()
        .into_iter()
        .find_map(|config| match TypecRs::with_config(config.clone()) {
            Ok(typec) => Some(typec),
            Err(err) => {
                debug!("Could not open {config:?}: {err}");
                None
            }
        })
    else {
        error!("No usable backend found");
        return ExitCode::from(EXIT_NO_BACKEND);
    };

    let capabilities = match typec.capabilities() {
        Ok(capabilities) => capabilities,
        Err(err) => {
            error!("Failed to get capabilities: {err}");
            return ExitCode::FAILURE;
        }
    };
    println!("USB-C Platform Policy Manager Capability");
    println!("{capabilities:#?}");
    println!();

    let mut ok = true;
    for connector_nr in 0..capabilities.num_connectors {
        ok &= list_connector(&mut typec, connector_nr);
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
