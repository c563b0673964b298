// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! Check status of TypeC ports

use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use log::debug;
use log::error;

use libtypec_rs::backends::sysfs::SysfsConfig;
use libtypec_rs::backends::ucsi_debugfs::UcsiDebugfsConfig;
use libtypec_rs::pd::Pdo;
use libtypec_rs::typec::BackendConfig;
use libtypec_rs::typec::OsBackends;
use libtypec_rs::typec::TypecRs;
use libtypec_rs::ucsi::ConnectorStatus;
use libtypec_rs::ucsi::PdoSourceCapabilitiesType;
use libtypec_rs::ucsi::PdoType;
use libtypec_rs::ucsi::PowerDirection;
use libtypec_rs::BcdWrapper;

const EXIT_NO_BACKEND: u8 = 2;

#[derive(FromArgs)]
/// Summarize the power status of typec ports
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

fn open(args: &Args) -> Option<TypecRs> {
    let mut sysfs = SysfsConfig::default();
    if let Some(root) = &args.sysfs_root {
        sysfs.typec_root = root.join("typec");
        sysfs.power_supply_root = root.join("power_supply");
    }
    let mut debugfs = UcsiDebugfsConfig::from_env();
    if let Some(device) = &args.device {
        debugfs.device = device.clone();
    }

    let configs = match args.backend {
        Some(OsBackends::Sysfs) => vec![BackendConfig::Sysfs(sysfs)],
        Some(OsBackends::UcsiDebugfs) => vec![BackendConfig::UcsiDebugfs(debugfs)],
        Some(OsBackends::Default) | None => vec![
            BackendConfig::Sysfs(sysfs),
            BackendConfig::UcsiDebugfs(debugfs),
        ],
    };

    configs
        .into_iter()
        .find_map(|config| TypecRs::with_config(config).ok())
}

/// The operating and maximum power of a contract, in watts.
fn contract_watts(status: &ConnectorStatus) -> (u32, u32) {
    let rdo = status.negotiated_power_level;
    let operating = (((rdo >> 10) & 0x3ff) * 250) / 1000;
    let maximum = ((rdo & 0x3ff) * 250) / 1000;
    (operating, maximum)
}

/// Formats PDOs as "5V/3A 9V/3A PPS 3.3-11V/3A".
fn summarize_pdos(pdos: &[Pdo]) -> String {
    let volts = |mv: u32| format!("{}", f64::from(mv) / 1000.0);
    let amps = |ma: u32| format!("{}", f64::from(ma) / 1000.0);

    pdos.iter()
        .map(|pdo| match pdo {
            Pdo::Pd3p2FixedSupplyPdo(pdo) => format!(
                "{}V/{}A",
                volts(pdo.voltage.0),
                amps(pdo.operational_current.0)
            ),
            Pdo::Pd3p2VariableSupplyPdo(pdo) => format!(
                "{}-{}V/{}A",
                volts(pdo.min_voltage.0),
                volts(pdo.max_voltage.0),
                amps(pdo.max_current.0)
            ),
            Pdo::Pd3p2BatterySupplyPdo(pdo) => format!(
                "BAT {}-{}V/{}W",
                volts(pdo.min_voltage.0),
                volts(pdo.max_voltage.0),
                f64::from(pdo.operational_power.0) / 1000.0
            ),
            Pdo::Pd3p2SprProgrammableSupplyPdo(pdo) => format!(
                "PPS {}-{}V/{}A",
                volts(pdo.min_voltage.0),
                volts(pdo.max_voltage.0),
                amps(pdo.max_current.0)
            ),
            Pdo::Pd3p2EprAdjustableVoltageSupplyPdo(pdo) => format!(
                "AVS {}-{}V/{}W",
                volts(pdo.min_voltage.0),
                volts(pdo.max_voltage.0),
                f64::from(pdo.pdp.0) / 1000.0
            ),
            Pdo::Pd3p2SprAdjustableVoltageSupplyPdo(_) => "SPR AVS".to_string(),
            Pdo::UnknownAugmented(word) => format!("APDO {word:#010x}"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn connector_line(typec: &mut TypecRs, connector_nr: usize) -> libtypec_rs::Result<String> {
    let status = typec.connector_status(connector_nr)?;
    if !status.connect_status {
        return Ok(format!("Port {connector_nr}: disconnected"));
    }

    let role = match status.power_direction {
        PowerDirection::Provider => "source",
        PowerDirection::Consumer => "sink",
    };
    let mut line = format!(
        "Port {connector_nr}: connected as {role}, {:?}",
        status.power_operation_mode
    );

    if status.negotiated_power_level > 0 {
        let (operating, maximum) = contract_watts(&status);
        line.push_str(&format!(", contract {operating} W (max {maximum} W)"));
    }

    match typec.pdos(
        connector_nr,
        true,
        0,
        0,
        PdoType::Source,
        PdoSourceCapabilitiesType::CurrentSupportedSourceCapabilities,
        BcdWrapper::default(),
    ) {
        Ok(pdos) if !pdos.is_empty() => {
            line.push_str(&format!(", partner offers {}", summarize_pdos(&pdos)))
        }
        Ok(_) => (),
        Err(err) if err.is_not_supported() => debug!("No partner PDOs on port {connector_nr}"),
        Err(err) => return Err(err),
    }

    Ok(line)
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let Some(mut typec) = open(&args) else {
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

    println!("USB-C Power Status:");
    println!("Number of USB-C port(s): {}", capabilities.num_connectors);

    let mut ok = true;
    for connector_nr in 0..capabilities.num_connectors {
        match connector_line(&mut typec, connector_nr) {
            Ok(line) => println!("\t{line}"),
            Err(err) => {
                error!("Port {connector_nr}: {err}");
                ok = false;
            }
        }
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
