// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! Runs the tools against fake sysfs trees.

use std::path::Path;
use std::process::Command;
use std::process::Output;

use tempfile::TempDir;

fn write(root: &Path, path: &str, content: &str) {
    let path = root.join(path);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, format!("{content}\n")).unwrap();
}

/// A sink-only port with nothing attached.
fn lone_port() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    write(root.path(), "typec/port0/power_role", "sink");
    write(root.path(), "typec/port0/data_role", "device");
    write(root.path(), "typec/port0/usb_power_delivery_revision", "3.0");
    std::fs::create_dir_all(root.path().join("power_supply")).unwrap();
    root
}

fn run(tool: &str, root: &Path) -> Output {
    Command::new(tool)
        .arg("--backend")
        .arg("sysfs")
        .arg("--sysfs-root")
        .arg(root)
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

#[test]
fn lists_a_port_without_partner() {
    let root = lone_port();
    let output = run(env!("CARGO_BIN_EXE_lstypec"), root.path());

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("USB-C Platform Policy Manager Capability"));
    assert!(stdout.contains("Connector 0 Capability"));
    assert!(stdout.contains("Connector 0 Status"));
    // Nothing is attached, so these sections are skipped.
    assert!(!stdout.contains("Partner Source PDOs"));
    assert!(!stdout.contains("Cable Properties"));
}

#[test]
fn lists_partner_pdos() {
    let root = lone_port();
    let caps = "typec/port0-partner/usb_power_delivery/source-capabilities";
    write(root.path(), &format!("{caps}/1:fixed_supply/voltage"), "5000mV");
    write(root.path(), &format!("{caps}/1:fixed_supply/maximum_current"), "3000mA");
    write(root.path(), &format!("{caps}/2:fixed_supply/voltage"), "20000mV");
    write(root.path(), &format!("{caps}/2:fixed_supply/maximum_current"), "2250mA");

    let output = run(env!("CARGO_BIN_EXE_lstypec"), root.path());
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Connector 0 Partner Source PDOs"));
    assert!(stdout.contains("20000mV"));

    let output = run(env!("CARGO_BIN_EXE_typecstatus"), root.path());
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Port 0: connected as sink"));
    assert!(stdout.contains("5V/3A 20V/2.25A"));
}

#[test]
fn missing_backend_exits_with_2() {
    let root = tempfile::tempdir().unwrap();

    let output = run(env!("CARGO_BIN_EXE_lstypec"), root.path());
    assert_eq!(output.status.code(), Some(2));

    let output = run(env!("CARGO_BIN_EXE_typecstatus"), root.path());
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn malformed_tree_exits_with_1() {
    let root = lone_port();
    write(root.path(), "typec/port0/usb_power_delivery_revision", "garbage");

    let output = run(env!("CARGO_BIN_EXE_lstypec"), root.path());
    assert_eq!(output.status.code(), Some(1));
}
