// SPDX-License-Identifier: Apache-2.0 OR MIT
// SPDX-FileCopyrightText: © 2024 Google
// Ported from libtypec (Rajaram Regupathy <rajaram.regupathy@gmail.com>)

//! Just a wrapper to run lstypec.c through cargo.

use std::process::ExitCode;

use argh::FromArgs;
use libtypec_rs::typec::OsBackends;

#[link(name = "c_examples_lstypec")]
extern "C" {
    fn c_example_lstypec(backend: u32) -> std::ffi::c_int;
}

// Bring the library into scope so that its symbols become available to the
// linker when linking the C code.
extern crate libtypec_rs;

#[derive(FromArgs)]
/// Run the C example for lstypec. This is meant as a documentation for the use
/// of the C API.
struct Args {
    /// the backend to use in the example. Defaults to the platform's choice.
    #[argh(option, default = "OsBackends::Default")]
    backend: OsBackends,
}

fn main() -> ExitCode {
    let args: Args = argh::from_env();

    let ret = unsafe { c_example_lstypec(args.backend as u32) };
    if ret == 0 {
        ExitCode::SUCCESS
    } else {
        eprintln!("lstypec.c failed with {ret}");
        ExitCode::FAILURE
    }
}
