/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2023-2025 ByteDance and/or its affiliates.
 */

use std::io;
use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::{Arg, ArgAction, Command, ValueHint, value_parser};
use clap_complete::Shell;

const ARGS_COMPLETION: &str = "completion";
const ARGS_VERSION: &str = "version";
const ARGS_VERBOSE: &str = "verbose";
const ARGS_TEST_CONFIG: &str = "test-config";
const ARGS_CONFIG_FILE: &str = "config-file";

const PKG_NAME: &str = env!("CARGO_PKG_NAME");
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Default)]
pub struct ProcArgs {
    pub config_file: PathBuf,
    pub test_config: bool,
    pub verbose_level: u8,
}

fn build_cli_args() -> Command {
    Command::new(PKG_NAME)
        .disable_version_flag(true)
        .arg(
            Arg::new(ARGS_COMPLETION)
                .num_args(1)
                .value_name("SHELL")
                .long("completion")
                .value_parser(value_parser!(Shell))
                .exclusive(true),
        )
        .arg(
            Arg::new(ARGS_VERSION)
                .help("Show version")
                .action(ArgAction::SetTrue)
                .short('V')
                .long("version"),
        )
        .arg(
            Arg::new(ARGS_VERBOSE)
                .help("Show verbose output")
                .num_args(0)
                .action(ArgAction::Count)
                .short('v')
                .long("verbose"),
        )
        .arg(
            Arg::new(ARGS_TEST_CONFIG)
                .help("Test the format of config file and exit")
                .action(ArgAction::SetTrue)
                .short('t')
                .long("test-config"),
        )
        .arg(
            Arg::new(ARGS_CONFIG_FILE)
                .help("Config file path")
                .num_args(1)
                .value_name("CONFIG FILE")
                .value_hint(ValueHint::FilePath)
                .value_parser(value_parser!(PathBuf))
                .required_unless_present_any([ARGS_COMPLETION, ARGS_VERSION])
                .short('c')
                .long("config-file"),
        )
}

pub fn parse_clap() -> anyhow::Result<Option<ProcArgs>> {
    let args_parser = build_cli_args();
    let args = args_parser.get_matches();

    if let Some(target) = args.get_one::<Shell>(ARGS_COMPLETION) {
        let mut app = build_cli_args();
        let bin_name = app.get_name().to_string();
        clap_complete::generate(*target, &mut app, bin_name, &mut io::stdout());
        return Ok(None);
    }

    let mut proc_args = ProcArgs::default();
    if let Some(verbose_level) = args.get_one::<u8>(ARGS_VERBOSE) {
        proc_args.verbose_level = *verbose_level;
    }

    if args.get_flag(ARGS_VERSION) {
        print_version(proc_args.verbose_level);
        return Ok(None);
    }
    if args.get_flag(ARGS_TEST_CONFIG) {
        proc_args.test_config = true;
    }

    if let Some(config_file) = args.get_one::<PathBuf>(ARGS_CONFIG_FILE) {
        let config_file = config_file.canonicalize().context(format!(
            "failed to get absolute path for config file {}",
            config_file.display()
        ))?;
        if !config_file.is_file() {
            return Err(anyhow!(
                "config file {} is not a regular file",
                config_file.display()
            ));
        }
        proc_args.config_file = config_file;
    } else {
        return Err(anyhow!("no config file given"));
    }

    Ok(Some(proc_args))
}

fn print_version(verbose_level: u8) {
    println!("{PKG_NAME} {PKG_VERSION}");
    if verbose_level > 1 {
        println!("Compiler: rustc {}", env!("CARGO_PKG_RUST_VERSION"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli() {
        build_cli_args().debug_assert();

        let args = build_cli_args()
            .try_get_matches_from(["swarmd", "-vv", "-t", "-c", "swarmd.yaml"])
            .unwrap();
        assert_eq!(args.get_one::<u8>(ARGS_VERBOSE).copied(), Some(2));
        assert!(args.get_flag(ARGS_TEST_CONFIG));
        assert_eq!(
            args.get_one::<PathBuf>(ARGS_CONFIG_FILE),
            Some(&PathBuf::from("swarmd.yaml"))
        );

        assert!(build_cli_args().try_get_matches_from(["swarmd"]).is_err());
        assert!(
            build_cli_args()
                .try_get_matches_from(["swarmd", "-V"])
                .is_ok()
        );
    }
}
