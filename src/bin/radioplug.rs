extern crate assetclient;

use std::{convert::TryFrom, path::Path};

use clap::{Arg, ArgMatches, SubCommand};

use assetclient::{
    batch,
    capabilities::{AssetActions, RadioSwitch},
    cli::{self, exit_on_error, Settings},
    datatypes::{RadioPlug, RadioProtocol},
    devices::RadioPlugAsset,
    error::{Error, Result},
};

fn command_info(device: &RadioPlugAsset, json: bool) -> Result<()> {
    cli::print_entity(&device.info()?, json)
}

fn command_update_info(device: &RadioPlugAsset, matches: &ArgMatches) -> Result<()> {
    println!("{}", device.update_info(&cli::metadata(matches)?)?);
    Ok(())
}

fn plug_from_args(matches: &ArgMatches) -> Result<RadioPlug> {
    let protocol = RadioProtocol::try_from(cli::parse::<u8>(matches, "protocol")?).map_err(Error::Invalid)?;
    let optional = |name: &str| match matches.value_of(name) {
        Some(_) => cli::parse::<u32>(matches, name).map(Some),
        None => Ok(None),
    };

    Ok(RadioPlug {
        name: cli::required(matches, "name")?.to_owned(),
        on_command: cli::required(matches, "oncommand")?.to_owned(),
        off_command: cli::required(matches, "offcommand")?.to_owned(),
        is_tri_state: cli::parse_bool(cli::required(matches, "istristate")?)?,
        protocol,
        pulse_length: optional("pulselength")?,
        repeat_transmit: optional("repeattransmit")?,
    })
}

fn command_register_switch(device: &RadioPlugAsset, matches: &ArgMatches) -> Result<()> {
    println!("{}", device.update_switch_data(&plug_from_args(matches)?)?);
    Ok(())
}

fn is_on(matches: &ArgMatches) -> Result<bool> {
    Ok(cli::required(matches, "status")? == "on")
}

fn command_switch(device: &RadioPlugAsset, matches: &ArgMatches) -> Result<()> {
    println!("{}", device.switch(cli::required(matches, "name")?, is_on(matches)?)?);
    Ok(())
}

fn command_apply_config(device: &RadioPlugAsset, matches: &ArgMatches) -> Result<()> {
    batch::apply_configuration(device, Path::new(cli::required(matches, "file")?))?;
    println!("Configuration applied");
    Ok(())
}

fn command_turn_by_config(device: &RadioPlugAsset, matches: &ArgMatches) -> Result<()> {
    let path = Path::new(cli::required(matches, "file")?);
    batch::turn_switches_by_config(device, path, is_on(matches)?)?;
    println!("All switches turned {}", cli::required(matches, "status")?);
    Ok(())
}

fn value_arg(name: &'static str, help: &'static str) -> Arg<'static, 'static> {
    Arg::with_name(name)
        .long(name)
        .takes_value(true)
        .help(help)
}

fn main() {
    let matches = cli::app("radioplug", "Register and toggle radio controlled plugs through a switch asset.")
        .subcommand(SubCommand::with_name("info")
            .about("Show status, name and location of the switch")
        )
        .subcommand(cli::updateinfo_command())
        .subcommand(SubCommand::with_name("registerswitch")
            .about("Register a plug or replace its radio codes")
            .arg(value_arg("name", "Name of the plug").required(true))
            .arg(value_arg("oncommand", "Radio code turning the plug on").required(true))
            .arg(value_arg("offcommand", "Radio code turning the plug off").required(true))
            .arg(value_arg("istristate", "Whether the codes are tri-state codes").required(true))
            .arg(value_arg("protocol", "RCSwitch protocol, 1 to 5").required(true))
            .arg(value_arg("pulselength", "Pulse length in microseconds"))
            .arg(value_arg("repeattransmit", "How often every code is sent"))
        )
        .subcommand(SubCommand::with_name("switch")
            .about("Turn a registered plug on or off")
            .arg(value_arg("name", "Name of the plug").required(true))
            .arg(cli::status_arg())
        )
        .subcommand(SubCommand::with_name("applyconfig")
            .about("Store metadata and all plugs of a file on the switch")
            .arg(cli::file_arg())
        )
        .subcommand(SubCommand::with_name("turnbyconfig")
            .about("Turn every plug of a file on or off")
            .arg(cli::file_arg())
            .arg(cli::status_arg())
        )
        .get_matches();

    let settings = exit_on_error(Settings::from_matches(&matches), "read the arguments");
    cli::init_logging(settings.verbosity);
    let device = RadioPlugAsset::new(&settings.host, &settings.auth_header()).with_retry(settings.retry);

    let (result, action) = match matches.subcommand() {
        ("info", _) => (command_info(&device, settings.json), "get the switch info"),
        ("updateinfo", Some(sub)) => (command_update_info(&device, sub), "update the switch info"),
        ("registerswitch", Some(sub)) => (command_register_switch(&device, sub), "register the switch"),
        ("switch", Some(sub)) => (command_switch(&device, sub), "toggle the switch"),
        ("applyconfig", Some(sub)) => (command_apply_config(&device, sub), "apply the configuration"),
        ("turnbyconfig", Some(sub)) => (command_turn_by_config(&device, sub), "turn the switches"),
        _ => return,
    };
    exit_on_error(result, action);
}
