extern crate assetclient;

use std::path::Path;

use clap::{Arg, ArgMatches, SubCommand};

use assetclient::{
    batch,
    capabilities::{AssetActions, DepthSensor},
    cli::{self, exit_on_error, Settings},
    datatypes::{format_local_time, local_epoch_now, to_json, DepthSensorConfig},
    devices::DepthSensorAsset,
    error::Result,
};

fn command_info(device: &DepthSensorAsset, json: bool) -> Result<()> {
    cli::print_entity(&device.info()?, json)
}

fn command_update_info(device: &DepthSensorAsset, matches: &ArgMatches) -> Result<()> {
    println!("{}", device.update_info(&cli::metadata(matches)?)?);
    Ok(())
}

fn command_set_time(device: &DepthSensorAsset) -> Result<()> {
    match device.set_time(local_epoch_now())? {
        Some(time) => println!(
            "Device time is now {}",
            format_local_time(time).unwrap_or_else(|| time.to_string())
        ),
        None => println!("Device time updated"),
    }
    Ok(())
}

fn command_config(device: &DepthSensorAsset, json: bool) -> Result<()> {
    cli::print_entity(&device.config()?, json)
}

fn command_update_config(device: &DepthSensorAsset, matches: &ArgMatches) -> Result<()> {
    let config = DepthSensorConfig::new(
        cli::parse(matches, "interval")?,
        cli::parse(matches, "keep")?,
    );
    println!("{}", device.update_config(&config)?);
    Ok(())
}

fn command_measurements(device: &DepthSensorAsset, json: bool) -> Result<()> {
    let collection = device.measurements()?;
    if json {
        println!("{}", to_json(&collection)?);
    } else {
        for measurement in &collection.measurements {
            println!("{}", measurement);
        }
    }
    Ok(())
}

fn command_purge(device: &DepthSensorAsset) -> Result<()> {
    println!("{}", device.purge_measurements()?);
    Ok(())
}

fn command_apply_config(device: &DepthSensorAsset, matches: &ArgMatches) -> Result<()> {
    batch::apply_sensor_configuration(device, Path::new(cli::required(matches, "file")?))?;
    println!("Configuration applied");
    Ok(())
}

fn main() {
    let matches = cli::app("depthsensor", "Query and configure an ultrasonic depth sensor asset.")
        .subcommand(SubCommand::with_name("info")
            .about("Show status, name and location of the sensor")
        )
        .subcommand(cli::updateinfo_command())
        .subcommand(SubCommand::with_name("settime")
            .about("Set the sensor clock to the local time of this machine")
        )
        .subcommand(SubCommand::with_name("config")
            .about("Show the measurement configuration")
        )
        .subcommand(SubCommand::with_name("updateconfig")
            .about("Change the measurement configuration")
            .arg(Arg::with_name("interval")
                .long("interval")
                .takes_value(true)
                .required(true)
                .help("Seconds between two measurements")
            )
            .arg(Arg::with_name("keep")
                .long("keep")
                .takes_value(true)
                .required(true)
                .help("Number of measurements the sensor keeps")
            )
        )
        .subcommand(SubCommand::with_name("measurements")
            .about("List the stored measurements")
        )
        .subcommand(SubCommand::with_name("purge")
            .about("Delete the stored measurements")
        )
        .subcommand(SubCommand::with_name("applyconfig")
            .about("Apply metadata and measurement configuration from a file")
            .arg(cli::file_arg())
        )
        .get_matches();

    let settings = exit_on_error(Settings::from_matches(&matches), "read the arguments");
    cli::init_logging(settings.verbosity);
    let device = DepthSensorAsset::new(&settings.host, &settings.auth_header()).with_retry(settings.retry);

    let (result, action) = match matches.subcommand() {
        ("info", _) => (command_info(&device, settings.json), "get the sensor info"),
        ("updateinfo", Some(sub)) => (command_update_info(&device, sub), "update the sensor info"),
        ("settime", _) => (command_set_time(&device), "set the sensor time"),
        ("config", _) => (command_config(&device, settings.json), "get the sensor configuration"),
        ("updateconfig", Some(sub)) => (command_update_config(&device, sub), "update the sensor configuration"),
        ("measurements", _) => (command_measurements(&device, settings.json), "get the measurements"),
        ("purge", _) => (command_purge(&device), "purge the measurements"),
        ("applyconfig", Some(sub)) => (command_apply_config(&device, sub), "apply the configuration"),
        _ => return,
    };
    exit_on_error(result, action);
}
