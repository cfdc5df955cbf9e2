//! Plumbing shared by the command line clients
use std::{env, fmt::Display, process, str::FromStr, time::Duration};

use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::LevelFilter;
use serde::Serialize;

use crate::{
    auth::{AuthHeader, Credentials},
    datatypes::{to_json, Metadata},
    error::{Error, Result},
    protocol::RetryPolicy,
};

/// Setting it to `ON` has the same effect as `--verbose`.
pub const LOGGING_ENV: &str = "LOGGING";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Verbose,
}

impl Verbosity {
    pub fn from_flags(verbose: bool, logging: Option<&str>) -> Self {
        if verbose || logging == Some("ON") {
            Verbosity::Verbose
        } else {
            Verbosity::Quiet
        }
    }

    pub fn level(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::Error,
            Verbosity::Verbose => LevelFilter::Debug,
        }
    }
}

/// Install the logger. `RUST_LOG` still wins over `verbosity`.
pub fn init_logging(verbosity: Verbosity) {
    env_logger::Builder::new()
        .filter_level(verbosity.level())
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

pub fn app<'a, 'b>(name: &str, about: &'b str) -> App<'a, 'b> {
    App::new(name)
        .version(env!("CARGO_PKG_VERSION"))
        .about(about)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(Arg::with_name("secret")
            .long("secret")
            .env("ASSET_SECRET")
            .takes_value(true)
            .required(true)
            .help("The secret key used for the authentication")
        )
        .arg(Arg::with_name("ip")
            .long("ip")
            .env("ASSET_IP")
            .takes_value(true)
            .required(true)
            .help("The IP address of the asset")
        )
        .arg(Arg::with_name("retries")
            .long("retries")
            .takes_value(true)
            .default_value("15")
            .help("Attempts per request while the asset is unreachable")
        )
        .arg(Arg::with_name("retry-interval")
            .long("retry-interval")
            .takes_value(true)
            .default_value("5")
            .help("Seconds to wait between attempts")
        )
        .arg(Arg::with_name("json")
            .long("json")
            .takes_value(false)
            .help("Respond with JSON.")
        )
        .arg(Arg::with_name("verbose")
            .long("verbose")
            .short("v")
            .takes_value(false)
            .help("Print diagnostic output, same as LOGGING=ON")
        )
}

pub fn updateinfo_command<'a, 'b>() -> App<'a, 'b> {
    SubCommand::with_name("updateinfo")
        .about("Update the name and location of the asset")
        .arg(Arg::with_name("name")
            .long("name")
            .takes_value(true)
            .required(true)
            .help("The friendly name of the asset to set.")
        )
        .arg(Arg::with_name("location")
            .long("location")
            .takes_value(true)
            .required(true)
            .help("The location of the asset to set.")
        )
}

pub fn file_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("file")
        .long("file")
        .takes_value(true)
        .required(true)
        .help("The JSON file containing the configuration to apply")
}

pub fn status_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("status")
        .long("status")
        .takes_value(true)
        .required(true)
        .possible_values(&["on", "off"])
}

/// Everything the global arguments resolve to.
#[derive(Debug)]
pub struct Settings {
    pub host: String,
    pub credentials: Credentials,
    pub retry: RetryPolicy,
    pub json: bool,
    pub verbosity: Verbosity,
}

impl Settings {
    pub fn from_matches(matches: &ArgMatches) -> Result<Settings> {
        let secret = required(matches, "secret")?;
        let host = required(matches, "ip")?.to_owned();
        let attempts: u32 = parse(matches, "retries")?;
        let interval: u64 = parse(matches, "retry-interval")?;
        let logging = env::var(LOGGING_ENV).ok();

        Ok(Settings {
            host,
            credentials: Credentials::generate(secret),
            retry: RetryPolicy::new(attempts, Duration::from_secs(interval)),
            json: matches.is_present("json"),
            verbosity: Verbosity::from_flags(matches.is_present("verbose"), logging.as_deref()),
        })
    }

    pub fn auth_header(&self) -> AuthHeader {
        self.credentials.header()
    }
}

pub fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .value_of(name)
        .ok_or_else(|| Error::Invalid(format!("--{} is required", name)))
}

pub fn parse<T: FromStr>(matches: &ArgMatches, name: &str) -> Result<T> {
    let value = required(matches, name)?;
    value
        .parse()
        .map_err(|_| Error::Invalid(format!("Invalid value for --{}: {}", name, value)))
}

pub fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::Invalid(format!("Invalid boolean: {}", value))),
    }
}

pub fn metadata(matches: &ArgMatches) -> Result<Metadata> {
    Ok(Metadata::new(required(matches, "name")?, required(matches, "location")?))
}

pub fn print_entity<T: Serialize + Display>(entity: &T, json: bool) -> Result<()> {
    if json {
        println!("{}", to_json(entity)?);
    } else {
        println!("{}", entity);
    }
    Ok(())
}

/// Print `result`'s error and leave with status 1, or hand back its value.
pub fn exit_on_error<T>(result: Result<T>, action: &str) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to {}: {}", action, err);
            process::exit(1);
        }
    }
}
