use std::{collections::HashMap, convert::TryFrom, fmt};

use chrono::{Local, TimeZone};
use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Error, Result};

pub const MAX_SENSOR_NAME_LENGTH: usize = 32;
pub const MAX_SENSOR_LOCATION_LENGTH: usize = 64;
pub const MAX_SWITCH_NAME_LENGTH: usize = 64;
pub const MAX_SWITCH_COMMAND_LENGTH: usize = 64;

pub const MIN_MEASURE_INTERVAL_SECONDS: u32 = 1;
pub const MAX_MEASURE_INTERVAL_SECONDS: u32 = 32767;
pub const MIN_MEASUREMENTS_TO_KEEP: u32 = 10;
pub const MAX_MEASUREMENTS_TO_KEEP: u32 = 3000;

const DISPLAY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Decode any entity from JSON text.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}

/// Encode an entity with sorted keys and four space indentation.
pub fn to_json<T: Serialize>(entity: &T) -> Result<String> {
    // serde_json::Map is ordered by key, so the detour sorts every level.
    let value = serde_json::to_value(entity)?;
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut serializer)?;
    String::from_utf8(out).map_err(|err| Error::Invalid(err.to_string()))
}

pub fn format_local_time(epoch_seconds: i64) -> Option<String> {
    Local
        .timestamp_opt(epoch_seconds, 0)
        .single()
        .map(|time| time.format(DISPLAY_TIME_FORMAT).to_string())
}

/// The caller's wall clock as seconds since the epoch, shifted into local time.
pub fn local_epoch_now() -> i64 {
    let now = Local::now();
    now.timestamp() + i64::from(now.offset().local_minus_utc())
}

fn check_length(field: &str, value: &str, max: usize) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Invalid(format!("{} must not be empty", field)));
    }
    // The firmware stores fixed size byte buffers.
    if value.len() > max {
        return Err(Error::Invalid(format!(
            "{} must be at most {} bytes",
            field, max
        )));
    }
    Ok(())
}

/// Name and location every asset stores about itself.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Metadata {
    pub name: String,
    pub location: String,
}

impl Metadata {
    pub fn new(name: &str, location: &str) -> Self {
        Self {
            name: name.to_owned(),
            location: location.to_owned(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_length("Sensor name", &self.name, MAX_SENSOR_NAME_LENGTH)?;
        check_length("Sensor location", &self.location, MAX_SENSOR_LOCATION_LENGTH)
    }
}

/// Answer of the `info` endpoint.
///
/// The body is not JSON but `key=value` lines.
#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub status: Option<String>,
    #[serde(rename = "sensorName")]
    pub sensor_name: Option<String>,
    #[serde(rename = "sensorLocation")]
    pub sensor_location: Option<String>,
}

impl DeviceInfo {
    pub fn parse(body: &str) -> DeviceInfo {
        let mut values = HashMap::new();
        for line in body.lines() {
            // The firmware ends lines with "\n\r".
            let mut parts = line.trim().split('=');
            if let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) {
                if !key.is_empty() {
                    values.insert(key, value);
                }
            }
        }
        let take = |key: &str| values.get(key).map(|value| (*value).to_owned());
        DeviceInfo {
            status: take("status"),
            sensor_name: take("sensorName"),
            sensor_location: take("sensorLocation"),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let show = |value: &Option<String>| value.clone().unwrap_or_else(|| String::from("-"));
        writeln!(f, "status: {}", show(&self.status))?;
        writeln!(f, "name: {}", show(&self.sensor_name))?;
        write!(f, "location: {}", show(&self.sensor_location))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DepthSensorConfig {
    #[serde(rename = "isDefault")]
    pub is_default: bool,
    #[serde(rename = "measurementIntervalSeconds")]
    #[serde(alias = "measureIntervalInSeconds")]
    pub measurement_interval_seconds: u32,
    #[serde(rename = "measurementsToKeep")]
    pub measurements_to_keep: u32,
}

impl DepthSensorConfig {
    /// A configuration set by the user, never the device default.
    pub fn new(measurement_interval_seconds: u32, measurements_to_keep: u32) -> Self {
        Self {
            is_default: false,
            measurement_interval_seconds,
            measurements_to_keep,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_MEASURE_INTERVAL_SECONDS..=MAX_MEASURE_INTERVAL_SECONDS)
            .contains(&self.measurement_interval_seconds)
        {
            return Err(Error::Invalid(format!(
                "Measurement interval must be between {} and {} seconds",
                MIN_MEASURE_INTERVAL_SECONDS, MAX_MEASURE_INTERVAL_SECONDS
            )));
        }
        if !(MIN_MEASUREMENTS_TO_KEEP..=MAX_MEASUREMENTS_TO_KEEP).contains(&self.measurements_to_keep) {
            return Err(Error::Invalid(format!(
                "Measurements to keep must be between {} and {}",
                MIN_MEASUREMENTS_TO_KEEP, MAX_MEASUREMENTS_TO_KEEP
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DepthSensorConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "default: {}", self.is_default)?;
        writeln!(f, "interval: {} seconds", self.measurement_interval_seconds)?;
        write!(f, "measurements to keep: {}", self.measurements_to_keep)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DepthMeasurement {
    #[serde(rename = "measureTime")]
    #[serde(alias = "measurementTime")]
    pub measure_time: i64,
    #[serde(alias = "measurementInCm")]
    pub centimeters: i32,
    #[serde(rename = "retrievedBefore")]
    #[serde(alias = "hasBeenRetrieved")]
    pub retrieved_before: bool,
}

impl DepthMeasurement {
    pub fn local_time(&self) -> String {
        format_local_time(self.measure_time).unwrap_or_else(|| self.measure_time.to_string())
    }
}

impl fmt::Display for DepthMeasurement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "time = {}, centimeters = {}, retrieved before = {}",
            self.local_time(),
            self.centimeters,
            self.retrieved_before
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DepthMeasurementCollection {
    pub measurements: Vec<DepthMeasurement>,
}

/// Batch file for a depth sensor: metadata plus measurement config.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SensorInfraConfiguration {
    pub name: String,
    pub location: String,
    pub config: DepthSensorConfig,
}

impl SensorInfraConfiguration {
    pub fn metadata(&self) -> Metadata {
        Metadata::new(&self.name, &self.location)
    }
}

/// Radio protocol of the RCSwitch library, 1 to 5.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(try_from = "u8", into = "u8")]
pub struct RadioProtocol(u8);

impl RadioProtocol {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn id(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for RadioProtocol {
    type Error = String;

    fn try_from(id: u8) -> std::result::Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&id) {
            Ok(RadioProtocol(id))
        } else {
            Err(format!(
                "radio protocol must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                id
            ))
        }
    }
}

impl From<RadioProtocol> for u8 {
    fn from(protocol: RadioProtocol) -> u8 {
        protocol.0
    }
}

impl fmt::Display for RadioProtocol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RadioPlug {
    pub name: String,
    #[serde(rename = "onCommand")]
    pub on_command: String,
    #[serde(rename = "offCommand")]
    pub off_command: String,
    #[serde(rename = "isTriState")]
    pub is_tri_state: bool,
    pub protocol: RadioProtocol,
    #[serde(rename = "pulseLength")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pulse_length: Option<u32>,
    #[serde(rename = "repeatTransmit")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_transmit: Option<u32>,
}

impl RadioPlug {
    pub fn validate(&self) -> Result<()> {
        check_length("Switch name", &self.name, MAX_SWITCH_NAME_LENGTH)?;
        check_length("On command", &self.on_command, MAX_SWITCH_COMMAND_LENGTH)?;
        check_length("Off command", &self.off_command, MAX_SWITCH_COMMAND_LENGTH)
    }

    /// Parameters of the `updateswitchdata` call, omitting unset timings.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("name", self.name.clone()),
            ("oncommand", self.on_command.clone()),
            ("offcommand", self.off_command.clone()),
            ("istristate", self.is_tri_state.to_string()),
            ("protocol", self.protocol.to_string()),
        ];
        if let Some(pulse_length) = self.pulse_length {
            pairs.push(("pulselength", pulse_length.to_string()));
        }
        if let Some(repeat_transmit) = self.repeat_transmit {
            pairs.push(("repeattransmit", repeat_transmit.to_string()));
        }
        pairs
    }
}

/// Maps an inbound radio code to an MQTT topic and command.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RadioReceive {
    #[serde(rename = "receiveName")]
    pub name: String,
    #[serde(rename = "receiveValue")]
    pub value: String,
    #[serde(rename = "receiveProtocol")]
    pub protocol: RadioProtocol,
    #[serde(rename = "receiveTopic")]
    pub topic: String,
    #[serde(rename = "receiveCommand")]
    pub command: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct MqttSettings {
    #[serde(rename = "mqttServer")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(rename = "mqttPort")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(rename = "mqttUser")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(rename = "mqttPassword")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl MqttSettings {
    pub fn is_empty(&self) -> bool {
        self.server.is_none() && self.port.is_none() && self.user.is_none() && self.password.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// Name, location and plugs without radio timings.
    V1,
    /// Adds plug timings, MQTT settings and receivers.
    V2,
}

/// Full configuration of a radio plug switch.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RadioPlugCollection {
    pub name: String,
    pub location: String,
    #[serde(flatten)]
    pub mqtt: MqttSettings,
    pub plugs: Vec<RadioPlug>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receivers: Vec<RadioReceive>,
}

impl RadioPlugCollection {
    pub fn metadata(&self) -> Metadata {
        Metadata::new(&self.name, &self.location)
    }

    pub fn schema_version(&self) -> SchemaVersion {
        let timed = self
            .plugs
            .iter()
            .any(|plug| plug.pulse_length.is_some() || plug.repeat_transmit.is_some());
        if timed || !self.mqtt.is_empty() || !self.receivers.is_empty() {
            SchemaVersion::V2
        } else {
            SchemaVersion::V1
        }
    }

    pub fn plug(&self, name: &str) -> Option<&RadioPlug> {
        self.plugs.iter().find(|plug| plug.name == name)
    }
}
