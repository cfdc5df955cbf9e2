//! Replay JSON configuration files against an asset
//!
//! Calls are issued one at a time in file order and the first failure stops
//! the run. Nothing is rolled back.
use std::{fs, io, path::Path, time::Duration};

use serde::de::DeserializeOwned;

use crate::{
    capabilities::{AssetActions, DepthSensor, RadioSwitch},
    datatypes::{from_json, RadioPlugCollection, SensorInfraConfiguration},
    devices::{DepthSensorAsset, RadioPlugAsset},
    error::{Error, Result},
};

/// Gap between two radio commands so the receivers can tell them apart.
pub const SWITCH_PAUSE: Duration = Duration::from_millis(500);

pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = fs::read_to_string(path).map_err(|err| match err.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound(path.to_path_buf()),
        _ => Error::IO(err),
    })?;
    log::debug!("Configuration to apply: {}", json);
    from_json(&json)
}

/// Store metadata and every plug of the file on the switch.
pub fn apply_configuration(device: &RadioPlugAsset, path: &Path) -> Result<()> {
    log::info!("[Apply config] Applying configuration from file {}...", path.display());
    let config: RadioPlugCollection = load(path)?;

    device.update_info(&config.metadata()).map_err(|err| {
        log::error!("[Apply config] Failed updating metadata, stopping: {}", err);
        err
    })?;

    for (index, plug) in config.plugs.iter().enumerate() {
        if let Err(err) = device.update_switch_data(plug) {
            log::error!(
                "[Apply config] Failed updating switch {} at index {}, stopping: {}",
                plug.name,
                index,
                err
            );
            return Err(err);
        }
    }
    log::info!("[Apply config] Done, {} switches stored.", config.plugs.len());
    Ok(())
}

/// Turn every plug of the file on or off.
///
/// Successive commands are separated by `SWITCH_PAUSE`; no pause follows the
/// last one.
pub fn turn_switches_by_config(device: &RadioPlugAsset, path: &Path, on: bool) -> Result<()> {
    let state = if on { "on" } else { "off" };
    log::info!("[Turn switches {}] Loading {}...", state, path.display());
    let config: RadioPlugCollection = load(path)?;

    for (index, plug) in config.plugs.iter().enumerate() {
        if index > 0 {
            device.raw().pause(SWITCH_PAUSE);
        }
        if let Err(err) = device.switch(&plug.name, on) {
            log::error!(
                "[Turn switches {}] Failed turning switch {} at index {}, stopping: {}",
                state,
                plug.name,
                index,
                err
            );
            return Err(err);
        }
    }
    log::info!("[Turn switches {}] Done.", state);
    Ok(())
}

/// Store metadata, then the measurement config, of a depth sensor file.
pub fn apply_sensor_configuration(device: &DepthSensorAsset, path: &Path) -> Result<()> {
    log::info!("[Apply Configuration] Applying {} to the depth sensor...", path.display());
    let config: SensorInfraConfiguration = load(path)?;

    device.update_info(&config.metadata()).map_err(|err| {
        log::error!("[Apply Configuration] Failed to update the metadata of the sensor: {}", err);
        err
    })?;
    device.update_config(&config.config).map_err(|err| {
        log::error!("[Apply Configuration] Failed to update the configuration of the sensor: {}", err);
        err
    })?;
    log::info!("[Apply Configuration] Done.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{io::Write, path::PathBuf, rc::Rc};

    use tempfile::NamedTempFile;

    use super::*;
    use crate::{
        auth::Credentials,
        datatypes::tests::PLUGS_V2_JSON,
        devices::RawAsset,
        protocol::{RetryPolicy, TransportMock},
    };

    fn raw(transport: &Rc<TransportMock>) -> RawAsset {
        let auth = Credentials::with_token("secret", "token", 1_700_000_000).header();
        RawAsset::with_transport(
            "192.168.99.42",
            &auth,
            RetryPolicy::new(1, Duration::from_secs(5)),
            Box::new(transport.clone()),
        )
    }

    fn config_file(json: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    fn operations(transport: &TransportMock) -> Vec<String> {
        transport
            .requests()
            .iter()
            .map(|r| format!("{} {}", r.operation, r.query.get("name").unwrap_or("")))
            .collect()
    }

    #[test]
    fn apply_configuration_stores_metadata_then_plugs() {
        let transport = Rc::new(TransportMock::new());
        transport
            .push_response(200, "Metadata updated")
            .push_response(200, "Switch data updated")
            .push_response(200, "Switch data updated")
            .push_response(200, "Switch data updated");
        let device = RadioPlugAsset::from_raw(raw(&transport));
        let file = config_file(PLUGS_V2_JSON);

        apply_configuration(&device, file.path()).unwrap();

        assert_eq!(
            vec![
                "updateinfo Pool Switch",
                "updateswitchdata Pump",
                "updateswitchdata Light",
                "updateswitchdata Heater"
            ],
            operations(&transport)
        );
        assert!(transport.pauses().is_empty());
    }

    #[test]
    fn apply_configuration_stops_at_first_failing_plug() {
        let transport = Rc::new(TransportMock::new());
        transport
            .push_response(200, "Metadata updated")
            .push_response(200, "Switch data updated")
            .push_response(500, "Switch data update failed");
        let device = RadioPlugAsset::from_raw(raw(&transport));
        let file = config_file(PLUGS_V2_JSON);

        assert!(apply_configuration(&device, file.path()).is_err());

        // The failing plug was contacted, the third one never was.
        assert_eq!(
            vec!["updateinfo Pool Switch", "updateswitchdata Pump", "updateswitchdata Light"],
            operations(&transport)
        );
    }

    #[test]
    fn apply_configuration_stops_before_sending_an_invalid_plug() {
        let transport = Rc::new(TransportMock::new());
        transport
            .push_response(200, "Metadata updated")
            .push_response(200, "Switch data updated");
        let device = RadioPlugAsset::from_raw(raw(&transport));
        let json = PLUGS_V2_JSON.replace("\"Light\"", &format!("\"{}\"", "L".repeat(65)));
        let file = config_file(&json);

        assert!(matches!(
            apply_configuration(&device, file.path()),
            Err(Error::Invalid(_))
        ));
        assert_eq!(
            vec!["updateinfo Pool Switch", "updateswitchdata Pump"],
            operations(&transport)
        );
    }

    #[test]
    fn apply_configuration_stops_when_metadata_fails() {
        let transport = Rc::new(TransportMock::new());
        transport.push_response(401, "Unauthorized");
        let device = RadioPlugAsset::from_raw(raw(&transport));
        let file = config_file(PLUGS_V2_JSON);

        assert!(apply_configuration(&device, file.path()).is_err());
        assert_eq!(1, transport.requests().len());
    }

    #[test]
    fn missing_file_is_reported_without_device_calls() {
        let transport = Rc::new(TransportMock::new());
        let device = RadioPlugAsset::from_raw(raw(&transport));
        let path = PathBuf::from("/nonexistent/switch-config.json");

        match apply_configuration(&device, &path) {
            Err(Error::FileNotFound(missing)) => assert_eq!(path, missing),
            other => panic!("expected missing file, got {:?}", other),
        }
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn malformed_file_is_reported_without_device_calls() {
        let transport = Rc::new(TransportMock::new());
        let device = RadioPlugAsset::from_raw(raw(&transport));
        let file = config_file(r#"{"name": "Pool Switch", "plugs": []}"#);

        assert!(matches!(
            apply_configuration(&device, file.path()),
            Err(Error::Serde(_))
        ));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn turn_by_config_pauses_between_switches() {
        let transport = Rc::new(TransportMock::new());
        transport
            .push_response(200, "Switch Pump is now ON")
            .push_response(200, "Switch Light is now ON")
            .push_response(200, "Switch Heater is now ON");
        let device = RadioPlugAsset::from_raw(raw(&transport));
        let file = config_file(PLUGS_V2_JSON);

        turn_switches_by_config(&device, file.path(), true).unwrap();

        assert_eq!(
            vec!["switchon Pump", "switchon Light", "switchon Heater"],
            operations(&transport)
        );
        assert_eq!(vec![SWITCH_PAUSE; 2], transport.pauses());
    }

    #[test]
    fn turn_by_config_stops_at_first_failure() {
        let transport = Rc::new(TransportMock::new());
        transport
            .push_response(200, "Switch Pump is now OFF")
            .push_response(404, "Switch Light cannot be found!");
        let device = RadioPlugAsset::from_raw(raw(&transport));
        let file = config_file(PLUGS_V2_JSON);

        assert!(turn_switches_by_config(&device, file.path(), false).is_err());
        assert_eq!(vec!["switchoff Pump", "switchoff Light"], operations(&transport));
        assert_eq!(vec![SWITCH_PAUSE], transport.pauses());
    }

    #[test]
    fn apply_sensor_configuration_updates_info_then_config() {
        let transport = Rc::new(TransportMock::new());
        transport
            .push_response(200, "Metadata updated")
            .push_response(200, r#"{"configStatus": "CONFIG_UPDATED"}"#);
        let device = DepthSensorAsset::from_raw(raw(&transport));
        let file = config_file(
            r#"{"name": "Pool", "location": "Garden",
                "config": {"isDefault": false, "measureIntervalInSeconds": 600, "measurementsToKeep": 200}}"#,
        );

        apply_sensor_configuration(&device, file.path()).unwrap();

        let requests = transport.requests();
        assert_eq!("updateinfo", requests[0].operation);
        assert_eq!("config", requests[1].operation);
        assert_eq!(Some("600"), requests[1].query.get("measurementintervalseconds"));
    }

    #[test]
    fn apply_sensor_configuration_skips_config_when_metadata_fails() {
        let transport = Rc::new(TransportMock::new());
        transport.push_response(500, "Metadata update failed");
        let device = DepthSensorAsset::from_raw(raw(&transport));
        let file = config_file(
            r#"{"name": "Pool", "location": "Garden",
                "config": {"isDefault": false, "measurementIntervalSeconds": 600, "measurementsToKeep": 200}}"#,
        );

        assert!(apply_sensor_configuration(&device, file.path()).is_err());
        assert_eq!(1, transport.requests().len());
    }
}
