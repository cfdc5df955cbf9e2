use crate::{
    datatypes::{
        from_json, DepthMeasurementCollection, DepthSensorConfig, DeviceInfo, Metadata, RadioPlug,
    },
    error::{HttpFailure, Result},
    protocol::{Query, Response, Verb},
};

pub trait AssetActions {
    /// Call an operation on the asset and return its raw response
    fn call(&self, operation: &str, query: Query, verb: Verb) -> Result<Response>;

    /// Like `call`, but anything other than `200 OK` is an error.
    fn call_ok(&self, operation: &str, query: Query, verb: Verb) -> Result<String> {
        let response = self.call(operation, query, verb)?;
        log::debug!("Response body: {}", response.body);
        if response.is_ok() {
            Ok(response.body)
        } else {
            Err(HttpFailure {
                status: response.status,
                body: response.body,
            }
            .into())
        }
    }

    fn info(&self) -> Result<DeviceInfo> {
        log::debug!("[Metadata] Getting metadata from the asset...");
        let body = self.call_ok("info", Query::empty(), Verb::Get)?;
        Ok(DeviceInfo::parse(&body))
    }

    fn update_info(&self, metadata: &Metadata) -> Result<String> {
        log::debug!("[Metadata Update] Setting sensor name and location...");
        metadata.validate()?;
        let query = Query::pairs(vec![
            ("name", metadata.name.as_str()),
            ("location", metadata.location.as_str()),
        ]);
        self.call_ok("updateinfo", query, Verb::Put)
    }

    /// Set the device clock. `local_epoch` is the caller's local wall clock
    /// in seconds; the device answers with the time it now holds.
    fn set_time(&self, local_epoch: i64) -> Result<Option<i64>> {
        log::debug!("[Set Time] Setting device time to {}...", local_epoch);
        let body = self.call_ok("time", Query::pairs(vec![("time", local_epoch)]), Verb::Put)?;
        Ok(body.trim().parse::<f64>().ok().map(|time| time as i64))
    }
}

pub trait DepthSensor: AssetActions {
    fn config(&self) -> Result<DepthSensorConfig> {
        log::debug!("[Depth Config] Getting depth sensor configuration...");
        from_json(&self.call_ok("config", Query::empty(), Verb::Get)?)
    }

    fn update_config(&self, config: &DepthSensorConfig) -> Result<String> {
        log::debug!("[Depth Config Update] Updating depth sensor configuration...");
        config.validate()?;
        let query = Query::pairs(vec![
            ("measurementintervalseconds", config.measurement_interval_seconds),
            ("measurementstokeep", config.measurements_to_keep),
        ]);
        self.call_ok("config", query, Verb::Put)
    }

    fn measurements(&self) -> Result<DepthMeasurementCollection> {
        log::debug!("[Depth Measurements] Getting depth sensor measurements...");
        from_json(&self.call_ok("measurements", Query::empty(), Verb::Get)?)
    }

    fn purge_measurements(&self) -> Result<String> {
        log::debug!("[Depth Measurements Purge] Purging depth sensor measurements...");
        self.call_ok("measurements", Query::empty(), Verb::Delete)
    }
}

pub trait RadioSwitch: AssetActions {
    /// Register a plug, or replace the codes of an existing one.
    fn update_switch_data(&self, plug: &RadioPlug) -> Result<String> {
        log::debug!("[Save Switch] Storing switch data for {}...", plug.name);
        plug.validate()?;
        self.call_ok("updateswitchdata", Query::pairs(plug.query_pairs()), Verb::Put)
    }

    fn switch_on(&self, name: &str) -> Result<String> {
        self.switch(name, true)
    }

    fn switch_off(&self, name: &str) -> Result<String> {
        self.switch(name, false)
    }

    fn switch(&self, name: &str, on: bool) -> Result<String> {
        log::debug!("[Switch On/Off] Turning switch {} {}...", name, if on { "on" } else { "off" });
        let operation = if on { "switchon" } else { "switchoff" };
        self.call_ok(operation, Query::pairs(vec![("name", name)]), Verb::Put)
    }
}
