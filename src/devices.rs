use crate::{
    auth::AuthHeader,
    capabilities::{AssetActions, DepthSensor, RadioSwitch},
    error::Result,
    protocol::{self, HttpTransport, Query, Request, Response, RetryPolicy, Transport, Verb},
};

pub struct RawAsset {
    host: String,
    authorization: String,
    retry: RetryPolicy,
    transport: Box<dyn Transport>,
}

impl RawAsset {
    pub fn new(host: &str, auth: &AuthHeader) -> Self {
        Self::with_transport(host, auth, RetryPolicy::default(), Box::new(HttpTransport::new()))
    }

    pub fn with_transport(
        host: &str,
        auth: &AuthHeader,
        retry: RetryPolicy,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            host: host.to_owned(),
            authorization: auth.to_string(),
            retry,
            transport,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Block between successive device calls.
    pub fn pause(&self, duration: std::time::Duration) {
        self.transport.pause(duration);
    }
}

impl AssetActions for RawAsset {
    fn call(&self, operation: &str, query: Query, verb: Verb) -> Result<Response> {
        let request = Request {
            host: self.host.clone(),
            operation: operation.to_owned(),
            query,
            verb,
            authorization: self.authorization.clone(),
        };
        protocol::call(self.transport.as_ref(), &request, &self.retry)
    }
}

macro_rules! new_asset {
    ( $x:ident ) => {
        pub struct $x {
            raw: RawAsset,
        }

        impl $x {
            pub fn new(host: &str, auth: &AuthHeader) -> Self {
                Self {
                    raw: RawAsset::new(host, auth),
                }
            }

            pub fn from_raw(raw: RawAsset) -> Self {
                Self { raw }
            }

            pub fn with_retry(self, retry: RetryPolicy) -> Self {
                Self {
                    raw: self.raw.with_retry(retry),
                }
            }

            pub fn raw(&self) -> &RawAsset {
                &self.raw
            }
        }

        impl AssetActions for $x {
            fn call(&self, operation: &str, query: Query, verb: Verb) -> Result<Response> {
                self.raw.call(operation, query, verb)
            }
        }
    };
}

new_asset!(DepthSensorAsset);

impl DepthSensor for DepthSensorAsset {}

new_asset!(RadioPlugAsset);

impl RadioSwitch for RadioPlugAsset {}
