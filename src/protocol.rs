use std::{fmt, thread, time::Duration};

use reqwest::{blocking::Client, Method};

use crate::{
    auth::HEADER_AUTHORIZATION,
    error::{Error, Result},
};

#[cfg(test)]
use std::{cell::RefCell, collections::VecDeque, rc::Rc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    fn method(self) -> Method {
        match self {
            Verb::Get => Method::GET,
            Verb::Post => Method::POST,
            Verb::Put => Method::PUT,
            Verb::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        })
    }
}

/// Query string of a request, either pre-built or encoded from pairs.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Raw(String),
    Pairs(Vec<(String, String)>),
}

impl Query {
    pub fn empty() -> Self {
        Query::Raw(String::new())
    }

    pub fn pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: ToString,
        I: IntoIterator<Item = (K, V)>,
    {
        Query::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.to_string()))
                .collect(),
        )
    }

    /// Value of the first pair named `key`; raw queries are not parsed.
    pub fn get(&self, key: &str) -> Option<&str> {
        match self {
            Query::Raw(_) => None,
            Query::Pairs(pairs) => pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Query::Raw(raw) => f.write_str(raw),
            Query::Pairs(pairs) => {
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str("&")?;
                    }
                    write!(
                        f,
                        "{}={}",
                        urlencoding::encode(key),
                        urlencoding::encode(value)
                    )?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub host: String,
    pub operation: String,
    pub query: Query,
    pub verb: Verb,
    pub authorization: String,
}

impl Request {
    pub fn url(&self) -> String {
        format!("http://{}/{}?{}", self.host, self.operation, self.query)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: String,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

pub trait Transport {
    /// Perform a single attempt. Any HTTP status counts as a response.
    fn send(&self, request: &Request) -> Result<Response>;

    /// Block between device calls.
    fn pause(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> HttpTransport {
        HttpTransport {
            client: Client::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Request) -> Result<Response> {
        let response = self
            .client
            .request(request.verb.method(), &request.url())
            .header(HEADER_AUTHORIZATION, request.authorization.as_str())
            .send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(Response { status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    attempts: u32,
    interval: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 15;
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

    pub fn new(attempts: u32, interval: Duration) -> Self {
        RetryPolicy {
            attempts: attempts.max(1),
            interval,
        }
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_INTERVAL)
    }
}

/// Send `request`, retrying transport failures with a fixed interval.
///
/// The devices drop off the WiFi now and then, so connection level errors
/// are retried up to `policy.attempts()` times in total. Any HTTP response,
/// whatever its status, ends the loop.
pub fn call(transport: &dyn Transport, request: &Request, policy: &RetryPolicy) -> Result<Response> {
    log::debug!("[Call Endpoint] Host: {}", request.host);
    log::debug!("[Call Endpoint] Operation: {} {}", request.verb, request.operation);
    log::debug!("[Call Endpoint] Query string: {}", request.query);

    let mut attempt = 1;
    loop {
        match transport.send(request) {
            Ok(response) => {
                log::debug!("[Call Endpoint] Response status code: {}", response.status);
                return Ok(response);
            }
            Err(err) if err.is_transport() && attempt < policy.attempts() => {
                log::warn!(
                    "Request failed ({}/{}): {}. Retrying in {} seconds...",
                    attempt,
                    policy.attempts(),
                    err,
                    policy.interval().as_secs_f32()
                );
                transport.pause(policy.interval());
                attempt += 1;
            }
            Err(err) => {
                if err.is_transport() {
                    log::warn!("Max retries reached. Giving up.");
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
pub struct TransportMock {
    requests: RefCell<Vec<Request>>,
    pauses: RefCell<Vec<Duration>>,
    responses: RefCell<VecDeque<Result<Response>>>,
}

#[cfg(test)]
impl TransportMock {
    pub fn new() -> TransportMock {
        TransportMock {
            requests: RefCell::new(vec![]),
            pauses: RefCell::new(vec![]),
            responses: RefCell::new(VecDeque::new()),
        }
    }

    pub fn push_response(&self, status: u16, body: &str) -> &Self {
        self.responses.borrow_mut().push_back(Ok(Response {
            status,
            body: body.to_owned(),
        }));
        self
    }

    pub fn push_failure(&self) -> &Self {
        let err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        self.responses.borrow_mut().push_back(Err(Error::transport(err)));
        self
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.borrow().clone()
    }
}

#[cfg(test)]
impl Transport for TransportMock {
    fn send(&self, request: &Request) -> Result<Response> {
        self.requests.borrow_mut().push(request.clone());
        // An unscripted call behaves like a device that is switched off.
        self.responses.borrow_mut().pop_front().unwrap_or_else(|| {
            Err(Error::transport(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "no scripted response",
            )))
        })
    }

    fn pause(&self, duration: Duration) {
        self.pauses.borrow_mut().push(duration);
    }
}

// Lets a test keep a handle on the mock it boxes into a device.
#[cfg(test)]
impl Transport for Rc<TransportMock> {
    fn send(&self, request: &Request) -> Result<Response> {
        self.as_ref().send(request)
    }

    fn pause(&self, duration: Duration) {
        self.as_ref().pause(duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        Request {
            host: String::from("192.168.99.42"),
            operation: String::from("info"),
            query: Query::empty(),
            verb: Verb::Get,
            authorization: String::from("1|token|sig"),
        }
    }

    #[test]
    fn url_encodes_query_pairs() {
        let mut req = request();
        req.operation = String::from("updateinfo");
        req.query = Query::pairs(vec![("name", "Pool Sensor"), ("location", "Garden & Pool")]);

        assert_eq!(
            "http://192.168.99.42/updateinfo?name=Pool%20Sensor&location=Garden%20%26%20Pool",
            req.url()
        );
        assert_eq!(Some("Pool Sensor"), req.query.get("name"));
    }

    #[test]
    fn url_keeps_raw_query() {
        let mut req = request();
        req.query = Query::Raw(String::from("name=Pump"));
        assert_eq!("http://192.168.99.42/info?name=Pump", req.url());
        assert_eq!("http://192.168.99.42/info?", request().url());
    }

    #[test]
    fn call_retries_until_success() {
        let transport = TransportMock::new();
        transport.push_failure().push_failure().push_response(200, "ok");
        let policy = RetryPolicy::new(3, Duration::from_secs(5));

        let response = call(&transport, &request(), &policy).unwrap();

        assert_eq!(200, response.status);
        assert_eq!(3, transport.requests().len());
        assert_eq!(vec![Duration::from_secs(5); 2], transport.pauses());
    }

    #[test]
    fn call_gives_up_after_exactly_max_attempts() {
        let transport = TransportMock::new();
        transport
            .push_failure()
            .push_failure()
            .push_failure()
            .push_response(200, "too late");
        let policy = RetryPolicy::new(3, Duration::from_secs(5));

        let err = call(&transport, &request(), &policy).unwrap_err();

        assert!(err.is_transport());
        assert_eq!(3, transport.requests().len());
        assert_eq!(2, transport.pauses().len());
    }

    #[test]
    fn call_returns_http_errors_without_retry() {
        let transport = TransportMock::new();
        transport.push_response(401, "Unauthorized").push_response(200, "ok");

        let response = call(&transport, &request(), &RetryPolicy::default()).unwrap();

        assert_eq!(401, response.status);
        assert_eq!(1, transport.requests().len());
        assert!(transport.pauses().is_empty());
    }

    // Answers one request with a canned 404 and hands back what it read.
    fn serve_once(listener: std::net::TcpListener) -> std::thread::JoinHandle<String> {
        use std::io::{Read, Write};

        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut received = Vec::new();
            let mut buf = [0_u8; 1024];
            while !received.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                received.extend_from_slice(&buf[..n]);
            }
            stream
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\nConnection: close\r\n\r\nnot found")
                .unwrap();
            String::from_utf8_lossy(&received).into_owned()
        })
    }

    #[test]
    fn http_transport_returns_error_status_as_response() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let host = listener.local_addr().unwrap().to_string();
        let server = serve_once(listener);
        let req = Request {
            host,
            operation: String::from("switchon"),
            query: Query::pairs(vec![("name", "Pump")]),
            verb: Verb::Put,
            authorization: String::from("1|t|s"),
        };

        let response = call(&HttpTransport::new(), &req, &RetryPolicy::default()).unwrap();

        assert_eq!(404, response.status);
        assert_eq!("not found", response.body);
        let received = server.join().unwrap();
        assert!(received.starts_with("PUT /switchon?name=Pump HTTP/1.1\r\n"));
        assert!(received.to_ascii_lowercase().contains("\r\nauthorization: 1|t|s\r\n"));
    }

    #[test]
    fn http_transport_connection_failure_is_transport_error() {
        let mut req = request();
        req.host = String::from("127.0.0.1:1");

        let err = HttpTransport::new().send(&req).unwrap_err();

        assert!(err.is_transport());
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let transport = TransportMock::new();
        transport.push_response(200, "ok");

        assert!(call(&transport, &request(), &RetryPolicy::new(0, Duration::from_secs(1))).is_ok());
        assert_eq!(1, transport.requests().len());
    }
}
