//! Error types
use serde_json;
use std::{convert::From, error, fmt, io, path::PathBuf, result};

#[derive(Debug)]
pub enum Error {
    /// The device could not be reached. This is the only retried failure.
    Transport(Box<dyn error::Error + Send + Sync>),
    Http(HttpFailure),
    Serde(serde_json::Error),
    FileNotFound(PathBuf),
    IO(io::Error),
    Invalid(String),
}

impl Error {
    pub fn transport<E>(error: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        Error::Transport(error.into())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Transport(err) => write!(f, "Error connecting to the device: {}", err),
            Error::Http(err) => write!(f, "Device rejected the request: {}", err),
            Error::Serde(err) => write!(f, "Malformed document: {}", err),
            Error::FileNotFound(path) => write!(f, "The file {} does not exist", path.display()),
            Error::IO(err) => write!(f, "I/O error: {}", err),
            Error::Invalid(err) => f.write_str(err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err.as_ref()),
            Error::Http(err) => Some(err),
            Error::Serde(err) => Some(err),
            Error::IO(err) => Some(err),
            Error::FileNotFound(_) | Error::Invalid(_) => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        Error::Transport(Box::new(error))
    }
}

impl From<io::Error> for Error {
    fn from(error: io::Error) -> Self {
        Error::IO(error)
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Serde(error)
    }
}

impl From<HttpFailure> for Error {
    fn from(error: HttpFailure) -> Self {
        Error::Http(error)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// A response the device answered with anything other than `200 OK`.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpFailure {
    pub status: u16,
    pub body: String,
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.body.trim().is_empty() {
            write!(f, "status {}", self.status)
        } else {
            write!(f, "status {}: {}", self.status, self.body.trim())
        }
    }
}

impl error::Error for HttpFailure {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_transport() {
        let io = io::Error::new(io::ErrorKind::ConnectionReset, "reset");
        assert!(Error::transport(io).is_transport());
        assert!(!Error::from(HttpFailure { status: 401, body: String::from("Unauthorized") })
            .is_transport());
        assert!(!Error::Invalid(String::from("bad")).is_transport());
    }

    #[test]
    fn http_failure_display_includes_body() {
        let err = Error::from(HttpFailure {
            status: 404,
            body: String::from("Switch Pump cannot be found!\n"),
        });
        assert_eq!(
            "Device rejected the request: status 404: Switch Pump cannot be found!",
            err.to_string()
        );
    }
}
