use std::{error::Error as StdError, fmt, io};

/// Every failure the client can report, with a message fit for showing to
/// the end user. The three kinds are mutually exclusive: a request either
/// never completed (`Network`), completed but rejected the credentials
/// (`Login`), or completed with a page that didn't contain what the upload
/// flow needs (`Upload`).
#[derive(Clone, Debug)]
pub enum Error {
    Network(String),
    Login(String),
    Upload(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(s) => write!(f, "network error: {s}"),
            Self::Login(s) => write!(f, "login error: {s}"),
            Self::Upload(s) => write!(f, "upload error: {s}"),
        }
    }
}

impl StdError for Error {}

impl From<reqwest::Error> for Error {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Network("timed out".to_string())
        } else {
            Self::Network(format!("failed connecting to the render farm: {value}"))
        }
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Self::Upload(format!("could not read the archive: {value}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
