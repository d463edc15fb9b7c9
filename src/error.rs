// This file is part of TRINCI.
//
// Copyright (C) 2021 Affidaty Spa.
//
// TRINCI is free software: you can redistribute it and/or modify it under
// the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, either version 3 of the License, or (at your
// option) any later version.
//
// TRINCI is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License
// for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with TRINCI. If not, see <https://www.gnu.org/licenses/>.

//! Library error codes and results.

use crate::base::schema::Status;
use std::fmt::{Display, Formatter};

/// Project-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Max string length when the error is converted to string using `to_string_full`.
const MAX_ERROR_SOURCE_STRING_LENGTH: usize = 128;

/// Error kind to better contextualize the returned error.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ErrorKind {
    /// Envelope, payload or header that cannot be decoded.
    MalformedData,
    /// Stream closed or transport failure.
    BadNetwork,
    /// The local signer was not able to produce a signed request.
    SigningFault,
    /// The persistence sink refused a write.
    DatabaseFault,
    /// The ordering service answered with a non-success status.
    UnexpectedStatus,
    ResourceNotFound,
    Other,
}

/// Error kind strings.
pub(super) mod error_kind_str {
    pub const MALFORMED_DATA: &str = "malformed data";
    pub const BAD_NETWORK: &str = "bad network";
    pub const SIGNING_FAULT: &str = "signing fault";
    pub const DATABASE_FAULT: &str = "database fault";
    pub const UNEXPECTED_STATUS: &str = "unexpected status";
    pub const RESOURCE_NOT_FOUND: &str = "resource not found";
    pub const OTHER: &str = "other";
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        use ErrorKind::*;
        let kind_str = match self {
            MalformedData => error_kind_str::MALFORMED_DATA,
            BadNetwork => error_kind_str::BAD_NETWORK,
            SigningFault => error_kind_str::SIGNING_FAULT,
            DatabaseFault => error_kind_str::DATABASE_FAULT,
            UnexpectedStatus => error_kind_str::UNEXPECTED_STATUS,
            ResourceNotFound => error_kind_str::RESOURCE_NOT_FOUND,
            Other => error_kind_str::OTHER,
        };
        write!(f, "{}", kind_str)
    }
}

/// Source attached to `UnexpectedStatus` errors.
/// Carries the status returned by the ordering service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusError {
    pub status: Status,
    pub info: String,
}

impl std::error::Error for StatusError {}

impl Display for StatusError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.info.is_empty() {
            write!(f, "catch unexpected status: {:?}", self.status)
        } else {
            write!(
                f,
                "catch unexpected status: {:?} ({})",
                self.status, self.info
            )
        }
    }
}

/// Project-wide error type.
/// Contains a kind enumerate and a `source` to identify the subsystem that may
/// have propageted the error.
#[derive(Debug)]
pub struct Error {
    /// Error kind.
    pub kind: ErrorKind,
    /// Optional underlying error.
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl Clone for Error {
    fn clone(&self) -> Self {
        Error {
            kind: self.kind,
            source: None,
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error::new(kind)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::new_ext(ErrorKind::Other, s)
    }
}

impl<T> From<ErrorKind> for Result<T> {
    fn from(kind: ErrorKind) -> Self {
        Err(kind.into())
    }
}

impl Error {
    pub fn new_ext<E>(kind: ErrorKind, error: E) -> Error
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let source = error.into();
        Error {
            kind,
            source: Some(source),
        }
    }

    pub fn new(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    /// Build an `UnexpectedStatus` error carrying the remote status.
    pub fn unexpected_status(status: Status, info: impl Into<String>) -> Error {
        Error::new_ext(
            ErrorKind::UnexpectedStatus,
            StatusError {
                status,
                info: info.into(),
            },
        )
    }

    /// Status returned by the ordering service, if this error carries one.
    pub fn status(&self) -> Option<Status> {
        self.source
            .as_ref()
            .and_then(|source| source.downcast_ref::<StatusError>())
            .map(|err| err.status)
    }

    pub fn to_string_full(&self) -> String {
        let mut err_string = self.to_string();
        if let Some(ref source) = self.source {
            let detail = format!(": {}", source);
            let mut max_len = std::cmp::min(detail.len(), MAX_ERROR_SOURCE_STRING_LENGTH);
            while !detail.is_char_boundary(max_len) {
                max_len -= 1;
            }
            err_string.push_str(&detail[..max_len]);
        }
        err_string
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match (&self.source, &other.source) {
            (None, None) => true,
            (Some(s1), Some(s2)) => s1.to_string() == s2.to_string(),
            _ => false,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.source {
            None => None,
            Some(ref source) => Some(source.as_ref()),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}
