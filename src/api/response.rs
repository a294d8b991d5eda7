use std::fmt;

use bytes::Bytes;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Status code and raw body of one call against the service.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub method: Method,
    pub url: Url,
    pub status: StatusCode,
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expected {
    Status(StatusCode),
    /// A non-2xx status, or a 2xx with an empty body.
    Absent,
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::Status(code) => write!(f, "{code}"),
            Expected::Absent => f.write_str("404 or an empty body"),
        }
    }
}

/// A call came back with a status the probe did not expect.
#[derive(Debug, Error)]
#[error("{method} {url}: expected {expected}, but got {actual} {body}")]
pub struct StatusMismatch {
    pub method: Method,
    pub url: Url,
    pub expected: Expected,
    pub actual: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    pub fn expect_status(self, expected: StatusCode) -> Result<ApiResponse, StatusMismatch> {
        if self.status == expected {
            Ok(self)
        } else {
            Err(self.mismatch(Expected::Status(expected)))
        }
    }

    pub fn expect_ok(self) -> Result<ApiResponse, StatusMismatch> {
        self.expect_status(StatusCode::OK)
    }

    /// A read of a resource that does not exist: either an error status, or a success whose
    /// body is blank, `null`, `[]` or `{}`.
    pub fn is_absent(&self) -> bool {
        if !self.status.is_success() {
            return true;
        }

        match serde_json::from_slice::<Value>(&self.body) {
            Ok(Value::Null) => true,
            Ok(Value::Array(items)) => items.is_empty(),
            Ok(Value::Object(fields)) => fields.is_empty(),
            Ok(_) => false,
            Err(_) => self.body.iter().all(u8::is_ascii_whitespace),
        }
    }

    /// For steps that must observe a deleted resource.
    pub fn expect_absent(self) -> Result<ApiResponse, StatusMismatch> {
        if self.is_absent() {
            Ok(self)
        } else {
            Err(self.mismatch(Expected::Absent))
        }
    }

    fn mismatch(&self, expected: Expected) -> StatusMismatch {
        StatusMismatch {
            method: self.method.clone(),
            url: self.url.clone(),
            expected,
            actual: self.status,
            body: self.text(),
        }
    }
}

/// The `{"code", "message"}` envelope the service wraps plain replies and errors in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceStatus {
    pub fn of(code: StatusCode, message: impl Into<String>) -> ServiceStatus {
        ServiceStatus {
            code: code.as_u16(),
            message: Some(message.into()),
            error: None,
        }
    }
}
