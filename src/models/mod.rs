//! Request and response shapes for the HTTP surface

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod auth;
pub mod user;

pub use auth::*;
pub use user::*;

/// `RetCode` for a fully successful action
pub const RET_OK: u16 = 0;

/// `RetCode` for an action that succeeded only in part
pub const RET_PARTIAL: u16 = 206;

/// Action endpoint request, before dispatch
#[derive(Debug, Deserialize)]
pub struct ActionRequest {
    #[serde(rename = "Action", default)]
    pub action: String,

    #[serde(rename = "RequestUUID", default)]
    pub request_uuid: Option<String>,

    /// Everything else, decoded later into the action's typed request
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

/// Action endpoint response envelope
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    #[serde(rename = "Action")]
    pub action: String,

    #[serde(rename = "RequestUUID")]
    pub request_uuid: String,

    #[serde(rename = "RetCode")]
    pub ret_code: u16,

    #[serde(rename = "Message")]
    pub message: String,

    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl ActionResponse {
    pub fn new(action: impl Into<String>, request_uuid: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            request_uuid: request_uuid.into(),
            ret_code: RET_OK,
            message: String::new(),
            data: Map::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_ret_code(mut self, ret_code: u16) -> Self {
        self.ret_code = ret_code;
        self
    }

    /// Merge the fields of `data`, which must serialize to a JSON object.
    pub fn with_data<T: Serialize>(mut self, data: &T) -> Result<Self, serde_json::Error> {
        if let Value::Object(fields) = serde_json::to_value(data)? {
            self.data.extend(fields);
        }
        Ok(self)
    }
}

/// Health check body
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub store: String,
}
