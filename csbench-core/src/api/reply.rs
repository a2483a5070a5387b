use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::ApiError;
use crate::pagination::Page;

/// The object wrapped by the single top-level key of an API response.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    key: String,
    body: Map<String, Value>,
}

impl Reply {
    /// Top-level key, e.g. `listzonesresponse`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The `count` field; `0` when the server omitted it (empty listings do).
    pub fn count(&self) -> u64 {
        self.body.get("count").and_then(Value::as_u64).unwrap_or(0)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.body.get(field)
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.body.get(field).and_then(Value::as_str)
    }

    /// Deserializes `field` into `T`.
    pub fn take<T: DeserializeOwned>(&self, field: &str) -> Result<T, ApiError> {
        let value = self
            .body
            .get(field)
            .ok_or_else(|| ApiError::Malformed(format!("`{}` has no `{field}`", self.key)))?;
        serde_json::from_value(value.clone())
            .map_err(|e| ApiError::Malformed(format!("`{}.{field}`: {e}", self.key)))
    }

    /// Items under `field` plus the reported total.
    pub fn page<T: DeserializeOwned>(&self, field: &str) -> Result<Page<T>, ApiError> {
        let items: Vec<T> = match self.body.get(field) {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ApiError::Malformed(format!("`{}.{field}`: {e}", self.key)))?,
            None => Vec::new(),
        };
        let total = match self.body.get("count").and_then(Value::as_u64) {
            Some(count) => count,
            None => items.len() as u64,
        };
        Ok(Page { items, total })
    }
}

/// Classifies a raw HTTP response.
///
/// An `errorcode` inside the wrapped object wins over the HTTP status so the remote text is
/// preserved; a non-2xx status without one is reported as [`ApiError::Status`].
pub fn parse(status: u16, body: &[u8]) -> Result<Reply, ApiError> {
    let success = (200..300).contains(&status);

    let value: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(_) if !success => return Err(ApiError::Status { status }),
        Err(e) => return Err(ApiError::Malformed(format!("response is not JSON: {e}"))),
    };

    let Value::Object(top) = value else {
        return Err(ApiError::Malformed(
            "response is not a JSON object".to_string(),
        ));
    };
    let Some((key, inner)) = top.into_iter().next() else {
        return Err(ApiError::Malformed("response object is empty".to_string()));
    };
    let Value::Object(body) = inner else {
        return Err(ApiError::Malformed(format!("`{key}` is not an object")));
    };

    if let Some(code) = body.get("errorcode") {
        return Err(ApiError::Remote {
            code: code.as_i64().unwrap_or_default(),
            text: body
                .get("errortext")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }
    if !success {
        return Err(ApiError::Status { status });
    }

    Ok(Reply { key, body })
}
