use std::str::FromStr;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::{Map, Value};

use crate::error::{PictError, Result};
use crate::files;

pub type JsObject = Map<String, Value>;

const DEFAULT_VERSION: &str = "1.0";

/// How a finished parameter blob is handed to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamsFormat {
    #[default]
    Json,
    Base64,
    Map,
}

impl FromStr for ParamsFormat {
    type Err = PictError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(ParamsFormat::Json),
            "b64" => Ok(ParamsFormat::Base64),
            "default" => Ok(ParamsFormat::Map),
            other => Err(PictError::InvalidArgument(format!(
                "unknown params format '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EncodedParams {
    Json(String),
    Base64(String),
    Map(JsObject),
}

/// Upload metadata sent alongside OBS uploads, either as the `params` form
/// field or the `x-obs-params` header.
#[derive(Debug, Clone, PartialEq)]
pub struct ObsParams(JsObject);

impl ObsParams {
    /// Merges `overrides` onto `{name: <generated>, ver: "1.0"}`.
    ///
    /// A numeric `range` of `N` bytes is rewritten to `bytes 0-<N-1>/<N>`;
    /// this framing is what the upload backend expects and is not configurable.
    pub fn new(overrides: JsObject) -> Result<Self> {
        let mut params = JsObject::new();
        params.insert("name".to_string(), Value::from(files::temp_file_name()));
        params.insert("ver".to_string(), Value::from(DEFAULT_VERSION));
        params.extend(overrides);

        let range = match params.get("range") {
            Some(Value::Number(range)) => Some(range.clone()),
            _ => None,
        };
        if let Some(range) = range {
            let total = range
                .as_u64()
                .filter(|total| *total > 0)
                .ok_or_else(|| {
                    PictError::InvalidArgument(format!(
                        "range must be a positive byte count, got {range}"
                    ))
                })?;
            params.insert(
                "range".to_string(),
                Value::from(format!("bytes 0-{}/{}", total - 1, total)),
            );
        }

        Ok(Self(params))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.0)?)
    }

    pub fn to_base64(&self) -> Result<String> {
        Ok(STANDARD.encode(self.to_json()?))
    }

    pub fn into_map(self) -> JsObject {
        self.0
    }

    pub fn encode(self, format: ParamsFormat) -> Result<EncodedParams> {
        match format {
            ParamsFormat::Json => Ok(EncodedParams::Json(self.to_json()?)),
            ParamsFormat::Base64 => Ok(EncodedParams::Base64(self.to_base64()?)),
            ParamsFormat::Map => Ok(EncodedParams::Map(self.into_map())),
        }
    }
}

/// Builds a [`JsObject`] from string pairs, the shape most callers need.
pub fn object<K, V, I>(pairs: I) -> JsObject
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}
