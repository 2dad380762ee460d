use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};

use crate::error::{PictError, Result};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 10; SM-A705MN Build/QP1A.190711.020; wv) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/89.0.4389.90 Mobile Safari/537.36 (Mobile; afma-sdk-a-v212104999.12451000.1)";
pub const DEFAULT_APPLICATION: &str = "ANDROID\t11.11.1\tAndroid OS\t11.0.1";
pub const DEFAULT_CARRIER: &str = "51089, 1-0";

const X_LINE_APPLICATION: HeaderName = HeaderName::from_static("x-line-application");
const X_LINE_ACCESS: HeaderName = HeaderName::from_static("x-line-access");
const X_LINE_MID: HeaderName = HeaderName::from_static("x-line-mid");
const X_LINE_CARRIER: HeaderName = HeaderName::from_static("x-line-carrier");
const X_LINE_CHANNEL_TOKEN: HeaderName = HeaderName::from_static("x-line-channeltoken");

/// The mobile client the requests present themselves as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_agent: String,
    pub application: String,
    pub carrier: String,
}

impl Default for ClientIdentity {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            application: DEFAULT_APPLICATION.to_string(),
            carrier: DEFAULT_CARRIER.to_string(),
        }
    }
}

fn value(name: &HeaderName, raw: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(raw)
        .map_err(|_| PictError::InvalidArgument(format!("invalid value for header {name}")))
}

impl ClientIdentity {
    fn base(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, value(&USER_AGENT, &self.user_agent)?);
        headers.insert(
            X_LINE_APPLICATION,
            value(&X_LINE_APPLICATION, &self.application)?,
        );
        Ok(headers)
    }

    /// Headers for talk and OBS endpoints authenticated by the access token.
    pub fn access_headers(&self, access_token: &str) -> Result<HeaderMap> {
        let mut headers = self.base()?;
        headers.insert(X_LINE_ACCESS, value(&X_LINE_ACCESS, access_token)?);
        Ok(headers)
    }

    /// Headers for home/timeline endpoints authenticated by a channel token.
    pub fn channel_headers(&self, mid: &str, channel_token: &str) -> Result<HeaderMap> {
        let mut headers = self.base()?;
        headers.insert(X_LINE_MID, value(&X_LINE_MID, mid)?);
        headers.insert(X_LINE_CARRIER, value(&X_LINE_CARRIER, &self.carrier)?);
        headers.insert(
            X_LINE_CHANNEL_TOKEN,
            value(&X_LINE_CHANNEL_TOKEN, channel_token)?,
        );
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_headers() {
        let headers = ClientIdentity::default().access_headers("T").unwrap();

        assert_eq!(headers.len(), 3);
        assert_eq!(headers["x-line-access"], "T");
        assert_eq!(headers["user-agent"], DEFAULT_USER_AGENT);
        assert_eq!(
            headers["x-line-application"],
            "ANDROID\t11.11.1\tAndroid OS\t11.0.1"
        );
    }

    #[test]
    fn test_channel_headers() {
        let headers = ClientIdentity::default()
            .channel_headers("M123", "chan")
            .unwrap();

        assert_eq!(headers["x-line-mid"], "M123");
        assert_eq!(headers["x-line-carrier"], "51089, 1-0");
        assert_eq!(headers["x-line-channeltoken"], "chan");
        assert!(headers.get("x-line-access").is_none());
    }

    #[test]
    fn test_rejects_token_with_newline() {
        let err = ClientIdentity::default()
            .access_headers("bad\ntoken")
            .unwrap_err();

        assert!(matches!(err, PictError::InvalidArgument(_)));
    }
}
