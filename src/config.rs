use anyhow::{Context, Result, anyhow};
use dotenvy::dotenv;
use serde::Deserialize;
use std::fs;
use url::Url;

use crate::client::{
    DEFAULT_CHANNEL_ID, DEFAULT_GATEWAY_BASE_URL, DEFAULT_OBS_BASE_URL, DEFAULT_OBS_HOME_BASE_URL,
    Endpoints,
};
use crate::headers::{ClientIdentity, DEFAULT_APPLICATION, DEFAULT_CARRIER, DEFAULT_USER_AGENT};

pub const ENV_PREFIX: &str = "PICT_";

#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    obs_base_url: Option<Url>,
    obs_home_base_url: Option<Url>,
    gateway_base_url: Option<Url>,
    channel_id: Option<String>,
    user_agent: Option<String>,
    application: Option<String>,
    carrier: Option<String>,
    strict_exit: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigEnv {
    obs_base_url: Option<Url>,
    obs_home_base_url: Option<Url>,
    gateway_base_url: Option<Url>,
    channel_id: Option<String>,
    user_agent: Option<String>,
    application: Option<String>,
    carrier: Option<String>,
    strict_exit: Option<bool>,
}

#[derive(Debug)]
pub struct Config {
    pub endpoints: Endpoints,
    pub identity: ClientIdentity,
    pub channel_id: String,
    /// Exit non-zero when a step of the run fails.
    pub strict_exit: bool,
}

fn default_url(raw: &str) -> Result<Url> {
    Url::parse(raw).with_context(|| format!("Invalid built-in URL {raw}"))
}

fn merge_config(base: ConfigFile, override_config: ConfigEnv) -> Result<Config> {
    let endpoints = Endpoints {
        obs: match override_config.obs_base_url.or(base.obs_base_url) {
            Some(url) => url,
            None => default_url(DEFAULT_OBS_BASE_URL)?,
        },
        obs_home: match override_config.obs_home_base_url.or(base.obs_home_base_url) {
            Some(url) => url,
            None => default_url(DEFAULT_OBS_HOME_BASE_URL)?,
        },
        gateway: match override_config.gateway_base_url.or(base.gateway_base_url) {
            Some(url) => url,
            None => default_url(DEFAULT_GATEWAY_BASE_URL)?,
        },
    };

    for url in [&endpoints.obs, &endpoints.obs_home, &endpoints.gateway] {
        if url.cannot_be_a_base() {
            return Err(anyhow!("{url} cannot be used as a base URL"));
        }
    }

    let identity = ClientIdentity {
        user_agent: override_config
            .user_agent
            .or(base.user_agent)
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        application: override_config
            .application
            .or(base.application)
            .unwrap_or_else(|| DEFAULT_APPLICATION.to_string()),
        carrier: override_config
            .carrier
            .or(base.carrier)
            .unwrap_or_else(|| DEFAULT_CARRIER.to_string()),
    };

    let channel_id = override_config
        .channel_id
        .or(base.channel_id)
        .unwrap_or_else(|| DEFAULT_CHANNEL_ID.to_string());

    let strict_exit = override_config
        .strict_exit
        .or(base.strict_exit)
        .unwrap_or(false);

    Ok(Config {
        endpoints,
        identity,
        channel_id,
        strict_exit,
    })
}

pub fn read_config() -> Result<Config> {
    let _ = dotenv();
    let env_config = envy::prefixed(ENV_PREFIX)
        .from_env::<ConfigEnv>()
        .context("Invalid PICT_* environment variable")?;

    let project_dirs = directories::ProjectDirs::from("com", "pict", "pict")
        .ok_or(anyhow!("Unable to determine home directory"))?;
    let config_file = project_dirs.config_dir().join("config.toml");
    let file_config = if let Ok(config) = fs::read_to_string(&config_file) {
        toml::from_str(&config)
            .with_context(|| format!("Failed to parse {}", config_file.display()))?
    } else {
        ConfigFile::default()
    };

    merge_config(file_config, env_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = merge_config(ConfigFile::default(), ConfigEnv::default()).unwrap();

        assert_eq!(config.endpoints.obs.as_str(), "https://obs-sg.line-apps.com/");
        assert_eq!(
            config.endpoints.obs_home.as_str(),
            "https://obs-jp.line-apps.com/"
        );
        assert_eq!(config.endpoints.gateway.as_str(), "https://gd2.line.naver.jp/");
        assert_eq!(config.channel_id, "1341209850");
        assert_eq!(config.identity, ClientIdentity::default());
        assert!(!config.strict_exit);
    }

    #[test]
    fn test_env_overrides_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            obs_base_url = "http://file.example"
            carrier = "file-carrier"
            strict_exit = true
            "#,
        )
        .unwrap();
        let env = ConfigEnv {
            obs_base_url: Some(Url::parse("http://env.example").unwrap()),
            strict_exit: Some(false),
            ..Default::default()
        };

        let config = merge_config(file, env).unwrap();

        assert_eq!(config.endpoints.obs.as_str(), "http://env.example/");
        assert_eq!(config.identity.carrier, "file-carrier");
        assert!(!config.strict_exit);
    }

    #[test]
    fn test_rejects_non_base_url() {
        let env = ConfigEnv {
            gateway_base_url: Some(Url::parse("mailto:ops@example.com").unwrap()),
            ..Default::default()
        };

        assert!(merge_config(ConfigFile::default(), env).is_err());
    }
}
