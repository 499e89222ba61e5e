// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use verdant_app::DEFAULT_TERMS_SCOPE;

const CONFIG_VERSION: i64 = 1;
pub const CONFIG_PATH_ENV: &str = "VERDANT_CONFIG_PATH";
const DEFAULT_REMOTE_TIMEOUT: &str = "10s";
const DEFAULT_CHAT_BASE_URL: &str = "http://localhost:5050";
const DEFAULT_CHAT_TIMEOUT: &str = "30s";
const DEFAULT_IMAGE_BUCKET: &str = "remedies";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub remote: Remote,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub chat: Chat,
    #[serde(default)]
    pub terms: Terms,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            remote: Remote::default(),
            storage: Storage::default(),
            chat: Chat::default(),
            terms: Terms::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Remote {
    pub url: Option<String>,
    pub api_key: Option<String>,
    pub access_token: Option<String>,
    pub timeout: Option<String>,
    pub image_bucket: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Storage {
    pub db_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Chat {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_CHAT_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_CHAT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Terms {
    pub scope: Option<String>,
}

impl Default for Terms {
    fn default() -> Self {
        Self {
            scope: Some(DEFAULT_TERMS_SCOPE.to_owned()),
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;

        Ok(config_root.join(verdant_db::APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and put values under [remote], [storage], [chat], and [terms]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(db_path) = &self.storage.db_path {
            verdant_db::validate_db_path(db_path)?;
        }

        if let Some(url) = &self.remote.url {
            url::Url::parse(url.trim())
                .with_context(|| format!("remote.url in {} is not a valid URL", path.display()))?;
        }

        for (key, value) in [
            ("remote.timeout", &self.remote.timeout),
            ("chat.timeout", &self.chat.timeout),
        ] {
            let Some(raw) = value else {
                continue;
            };
            let parsed = parse_duration(raw)
                .with_context(|| format!("{key} in {}", path.display()))?;
            if parsed <= Duration::ZERO {
                bail!("{key} in {} must be positive, got {raw}", path.display());
            }
        }

        if let Some(scope) = &self.terms.scope
            && scope.trim().is_empty()
        {
            bail!("terms.scope in {} must not be blank", path.display());
        }

        Ok(())
    }

    pub fn db_path(&self) -> Result<PathBuf> {
        match &self.storage.db_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => verdant_db::default_db_path(),
        }
    }

    /// The backend URL, or an error naming the missing key.
    pub fn remote_url(&self) -> Result<&str> {
        self.remote
            .url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(|url| url.trim_end_matches('/'))
            .ok_or_else(|| anyhow!("[remote].url is not set; add it to your config file"))
    }

    pub fn remote_api_key(&self) -> Result<&str> {
        self.remote
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or_else(|| anyhow!("[remote].api_key is not set; add it to your config file"))
    }

    pub fn remote_access_token(&self) -> Option<&str> {
        self.remote.access_token.as_deref()
    }

    pub fn remote_timeout(&self) -> Result<Duration> {
        parse_duration(
            self.remote
                .timeout
                .as_deref()
                .unwrap_or(DEFAULT_REMOTE_TIMEOUT),
        )
    }

    pub fn image_bucket(&self) -> &str {
        self.remote
            .image_bucket
            .as_deref()
            .unwrap_or(DEFAULT_IMAGE_BUCKET)
    }

    pub fn chat_base_url(&self) -> &str {
        self.chat
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_CHAT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn chat_timeout(&self) -> Result<Duration> {
        parse_duration(self.chat.timeout.as_deref().unwrap_or(DEFAULT_CHAT_TIMEOUT))
    }

    pub fn terms_scope(&self) -> &str {
        self.terms
            .scope
            .as_deref()
            .map(str::trim)
            .unwrap_or(DEFAULT_TERMS_SCOPE)
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# verdant config\n# Place this file at: {}\n\nversion = 1\n\n[remote]\n# Project URL and anon key of the hosted backend.\nurl = \"https://your-project.supabase.co\"\napi_key = \"your-anon-key\"\n# Optional. Signed-in session token; acceptance is then recorded for the user.\n# access_token = \"\"\ntimeout = \"{}\"\nimage_bucket = \"{}\"\n\n[storage]\n# Optional. Default is platform data dir (for example ~/.local/share/verdant/verdant.db)\n# db_path = \"/absolute/path/to/verdant.db\"\n\n[chat]\nbase_url = \"{}\"\ntimeout = \"{}\"\n\n[terms]\nscope = \"{}\"\n",
            path.display(),
            DEFAULT_REMOTE_TIMEOUT,
            DEFAULT_IMAGE_BUCKET,
            DEFAULT_CHAT_BASE_URL,
            DEFAULT_CHAT_TIMEOUT,
            DEFAULT_TERMS_SCOPE,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}
