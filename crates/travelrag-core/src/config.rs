//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys are addressed from the environment with a double underscore,
//! e.g. `APP_RETRIEVAL__SCORE_THRESHOLD=0.4`.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::env;
use std::path::{Path, PathBuf};

use crate::settings::Settings;

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

/// Directory holding the nearest `config.toml`, searching upwards from the
/// working directory; the working directory itself when there is none.
pub fn find_base_dir() -> PathBuf {
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    cwd.ancestors()
        .find(|dir| dir.join("config.toml").is_file())
        .map(Path::to_path_buf)
        .unwrap_or(cwd)
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let base_dir = find_base_dir();

        let mut figment = Figment::new().merge(Toml::file(base_dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Self::from_figment_with_base(figment, base_dir)
    }

    /// Wrap an already-assembled figment, e.g. one built from an inline TOML
    /// string in tests. Relative paths resolve against the working directory.
    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        Self::from_figment_with_base(figment, env::current_dir()?)
    }

    pub fn from_figment_with_base(figment: Figment, base_dir: PathBuf) -> anyhow::Result<Self> {
        let config = Self { figment, base_dir };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Typed view over every section; missing keys take their defaults and
    /// every path is resolved against [`Config::base_dir`].
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = self
            .figment
            .extract::<Settings>()
            .map_err(|e| anyhow::anyhow!("Failed to read settings: {}", e))?;
        settings.resolve_paths(&self.base_dir);
        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let settings = self.settings()?;
        settings.validate().map_err(anyhow::Error::from)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
