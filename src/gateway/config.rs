use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::GatewayError;

/// The operator-facing configuration document (`api.yaml`), before normalization.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawConfig {
    pub providers: Vec<RawProvider>,
    pub api_keys: Vec<RawApiKey>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RawProvider {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    #[serde(default)]
    pub model: Vec<RawModelEntry>,
}

impl fmt::Debug for RawProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawProvider")
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("api", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// A model list entry: either a bare upstream name or `{upstream_name: alias}` renames.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawModelEntry {
    Name(String),
    Rename(IndexMap<String, String>),
    /// Anything else; dropped during normalization.
    Other(serde_yaml::Value),
}

#[derive(Clone, Serialize, Deserialize)]
pub struct RawApiKey {
    pub api: String,
    #[serde(default)]
    pub model: Vec<String>,
}

impl fmt::Debug for RawApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawApiKey")
            .field("api", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

impl RawConfig {
    pub fn from_yaml_value(value: serde_yaml::Value) -> Result<Self, GatewayError> {
        serde_yaml::from_value(value).map_err(|err| GatewayError::Config {
            reason: err.to_string(),
        })
    }
}

/// An upstream backend with its public-name -> upstream-name model table.
#[derive(Clone, PartialEq, Eq)]
pub struct Provider {
    name: String,
    base_url: Option<String>,
    api: Option<String>,
    models: IndexMap<String, String>,
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api", &"<redacted>")
            .field("models", &self.models)
            .finish()
    }
}

impl Provider {
    pub fn new(name: impl Into<String>, models: IndexMap<String, String>) -> Self {
        Self {
            name: name.into(),
            base_url: None,
            api: None,
            models,
        }
    }

    fn from_raw(raw: RawProvider) -> Self {
        Self {
            models: normalize_models(&raw.provider, &raw.model),
            name: raw.provider,
            base_url: raw.base_url,
            api: raw.api,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    pub fn api(&self) -> Option<&str> {
        self.api.as_deref()
    }

    pub fn models(&self) -> &IndexMap<String, String> {
        &self.models
    }

    /// Public model names in declaration order.
    pub fn public_models(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn exposes(&self, public_name: &str) -> bool {
        self.models.contains_key(public_name)
    }

    pub fn upstream_model(&self, public_name: &str) -> Option<&str> {
        self.models.get(public_name).map(String::as_str)
    }
}

/// Builds the public -> upstream table for one provider.
///
/// A rename `{old: new}` registers the alias `new -> old` and also keeps `old -> old`.
/// Re-inserting a key overwrites its target but keeps its original position.
fn normalize_models(provider: &str, entries: &[RawModelEntry]) -> IndexMap<String, String> {
    let mut models = IndexMap::new();
    for entry in entries {
        match entry {
            RawModelEntry::Name(name) => {
                models.insert(name.clone(), name.clone());
            }
            RawModelEntry::Rename(renames) => {
                for (old, new) in renames {
                    models.insert(new.clone(), old.clone());
                }
                for old in renames.keys() {
                    models.insert(old.clone(), old.clone());
                }
            }
            RawModelEntry::Other(value) => {
                tracing::warn!(
                    provider,
                    ?value,
                    "skipping model entry that is not a name or rename"
                );
            }
        }
    }
    models
}

/// One entitlement rule attached to a credential.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ModelPattern {
    /// `provider/*`: every model the provider exposes.
    ProviderWildcard { provider: String },
    /// `provider/model`: one model, only if that provider exposes it.
    ProviderModel { provider: String, model: String },
    /// A bare name, granted as-is.
    Model(String),
}

impl ModelPattern {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('/') {
            Some((provider, "*")) => Self::ProviderWildcard {
                provider: provider.to_string(),
            },
            Some((provider, model)) => Self::ProviderModel {
                provider: provider.to_string(),
                model: model.to_string(),
            },
            None => Self::Model(raw.to_string()),
        }
    }
}

impl fmt::Display for ModelPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProviderWildcard { provider } => write!(f, "{provider}/*"),
            Self::ProviderModel { provider, model } => write!(f, "{provider}/{model}"),
            Self::Model(model) => f.write_str(model),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ApiKeyEntry {
    pub api: String,
    pub patterns: Vec<ModelPattern>,
}

impl fmt::Debug for ApiKeyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyEntry")
            .field("api", &"<redacted>")
            .field("patterns", &self.patterns)
            .finish()
    }
}

impl ApiKeyEntry {
    pub fn new(api: impl Into<String>, patterns: impl IntoIterator<Item = ModelPattern>) -> Self {
        Self {
            api: api.into(),
            patterns: patterns.into_iter().collect(),
        }
    }
}

/// Immutable, normalized view of one configuration load.
///
/// Reloads build a fresh snapshot; a snapshot handed to a request is never mutated.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GatewaySnapshot {
    providers: Vec<Provider>,
    api_keys: Vec<ApiKeyEntry>,
    api_list: Vec<String>,
    key_index: HashMap<String, usize>,
}

impl fmt::Debug for GatewaySnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySnapshot")
            .field("providers", &self.providers)
            .field("api_keys", &self.api_keys)
            .finish_non_exhaustive()
    }
}

impl GatewaySnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(
        providers: Vec<Provider>,
        api_keys: Vec<ApiKeyEntry>,
    ) -> Result<Self, GatewayError> {
        let mut key_index = HashMap::with_capacity(api_keys.len());
        for (idx, key) in api_keys.iter().enumerate() {
            if key_index.insert(key.api.clone(), idx).is_some() {
                return Err(GatewayError::Config {
                    reason: format!("api_keys[{idx}] duplicates an earlier `api`"),
                });
            }
        }
        let api_list = api_keys.iter().map(|key| key.api.clone()).collect();

        Ok(Self {
            providers,
            api_keys,
            api_list,
            key_index,
        })
    }

    pub fn from_raw(raw: RawConfig) -> Result<Self, GatewayError> {
        let providers = raw.providers.into_iter().map(Provider::from_raw).collect();
        let api_keys = raw
            .api_keys
            .into_iter()
            .map(|key| ApiKeyEntry {
                patterns: key.model.iter().map(|raw| ModelPattern::parse(raw)).collect(),
                api: key.api,
            })
            .collect();
        Self::new(providers, api_keys)
    }

    pub fn from_yaml_value(value: serde_yaml::Value) -> Result<Self, GatewayError> {
        Self::from_raw(RawConfig::from_yaml_value(value)?)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, GatewayError> {
        let value: serde_yaml::Value =
            serde_yaml::from_str(raw).map_err(|err| GatewayError::Config {
                reason: err.to_string(),
            })?;
        Self::from_yaml_value(value)
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty() && self.api_keys.is_empty()
    }

    pub fn providers(&self) -> &[Provider] {
        &self.providers
    }

    /// Providers sharing one identifier, in declaration order.
    pub fn providers_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Provider> {
        self.providers
            .iter()
            .filter(move |provider| provider.name == name)
    }

    pub fn api_keys(&self) -> &[ApiKeyEntry] {
        &self.api_keys
    }

    /// Every accepted credential, in declaration order.
    pub fn api_list(&self) -> &[String] {
        &self.api_list
    }

    pub fn contains_key(&self, token: &str) -> bool {
        self.key_index.contains_key(token)
    }

    pub fn api_key(&self, token: &str) -> Option<&ApiKeyEntry> {
        self.key_index
            .get(token)
            .and_then(|idx| self.api_keys.get(*idx))
    }

    /// Every provider exposing `public_name`, paired with the upstream model to call.
    pub fn route(&self, public_name: &str) -> Vec<(&Provider, &str)> {
        self.providers
            .iter()
            .filter_map(|provider| {
                provider
                    .upstream_model(public_name)
                    .map(|upstream| (provider, upstream))
            })
            .collect()
    }
}
