//! Loader for workspace configuration with YAML + environment overlays.
//!
//! Precedence: `PLUME__`-prefixed environment variables override file values,
//! and `${VAR}` placeholders are expanded recursively (bounded depth) after
//! the sources are merged, so secrets can live in the environment while the
//! file stays checked in.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

#[derive(Debug, Deserialize)]
pub struct PlumeConfig {
    pub version: Option<String>,
    pub provider: ProviderSpec,
    #[serde(default)]
    pub ingest: IngestPolicy,
    #[serde(default)]
    pub database: DatabaseConfig,
    pub trigger: TriggerConfig,
}

/// Shared fields + the per-kind "details"
#[derive(Debug, Deserialize)]
pub struct ProviderSpec {
    pub id: String,
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub details: ProviderDetails,
}

/// The tag is `kind`; the payload lives in `config`
#[derive(Debug, Deserialize)]
#[serde(tag = "kind")]
pub enum ProviderDetails {
    #[serde(rename = "api")]
    Api { config: ApiProviderConfig },

    #[serde(rename = "syndication")]
    Syndication { config: SyndicationProviderConfig },
}

#[derive(Debug, Deserialize)]
pub struct ApiProviderConfig {
    pub bearer_token: String,
    #[serde(default = "default_api_endpoint")]
    pub endpoint: String,
}

#[derive(Debug, Deserialize)]
pub struct SyndicationProviderConfig {
    #[serde(default = "default_syndication_endpoint")]
    pub endpoint: String,
}

fn default_api_endpoint() -> String {
    "https://api.twitter.com".into()
}
fn default_syndication_endpoint() -> String {
    "https://cdn.syndication.twimg.com".into()
}

/// Ingestion policy knobs. Every field has a serve-traffic-safe default so a
/// minimal config file only needs the provider and trigger sections.
#[derive(Debug, Deserialize)]
pub struct IngestPolicy {
    /// Items a single user's run may request across all creators per day.
    #[serde(default = "default_daily_budget")]
    pub daily_budget: u32,
    /// A creator is due for refresh once its last fetch is older than this.
    #[serde(default = "default_staleness_hours")]
    pub staleness_hours: i64,
    /// Minimum delay between successive upstream calls within a run.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// Items older than this are removed by the retention sweep.
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    /// Window the balanced read considers when assembling context.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

impl Default for IngestPolicy {
    fn default() -> Self {
        Self {
            daily_budget: default_daily_budget(),
            staleness_hours: default_staleness_hours(),
            pacing_ms: default_pacing_ms(),
            retention_days: default_retention_days(),
            lookback_days: default_lookback_days(),
        }
    }
}

fn default_daily_budget() -> u32 {
    200
}
fn default_staleness_hours() -> i64 {
    24
}
fn default_pacing_ms() -> u64 {
    1_000
}
fn default_retention_days() -> i64 {
    7
}
fn default_lookback_days() -> i64 {
    7
}

#[derive(Debug, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "sqlite://plume.db".into()
}

#[derive(Debug, Deserialize)]
pub struct TriggerConfig {
    /// Shared secret the external scheduler must present; verified before
    /// any run has side effects.
    pub secret: String,
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (YAML + env overrides).
pub struct PlumeConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PlumeConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PlumeConfigLoader {
    /// Start with sensible defaults: YAML file + `PLUME_` env overrides.
    ///
    /// ```
    /// use plume_config::PlumeConfigLoader;
    ///
    /// let config = PlumeConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// version: '1'
    /// provider:
    ///   id: main
    ///   kind: syndication
    ///   config: {}
    /// trigger:
    ///   secret: sesame
    /// "#,
    ///     )
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.ingest.daily_budget, 200);
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("PLUME").separator("__"));
        Self { builder }
    }

    /// Attach a YAML/TOML/JSON file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self.builder.add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use plume_config::{PlumeConfigLoader, ProviderDetails};
    ///
    /// unsafe { std::env::set_var("PROVIDER_TOKEN", "injected-from-env"); }
    ///
    /// let config = PlumeConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// version: "1"
    /// provider:
    ///   id: main
    ///   kind: api
    ///   config:
    ///     bearer_token: "${PROVIDER_TOKEN}"
    /// trigger:
    ///   secret: sesame
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// match &config.provider.details {
    ///     ProviderDetails::Api { config } => {
    ///         assert_eq!(config.bearer_token, "injected-from-env");
    ///         assert_eq!(config.endpoint, "https://api.twitter.com");
    ///     }
    ///     _ => panic!("expected api provider"),
    /// }
    ///
    /// unsafe { std::env::remove_var("PROVIDER_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<PlumeConfig, ConfigError> {
        let cfg = self.builder.build()?;

        // Merge first, then expand, so env-sourced values get the same
        // `${VAR}` treatment as file-sourced ones.
        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: PlumeConfig =
            serde_json::from_value(v).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use temp_env;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_in_array_and_object() {
        temp_env::with_vars([("CITY", Some("Winston")), ("STATE", Some("NC"))], || {
            let mut v = json!([
                "hello-$CITY",
                { "loc": "${CITY}-${STATE}" },
                42,
                true,
                null
            ]);
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!(["hello-Winston", { "loc": "Winston-NC" }, 42, true, null])
            );
        });
    }

    #[test]
    fn expands_recursively_across_env_values() {
        temp_env::with_vars(
            [
                ("BAZ", Some("qux")),
                ("BAR", Some("mid-${BAZ}")),
                ("FOO", Some("start-${BAR}-end")),
            ],
            || {
                let mut v = json!("X=${FOO}");
                expand_env_in_value(&mut v);
                assert_eq!(v, json!("X=start-mid-qux-end"));
            },
        );
    }

    #[test]
    fn stops_on_cycles_and_leaves_value_reasonable() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            // Terminates thanks to the depth cap; the cycle stays unresolved.
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST}"));
    }
}
