// SPDX-License-Identifier: MIT
// Copyright (c) 2026 pooled-exec contributors

//! [`PreallocateConfig`]: the `serde`-deserializable shape of the
//! `preallocate` configuration section (§6).
//!
//! This crate does not parse configuration files itself — it accepts
//! anything implementing `serde::Deserialize`, whether that's a raw TOML
//! table, a merged `config` crate `Value`, or a hand-built value in tests.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One named pool's configuration, as it appears under a `preallocate`
/// section key before `name`/`configs` defaults are resolved.
///
/// `name` and `configs` default to the section key they're nested under;
/// resolving that default is [`PreallocateConfig::into_pool_configs`]'s
/// job, since a lone [`PoolConfigSection`] doesn't know its own key.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PoolConfigSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "string_or_list")]
    pub configs: Vec<String>,
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default)]
    pub persist: bool,
    #[serde(default, with = "opt_walltime")]
    pub walltime: Option<Duration>,
    #[serde(default)]
    pub debug_pooled_executor: bool,
    #[serde(default)]
    pub extra: serde_json::Value,
}

fn default_jobs() -> usize {
    1
}

/// The whole `preallocate` configuration section: a map of pool name to
/// its section. Order-preserving (`indexmap::IndexMap`) so
/// [`crate::registry::Registry::init_pools`] starts pools in declaration
/// order, matching the order `request_executor` later iterates them in.
///
/// `#[serde(transparent)]` rather than `#[serde(flatten)]`: the
/// `preallocate` section's top-level shape already *is* a map of pool
/// name to section, so this deserializes straight from that document
/// with no wrapping object to flatten out of.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(transparent)]
pub struct PreallocateConfig {
    pub pools: indexmap::IndexMap<String, PoolConfigSection>,
}

impl PreallocateConfig {
    /// Resolve each section's `name`/`configs` defaults against its
    /// section key, yielding ready-to-use [`crate::pool_config::PoolConfig`]s
    /// in declaration order.
    pub fn into_pool_configs(self) -> Vec<crate::pool_config::PoolConfig> {
        self.pools
            .into_iter()
            .map(|(key, section)| {
                let name = section.name.unwrap_or_else(|| key.clone());
                let configs = if section.configs.is_empty() { vec![key.clone()] } else { section.configs };
                crate::pool_config::PoolConfig {
                    name,
                    configs,
                    jobs: section.jobs,
                    persist: section.persist,
                    walltime: section.walltime,
                    debug_pooled_executor: section.debug_pooled_executor,
                    extra: section.extra,
                }
            })
            .collect()
    }
}

/// Accepts `configs` as either a single string or a list of strings (§6:
/// "Type: string or list").
fn string_or_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    struct StringOrList;

    impl<'de> de::Visitor<'de> for StringOrList {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            formatter.write_str("a string or a list of strings")
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut out = Vec::new();
            while let Some(item) = seq.next_element::<String>()? {
                out.push(item);
            }
            Ok(out)
        }
    }

    deserializer.deserialize_any(StringOrList)
}

mod opt_walltime {
    use super::Duration;
    use crate::pool_config::walltime_from_str;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.map(|d| d.as_secs()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(u64),
            Text(String),
        }

        let Some(raw) = Option::<Raw>::deserialize(deserializer)? else {
            return Ok(None);
        };
        match raw {
            Raw::Seconds(secs) => Ok(Some(Duration::from_secs(secs))),
            Raw::Text(text) => walltime_from_str(&text).map(Some).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
