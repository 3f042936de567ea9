use std::collections::BTreeMap;

use anyhow::{Context, Result, bail};

use crate::core::fingerprint::Digest;

/// A frozen mapping from string keys to constant configuration values.
///
/// The engine reads it when computing run fingerprints and hands it, intact,
/// to every rule action. Values come from the closed [`ConfigValue`] set,
/// whose canonical encoding is stable across invocations; this is what makes
/// configuration part of the rebuild decision.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: BTreeMap<String, ConfigValue>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    /// Build a configuration from a TOML document.
    ///
    /// Only the TOML subset of the constant types is accepted; floats and
    /// datetimes are rejected here rather than surfacing later as a
    /// fingerprinting failure.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let table: toml::Table = toml::from_str(text).context("failed to parse configuration")?;
        let values = table
            .into_iter()
            .map(|(key, value)| {
                let value = ConfigValue::try_from(value)
                    .with_context(|| format!("invalid configuration value for key `{key}`"))?;
                Ok((key, value))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(Self { values })
    }
}

/// The closed set of constant types permitted in build configuration.
///
/// All variants serialise deterministically, hence two invocations seeing
/// equal values produce equal run fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

// Type tags of the canonical encoding. The encoding frames every
// variable-length field with its length, so distinct value trees can never
// collide by concatenation.
const TAG_BOOL: u8 = 0x01;
const TAG_INT: u8 = 0x02;
const TAG_STR: u8 = 0x03;
const TAG_BYTES: u8 = 0x04;
const TAG_LIST: u8 = 0x05;
const TAG_MAP: u8 = 0x06;

impl ConfigValue {
    /// Feed the canonical encoding of this value into `digest`.
    pub(crate) fn digest_into(&self, digest: &mut Digest) {
        match self {
            ConfigValue::Bool(value) => {
                digest.update(&[TAG_BOOL, u8::from(*value)]);
            }
            ConfigValue::Int(value) => {
                digest.update(&[TAG_INT]).update(&value.to_le_bytes());
            }
            ConfigValue::Str(value) => {
                digest
                    .update(&[TAG_STR])
                    .update_u64(value.len() as u64)
                    .update(value.as_bytes());
            }
            ConfigValue::Bytes(value) => {
                digest
                    .update(&[TAG_BYTES])
                    .update_u64(value.len() as u64)
                    .update(value);
            }
            ConfigValue::List(items) => {
                digest.update(&[TAG_LIST]).update_u64(items.len() as u64);
                for item in items {
                    item.digest_into(digest);
                }
            }
            ConfigValue::Map(entries) => {
                digest.update(&[TAG_MAP]).update_u64(entries.len() as u64);
                // BTreeMap iterates in key order, keeping the encoding
                // independent of insertion order.
                for (key, value) in entries {
                    digest.update_u64(key.len() as u64).update(key.as_bytes());
                    value.digest_into(digest);
                }
            }
        }
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for ConfigValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<u8>> for ConfigValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl TryFrom<toml::Value> for ConfigValue {
    type Error = anyhow::Error;

    fn try_from(value: toml::Value) -> Result<Self> {
        Ok(match value {
            toml::Value::Boolean(value) => ConfigValue::Bool(value),
            toml::Value::Integer(value) => ConfigValue::Int(value),
            toml::Value::String(value) => ConfigValue::Str(value),
            toml::Value::Array(items) => ConfigValue::List(
                items
                    .into_iter()
                    .map(ConfigValue::try_from)
                    .collect::<Result<_>>()?,
            ),
            toml::Value::Table(table) => ConfigValue::Map(
                table
                    .into_iter()
                    .map(|(key, value)| Ok((key, ConfigValue::try_from(value)?)))
                    .collect::<Result<_>>()?,
            ),
            other => bail!(
                "`{}` values cannot be used in build configuration",
                other.type_str()
            ),
        })
    }
}
