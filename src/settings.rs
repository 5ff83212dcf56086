//! Layered key-value settings store for services.
//!
//! Each service declares its flags as [`FlagSpec`]s. The host resolves them
//! once at startup, lowest to highest precedence:
//!
//!   1. flag defaults
//!   2. the `[services]` table of the TOML config
//!   3. environment variables (key upper-cased: `coze_token` → `COZE_TOKEN`)
//!   4. flags given explicitly on the command line
//!
//! The resolved [`Settings`] are immutable and shared behind an `Arc`;
//! handlers read from them at call time.

use std::collections::HashMap;

use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::warn;

use crate::error::AppError;

/// A typed setting value. The declared type of a key is the type of its
/// flag default; every layer is coerced to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    String(String),
}

/// One command-line flag contributed by a service.
#[derive(Debug, Clone)]
pub struct FlagSpec {
    pub name: &'static str,
    pub help: &'static str,
    pub default: SettingValue,
}

impl FlagSpec {
    pub fn bool(name: &'static str, default: bool, help: &'static str) -> Self {
        Self { name, help, default: SettingValue::Bool(default) }
    }

    pub fn string(name: &'static str, default: &str, help: &'static str) -> Self {
        Self { name, help, default: SettingValue::String(default.to_string()) }
    }

    fn env_key(&self) -> String {
        self.name.to_uppercase()
    }
}

/// Add one `--<name>` argument per flag to `cmd`.
///
/// Bool flags accept both `--coze` and `--coze=false`. No clap defaults are
/// set, so [`Settings::merge_cli`] only sees values the user actually typed.
pub fn register_flags(mut cmd: Command, flags: &[FlagSpec]) -> Command {
    for flag in flags {
        let arg = Arg::new(flag.name).long(flag.name).help(flag.help);
        let arg = match flag.default {
            SettingValue::Bool(_) => arg
                .action(ArgAction::Set)
                .num_args(0..=1)
                .require_equals(true)
                .default_missing_value("true")
                .value_parser(clap::value_parser!(bool)),
            SettingValue::String(_) => arg.action(ArgAction::Set).value_name("VALUE"),
        };
        cmd = cmd.arg(arg);
    }
    cmd
}

#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: HashMap<String, SettingValue>,
}

impl Settings {
    /// Start from the declared defaults.
    pub fn from_flags(flags: &[FlagSpec]) -> Self {
        let values = flags
            .iter()
            .map(|f| (f.name.to_string(), f.default.clone()))
            .collect();
        Self { values }
    }

    /// Build a store from literal pairs. Handy for tests and embedding.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, SettingValue)>,
        K: Into<String>,
    {
        Self { values: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect() }
    }

    /// Overlay the `[services]` table from the config file.
    /// Keys no service declared are logged and skipped.
    pub fn merge_table(&mut self, flags: &[FlagSpec], table: &toml::Table) -> Result<(), AppError> {
        for (key, raw) in table {
            let Some(flag) = flags.iter().find(|f| f.name == key.as_str()) else {
                warn!(%key, "ignoring unknown [services] key");
                continue;
            };
            let value = match (&flag.default, raw) {
                (SettingValue::Bool(_), toml::Value::Boolean(b)) => SettingValue::Bool(*b),
                (SettingValue::Bool(_), toml::Value::String(s)) => {
                    SettingValue::Bool(parse_bool(key, s)?)
                }
                (SettingValue::String(_), toml::Value::String(s)) => SettingValue::String(s.clone()),
                (SettingValue::String(_), toml::Value::Integer(i)) => SettingValue::String(i.to_string()),
                (SettingValue::String(_), toml::Value::Float(x)) => SettingValue::String(x.to_string()),
                (SettingValue::String(_), toml::Value::Boolean(b)) => SettingValue::String(b.to_string()),
                (_, other) => {
                    return Err(AppError::Config(format!(
                        "[services] {key}: unsupported value type '{}'",
                        other.type_str()
                    )));
                }
            };
            self.values.insert(key.clone(), value);
        }
        Ok(())
    }

    /// Overlay environment variables. `lookup` is `std::env::var(..).ok()`
    /// in production; tests pass a closure instead of mutating the process env.
    pub fn merge_env<F>(&mut self, flags: &[FlagSpec], lookup: F) -> Result<(), AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for flag in flags {
            let env_key = flag.env_key();
            let Some(raw) = lookup(&env_key) else { continue };
            let value = match flag.default {
                SettingValue::Bool(_) => SettingValue::Bool(parse_bool(&env_key, &raw)?),
                SettingValue::String(_) => SettingValue::String(raw),
            };
            self.values.insert(flag.name.to_string(), value);
        }
        Ok(())
    }

    /// Overlay flags given explicitly on the command line.
    pub fn merge_cli(&mut self, flags: &[FlagSpec], matches: &ArgMatches) {
        for flag in flags {
            let value = match flag.default {
                SettingValue::Bool(_) => matches
                    .get_one::<bool>(flag.name)
                    .map(|b| SettingValue::Bool(*b)),
                SettingValue::String(_) => matches
                    .get_one::<String>(flag.name)
                    .map(|s| SettingValue::String(s.clone())),
            };
            if let Some(value) = value {
                self.values.insert(flag.name.to_string(), value);
            }
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: SettingValue) {
        self.values.insert(key.into(), value);
    }

    /// `false` when the key is missing or holds a string.
    pub fn get_bool(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(SettingValue::Bool(true)))
    }

    /// Empty string when the key is missing.
    pub fn get_string(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(SettingValue::String(s)) => s.clone(),
            Some(SettingValue::Bool(b)) => b.to_string(),
            None => String::new(),
        }
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, AppError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(AppError::Config(format!("{key}: expected a boolean, got '{raw}'"))),
    }
}
