//! Pluggable services hosted by the bridge.
//!
//! A [`Service`] declares its command-line flags and, when enabled, hands the
//! host an axum [`Router`] to merge. Adding a service = new module + new entry
//! in [`builtin`].

pub mod coze;

use std::sync::Arc;

use axum::Router;

use crate::error::AppError;
use crate::settings::{FlagSpec, Settings};

/// Host-level key that enables every service regardless of its own flag.
pub const ALL_SERVICES: &str = "allservices";

/// A unit the host can configure and mount.
pub trait Service: Send + Sync {
    /// Fixed identifier; also the service's enable-flag name and the prefix
    /// of its other settings keys.
    fn id(&self) -> &'static str;

    /// One-line description shown as the enable flag's help.
    fn comment(&self) -> &'static str;

    /// Path prefix the service's main routes are mounted under.
    fn route_prefix(&self) -> &'static str;

    /// Flags this service contributes to the command line.
    fn flags(&self) -> Vec<FlagSpec>;

    /// Build the service's routes, or `None` when it is disabled.
    fn routes(&self, settings: Arc<Settings>) -> Option<Router>;
}

/// Every service compiled into this binary.
pub fn builtin() -> Result<Vec<Box<dyn Service>>, AppError> {
    Ok(vec![Box::new(coze::CozeService::new()?)])
}

/// Flags the host itself owns, independent of any service.
pub fn host_flags() -> Vec<FlagSpec> {
    vec![FlagSpec::bool(ALL_SERVICES, false, "enable all services")]
}

/// Host flags followed by every service's flags.
pub fn all_flags(services: &[Box<dyn Service>]) -> Vec<FlagSpec> {
    let mut flags = host_flags();
    for svc in services {
        flags.extend(svc.flags());
    }
    flags
}

/// `true` when the service's own flag or [`ALL_SERVICES`] is set.
pub fn is_enabled(settings: &Settings, id: &str) -> bool {
    settings.get_bool(id) || settings.get_bool(ALL_SERVICES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingValue;

    #[test]
    fn disabled_by_default() {
        let s = Settings::from_flags(&host_flags());
        assert!(!is_enabled(&s, "coze"));
    }

    #[test]
    fn own_flag_enables() {
        let s = Settings::from_pairs([("coze", SettingValue::Bool(true))]);
        assert!(is_enabled(&s, "coze"));
        assert!(!is_enabled(&s, "other"));
    }

    #[test]
    fn allservices_enables_everything() {
        let s = Settings::from_pairs([(ALL_SERVICES, SettingValue::Bool(true))]);
        assert!(is_enabled(&s, "coze"));
        assert!(is_enabled(&s, "other"));
    }

    #[test]
    fn all_flags_lists_host_then_services() {
        let services = builtin().unwrap();
        let names: Vec<_> = all_flags(&services).iter().map(|f| f.name).collect();
        assert_eq!(names, vec![ALL_SERVICES, "coze", "coze_token", "coze_url"]);
    }
}
