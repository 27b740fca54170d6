//! `bwtctl config` - inspect and change the persisted bwt settings

use std::io::Write;

use bwtctl_app::{Host, PluginSettings, SettingKey};
use bwtctl_core::prelude::*;
use bwtctl_core::Network;

/// Print every setting with its effective value and a short description
pub fn config_list<W: Write>(host: &dyn Host, out: &mut W) -> Result<()> {
    let settings = load_settings(host)?;
    for (key, value) in settings.to_values() {
        let shown = value.to_string();
        writeln!(out, "{:<20} = {:<32} # {}", key, shown, key.description())?;
    }
    Ok(())
}

/// Print the effective value of one setting
pub fn config_get<W: Write>(host: &dyn Host, key: &str, out: &mut W) -> Result<()> {
    let key: SettingKey = key.parse()?;
    let settings = load_settings(host)?;
    if let Some((_, value)) = settings.to_values().into_iter().find(|(k, _)| *k == key) {
        match value {
            toml::Value::String(s) => writeln!(out, "{}", s)?,
            other => writeln!(out, "{}", other)?,
        }
    }
    Ok(())
}

/// Validate and persist one setting.
///
/// The value is applied on top of the current settings and the result
/// validated as a whole, so nothing is written when it would leave the
/// settings unusable.
pub fn config_set(host: &dyn Host, key: &str, raw: &str) -> Result<()> {
    let key: SettingKey = key.parse()?;
    let value = key.parse_value(raw)?;

    let mut settings = load_settings(host)?;
    settings.apply_value(key, &value)?;
    settings.validate()?;

    host.set_setting(key.as_str(), value)
        .with_context(|| format!("Failed to save {}", key))?;
    info!("Set {} via CLI", key);
    Ok(())
}

fn load_settings(host: &dyn Host) -> Result<PluginSettings> {
    let network = Network::from_chain_identity(&host.chain_identity())?;
    Ok(PluginSettings::load(host, network))
}
