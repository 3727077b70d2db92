//! Host-supplied engine configuration.
//!
//! The host decides where the bridge is running ([`TargetKind`], on which
//! class of device ([`Platform`]), and whether to load the real module or
//! the deterministic mock. [`EngineSettings`] carries the knobs the engine
//! itself consumes; the bridge passes them through opaquely.

use serde::{Deserialize, Serialize};

/// Deployment context hosting the bridge.
///
/// Only [`TargetKind::ExtensionOffscreen`] can be reloaded out from under
/// the user by an extension auto-update, so it is the only target that
/// honors the persisted auto-restart flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    /// Plain web page embed.
    Web,
    /// Browser extension popup.
    ExtensionPopup,
    /// Browser extension offscreen document.
    ExtensionOffscreen,
}

impl TargetKind {
    /// Whether this target consumes the auto-restart flag after init.
    #[must_use]
    pub fn honors_auto_restart(self) -> bool {
        matches!(self, TargetKind::ExtensionOffscreen)
    }
}

/// Device class the hosting page runs on.
///
/// The suspension policy keys its "allow running in background" setting on
/// this: mobile OSes suspend timers and the engine together when the page
/// is backgrounded, desktop browsers do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    /// Desktop-class browser.
    Desktop,
    /// Mobile-class browser.
    Mobile,
}

/// Role the engine plays in the sharing network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientType {
    /// Censored peer: consumes shared connectivity.
    Desktop,
    /// Free peer: shares its connectivity. Browser embeds are widgets.
    Widget,
}

/// Engine-internal tuning, passed through to the loader unmodified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Role of this peer.
    pub client_type: ClientType,
    /// Number of consumer connection slots.
    pub consumer_slots: usize,
    /// Number of producer connection slots.
    pub producer_slots: usize,
    /// Internal message bus buffer size.
    pub bus_buffer: usize,
    /// Rate at which the engine samples downstream throughput, in Hz.
    pub ui_refresh_hz: u32,
    /// Free-form tag attached to this peer for observability.
    pub tag: String,
    /// Optional network state reporting endpoint.
    pub netstate_url: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            client_type: ClientType::Widget,
            consumer_slots: 5,
            producer_slots: 5,
            bus_buffer: 4096,
            ui_refresh_hz: 4,
            tag: String::new(),
            netstate_url: None,
        }
    }
}

/// Everything the bridge needs to load and supervise one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Load the deterministic mock instead of the real module.
    pub mock_mode: bool,
    /// Deployment context hosting the bridge.
    pub target: TargetKind,
    /// Device class of the hosting page.
    pub platform: Platform,
    /// Engine-internal tuning.
    pub settings: EngineSettings,
}

impl EngineConfig {
    /// Config for a real engine load.
    pub fn new(target: TargetKind, platform: Platform) -> Self {
        Self { mock_mode: false, target, platform, settings: EngineSettings::default() }
    }

    /// Config that loads the deterministic mock engine.
    pub fn mock(target: TargetKind, platform: Platform) -> Self {
        Self { mock_mode: true, ..Self::new(target, platform) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_offscreen_honors_auto_restart() {
        assert!(TargetKind::ExtensionOffscreen.honors_auto_restart());
        assert!(!TargetKind::Web.honors_auto_restart());
        assert!(!TargetKind::ExtensionPopup.honors_auto_restart());
    }

    #[test]
    fn default_settings_match_engine_defaults() {
        let settings = EngineSettings::default();
        assert_eq!(settings.client_type, ClientType::Widget);
        assert_eq!(settings.consumer_slots, 5);
        assert_eq!(settings.producer_slots, 5);
        assert_eq!(settings.bus_buffer, 4096);
        assert_eq!(settings.ui_refresh_hz, 4);
    }

    #[test]
    fn mock_config_sets_mock_mode() {
        let config = EngineConfig::mock(TargetKind::Web, Platform::Desktop);
        assert!(config.mock_mode);
        assert_eq!(config.target, TargetKind::Web);
    }
}
