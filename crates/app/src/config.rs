use serde::Deserialize;

use voxpipe_foundation::PipelineError;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Raw frame duration handed to the processor at init.
    pub frame_duration_ms: u32,
    pub sample_rate_hz: u32,
    /// Ask the codec for a device echo reference and enable AEC.
    pub device_aec: bool,
    /// How long the demo feeder runs before the app shuts itself down.
    pub demo_secs: u64,
    pub provisioning: ProvisioningSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvisioningSection {
    pub enabled: bool,
    pub name_prefix: String,
    pub pop: String,
    pub timeout_minutes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            frame_duration_ms: 32,
            sample_rate_hz: 16_000,
            device_aec: false,
            demo_secs: 20,
            provisioning: ProvisioningSection::default(),
        }
    }
}

impl Default for ProvisioningSection {
    fn default() -> Self {
        Self {
            enabled: false,
            name_prefix: "VoxPipe-".into(),
            pop: "123456".into(),
            timeout_minutes: 10,
        }
    }
}

impl AppConfig {
    /// Defaults, overridden by an optional TOML file, overridden by
    /// VOXPIPE_* environment variables.
    pub fn load(path: Option<&str>) -> Result<Self, PipelineError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("VOXPIPE").separator("__"),
        );

        builder
            .build()
            .and_then(|cfg| cfg.try_deserialize())
            .map_err(|e| PipelineError::Config(e.to_string()))
    }
}
