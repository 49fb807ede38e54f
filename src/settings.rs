//! Runtime settings.
//!
//! The original tool configured these through system properties; here they
//! are resolved once from the environment into a plain record that is
//! passed explicitly to whoever needs it.

use std::env;
use std::time::Duration;

use tracing::warn;

/// How bitmap encoding is scheduled relative to rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncMode {
    /// Encoders run inline on the producer thread.
    Off,
    /// One worker and one bounded queue per cursor builder.
    PerBuilder,
    /// All builders funnel through a single worker queue.
    SingleWorker,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Crop Xcursor images to their opaque content.
    pub crop_to_content: bool,

    pub async_mode: AsyncMode,

    /// Capacity of each encode queue.
    pub queue_capacity: usize,

    /// Multiplier applied to every animation frame rate.
    pub anim_rate_gain: f64,

    /// Resolution window rendered for animations when a run asks for
    /// several resolutions.
    pub min_anim_size: u32,
    pub max_anim_size: u32,

    /// How long finalization waits for encode workers.
    pub finalize_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            crop_to_content: false,
            async_mode: AsyncMode::Off,
            queue_capacity: 8,
            anim_rate_gain: 1.0,
            min_anim_size: 32,
            max_anim_size: 96,
            finalize_timeout: Duration::from_secs(30),
        }
    }
}

impl Settings {
    /// Resolves settings from the environment, falling back to defaults on
    /// anything unset or unparsable.
    pub fn from_env() -> Settings {
        let mut settings = Settings::default();

        if let Some(value) = env::var_os("xcur.cropToContent") {
            settings.crop_to_content = truthy(&value.to_string_lossy());
        }

        if let Ok(value) = env::var("mousegen.renderer.asyncEncoding") {
            settings.async_mode = match &*value.to_ascii_lowercase() {
                "" | "off" | "none" | "false" => AsyncMode::Off,
                "perbuilder" | "builder" | "true" => AsyncMode::PerBuilder,
                "single" | "singleworker" => AsyncMode::SingleWorker,
                other => {
                    warn!("unknown async encoding mode \"{other}\"; encoding inline");
                    AsyncMode::Off
                }
            };
        }

        if let Ok(value) = env::var("mousegen.renderer.asyncQueueCapacity") {
            match value.parse::<usize>() {
                Ok(capacity) if capacity > 0 => settings.queue_capacity = capacity,
                _ => warn!("ignoring bad queue capacity \"{value}\""),
            }
        }

        if let Ok(value) = env::var("bibata.animRateGain") {
            match value.parse::<f64>() {
                Ok(gain) if gain > 0.0 && gain.is_finite() => settings.anim_rate_gain = gain,
                _ => warn!("ignoring bad animation rate gain \"{value}\""),
            }
        }

        settings
    }
}

fn truthy(value: &str) -> bool {
    matches!(&*value.to_ascii_lowercase(), "1" | "true" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_synchronous() {
        let settings = Settings::default();
        assert_eq!(settings.async_mode, AsyncMode::Off);
        assert!(!settings.crop_to_content);
        assert_eq!(settings.anim_rate_gain, 1.0);
        assert!(settings.min_anim_size < settings.max_anim_size);
    }

    #[test]
    fn truthiness() {
        assert!(truthy("1"));
        assert!(truthy("true"));
        assert!(truthy("TRUE"));
        assert!(!truthy("0"));
        assert!(!truthy(""));
        assert!(!truthy("no"));
    }
}
