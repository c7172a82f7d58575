//! Tunables for the controller.
//!
//! Every value has a default; `ControllerConfig::from_env` layers
//! `FACEGRID_*` environment overrides on top. Invalid overrides are ignored.

use std::time::Duration;

use tracing::warn;

/// Photos requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Distance from the bottom of the grid, in pixels, that triggers the next page.
pub const DEFAULT_SCROLL_THRESHOLD_PX: f32 = 800.0;
const DEFAULT_SCROLL_DEBOUNCE_MS: u64 = 100;
const DEFAULT_SAFETY_POLL_MS: u64 = 1000;
const DEFAULT_HOVER_CLOSE_MS: u64 = 200;
const DEFAULT_MENU_GAP_PX: f32 = 4.0;
const DEFAULT_VIEWPORT_MARGIN_PX: f32 = 8.0;
/// Above this many photos the status line shows exact loaded/total counts.
const DEFAULT_LARGE_COUNT_THRESHOLD: usize = 1000;
const DEFAULT_PREVIEW_CACHE_ENTRIES: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub page_size: u32,
    pub scroll_threshold_px: f32,
    pub scroll_debounce: Duration,
    /// Interval of the pagination safety-net poll; `None` disables it.
    pub safety_poll: Option<Duration>,
    pub hover_close_delay: Duration,
    pub menu_gap_px: f32,
    pub viewport_margin_px: f32,
    pub large_count_threshold: usize,
    pub preview_cache_entries: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            scroll_threshold_px: DEFAULT_SCROLL_THRESHOLD_PX,
            scroll_debounce: Duration::from_millis(DEFAULT_SCROLL_DEBOUNCE_MS),
            safety_poll: Some(Duration::from_millis(DEFAULT_SAFETY_POLL_MS)),
            hover_close_delay: Duration::from_millis(DEFAULT_HOVER_CLOSE_MS),
            menu_gap_px: DEFAULT_MENU_GAP_PX,
            viewport_margin_px: DEFAULT_VIEWPORT_MARGIN_PX,
            large_count_threshold: DEFAULT_LARGE_COUNT_THRESHOLD,
            preview_cache_entries: DEFAULT_PREVIEW_CACHE_ENTRIES,
        }
    }
}

impl ControllerConfig {
    /// Defaults with overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults with overrides from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(size) = parse_var::<u32>(&lookup, "FACEGRID_PAGE_SIZE").filter(|v| *v > 0) {
            config.page_size = size;
        }
        if let Some(px) = parse_var::<f32>(&lookup, "FACEGRID_SCROLL_THRESHOLD")
            .filter(|v| v.is_finite() && *v >= 0.0)
        {
            config.scroll_threshold_px = px;
        }
        if let Some(raw) = lookup("FACEGRID_SAFETY_POLL_MS") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "0" | "off" | "false" | "no" => config.safety_poll = None,
                other => match other.parse::<u64>() {
                    Ok(ms) => config.safety_poll = Some(Duration::from_millis(ms)),
                    Err(_) => warn!(value = %raw, "Ignoring invalid FACEGRID_SAFETY_POLL_MS"),
                },
            }
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "FACEGRID_HOVER_CLOSE_MS") {
            config.hover_close_delay = Duration::from_millis(ms);
        }
        if let Some(entries) =
            parse_var::<usize>(&lookup, "FACEGRID_PREVIEW_CACHE").filter(|v| *v > 0)
        {
            config.preview_cache_entries = entries;
        }

        config
    }
}

fn parse_var<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring invalid config override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.scroll_threshold_px, 800.0);
        assert_eq!(config.hover_close_delay, Duration::from_millis(200));
        assert!(config.safety_poll.is_some());
    }

    #[test]
    fn test_env_overrides() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("FACEGRID_PAGE_SIZE", "50"),
            ("FACEGRID_SAFETY_POLL_MS", "off"),
            ("FACEGRID_HOVER_CLOSE_MS", "350"),
        ]));
        assert_eq!(config.page_size, 50);
        assert_eq!(config.safety_poll, None);
        assert_eq!(config.hover_close_delay, Duration::from_millis(350));
    }

    #[test]
    fn test_invalid_overrides_fall_back() {
        let config = ControllerConfig::from_lookup(lookup_from(&[
            ("FACEGRID_PAGE_SIZE", "0"),
            ("FACEGRID_SCROLL_THRESHOLD", "lots"),
            ("FACEGRID_SAFETY_POLL_MS", "soon"),
        ]));
        assert_eq!(config, ControllerConfig::default());
    }
}
