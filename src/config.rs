use std::path::Path;

use crate::settings::UserSettings;

// Default values for configuration
// These serve as fallback values when the settings file leaves a key out
pub const DEFAULT_CLASS_ID_OFFSET: i64 = 0;
pub const DEFAULT_SIMPLIFY_EPSILON: f32 = 1.0;
pub const DEFAULT_EXCLUDED_SUPERCATEGORY: &str = "none";
pub const DEFAULT_PRETTY_JSON: bool = true;

/// Effective configuration for one run: settings file plus command-line overrides
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub class_id_offset: i64,           // Applied to detection class ids
    pub simplify_epsilon: f32,          // Contour simplification tolerance
    pub excluded_supercategory: String, // Skipped when listing class names
    pub pretty_json: bool,
}

impl Config {
    pub fn load(settings_path: Option<&Path>) -> Self {
        Self::from(UserSettings::load(settings_path))
    }

    pub fn with_class_id_offset(mut self, offset: Option<i64>) -> Self {
        if let Some(offset) = offset {
            self.class_id_offset = offset;
        }
        self
    }

    pub fn with_simplify_epsilon(mut self, epsilon: Option<f32>) -> Self {
        if let Some(epsilon) = epsilon {
            self.simplify_epsilon = epsilon;
        }
        self
    }
}

impl From<UserSettings> for Config {
    fn from(settings: UserSettings) -> Self {
        Config {
            class_id_offset: settings.class_id_offset,
            simplify_epsilon: settings.simplify_epsilon,
            excluded_supercategory: settings.excluded_supercategory,
            pretty_json: settings.pretty_json,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from(UserSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win_over_settings() {
        let config = Config::default()
            .with_class_id_offset(Some(-1))
            .with_simplify_epsilon(None);
        assert_eq!(config.class_id_offset, -1);
        assert_eq!(config.simplify_epsilon, DEFAULT_SIMPLIFY_EPSILON);
    }
}
