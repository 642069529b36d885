use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use log::{debug, info, warn, error};

use crate::config::{
    DEFAULT_CLASS_ID_OFFSET, DEFAULT_EXCLUDED_SUPERCATEGORY, DEFAULT_PRETTY_JSON,
    DEFAULT_SIMPLIFY_EPSILON,
};
use crate::error::{CocoError, Result};

/// User-specific settings that persist across sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    /// Added to every class id when producing detections
    #[serde(default)]
    pub class_id_offset: i64,

    /// Douglas-Peucker tolerance used when tracing mask contours
    #[serde(default = "default_simplify_epsilon")]
    pub simplify_epsilon: f32,

    /// Categories with this supercategory are left out of class lists
    #[serde(default = "default_excluded_supercategory")]
    pub excluded_supercategory: String,

    /// Pretty-print JSON output
    #[serde(default = "default_pretty_json")]
    pub pretty_json: bool,
}

fn default_simplify_epsilon() -> f32 {
    DEFAULT_SIMPLIFY_EPSILON
}

fn default_excluded_supercategory() -> String {
    DEFAULT_EXCLUDED_SUPERCATEGORY.to_string()
}

fn default_pretty_json() -> bool {
    DEFAULT_PRETTY_JSON
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            class_id_offset: DEFAULT_CLASS_ID_OFFSET,
            simplify_epsilon: DEFAULT_SIMPLIFY_EPSILON,
            excluded_supercategory: DEFAULT_EXCLUDED_SUPERCATEGORY.to_string(),
            pretty_json: DEFAULT_PRETTY_JSON,
        }
    }
}

impl UserSettings {
    /// Get the path to the settings file
    /// On macOS: ~/Library/Application Support/coco-index/settings.yaml
    /// On Linux: ~/.config/coco-index/settings.yaml
    /// On Windows: C:\Users\<user>\AppData\Roaming\coco-index\settings.yaml
    pub fn settings_path() -> PathBuf {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."));

        config_dir.join("coco-index").join("settings.yaml")
    }

    /// Load settings from the YAML file
    /// If custom_path is provided, uses that path; otherwise uses the default settings path
    pub fn load(custom_path: Option<&Path>) -> Self {
        let path = match custom_path {
            Some(p) => {
                info!("Using custom settings path: {}", p.display());
                p.to_path_buf()
            }
            None => Self::settings_path(),
        };

        if !path.exists() {
            debug!("Settings file not found at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(contents) => {
                match serde_yaml::from_str::<UserSettings>(&contents) {
                    Ok(settings) => {
                        info!("Loaded settings from {:?}", path);
                        debug!("Settings: class_id_offset={}, simplify_epsilon={}, excluded_supercategory={}",
                            settings.class_id_offset, settings.simplify_epsilon, settings.excluded_supercategory);
                        settings
                    }
                    Err(e) => {
                        error!("Failed to parse settings file at {:?}: {}", path, e);
                        warn!("Using default settings");
                        Self::default()
                    }
                }
            }
            Err(e) => {
                error!("Failed to read settings file at {:?}: {}", path, e);
                warn!("Using default settings");
                Self::default()
            }
        }
    }

    /// Save settings to the YAML file while preserving comments
    pub fn save(&self, path: &Path) -> Result<()> {
        let io_err = |source| CocoError::Io { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        // If file exists, try to preserve comments by doing in-place value updates
        if path.exists() {
            match fs::read_to_string(path) {
                Ok(contents) => {
                    let updated = self.update_yaml_values(&contents);
                    fs::write(path, updated).map_err(io_err)?;
                    info!("Saved settings to {:?} (comments preserved)", path);
                    return Ok(());
                }
                Err(e) => {
                    warn!("Failed to read existing settings file for comment preservation: {}", e);
                }
            }
        }

        fs::write(path, self.to_yaml_with_comments()).map_err(io_err)?;
        info!("Saved settings to {:?}", path);
        Ok(())
    }

    /// Update YAML values while preserving existing comments and structure
    fn update_yaml_values(&self, yaml_content: &str) -> String {
        let mut result = yaml_content.to_string();

        result = Self::replace_yaml_value(&result, "class_id_offset", &self.class_id_offset.to_string());
        result = Self::replace_yaml_value(&result, "simplify_epsilon", &format!("{:?}", self.simplify_epsilon));
        result = Self::replace_yaml_value(&result, "excluded_supercategory", &yaml_string(&self.excluded_supercategory));
        result = Self::replace_yaml_value(&result, "pretty_json", &self.pretty_json.to_string());

        result
    }

    /// Replace a YAML key's value while preserving the rest of the line.
    /// Keys missing from the file are appended.
    fn replace_yaml_value(yaml: &str, key: &str, new_value: &str) -> String {
        let pattern = format!(r"(?m)^(\s*{}\s*:\s*).*$", regex::escape(key));

        match regex::Regex::new(&pattern) {
            Ok(re) if re.is_match(yaml) => re
                .replace_all(yaml, |caps: &regex::Captures| format!("{}{}", &caps[1], new_value))
                .to_string(),
            Ok(_) => {
                debug!("Key '{}' not in settings file, appending it", key);
                let mut result = yaml.to_string();
                if !result.is_empty() && !result.ends_with('\n') {
                    result.push('\n');
                }
                result.push_str(&format!("{}: {}\n", key, new_value));
                result
            }
            Err(e) => {
                warn!("Failed to create regex for key '{}': {}", key, e);
                yaml.to_string()
            }
        }
    }

    /// Generate YAML content with comments for new files
    fn to_yaml_with_comments(&self) -> String {
        format!(
            r#"# coco-index settings
# Values here override the built-in defaults; command-line flags override both.

# Added to every class id when converting annotations to detections.
# COCO exports number classes from 1; use -1 for models that count from 0.
class_id_offset: {}

# Douglas-Peucker tolerance (pixels) for simplifying traced mask contours
simplify_epsilon: {:?}

# Categories with this supercategory are left out of class name lists
excluded_supercategory: {}

# Pretty-print JSON output
pretty_json: {}
"#,
            self.class_id_offset,
            self.simplify_epsilon,
            yaml_string(&self.excluded_supercategory),
            self.pretty_json
        )
    }
}

/// Double-quoted scalar; JSON string escaping is valid YAML.
fn yaml_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{}\"", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = UserSettings::load(Some(&dir.path().join("nope.yaml")));
        assert_eq!(settings, UserSettings::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "class_id_offset: -1\n").unwrap();

        let settings = UserSettings::load(Some(&path));
        assert_eq!(settings.class_id_offset, -1);
        assert_eq!(settings.excluded_supercategory, "none");
        assert!(settings.pretty_json);
    }

    #[test]
    fn test_malformed_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "class_id_offset: [not a number\n").unwrap();

        assert_eq!(UserSettings::load(Some(&path)), UserSettings::default());
    }

    #[test]
    fn test_save_round_trip_keeps_comments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.yaml");

        UserSettings::default().save(&path).unwrap();

        let changed = UserSettings {
            class_id_offset: -1,
            simplify_epsilon: 2.5,
            excluded_supercategory: "background".to_string(),
            pretty_json: false,
        };
        changed.save(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("# Pretty-print JSON output"));
        assert_eq!(UserSettings::load(Some(&path)), changed);
    }

    #[test]
    fn test_save_writes_dollar_signs_literally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        let settings = UserSettings {
            excluded_supercategory: "$1 costs $0 \"quoted\"".to_string(),
            ..UserSettings::default()
        };

        // First save creates the file, the second updates it in place
        settings.save(&path).unwrap();
        settings.save(&path).unwrap();
        assert_eq!(UserSettings::load(Some(&path)), settings);
    }

    #[test]
    fn test_save_appends_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.yaml");
        fs::write(&path, "# hand written\nclass_id_offset: 3").unwrap();

        let changed = UserSettings {
            class_id_offset: -1,
            simplify_epsilon: 0.25,
            excluded_supercategory: "background".to_string(),
            pretty_json: false,
        };
        changed.save(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("# hand written\nclass_id_offset: -1\n"));
        assert_eq!(UserSettings::load(Some(&path)), changed);
    }
}
