use rollcall_core::DetectorSettings;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read detector settings {path}: {source}")]
    ReadSettings {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid detector settings {path}: {source}")]
    ParseSettings {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to listen on (all interfaces).
    pub port: u16,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Directory holding archived reference face images.
    pub faces_dir: PathBuf,
    /// SeetaFace frontal detector model.
    pub detector_model: PathBuf,
    /// Cosine similarity a probe must exceed to be accepted.
    pub similarity_threshold: f32,
    /// Repeat recognitions within this many seconds are not recorded again.
    pub dedup_window_secs: i64,
    pub detector: DetectorSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            db_path: PathBuf::from("attendance.db"),
            faces_dir: PathBuf::from("known_faces"),
            detector_model: PathBuf::from("model/seeta_fd_frontal_v1.0.bin"),
            similarity_threshold: rollcall_core::DEFAULT_SIMILARITY_THRESHOLD,
            dedup_window_secs: 3600,
            detector: DetectorSettings::default(),
        }
    }
}

impl Config {
    /// Load configuration from `PORT` and `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let detector = match std::env::var("ROLLCALL_DETECTOR_TOML") {
            Ok(path) => load_detector_settings(PathBuf::from(path))?,
            Err(_) => defaults.detector,
        };

        Ok(Self {
            port: env_parse("PORT", defaults.port),
            db_path: env_path("ROLLCALL_DB_PATH", defaults.db_path),
            faces_dir: env_path("ROLLCALL_FACES_DIR", defaults.faces_dir),
            detector_model: env_path("ROLLCALL_DETECTOR_MODEL", defaults.detector_model),
            similarity_threshold: env_parse(
                "ROLLCALL_SIMILARITY_THRESHOLD",
                defaults.similarity_threshold,
            ),
            dedup_window_secs: env_parse("ROLLCALL_DEDUP_WINDOW_SECS", defaults.dedup_window_secs),
            detector,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

/// Read detector tuning from a TOML file; missing keys keep their defaults.
pub fn load_detector_settings(path: PathBuf) -> Result<DetectorSettings, ConfigError> {
    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::ReadSettings {
        path: path.clone(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::ParseSettings { path, source })
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.port, 5000);
        assert_eq!(config.dedup_window_secs, 3600);
        assert!((config.similarity_threshold - 0.85).abs() < 1e-6);
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn test_detector_settings_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_face_size = 64\nmax_face_size = 400").unwrap();

        let settings = load_detector_settings(file.path().to_path_buf()).unwrap();
        assert_eq!(settings.min_face_size, 64);
        assert_eq!(settings.max_face_size, Some(400));
        assert_eq!(settings.window_step, DetectorSettings::default().window_step);
    }

    #[test]
    fn test_detector_settings_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "min_face_size = \"big\"").unwrap();

        let err = load_detector_settings(file.path().to_path_buf()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseSettings { .. }));
    }

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        assert_eq!(env_parse::<u16>("ROLLCALL_TEST_UNSET_VARIABLE", 42), 42);
    }
}
