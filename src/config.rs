//! Runtime configuration.
//!
//! All fields have defaults, so a configuration file only needs to contain the
//! values that differ from them. Durations are stored in milliseconds.

#[cfg(feature = "fs")]
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
#[cfg(feature = "fs")]
use tracing::debug;

/// Error type returned by configuration loading.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[cfg(feature = "fs")]
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[cfg(feature = "fs")]
    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("user configuration directory not available")]
    NoConfigDir,
}

/// Common configuration result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Device configuration.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub timeouts: Timeouts,
    /// Language ID for string descriptors (English, United States).
    pub lang_id: u16,
    /// Delay between the Broadcom minidriver download and the first patch
    /// record.
    #[serde(with = "millis")]
    pub bcm_settle_delay: Duration,
    /// Maximum number of unrelated events to skip while waiting for a command
    /// completion.
    pub max_event_reads: usize,
}

impl Config {
    #[cfg(feature = "fs")]
    const FILE_NAME: &'static str = "btusb.json";

    /// Loads the configuration from a JSON file.
    #[cfg(feature = "fs")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)?;
        debug!("Loaded configuration: {}", path.display());
        Ok(serde_json::from_str(&s)?)
    }

    /// Loads the configuration from the current user's configuration directory
    /// or returns the default configuration if the file does not exist.
    #[cfg(feature = "fs")]
    pub fn per_user(app: impl AsRef<Path>) -> Result<Self> {
        let path = (dirs::config_dir().ok_or(Error::NoConfigDir)?)
            .join(app.as_ref())
            .join(Self::FILE_NAME);
        match Self::load(&path) {
            Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Using default configuration ({} not found)", path.display());
                Ok(Self::default())
            }
            r => r,
        }
    }

    /// Saves the configuration to a JSON file.
    #[cfg(feature = "fs")]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!("Wrote: {}", path.display());
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeouts: Timeouts::default(),
            lang_id: 0x0409,
            bcm_settle_delay: Duration::from_millis(50),
            max_event_reads: 16,
        }
    }
}

/// Transfer timeouts. [`Duration::ZERO`] means no timeout.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Timeouts {
    /// Control transfers on endpoint 0.
    #[serde(with = "millis")]
    pub control: Duration,
    /// HCI command completion.
    #[serde(with = "millis")]
    pub command: Duration,
    /// Controller initialization, such as the Broadcom minidriver start.
    #[serde(with = "millis")]
    pub init: Duration,
    /// Bulk transfers. Used by callers of [`crate::dev::Pipe`], which takes
    /// explicit timeouts.
    #[serde(with = "millis")]
    pub bulk: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            control: Duration::from_millis(5000),
            command: Duration::from_millis(2000),
            init: Duration::from_millis(10000),
            bulk: Duration::ZERO,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
