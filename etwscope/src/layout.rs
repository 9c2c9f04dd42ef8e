//! Kernel layout profiles
//!
//! Structure layouts move between kernel builds, so the offsets the core
//! probes are data, not code. A [`LayoutTable`] maps build ranges to
//! [`LayoutProfile`]s and can be loaded from JSON; any field a profile leaves
//! out falls back to the built-in defaults from `etw_layout`.
//!
//! ```json
//! {
//!   "profiles": [
//!     { "name": "win11-22h2", "min_build": 22621, "pid_offsets": [1088] },
//!     { "name": "fallback" }
//!   ]
//! }
//! ```

use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::domain::LayoutError;

/// Largest image-name buffer a profile may ask the offset probe to read
pub const MAX_IMAGE_NAME_LEN: usize = 256;

/// Names and offsets for one family of kernel builds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutProfile {
    pub name: String,
    /// First build this profile applies to (inclusive)
    pub min_build: Option<u32>,
    /// Last build this profile applies to (inclusive)
    pub max_build: Option<u32>,

    pub logger_context_type: String,
    pub consumer_type: String,
    pub num_consumers_field: String,
    pub consumer_links_field: String,
    pub process_object_field: String,

    /// Offset of the consumer list head inside the logger context
    pub consumer_list_offset: u64,
    /// Candidate PID offsets in the process object, highest priority first
    pub pid_offsets: Vec<u64>,
    /// Candidate image-name offsets in the process object, highest priority first
    pub image_name_offsets: Vec<u64>,
    pub image_name_len: usize,
    /// Exclusive upper bound for a plausible PID
    pub pid_ceiling: u64,
}

impl Default for LayoutProfile {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            min_build: None,
            max_build: None,
            logger_context_type: etw_layout::LOGGER_CONTEXT_TYPE.to_string(),
            consumer_type: etw_layout::REALTIME_CONSUMER_TYPE.to_string(),
            num_consumers_field: etw_layout::NUM_CONSUMERS_FIELD.to_string(),
            consumer_links_field: etw_layout::CONSUMER_LINKS_FLINK_FIELD.to_string(),
            process_object_field: etw_layout::PROCESS_OBJECT_FIELD.to_string(),
            consumer_list_offset: etw_layout::CONSUMER_LIST_OFFSET,
            pid_offsets: etw_layout::PID_OFFSETS.to_vec(),
            image_name_offsets: etw_layout::IMAGE_NAME_OFFSETS.to_vec(),
            image_name_len: etw_layout::IMAGE_NAME_LEN,
            pid_ceiling: etw_layout::PID_SANITY_CEILING,
        }
    }
}

impl LayoutProfile {
    /// True if this profile has a build range and `build` lies inside it
    #[must_use]
    pub fn covers(&self, build: u32) -> bool {
        if self.min_build.is_none() && self.max_build.is_none() {
            return false;
        }
        self.min_build.map_or(true, |min| build >= min)
            && self.max_build.map_or(true, |max| build <= max)
    }

    fn is_catch_all(&self) -> bool {
        self.min_build.is_none() && self.max_build.is_none()
    }

    fn validate(&self) -> Result<(), LayoutError> {
        let invalid = |reason: &str| LayoutError::InvalidProfile {
            profile: self.name.clone(),
            reason: reason.to_string(),
        };
        if let (Some(min), Some(max)) = (self.min_build, self.max_build) {
            if min > max {
                return Err(invalid("min_build is greater than max_build"));
            }
        }
        if self.image_name_len == 0 {
            return Err(invalid("image_name_len must be at least 1"));
        }
        if self.image_name_len > MAX_IMAGE_NAME_LEN {
            return Err(invalid("image_name_len exceeds 256 bytes"));
        }
        if self.pid_ceiling < 2 {
            return Err(invalid("pid_ceiling leaves no plausible PID"));
        }
        Ok(())
    }
}

/// Ordered set of layout profiles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutTable {
    pub profiles: Vec<LayoutProfile>,
}

impl Default for LayoutTable {
    fn default() -> Self {
        Self { profiles: vec![LayoutProfile::default()] }
    }
}

impl LayoutTable {
    /// Load a table from a JSON file
    ///
    /// # Errors
    /// Returns an error if the file is unreadable, malformed, empty, or has an
    /// inconsistent profile
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, LayoutError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json(&content)
    }

    /// Parse a table from JSON text
    ///
    /// # Errors
    /// See [`LayoutTable::from_file`]
    pub fn from_json(content: &str) -> Result<Self, LayoutError> {
        let table: LayoutTable = serde_json::from_str(content)?;
        if table.profiles.is_empty() {
            return Err(LayoutError::Empty);
        }
        for profile in &table.profiles {
            profile.validate()?;
        }
        Ok(table)
    }

    /// Pick the profile for a kernel build.
    ///
    /// First profile whose range covers `build`, else the first profile
    /// without a range, else the built-in default.
    #[must_use]
    pub fn select(&self, build: Option<u32>) -> LayoutProfile {
        let ranged = build.and_then(|b| self.profiles.iter().find(|p| p.covers(b)));
        let chosen = ranged.or_else(|| self.profiles.iter().find(|p| p.is_catch_all()));

        match chosen {
            Some(profile) => {
                info!(target: "etwscope::layout", "Using layout profile '{}'", profile.name);
                profile.clone()
            }
            None => {
                info!(
                    target: "etwscope::layout",
                    "No layout profile matches build {build:?}, using built-in default"
                );
                LayoutProfile::default()
            }
        }
    }
}
