//! # Process Identity Resolution
//!
//! Turns an opaque process-object address into a PID and image name. There is
//! no single authoritative source for this, so resolution is an ordered chain
//! of [`IdentityStrategy`] values tried until one produces a usable PID:
//!
//! 1. **Command** - ask the host to dump the process object and parse the
//!    `Cid:` and `Image:` tokens from its text output.
//! 2. **Offset probe** - read the PID straight from candidate offsets inside
//!    the process object, then the image name from its own candidate offsets.
//!
//! If nothing yields a PID the result is the unresolved sentinel
//! (`pid = 0`, `"Unknown"`). Resolution never fails the caller.
//!
//! New strategies (for example a probe table for a newly released build) are
//! appended to the chain with [`IdentityResolver::with_strategy`].

use log::{debug, trace};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::domain::{Address, Pid, ResolutionSource};
use crate::layout::LayoutProfile;
use crate::memory::MemoryPort;

/// Image name reported when no strategy could recover one
pub const UNKNOWN_IMAGE: &str = "Unknown";

/// Resolved metadata for a process object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessIdentity {
    pub pid: Pid,
    pub image_name: String,
    pub source: ResolutionSource,
}

impl ProcessIdentity {
    /// The sentinel returned when every strategy fails
    #[must_use]
    pub fn unresolved() -> Self {
        Self {
            pid: Pid(0),
            image_name: UNKNOWN_IMAGE.to_string(),
            source: ResolutionSource::Unresolved,
        }
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.pid.is_resolved()
    }
}

/// What one strategy learned about a process object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// A usable PID was found; stop the chain
    Resolved(ProcessIdentity),
    /// No PID, but an image name later strategies may reuse
    ImageOnly(String),
    Nothing,
}

/// One link of the resolution chain
pub trait IdentityStrategy {
    fn name(&self) -> &'static str;

    /// Try to identify the process object at `process`.
    ///
    /// `image_hint` carries an image name found by an earlier strategy that
    /// could not produce a PID.
    fn probe(&self, port: &dyn MemoryPort, process: Address, image_hint: Option<&str>) -> Probe;
}

/// Parses the host's process-dump command output
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandStrategy;

fn process_header_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"PROCESS\s+[0-9a-fA-F`]+").expect("valid regex"))
}

fn cid_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bCid:\s+([0-9a-fA-F]+)").expect("valid regex"))
}

fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Image:\s+(.+)").expect("valid regex"))
}

impl CommandStrategy {
    /// Command that dumps basic information for one process object
    #[must_use]
    pub fn command_for(process: Address) -> String {
        format!("!process {} 0", process.to_command_hex())
    }

    /// Extract `(pid, image)` from process-dump output.
    ///
    /// The `Cid:` token is only trusted once a `PROCESS <addr>` header has been
    /// seen, on the same line or an earlier one. Later matches override
    /// earlier ones.
    #[must_use]
    pub fn parse_output<S: AsRef<str>>(lines: &[S]) -> (Option<u64>, Option<String>) {
        let mut in_process = false;
        let mut pid = None;
        let mut image = None;

        for line in lines {
            let line = line.as_ref();
            if process_header_regex().is_match(line) {
                in_process = true;
            }
            if in_process {
                if let Some(caps) = cid_regex().captures(line) {
                    if let Ok(value) = u64::from_str_radix(&caps[1], 16) {
                        pid = Some(value);
                    }
                }
            }
            if let Some(caps) = image_regex().captures(line) {
                let name = caps[1].trim();
                if !name.is_empty() {
                    image = Some(name.to_string());
                }
            }
        }

        (pid, image)
    }
}

impl IdentityStrategy for CommandStrategy {
    fn name(&self) -> &'static str {
        "command"
    }

    fn probe(&self, port: &dyn MemoryPort, process: Address, _image_hint: Option<&str>) -> Probe {
        let command = Self::command_for(process);
        let lines = match port.execute_command(&command) {
            Ok(lines) => lines,
            Err(e) => {
                debug!(target: "etwscope::identity", "{command}: {e}");
                return Probe::Nothing;
            }
        };

        match Self::parse_output(&lines) {
            (Some(pid), image) if pid > 0 => Probe::Resolved(ProcessIdentity {
                pid: Pid(pid),
                image_name: image.unwrap_or_else(|| UNKNOWN_IMAGE.to_string()),
                source: ResolutionSource::CommandBased,
            }),
            (_, Some(image)) => Probe::ImageOnly(image),
            _ => Probe::Nothing,
        }
    }
}

/// Reads PID and image name from candidate offsets inside the process object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetProbeStrategy {
    pub pid_offsets: Vec<u64>,
    pub image_name_offsets: Vec<u64>,
    pub image_name_len: usize,
    pub pid_ceiling: u64,
}

impl OffsetProbeStrategy {
    #[must_use]
    pub fn from_profile(profile: &LayoutProfile) -> Self {
        Self {
            pid_offsets: profile.pid_offsets.clone(),
            image_name_offsets: profile.image_name_offsets.clone(),
            image_name_len: profile.image_name_len,
            pid_ceiling: profile.pid_ceiling,
        }
    }

    /// First plausible PID across the candidate offsets
    fn probe_pid(&self, port: &dyn MemoryPort, process: Address) -> Option<u64> {
        self.pid_offsets.iter().find_map(|&offset| {
            let value = port.read_words(process.offset(offset), 1, 8).ok()?.first().copied()?;
            if etw_layout::is_plausible_pid(value, self.pid_ceiling) {
                debug!(target: "etwscope::identity", "Found PID {value} at offset 0x{offset:x}");
                Some(value)
            } else {
                trace!(target: "etwscope::identity", "Rejected 0x{value:x} at offset 0x{offset:x}");
                None
            }
        })
    }

    /// First non-empty image name across the candidate offsets
    fn probe_image(&self, port: &dyn MemoryPort, process: Address) -> Option<String> {
        self.image_name_offsets.iter().find_map(|&offset| {
            let bytes = port.read_bytes(process.offset(offset), self.image_name_len).ok()?;
            let name = decode_image_name(&bytes);
            if name.is_empty() {
                return None;
            }
            debug!(target: "etwscope::identity", "Found image '{name}' at offset 0x{offset:x}");
            Some(name)
        })
    }
}

impl IdentityStrategy for OffsetProbeStrategy {
    fn name(&self) -> &'static str {
        "offset-probe"
    }

    fn probe(&self, port: &dyn MemoryPort, process: Address, image_hint: Option<&str>) -> Probe {
        let Some(pid) = self.probe_pid(port, process) else {
            return Probe::Nothing;
        };
        let image_name = self
            .probe_image(port, process)
            .or_else(|| image_hint.map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_IMAGE.to_string());

        Probe::Resolved(ProcessIdentity {
            pid: Pid(pid),
            image_name,
            source: ResolutionSource::DirectOffsetProbe,
        })
    }
}

/// Decode a fixed-length single-byte character buffer up to its first NUL
fn decode_image_name(bytes: &[u8]) -> String {
    bytes.iter().take_while(|&&b| b != 0).map(|&b| char::from(b)).collect()
}

/// Ordered chain of identity strategies
pub struct IdentityResolver<'a> {
    port: &'a dyn MemoryPort,
    strategies: Vec<Box<dyn IdentityStrategy>>,
}

impl<'a> IdentityResolver<'a> {
    /// A resolver with no strategies (always unresolved)
    #[must_use]
    pub fn new(port: &'a dyn MemoryPort) -> Self {
        Self { port, strategies: Vec::new() }
    }

    /// The standard chain: command first, then offset probes from `profile`
    #[must_use]
    pub fn from_profile(port: &'a dyn MemoryPort, profile: &LayoutProfile) -> Self {
        Self::new(port)
            .with_strategy(Box::new(CommandStrategy))
            .with_strategy(Box::new(OffsetProbeStrategy::from_profile(profile)))
    }

    /// Append a strategy to the end of the chain
    #[must_use]
    pub fn with_strategy(mut self, strategy: Box<dyn IdentityStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Resolve the process object at `process`. Never fails.
    #[must_use]
    pub fn resolve(&self, process: Address) -> ProcessIdentity {
        let mut image_hint: Option<String> = None;

        for strategy in &self.strategies {
            match strategy.probe(self.port, process, image_hint.as_deref()) {
                Probe::Resolved(identity) => {
                    debug!(
                        target: "etwscope::identity",
                        "{process}: PID {} ({}) via {}",
                        identity.pid,
                        identity.image_name,
                        strategy.name()
                    );
                    return identity;
                }
                Probe::ImageOnly(image) => image_hint = Some(image),
                Probe::Nothing => {}
            }
        }

        debug!(target: "etwscope::identity", "{process}: no strategy produced a PID");
        ProcessIdentity::unresolved()
    }
}
