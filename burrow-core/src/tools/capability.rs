//! Capability policy for workspace tools
//!
//! Each tool declares what it touches; the runtime refuses a call when any
//! declared capability is denied. The server allows everything unless the
//! configuration lists capabilities under `tools.deny`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Capabilities that tools may require
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Read files, list directories, or move the current directory
    FilesystemRead,

    /// Create, edit, or append to workspace files
    FilesystemWrite,

    /// Start shell commands, interpreters, or npm
    Subprocess,

    /// Signal or inspect processes by pid
    ProcessControl,
}

impl Capability {
    /// Get all defined capabilities
    pub fn all() -> &'static [Capability] {
        &[
            Capability::FilesystemRead,
            Capability::FilesystemWrite,
            Capability::Subprocess,
            Capability::ProcessControl,
        ]
    }

    /// Get the string name of this capability
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::FilesystemRead => "filesystem_read",
            Capability::FilesystemWrite => "filesystem_write",
            Capability::Subprocess => "subprocess",
            Capability::ProcessControl => "process_control",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An ordered set of capabilities
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilitySet {
    capabilities: BTreeSet<Capability>,
}

impl CapabilitySet {
    /// Create an empty capability set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a capability
    pub fn add(&mut self, cap: Capability) -> &mut Self {
        self.capabilities.insert(cap);
        self
    }

    /// Check if capability is present
    pub fn contains(&self, cap: Capability) -> bool {
        self.capabilities.contains(&cap)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    /// Get iterator over capabilities
    pub fn iter(&self) -> impl Iterator<Item = &Capability> {
        self.capabilities.iter()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<T: IntoIterator<Item = Capability>>(iter: T) -> Self {
        Self {
            capabilities: iter.into_iter().collect(),
        }
    }
}

impl std::fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.iter().map(Capability::as_str).collect();
        write!(f, "{}", names.join(", "))
    }
}

/// Which capabilities tool calls may use
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityPolicy {
    denied: CapabilitySet,
}

impl CapabilityPolicy {
    /// Allow every capability
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Allow everything except `caps`
    pub fn deny_many(caps: impl IntoIterator<Item = Capability>) -> Self {
        Self {
            denied: caps.into_iter().collect(),
        }
    }

    /// Deny one more capability
    pub fn deny(mut self, cap: Capability) -> Self {
        self.denied.add(cap);
        self
    }

    /// Check if a capability is allowed by this policy
    pub fn is_allowed(&self, cap: Capability) -> bool {
        !self.denied.contains(cap)
    }

    /// Check every required capability, returning the denied ones
    pub fn check_all(&self, required: &CapabilitySet) -> Result<(), CapabilitySet> {
        let denied: CapabilitySet = required
            .iter()
            .copied()
            .filter(|cap| !self.is_allowed(*cap))
            .collect();

        if denied.is_empty() { Ok(()) } else { Err(denied) }
    }

    /// Get denied capabilities
    pub fn denied(&self) -> &CapabilitySet {
        &self.denied
    }
}
