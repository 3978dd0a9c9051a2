//! Capability declarations.
//!
//! Plugins declare the permissions they introduce; the loader upserts them by
//! name when the plugin initializes. Enforcement belongs to an external
//! authorization component.
use serde::{Deserialize, Serialize};

use crate::storage::records::CapabilityRecord;

pub const CONTEXT_SYSTEM: i64 = 10;
pub const CONTEXT_USER: i64 = 30;
pub const CONTEXT_COURSECAT: i64 = 40;
pub const CONTEXT_COURSE: i64 = 50;
pub const CONTEXT_MODULE: i64 = 70;
pub const CONTEXT_BLOCK: i64 = 80;

pub const RISK_MANAGETRUST: u32 = 0x01;
pub const RISK_CONFIG: u32 = 0x02;
pub const RISK_XSS: u32 = 0x04;
pub const RISK_PERSONAL: u32 = 0x08;
pub const RISK_SPAM: u32 = 0x10;
pub const RISK_DATALOSS: u32 = 0x20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessType {
    Read,
    Write,
}

/// A capability as declared by a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityDefinition {
    pub name: String,
    pub access_type: AccessType,
    pub context_level: i64,
    pub risk_bits: u32,
}

impl CapabilityDefinition {
    pub fn new(name: impl Into<String>, access_type: AccessType, context_level: i64) -> Self {
        Self {
            name: name.into(),
            access_type,
            context_level,
            risk_bits: 0,
        }
    }

    pub fn with_risks(mut self, risk_bits: u32) -> Self {
        self.risk_bits |= risk_bits;
        self
    }

    /// The persisted form, owned by `component`.
    pub fn into_record(self, component: &str) -> CapabilityRecord {
        CapabilityRecord {
            name: self.name,
            access_type: self.access_type,
            context_level: self.context_level,
            component: component.to_string(),
            risk_bits: self.risk_bits,
        }
    }
}
