//! Machine id generation for simulated instances.

use rand::prelude::*;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use updatectl_common::MachineId;

/// Well-known prefix that marks an id as belonging to a fake instance
pub const RECOGNIZABLE_PREFIX: &str = "deadbeef";

/// Random hex characters appended to the prefix, shared by one run
const RUN_TAG_LEN: usize = 6;

const HEX_CHARS: &[u8] = b"abcdef0123456789";

/// How machine ids are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityScheme {
    /// `deadbeef` + run tag + random hex; 32 hex characters, a dash-less UUID
    #[default]
    Recognizable,
    /// `{fake-client-000}`, `{fake-client-001}`, ...
    Sequential,
}

impl fmt::Display for IdentityScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityScheme::Recognizable => write!(f, "recognizable"),
            IdentityScheme::Sequential => write!(f, "sequential"),
        }
    }
}

impl FromStr for IdentityScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recognizable" => Ok(IdentityScheme::Recognizable),
            "sequential" => Ok(IdentityScheme::Sequential),
            other => Err(format!(
                "unknown id scheme '{}' (expected 'recognizable' or 'sequential')",
                other
            )),
        }
    }
}

/// Hands out unique machine ids for one run
#[derive(Debug)]
pub struct IdentityGenerator {
    scheme: IdentityScheme,
    /// `deadbeef` + run tag (recognizable scheme only)
    prefix: String,
    next: usize,
    issued: HashSet<MachineId>,
}

impl IdentityGenerator {
    pub fn new(scheme: IdentityScheme, rng: &mut StdRng) -> Self {
        let prefix = format!("{}{}", RECOGNIZABLE_PREFIX, random_hex(rng, RUN_TAG_LEN));
        Self {
            scheme,
            prefix,
            next: 0,
            issued: HashSet::new(),
        }
    }

    /// Prefix shared by every id of this run, if the scheme uses one
    pub fn prefix(&self) -> Option<&str> {
        match self.scheme {
            IdentityScheme::Recognizable => Some(&self.prefix),
            IdentityScheme::Sequential => None,
        }
    }

    /// Next id, never equal to one handed out before
    pub fn next_id(&mut self) -> MachineId {
        loop {
            let id = match self.scheme {
                IdentityScheme::Sequential => {
                    MachineId::new(format!("{{fake-client-{:03}}}", self.next))
                }
                IdentityScheme::Recognizable => {
                    let tail = Uuid::new_v4().simple().to_string();
                    let keep = 32 - self.prefix.len();
                    MachineId::new(format!("{}{}", self.prefix, &tail[tail.len() - keep..]))
                }
            };
            self.next += 1;

            if self.issued.insert(id.clone()) {
                return id;
            }
        }
    }
}

fn random_hex(rng: &mut StdRng, len: usize) -> String {
    (0..len)
        .map(|_| HEX_CHARS[rng.random_range(0..HEX_CHARS.len())] as char)
        .collect()
}
