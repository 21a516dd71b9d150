use serde::{Deserialize, Serialize};

use super::Payload;

/// Request payload for `Command::EjectDisk`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EjectRequest {
    pub disk: String,
}

impl Payload for EjectRequest {}

/// Response payload for `Command::GetDisks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiskList {
    pub disks: Vec<String>,
}

impl Payload for DiskList {}
