use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CasSettlementId, EftFileId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettlementFileStatus {
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CasSettlement {
    pub id: CasSettlementId,
    pub file_name: String,
    pub status: SettlementFileStatus,
    pub received_on: DateTime<Utc>,
}

/// CAS TDI17 electronic-funds-transfer feedback file (§4.7, §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EftFile {
    pub id: EftFileId,
    pub file_name: String,
    pub status: SettlementFileStatus,
    pub received_on: DateTime<Utc>,
}
