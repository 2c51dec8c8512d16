//! Fresh, collision-free parties.
//!
//! Each request carries `{prefix}-{12 hex chars}` as its identifier hint, the
//! suffix drawn from the OS RNG, so repeated or concurrent allocations with the
//! same prefix never ask the ledger for the same identity. The allocator also
//! remembers every party it has handed out and treats a repeat as an error.

use std::collections::HashSet;

use ledgerprop_auth::Profile;
use ledgerprop_core::{LedgerError, LedgerResult, Party};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::transport::LedgerClient;

const OPERATION: &str = "parties/allocate";
const SUFFIX_BYTES: usize = 6;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationRequest {
    pub identifier_hint: String,
    pub display_name: String,
    pub is_local: bool,
}

#[derive(Debug, Deserialize)]
pub struct PartyDetails {
    pub party: String,
}

/// The response shapes different ledger versions have used.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AllocationResult {
    Direct {
        party: String,
    },
    #[serde(rename_all = "camelCase")]
    Nested {
        party_details: PartyDetails,
    },
    Identifier {
        identifier: String,
    },
}

impl AllocationResult {
    pub fn from_value(value: Value) -> LedgerResult<Self> {
        let rendered = value.to_string();
        serde_json::from_value(value).map_err(|_| {
            LedgerError::shape(OPERATION, format!("unrecognized allocation result {rendered}"))
        })
    }

    pub fn into_party(self) -> LedgerResult<Party> {
        let raw = match self {
            Self::Direct { party } => party,
            Self::Nested { party_details } => party_details.party,
            Self::Identifier { identifier } => identifier,
        };
        if raw.trim().is_empty() {
            return Err(LedgerError::shape(OPERATION, "empty party identifier"));
        }
        Ok(Party::new(raw))
    }
}

/// `{prefix}-{12 lowercase hex chars}`.
pub fn unique_hint(prefix: &str) -> String {
    let mut suffix = [0u8; SUFFIX_BYTES];
    OsRng.fill_bytes(&mut suffix);
    format!("{prefix}-{}", hex::encode(suffix))
}

#[derive(Debug, Default)]
pub struct PartyAllocator {
    issued: Mutex<HashSet<Party>>,
}

impl PartyAllocator {
    pub fn issued(&self) -> usize {
        self.issued.lock().len()
    }

    fn remember(&self, party: &Party) -> LedgerResult<()> {
        if self.issued.lock().insert(party.clone()) {
            Ok(())
        } else {
            Err(LedgerError::shape(
                OPERATION,
                format!("ledger returned already-issued party {party}"),
            ))
        }
    }
}

impl LedgerClient {
    /// Allocates a fresh party whose hint starts with `prefix`.
    pub fn allocate(&self, prefix: &str) -> LedgerResult<Party> {
        let hint = unique_hint(prefix);
        let request = AllocationRequest {
            identifier_hint: hint.clone(),
            display_name: hint,
            is_local: true,
        };
        self.allocate_with(&request)
    }

    pub fn allocate_with(&self, request: &AllocationRequest) -> LedgerResult<Party> {
        let admin = self.credential(Profile::Admin)?;
        let result = self.post(OPERATION, OPERATION, request, &admin)?;
        let party = AllocationResult::from_value(result)?.into_party()?;
        self.parties.remember(&party)?;
        debug!(hint = %request.identifier_hint, party = %party, "party allocated");
        Ok(party)
    }

    /// One party per prefix, pairwise distinct.
    pub fn allocate_many(&self, prefixes: &[&str]) -> LedgerResult<Vec<Party>> {
        let mut out: Vec<Party> = Vec::with_capacity(prefixes.len());
        for prefix in prefixes {
            let party = self.allocate(prefix)?;
            if out.contains(&party) {
                return Err(LedgerError::shape(
                    OPERATION,
                    format!("party {party} allocated twice in one role set"),
                ));
            }
            out.push(party);
        }
        Ok(out)
    }

    pub fn parties_issued(&self) -> usize {
        self.parties.issued()
    }
}
