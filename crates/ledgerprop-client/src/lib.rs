// Copyright (c) 2026 ledgerprop Contributors
// SPDX-License-Identifier: Apache-2.0

//! ledgerprop-client
//!
//! The HTTP side of the harness: configuration, the blocking transport
//! client for `create`/`exercise`/`fetch`/`query`, and the party allocator.
//! [`LedgerClient`] implements [`LedgerApi`] so the oracle can drive a real
//! ledger.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod allocator;
pub mod config;
pub mod transport;

use ledgerprop_auth::Profile;
use ledgerprop_core::{
    Contract, ContractId, ExerciseOutcome, LedgerApi, LedgerResult, Party, Payload, TemplateId,
};
use serde_json::Value;

pub use allocator::{unique_hint, AllocationRequest, AllocationResult, PartyAllocator};
pub use config::{ConfigError, HarnessConfig};
pub use transport::{normalize, LedgerClient};

impl LedgerApi for LedgerClient {
    fn allocate_party(&self, hint: &str) -> LedgerResult<Party> {
        self.allocate(hint)
    }

    fn create(
        &self,
        actor: &Party,
        template_id: &TemplateId,
        payload: &Payload,
    ) -> LedgerResult<Contract> {
        let credential = self.credential(Profile::actor(actor.as_str()))?;
        LedgerClient::create(self, template_id, payload, &credential)
    }

    fn exercise(
        &self,
        actor: &Party,
        template_id: &TemplateId,
        contract_id: &ContractId,
        choice: &str,
        argument: &Value,
    ) -> LedgerResult<ExerciseOutcome> {
        let credential = self.credential(Profile::actor(actor.as_str()))?;
        LedgerClient::exercise(self, template_id, contract_id, choice, argument, &credential)
    }

    fn fetch(
        &self,
        reader: &Party,
        template_id: &TemplateId,
        contract_id: &ContractId,
    ) -> LedgerResult<Option<Contract>> {
        let credential = self.credential(Profile::reader([reader.as_str()]))?;
        LedgerClient::fetch(self, template_id, contract_id, &credential)
    }

    fn query(
        &self,
        reader: &Party,
        template_ids: &[TemplateId],
        filter: &Payload,
    ) -> LedgerResult<Vec<Contract>> {
        let credential = self.credential(Profile::reader([reader.as_str()]))?;
        LedgerClient::query(self, template_ids, filter, &credential)
    }
}
