use serde_json::Value;

use crate::contract::{Contract, ExerciseOutcome, Payload};
use crate::error::LedgerResult;
use crate::ids::{ContractId, Party, TemplateId};

/// The ledger command surface the oracle drives.
///
/// Calls are single blocking round trips issued strictly in sequence. None
/// of them is idempotent: a repeated `create` makes a second contract and a
/// repeated `exercise` against an archived id must be rejected.
/// Implementations build whatever credential the acting or reading party
/// needs; callers only name parties.
pub trait LedgerApi {
    /// Requests a fresh identity. The hint is only a prefix; implementations
    /// must never return an identity they have returned before.
    fn allocate_party(&self, hint: &str) -> LedgerResult<Party>;

    fn create(
        &self,
        actor: &Party,
        template_id: &TemplateId,
        payload: &Payload,
    ) -> LedgerResult<Contract>;

    fn exercise(
        &self,
        actor: &Party,
        template_id: &TemplateId,
        contract_id: &ContractId,
        choice: &str,
        argument: &Value,
    ) -> LedgerResult<ExerciseOutcome>;

    /// `Ok(None)` when the contract is archived or not visible to `reader`.
    fn fetch(
        &self,
        reader: &Party,
        template_id: &TemplateId,
        contract_id: &ContractId,
    ) -> LedgerResult<Option<Contract>>;

    /// Active contracts of `template_ids` visible to `reader` whose payload
    /// contains every entry of `filter`.
    fn query(
        &self,
        reader: &Party,
        template_ids: &[TemplateId],
        filter: &Payload,
    ) -> LedgerResult<Vec<Contract>>;
}

impl<T: LedgerApi + ?Sized> LedgerApi for &T {
    fn allocate_party(&self, hint: &str) -> LedgerResult<Party> {
        (**self).allocate_party(hint)
    }

    fn create(
        &self,
        actor: &Party,
        template_id: &TemplateId,
        payload: &Payload,
    ) -> LedgerResult<Contract> {
        (**self).create(actor, template_id, payload)
    }

    fn exercise(
        &self,
        actor: &Party,
        template_id: &TemplateId,
        contract_id: &ContractId,
        choice: &str,
        argument: &Value,
    ) -> LedgerResult<ExerciseOutcome> {
        (**self).exercise(actor, template_id, contract_id, choice, argument)
    }

    fn fetch(
        &self,
        reader: &Party,
        template_id: &TemplateId,
        contract_id: &ContractId,
    ) -> LedgerResult<Option<Contract>> {
        (**self).fetch(reader, template_id, contract_id)
    }

    fn query(
        &self,
        reader: &Party,
        template_ids: &[TemplateId],
        filter: &Payload,
    ) -> LedgerResult<Vec<Contract>> {
        (**self).query(reader, template_ids, filter)
    }
}
