//! The contract store behind the sandbox routes.
//!
//! Contracts are interpreted through their registered [`TemplateModel`]: the
//! model decides whether an exercise is legal and what it produces, the store
//! only enforces existence, archival, and read visibility.

use std::collections::HashSet;

use ledgerprop_auth::LedgerApiClaims;
use ledgerprop_core::{Contract, ContractId, Payload, Prediction, Refusal, TemplateId, TemplateModel};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const BAD_REQUEST: u16 = 400;
pub const UNAUTHORIZED: u16 = 401;
pub const FORBIDDEN: u16 = 403;
pub const NOT_FOUND: u16 = 404;
pub const CONFLICT: u16 = 409;
pub const INTERNAL: u16 = 500;

/// A refusal carried back to the client inside an `errors` envelope.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{status}: {message}")]
pub struct Refused {
    pub status: u16,
    pub message: String,
}

impl Refused {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<Refusal> for Refused {
    fn from(refusal: Refusal) -> Self {
        let status = match refusal {
            Refusal::Unauthorized { .. } => FORBIDDEN,
            _ => BAD_REQUEST,
        };
        Self::new(status, refusal.to_string())
    }
}

pub type Outcome<T> = Result<T, Refused>;

#[derive(Debug)]
pub struct Ledger {
    participant: String,
    models: Vec<TemplateModel>,
    active: Vec<Contract>,
    archived: HashSet<ContractId>,
    parties: HashSet<String>,
    first_party: Option<String>,
    next_id: u64,
}

impl Ledger {
    pub fn new(participant: impl Into<String>, models: Vec<TemplateModel>) -> Self {
        Self {
            participant: participant.into(),
            models,
            active: Vec::new(),
            archived: HashSet::new(),
            parties: HashSet::new(),
            first_party: None,
            next_id: 1,
        }
    }

    pub fn register(&mut self, model: TemplateModel) {
        self.models
            .retain(|known| known.template_id() != model.template_id());
        self.models.push(model);
    }

    pub fn active(&self) -> &[Contract] {
        &self.active
    }

    pub fn is_archived(&self, contract_id: &ContractId) -> bool {
        self.archived.contains(contract_id)
    }

    fn model(&self, template_id: &TemplateId) -> Outcome<&TemplateModel> {
        self.models
            .iter()
            .find(|model| model.template_id().matches(template_id))
            .ok_or_else(|| Refused::new(BAD_REQUEST, format!("unknown template {template_id}")))
    }

    fn mint(&mut self) -> ContractId {
        let id = ContractId::new(format!("#{}:0", self.next_id));
        self.next_id += 1;
        id
    }

    fn insert(&mut self, template_id: TemplateId, payload: Payload) -> Contract {
        let contract = Contract {
            contract_id: self.mint(),
            template_id,
            payload,
        };
        self.active.push(contract.clone());
        contract
    }

    fn position(&self, contract_id: &ContractId) -> Outcome<usize> {
        self.active
            .iter()
            .position(|contract| &contract.contract_id == contract_id)
            .ok_or_else(|| {
                let reason = if self.archived.contains(contract_id) {
                    "archived"
                } else {
                    "not found"
                };
                Refused::new(NOT_FOUND, format!("contract {contract_id} {reason}"))
            })
    }

    pub fn create(
        &mut self,
        claims: &LedgerApiClaims,
        template_id: &TemplateId,
        payload: Payload,
    ) -> Outcome<Contract> {
        let model = self.model(template_id)?;
        model
            .validate_payload(&payload)
            .map_err(|err| Refused::new(BAD_REQUEST, err.to_string()))?;
        let signatory = model.signatory(&payload).unwrap_or_default().to_string();
        if !claims.acting().iter().any(|party| *party == signatory) {
            return Err(Refused::new(
                FORBIDDEN,
                format!("missing authorization from signatory {signatory}"),
            ));
        }
        let resolved = model.template_id().clone();
        let contract = self.insert(resolved, payload);
        debug!(contract_id = %contract.contract_id, template = %contract.template_id, "created");
        Ok(contract)
    }

    /// Returns the `exerciseResult` value.
    pub fn exercise(
        &mut self,
        claims: &LedgerApiClaims,
        template_id: &TemplateId,
        contract_id: &ContractId,
        choice: &str,
        argument: &Value,
    ) -> Outcome<Value> {
        let Value::Object(args) = argument else {
            return Err(Refused::new(BAD_REQUEST, "argument must be an object"));
        };
        let Some((first_actor, other_actors)) = claims.acting().split_first() else {
            return Err(Refused::new(FORBIDDEN, "exercise requires an acting party"));
        };
        let index = self.position(contract_id)?;
        let current = &self.active[index];
        if !current.template_id.matches(template_id) {
            return Err(Refused::new(
                BAD_REQUEST,
                format!("contract {contract_id} is not a {template_id}"),
            ));
        }
        let model = self.model(&current.template_id)?;

        // Any acting party may supply the authorization.
        let mut outcome = model.apply(&current.payload, choice, first_actor, args);
        for actor in other_actors {
            if !matches!(outcome, Err(Refusal::Unauthorized { .. })) {
                break;
            }
            outcome = model.apply(&current.payload, choice, actor, args);
        }

        match outcome? {
            Prediction::Successor(next) => {
                let archived = self.active.remove(index);
                self.archived.insert(archived.contract_id.clone());
                let successor = self.insert(archived.template_id, next);
                debug!(
                    archived = %archived.contract_id,
                    successor = %successor.contract_id,
                    choice,
                    "consumed"
                );
                Ok(Value::String(successor.contract_id.to_string()))
            }
            Prediction::Value { value, .. } => Ok(value),
            Prediction::Spawned {
                template_id,
                payload,
                ..
            } => {
                let spawned_model = self.model(&template_id)?;
                spawned_model
                    .validate_payload(&payload)
                    .map_err(|err| Refused::new(BAD_REQUEST, err.to_string()))?;
                let resolved = spawned_model.template_id().clone();
                let spawned = self.insert(resolved, payload);
                debug!(contract_id = %spawned.contract_id, choice, "spawned");
                Ok(Value::String(spawned.contract_id.to_string()))
            }
        }
    }

    fn visible(&self, claims: &LedgerApiClaims, contract: &Contract) -> bool {
        let Ok(model) = self.model(&contract.template_id) else {
            return false;
        };
        let stakeholders = model.stakeholders(&contract.payload);
        claims
            .readers()
            .any(|reader| stakeholders.contains(&reader))
    }

    /// `None` for archived, unknown, and invisible contracts alike.
    pub fn fetch(
        &self,
        claims: &LedgerApiClaims,
        template_id: &TemplateId,
        contract_id: &ContractId,
    ) -> Option<Contract> {
        self.active
            .iter()
            .find(|contract| &contract.contract_id == contract_id)
            .filter(|contract| contract.template_id.matches(template_id))
            .filter(|contract| self.visible(claims, contract))
            .cloned()
    }

    /// Active, visible contracts of the given templates whose payload agrees
    /// with every entry of `filter`.
    pub fn query(
        &self,
        claims: &LedgerApiClaims,
        template_ids: &[TemplateId],
        filter: &Payload,
    ) -> Vec<Contract> {
        self.active
            .iter()
            .filter(|contract| {
                template_ids
                    .iter()
                    .any(|template_id| contract.template_id.matches(template_id))
            })
            .filter(|contract| {
                filter.iter().all(|(key, expected)| match key.as_str() {
                    "contractId" => expected.as_str() == Some(contract.contract_id.as_str()),
                    _ => contract.payload.get(key) == Some(expected),
                })
            })
            .filter(|contract| self.visible(claims, contract))
            .cloned()
            .collect()
    }

    /// Returns the new party identifier. With `repeat` set, hands back the
    /// first party ever allocated instead of a fresh one.
    pub fn allocate(
        &mut self,
        claims: &LedgerApiClaims,
        hint: &str,
        repeat: bool,
    ) -> Outcome<String> {
        if !claims.admin {
            return Err(Refused::new(FORBIDDEN, "party allocation requires admin"));
        }
        if repeat {
            if let Some(first) = &self.first_party {
                return Ok(first.clone());
            }
        }
        if hint.trim().is_empty() {
            return Err(Refused::new(BAD_REQUEST, "identifierHint must not be empty"));
        }
        let party = format!("{hint}::{}", self.participant);
        if !self.parties.insert(party.clone()) {
            return Err(Refused::new(CONFLICT, format!("party {party} already exists")));
        }
        self.first_party.get_or_insert_with(|| party.clone());
        debug!(party = %party, "allocated");
        Ok(party)
    }
}
