//! Drives scenarios against a ledger and checks every step against the
//! template's transition table.
//!
//! After each step the oracle checks the state invariant (predicted state
//! tag), the field invariants (declared rules only), the authorization and
//! guard invariants (refusals leave the current contract untouched and
//! exercisable), and the archive-on-exercise discipline (successor ids are
//! fresh, predecessors are gone).

use std::collections::HashSet;

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info};

use crate::api::LedgerApi;
use crate::contract::{Contract, Payload};
use crate::error::{LedgerError, Rejection};
use crate::ids::{ContractId, Party, TemplateId};
use crate::model::{FieldDiff, FieldKind, ModelError, Prediction, TemplateModel};

mod scenario;

pub use scenario::{Expect, Origin, Scenario, Step, StepOutcome, Trace};

/// A verdict against the ledger (or against the scenario itself).
#[derive(Debug, Error)]
pub enum OracleFailure {
    /// The scenario would submit something the model cannot represent,
    /// such as an amount that needs rounding.
    #[error("{step}: invalid scenario input: {reason}")]
    InvalidInput { step: String, reason: String },

    /// Transport and shape errors, passed through untouched.
    #[error("{step}: {source}")]
    Ledger {
        step: String,
        #[source]
        source: LedgerError,
    },

    #[error("{step}: expected success but {rejection}")]
    UnexpectedRejection { step: String, rejection: Rejection },

    #[error("{step}: accepted but the ledger should have refused it ({reason})")]
    UnexpectedAcceptance { step: String, reason: String },

    #[error("{step}: scenario expects {expected} but the model predicts {model}")]
    ExpectationConflict {
        step: String,
        expected: &'static str,
        model: String,
    },

    #[error("{step}: state is {actual} but the model predicts {expected}")]
    StateMismatch {
        step: String,
        expected: Value,
        actual: Value,
    },

    #[error("{step}: field {field} is {actual} but the model predicts {expected}")]
    FieldMismatch {
        step: String,
        field: String,
        expected: Value,
        actual: Value,
    },

    #[error("{step}: exercise returned {actual} but the model predicts {expected}")]
    ResultMismatch {
        step: String,
        expected: Value,
        actual: Value,
    },

    #[error("{step}: lineage violation: {detail}")]
    LineageViolation { step: String, detail: String },

    #[error("{step}: refused choice left a side effect: {detail}")]
    SideEffect { step: String, detail: String },

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("ledger returned party {0} twice")]
    DuplicateParty(Party),

    #[error("orderings disagree on {field}: {first} vs {second}")]
    NotCommutative {
        field: String,
        first: Value,
        second: Value,
    },
}

impl OracleFailure {
    /// The underlying ledger error, if this verdict wraps one.
    pub fn ledger_error(&self) -> Option<&LedgerError> {
        match self {
            Self::Ledger { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self.ledger_error(), Some(LedgerError::Transport { .. }))
    }
}

fn step_label(index: usize, choice: &str) -> String {
    format!("step {index} ({choice})")
}

/// Verifies scenarios for one template.
pub struct Oracle<'a, L: LedgerApi + ?Sized> {
    ledger: &'a L,
    model: &'a TemplateModel,
}

impl<'a, L: LedgerApi + ?Sized> Oracle<'a, L> {
    pub fn new(ledger: &'a L, model: &'a TemplateModel) -> Self {
        Self { ledger, model }
    }

    pub fn model(&self) -> &TemplateModel {
        self.model
    }

    /// Allocates one fresh party per hint and checks they are distinct.
    pub fn allocate_roles(&self, hints: &[&str]) -> Result<Vec<Party>, OracleFailure> {
        let mut seen = HashSet::new();
        let mut parties = Vec::with_capacity(hints.len());
        for hint in hints {
            let party = self
                .ledger
                .allocate_party(hint)
                .map_err(|source| OracleFailure::Ledger {
                    step: format!("allocate {hint}"),
                    source,
                })?;
            if !seen.insert(party.clone()) {
                return Err(OracleFailure::DuplicateParty(party));
            }
            parties.push(party);
        }
        Ok(parties)
    }

    pub fn run(&self, scenario: &Scenario) -> Result<Trace, OracleFailure> {
        let template_id = self.model.template_id();
        info!(
            scenario = %scenario.name,
            template = %template_id,
            steps = scenario.steps.len(),
            "scenario started"
        );

        let mut current = match &scenario.origin {
            Origin::Create { creator, payload } => {
                self.create_checked(creator, &scenario.reader, payload)?
            }
            Origin::Existing(contract) => contract.clone(),
        };
        let mut seen: HashSet<ContractId> = HashSet::new();
        seen.insert(current.contract_id.clone());
        let mut lineage = vec![current.contract_id.clone()];
        let mut outcomes = Vec::with_capacity(scenario.steps.len());

        for (index, step) in scenario.steps.iter().enumerate() {
            let label = step_label(index, &step.choice);
            debug!(
                scenario = %scenario.name,
                step = index,
                choice = %step.choice,
                actor = %step.actor,
                contract = %current.contract_id,
                "exercising"
            );
            let outcome =
                self.run_step(index, &label, step, &scenario.reader, &current, &mut seen)?;
            if let Some(next) = outcome.next {
                lineage.push(next.contract_id.clone());
                current = next;
            }
            outcomes.push(outcome.record);
        }

        info!(
            scenario = %scenario.name,
            template = %template_id,
            successors = lineage.len() - 1,
            "scenario finished"
        );
        Ok(Trace {
            scenario: scenario.name.clone(),
            lineage,
            outcomes,
            final_contract: current,
        })
    }

    /// Runs two orderings of the same steps and checks they end in the same
    /// state. Party-valued fields are skipped since each ordering usually
    /// allocates its own parties.
    pub fn commuting(
        &self,
        first: &Scenario,
        second: &Scenario,
    ) -> Result<(Trace, Trace), OracleFailure> {
        let a = self.run(first)?;
        let b = self.run(second)?;
        for (name, kind) in self.model.fields() {
            if mentions_party(kind) {
                continue;
            }
            let left = a.final_contract.field(name).cloned().unwrap_or(Value::Null);
            let right = b.final_contract.field(name).cloned().unwrap_or(Value::Null);
            if !kind.equivalent(&left, &right) {
                return Err(OracleFailure::NotCommutative {
                    field: name.clone(),
                    first: left,
                    second: right,
                });
            }
        }
        Ok((a, b))
    }

    fn create_checked(
        &self,
        creator: &Party,
        reader: &Party,
        payload: &Payload,
    ) -> Result<Contract, OracleFailure> {
        let step = "create".to_string();
        self.model
            .validate_payload(payload)
            .map_err(|err| OracleFailure::InvalidInput {
                step: step.clone(),
                reason: err.to_string(),
            })?;
        let template_id = self.model.template_id();
        let created = match self.ledger.create(creator, template_id, payload) {
            Ok(created) => created,
            Err(LedgerError::Rejected(rejection)) => {
                return Err(OracleFailure::UnexpectedRejection { step, rejection })
            }
            Err(source) => return Err(OracleFailure::Ledger { step, source }),
        };
        let fetched = self.read_back(&step, reader, template_id, &created.contract_id)?;
        if let Some(diff) = self.model.diff(payload, &fetched.payload) {
            return Err(self.mismatch(step, diff));
        }
        Ok(fetched)
    }

    fn run_step(
        &self,
        index: usize,
        label: &str,
        step: &Step,
        reader: &Party,
        current: &Contract,
        seen: &mut HashSet<ContractId>,
    ) -> Result<Executed, OracleFailure> {
        let template_id = self.model.template_id();
        self.model
            .validate_arguments(&step.choice, &step.argument)
            .map_err(|err| OracleFailure::InvalidInput {
                step: label.to_string(),
                reason: err.to_string(),
            })?;

        let prediction = self.model.apply(
            &current.payload,
            &step.choice,
            step.actor.as_str(),
            &step.argument,
        );
        match (step.expect, &prediction) {
            (Expect::Accept, Err(refusal)) => {
                return Err(OracleFailure::ExpectationConflict {
                    step: label.to_string(),
                    expected: step.expect.describe(),
                    model: format!("refusal: {refusal}"),
                })
            }
            (Expect::Reject, Ok(_)) => {
                return Err(OracleFailure::ExpectationConflict {
                    step: label.to_string(),
                    expected: step.expect.describe(),
                    model: "acceptance".to_string(),
                })
            }
            _ => {}
        }

        let argument = Value::Object(step.argument.clone());
        let result = self.ledger.exercise(
            &step.actor,
            template_id,
            &current.contract_id,
            &step.choice,
            &argument,
        );

        let mut record = StepOutcome {
            index,
            choice: step.choice.clone(),
            accepted: false,
            contract_id: current.contract_id.clone(),
            exercise_result: None,
            rejection: None,
            spawned: None,
        };

        let outcome = match (result, prediction) {
            (Err(LedgerError::Rejected(rejection)), Err(refusal)) => {
                debug!(step = index, %refusal, status = rejection.status, "refused as predicted");
                if step.verify {
                    self.check_untouched(label, reader, current)?;
                }
                record.rejection = Some(rejection);
                return Ok(Executed { record, next: None });
            }
            (Err(LedgerError::Rejected(rejection)), Ok(_)) => {
                return Err(OracleFailure::UnexpectedRejection {
                    step: label.to_string(),
                    rejection,
                })
            }
            (Err(source), _) => {
                return Err(OracleFailure::Ledger {
                    step: label.to_string(),
                    source,
                })
            }
            (Ok(_), Err(refusal)) => {
                return Err(OracleFailure::UnexpectedAcceptance {
                    step: label.to_string(),
                    reason: refusal.to_string(),
                })
            }
            (Ok(outcome), Ok(prediction)) => (outcome, prediction),
        };
        let (exercised, prediction) = outcome;
        record.accepted = true;
        record.exercise_result = Some(exercised.exercise_result.clone());

        match prediction {
            Prediction::Successor(expected) => {
                let successor =
                    exercised
                        .contract_id()
                        .ok_or_else(|| OracleFailure::LineageViolation {
                            step: label.to_string(),
                            detail: format!(
                                "consuming choice returned {} instead of a contract id",
                                exercised.exercise_result
                            ),
                        })?;
                if !seen.insert(successor.clone()) {
                    return Err(OracleFailure::LineageViolation {
                        step: label.to_string(),
                        detail: format!("contract id {successor} was reused"),
                    });
                }
                if self
                    .fetch(label, reader, template_id, &current.contract_id)?
                    .is_some()
                {
                    return Err(OracleFailure::LineageViolation {
                        step: label.to_string(),
                        detail: format!("{} is still active after a consuming choice", current.contract_id),
                    });
                }
                let next = if step.verify {
                    let fetched = self.read_back(label, reader, template_id, &successor)?;
                    if let Some(diff) = self.model.diff(&expected, &fetched.payload) {
                        return Err(self.mismatch(label.to_string(), diff));
                    }
                    fetched
                } else {
                    Contract {
                        contract_id: successor,
                        template_id: template_id.clone(),
                        payload: expected,
                    }
                };
                record.contract_id = next.contract_id.clone();
                Ok(Executed {
                    record,
                    next: Some(next),
                })
            }
            Prediction::Value { value, kind } => {
                if !kind.equivalent(&value, &exercised.exercise_result) {
                    return Err(OracleFailure::ResultMismatch {
                        step: label.to_string(),
                        expected: value,
                        actual: exercised.exercise_result,
                    });
                }
                if step.verify {
                    self.check_untouched(label, reader, current)?;
                }
                Ok(Executed { record, next: None })
            }
            Prediction::Spawned {
                template_id: spawned_template,
                payload,
                kinds,
            } => {
                let spawned_id =
                    exercised
                        .contract_id()
                        .ok_or_else(|| OracleFailure::ResultMismatch {
                            step: label.to_string(),
                            expected: Value::String(format!("a {spawned_template} contract id")),
                            actual: exercised.exercise_result.clone(),
                        })?;
                if !seen.insert(spawned_id.clone()) {
                    return Err(OracleFailure::LineageViolation {
                        step: label.to_string(),
                        detail: format!("contract id {spawned_id} was reused"),
                    });
                }
                let spawned = self.read_back(label, reader, &spawned_template, &spawned_id)?;
                for (name, kind) in &kinds {
                    let expected = payload.get(name).unwrap_or(&Value::Null);
                    let actual = spawned.field(name).unwrap_or(&Value::Null);
                    if !kind.equivalent(expected, actual) {
                        return Err(OracleFailure::FieldMismatch {
                            step: label.to_string(),
                            field: format!("{spawned_template}.{name}"),
                            expected: expected.clone(),
                            actual: actual.clone(),
                        });
                    }
                }
                if step.verify {
                    self.check_untouched(label, reader, current)?;
                }
                record.spawned = Some(spawned);
                Ok(Executed { record, next: None })
            }
        }
    }

    fn fetch(
        &self,
        label: &str,
        reader: &Party,
        template_id: &TemplateId,
        contract_id: &ContractId,
    ) -> Result<Option<Contract>, OracleFailure> {
        self.ledger
            .fetch(reader, template_id, contract_id)
            .map_err(|source| OracleFailure::Ledger {
                step: label.to_string(),
                source,
            })
    }

    fn read_back(
        &self,
        label: &str,
        reader: &Party,
        template_id: &TemplateId,
        contract_id: &ContractId,
    ) -> Result<Contract, OracleFailure> {
        self.fetch(label, reader, template_id, contract_id)?
            .ok_or_else(|| OracleFailure::LineageViolation {
                step: label.to_string(),
                detail: format!("{contract_id} is not visible to {reader}"),
            })
    }

    /// The contract must still be active with an identical payload.
    fn check_untouched(
        &self,
        label: &str,
        reader: &Party,
        current: &Contract,
    ) -> Result<(), OracleFailure> {
        let template_id = self.model.template_id();
        let Some(after) = self.fetch(label, reader, template_id, &current.contract_id)? else {
            return Err(OracleFailure::SideEffect {
                step: label.to_string(),
                detail: format!("{} was archived", current.contract_id),
            });
        };
        if let Some(diff) = self.model.diff(&current.payload, &after.payload) {
            return Err(OracleFailure::SideEffect {
                step: label.to_string(),
                detail: format!(
                    "field {} changed from {} to {}",
                    diff.field, diff.expected, diff.actual
                ),
            });
        }
        Ok(())
    }

    fn mismatch(&self, step: String, diff: FieldDiff) -> OracleFailure {
        if self.model.state_field() == Some(diff.field.as_str()) {
            OracleFailure::StateMismatch {
                step,
                expected: diff.expected,
                actual: diff.actual,
            }
        } else {
            OracleFailure::FieldMismatch {
                step,
                field: diff.field,
                expected: diff.expected,
                actual: diff.actual,
            }
        }
    }
}

struct Executed {
    record: StepOutcome,
    next: Option<Contract>,
}

fn mentions_party(kind: &FieldKind) -> bool {
    match kind {
        FieldKind::Party => true,
        FieldKind::Optional(inner) | FieldKind::List(inner) => mentions_party(inner),
        _ => false,
    }
}

/// Builds a choice argument from `(name, value)` pairs.
pub fn argument<I, K, V>(pairs: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(name, value)| (name.into(), value.into()))
        .collect()
}
