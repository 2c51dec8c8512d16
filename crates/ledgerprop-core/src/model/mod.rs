//! Contract templates described as data.
//!
//! A [`TemplateModel`] is the transition table
//! `(state, choice) -> (target state, field rules, authorizer)` for one
//! template, plus the kinds of its payload fields. The oracle uses it to
//! predict what the ledger must do; nothing about any particular template's
//! state graph is hard-coded elsewhere.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::amount::Amount;
use crate::contract::Payload;
use crate::ids::TemplateId;

mod apply;
mod rules;

pub use apply::{Prediction, Refusal};
pub use rules::{
    Authorizer, CmpOp, Derivation, FieldRule, Precondition, ResultRule, Source, Spawn,
    StateGuard, Transition,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("{context} references undeclared field {field:?}")]
    UnknownField { context: String, field: String },

    #[error("{context} references undeclared argument {param:?}")]
    UnknownParam { context: String, param: String },

    #[error("choice {choice:?} is declared twice for state {state:?}")]
    DuplicateTransition {
        state: Option<String>,
        choice: String,
    },

    #[error("choice {0:?} has no authorizer")]
    MissingAuthorizer(String),

    #[error("choice {0:?} lists no source states")]
    NoSourceStates(String),

    #[error("choice {0:?} names a target state but the template has no state field")]
    NoStateField(String),

    #[error("nonconsuming choice {0:?} cannot change fields or state")]
    NonconsumingUpdate(String),

    #[error("template has no signatory field")]
    MissingSignatory,

    #[error("field {field:?} must be of kind {expected}")]
    WrongFieldKind { field: String, expected: &'static str },

    #[error("payload field {field:?}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("unknown choice {0:?}")]
    UnknownChoice(String),

    #[error("choice {choice:?} argument {param:?}: {reason}")]
    InvalidArgument {
        choice: String,
        param: String,
        reason: String,
    },
}

/// Shape of a payload field or choice argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Party,
    Text,
    Bool,
    /// 64-bit integer; ledgers may encode it as a JSON number or string.
    Int,
    /// Fixed-scale decimal, see [`Amount`].
    Amount,
    /// `null` is the absent sentinel.
    Optional(Box<FieldKind>),
    List(Box<FieldKind>),
    /// Compared structurally, no interpretation.
    Json,
}

impl FieldKind {
    pub fn optional(inner: FieldKind) -> Self {
        Self::Optional(Box::new(inner))
    }

    pub fn list(inner: FieldKind) -> Self {
        Self::List(Box::new(inner))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Party => "party",
            Self::Text => "text",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Amount => "amount",
            Self::Optional(_) => "optional",
            Self::List(_) => "list",
            Self::Json => "json",
        }
    }

    /// Whether `actual` denotes the same value as `expected` under this kind.
    pub fn equivalent(&self, expected: &Value, actual: &Value) -> bool {
        match self {
            Self::Amount => match (Amount::from_json(expected), Amount::from_json(actual)) {
                (Ok(e), Ok(a)) => e == a,
                _ => false,
            },
            Self::Int => match (as_int(expected), as_int(actual)) {
                (Some(e), Some(a)) => e == a,
                _ => false,
            },
            Self::Optional(inner) => match (expected, actual) {
                (Value::Null, Value::Null) => true,
                (Value::Null, _) | (_, Value::Null) => false,
                (e, a) => inner.equivalent(e, a),
            },
            Self::List(inner) => match (expected, actual) {
                (Value::Array(e), Value::Array(a)) => {
                    e.len() == a.len()
                        && e.iter().zip(a.iter()).all(|(e, a)| inner.equivalent(e, a))
                }
                _ => false,
            },
            Self::Party | Self::Text | Self::Bool | Self::Json => expected == actual,
        }
    }

    /// Validates an input value. Amounts must fit the fixed scale.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (Self::Party, Value::String(party)) if !party.is_empty() => Ok(()),
            (Self::Party, other) => Err(format!("expected a party, got {other}")),
            (Self::Text, Value::String(_)) => Ok(()),
            (Self::Text, other) => Err(format!("expected text, got {other}")),
            (Self::Bool, Value::Bool(_)) => Ok(()),
            (Self::Bool, other) => Err(format!("expected a bool, got {other}")),
            (Self::Int, other) => as_int(other)
                .map(|_| ())
                .ok_or_else(|| format!("expected an int, got {other}")),
            (Self::Amount, other) => Amount::from_json(other)
                .map(|_| ())
                .map_err(|err| err.to_string()),
            (Self::Optional(_), Value::Null) => Ok(()),
            (Self::Optional(inner), other) => inner.check(other),
            (Self::List(inner), Value::Array(items)) => {
                for (idx, item) in items.iter().enumerate() {
                    inner.check(item).map_err(|err| format!("[{idx}]: {err}"))?;
                }
                Ok(())
            }
            (Self::List(_), other) => Err(format!("expected a list, got {other}")),
            (Self::Json, _) => Ok(()),
        }
    }

    fn collect_parties<'a>(&self, value: &'a Value, out: &mut Vec<&'a str>) {
        match (self, value) {
            (Self::Party, Value::String(party)) => out.push(party),
            (Self::Optional(inner), value) if !value.is_null() => {
                inner.collect_parties(value, out)
            }
            (Self::List(inner), Value::Array(items)) => {
                for item in items {
                    inner.collect_parties(item, out);
                }
            }
            _ => {}
        }
    }
}

pub(crate) fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(raw) => raw.trim().parse().ok(),
        _ => None,
    }
}

/// First field where two payloads disagree.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiff {
    pub field: String,
    pub expected: Value,
    pub actual: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct TransitionKey {
    state: Option<String>,
    choice: String,
}

#[derive(Debug, Clone)]
pub struct TemplateModel {
    template_id: TemplateId,
    fields: Vec<(String, FieldKind)>,
    signatory: String,
    state_field: Option<String>,
    transitions: BTreeMap<TransitionKey, Transition>,
}

impl TemplateModel {
    pub fn builder(template_id: TemplateId) -> TemplateModelBuilder {
        TemplateModelBuilder {
            template_id,
            fields: Vec::new(),
            signatory: None,
            state_field: None,
            transitions: Vec::new(),
        }
    }

    pub fn template_id(&self) -> &TemplateId {
        &self.template_id
    }

    pub fn fields(&self) -> &[(String, FieldKind)] {
        &self.fields
    }

    pub fn field_kind(&self, name: &str) -> Option<&FieldKind> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, kind)| kind)
    }

    pub fn signatory_field(&self) -> &str {
        &self.signatory
    }

    pub fn state_field(&self) -> Option<&str> {
        self.state_field.as_deref()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.values()
    }

    pub fn state_of<'a>(&self, payload: &'a Payload) -> Option<&'a str> {
        self.state_field
            .as_deref()
            .and_then(|field| payload.get(field))
            .and_then(Value::as_str)
    }

    pub fn signatory<'a>(&self, payload: &'a Payload) -> Option<&'a str> {
        payload.get(&self.signatory).and_then(Value::as_str)
    }

    /// Every party named anywhere in the payload.
    pub fn stakeholders<'a>(&self, payload: &'a Payload) -> Vec<&'a str> {
        let mut out = Vec::new();
        for (name, kind) in &self.fields {
            if let Some(value) = payload.get(name) {
                kind.collect_parties(value, &mut out);
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// The transition for `choice` from `state`; a specific source state
    /// wins over a wildcard.
    pub fn transition(&self, state: Option<&str>, choice: &str) -> Option<&Transition> {
        let exact = state.and_then(|state| {
            self.transitions.get(&TransitionKey {
                state: Some(state.to_string()),
                choice: choice.to_string(),
            })
        });
        exact.or_else(|| {
            self.transitions.get(&TransitionKey {
                state: None,
                choice: choice.to_string(),
            })
        })
    }

    pub fn has_choice(&self, choice: &str) -> bool {
        self.transitions.keys().any(|key| key.choice == choice)
    }

    /// States from which `choice` is legal. `None` means any state.
    pub fn legal_sources(&self, choice: &str) -> Option<Vec<&str>> {
        let mut states = Vec::new();
        for key in self.transitions.keys().filter(|key| key.choice == choice) {
            match &key.state {
                Some(state) => states.push(state.as_str()),
                None => return None,
            }
        }
        Some(states)
    }

    pub fn params(&self, choice: &str) -> Option<&[(String, FieldKind)]> {
        self.transitions
            .iter()
            .find(|(key, _)| key.choice == choice)
            .map(|(_, transition)| transition.params())
    }

    /// Every declared field is present and well-formed.
    pub fn validate_payload(&self, payload: &Payload) -> Result<(), ModelError> {
        for (name, kind) in &self.fields {
            let value = match payload.get(name) {
                Some(value) => value,
                None if matches!(kind, FieldKind::Optional(_)) => &Value::Null,
                None => {
                    return Err(ModelError::InvalidField {
                        field: name.clone(),
                        reason: "missing".to_string(),
                    })
                }
            };
            kind.check(value).map_err(|reason| ModelError::InvalidField {
                field: name.clone(),
                reason,
            })?;
        }
        Ok(())
    }

    /// Checks arguments against the declared parameters before submission.
    pub fn validate_arguments(
        &self,
        choice: &str,
        args: &Map<String, Value>,
    ) -> Result<(), ModelError> {
        let params = self
            .params(choice)
            .ok_or_else(|| ModelError::UnknownChoice(choice.to_string()))?;
        for (param, kind) in params {
            let value = args.get(param).unwrap_or(&Value::Null);
            kind.check(value).map_err(|reason| ModelError::InvalidArgument {
                choice: choice.to_string(),
                param: param.clone(),
                reason,
            })?;
        }
        Ok(())
    }

    /// Compares two payloads field by field under their declared kinds,
    /// state field first.
    pub fn diff(&self, expected: &Payload, actual: &Payload) -> Option<FieldDiff> {
        let ordered = self
            .state_field
            .iter()
            .filter_map(|state| self.fields.iter().find(|(name, _)| name == state))
            .chain(
                self.fields
                    .iter()
                    .filter(|(name, _)| Some(name) != self.state_field.as_ref()),
            );
        for (name, kind) in ordered {
            let e = expected.get(name).unwrap_or(&Value::Null);
            let a = actual.get(name).unwrap_or(&Value::Null);
            if !kind.equivalent(e, a) {
                return Some(FieldDiff {
                    field: name.clone(),
                    expected: e.clone(),
                    actual: a.clone(),
                });
            }
        }
        None
    }
}

pub struct TemplateModelBuilder {
    template_id: TemplateId,
    fields: Vec<(String, FieldKind)>,
    signatory: Option<String>,
    state_field: Option<String>,
    transitions: Vec<Transition>,
}

impl TemplateModelBuilder {
    pub fn field(mut self, name: &str, kind: FieldKind) -> Self {
        self.fields.push((name.to_string(), kind));
        self
    }

    pub fn signatory(mut self, field: &str) -> Self {
        self.signatory = Some(field.to_string());
        self
    }

    pub fn state_field(mut self, field: &str) -> Self {
        self.state_field = Some(field.to_string());
        self
    }

    pub fn transition(mut self, transition: Transition) -> Self {
        self.transitions.push(transition);
        self
    }

    pub fn build(self) -> Result<TemplateModel, ModelError> {
        let signatory = self.signatory.clone().ok_or(ModelError::MissingSignatory)?;
        self.expect_kind(&signatory, "signatory", |kind| *kind == FieldKind::Party, "party")?;
        if let Some(state) = &self.state_field {
            self.expect_kind(state, "state field", |kind| *kind == FieldKind::Text, "text")?;
        }

        let mut transitions = BTreeMap::new();
        for transition in &self.transitions {
            self.check_transition(transition)?;
            let states: Vec<Option<String>> = match &transition.from {
                StateGuard::Any => vec![None],
                StateGuard::OneOf(states) if states.is_empty() => {
                    return Err(ModelError::NoSourceStates(transition.choice.clone()))
                }
                StateGuard::OneOf(states) => states.iter().cloned().map(Some).collect(),
            };
            for state in states {
                let key = TransitionKey {
                    state: state.clone(),
                    choice: transition.choice.clone(),
                };
                if transitions.insert(key, transition.clone()).is_some() {
                    return Err(ModelError::DuplicateTransition {
                        state,
                        choice: transition.choice.clone(),
                    });
                }
            }
        }

        Ok(TemplateModel {
            template_id: self.template_id,
            fields: self.fields,
            signatory,
            state_field: self.state_field,
            transitions,
        })
    }

    fn kind_of(&self, field: &str) -> Option<&FieldKind> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, kind)| kind)
    }

    fn expect_kind(
        &self,
        field: &str,
        context: &str,
        accept: impl Fn(&FieldKind) -> bool,
        expected: &'static str,
    ) -> Result<(), ModelError> {
        let kind = self.kind_of(field).ok_or_else(|| ModelError::UnknownField {
            context: context.to_string(),
            field: field.to_string(),
        })?;
        if accept(kind) {
            Ok(())
        } else {
            Err(ModelError::WrongFieldKind {
                field: field.to_string(),
                expected,
            })
        }
    }

    fn check_field(&self, context: &str, field: &str) -> Result<(), ModelError> {
        if self.kind_of(field).is_some() {
            Ok(())
        } else {
            Err(ModelError::UnknownField {
                context: context.to_string(),
                field: field.to_string(),
            })
        }
    }

    fn check_source(
        &self,
        context: &str,
        transition: &Transition,
        source: &Source,
    ) -> Result<(), ModelError> {
        match source {
            Source::Field(field) => self.check_field(context, field),
            Source::Arg(param) => {
                if transition.params.iter().any(|(name, _)| name == param) {
                    Ok(())
                } else {
                    Err(ModelError::UnknownParam {
                        context: context.to_string(),
                        param: param.clone(),
                    })
                }
            }
            Source::Actor | Source::Literal(_) => Ok(()),
        }
    }

    fn check_authorizer(
        &self,
        context: &str,
        transition: &Transition,
        authorizer: &Authorizer,
    ) -> Result<(), ModelError> {
        match authorizer {
            Authorizer::Field(field) | Authorizer::MemberOf(field) => {
                self.check_field(context, field)
            }
            Authorizer::Argument(param) => {
                self.check_source(context, transition, &Source::Arg(param.clone()))
            }
            Authorizer::AnyOf(options) => options
                .iter()
                .try_for_each(|option| self.check_authorizer(context, transition, option)),
        }
    }

    fn check_transition(&self, transition: &Transition) -> Result<(), ModelError> {
        let context = format!("choice {:?}", transition.choice);
        if transition.authorizer.is_empty() {
            return Err(ModelError::MissingAuthorizer(transition.choice.clone()));
        }
        self.check_authorizer(&context, transition, &transition.authorizer)?;
        if transition.to.is_some() && self.state_field.is_none() {
            return Err(ModelError::NoStateField(transition.choice.clone()));
        }
        if !transition.consuming && (transition.to.is_some() || !transition.rules.is_empty()) {
            return Err(ModelError::NonconsumingUpdate(transition.choice.clone()));
        }

        for precondition in &transition.preconditions {
            match precondition {
                Precondition::Compare { left, right, .. } => {
                    self.check_source(&context, transition, left)?;
                    self.check_source(&context, transition, right)?;
                }
                Precondition::MemberOf { value, field }
                | Precondition::NotMemberOf { value, field } => {
                    self.check_source(&context, transition, value)?;
                    self.check_field(&context, field)?;
                }
            }
        }

        for rule in &transition.rules {
            self.check_field(&context, rule.target())?;
            match rule {
                FieldRule::Assign { source, .. }
                | FieldRule::Increase { by: source, .. }
                | FieldRule::Decrease { by: source, .. }
                | FieldRule::Append { source, .. } => {
                    self.check_source(&context, transition, source)?
                }
                FieldRule::SetMembership {
                    member, present, ..
                } => {
                    self.check_source(&context, transition, member)?;
                    self.check_source(&context, transition, present)?;
                }
                FieldRule::Recompute { derivation, .. } => match derivation {
                    Derivation::Sum { list } => self.check_field(&context, list)?,
                    Derivation::SumTimes { list, multiplier } => {
                        self.check_field(&context, list)?;
                        self.check_source(&context, transition, multiplier)?;
                    }
                },
                FieldRule::Clear { .. } => {}
            }
        }

        match &transition.result {
            ResultRule::Unit => {}
            ResultRule::Field(field) => self.check_field(&context, field)?,
            ResultRule::Contains { field, member } => {
                self.check_field(&context, field)?;
                self.check_source(&context, transition, member)?;
            }
            ResultRule::Spawn(spawn) => {
                for (_, _, source) in &spawn.fields {
                    self.check_source(&context, transition, source)?;
                }
            }
        }
        Ok(())
    }
}
