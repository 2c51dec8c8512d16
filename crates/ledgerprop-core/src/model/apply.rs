use std::fmt;

use serde_json::{Map, Value};

use super::rules::{Authorizer, CmpOp, Derivation, FieldRule, Precondition, ResultRule, Source};
use super::{as_int, FieldKind, TemplateModel};
use crate::amount::Amount;
use crate::contract::Payload;
use crate::ids::TemplateId;

/// Why the model says the ledger must refuse a choice.
#[derive(Debug, Clone, PartialEq)]
pub enum Refusal {
    UnknownChoice {
        choice: String,
    },
    /// The contract is not in one of the choice's source states.
    GuardMismatch {
        choice: String,
        state: Option<String>,
    },
    Unauthorized {
        choice: String,
        actor: String,
    },
    BadArgument {
        choice: String,
        param: String,
        reason: String,
    },
    PreconditionFailed {
        choice: String,
        condition: String,
    },
    Arithmetic {
        choice: String,
        field: String,
    },
}

impl fmt::Display for Refusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownChoice { choice } => write!(f, "unknown choice {choice}"),
            Self::GuardMismatch { choice, state } => write!(
                f,
                "{choice} is not legal in state {}",
                state.as_deref().unwrap_or("<none>")
            ),
            Self::Unauthorized { choice, actor } => {
                write!(f, "{actor} is not an authorizer of {choice}")
            }
            Self::BadArgument {
                choice,
                param,
                reason,
            } => write!(f, "{choice} argument {param}: {reason}"),
            Self::PreconditionFailed { choice, condition } => {
                write!(f, "{choice} requires {condition}")
            }
            Self::Arithmetic { choice, field } => {
                write!(f, "{choice} cannot compute {field}")
            }
        }
    }
}

/// What the model expects a successful exercise to produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// Consuming choice: the successor's payload.
    Successor(Payload),
    /// Nonconsuming choice returning a value.
    Value { value: Value, kind: FieldKind },
    /// Nonconsuming choice creating a contract of another template.
    Spawned {
        template_id: TemplateId,
        payload: Payload,
        kinds: Vec<(String, FieldKind)>,
    },
}

struct Scope<'a> {
    choice: &'a str,
    args: &'a Map<String, Value>,
    actor: &'a str,
}

impl Scope<'_> {
    fn resolve(&self, source: &Source, payload: &Payload) -> Value {
        match source {
            Source::Arg(name) => self.args.get(name).cloned().unwrap_or(Value::Null),
            Source::Field(name) => payload.get(name).cloned().unwrap_or(Value::Null),
            Source::Actor => Value::String(self.actor.to_string()),
            Source::Literal(value) => value.clone(),
        }
    }

    fn arithmetic(&self, field: &str) -> Refusal {
        Refusal::Arithmetic {
            choice: self.choice.to_string(),
            field: field.to_string(),
        }
    }
}

impl TemplateModel {
    /// Predicts the ledger's answer to `actor` exercising `choice` on a
    /// contract carrying `payload`.
    pub fn apply(
        &self,
        payload: &Payload,
        choice: &str,
        actor: &str,
        args: &Map<String, Value>,
    ) -> Result<Prediction, Refusal> {
        let state = self.state_of(payload);
        let Some(transition) = self.transition(state, choice) else {
            return Err(if self.has_choice(choice) {
                Refusal::GuardMismatch {
                    choice: choice.to_string(),
                    state: state.map(str::to_string),
                }
            } else {
                Refusal::UnknownChoice {
                    choice: choice.to_string(),
                }
            });
        };
        let scope = Scope {
            choice,
            args,
            actor,
        };

        if !authorizes(&transition.authorizer, payload, &scope) {
            return Err(Refusal::Unauthorized {
                choice: choice.to_string(),
                actor: actor.to_string(),
            });
        }

        for (param, kind) in &transition.params {
            let value = args.get(param).unwrap_or(&Value::Null);
            kind.check(value).map_err(|reason| Refusal::BadArgument {
                choice: choice.to_string(),
                param: param.clone(),
                reason,
            })?;
        }

        for precondition in &transition.preconditions {
            if !holds(precondition, payload, &scope) {
                return Err(Refusal::PreconditionFailed {
                    choice: choice.to_string(),
                    condition: precondition.describe(),
                });
            }
        }

        if !transition.consuming {
            return self.predict_result(&transition.result, payload, &scope);
        }

        let mut next = payload.clone();
        for rule in &transition.rules {
            self.apply_rule(rule, &mut next, &scope)?;
        }
        if let (Some(target), Some(state_field)) = (&transition.to, &self.state_field) {
            next.insert(state_field.clone(), Value::String(target.clone()));
        }
        Ok(Prediction::Successor(next))
    }

    fn predict_result(
        &self,
        result: &ResultRule,
        payload: &Payload,
        scope: &Scope<'_>,
    ) -> Result<Prediction, Refusal> {
        Ok(match result {
            ResultRule::Unit => Prediction::Value {
                value: Value::Object(Map::new()),
                kind: FieldKind::Json,
            },
            ResultRule::Field(field) => Prediction::Value {
                value: payload.get(field).cloned().unwrap_or(Value::Null),
                kind: self.field_kind(field).cloned().unwrap_or(FieldKind::Json),
            },
            ResultRule::Contains { field, member } => {
                let member = scope.resolve(member, payload);
                let present = payload
                    .get(field)
                    .and_then(Value::as_array)
                    .is_some_and(|items| items.contains(&member));
                Prediction::Value {
                    value: Value::Bool(present),
                    kind: FieldKind::Bool,
                }
            }
            ResultRule::Spawn(spawn) => {
                let mut spawned = Map::new();
                for (name, _, source) in &spawn.fields {
                    spawned.insert(name.clone(), scope.resolve(source, payload));
                }
                Prediction::Spawned {
                    template_id: spawn.template_id.clone(),
                    payload: spawned,
                    kinds: spawn
                        .fields
                        .iter()
                        .map(|(name, kind, _)| (name.clone(), kind.clone()))
                        .collect(),
                }
            }
        })
    }

    fn apply_rule(
        &self,
        rule: &FieldRule,
        next: &mut Payload,
        scope: &Scope<'_>,
    ) -> Result<(), Refusal> {
        match rule {
            FieldRule::Assign { field, source } => {
                let value = scope.resolve(source, next);
                next.insert(field.clone(), value);
            }
            FieldRule::Clear { field } => {
                next.insert(field.clone(), Value::Null);
            }
            FieldRule::Increase { field, by } | FieldRule::Decrease { field, by } => {
                let delta = scope.resolve(by, next);
                let current = next.get(field).cloned().unwrap_or(Value::Null);
                let negate = matches!(rule, FieldRule::Decrease { .. });
                let updated = match self.field_kind(field) {
                    Some(FieldKind::Int) => {
                        let (Some(current), Some(delta)) = (as_int(&current), as_int(&delta))
                        else {
                            return Err(scope.arithmetic(field));
                        };
                        let updated = if negate {
                            current.checked_sub(delta)
                        } else {
                            current.checked_add(delta)
                        };
                        Value::from(updated.ok_or_else(|| scope.arithmetic(field))?)
                    }
                    _ => {
                        let (Ok(current), Ok(delta)) =
                            (Amount::from_json(&current), Amount::from_json(&delta))
                        else {
                            return Err(scope.arithmetic(field));
                        };
                        let updated = if negate {
                            current.checked_sub(delta)
                        } else {
                            current.checked_add(delta)
                        };
                        updated.ok_or_else(|| scope.arithmetic(field))?.to_json()
                    }
                };
                next.insert(field.clone(), updated);
            }
            FieldRule::Append { field, source } => {
                let value = scope.resolve(source, next);
                let mut items = match next.get(field) {
                    Some(Value::Array(items)) => items.clone(),
                    Some(Value::Null) | None => Vec::new(),
                    Some(_) => return Err(scope.arithmetic(field)),
                };
                match value {
                    Value::Array(more) => items.extend(more),
                    scalar => items.push(scalar),
                }
                next.insert(field.clone(), Value::Array(items));
            }
            FieldRule::SetMembership {
                field,
                member,
                present,
            } => {
                let member = scope.resolve(member, next);
                let Some(present) = scope.resolve(present, next).as_bool() else {
                    return Err(scope.arithmetic(field));
                };
                let mut items = next
                    .get(field)
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                if present {
                    if !items.contains(&member) {
                        items.push(member);
                    }
                } else {
                    items.retain(|item| item != &member);
                }
                next.insert(field.clone(), Value::Array(items));
            }
            FieldRule::Recompute { field, derivation } => {
                let (list, multiplier) = match derivation {
                    Derivation::Sum { list } => (list, None),
                    Derivation::SumTimes { list, multiplier } => {
                        (list, Some(scope.resolve(multiplier, next)))
                    }
                };
                let items = next
                    .get(list)
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                let updated = match self.field_kind(field) {
                    Some(FieldKind::Int) => {
                        let mut total: i64 = 0;
                        for item in &items {
                            let value = as_int(item).ok_or_else(|| scope.arithmetic(field))?;
                            total = total
                                .checked_add(value)
                                .ok_or_else(|| scope.arithmetic(field))?;
                        }
                        if let Some(multiplier) = multiplier {
                            let factor =
                                as_int(&multiplier).ok_or_else(|| scope.arithmetic(field))?;
                            total = total
                                .checked_mul(factor)
                                .ok_or_else(|| scope.arithmetic(field))?;
                        }
                        Value::from(total)
                    }
                    _ => {
                        let mut total = Amount::ZERO;
                        for item in &items {
                            let value =
                                Amount::from_json(item).map_err(|_| scope.arithmetic(field))?;
                            total = total
                                .checked_add(value)
                                .ok_or_else(|| scope.arithmetic(field))?;
                        }
                        if let Some(multiplier) = multiplier {
                            let factor =
                                as_int(&multiplier).ok_or_else(|| scope.arithmetic(field))?;
                            total = total
                                .checked_mul_int(factor)
                                .ok_or_else(|| scope.arithmetic(field))?;
                        }
                        total.to_json()
                    }
                };
                next.insert(field.clone(), updated);
            }
        }
        Ok(())
    }
}

fn authorizes(authorizer: &Authorizer, payload: &Payload, scope: &Scope<'_>) -> bool {
    match authorizer {
        Authorizer::Field(field) => {
            payload.get(field).and_then(Value::as_str) == Some(scope.actor)
        }
        Authorizer::MemberOf(field) => payload
            .get(field)
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().any(|item| item.as_str() == Some(scope.actor))),
        Authorizer::Argument(param) => {
            scope.args.get(param).and_then(Value::as_str) == Some(scope.actor)
        }
        Authorizer::AnyOf(options) => options
            .iter()
            .any(|option| authorizes(option, payload, scope)),
    }
}

fn holds(precondition: &Precondition, payload: &Payload, scope: &Scope<'_>) -> bool {
    match precondition {
        Precondition::Compare { left, op, right } => {
            let left = scope.resolve(left, payload);
            let right = scope.resolve(right, payload);
            compare(&left, *op, &right)
        }
        Precondition::MemberOf { value, field } => contains(payload, field, &scope.resolve(value, payload)),
        Precondition::NotMemberOf { value, field } => {
            !contains(payload, field, &scope.resolve(value, payload))
        }
    }
}

fn contains(payload: &Payload, field: &str, value: &Value) -> bool {
    payload
        .get(field)
        .and_then(Value::as_array)
        .is_some_and(|items| items.contains(value))
}

fn compare(left: &Value, op: CmpOp, right: &Value) -> bool {
    match (Amount::from_json(left), Amount::from_json(right)) {
        (Ok(l), Ok(r)) => match op {
            CmpOp::Lt => l < r,
            CmpOp::Le => l <= r,
            CmpOp::Gt => l > r,
            CmpOp::Ge => l >= r,
            CmpOp::Eq => l == r,
            CmpOp::Ne => l != r,
        },
        _ => match op {
            CmpOp::Eq => left == right,
            CmpOp::Ne => left != right,
            _ => false,
        },
    }
}
