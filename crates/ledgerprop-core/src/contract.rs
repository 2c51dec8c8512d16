use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ids::{ContractId, TemplateId};

/// Named fields in declaration order.
pub type Payload = Map<String, Value>;

/// An immutable snapshot of one contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub contract_id: ContractId,
    pub template_id: TemplateId,
    pub payload: Payload,
}

impl Contract {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.payload.get(name)
    }

    /// The state tag stored in `state_field`, if it holds text.
    pub fn state_tag(&self, state_field: &str) -> Option<&str> {
        self.payload.get(state_field).and_then(Value::as_str)
    }
}

/// What a successful exercise returned.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseOutcome {
    pub exercise_result: Value,
}

impl ExerciseOutcome {
    /// The returned contract id, for choices that return one.
    pub fn contract_id(&self) -> Option<ContractId> {
        self.exercise_result
            .as_str()
            .filter(|raw| !raw.is_empty())
            .map(ContractId::new)
    }
}
