use serde_json::{Map, Value};

use crate::contract::{Contract, Payload};
use crate::error::Rejection;
use crate::ids::{ContractId, Party};

/// What the test author expects of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expect {
    /// Whatever the transition table predicts.
    #[default]
    Model,
    Accept,
    Reject,
}

impl Expect {
    pub(crate) fn describe(self) -> &'static str {
        match self {
            Self::Model => "the modelled outcome",
            Self::Accept => "acceptance",
            Self::Reject => "rejection",
        }
    }
}

/// One choice exercised against the current contract of a lineage.
#[derive(Debug, Clone)]
pub struct Step {
    pub choice: String,
    pub actor: Party,
    pub argument: Map<String, Value>,
    pub expect: Expect,
    /// Re-fetch and check the payload afterwards.
    pub verify: bool,
}

impl Step {
    pub fn new(choice: &str, actor: &Party) -> Self {
        Self {
            choice: choice.to_string(),
            actor: actor.clone(),
            argument: Map::new(),
            expect: Expect::Model,
            verify: true,
        }
    }

    pub fn arg(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.argument.insert(name.to_string(), value.into());
        self
    }

    pub fn args(mut self, argument: Map<String, Value>) -> Self {
        self.argument = argument;
        self
    }

    pub fn expect(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }

    pub fn accepted(self) -> Self {
        self.expect(Expect::Accept)
    }

    pub fn rejected(self) -> Self {
        self.expect(Expect::Reject)
    }

    pub fn unverified(mut self) -> Self {
        self.verify = false;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Origin {
    Create { creator: Party, payload: Payload },
    /// Continue a lineage started elsewhere.
    Existing(Contract),
}

/// An ordered sequence of steps applied to one lineage of contracts.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub origin: Origin,
    /// Party used for every read-back.
    pub reader: Party,
    pub steps: Vec<Step>,
}

impl Scenario {
    /// Starts from a fresh contract; the creator doubles as the reader.
    pub fn create(name: &str, creator: &Party, payload: Payload) -> Self {
        Self {
            name: name.to_string(),
            origin: Origin::Create {
                creator: creator.clone(),
                payload,
            },
            reader: creator.clone(),
            steps: Vec::new(),
        }
    }

    pub fn resume(name: &str, reader: &Party, contract: Contract) -> Self {
        Self {
            name: name.to_string(),
            origin: Origin::Existing(contract),
            reader: reader.clone(),
            steps: Vec::new(),
        }
    }

    pub fn read_as(mut self, reader: &Party) -> Self {
        self.reader = reader.clone();
        self
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub index: usize,
    pub choice: String,
    pub accepted: bool,
    /// Current contract of the lineage after the step.
    pub contract_id: ContractId,
    pub exercise_result: Option<Value>,
    pub rejection: Option<Rejection>,
    /// Contract of another template created by a nonconsuming choice.
    pub spawned: Option<Contract>,
}

/// Everything observed while running a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    pub scenario: String,
    /// Contract ids in creation order, starting with the origin.
    pub lineage: Vec<ContractId>,
    pub outcomes: Vec<StepOutcome>,
    pub final_contract: Contract,
}

impl Trace {
    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.accepted).count()
    }

    pub fn rejected(&self) -> usize {
        self.outcomes.len() - self.accepted()
    }

    pub fn spawned(&self) -> impl Iterator<Item = &Contract> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.spawned.as_ref())
    }
}
