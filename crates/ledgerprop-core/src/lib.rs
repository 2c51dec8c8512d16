// Copyright (c) 2026 ledgerprop Contributors
// SPDX-License-Identifier: Apache-2.0

//! ledgerprop-core
//!
//! The reusable verification core for property-testing ledger-hosted
//! contracts:
//! - contract data model and exact fixed-scale amounts
//! - templates described as transition tables ([`TemplateModel`])
//! - the [`LedgerApi`] seam the oracle drives
//! - the property [`Oracle`] and its input strategies

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod amount;
pub mod api;
pub mod contract;
pub mod error;
pub mod ids;
pub mod model;
pub mod oracle;
pub mod strategy;

pub use amount::{Amount, AmountError, AMOUNT_SCALE};
pub use api::LedgerApi;
pub use contract::{Contract, ExerciseOutcome, Payload};
pub use error::{LedgerError, LedgerResult, Rejection};
pub use ids::{ContractId, Party, TemplateId};
pub use model::{
    Authorizer, CmpOp, Derivation, FieldDiff, FieldKind, FieldRule, ModelError, Precondition,
    Prediction, Refusal, ResultRule, Source, Spawn, StateGuard, TemplateModel,
    TemplateModelBuilder, Transition,
};
pub use oracle::{argument, Expect, Oracle, OracleFailure, Origin, Scenario, Step, StepOutcome, Trace};
