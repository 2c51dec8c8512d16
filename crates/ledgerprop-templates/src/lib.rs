// Copyright (c) 2026 ledgerprop Contributors
// SPDX-License-Identifier: Apache-2.0

//! ledgerprop-templates
//!
//! Transition tables for the contract templates the harness knows how to
//! exercise. Each module exposes its template id, its [`TemplateModel`], and
//! helpers that build well-formed creation payloads.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod asset_transfer;
pub mod component_counter;
pub mod digital_locker;
pub mod frequent_flier;
pub mod simple_market;
pub mod whitelisted_registry;
pub mod zero_token_bank;

use ledgerprop_core::{ModelError, TemplateModel};

/// Every known template model.
pub fn catalog() -> Result<Vec<TemplateModel>, ModelError> {
    Ok(vec![
        simple_market::model()?,
        asset_transfer::model()?,
        digital_locker::model()?,
        frequent_flier::model()?,
        zero_token_bank::bank_model()?,
        zero_token_bank::user_balance_model()?,
        whitelisted_registry::model()?,
        component_counter::model()?,
    ])
}
