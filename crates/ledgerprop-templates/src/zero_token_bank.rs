//! A bank operator opening per-user balances that start at zero.
//!
//! `Bank` never changes; `OpenAccount` is nonconsuming and creates a
//! `UserBalance`. Deposits only need to stay below 200; withdrawals must be
//! strictly positive, at most 100 and covered by the balance.

use ledgerprop_core::{
    Amount, Authorizer, FieldKind, FieldRule, ModelError, Party, Payload, Precondition,
    ResultRule, Source, Spawn, TemplateId, TemplateModel, Transition,
};

pub const PACKAGE: &str = "c6f004b1cd672ae532964d33767186c66d1b0673ce87a0e05b35e7b78c2fc514";

pub const DEPOSIT_LIMIT: &str = "200.00";
pub const WITHDRAW_LIMIT: &str = "100.00";

pub fn bank_template_id() -> TemplateId {
    TemplateId::new(Some(PACKAGE), "ZeroTokenBank", "Bank")
}

pub fn user_balance_template_id() -> TemplateId {
    TemplateId::new(Some(PACKAGE), "ZeroTokenBank", "UserBalance")
}

pub fn bank_model() -> Result<TemplateModel, ModelError> {
    TemplateModel::builder(bank_template_id())
        .field("operator", FieldKind::Party)
        .signatory("operator")
        .transition(
            Transition::nonconsuming("OpenAccount")
                .by(Authorizer::field("operator"))
                .param("user", FieldKind::Party)
                .returns(ResultRule::Spawn(Spawn {
                    template_id: user_balance_template_id(),
                    fields: vec![
                        ("operator".to_string(), FieldKind::Party, Source::field("operator")),
                        ("user".to_string(), FieldKind::Party, Source::arg("user")),
                        (
                            "balance".to_string(),
                            FieldKind::Amount,
                            Source::literal(Amount::ZERO.to_json()),
                        ),
                    ],
                })),
        )
        .build()
}

pub fn user_balance_model() -> Result<TemplateModel, ModelError> {
    TemplateModel::builder(user_balance_template_id())
        .field("operator", FieldKind::Party)
        .field("user", FieldKind::Party)
        .field("balance", FieldKind::Amount)
        .signatory("operator")
        .transition(
            Transition::consuming("Deposit")
                .by(Authorizer::field("user"))
                .param("amount", FieldKind::Amount)
                .requires(Precondition::below("amount", DEPOSIT_LIMIT))
                .update(FieldRule::increase("balance", Source::arg("amount"))),
        )
        .transition(
            Transition::consuming("Withdraw")
                .by(Authorizer::field("user"))
                .param("amount", FieldKind::Amount)
                .requires(Precondition::positive("amount"))
                .requires(Precondition::at_most("amount", WITHDRAW_LIMIT))
                .requires(Precondition::covered_by("amount", "balance"))
                .update(FieldRule::decrease("balance", Source::arg("amount"))),
        )
        .transition(
            Transition::nonconsuming("GetBalance")
                .by(Authorizer::field("user"))
                .returns(ResultRule::Field("balance".to_string())),
        )
        .build()
}

pub fn bank_payload(operator: &Party) -> Payload {
    let mut payload = Payload::new();
    payload.insert("operator".into(), operator.into());
    payload
}

pub fn balance_payload(operator: &Party, user: &Party, balance: Amount) -> Payload {
    let mut payload = Payload::new();
    payload.insert("operator".into(), operator.into());
    payload.insert("user".into(), user.into());
    payload.insert("balance".into(), balance.to_json());
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerprop_core::{argument, Prediction, Refusal};
    use proptest::prelude::*;

    fn amount_arg(value: Amount) -> Payload {
        argument([("amount", value.to_json())])
    }

    #[test]
    fn open_account_spawns_zero_balance() {
        let model = bank_model().unwrap();
        let bank = bank_payload(&Party::new("op"));
        let args = argument([("user", "alice")]);
        match model.apply(&bank, "OpenAccount", "op", &args).unwrap() {
            Prediction::Spawned {
                template_id,
                payload,
                ..
            } => {
                assert_eq!(template_id, user_balance_template_id());
                assert_eq!(payload, balance_payload(&Party::new("op"), &Party::new("alice"), Amount::ZERO));
            }
            other => unreachable!("{other:?}"),
        }
        assert!(matches!(
            model.apply(&bank, "OpenAccount", "alice", &args),
            Err(Refusal::Unauthorized { .. })
        ));
    }

    #[test]
    fn limits_are_exact() {
        let model = user_balance_model().unwrap();
        let start = balance_payload(&Party::new("op"), &Party::new("u"), Amount::from_units(150));
        let cases = [
            ("Deposit", Amount::from_minor(19_999), true),
            ("Deposit", Amount::from_units(200), false),
            ("Deposit", Amount::ZERO, true),
            ("Withdraw", Amount::from_units(100), true),
            ("Withdraw", Amount::from_minor(10_001), false),
            ("Withdraw", Amount::ZERO, false),
        ];
        for (choice, amount, legal) in cases {
            let outcome = model.apply(&start, choice, "u", &amount_arg(amount));
            assert_eq!(outcome.is_ok(), legal, "{choice} {amount}: {outcome:?}");
        }
    }

    #[test]
    fn withdraw_cannot_overdraw() {
        let model = user_balance_model().unwrap();
        let start = balance_payload(&Party::new("op"), &Party::new("u"), Amount::from_units(10));
        assert!(matches!(
            model.apply(&start, "Withdraw", "u", &amount_arg(Amount::from_minor(1_001))),
            Err(Refusal::PreconditionFailed { .. })
        ));
    }

    #[test]
    fn zero_deposit_is_accepted_and_changes_nothing() {
        let model = user_balance_model().unwrap();
        let start = balance_payload(&Party::new("op"), &Party::new("u"), Amount::from_units(7));
        let Ok(Prediction::Successor(next)) = model.apply(&start, "Deposit", "u", &amount_arg(Amount::ZERO)) else {
            unreachable!("zero deposit refused");
        };
        assert_eq!(next, start);
    }

    proptest! {
        #[test]
        fn deposit_then_withdraw_restores_balance(minor in 1i128..10_000) {
            let model = user_balance_model().unwrap();
            let start = balance_payload(&Party::new("op"), &Party::new("u"), Amount::ZERO);
            let amount = Amount::from_minor(minor);
            let Ok(Prediction::Successor(funded)) = model.apply(&start, "Deposit", "u", &amount_arg(amount)) else {
                unreachable!("deposit of {amount} refused");
            };
            let Ok(Prediction::Successor(drained)) = model.apply(&funded, "Withdraw", "u", &amount_arg(amount)) else {
                unreachable!("withdraw of {amount} refused");
            };
            prop_assert_eq!(Amount::from_json(&drained["balance"]).unwrap(), Amount::ZERO);
        }
    }
}
