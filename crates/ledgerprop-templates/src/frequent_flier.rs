//! Reward points accrued per mile flown.
//!
//! `totalRewards` is always `sum(miles) * rewardsPerMile`; the two read
//! choices are nonconsuming and visible to both the airline and the flier.

use ledgerprop_core::{
    Authorizer, Derivation, FieldKind, FieldRule, ModelError, Party, Payload, ResultRule, Source,
    TemplateId, TemplateModel, Transition,
};
use serde_json::json;

pub const PACKAGE: &str = "f33b6d5a217f56fc67232d32fcf41f5d388bd59252491badfb791459d867960f";

pub fn template_id() -> TemplateId {
    TemplateId::new(Some(PACKAGE), "FrequentFlier", "FrequentFlier")
}

pub fn model() -> Result<TemplateModel, ModelError> {
    let either = || {
        Authorizer::AnyOf(vec![
            Authorizer::field("airlineRepresentative"),
            Authorizer::field("flier"),
        ])
    };
    TemplateModel::builder(template_id())
        .field("airlineRepresentative", FieldKind::Party)
        .field("flier", FieldKind::Party)
        .field("rewardsPerMile", FieldKind::Int)
        .field("miles", FieldKind::list(FieldKind::Int))
        .field("totalRewards", FieldKind::Int)
        .signatory("airlineRepresentative")
        .transition(
            Transition::consuming("AddMiles")
                .by(Authorizer::field("flier"))
                .param("newMiles", FieldKind::list(FieldKind::Int))
                .update(FieldRule::append("miles", Source::arg("newMiles")))
                .update(FieldRule::recompute(
                    "totalRewards",
                    Derivation::SumTimes {
                        list: "miles".to_string(),
                        multiplier: Source::field("rewardsPerMile"),
                    },
                )),
        )
        .transition(
            Transition::nonconsuming("GetMiles")
                .by(either())
                .param("caller", FieldKind::Party)
                .returns(ResultRule::Field("miles".to_string())),
        )
        .transition(
            Transition::nonconsuming("GetRewards")
                .by(either())
                .param("caller", FieldKind::Party)
                .returns(ResultRule::Field("totalRewards".to_string())),
        )
        .build()
}

pub fn payload(airline: &Party, flier: &Party, rewards_per_mile: i64) -> Payload {
    let mut payload = Payload::new();
    payload.insert("airlineRepresentative".into(), airline.into());
    payload.insert("flier".into(), flier.into());
    payload.insert("rewardsPerMile".into(), json!(rewards_per_mile));
    payload.insert("miles".into(), json!([]));
    payload.insert("totalRewards".into(), json!(0));
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgerprop_core::{argument, Prediction, Refusal};
    use proptest::prelude::*;

    fn add(model: &TemplateModel, prior: &Payload, miles: &[i64]) -> Payload {
        let args = argument([("newMiles", json!(miles))]);
        match model.apply(prior, "AddMiles", "flier", &args) {
            Ok(Prediction::Successor(next)) => next,
            other => unreachable!("{other:?}"),
        }
    }

    #[test]
    fn reads_are_open_to_airline_and_flier_only() {
        let model = model().unwrap();
        let start = add(&model, &payload(&Party::new("air"), &Party::new("flier"), 3), &[10, 20]);
        for reader in ["air", "flier"] {
            let args = argument([("caller", reader)]);
            match model.apply(&start, "GetRewards", reader, &args).unwrap() {
                Prediction::Value { value, .. } => assert_eq!(value, json!(90)),
                other => unreachable!("{other:?}"),
            }
        }
        let args = argument([("caller", "mallory")]);
        assert!(matches!(
            model.apply(&start, "GetMiles", "mallory", &args),
            Err(Refusal::Unauthorized { .. })
        ));
    }

    #[test]
    fn only_the_flier_adds_miles() {
        let model = model().unwrap();
        let start = payload(&Party::new("air"), &Party::new("flier"), 1);
        let args = argument([("newMiles", json!([5]))]);
        assert!(matches!(
            model.apply(&start, "AddMiles", "air", &args),
            Err(Refusal::Unauthorized { .. })
        ));
    }

    proptest! {
        #[test]
        fn total_tracks_sum_times_rate(
            rate in 0i64..100,
            batches in proptest::collection::vec(proptest::collection::vec(0i64..10_000, 0..5), 0..6),
        ) {
            let model = model().unwrap();
            let mut current = payload(&Party::new("air"), &Party::new("flier"), rate);
            let mut flown = Vec::new();
            for batch in &batches {
                current = add(&model, &current, batch);
                flown.extend_from_slice(batch);
            }
            let expected: i64 = flown.iter().sum::<i64>() * rate;
            prop_assert_eq!(&current["totalRewards"], &json!(expected));
            prop_assert_eq!(&current["miles"], &json!(flown));
        }
    }
}
