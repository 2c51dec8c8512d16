mod support;

use ledgerprop_client::{HarnessConfig, LedgerClient};
use ledgerprop_core::{Amount, LedgerApi, LedgerError, Oracle, Payload, Scenario, Step};
use ledgerprop_sandbox::{AllocationShape, Fault, SandboxConfig};
use ledgerprop_templates::simple_market;

use support::{client, client_for, private_sandbox};

#[test]
fn allocated_parties_are_fresh_and_carry_their_prefix() {
    let client = client();
    let before = client.parties_issued();
    let parties = client
        .allocate_many(&["Alice", "Bob", "Alice"])
        .expect("parties");

    assert_eq!(parties.len(), 3);
    assert_ne!(parties[0], parties[2]);
    assert!(parties[0].as_str().starts_with("Alice-"));
    assert!(parties[1].as_str().starts_with("Bob-"));
    assert_eq!(client.parties_issued(), before + 3);
}

#[test]
fn every_known_allocation_shape_yields_a_party() {
    let sandbox = private_sandbox(SandboxConfig::default());
    let client = client_for(&sandbox);
    for shape in [
        AllocationShape::Direct,
        AllocationShape::Nested,
        AllocationShape::Identifier,
    ] {
        sandbox.set_allocation_shape(shape);
        let party = client.allocate("Shape").expect("party");
        assert!(party.as_str().ends_with("::sandbox-participant"), "{shape:?}: {party}");
    }

    sandbox.set_allocation_shape(AllocationShape::Unrecognized);
    let err = client.allocate("Shape").expect_err("must fail");
    assert!(matches!(err, LedgerError::Shape { .. }), "{err}");
    assert!(err.to_string().contains("unrecognized allocation result"));
}

#[test]
fn repeated_party_from_the_ledger_is_refused() {
    let sandbox = private_sandbox(SandboxConfig::default());
    let client = client_for(&sandbox);
    client.allocate("First").expect("first party");

    sandbox.set_fault(Fault::RepeatParty);
    let err = client.allocate("Second").expect_err("must fail");
    assert!(matches!(err, LedgerError::Shape { .. }), "{err}");
    assert!(err.to_string().contains("already-issued"));

    let model = simple_market::model().expect("model");
    let failure = Oracle::new(&client, &model)
        .allocate_roles(&["Owner"])
        .expect_err("must fail");
    assert!(failure.ledger_error().is_some(), "{failure}");
}

#[test]
fn opaque_failures_surface_as_transport_errors() {
    let sandbox = private_sandbox(SandboxConfig::default());
    let client = client_for(&sandbox);
    let model = simple_market::model().expect("model");
    let oracle = Oracle::new(&client, &model);
    let roles = oracle.allocate_roles(&["Owner", "Buyer"]).expect("roles");
    let (owner, buyer) = (&roles[0], &roles[1]);

    sandbox.set_fault(Fault::Opaque);
    let payload = simple_market::payload(
        owner,
        buyer,
        "clock",
        simple_market::ITEM_AVAILABLE,
        Amount::ZERO,
    );
    let scenario = Scenario::create("opaque", owner, payload)
        .step(Step::new("MakeOffer", buyer).arg("offerPrice", "3.00"));
    let failure = oracle.run(&scenario).expect_err("must fail");
    assert!(failure.is_transport(), "{failure}");
    assert!(failure.to_string().contains("HTTP 502"));
}

#[test]
fn success_without_result_is_a_shape_error() {
    let sandbox = private_sandbox(SandboxConfig::default());
    let client = client_for(&sandbox);
    let owner = client.allocate("Owner").expect("owner");
    let buyer = client.allocate("Buyer").expect("buyer");

    sandbox.set_fault(Fault::MissingResult);
    let payload = simple_market::payload(
        &owner,
        &buyer,
        "mirror",
        simple_market::ITEM_AVAILABLE,
        Amount::ZERO,
    );
    let err = LedgerApi::create(&client, &owner, &simple_market::template_id(), &payload)
        .expect_err("must fail");
    assert!(matches!(err, LedgerError::Shape { .. }), "{err}");
    assert!(err.to_string().contains("missing result"));
}

#[test]
fn unreachable_ledger_is_a_transport_error() {
    let base_url = {
        let sandbox = private_sandbox(SandboxConfig::default());
        sandbox.base_url()
    };
    let client = LedgerClient::new(HarnessConfig::for_test_ledger(base_url)).expect("client");
    let err = client.allocate("Nobody").expect_err("must fail");
    assert!(matches!(err, LedgerError::Transport { .. }), "{err}");
}

#[test]
fn signed_ledger_needs_the_shared_secret() {
    let secret = b"0123456789abcdef0123456789abcdef".to_vec();
    let sandbox = private_sandbox(SandboxConfig::default().with_hmac_secret(secret.clone()));

    let unsigned = client_for(&sandbox);
    let err = unsigned.allocate("Owner").expect_err("must fail");
    assert_eq!(err.rejection().map(|r| r.status), Some(401), "{err}");

    let mut cfg = HarnessConfig::for_test_ledger(sandbox.base_url()).with_hmac_secret(secret);
    cfg.test_mode = false;
    let signed = LedgerClient::new(cfg).expect("client");
    let model = simple_market::model().expect("model");
    let oracle = Oracle::new(&signed, &model);
    let roles = oracle.allocate_roles(&["Owner", "Buyer"]).expect("roles");
    let (owner, buyer) = (&roles[0], &roles[1]);

    let payload = simple_market::payload(
        owner,
        buyer,
        "kettle",
        simple_market::ITEM_AVAILABLE,
        Amount::ZERO,
    );
    let scenario = Scenario::create("signed", owner, payload)
        .step(Step::new("MakeOffer", buyer).arg("offerPrice", "12.00"))
        .step(Step::new("AcceptOffer", owner));
    let trace = oracle.run(&scenario).expect("scenario holds");
    assert_eq!(trace.accepted(), 2);
    assert!(sandbox.is_archived(&trace.lineage[0]));
    assert!(sandbox.contract(&trace.final_contract.contract_id).is_some());
}

#[test]
fn minimal_contract_shapes_are_completed_from_the_request() {
    let sandbox = private_sandbox(SandboxConfig::default());
    let client = client_for(&sandbox);
    let model = simple_market::model().expect("model");
    let oracle = Oracle::new(&client, &model);
    let roles = oracle.allocate_roles(&["Owner", "Buyer"]).expect("roles");
    let (owner, buyer) = (&roles[0], &roles[1]);

    sandbox.set_fault(Fault::MinimalContracts);
    let tid = simple_market::template_id();
    let payload = simple_market::payload(
        owner,
        buyer,
        "globe",
        simple_market::ITEM_AVAILABLE,
        Amount::ZERO,
    );
    let created = LedgerApi::create(&client, owner, &tid, &payload).expect("create");
    assert_eq!(created.template_id, tid);
    assert_eq!(created.payload, payload);

    let listed = LedgerApi::query(&client, owner, std::slice::from_ref(&tid), &Payload::new())
        .expect("query");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].contract_id, created.contract_id);
    assert_eq!(listed[0].template_id, tid);

    let scenario = Scenario::create("minimal", owner, payload)
        .step(Step::new("MakeOffer", buyer).arg("offerPrice", "7.25"))
        .step(Step::new("AcceptOffer", owner));
    let trace = oracle.run(&scenario).expect("scenario holds");
    assert_eq!(trace.accepted(), 2);
    assert_eq!(trace.final_contract.template_id, tid);
}
