use ledgerprop_auth::{Profile, Signing, TokenBuilder};
use ledgerprop_sandbox::{build_state, serve, AllocationShape, Fault, SandboxConfig, SandboxState};
use ledgerprop_templates::simple_market;
use reqwest::StatusCode;
use serde_json::{json, Value};

struct Running {
    base: String,
    state: SandboxState,
    tx: tokio::sync::oneshot::Sender<()>,
    server: tokio::task::JoinHandle<()>,
}

async fn start(cfg: SandboxConfig) -> Running {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    let state = build_state(cfg, vec![simple_market::model().expect("model")]);
    let served = state.clone();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let _ = serve(listener, served, async move {
            let _ = rx.await;
        })
        .await;
    });
    Running {
        base: format!("http://{addr}/v1"),
        state,
        tx,
        server,
    }
}

fn bearer(profile: Profile) -> String {
    let tokens = TokenBuilder::new("sandbox", "tests", Signing::Unsigned, true).expect("builder");
    tokens.credential(profile).expect("credential").header_value()
}

async fn post(client: &reqwest::Client, url: &str, auth: &str, body: Value) -> (StatusCode, Value) {
    let resp = client
        .post(url)
        .header("authorization", auth)
        .json(&body)
        .send()
        .await
        .expect("send");
    let status = resp.status();
    let body: Value = resp.json().await.expect("json");
    (status, body)
}

#[tokio::test]
async fn create_exercise_fetch_round_trip_uses_envelopes() {
    let running = start(SandboxConfig::default()).await;
    let client = reqwest::Client::new();
    let tid = simple_market::template_id().to_string();
    let payload = json!({
        "owner": "o", "buyer": "b", "item": "lamp",
        "state": "ItemAvailable", "offerPrice": "0.00"
    });

    let (status, created) = post(
        &client,
        &format!("{}/create", running.base),
        &bearer(Profile::actor("o")),
        json!({ "templateId": tid, "payload": payload }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["status"], 200);
    let cid = created["result"]["contractId"].as_str().expect("cid").to_string();
    assert_eq!(created["result"]["templateId"], tid);

    let (status, exercised) = post(
        &client,
        &format!("{}/exercise", running.base),
        &bearer(Profile::actor("b")),
        json!({
            "templateId": tid, "contractId": cid,
            "choice": "MakeOffer", "argument": { "offerPrice": "4.20" }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let next = exercised["result"]["exerciseResult"]
        .as_str()
        .expect("successor id")
        .to_string();
    assert_ne!(next, cid);

    let (status, archived) = post(
        &client,
        &format!("{}/fetch", running.base),
        &bearer(Profile::reader(["o"])),
        json!({ "templateId": tid, "contractId": cid }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(archived["result"].is_null());

    let (_, fetched) = post(
        &client,
        &format!("{}/fetch", running.base),
        &bearer(Profile::reader(["b"])),
        json!({ "templateId": tid, "contractId": next }),
    )
    .await;
    assert_eq!(fetched["result"]["payload"]["state"], "OfferPlaced");
    assert_eq!(fetched["result"]["payload"]["offerPrice"], "4.20");

    let _ = running.tx.send(());
    running.server.abort();
}

#[tokio::test]
async fn refusals_carry_status_and_errors() {
    let running = start(SandboxConfig::default()).await;
    let client = reqwest::Client::new();
    let tid = simple_market::template_id().to_string();

    let (status, body) = post(
        &client,
        &format!("{}/create", running.base),
        "Bearer not-a-token",
        json!({ "templateId": tid, "payload": {} }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], 401);
    assert!(body["errors"].as_array().is_some_and(|e| !e.is_empty()));

    let (status, body) = post(
        &client,
        &format!("{}/create", running.base),
        &bearer(Profile::actor("b")),
        json!({ "templateId": tid, "payload": {
            "owner": "o", "buyer": "b", "item": "lamp",
            "state": "ItemAvailable", "offerPrice": "0.00"
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["errors"][0].as_str().unwrap_or_default().contains("signatory"));

    let _ = running.tx.send(());
    running.server.abort();
}

#[tokio::test]
async fn allocation_shapes_and_faults_follow_controls() {
    let running = start(SandboxConfig::default().with_allocation_shape(AllocationShape::Nested)).await;
    let client = reqwest::Client::new();
    let url = format!("{}/parties/allocate", running.base);
    let request = |hint: &str| json!({ "identifierHint": hint, "displayName": hint, "isLocal": true });

    let (status, body) = post(&client, &url, &bearer(Profile::Admin), request("alice-1")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["result"]["partyDetails"]["party"]
        .as_str()
        .is_some_and(|party| party.starts_with("alice-1::")));

    let (status, _) = post(&client, &url, &bearer(Profile::actor("x")), request("bob-2")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    running.state.controls.lock().allocation_shape = AllocationShape::Identifier;
    let (_, body) = post(&client, &url, &bearer(Profile::Admin), request("carol-3")).await;
    assert!(body["result"]["identifier"].is_string());

    running.state.controls.lock().fault = Fault::Opaque;
    let resp = client
        .post(&url)
        .header("authorization", bearer(Profile::Admin))
        .json(&request("dave-4"))
        .send()
        .await
        .expect("send");
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(resp.json::<Value>().await.is_err());

    let _ = running.tx.send(());
    running.server.abort();
}

#[tokio::test]
async fn signed_sandbox_refuses_unsigned_tokens() {
    let secret = b"sandbox-secret".to_vec();
    let running = start(SandboxConfig::default().with_hmac_secret(secret.clone())).await;
    let client = reqwest::Client::new();
    let url = format!("{}/parties/allocate", running.base);
    let body = json!({ "identifierHint": "eve-5", "displayName": "eve-5", "isLocal": true });

    let (status, _) = post(&client, &url, &bearer(Profile::Admin), body.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let signed = TokenBuilder::new("sandbox", "tests", Signing::Hs256(secret), false)
        .expect("builder")
        .credential(Profile::Admin)
        .expect("credential");
    let (status, _) = post(&client, &url, &signed.header_value(), body).await;
    assert_eq!(status, StatusCode::OK);

    let _ = running.tx.send(());
    running.server.abort();
}
