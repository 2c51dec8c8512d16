#![allow(dead_code)]

use std::sync::{Once, OnceLock};

use ledgerprop_client::{HarnessConfig, LedgerClient};
use ledgerprop_sandbox::{Sandbox, SandboxConfig};
use ledgerprop_templates::catalog;

static TRACING: Once = Once::new();
static SHARED: OnceLock<Sandbox> = OnceLock::new();

/// `RUST_LOG=ledgerprop_core=debug cargo test` shows every step.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One sandbox for every well-behaved test in the binary. Tests that flip
/// faults must use [`private_sandbox`] instead.
pub fn shared_sandbox() -> &'static Sandbox {
    init_tracing();
    SHARED.get_or_init(|| {
        let models = catalog().expect("catalog");
        Sandbox::start(models).expect("sandbox")
    })
}

pub fn private_sandbox(cfg: SandboxConfig) -> Sandbox {
    init_tracing();
    Sandbox::start_with(cfg, catalog().expect("catalog")).expect("sandbox")
}

pub fn client_for(sandbox: &Sandbox) -> LedgerClient {
    LedgerClient::new(HarnessConfig::for_test_ledger(sandbox.base_url())).expect("client")
}

pub fn client() -> LedgerClient {
    client_for(shared_sandbox())
}
