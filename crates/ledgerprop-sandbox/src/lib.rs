// Copyright (c) 2026 ledgerprop Contributors
// SPDX-License-Identifier: Apache-2.0

//! ledgerprop-sandbox
//!
//! An in-process fake of the ledger JSON API for the harness's own test
//! suite. It serves `create`, `exercise`, `fetch`, `query`, and party
//! allocation over HTTP and decides every exercise with the registered
//! [`TemplateModel`]s. It is a test double: no persistence, no packages, no
//! real authorization model beyond signatories, authorizers, and
//! stakeholder visibility.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod http;
pub mod ledger;

use std::net::SocketAddr;
use std::thread::JoinHandle;

use ledgerprop_core::{Contract, ContractId, TemplateModel};
use tokio::sync::oneshot;
use tracing::{error, info};

pub use config::{AllocationShape, Fault, SandboxConfig};
pub use http::{build_state, router, serve, Controls, SandboxState};
pub use ledger::{Ledger, Refused};

/// A sandbox ledger serving on `127.0.0.1` from a background thread.
///
/// The server owns a current-thread tokio runtime, so blocking clients can
/// call it from plain `#[test]` functions. Dropping the handle shuts the
/// server down and joins the thread.
pub struct Sandbox {
    addr: SocketAddr,
    state: SandboxState,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl Sandbox {
    pub fn start(models: Vec<TemplateModel>) -> std::io::Result<Self> {
        Self::start_with(SandboxConfig::default(), models)
    }

    pub fn start_with(cfg: SandboxConfig, models: Vec<TemplateModel>) -> std::io::Result<Self> {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let state = build_state(cfg, models);
        let served = state.clone();
        let (tx, rx) = oneshot::channel::<()>();
        let thread = std::thread::Builder::new()
            .name("ledgerprop-sandbox".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(listener) {
                        Ok(listener) => listener,
                        Err(err) => {
                            error!(error = %err, "sandbox listener unusable");
                            return;
                        }
                    };
                    let shutdown = async move {
                        let _ = rx.await;
                    };
                    if let Err(err) = serve(listener, served, shutdown).await {
                        error!(error = %err, "sandbox server stopped");
                    }
                });
            })?;

        info!(%addr, "sandbox ledger listening");
        Ok(Self {
            addr,
            state,
            shutdown: Some(tx),
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// JSON API root, e.g. `http://127.0.0.1:41234/v1`.
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn ledger_id(&self) -> &str {
        &self.state.cfg.ledger_id
    }

    pub fn set_fault(&self, fault: Fault) {
        self.state.controls.lock().fault = fault;
    }

    pub fn set_allocation_shape(&self, shape: AllocationShape) {
        self.state.controls.lock().allocation_shape = shape;
    }

    pub fn register(&self, model: TemplateModel) {
        self.state.ledger.lock().register(model);
    }

    /// Ledger-side view, bypassing visibility.
    pub fn contract(&self, contract_id: &ContractId) -> Option<Contract> {
        self.state
            .ledger
            .lock()
            .active()
            .iter()
            .find(|contract| &contract.contract_id == contract_id)
            .cloned()
    }

    pub fn is_archived(&self, contract_id: &ContractId) -> bool {
        self.state.ledger.lock().is_archived(contract_id)
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
