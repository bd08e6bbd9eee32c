// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::dispatch::{Dispatcher, DispatcherConfig, DispatcherDeps, ToolCtx};
use fm_adapters::{FakeAgentGateway, FakeEdgeDeploy, FakeGitHost, FakeSandbox, FakeVerifyProxy};
use fm_core::{Actor, Clock, FakeClock, WoStatus, WorkOrder};
use fm_storage::MemoryStore;
use std::sync::Arc;

pub(crate) struct Fixture {
    pub dispatcher: Dispatcher<FakeClock>,
    pub store: Arc<MemoryStore<FakeClock>>,
    pub git: Arc<FakeGitHost>,
    pub sandbox: Arc<FakeSandbox>,
    pub deploy: Arc<FakeEdgeDeploy>,
    pub gateway: Arc<FakeAgentGateway>,
    pub clock: FakeClock,
}

impl Fixture {
    pub fn new() -> Self {
        Self::build(None)
    }

    pub fn with_proxy() -> (Self, Arc<FakeVerifyProxy>) {
        let proxy = Arc::new(FakeVerifyProxy::new());
        (Self::build(Some(proxy.clone())), proxy)
    }

    fn build(proxy: Option<Arc<FakeVerifyProxy>>) -> Self {
        let clock = FakeClock::new();
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let git = Arc::new(FakeGitHost::new());
        let sandbox = Arc::new(FakeSandbox::new());
        let deploy = Arc::new(FakeEdgeDeploy::new());
        let gateway = Arc::new(FakeAgentGateway::new());
        let proxy: Option<Arc<dyn fm_adapters::VerifyProxy>> = match proxy {
            Some(p) => Some(p),
            None => None,
        };
        let deps = DispatcherDeps {
            store: store.clone(),
            git: git.clone(),
            sandbox: sandbox.clone(),
            deploy: deploy.clone(),
            proxy,
        };
        let dispatcher = Dispatcher::new(deps, DispatcherConfig::default(), clock.clone());
        Self { dispatcher, store, git, sandbox, deploy, gateway, clock }
    }

    /// Seed an in_progress WO and return it.
    pub fn seed_wo(&self, slug: &str, tags: &[&str]) -> WorkOrder {
        let wo = WorkOrder::builder()
            .id(fm_core::WorkOrderId::new())
            .slug(slug)
            .status(WoStatus::InProgress)
            .tags(tags.iter().map(|t| t.to_string()).collect())
            .created_at(self.clock.epoch_ms())
            .updated_at(self.clock.epoch_ms())
            .build();
        self.store.seed_work_order(wo.clone());
        wo
    }

    pub fn ctx(&self, wo: &WorkOrder) -> ToolCtx {
        ToolCtx { actor: Actor::standard("builder"), wo_id: wo.id, wo_slug: wo.slug.clone() }
    }

    pub fn ctx_as(&self, wo: &WorkOrder, actor: Actor) -> ToolCtx {
        ToolCtx { actor, wo_id: wo.id, wo_slug: wo.slug.clone() }
    }
}
