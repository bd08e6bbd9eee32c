// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! fmd: the Foreman work-order daemon.
//!
//! Wires the adapters to the dispatcher and ops monitor, binds the IPC
//! sockets, and serves until a Shutdown request or SIGINT.

use std::sync::Arc;
use std::time::Instant;

use fm_adapters::{
    GithubClient, HttpAgentGateway, HttpEdgeDeploy, HttpSandbox, HttpVerifyProxy, RpcStore,
    VerifyProxy,
};
use fm_core::SystemClock;
use fm_daemon::{env, listener};
use fm_engine::{Dispatcher, DispatcherConfig, DispatcherDeps, OpsConfig, OpsMonitor, TagRules};
use fm_storage::{MemoryStore, Store};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match env::log_dir() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "fmd.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
            None
        }
    }
}

fn load_tag_rules() -> TagRules {
    let Some(path) = env::tag_rules_path() else {
        return TagRules::defaults();
    };
    match std::fs::read_to_string(&path) {
        Ok(raw) => match TagRules::from_toml(&raw) {
            Ok(rules) => rules,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid tag rules; using defaults");
                TagRules::defaults()
            }
        },
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable tag rules; using defaults");
            TagRules::defaults()
        }
    }
}

fn build_store() -> Arc<dyn Store> {
    match env::store_base() {
        Some(base) => {
            info!(base, "using store rpc backend");
            Arc::new(RpcStore::new(base, env::store_token()))
        }
        None => {
            warn!("FOREMAN_STORE_BASE unset; running on the in-memory store");
            Arc::new(MemoryStore::new())
        }
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let _log_guard = init_tracing();

    let clock = SystemClock;
    let store = build_store();
    let repo = env::git_repo().unwrap_or_else(|| {
        warn!("FOREMAN_GIT_REPO unset; git tools will fail until configured");
        String::new()
    });
    let proxy: Option<Arc<dyn VerifyProxy>> = match env::proxy_base() {
        Some(base) => Some(Arc::new(HttpVerifyProxy::new(base))),
        None => None,
    };
    let gateway = Arc::new(HttpAgentGateway::new(env::agent_base()));

    let deps = DispatcherDeps {
        store: Arc::clone(&store),
        git: Arc::new(GithubClient::new(env::git_base(), repo, env::git_token())),
        sandbox: Arc::new(HttpSandbox::new(env::sandbox_base())),
        deploy: Arc::new(HttpEdgeDeploy::new(env::deploy_base(), env::deploy_token())),
        proxy,
    };
    let dispatcher = Dispatcher::new(deps, DispatcherConfig::default(), clock.clone());
    let ops = OpsMonitor::new(
        Arc::clone(&store),
        gateway,
        load_tag_rules(),
        OpsConfig::default(),
        clock,
    );

    let socket = env::socket_path();
    if socket.exists() {
        let _ = std::fs::remove_file(&socket);
    }
    let unix = match UnixListener::bind(&socket) {
        Ok(unix) => unix,
        Err(e) => {
            tracing::error!(path = %socket.display(), error = %e, "failed to bind unix socket");
            return std::process::ExitCode::FAILURE;
        }
    };
    info!(path = %socket.display(), "listening");

    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(listener::ListenCtx {
        dispatcher,
        ops,
        store,
        start_time: Instant::now(),
        shutdown: Arc::clone(&shutdown),
        auth_token: env::auth_token(),
    });

    let listener = match env::tcp_addr() {
        Some(addr) => match TcpListener::bind(&addr).await {
            Ok(tcp) => {
                info!(addr, "tcp listener enabled");
                listener::Listener::with_tcp(unix, tcp, ctx)
            }
            Err(e) => {
                tracing::error!(addr, error = %e, "failed to bind tcp listener");
                return std::process::ExitCode::FAILURE;
            }
        },
        None => listener::Listener::new(unix, ctx),
    };

    tokio::select! {
        _ = listener.run() => {}
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
            shutdown.notify_waiters();
        }
    }

    let _ = std::fs::remove_file(&socket);
    info!("daemon stopped");
    std::process::ExitCode::SUCCESS
}
