// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts connections on a Unix socket (trusted) and optionally TCP
//! (token-gated Hello handshake), spawning a task per connection. Every
//! request maps to one dispatcher/ops call and one framed response.

use std::sync::Arc;
use std::time::Instant;

use fm_core::{Actor, Clock, WoStatus, WorkOrderId};
use fm_engine::{Dispatcher, OpsMonitor, ToolCtx};
use fm_storage::Store;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::env::ipc_timeout;
use crate::protocol::{self, read_message, write_message, Request, Response, PROTOCOL_VERSION};

/// Shared daemon context for all request handlers.
pub struct ListenCtx<C: Clock> {
    pub dispatcher: Dispatcher<C>,
    pub ops: OpsMonitor<C>,
    pub store: Arc<dyn Store>,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
    /// Auth token for TCP connections (from `FOREMAN_AUTH_TOKEN`).
    /// When set, TCP clients must provide this token in the Hello handshake.
    pub auth_token: Option<String>,
}

/// Listener task for accepting socket connections.
pub struct Listener<C: Clock> {
    unix: UnixListener,
    tcp: Option<TcpListener>,
    ctx: Arc<ListenCtx<C>>,
}

/// Source of a connection (for auth decisions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionSource {
    /// Local Unix socket — trusted, no auth required.
    Unix,
    /// Remote TCP — requires auth token in the Hello handshake.
    Tcp,
}

impl<C: Clock> Listener<C> {
    /// Create a new listener with Unix socket only.
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx<C>>) -> Self {
        Self { unix, tcp: None, ctx }
    }

    /// Create a new listener with both Unix socket and TCP.
    pub fn with_tcp(unix: UnixListener, tcp: TcpListener, ctx: Arc<ListenCtx<C>>) -> Self {
        Self { unix, tcp: Some(tcp), ctx }
    }

    /// Run the accept loop until shutdown is signalled.
    pub async fn run(mut self) {
        let shutdown = Arc::clone(&self.ctx.shutdown);
        match self.tcp.take() {
            Some(tcp) => {
                tokio::select! {
                    _ = shutdown.notified() => info!("listener stopping"),
                    _ = self.run_dual(tcp) => {}
                }
            }
            None => {
                tokio::select! {
                    _ = shutdown.notified() => info!("listener stopping"),
                    _ = self.run_unix_only() => {}
                }
            }
        }
    }

    async fn run_unix_only(&self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        handle_connection(reader, writer, ConnectionSource::Unix, &ctx).await;
                    });
                }
                Err(e) => error!("unix accept error: {e}"),
            }
        }
    }

    async fn run_dual(&self, tcp: TcpListener) {
        loop {
            tokio::select! {
                result = self.unix.accept() => match result {
                    Ok((stream, _)) => {
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            handle_connection(reader, writer, ConnectionSource::Unix, &ctx).await;
                        });
                    }
                    Err(e) => error!("unix accept error: {e}"),
                },
                result = tcp.accept() => match result {
                    Ok((stream, addr)) => {
                        debug!("tcp connection from {addr}");
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            let (reader, writer) = stream.into_split();
                            handle_connection(reader, writer, ConnectionSource::Tcp, &ctx).await;
                        });
                    }
                    Err(e) => error!("tcp accept error: {e}"),
                },
            }
        }
    }
}

/// Handle one client connection: framed request/response until EOF.
pub async fn handle_connection<C, R, W>(
    mut reader: R,
    mut writer: W,
    source: ConnectionSource,
    ctx: &ListenCtx<C>,
) where
    C: Clock,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut authed = source == ConnectionSource::Unix;
    loop {
        let request =
            match tokio::time::timeout(ipc_timeout(), read_message::<_, Request>(&mut reader))
                .await
            {
                Ok(Ok(request)) => request,
                Ok(Err(protocol::ProtocolError::ConnectionClosed)) => {
                    debug!("client disconnected");
                    return;
                }
                Ok(Err(e)) => {
                    warn!("protocol error: {e}");
                    return;
                }
                Err(_) => {
                    warn!("connection timeout");
                    return;
                }
            };

        let response = match request {
            Request::Ping => Response::Pong,
            Request::Hello { version, token } => {
                if source == ConnectionSource::Tcp {
                    match (&ctx.auth_token, token) {
                        (Some(expected), Some(provided)) if *expected == provided => {
                            authed = true;
                            Response::Hello { version: PROTOCOL_VERSION.into() }
                        }
                        _ => Response::error("authentication failed"),
                    }
                } else if version != PROTOCOL_VERSION {
                    Response::error(format!(
                        "protocol mismatch: client {version}, daemon {PROTOCOL_VERSION}"
                    ))
                } else {
                    Response::Hello { version: PROTOCOL_VERSION.into() }
                }
            }
            _ if !authed => Response::error("not authenticated: send Hello with token first"),
            Request::Dispatch { tool, input, actor, role, wo_id, wo_slug } => {
                let tool_ctx = ToolCtx {
                    actor: Actor::new(actor, role),
                    wo_id: WorkOrderId::from_string(wo_id),
                    wo_slug,
                };
                let result = ctx.dispatcher.dispatch(&tool, input, &tool_ctx).await;
                Response::Tool { result }
            }
            Request::AnswerClarification { wo_id, response, responded_by } => {
                let wo_id = WorkOrderId::from_string(wo_id);
                match ctx.dispatcher.answer_clarification(&wo_id, &response, &responded_by).await
                {
                    Ok(()) => Response::Ok,
                    Err(e) => Response::error(e.message),
                }
            }
            Request::HealthCheck => {
                let report = ctx.ops.run_health_check().await;
                Response::Health { report }
            }
            Request::Status => {
                let in_progress = ctx
                    .store
                    .work_orders_by_status(WoStatus::InProgress)
                    .await
                    .map(|rows| rows.len() as u64)
                    .unwrap_or(0);
                Response::Status {
                    version: PROTOCOL_VERSION.into(),
                    uptime_ms: ctx.start_time.elapsed().as_millis() as u64,
                    in_progress_wos: in_progress,
                }
            }
            Request::Shutdown => {
                info!("shutdown requested");
                ctx.shutdown.notify_waiters();
                let _ = write_message(&mut writer, &Response::Ok).await;
                return;
            }
        };

        if let Err(e) = write_message(&mut writer, &response).await {
            warn!("failed to write response: {e}");
            return;
        }
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
