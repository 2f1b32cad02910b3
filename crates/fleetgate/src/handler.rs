//! Per-connection handler.
//!
//! Each accepted connection gets its own task running [`handle_connection`]:
//!
//!   0. Finish the WebSocket handshake within the configured timeout;
//!      a peer that never completes it is dropped without touching the
//!      accept loop.
//!   1. Split the connection into a reader (owned here) and a writer
//!      (cloned into every request task).
//!   2. Read frames until the client closes. Each frame is one
//!      [`Request`]; each request runs in its own task so a long
//!      `pollEvents` never holds up calls sent after it.
//!   3. Every request task writes exactly one [`Response`] with the
//!      request's `id`.
//!   4. When the client goes away, request tasks still in flight are
//!      aborted. A blocked `pollEvents` stops counting as a waiting
//!      consumer at that point, so the reaper can age its session out.

use std::sync::Arc;
use std::time::Duration;

use fleetgate_protocol::{Codec, ErrorKind, Request, Response};
use fleetgate_transport::{ConnectionWriter, IncomingConnection};
use tokio::task::JoinSet;

use crate::{Engine, Gateway};

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<E, C>(
    incoming: IncomingConnection,
    handshake_timeout: Duration,
    gateway: Arc<Gateway<E>>,
    codec: C,
) where
    E: Engine,
    C: Codec + Clone,
{
    let conn = match incoming.upgrade(handshake_timeout).await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::debug!(error = %e, "dropping connection");
            return;
        }
    };
    let conn_id = conn.id();
    tracing::debug!(%conn_id, peer = %conn.peer_addr(), "handling new connection");

    let (mut reader, writer) = conn.split();
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            frame = reader.recv() => {
                let data = match frame {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::debug!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };

                let request: Request = match codec.decode(&data) {
                    Ok(request) => request,
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "undecodable request");
                        let response =
                            Response::error(0, ErrorKind::IllegalArgument, e.to_string());
                        send_response(&writer, &codec, &response).await;
                        continue;
                    }
                };

                let gateway = Arc::clone(&gateway);
                let writer = writer.clone();
                let codec = codec.clone();
                in_flight.spawn(async move {
                    let response = run_request(&gateway, request).await;
                    send_response(&writer, &codec, &response).await;
                });
            }
            Some(done) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(e) = done {
                    if e.is_panic() {
                        tracing::error!(%conn_id, "request task panicked");
                    }
                }
            }
        }
    }

    in_flight.shutdown().await;
    tracing::debug!(%conn_id, "connection handler finished");
}

async fn run_request<E: Engine>(gateway: &Gateway<E>, request: Request) -> Response {
    let Request { id, op, args } = request;
    match gateway.dispatch(&op, args).await {
        Ok(value) => Response::ok(id, value),
        Err(e) => {
            tracing::debug!(id, operation = %op, error = %e, "call failed");
            Response::error(id, e.kind(), e.to_string())
        }
    }
}

async fn send_response<C: Codec>(writer: &ConnectionWriter, codec: &C, response: &Response) {
    let bytes = match codec.encode(response) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(id = response.id, error = %e, "failed to encode response");
            let fallback = Response::error(
                response.id,
                ErrorKind::Internal,
                "response could not be encoded",
            );
            match codec.encode(&fallback) {
                Ok(bytes) => bytes,
                Err(_) => return,
            }
        }
    };
    if let Err(e) = writer.send(&bytes).await {
        tracing::debug!(connection = %writer.id(), error = %e, "failed to send response");
    }
}
