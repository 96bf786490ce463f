//! Asynchronous remote calls over a [`MessagePort`].
//!
//! A [`Remote`] is the calling side: [`Remote::call`] tags each request with a correlation
//! id and returns a [`PendingCall`] that resolves when the matching response arrives,
//! whatever order responses come back in. [`forward_calls`] is the receiving side: it
//! routes each request to a [`RemoteTarget`] and posts the outcome back.

use std::{
    collections::HashMap,
    future::Future,
    marker::PhantomData,
    pin::Pin,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    task::{Context, Poll},
};

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use shared::{
    error::RemoteError,
    protocol::{RpcOutcome, RpcRequest, RpcResponse},
};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, warn};

pub mod error;
mod port;

pub use error::TransportError;
pub use port::{MessagePort, PortRegistry};

#[derive(Default)]
struct PendingCalls {
    closed: bool,
    calls: HashMap<u64, oneshot::Sender<RpcOutcome>>,
}

impl PendingCalls {
    /// Marks the channel closed and drops every waiter, failing their calls.
    fn close(&mut self) -> usize {
        self.closed = true;
        let outstanding = self.calls.len();
        self.calls.clear();
        outstanding
    }
}

struct RemoteInner {
    tx: mpsc::UnboundedSender<String>,
    pending: Arc<Mutex<PendingCalls>>,
    next_id: AtomicU64,
}

/// Calling side of a channel. Cloning shares the channel and its correlation ids.
#[derive(Clone)]
pub struct Remote {
    inner: Arc<RemoteInner>,
}

impl Remote {
    /// Takes ownership of `port` and starts reading responses from it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(port: MessagePort) -> Self {
        let (tx, mut rx) = port.into_parts();
        let pending = Arc::new(Mutex::new(PendingCalls::default()));

        let reader_pending = Arc::clone(&pending);
        tokio::spawn(async move {
            while let Some(text) = rx.recv().await {
                let response = match serde_json::from_str::<RpcResponse>(&text) {
                    Ok(response) => response,
                    Err(error) => {
                        warn!(%error, "remote: dropping malformed response");
                        continue;
                    }
                };
                let waiter = lock(&reader_pending).calls.remove(&response.id);
                match waiter {
                    Some(waiter) => {
                        // The caller may have stopped waiting; that is fine.
                        let _ = waiter.send(response.outcome);
                    }
                    None => warn!(id = response.id, "remote: response for unknown call id"),
                }
            }
            let outstanding = lock(&reader_pending).close();
            if outstanding > 0 {
                warn!(outstanding, "remote: channel closed, failing outstanding calls");
            } else {
                debug!("remote: channel closed");
            }
        });

        Self {
            inner: Arc::new(RemoteInner {
                tx,
                pending,
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Enqueues a call and returns a future for its result.
    ///
    /// The request is on the channel by the time this returns, so calls made in sequence
    /// reach the target in sequence even if nobody awaits them.
    pub fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<PendingCall<T>, TransportError> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let text = serde_json::to_string(&RpcRequest {
            id,
            method: method.to_string(),
            args,
        })?;

        let (waiter, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.inner.pending);
            if pending.closed {
                return Err(TransportError::ChannelClosed {
                    method: method.to_string(),
                });
            }
            pending.calls.insert(id, waiter);
        }

        if self.inner.tx.send(text).is_err() {
            lock(&self.inner.pending).calls.remove(&id);
            return Err(TransportError::ChannelClosed {
                method: method.to_string(),
            });
        }

        Ok(PendingCall {
            method: method.to_string(),
            rx,
            _marker: PhantomData,
        })
    }

    pub async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<T, TransportError> {
        self.call(method, args)?.await
    }

    pub fn outstanding_calls(&self) -> usize {
        lock(&self.inner.pending).calls.len()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner.pending).closed || self.inner.tx.is_closed()
    }
}

/// Result of one remote call, resolved by the response carrying its correlation id.
#[must_use = "dropping a PendingCall discards the remote result"]
pub struct PendingCall<T> {
    method: String,
    rx: oneshot::Receiver<RpcOutcome>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PendingCall<T> {
    pub fn method(&self) -> &str {
        &self.method
    }
}

impl<T: DeserializeOwned> Future for PendingCall<T> {
    type Output = Result<T, TransportError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match Pin::new(&mut this.rx).poll(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Err(_)) => Poll::Ready(Err(TransportError::ChannelClosed {
                method: this.method.clone(),
            })),
            Poll::Ready(Ok(RpcOutcome::Ok(value))) => {
                Poll::Ready(serde_json::from_value(value).map_err(TransportError::from))
            }
            Poll::Ready(Ok(RpcOutcome::Err(source))) => Poll::Ready(Err(TransportError::Remote {
                method: this.method.clone(),
                source,
            })),
        }
    }
}

/// Receiving side of a channel: a named-method object.
#[async_trait]
pub trait RemoteTarget: Send + Sync {
    async fn handle_call(&self, method: &str, args: Vec<Value>) -> Result<Value, RemoteError>;
}

/// Serves requests arriving on `port` from `target` until the caller goes away.
///
/// Requests are handled one at a time in arrival order.
pub fn forward_calls<T>(port: MessagePort, target: Arc<T>) -> JoinHandle<()>
where
    T: RemoteTarget + ?Sized + 'static,
{
    let (tx, mut rx) = port.into_parts();
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            let raw: Value = match serde_json::from_str(&text) {
                Ok(raw) => raw,
                Err(error) => {
                    warn!(%error, "remote: dropping unparseable request");
                    continue;
                }
            };
            let response = match serde_json::from_value::<RpcRequest>(raw.clone()) {
                Ok(request) => {
                    debug!(id = request.id, method = %request.method, "remote: handling call");
                    let outcome = target.handle_call(&request.method, request.args).await;
                    RpcResponse {
                        id: request.id,
                        outcome: outcome.into(),
                    }
                }
                Err(error) => {
                    let Some(id) = raw.get("id").and_then(Value::as_u64) else {
                        warn!(%error, "remote: dropping unroutable request");
                        continue;
                    };
                    let method = raw.get("method").and_then(Value::as_str).unwrap_or("?");
                    RpcResponse {
                        id,
                        outcome: RpcOutcome::Err(RemoteError::invalid_arguments(method, error)),
                    }
                }
            };

            let text = match serde_json::to_string(&response) {
                Ok(text) => text,
                Err(error) => {
                    warn!(id = response.id, %error, "remote: failed to encode response");
                    continue;
                }
            };
            if tx.send(text).is_err() {
                debug!("remote: caller went away, stopping forwarder");
                break;
            }
        }
    })
}

/// Decodes positional argument `index` of a call to `method`.
pub fn arg<T: DeserializeOwned>(args: &[Value], index: usize, method: &str) -> Result<T, RemoteError> {
    let value = args.get(index).cloned().ok_or_else(|| {
        RemoteError::invalid_arguments(method, format!("missing argument {index}"))
    })?;
    serde_json::from_value(value).map_err(|error| RemoteError::invalid_arguments(method, error))
}

pub fn to_value<T: Serialize>(value: &T) -> Result<Value, RemoteError> {
    serde_json::to_value(value)
        .map_err(|error| RemoteError::internal(format!("failed to encode result: {error}")))
}

fn lock(pending: &Mutex<PendingCalls>) -> std::sync::MutexGuard<'_, PendingCalls> {
    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
