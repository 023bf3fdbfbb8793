//! In-process fakes for the RPC and push-link collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bunker_shared::RpcError;
use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::StreamExt;
use serde_json::Value;

use crate::api_client::RpcClient;
use crate::error::TransportError;
use crate::ws::{Connector, FrameStream};

/// Let spawned tasks run until they block.
pub(crate) async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

pub(crate) struct FakeConnector {
    urls: Mutex<Vec<String>>,
    refusals: Mutex<usize>,
    hold: AtomicBool,
    links: Mutex<Vec<Option<UnboundedSender<Result<String, TransportError>>>>>,
}

impl FakeConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            urls: Mutex::new(Vec::new()),
            refusals: Mutex::new(0),
            hold: AtomicBool::new(false),
            links: Mutex::new(Vec::new()),
        })
    }

    /// Fail the next `count` handshakes.
    pub(crate) fn refuse_next(&self, count: usize) {
        *self.refusals.lock().unwrap() = count;
    }

    /// Never complete handshakes from now on.
    pub(crate) fn hold_handshakes(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    pub(crate) fn attempts(&self) -> usize {
        self.urls.lock().unwrap().len()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Number of links that were opened successfully.
    pub(crate) fn links(&self) -> usize {
        self.links.lock().unwrap().len()
    }

    /// Push one text frame on link `index`.
    pub(crate) fn send(&self, index: usize, frame: &str) {
        let links = self.links.lock().unwrap();
        if let Some(Some(tx)) = links.get(index) {
            let _ = tx.unbounded_send(Ok(frame.to_string()));
        }
    }

    /// Close link `index` from the server side.
    pub(crate) fn close(&self, index: usize) {
        if let Some(link) = self.links.lock().unwrap().get_mut(index) {
            link.take();
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, url: &str) -> Result<FrameStream, TransportError> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.hold.load(Ordering::SeqCst) {
            futures_util::future::pending::<()>().await;
        }
        {
            let mut refusals = self.refusals.lock().unwrap();
            if *refusals > 0 {
                *refusals -= 1;
                return Err(TransportError::Handshake("connection refused".to_string()));
            }
        }
        let (tx, rx) = unbounded();
        self.links.lock().unwrap().push(Some(tx));
        Ok(rx.boxed())
    }
}

/// Scripted RPC replies keyed by path; unscripted paths answer `null`.
pub(crate) struct FakeRpc {
    replies: Mutex<HashMap<String, VecDeque<Result<Value, RpcError>>>>,
    sticky: Mutex<HashMap<String, Result<Value, RpcError>>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl FakeRpc {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(HashMap::new()),
            sticky: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answer `path` with `reply` every time.
    pub(crate) fn on(&self, path: &str, reply: Result<Value, RpcError>) {
        self.sticky.lock().unwrap().insert(path.to_string(), reply);
    }

    /// Answer the next call to `path` with `reply`, ahead of any sticky reply.
    pub(crate) fn once(&self, path: &str, reply: Result<Value, RpcError>) {
        self.replies
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub(crate) fn bodies(&self, path: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, b)| b.clone())
            .collect()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(p, _)| p == path).count()
    }
}

#[async_trait]
impl RpcClient for FakeRpc {
    async fn rpc(&self, path: &str, body: Value) -> Result<Value, RpcError> {
        self.calls.lock().unwrap().push((path.to_string(), body));
        tokio::task::yield_now().await;
        if let Some(reply) = self
            .replies
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        self.sticky
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or(Ok(Value::Null))
    }
}
