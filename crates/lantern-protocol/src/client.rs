use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::ToolCallError;
use crate::message::{Envelope, RpcError, methods};
use crate::transport::Transport;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

type Settlement = Result<Value, RpcError>;

/// An in-flight request awaiting a response or its deadline.
struct PendingCall {
    tool: String,
    deadline: Instant,
    tx: oneshot::Sender<Settlement>,
}

type PendingTable = Mutex<HashMap<u64, PendingCall>>;

fn lock(table: &PendingTable) -> MutexGuard<'_, HashMap<u64, PendingCall>> {
    table.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Removes a call's entry when the waiting future goes away, whether it
/// finished or was dropped mid-flight.
struct PendingGuard<'a> {
    table: &'a PendingTable,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        if let Some(call) = lock(self.table).remove(&self.id) {
            tracing::debug!(
                id = self.id,
                tool = %call.tool,
                "Caller stopped waiting, dropping pending call"
            );
        }
    }
}

/// Correlation-id client for `tools/call` requests to the host.
///
/// The pending table is the only state shared between the dispatching task
/// and the inbound loop. An entry is inserted before the request is posted
/// and removed exactly once, either by [`ToolClient::settle`] or by the
/// caller's timeout. Removal happens under the table lock, so whichever
/// path removes the entry owns the settlement. The lock is never held
/// across an await.
pub struct ToolClient {
    transport: Arc<dyn Transport>,
    next_id: AtomicU64,
    pending: PendingTable,
    timeout: Duration,
}

impl ToolClient {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self {
            transport,
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Allocate a request id. Ids are shared with the session handshake so
    /// they stay unique across every request this view sends.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask the host to run `tool` with `arguments` and wait for the outcome.
    pub async fn call(&self, tool: &str, arguments: Value) -> Result<Value, ToolCallError> {
        let id = self.next_id();
        let (tx, mut rx) = oneshot::channel();

        lock(&self.pending).insert(
            id,
            PendingCall {
                tool: tool.to_string(),
                deadline: Instant::now() + self.timeout,
                tx,
            },
        );
        let _guard = PendingGuard {
            table: &self.pending,
            id,
        };

        let params = serde_json::json!({ "name": tool, "arguments": arguments });
        if let Err(e) = self
            .transport
            .post(Envelope::request(id, methods::TOOLS_CALL, params))
        {
            tracing::warn!(id, tool, error = %e, "Failed to post tool call");
            return Err(ToolCallError::Transport(e.to_string()));
        }

        tracing::debug!(id, tool, "Tool call dispatched");

        let settlement = match tokio::time::timeout(self.timeout, &mut rx).await {
            Ok(Ok(settlement)) => settlement,
            Ok(Err(_)) => return Err(ToolCallError::Abandoned(tool.to_string())),
            Err(_) => {
                let removed = lock(&self.pending).remove(&id);
                if removed.is_some() {
                    tracing::warn!(id, tool, "Tool call timed out");
                    return Err(ToolCallError::Timeout {
                        tool: tool.to_string(),
                        timeout_secs: self.timeout.as_secs(),
                    });
                }
                // A response removed the entry first and already sent its
                // settlement while holding the lock.
                match rx.try_recv() {
                    Ok(settlement) => settlement,
                    Err(_) => return Err(ToolCallError::Abandoned(tool.to_string())),
                }
            }
        };

        interpret(tool, settlement)
    }

    /// Deliver a response for `id`. Returns `false` when nothing was waiting,
    /// which covers late responses for calls that already timed out.
    pub fn settle(&self, id: u64, outcome: Result<Value, RpcError>) -> bool {
        let mut pending = lock(&self.pending);
        let Some(call) = pending.remove(&id) else {
            tracing::debug!(id, "Response for unknown or expired call, ignoring");
            return false;
        };

        let overdue = Instant::now() >= call.deadline;
        tracing::debug!(id, tool = %call.tool, overdue, "Settling tool call");
        // The receiver may be gone if the caller's future was dropped.
        let _ = call.tx.send(outcome);
        true
    }

    /// Number of calls still waiting on the host.
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }
}

/// Turn a raw settlement into the caller-facing result.
///
/// A `tools/call` result flagged `isError` is a failure reported in-band by
/// the host operation.
fn interpret(tool: &str, settlement: Settlement) -> Result<Value, ToolCallError> {
    match settlement {
        Ok(result) => {
            if result.get("isError").and_then(Value::as_bool) == Some(true) {
                let message =
                    first_text(&result).unwrap_or_else(|| "tool reported an error".into());
                return Err(ToolCallError::ToolFailed {
                    tool: tool.to_string(),
                    message,
                });
            }
            Ok(result)
        }
        Err(error) => Err(ToolCallError::Host {
            code: error.code,
            message: error.message,
        }),
    }
}

fn first_text(result: &Value) -> Option<String> {
    result
        .get("content")?
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChannelTransport;
    use serde_json::json;

    fn client() -> (Arc<ToolClient>, tokio::sync::mpsc::UnboundedReceiver<Envelope>) {
        let (transport, rx) = ChannelTransport::new();
        let client = Arc::new(ToolClient::new(Arc::new(transport), DEFAULT_TOOL_TIMEOUT));
        (client, rx)
    }

    fn request_id(envelope: &Envelope) -> u64 {
        envelope.id.as_ref().and_then(Value::as_u64).unwrap()
    }

    #[tokio::test]
    async fn sends_tools_call_and_resolves_on_result() {
        let (client, mut rx) = client();

        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call("list_stages", json!({"pipeline": "p1"})).await })
        };

        let request = rx.recv().await.unwrap();
        assert_eq!(request.method.as_deref(), Some("tools/call"));
        assert_eq!(
            request.params,
            Some(json!({"name": "list_stages", "arguments": {"pipeline": "p1"}}))
        );

        assert!(client.settle(request_id(&request), Ok(json!({"stages": []}))));
        assert_eq!(caller.await.unwrap(), Ok(json!({"stages": []})));
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test]
    async fn host_error_rejects_with_host_message() {
        let (client, mut rx) = client();
        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call("update_opportunity", json!({})).await })
        };

        let request = rx.recv().await.unwrap();
        client.settle(
            request_id(&request),
            Err(RpcError {
                code: -32000,
                message: "Opportunity not found".into(),
                data: None,
            }),
        );

        let err = caller.await.unwrap().unwrap_err();
        assert_eq!(err.to_string(), "Opportunity not found");
    }

    #[tokio::test]
    async fn in_band_tool_error_rejects() {
        let (client, mut rx) = client();
        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call("update_opportunity", json!({})).await })
        };

        let request = rx.recv().await.unwrap();
        client.settle(
            request_id(&request),
            Ok(json!({"isError": true, "content": [{"type": "text", "text": "Invalid stage"}]})),
        );

        assert_eq!(
            caller.await.unwrap(),
            Err(ToolCallError::ToolFailed {
                tool: "update_opportunity".into(),
                message: "Invalid stage".into(),
            })
        );
    }

    #[tokio::test]
    async fn concurrent_calls_settle_by_id_in_any_order() {
        let (client, mut rx) = client();

        let mut callers = Vec::new();
        for n in 0..5 {
            let client = client.clone();
            callers.push(tokio::spawn(async move {
                client.call(&format!("tool_{n}"), json!({"n": n})).await
            }));
        }

        let mut requests = Vec::new();
        for _ in 0..5 {
            requests.push(rx.recv().await.unwrap());
        }
        let ids: std::collections::HashSet<u64> = requests.iter().map(request_id).collect();
        assert_eq!(ids.len(), 5);

        for request in requests.iter().rev() {
            let n = request.params.as_ref().unwrap()["arguments"]["n"].clone();
            assert!(client.settle(request_id(request), Ok(json!({"echo": n}))));
        }

        for (n, caller) in callers.into_iter().enumerate() {
            assert_eq!(caller.await.unwrap(), Ok(json!({"echo": n})));
        }
        assert_eq!(client.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_call_times_out_and_late_response_is_ignored() {
        let (client, mut rx) = client();
        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call("x", json!({})).await })
        };

        let request = rx.recv().await.unwrap();
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(
            caller.await.unwrap(),
            Err(ToolCallError::Timeout {
                tool: "x".into(),
                timeout_secs: 30,
            })
        );
        assert_eq!(client.pending_count(), 0);
        assert!(!client.settle(request_id(&request), Ok(json!({}))));
    }

    #[tokio::test]
    async fn duplicate_response_settles_once() {
        let (client, mut rx) = client();
        let caller = {
            let client = client.clone();
            tokio::spawn(async move { client.call("x", json!({})).await })
        };

        let request = rx.recv().await.unwrap();
        let id = request_id(&request);
        assert!(client.settle(id, Ok(json!(1))));
        assert!(!client.settle(id, Ok(json!(2))));
        assert_eq!(caller.await.unwrap(), Ok(json!(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_caller_releases_pending_entry() {
        let (client, mut rx) = client();

        let gave_up =
            tokio::time::timeout(Duration::from_secs(1), client.call("x", json!({}))).await;
        assert!(gave_up.is_err());
        assert_eq!(client.pending_count(), 0);

        let request = rx.recv().await.unwrap();
        assert!(!client.settle(request_id(&request), Ok(json!({}))));
    }

    #[tokio::test]
    async fn closed_transport_rejects_without_leaking_entry() {
        let (transport, rx) = ChannelTransport::new();
        drop(rx);
        let client = ToolClient::new(Arc::new(transport), DEFAULT_TOOL_TIMEOUT);

        let err = client.call("x", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolCallError::Transport(_)));
        assert_eq!(client.pending_count(), 0);
    }
}
