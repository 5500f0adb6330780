//! Service transport
//!
//! Newline-delimited JSON over TCP. Every request line carries an `id` and a
//! `service` tag; replies echo the id. The step action streams `feedback`
//! lines and ends with a `result` or `preempted` line; `cancel_step` may be
//! sent on the same connection while a goal runs.

use std::net::SocketAddr;
use std::sync::Arc;

use contracts::{ReplyBody, ReplyEnvelope, RequestEnvelope, ServiceRequest, ServiceResponse, StepGoal};
use sim_client::SimClient;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, instrument, warn};

use crate::error::Result;
use crate::services::BridgeServices;
use crate::step::{StepActionServer, StepOutcome};

type ReplyTx = mpsc::UnboundedSender<ReplyEnvelope>;

/// TCP front end of the service endpoints and the step action
pub struct ServiceServer<C: SimClient> {
    services: BridgeServices<C>,
    steps: Arc<StepActionServer>,
}

impl<C: SimClient> Clone for ServiceServer<C> {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
            steps: Arc::clone(&self.steps),
        }
    }
}

impl<C: SimClient> ServiceServer<C> {
    pub fn new(services: BridgeServices<C>) -> Self {
        Self {
            services,
            steps: Arc::new(StepActionServer::new()),
        }
    }

    /// Accept connections until `shutdown` turns true
    #[instrument(name = "service_server_serve", skip_all, fields(addr = ?listener.local_addr().ok()))]
    pub async fn serve(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!("Service server listening");
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "Accept failed");
                            continue;
                        }
                    };
                    let server = self.clone();
                    tokio::spawn(async move {
                        if let Err(e) = server.handle_connection(stream, peer).await {
                            warn!(peer = %peer, error = %e, "Connection closed with error");
                        }
                    });
                }
            }
        }
        self.steps.cancel_active();
        info!("Service server stopped");
        Ok(())
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        debug!(peer = %peer, "Client connected");
        let (read_half, mut write_half) = stream.into_split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ReplyEnvelope>();

        let writer = tokio::spawn(async move {
            while let Some(reply) = rx.recv().await {
                let mut line = match serde_json::to_vec(&reply) {
                    Ok(line) => line,
                    Err(e) => {
                        error!(id = reply.id, error = %e, "Failed to encode reply");
                        continue;
                    }
                };
                line.push(b'\n');
                if write_half.write_all(&line).await.is_err() {
                    break;
                }
            }
        });

        let mut reader = BufReader::new(read_half);
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line).await? == 0 {
                break;
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            // bytes go straight to serde so invalid UTF-8 is a malformed request
            match serde_json::from_slice::<RequestEnvelope>(&line) {
                Ok(envelope) => self.dispatch(envelope, &tx),
                Err(e) => {
                    warn!(peer = %peer, error = %e, "Malformed request");
                    send(&tx, 0, ReplyBody::Error {
                        message: format!("malformed request: {e}"),
                    });
                }
            }
        }

        drop(tx);
        // in-flight calls hold their own sender; the writer exits after the last one
        if let Err(e) = writer.await {
            error!(peer = %peer, error = ?e, "Writer task panicked");
        }
        debug!(peer = %peer, "Client disconnected");
        Ok(())
    }

    fn dispatch(&self, envelope: RequestEnvelope, tx: &ReplyTx) {
        let RequestEnvelope { id, request } = envelope;
        match request {
            ServiceRequest::Step(goal) => self.start_step(id, goal, tx.clone()),
            ServiceRequest::CancelStep => {
                let accepted = self.steps.cancel_active();
                observability::record_service_call("cancel_step", if accepted { "ok" } else { "failed" });
                send(tx, id, ReplyBody::Response(ServiceResponse::CancelStep { accepted }));
            }
            request => {
                let services = self.services.clone();
                let tx = tx.clone();
                tokio::spawn(async move {
                    let body = match services.handle(request).await {
                        Ok(response) => ReplyBody::Response(response),
                        Err(e) => ReplyBody::Error {
                            message: e.to_string(),
                        },
                    };
                    send(&tx, id, body);
                });
            }
        }
    }

    fn start_step(&self, id: u64, goal: StepGoal, tx: ReplyTx) {
        let steps = Arc::clone(&self.steps);
        let client = Arc::clone(self.services.controller().client());
        let handle = steps.accept();

        tokio::spawn(async move {
            let feedback_tx = tx.clone();
            let outcome = steps
                .execute(client.as_ref(), goal, &handle, |feedback| {
                    send(&feedback_tx, id, ReplyBody::Feedback(feedback));
                })
                .await;

            let (status, body) = match outcome {
                Ok(StepOutcome::Succeeded(result)) => ("ok", ReplyBody::Result(result)),
                Ok(StepOutcome::Preempted(result)) => ("failed", ReplyBody::Preempted(result)),
                Err(e) => (
                    "error",
                    ReplyBody::Error {
                        message: e.to_string(),
                    },
                ),
            };
            observability::record_service_call("step", status);
            send(&tx, id, body);
        });
    }
}

fn send(tx: &ReplyTx, id: u64, body: ReplyBody) {
    if tx.send(ReplyEnvelope { id, body }).is_err() {
        debug!(id, "Client gone, reply discarded");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::ScenarioController;
    use config_loader::DocumentResolver;
    use contracts::SensorDefinitionCatalog;
    use serde_json::{json, Value};
    use sim_client::{MockSimClient, SensorRegistry};
    use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

    struct Client {
        lines: tokio::io::Lines<BufReader<OwnedReadHalf>>,
        write: OwnedWriteHalf,
    }

    impl Client {
        async fn send(&mut self, value: Value) {
            let mut line = value.to_string();
            line.push('\n');
            self.write.write_all(line.as_bytes()).await.unwrap();
        }

        async fn recv(&mut self) -> ReplyEnvelope {
            let line = self.lines.next_line().await.unwrap().unwrap();
            serde_json::from_str(&line).unwrap()
        }
    }

    async fn serve() -> (Client, Arc<MockSimClient>, watch::Sender<bool>) {
        let mock = Arc::new(MockSimClient::new());
        mock.connect("localhost", 64256).await.unwrap();
        let controller = ScenarioController::new(
            Arc::clone(&mock),
            SensorRegistry::with_defaults(),
            SensorDefinitionCatalog::default(),
            DocumentResolver::new(None),
        );
        let server = ServiceServer::new(BridgeServices::new(Arc::new(controller)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = watch::channel(false);
        tokio::spawn(server.serve(listener, rx));

        let (read, write) = TcpStream::connect(addr).await.unwrap().into_split();
        let client = Client {
            lines: BufReader::new(read).lines(),
            write,
        };
        (client, mock, tx)
    }

    #[tokio::test]
    async fn malformed_line_gets_error_with_id_zero() {
        let (mut client, _mock, _shutdown) = serve().await;
        client.send(json!({ "id": 5, "service": "warp" })).await;

        let reply = client.recv().await;
        assert_eq!(reply.id, 0);
        assert!(matches!(reply.body, ReplyBody::Error { .. }));
    }

    #[tokio::test]
    async fn invalid_utf8_gets_error_and_keeps_connection() {
        let (mut client, _mock, _shutdown) = serve().await;
        client
            .write
            .write_all(b"{\"id\": 1, \"service\": \"\xff\xfe\"}\n")
            .await
            .unwrap();

        let reply = client.recv().await;
        assert_eq!(reply.id, 0);
        assert!(matches!(reply.body, ReplyBody::Error { .. }));

        client.send(json!({ "id": 2, "service": "get_scenario_state" })).await;
        assert_eq!(client.recv().await.id, 2);
    }

    #[tokio::test]
    async fn request_response_echoes_id() {
        let (mut client, _mock, _shutdown) = serve().await;
        client.send(json!({ "id": 7, "service": "get_scenario_state" })).await;

        let reply = client.recv().await;
        assert_eq!(reply.id, 7);
        match reply.body {
            ReplyBody::Response(ServiceResponse::GetScenarioState(r)) => assert!(!r.state.loaded),
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[tokio::test]
    async fn engine_error_becomes_error_reply() {
        let (mut client, _mock, _shutdown) = serve().await;
        // no scenario is running, so the engine rejects the step
        client
            .send(json!({ "id": 3, "service": "step", "total_number_of_steps": 4, "feedback_cycle_size": 2 }))
            .await;

        let reply = client.recv().await;
        assert_eq!(reply.id, 3);
        assert!(matches!(reply.body, ReplyBody::Error { .. }));
    }

    #[tokio::test]
    async fn cancel_without_goal_is_not_accepted() {
        let (mut client, _mock, _shutdown) = serve().await;
        client.send(json!({ "id": 9, "service": "cancel_step" })).await;

        let reply = client.recv().await;
        assert_eq!(
            reply.body,
            ReplyBody::Response(ServiceResponse::CancelStep { accepted: false })
        );
    }
}
