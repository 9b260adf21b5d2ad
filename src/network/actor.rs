//! Network actor - runs operations one at a time in the Tokio runtime

use tokio::sync::mpsc;

use crate::messages::{NetworkCommand, NetworkResponse};
use crate::network::client::RequestExecutor;
use crate::pipeline::operations::OperationKind;
use crate::pipeline::Session;
use crate::storage::Settings;

/// Network actor that owns the session and processes operation commands
pub struct NetworkActor {
    session: Session,
    response_tx: mpsc::UnboundedSender<NetworkResponse>,
}

impl NetworkActor {
    pub fn new(settings: &Settings, response_tx: mpsc::UnboundedSender<NetworkResponse>) -> Self {
        let executor = RequestExecutor::new(Some(response_tx.clone()));
        let download_dir = std::env::current_dir().unwrap_or_else(|_| ".".into());
        let mut session = Session::new(executor, settings.template_probes.clone(), download_dir);
        session.load_local_templates(&settings.template_cache_path());

        NetworkActor {
            session,
            response_tx,
        }
    }

    fn publish_templates(&self) {
        let _ = self
            .response_tx
            .send(NetworkResponse::Templates(self.session.templates().names()));
    }

    /// Run the network actor message loop. Each command is awaited to
    /// completion before the next one is read.
    pub async fn run(mut self, mut cmd_rx: mpsc::UnboundedReceiver<NetworkCommand>) {
        self.publish_templates();

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                NetworkCommand::Execute {
                    id,
                    credentials,
                    invocation,
                } => {
                    tracing::info!(id, kind = ?invocation.kind, "Executing operation");
                    let outcome = self.session.run(&credentials, &invocation).await;
                    tracing::info!(id, failed = outcome.is_failure(), "Operation completed");

                    if invocation.kind == OperationKind::ListReportTemplates {
                        self.publish_templates();
                    }
                    let _ = self.response_tx.send(NetworkResponse::Completed { id, outcome });
                }
                NetworkCommand::Shutdown => break,
            }
        }
    }
}
