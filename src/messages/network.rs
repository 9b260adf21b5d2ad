//! Network messages - communication between App and Network layers

use crate::models::Credentials;
use crate::pipeline::{Invocation, OperationOutcome};

/// Commands sent from App layer to Network layer
#[derive(Debug, Clone)]
pub enum NetworkCommand {
    /// Run one operation to completion
    Execute {
        id: u64,
        credentials: Credentials,
        invocation: Invocation,
    },
    /// Shutdown the network actor
    Shutdown,
}

/// Responses sent from Network layer to App layer
#[derive(Debug, Clone)]
pub enum NetworkResponse {
    /// Progress line for the status bar
    Status(String),
    /// Operation finished, successfully or not
    Completed { id: u64, outcome: OperationOutcome },
    /// Current template display names, sorted
    Templates(Vec<String>),
}

impl NetworkResponse {
    /// Request ID for responses that belong to one operation
    pub fn id(&self) -> Option<u64> {
        match self {
            NetworkResponse::Completed { id, .. } => Some(*id),
            NetworkResponse::Status(_) | NetworkResponse::Templates(_) => None,
        }
    }
}
