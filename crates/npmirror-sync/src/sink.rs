//! Destinations for content declarations.

use std::future::Future;

use miette::Diagnostic;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::types::ContentDeclaration;

#[derive(Error, Diagnostic, Debug)]
pub enum SinkError {
    #[error("Sink is closed")]
    #[diagnostic(
        code(npmirror_sync::sink::closed),
        help("The consumer stopped before the run finished")
    )]
    Closed,

    #[error("Sink rejected {relative_path}: {reason}")]
    #[diagnostic(code(npmirror_sync::sink::rejected))]
    Rejected {
        relative_path: String,
        reason: String,
    },
}

impl SinkError {
    pub fn rejected(declaration: &ContentDeclaration, reason: impl Into<String>) -> Self {
        Self::Rejected {
            relative_path: declaration.relative_path.clone(),
            reason: reason.into(),
        }
    }
}

/// Consumer of content declarations.
///
/// `accept` resolves once the sink has taken ownership of the declaration.
/// A sink applies backpressure simply by not resolving until it has room;
/// the pipeline never hands over the next declaration before then. Any
/// error is fatal to the run.
pub trait ContentSink: Send {
    fn accept(
        &mut self,
        declaration: ContentDeclaration,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Sink backed by a bounded channel, for embedding the pipeline in a
/// larger program. `accept` waits while the channel is full.
pub struct BoundedSink {
    sender: mpsc::Sender<ContentDeclaration>,
}

impl BoundedSink {
    pub fn new(sender: mpsc::Sender<ContentDeclaration>) -> Self {
        Self { sender }
    }

    /// Creates a sink together with the receiving end of its channel.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<ContentDeclaration>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }
}

impl ContentSink for BoundedSink {
    async fn accept(&mut self, declaration: ContentDeclaration) -> Result<(), SinkError> {
        self.sender
            .send(declaration)
            .await
            .map_err(|_| SinkError::Closed)
    }
}

/// Keeps every declaration in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub declarations: Vec<ContentDeclaration>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn relative_paths(&self) -> Vec<&str> {
        self.declarations
            .iter()
            .map(|d| d.relative_path.as_str())
            .collect()
    }
}

impl ContentSink for CollectingSink {
    async fn accept(&mut self, declaration: ContentDeclaration) -> Result<(), SinkError> {
        self.declarations.push(declaration);
        Ok(())
    }
}
