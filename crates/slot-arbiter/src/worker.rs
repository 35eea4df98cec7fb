//! Arbiter worker - the serialization context.
//!
//! One tokio task owns the `Arbiter`. Handles enqueue commands and get a
//! `Completion` back; commands run one at a time in submission order, and
//! animated transitions are awaited inside the worker so nothing else touches
//! the slot while they run.
//!
//! Code already running on the worker (surface or animator callbacks) must
//! not wait on the worker's own queue. Handle calls made there skip the
//! channel and go into a re-entrant queue that runs as soon as the current
//! command finishes, ahead of anything submitted from outside.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::arbiter::Arbiter;
use crate::presentable::{Presentable, PresentableId};
use crate::slot::SlotSnapshot;
use crate::status::PresentationStatus;

tokio::task_local! {
    static CURRENT_WORKER: WorkerId;
}

/// Distinguishes workers so a handle only short-circuits on its own worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct WorkerId(u64);

impl WorkerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ArbiterError {
    #[error("Arbiter worker stopped before the command completed")]
    Closed,
}

enum Command {
    Present {
        entity: Arc<dyn Presentable>,
        animated: bool,
        reply: oneshot::Sender<PresentationStatus>,
    },
    Withdraw {
        id: PresentableId,
        animated: bool,
        reply: oneshot::Sender<PresentationStatus>,
    },
    Replace {
        occupant: PresentableId,
        with: Arc<dyn Presentable>,
        animated: bool,
        reply: oneshot::Sender<PresentationStatus>,
    },
    Status {
        id: PresentableId,
        reply: oneshot::Sender<PresentationStatus>,
    },
    Snapshot {
        reply: oneshot::Sender<SlotSnapshot>,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Present { .. } => "present",
            Command::Withdraw { .. } => "withdraw",
            Command::Replace { .. } => "replace",
            Command::Status { .. } => "status",
            Command::Snapshot { .. } => "snapshot",
        }
    }
}

/// Single-shot result of a submitted command.
///
/// Resolves exactly once: with the value when the command finished, or with
/// `ArbiterError::Closed` if the worker stopped first. Dropping it does not
/// cancel the command.
#[derive(Debug)]
pub struct Completion<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for Completion<T> {
    type Output = Result<T, ArbiterError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| ArbiterError::Closed))
    }
}

/// Cloneable entry point to an arbiter running on its worker.
///
/// Every method is a non-blocking enqueue, callable from any context.
#[derive(Clone)]
pub struct ArbiterHandle {
    worker: WorkerId,
    tx: mpsc::UnboundedSender<Command>,
    reentrant: Arc<StdMutex<VecDeque<Command>>>,
    shutdown: CancellationToken,
}

impl ArbiterHandle {
    /// Request that `entity` become the occupant.
    pub fn present(
        &self,
        entity: Arc<dyn Presentable>,
        animated: bool,
    ) -> Completion<PresentationStatus> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Present {
            entity,
            animated,
            reply,
        });
        Completion { rx }
    }

    /// Request that `id` leave the slot. Resolves on every path, including
    /// when `id` was only waiting or not known at all.
    pub fn withdraw(&self, id: PresentableId, animated: bool) -> Completion<PresentationStatus> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Withdraw {
            id,
            animated,
            reply,
        });
        Completion { rx }
    }

    /// Swap the occupant for `with` regardless of `dismissible`.
    pub fn replace(
        &self,
        occupant: PresentableId,
        with: Arc<dyn Presentable>,
        animated: bool,
    ) -> Completion<PresentationStatus> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Replace {
            occupant,
            with,
            animated,
            reply,
        });
        Completion { rx }
    }

    pub fn status(&self, id: PresentableId) -> Completion<PresentationStatus> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Status { id, reply });
        Completion { rx }
    }

    pub fn snapshot(&self) -> Completion<SlotSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Snapshot { reply });
        Completion { rx }
    }

    /// Stop the worker after the command in progress. Queued commands
    /// resolve with `ArbiterError::Closed`.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.tx.is_closed()
    }

    /// True when called from code running on this handle's worker.
    pub fn is_on_worker(&self) -> bool {
        CURRENT_WORKER
            .try_with(|current| *current == self.worker)
            .unwrap_or(false)
    }

    fn submit(&self, command: Command) {
        if self.is_on_worker() {
            tracing::trace!(command = command.name(), "Queued re-entrant command");
            match self.reentrant.lock() {
                Ok(mut queue) => queue.push_back(command),
                Err(poisoned) => {
                    tracing::error!("Re-entrant queue mutex poisoned - recovering");
                    poisoned.into_inner().push_back(command);
                }
            }
            return;
        }

        if let Err(mpsc::error::SendError(command)) = self.tx.send(command) {
            tracing::debug!(command = command.name(), "Arbiter worker stopped, dropping command");
        }
    }
}

impl std::fmt::Debug for ArbiterHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArbiterHandle")
            .field("worker", &self.worker.0)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Owns the arbiter and executes commands in order.
pub struct ArbiterWorker {
    id: WorkerId,
    arbiter: Arbiter,
    rx: mpsc::UnboundedReceiver<Command>,
    reentrant: Arc<StdMutex<VecDeque<Command>>>,
    shutdown: CancellationToken,
}

impl ArbiterWorker {
    pub fn new(arbiter: Arbiter) -> (Self, ArbiterHandle) {
        let id = WorkerId::next();
        let (tx, rx) = mpsc::unbounded_channel();
        let reentrant = Arc::new(StdMutex::new(VecDeque::new()));
        let shutdown = CancellationToken::new();

        let handle = ArbiterHandle {
            worker: id,
            tx,
            reentrant: Arc::clone(&reentrant),
            shutdown: shutdown.clone(),
        };
        let worker = Self {
            id,
            arbiter,
            rx,
            reentrant,
            shutdown,
        };
        (worker, handle)
    }

    /// Spawn the worker on the current tokio runtime.
    ///
    /// The join handle yields the arbiter back once the worker stops.
    pub fn spawn(arbiter: Arbiter) -> (ArbiterHandle, JoinHandle<Arbiter>) {
        let (worker, handle) = Self::new(arbiter);
        let join = tokio::spawn(worker.run());
        (handle, join)
    }

    /// Run until shutdown or until every handle is dropped.
    pub async fn run(self) -> Arbiter {
        let id = self.id;
        CURRENT_WORKER.scope(id, self.event_loop()).await
    }

    async fn event_loop(mut self) -> Arbiter {
        tracing::debug!(worker = self.id.0, "Arbiter worker started");

        loop {
            while let Some(command) = self.next_reentrant() {
                self.execute(command).await;
            }

            let command = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::info!(worker = self.id.0, "Arbiter worker shutting down");
                    break;
                }
                command = self.rx.recv() => match command {
                    Some(command) => command,
                    None => {
                        tracing::debug!(worker = self.id.0, "All handles dropped");
                        break;
                    }
                },
            };
            self.execute(command).await;
        }

        self.rx.close();
        let dropped = self.drain_pending();
        if dropped > 0 {
            tracing::warn!(worker = self.id.0, dropped, "Dropped pending commands on shutdown");
        }
        self.arbiter
    }

    fn next_reentrant(&self) -> Option<Command> {
        match self.reentrant.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(poisoned) => {
                tracing::error!("Re-entrant queue mutex poisoned - recovering");
                poisoned.into_inner().pop_front()
            }
        }
    }

    /// Drop everything still queued so waiting completions resolve `Closed`.
    fn drain_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.next_reentrant().is_some() {
            dropped += 1;
        }
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    async fn execute(&mut self, command: Command) {
        tracing::trace!(command = command.name(), "Executing command");
        match command {
            Command::Present {
                entity,
                animated,
                reply,
            } => {
                let status = self.arbiter.present(entity, animated).await;
                let _ = reply.send(status);
            }
            Command::Withdraw {
                id,
                animated,
                reply,
            } => {
                let status = self.arbiter.withdraw(id, animated).await;
                let _ = reply.send(status);
            }
            Command::Replace {
                occupant,
                with,
                animated,
                reply,
            } => {
                let status = self.arbiter.replace(occupant, with, animated).await;
                let _ = reply.send(status);
            }
            Command::Status { id, reply } => {
                let _ = reply.send(self.arbiter.status(id));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.arbiter.snapshot());
            }
        }
    }
}
