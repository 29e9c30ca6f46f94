use std::future::Future;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;

use scribe_domain::RequestState;

/// Awaits `future` while handing every command that arrives meanwhile to `on_busy`.
pub(crate) async fn drive<F, C>(
    future: F,
    commands: &mut UnboundedReceiver<C>,
    mut on_busy: impl FnMut(C),
) -> F::Output
where
    F: Future,
{
    tokio::pin!(future);
    loop {
        tokio::select! {
            output = &mut future => return output,
            Some(command) = commands.recv() => on_busy(command),
        }
    }
}

/// Sends `event` to the host. Returns `false` when the host has gone away.
pub(crate) fn emit<E>(events: &UnboundedSender<E>, event: E) -> bool {
    if events.send(event).is_err() {
        tracing::debug!("event receiver dropped; discarding event");
        return false;
    }
    true
}

pub(crate) fn transition(state: &watch::Sender<RequestState>, next: RequestState) {
    let previous = state.send_replace(next);
    tracing::debug!(from = ?previous, to = ?next, "request state transition");
}

/// Moves a loading request to `Downloading` on its first progress report.
/// A cached model reports nothing and stays in `Loading`.
pub(crate) fn mark_downloading(state: &watch::Sender<RequestState>) {
    state.send_if_modified(|current| {
        if *current != RequestState::Loading {
            return false;
        }
        tracing::debug!(from = ?*current, to = ?RequestState::Downloading, "request state transition");
        *current = RequestState::Downloading;
        true
    });
}

/// Hands commands already queued to `on_busy` without waiting for new ones.
pub(crate) fn reject_pending<C>(commands: &mut UnboundedReceiver<C>, mut on_busy: impl FnMut(C)) {
    while let Ok(command) = commands.try_recv() {
        on_busy(command);
    }
}
