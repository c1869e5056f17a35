//! Forwarding of a running turn to a client as a stream of events.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// An event of a streamed turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment generated by the model.
    Token(String),
    /// A tool is about to be executed.
    ToolStarted(String),
    /// The turn failed, no more tokens will follow.
    Error(String),
    /// The turn is over. This is always the last event, and it is emitted
    /// exactly once.
    Done,
}

/// The sending half of a relay. Sending never fails, events are dropped
/// once the client is gone.
#[derive(Clone)]
pub(crate) struct EventSender(UnboundedSender<StreamEvent>);

impl EventSender {
    #[inline]
    pub fn send(&self, event: StreamEvent) {
        if self.0.send(event).is_err() {
            trace!("relay receiver is gone, event dropped");
        }
    }
}

/// Emits [`StreamEvent::Done`] when dropped. A turn that panics is reported
/// with a [`StreamEvent::Error`] right before it.
pub(crate) struct DoneGuard(pub EventSender);

pub(crate) const TURN_PANICKED: &str = "turn panicked";

impl Drop for DoneGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.send(StreamEvent::Error(TURN_PANICKED.to_owned()));
        }
        self.0.send(StreamEvent::Done);
    }
}

/// The events of a turn started by [`Agent::stream_turn`](crate::Agent::stream_turn).
///
/// The stream ends right after [`StreamEvent::Done`]. Dropping it stops the
/// forwarding, the turn itself keeps running until it is committed.
pub struct EventStream {
    rx: UnboundedReceiver<StreamEvent>,
    done: bool,
}

pub(crate) fn channel() -> (EventSender, EventStream) {
    let (tx, rx) = unbounded_channel();
    (EventSender(tx), EventStream { rx, done: false })
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(StreamEvent::Done)) | Poll::Ready(None) => {
                // A producer that vanished without a terminator still ends
                // the stream with one.
                this.done = true;
                this.rx.close();
                Poll::Ready(Some(StreamEvent::Done))
            }
            poll => poll,
        }
    }
}
