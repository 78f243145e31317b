//! Stream relay: raw completion bytes in, growing text out
//!
//! A [`StreamRelay`] pulls chunks from a completion byte stream, decodes and
//! re-frames them into events, and appends each event's text fragment to an
//! accumulator that consumers watch through a `tokio::sync::watch` channel.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::llm::CompletionError;
use crate::sse::{EventParser, ParsedEvent, SseEvent, TextPayload, Utf8Decoder};

/// Lifecycle of a relay run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelayState {
    #[default]
    Idle,
    Streaming,
    Complete,
    Aborted,
}

/// A single event whose payload could not be used
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("Invalid event payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Extract the text fragment carried by one event
pub fn event_text(event: &SseEvent) -> Result<String, FrameError> {
    let payload: TextPayload = serde_json::from_str(&event.data)?;
    Ok(payload.into_text())
}

/// Requests that a relay stop pulling
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        debug!("CancelHandle::cancel: called");
        self.tx.send_replace(true);
    }
}

/// Observed by a relay run; cloneable
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested; pends forever otherwise
    pub async fn cancelled(&mut self) {
        if let Some(rx) = self.rx.as_mut() {
            let fired = rx.wait_for(|cancelled| *cancelled).await.is_ok();
            if fired {
                return;
            }
        }
        std::future::pending::<()>().await
    }
}

/// Create a linked cancel handle and signal
pub fn cancellation() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
}

/// Incremental decoder and accumulator for one completion stream
#[derive(Debug)]
pub struct StreamRelay {
    decoder: Utf8Decoder,
    parser: EventParser,
    state: RelayState,
    output: watch::Sender<String>,
    text: String,
    reconnect_interval: Option<u64>,
}

impl Default for StreamRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamRelay {
    pub fn new() -> Self {
        let (output, _) = watch::channel(String::new());
        Self {
            decoder: Utf8Decoder::new(),
            parser: EventParser::new(),
            state: RelayState::Idle,
            output,
            text: String::new(),
            reconnect_interval: None,
        }
    }

    /// Watch the accumulated text; every update is a longer prefix-extension
    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.output.subscribe()
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Last `retry:` interval announced by the stream, in milliseconds
    pub fn reconnect_interval(&self) -> Option<u64> {
        self.reconnect_interval
    }

    /// Process one raw chunk synchronously, returning the fragments appended
    pub fn feed(&mut self, chunk: &[u8]) -> usize {
        let decoded = self.decoder.decode(chunk);
        self.dispatch(&decoded)
    }

    fn dispatch(&mut self, decoded: &str) -> usize {
        let mut appended = 0;
        for parsed in self.parser.feed(decoded) {
            match parsed {
                ParsedEvent::Event(event) => match event_text(&event) {
                    Ok(fragment) => {
                        self.append(&fragment);
                        appended += 1;
                    }
                    Err(e) => warn!(error = %e, data = %event.data, "StreamRelay: skipping malformed event"),
                },
                ParsedEvent::ReconnectInterval(ms) => {
                    debug!(ms, "StreamRelay: reconnect interval announced");
                    self.reconnect_interval = Some(ms);
                }
            }
        }
        appended
    }

    fn append(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.text.push_str(fragment);
        self.output.send_modify(|text| text.push_str(fragment));
    }

    /// Pull the stream to its end, a transport error, or cancellation
    ///
    /// The stream is consumed and dropped before this returns, on every
    /// path. Text accumulated so far is kept in all outcomes. A transport
    /// error leaves the relay `Aborted` and is returned to the caller.
    pub async fn run<S>(&mut self, mut stream: S, mut cancel: CancelSignal) -> Result<RelayState, CompletionError>
    where
        S: Stream<Item = Result<Bytes, CompletionError>> + Unpin,
    {
        debug!("StreamRelay::run: called");
        self.state = RelayState::Streaming;

        let outcome = loop {
            if cancel.is_cancelled() {
                info!(text_len = self.text.len(), "StreamRelay::run: cancelled");
                break Ok(RelayState::Aborted);
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(text_len = self.text.len(), "StreamRelay::run: cancelled while waiting");
                    break Ok(RelayState::Aborted);
                }
                next = stream.next() => match next {
                    Some(Ok(chunk)) => {
                        self.feed(&chunk);
                    }
                    Some(Err(e)) => {
                        warn!(error = %e, text_len = self.text.len(), "StreamRelay::run: transport error");
                        break Err(e);
                    }
                    None => {
                        let tail = self.decoder.finish();
                        self.dispatch(&tail);
                        self.parser.finish();
                        debug!(text_len = self.text.len(), "StreamRelay::run: stream ended");
                        break Ok(RelayState::Complete);
                    }
                },
            }
        };
        drop(stream);

        match outcome {
            Ok(state) => {
                self.state = state;
                Ok(state)
            }
            Err(e) => {
                self.state = RelayState::Aborted;
                Err(e)
            }
        }
    }
}

/// Drain a completion stream and return the full text
pub async fn relay_to_end<S>(stream: S) -> Result<String, CompletionError>
where
    S: Stream<Item = Result<Bytes, CompletionError>> + Unpin,
{
    let mut relay = StreamRelay::new();
    relay.run(stream, CancelSignal::never()).await?;
    Ok(relay.into_text())
}
