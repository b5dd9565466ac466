//! Server-Sent Events responses.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use deskdemo_core::{DONE_SENTINEL, RelayEvent};

/// Create an SSE stream from a broadcast channel.
///
/// Receivers that fall behind skip the records they missed.
pub fn create_sse_stream(
    rx: tokio::sync::broadcast::Receiver<String>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream =
        BroadcastStream::new(rx).filter_map(|result: Result<String, BroadcastStreamRecvError>| {
            result.ok().map(|data| Ok(Event::default().data(data)))
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Create the relay response: one `data:` line per event, then `data: [DONE]`.
///
/// `on_complete` runs once the events are exhausted, just before the
/// sentinel is written. It does not run if the client disconnects first.
pub fn relay_sse<S, F>(
    events: S,
    on_complete: F,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>
where
    S: tokio_stream::Stream<Item = RelayEvent> + Send + 'static,
    F: FnOnce() + Send + 'static,
{
    let sentinel = stream::once(async move {
        on_complete();
        Ok::<_, Infallible>(Event::default().data(DONE_SENTINEL))
    });

    let stream = events
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_data())))
        .chain(sentinel);

    Sse::new(stream)
}
