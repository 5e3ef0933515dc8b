//! Response bodies.
//!
//! File downloads are streamed from disk and report completion when the body
//! is released: hyper drops a response body once its last frame has been
//! handed to the connection, or early if the client goes away. Only the first
//! case has yielded the full byte count.

use std::convert::Infallible;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use futures_util::StreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::{Body, Frame, SizeHint};
use tokio::io::{AsyncReadExt, Take};
use tokio_util::io::ReaderStream;

pub(crate) type ShareBody = UnsyncBoxBody<Bytes, io::Error>;

/// Called once when a file body has yielded every byte.
pub(crate) type OnComplete = Box<dyn FnOnce() + Send>;

pub(crate) fn empty() -> ShareBody {
    Empty::<Bytes>::new()
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

pub(crate) fn text(msg: &'static str) -> ShareBody {
    Full::new(Bytes::from_static(msg.as_bytes()))
        .map_err(|never: Infallible| match never {})
        .boxed_unsync()
}

/// Streams at most `len` bytes of `file`.
pub(crate) fn file(file: tokio::fs::File, len: u64, on_complete: OnComplete) -> ShareBody {
    FileBody {
        stream: ReaderStream::new(file.take(len)),
        expected: len,
        sent: 0,
        on_complete: Some(on_complete),
    }
    .boxed_unsync()
}

struct FileBody {
    stream: ReaderStream<Take<tokio::fs::File>>,
    expected: u64,
    sent: u64,
    on_complete: Option<OnComplete>,
}

impl Body for FileBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        let this = self.get_mut();
        match ready!(this.stream.poll_next_unpin(cx)) {
            Some(Ok(chunk)) => {
                this.sent += chunk.len() as u64;
                Poll::Ready(Some(Ok(Frame::data(chunk))))
            }
            Some(Err(e)) => Poll::Ready(Some(Err(e))),
            None => {
                if this.sent < this.expected {
                    // File shrank after its length was taken.
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("file ended after {} of {} bytes", this.sent, this.expected),
                    ))));
                }
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.sent >= self.expected
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.expected.saturating_sub(self.sent))
    }
}

impl Drop for FileBody {
    fn drop(&mut self) {
        if self.sent == self.expected {
            if let Some(on_complete) = self.on_complete.take() {
                on_complete();
            }
        } else {
            tracing::info!(
                sent = self.sent,
                expected = self.expected,
                "download ended before the whole file was sent"
            );
        }
    }
}
