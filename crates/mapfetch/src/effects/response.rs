//! Turning a transport response into a [`ClassifiedOutcome`].

use bytes::BytesMut;
use futures_util::StreamExt;

use crate::core::{classify_error, response_metadata};
use crate::data::{ClassifiedOutcome, FailureKind};
use crate::effects::transport::TransportResponse;

pub const EMPTY_BODY_MESSAGE: &str = "Received empty response body";

/// Read the whole body and classify the response.
///
/// The body stream is dropped as soon as it is exhausted or fails. A failure
/// while reading the body is classified like a failure before the response.
pub async fn read_response(response: TransportResponse) -> ClassifiedOutcome {
    let TransportResponse {
        status,
        headers,
        body,
        ..
    } = response;

    let Some(mut stream) = body else {
        return ClassifiedOutcome::failure(FailureKind::Permanent, EMPTY_BODY_MESSAGE);
    };

    let mut buf = BytesMut::new();
    let read = loop {
        match stream.next().await {
            Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
            Some(Err(e)) => break Err(e),
            None => break Ok(()),
        }
    };
    drop(stream);

    match read {
        Ok(()) => ClassifiedOutcome::Success(response_metadata(status, &headers, buf.freeze())),
        Err(e) => classify_error(&e),
    }
}
