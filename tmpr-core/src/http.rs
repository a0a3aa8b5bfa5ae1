use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{Error, Result};

const MAX_BODY_IN_ERROR: usize = 200;

/// Send `request` and decode a successful JSON reply into `T`.
///
/// Connection and body-read failures map to [`Error::Transport`], non-2xx
/// replies to [`Error::Status`] and malformed JSON to [`Error::Decode`].
pub(crate) async fn get_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let res = request
        .send()
        .await
        .map_err(|e| Error::Transport(e.without_url().to_string()))?;

    let status = res.status();
    debug!(%status, "upstream replied");

    let body = res
        .text()
        .await
        .map_err(|e| Error::Transport(format!("failed to read response body: {e}")))?;

    if !status.is_success() {
        warn!(%status, "upstream request failed");
        return Err(Error::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        });
    }

    Ok(serde_json::from_str(&body)?)
}

fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_BODY_IN_ERROR {
        return body.to_string();
    }

    let mut end = MAX_BODY_IN_ERROR;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}
