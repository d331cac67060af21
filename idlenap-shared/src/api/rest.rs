//! reqwest-backed push notifier.

use super::{NotifyError, PushReq};
use crate::config::PushTarget;
use crate::services::Notifier;
use once_cell::sync::Lazy;
use std::time::Duration;

/// Single attempt budget for one push.
pub const PUSH_TIMEOUT: Duration = Duration::from_secs(8);

static HTTP_CLIENT: Lazy<Result<reqwest::Client, String>> = Lazy::new(|| {
    reqwest::Client::builder()
        .user_agent(concat!("idlenap/", env!("CARGO_PKG_VERSION")))
        .timeout(PUSH_TIMEOUT)
        .build()
        .map_err(|e| e.to_string())
});

fn mk_client() -> Result<reqwest::Client, NotifyError> {
    (*HTTP_CLIENT).clone().map_err(NotifyError::Http)
}

/// POSTs `req` once; success is any 2xx. Returns the response body.
pub async fn push(api: &str, req: &PushReq) -> Result<String, NotifyError> {
    let client = mk_client()?;
    let res = client
        .post(api)
        .json(req)
        .send()
        .await
        .map_err(|e| NotifyError::Http(e.to_string()))?;
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    if !status.is_success() {
        return Err(NotifyError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PushPlusNotifier;

#[async_trait::async_trait]
impl Notifier for PushPlusNotifier {
    async fn send(
        &self,
        target: &PushTarget,
        title: &str,
        content: &str,
    ) -> Result<String, NotifyError> {
        let req = PushReq::new(target, title, content);
        tracing::debug!(api = %target.api, title, "push: sending");
        push(&target.api, &req).await
    }
}
