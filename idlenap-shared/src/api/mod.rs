use serde::{Deserialize, Serialize};

use crate::config::PushTarget;

#[cfg(feature = "rest-client")]
pub mod rest;

/// Body of a push webhook POST.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushReq {
    pub token: String,
    pub title: String,
    pub content: String,
    pub topic: String,
    pub template: String,
    pub channel: String,
}

impl PushReq {
    pub fn new(target: &PushTarget, title: &str, content: &str) -> Self {
        Self {
            token: target.token.clone(),
            title: title.to_string(),
            content: content.to_string(),
            topic: target.topic.clone(),
            template: "txt".to_string(),
            channel: "wechat".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("http: {0}")]
    Http(String),
    #[error("status {status}: {body}")]
    Status { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape() {
        let target = PushTarget {
            api: "https://push.example/send".into(),
            token: "tok".into(),
            topic: "family".into(),
        };
        let body = serde_json::to_value(PushReq::new(&target, "t", "c")).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "token": "tok",
                "title": "t",
                "content": "c",
                "topic": "family",
                "template": "txt",
                "channel": "wechat"
            })
        );
    }
}
