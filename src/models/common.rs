use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Order the failed request already created, when there is one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<i32>,
}

/// Flash-style outcome: a message to show and, optionally, where to go next
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoticeResponse {
    pub level: NoticeLevel,
    pub notice: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Info,
    Warning,
    Error,
}

impl NoticeResponse {
    pub fn new(level: NoticeLevel, notice: impl Into<String>) -> Self {
        Self {
            level,
            notice: notice.into(),
            redirect: None,
        }
    }

    pub fn redirect_to(mut self, path: impl Into<String>) -> Self {
        self.redirect = Some(path.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
