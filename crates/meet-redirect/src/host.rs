use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Normal,
    Popup,
    App,
    Panel,
    Devtools,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabInfo {
    pub id: TabId,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowInfo {
    pub id: WindowId,
    #[serde(rename = "type")]
    pub kind: WindowKind,
    #[serde(default)]
    pub tabs: Vec<TabInfo>,
}

impl WindowInfo {
    pub fn first_tab_url(&self) -> Option<&str> {
        self.tabs.first().and_then(|tab| tab.url.as_deref())
    }
}

/// Outbound calls into the browser.
///
/// Every method defaults to [`CoreError::NotImplemented`] so partial hosts
/// (and test doubles) only implement what they need.
#[async_trait]
pub trait Host: Send + Sync {
    fn id(&self) -> &str {
        "unsupported"
    }

    /// Lists open windows of the given kinds, with their tabs populated.
    async fn query_windows(&self, _kinds: &[WindowKind]) -> CoreResult<Vec<WindowInfo>> {
        Err(CoreError::NotImplemented)
    }
    async fn create_window(&self, _url: &str, _kind: WindowKind) -> CoreResult<WindowId> {
        Err(CoreError::NotImplemented)
    }
    async fn focus_window(&self, _window: WindowId) -> CoreResult<()> {
        Err(CoreError::NotImplemented)
    }
    async fn stop_tab_load(&self, _tab: TabId) -> CoreResult<()> {
        Err(CoreError::NotImplemented)
    }
    async fn close_tab(&self, _tab: TabId) -> CoreResult<()> {
        Err(CoreError::NotImplemented)
    }
}

pub type SharedHost = Arc<dyn Host>;
