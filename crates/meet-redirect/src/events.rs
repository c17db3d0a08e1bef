//! Events delivered by the browser.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::host::{TabId, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Complete,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeInfo {
    #[serde(default)]
    pub status: Option<LoadStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSnapshot {
    #[serde(default)]
    pub url: Option<String>,
    pub window_id: WindowId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    #[serde(rename_all = "camelCase")]
    TabCreated {
        #[serde(default)]
        tab_id: Option<TabId>,
    },
    #[serde(rename_all = "camelCase")]
    TabUpdated {
        tab_id: TabId,
        #[serde(default)]
        change_info: ChangeInfo,
        tab: TabSnapshot,
    },
    StorageChanged {
        #[serde(default)]
        changes: Map<String, Value>,
    },
}

/// A tab navigation, flattened from [`HostEvent::TabUpdated`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationEvent {
    pub tab: TabId,
    pub window: WindowId,
    pub url: String,
    pub status: LoadStatus,
}

impl NavigationEvent {
    pub fn new(tab: TabId, window: WindowId, url: impl Into<String>, status: LoadStatus) -> Self {
        Self {
            tab,
            window,
            url: url.into(),
            status,
        }
    }
}

impl HostEvent {
    /// Returns `None` for other events and for updates that carry no URL.
    pub fn navigation(&self) -> Option<NavigationEvent> {
        match self {
            HostEvent::TabUpdated {
                tab_id,
                change_info,
                tab,
            } => Some(NavigationEvent {
                tab: *tab_id,
                window: tab.window_id,
                url: tab.url.clone()?,
                status: change_info.status.unwrap_or(LoadStatus::Other),
            }),
            _ => None,
        }
    }
}
