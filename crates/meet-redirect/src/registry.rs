use crate::config::RedirectConfig;
use crate::error::CoreResult;
use crate::host::{SharedHost, WindowId};
use crate::meeting_url::is_meeting_origin;

/// Per-process session state threaded through the coordinator and reactor.
///
/// The cached window is a hint only: every navigation decision rescans the
/// browser and overwrites it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    designated: Option<WindowId>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn designated(&self) -> Option<WindowId> {
        self.designated
    }

    pub(crate) fn set_designated(&mut self, window: Option<WindowId>) {
        if self.designated != window {
            tracing::debug!("designated window {:?} -> {:?}", self.designated, window);
        }
        self.designated = window;
    }
}

/// Locates, and creates when missing, the app-style window that hosts
/// meetings.
pub struct WindowRegistry {
    host: SharedHost,
    config: RedirectConfig,
}

impl WindowRegistry {
    pub fn new(host: SharedHost, config: RedirectConfig) -> Self {
        Self { host, config }
    }

    /// Returns the first app-like window whose first tab is on the meeting
    /// origin.
    pub async fn find_designated_window(&self) -> CoreResult<Option<WindowId>> {
        let windows = self
            .host
            .query_windows(&self.config.windows.designated_kinds)
            .await?;
        Ok(windows
            .iter()
            .filter(|window| self.config.windows.designated_kinds.contains(&window.kind))
            .find(|window| {
                window
                    .first_tab_url()
                    .is_some_and(|url| is_meeting_origin(url, &self.config.meeting))
            })
            .map(|window| window.id))
    }

    /// Rescans and stores the result in `session`.
    pub async fn refresh(&self, session: &mut Session) -> CoreResult<Option<WindowId>> {
        let found = self.find_designated_window().await?;
        session.set_designated(found);
        Ok(found)
    }

    pub async fn create_designated_window(
        &self,
        session: &mut Session,
        url: &str,
    ) -> CoreResult<WindowId> {
        let window = self
            .host
            .create_window(url, self.config.windows.create_kind)
            .await?;
        tracing::info!("created designated window {window} for {url}");
        session.set_designated(Some(window));
        Ok(window)
    }
}
