//! Per-navigation decision logic.
//!
//! Each event is classified from scratch: the designated window is rescanned
//! before any decision that depends on it, so the only state carried between
//! events is the [`Session`] hint and the single-slot [`IntentStore`].

use crate::config::{MeetingConfig, RedirectConfig};
use crate::error::CoreResult;
use crate::events::{LoadStatus, NavigationEvent};
use crate::host::{SharedHost, WindowId};
use crate::intent::{IntentSource, IntentStore, RedirectIntent};
use crate::meeting_url::MeetingUrl;
use crate::registry::{Session, WindowRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not a meeting URL; nothing was touched.
    Ignore,
    /// No designated window existed, so one was opened on the event's URL.
    CreateWindow {
        window: WindowId,
        source: IntentSource,
    },
    /// The tab was stopped and its destination handed to the designated window.
    StopAndRedirect(RedirectIntent),
    /// The destination was recorded but the tab keeps loading.
    RecordRedirect(RedirectIntent),
    Allow,
}

pub struct NavigationCoordinator {
    host: SharedHost,
    registry: WindowRegistry,
    meeting: MeetingConfig,
}

impl NavigationCoordinator {
    pub fn new(host: SharedHost, config: RedirectConfig) -> Self {
        Self {
            registry: WindowRegistry::new(host.clone(), config.clone()),
            meeting: config.meeting,
            host,
        }
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    /// Any new tab invalidates a stale intent.
    pub fn on_tab_created(&self, intents: &mut IntentStore) {
        intents.reset();
    }

    pub async fn on_tab_updated(
        &self,
        session: &mut Session,
        intents: &mut IntentStore,
        event: &NavigationEvent,
    ) -> CoreResult<Decision> {
        let Some(url) = MeetingUrl::classify(&event.url, &self.meeting) else {
            return Ok(Decision::Ignore);
        };

        if url.is_new_meeting() {
            self.on_new_meeting(session, intents, event, &url).await
        } else if event.status == LoadStatus::Complete {
            self.on_meeting_loaded(session, intents, event, &url).await
        } else {
            Ok(Decision::Allow)
        }
    }

    async fn on_new_meeting(
        &self,
        session: &mut Session,
        intents: &mut IntentStore,
        event: &NavigationEvent,
        url: &MeetingUrl,
    ) -> CoreResult<Decision> {
        let Some(designated) = self.registry.refresh(session).await? else {
            let window = self
                .registry
                .create_designated_window(session, url.as_str())
                .await?;
            // The originating tab still runs its own "/new" page; record it so
            // the reactor closes it once the new window reports the meeting.
            intents.populate(&RedirectIntent {
                originating_tab: event.tab,
                fragment: url.fragment().to_string(),
                source: IntentSource::NewMeeting,
            });
            return Ok(Decision::CreateWindow {
                window,
                source: IntentSource::NewMeeting,
            });
        };

        if event.window == designated {
            return Ok(Decision::Allow);
        }

        if let Err(error) = self.host.stop_tab_load(event.tab).await {
            tracing::warn!("failed to stop tab {} before redirect: {error}", event.tab);
        }
        let intent = RedirectIntent {
            originating_tab: event.tab,
            fragment: url.fragment().to_string(),
            source: IntentSource::NewMeeting,
        };
        intents.populate(&intent);
        tracing::info!(
            "redirecting new meeting from tab {} to window {designated}",
            event.tab
        );
        Ok(Decision::StopAndRedirect(intent))
    }

    async fn on_meeting_loaded(
        &self,
        session: &mut Session,
        intents: &mut IntentStore,
        event: &NavigationEvent,
        url: &MeetingUrl,
    ) -> CoreResult<Decision> {
        let Some(designated) = self.registry.refresh(session).await? else {
            let window = self
                .registry
                .create_designated_window(session, url.as_str())
                .await?;
            return Ok(Decision::CreateWindow {
                window,
                source: IntentSource::None,
            });
        };

        if event.window == designated || url.is_passthrough(&self.meeting) {
            return Ok(Decision::Allow);
        }

        // The tab is left to finish loading; the reactor closes it later.
        let intent = RedirectIntent {
            originating_tab: event.tab,
            fragment: url.fragment().to_string(),
            source: IntentSource::None,
        };
        intents.populate(&intent);
        tracing::info!(
            "recorded redirect of {} from tab {} to window {designated}",
            intent.fragment,
            event.tab
        );
        Ok(Decision::RecordRedirect(intent))
    }
}
