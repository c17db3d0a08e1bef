use std::time::Duration;

use serde_json::{Map, Value};
use tokio::task::JoinHandle;

use crate::config::RedirectConfig;
use crate::host::{SharedHost, TabId};
use crate::intent::{IntentSource, IntentState, IntentStore};
use crate::registry::Session;

/// Reacts to the page-side "meeting opened" signal: focuses the designated
/// window and closes the tab the meeting was redirected away from.
pub struct FocusCleanupReactor {
    host: SharedHost,
    opened_key: String,
    delay: Duration,
}

impl FocusCleanupReactor {
    pub fn new(host: SharedHost, config: &RedirectConfig) -> Self {
        Self {
            host,
            opened_key: config.signal.opened_key.clone(),
            delay: config.cleanup.delay(),
        }
    }

    /// Only the presence of the signal key matters, never its value.
    pub fn is_opened_signal(&self, changes: &Map<String, Value>) -> bool {
        changes.contains_key(&self.opened_key)
    }

    /// New meetings close their origin immediately; regular redirects give
    /// the focused window time to render first.
    pub fn cleanup_delay(&self, source: IntentSource) -> Duration {
        match source {
            IntentSource::NewMeeting => Duration::ZERO,
            IntentSource::None => self.delay,
        }
    }

    pub async fn on_storage_changed(
        &self,
        session: &Session,
        intents: &mut IntentStore,
        changes: &Map<String, Value>,
    ) -> Option<JoinHandle<()>> {
        if !self.is_opened_signal(changes) {
            return None;
        }
        self.on_meeting_opened(session, intents).await
    }

    /// Returns the scheduled cleanup task, if a tab is due to be closed.
    pub async fn on_meeting_opened(
        &self,
        session: &Session,
        intents: &mut IntentStore,
    ) -> Option<JoinHandle<()>> {
        match session.designated() {
            Some(window) => {
                if let Err(error) = self.host.focus_window(window).await {
                    tracing::warn!("failed to focus designated window {window}: {error}");
                }
            }
            None => tracing::debug!("meeting opened with no designated window cached"),
        }

        let IntentState::Pending(intent) = intents.consume() else {
            tracing::debug!("meeting opened with no pending redirect");
            return None;
        };
        if intent.fragment.is_empty() {
            tracing::debug!("pending redirect from tab {} has no destination", intent.originating_tab);
            return None;
        }

        let delay = self.cleanup_delay(intent.source);
        Some(self.schedule_close(intent.originating_tab, delay))
    }

    fn schedule_close(&self, tab: TabId, delay: Duration) -> JoinHandle<()> {
        let host = self.host.clone();
        tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            match host.close_tab(tab).await {
                Ok(()) => tracing::info!("closed originating tab {tab}"),
                Err(error) => tracing::debug!("originating tab {tab} not closed: {error}"),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::host::fake::{FakeHost, HostCall};
    use crate::host::{WindowId, WindowKind};
    use crate::intent::RedirectIntent;
    use crate::storage::MemoryKvStore;

    fn setup(host: FakeHost, clear_on_consume: bool) -> (Arc<FakeHost>, FocusCleanupReactor, IntentStore) {
        let host = Arc::new(host);
        let config = RedirectConfig::default();
        let reactor = FocusCleanupReactor::new(host.clone(), &config);
        let intents = IntentStore::new(
            Box::new(MemoryKvStore::new()),
            config.meeting.initial_state_marker,
            clear_on_consume,
        );
        (host, reactor, intents)
    }

    fn browser() -> FakeHost {
        FakeHost::new()
            .with_window(1, WindowKind::Normal, &["https://meet.google.com/abc-defg"])
            .with_window(2, WindowKind::Popup, &["https://meet.google.com/abc-defg"])
    }

    fn designated(window: i64) -> Session {
        let mut session = Session::new();
        session.set_designated(Some(WindowId(window)));
        session
    }

    fn opened() -> Map<String, Value> {
        let mut changes = Map::new();
        changes.insert("googleMeetOpenedUrl".to_string(), json!({ "newValue": "x" }));
        changes
    }

    #[test]
    fn delay_depends_on_source() {
        let (_, reactor, _) = setup(FakeHost::new(), true);
        assert_eq!(reactor.cleanup_delay(IntentSource::NewMeeting), Duration::ZERO);
        assert_eq!(reactor.cleanup_delay(IntentSource::None), Duration::from_millis(3_000));
    }

    #[tokio::test]
    async fn unrelated_storage_changes_are_ignored() {
        let (host, reactor, mut intents) = setup(browser(), true);
        let mut changes = Map::new();
        changes.insert("queryParams".to_string(), json!({ "newValue": "abc" }));
        let task = reactor
            .on_storage_changed(&designated(2), &mut intents, &changes)
            .await;
        assert!(task.is_none());
        assert!(host.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn new_meeting_closes_origin_immediately() {
        let (host, reactor, mut intents) = setup(browser(), true);
        intents.populate(&RedirectIntent {
            originating_tab: TabId(10),
            fragment: "new".to_string(),
            source: IntentSource::NewMeeting,
        });

        let task = reactor
            .on_storage_changed(&designated(2), &mut intents, &opened())
            .await
            .expect("cleanup scheduled");
        task.await.expect("join");

        assert_eq!(
            host.calls(),
            vec![HostCall::FocusWindow(WindowId(2)), HostCall::CloseTab(TabId(10))]
        );
        assert_eq!(intents.load(), IntentState::Empty);
    }

    #[tokio::test(start_paused = true)]
    async fn regular_redirect_waits_before_closing() {
        let (host, reactor, mut intents) = setup(browser(), true);
        intents.populate(&RedirectIntent {
            originating_tab: TabId(10),
            fragment: "abc-defg".to_string(),
            source: IntentSource::None,
        });

        let task = reactor
            .on_meeting_opened(&designated(2), &mut intents)
            .await
            .expect("cleanup scheduled");

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert_eq!(host.calls(), vec![HostCall::FocusWindow(WindowId(2))]);

        task.await.expect("join");
        assert_eq!(
            host.calls(),
            vec![HostCall::FocusWindow(WindowId(2)), HostCall::CloseTab(TabId(10))]
        );
    }

    #[tokio::test]
    async fn empty_fragment_does_not_close() {
        let (host, reactor, mut intents) = setup(browser(), true);
        intents.populate(&RedirectIntent {
            originating_tab: TabId(10),
            fragment: String::new(),
            source: IntentSource::NewMeeting,
        });
        let task = reactor.on_meeting_opened(&designated(2), &mut intents).await;
        assert!(task.is_none());
        assert_eq!(host.calls(), vec![HostCall::FocusWindow(WindowId(2))]);
    }

    #[tokio::test]
    async fn sentinel_record_does_not_close() {
        let (host, reactor, mut intents) = setup(browser(), true);
        intents.reset();
        let task = reactor.on_meeting_opened(&designated(2), &mut intents).await;
        assert!(task.is_none());
        assert_eq!(host.effects(), vec![HostCall::FocusWindow(WindowId(2))]);
    }

    #[tokio::test]
    async fn stale_window_and_missing_tab_are_silent() {
        let (host, reactor, mut intents) = setup(FakeHost::new(), true);
        intents.populate(&RedirectIntent {
            originating_tab: TabId(99),
            fragment: "new".to_string(),
            source: IntentSource::NewMeeting,
        });
        let task = reactor
            .on_meeting_opened(&designated(42), &mut intents)
            .await
            .expect("cleanup scheduled");
        task.await.expect("join");
        assert_eq!(
            host.calls(),
            vec![HostCall::FocusWindow(WindowId(42)), HostCall::CloseTab(TabId(99))]
        );
    }

    #[tokio::test]
    async fn second_signal_does_not_reuse_consumed_intent() {
        let (host, reactor, mut intents) = setup(browser(), true);
        intents.populate(&RedirectIntent {
            originating_tab: TabId(10),
            fragment: "new".to_string(),
            source: IntentSource::NewMeeting,
        });
        let session = designated(2);
        let first = reactor.on_meeting_opened(&session, &mut intents).await;
        first.expect("first cleanup").await.expect("join");
        let second = reactor.on_meeting_opened(&session, &mut intents).await;
        assert!(second.is_none());
        let closes = host
            .calls()
            .into_iter()
            .filter(|call| matches!(call, HostCall::CloseTab(_)))
            .count();
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn keeping_record_allows_repeat_cleanup() {
        let (_, reactor, mut intents) = setup(browser(), false);
        intents.populate(&RedirectIntent {
            originating_tab: TabId(10),
            fragment: "new".to_string(),
            source: IntentSource::NewMeeting,
        });
        let session = designated(2);
        assert!(reactor.on_meeting_opened(&session, &mut intents).await.is_some());
        assert!(reactor.on_meeting_opened(&session, &mut intents).await.is_some());
    }

    #[tokio::test]
    async fn no_designated_window_skips_focus() {
        let (host, reactor, mut intents) = setup(browser(), true);
        let task = reactor.on_meeting_opened(&Session::new(), &mut intents).await;
        assert!(task.is_none());
        assert!(host.calls().is_empty());
    }
}
