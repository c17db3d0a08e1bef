//! The single-slot redirect record shared between the coordinator and the
//! cleanup reactor.
//!
//! Persisted as three keys so the stored shape stays
//! `{ originatingTabId: TabId | "", queryParams: string, source: "NEW_MEETING" | "" }`.

use serde_json::{json, Value};

use crate::host::TabId;
use crate::storage::KvStore;

pub const KEY_ORIGINATING_TAB: &str = "originatingTabId";
pub const KEY_QUERY_PARAMS: &str = "queryParams";
pub const KEY_SOURCE: &str = "source";

const SOURCE_NEW_MEETING: &str = "NEW_MEETING";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IntentSource {
    #[default]
    None,
    NewMeeting,
}

impl IntentSource {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentSource::None => "",
            IntentSource::NewMeeting => SOURCE_NEW_MEETING,
        }
    }

    fn parse(value: Option<&Value>) -> Self {
        match value.and_then(Value::as_str) {
            Some(SOURCE_NEW_MEETING) => IntentSource::NewMeeting,
            _ => IntentSource::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectIntent {
    pub originating_tab: TabId,
    pub fragment: String,
    pub source: IntentSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentState {
    Empty,
    Pending(RedirectIntent),
}

impl IntentState {
    pub fn pending(&self) -> Option<&RedirectIntent> {
        match self {
            IntentState::Pending(intent) => Some(intent),
            IntentState::Empty => None,
        }
    }
}

pub struct IntentStore {
    kv: Box<dyn KvStore>,
    initial_marker: String,
    clear_on_consume: bool,
}

impl IntentStore {
    pub fn new(kv: Box<dyn KvStore>, initial_marker: impl Into<String>, clear_on_consume: bool) -> Self {
        Self {
            kv,
            initial_marker: initial_marker.into(),
            clear_on_consume,
        }
    }

    /// Writes the empty sentinel, invalidating any stale intent.
    pub fn reset(&mut self) {
        self.kv.set(KEY_ORIGINATING_TAB, json!(""));
        self.kv.set(KEY_QUERY_PARAMS, json!(self.initial_marker));
        self.kv.set(KEY_SOURCE, json!(""));
    }

    /// Replaces whatever is stored; at most one intent is pending.
    pub fn populate(&mut self, intent: &RedirectIntent) {
        self.kv.set(KEY_ORIGINATING_TAB, json!(intent.originating_tab.0));
        self.kv.set(KEY_QUERY_PARAMS, json!(intent.fragment));
        self.kv.set(KEY_SOURCE, json!(intent.source.as_str()));
    }

    pub fn load(&self) -> IntentState {
        let Some(tab) = self.kv.get(KEY_ORIGINATING_TAB).and_then(|v| v.as_i64()) else {
            return IntentState::Empty;
        };
        let fragment = self
            .kv
            .get(KEY_QUERY_PARAMS)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        if fragment == self.initial_marker {
            return IntentState::Empty;
        }
        IntentState::Pending(RedirectIntent {
            originating_tab: TabId(tab),
            fragment,
            source: IntentSource::parse(self.kv.get(KEY_SOURCE).as_ref()),
        })
    }

    /// Takes the pending intent. Clears the slot unless configured to keep
    /// the record until the next reset or overwrite.
    pub fn consume(&mut self) -> IntentState {
        let state = self.load();
        if self.clear_on_consume && state != IntentState::Empty {
            self.reset();
        }
        state
    }

    /// The raw persisted record, for status reporting.
    pub fn record(&self) -> Value {
        let record = [KEY_ORIGINATING_TAB, KEY_QUERY_PARAMS, KEY_SOURCE]
            .into_iter()
            .map(|key| (key.to_string(), self.kv.get(key).unwrap_or_else(|| json!(""))))
            .collect();
        Value::Object(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;

    fn store(clear_on_consume: bool) -> IntentStore {
        IntentStore::new(Box::new(MemoryKvStore::new()), "__gmInitialState", clear_on_consume)
    }

    fn intent(tab: i64, fragment: &str, source: IntentSource) -> RedirectIntent {
        RedirectIntent {
            originating_tab: TabId(tab),
            fragment: fragment.to_string(),
            source,
        }
    }

    #[test]
    fn fresh_store_is_empty() {
        assert_eq!(store(true).load(), IntentState::Empty);
    }

    #[test]
    fn reset_writes_sentinel() {
        let mut store = store(true);
        store.populate(&intent(5, "abc-defg", IntentSource::NewMeeting));
        store.reset();
        assert_eq!(store.load(), IntentState::Empty);
        assert_eq!(
            store.record(),
            json!({ "originatingTabId": "", "queryParams": "__gmInitialState", "source": "" })
        );
    }

    #[test]
    fn populate_overwrites_previous_intent() {
        let mut store = store(true);
        store.populate(&intent(5, "abc-defg", IntentSource::None));
        store.populate(&intent(9, "new", IntentSource::NewMeeting));
        assert_eq!(
            store.load(),
            IntentState::Pending(intent(9, "new", IntentSource::NewMeeting))
        );
        assert_eq!(
            store.record(),
            json!({ "originatingTabId": 9, "queryParams": "new", "source": "NEW_MEETING" })
        );
    }

    #[test]
    fn consume_clears_when_configured() {
        let mut store = store(true);
        store.populate(&intent(5, "abc-defg", IntentSource::None));
        assert!(store.consume().pending().is_some());
        assert_eq!(store.consume(), IntentState::Empty);
    }

    #[test]
    fn consume_keeps_record_when_not_clearing() {
        let mut store = store(false);
        store.populate(&intent(5, "abc-defg", IntentSource::None));
        assert!(store.consume().pending().is_some());
        assert!(store.consume().pending().is_some());
    }

    #[test]
    fn empty_fragment_is_still_pending() {
        let mut store = store(true);
        store.populate(&intent(5, "", IntentSource::None));
        let state = store.load();
        assert_eq!(state.pending().map(|i| i.fragment.as_str()), Some(""));
    }

    #[test]
    fn unknown_source_decodes_as_none() {
        let mut kv = MemoryKvStore::new();
        kv.set(KEY_ORIGINATING_TAB, json!(3));
        kv.set(KEY_QUERY_PARAMS, json!("abc"));
        kv.set(KEY_SOURCE, json!("SOMETHING_ELSE"));
        let store = IntentStore::new(Box::new(kv), "__gmInitialState", true);
        assert_eq!(
            store.load(),
            IntentState::Pending(intent(3, "abc", IntentSource::None))
        );
    }
}
