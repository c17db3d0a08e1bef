//! Routes browser navigation for a video-meeting web app into a single,
//! dedicated app-style window.
//!
//! The [`NavigationCoordinator`] decides, per tab navigation, whether to
//! ignore it, open the designated window, or hand the destination off to the
//! existing one. The [`FocusCleanupReactor`] finishes the hand-off once the
//! page side reports the meeting has opened. [`RedirectService`] runs both
//! against a [`Host`] on a single task.

pub mod browser;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod host;
pub mod intent;
pub mod meeting_url;
pub mod reactor;
pub mod registry;
pub mod server;
pub mod service;
pub mod storage;

pub use crate::config::{load_or_create_config, RedirectConfig};
pub use crate::coordinator::{Decision, NavigationCoordinator};
pub use crate::error::{CoreError, CoreResult};
pub use crate::events::{HostEvent, LoadStatus, NavigationEvent};
pub use crate::host::{Host, SharedHost, TabId, WindowId, WindowInfo, WindowKind};
pub use crate::intent::{IntentSource, IntentState, IntentStore, RedirectIntent};
pub use crate::reactor::FocusCleanupReactor;
pub use crate::registry::{Session, WindowRegistry};
pub use crate::server::Server;
pub use crate::service::{RedirectHandle, RedirectService};
