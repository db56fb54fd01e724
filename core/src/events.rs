//! In-process publish/subscribe bus
//!
//! Connects the host (GUI or CLI) to the extraction core. Every event is a
//! typed variant of [`Event`]; subscribers register against a [`Topic`] and
//! are invoked synchronously, in subscription order, on the publishing thread.

use crate::config::ConfigChange;
use crate::extractors::ExtractorKind;
use log::{debug, error};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Named event categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Topic {
    #[serde(rename = "app:init")]
    AppInit,
    #[serde(rename = "app:exit")]
    AppExit,
    #[serde(rename = "extraction:started")]
    ExtractionStarted,
    #[serde(rename = "extraction:progress")]
    ExtractionProgress,
    #[serde(rename = "extraction:completed")]
    ExtractionCompleted,
    #[serde(rename = "extraction:error")]
    ExtractionError,
    #[serde(rename = "config:changed")]
    ConfigChanged,
    #[serde(rename = "file:saved")]
    FileSaved,
    #[serde(rename = "file:loaded")]
    FileLoaded,
}

impl Topic {
    pub const ALL: [Topic; 9] = [
        Topic::AppInit,
        Topic::AppExit,
        Topic::ExtractionStarted,
        Topic::ExtractionProgress,
        Topic::ExtractionCompleted,
        Topic::ExtractionError,
        Topic::ConfigChanged,
        Topic::FileSaved,
        Topic::FileLoaded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AppInit => "app:init",
            Self::AppExit => "app:exit",
            Self::ExtractionStarted => "extraction:started",
            Self::ExtractionProgress => "extraction:progress",
            Self::ExtractionCompleted => "extraction:completed",
            Self::ExtractionError => "extraction:error",
            Self::ConfigChanged => "config:changed",
            Self::FileSaved => "file:saved",
            Self::FileLoaded => "file:loaded",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event payloads, one variant per topic.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic", rename_all_fields = "camelCase")]
pub enum Event {
    #[serde(rename = "app:init")]
    AppInit,
    #[serde(rename = "app:exit")]
    AppExit { exit_code: i32 },
    #[serde(rename = "extraction:started")]
    ExtractionStarted {
        game_directory: PathBuf,
        extractors: Vec<ExtractorKind>,
    },
    #[serde(rename = "extraction:progress")]
    ExtractionProgress {
        /// Files processed so far, including the current one
        current: usize,
        total: usize,
        /// Entries accepted so far
        entries: usize,
        /// Files that could not be read so far
        failed: usize,
        file: Option<PathBuf>,
    },
    #[serde(rename = "extraction:completed")]
    ExtractionCompleted {
        success: bool,
        count: usize,
        message: String,
    },
    #[serde(rename = "extraction:error")]
    ExtractionError { success: bool, message: String },
    #[serde(rename = "config:changed")]
    ConfigChanged(ConfigChange),
    #[serde(rename = "file:saved")]
    FileSaved { path: PathBuf, entry_count: usize },
    #[serde(rename = "file:loaded")]
    FileLoaded { path: PathBuf, content_length: usize },
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Self::AppInit => Topic::AppInit,
            Self::AppExit { .. } => Topic::AppExit,
            Self::ExtractionStarted { .. } => Topic::ExtractionStarted,
            Self::ExtractionProgress { .. } => Topic::ExtractionProgress,
            Self::ExtractionCompleted { .. } => Topic::ExtractionCompleted,
            Self::ExtractionError { .. } => Topic::ExtractionError,
            Self::ConfigChanged(_) => Topic::ConfigChanged,
            Self::FileSaved { .. } => Topic::FileSaved,
            Self::FileLoaded { .. } => Topic::FileLoaded,
        }
    }
}

/// Subscriber callback. Identity is the `Arc` allocation, so keep a clone of
/// the handle to unsubscribe later.
pub type Subscriber = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

/// Wrap a closure as a [`Subscriber`].
pub fn subscriber<F>(callback: F) -> Subscriber
where
    F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(callback)
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<HashMap<Topic, Vec<Subscriber>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `callback` to `topic` unless the same handle is already registered.
    pub fn subscribe(&self, topic: Topic, callback: Subscriber) {
        let mut subscribers = self.lock();
        let list = subscribers.entry(topic).or_default();
        if !list.iter().any(|existing| Arc::ptr_eq(existing, &callback)) {
            list.push(callback);
            debug!("subscribed to '{topic}' ({} subscribers)", list.len());
        }
    }

    /// Remove `callback` from `topic`; unknown handles are ignored.
    pub fn unsubscribe(&self, topic: Topic, callback: &Subscriber) {
        let mut subscribers = self.lock();
        if let Some(list) = subscribers.get_mut(&topic) {
            let before = list.len();
            list.retain(|existing| !Arc::ptr_eq(existing, callback));
            if list.len() != before {
                debug!("unsubscribed from '{topic}'");
            }
            if list.is_empty() {
                subscribers.remove(&topic);
            }
        }
    }

    /// Deliver `event` to every subscriber of its topic.
    ///
    /// Subscriber failures, including panics, are logged and do not stop
    /// delivery to the remaining subscribers. The subscriber list is
    /// snapshotted first, so callbacks may use the bus themselves.
    pub fn publish(&self, event: Event) {
        let topic = event.topic();
        let callbacks: Vec<Subscriber> = match self.lock().get(&topic) {
            Some(list) => list.clone(),
            None => return,
        };

        for (index, callback) in callbacks.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(&event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!("subscriber #{index} of '{topic}' failed: {err:#}");
                }
                Err(payload) => {
                    error!(
                        "subscriber #{index} of '{topic}' panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.lock().get(&topic).map_or(0, Vec::len)
    }

    pub fn clear_topic(&self, topic: Topic) {
        if self.lock().remove(&topic).is_some() {
            debug!("cleared subscribers of '{topic}'");
        }
    }

    pub fn clear_all(&self) {
        self.lock().clear();
        debug!("cleared all subscribers");
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Topic, Vec<Subscriber>>> {
        // Callbacks never run under this lock, so a poisoned map is still consistent.
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self.lock();
        let mut map = f.debug_map();
        for topic in Topic::ALL {
            if let Some(list) = subscribers.get(&topic) {
                map.entry(&topic.as_str(), &list.len());
            }
        }
        map.finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Process-wide bus shared by the host and the extraction core
static EVENT_BUS: Lazy<Arc<EventBus>> = Lazy::new(|| Arc::new(EventBus::new()));

/// Get the process-wide event bus
pub fn event_bus() -> Arc<EventBus> {
    Arc::clone(&EVENT_BUS)
}

pub fn publish(event: Event) {
    EVENT_BUS.publish(event);
}

pub fn subscribe(topic: Topic, callback: Subscriber) {
    EVENT_BUS.subscribe(topic, callback);
}

pub fn unsubscribe(topic: Topic, callback: &Subscriber) {
    EVENT_BUS.unsubscribe(topic, callback);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> Subscriber {
        let log = Arc::clone(log);
        subscriber(move |_event| {
            log.lock().unwrap().push(name.to_string());
            Ok(())
        })
    }

    #[test]
    fn publish_without_subscribers_is_noop() {
        let bus = EventBus::new();
        for topic in Topic::ALL {
            assert_eq!(bus.subscriber_count(topic), 0);
        }
        bus.publish(Event::AppInit);
        bus.publish(Event::AppExit { exit_code: 0 });
        assert_eq!(bus.subscriber_count(Topic::AppInit), 0);
    }

    #[test]
    fn invokes_subscribers_once_in_order() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder(&log, "first");
        let second = recorder(&log, "second");
        let third = recorder(&log, "third");

        bus.subscribe(Topic::AppInit, first.clone());
        bus.subscribe(Topic::AppInit, second.clone());
        bus.subscribe(Topic::AppInit, third.clone());
        // Same handle again is ignored.
        bus.subscribe(Topic::AppInit, first.clone());

        bus.publish(Event::AppInit);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn unsubscribe_removes_only_that_handle() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder(&log, "first");
        let second = recorder(&log, "second");

        bus.subscribe(Topic::FileSaved, first.clone());
        bus.subscribe(Topic::FileSaved, second.clone());
        bus.unsubscribe(Topic::FileSaved, &first);
        // Unknown handle and unknown topic are both no-ops.
        bus.unsubscribe(Topic::FileSaved, &first);
        bus.unsubscribe(Topic::AppExit, &second);

        bus.publish(Event::FileSaved {
            path: PathBuf::from("out.rpy"),
            entry_count: 1,
        });
        assert_eq!(*log.lock().unwrap(), vec!["second"]);

        bus.unsubscribe(Topic::FileSaved, &second);
        assert_eq!(bus.subscriber_count(Topic::FileSaved), 0);
    }

    #[test]
    fn resubscribing_moves_handle_to_the_end() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let first = recorder(&log, "first");
        let second = recorder(&log, "second");

        bus.subscribe(Topic::AppInit, first.clone());
        bus.subscribe(Topic::AppInit, second.clone());
        bus.unsubscribe(Topic::AppInit, &first);
        bus.subscribe(Topic::AppInit, first.clone());

        bus.publish(Event::AppInit);
        assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
    }

    #[test]
    fn failing_subscriber_does_not_block_later_ones() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        bus.subscribe(
            Topic::ExtractionError,
            subscriber(|_| Err(anyhow::anyhow!("display went away"))),
        );
        bus.subscribe(
            Topic::ExtractionError,
            subscriber(|_| panic!("subscriber bug")),
        );
        bus.subscribe(Topic::ExtractionError, recorder(&log, "survivor"));

        bus.publish(Event::ExtractionError {
            success: false,
            message: "boom".into(),
        });
        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
    }

    #[test]
    fn subscribers_only_see_their_topic() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Topic::AppExit, recorder(&log, "exit"));

        bus.publish(Event::AppInit);
        assert!(log.lock().unwrap().is_empty());

        bus.publish(Event::AppExit { exit_code: 3 });
        assert_eq!(*log.lock().unwrap(), vec!["exit"]);
    }

    #[test]
    fn callbacks_can_reenter_the_bus() {
        let bus = Arc::new(EventBus::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        let late = recorder(&log, "late");

        let bus_handle = Arc::clone(&bus);
        let late_handle = late.clone();
        bus.subscribe(
            Topic::AppInit,
            subscriber(move |_| {
                bus_handle.subscribe(Topic::AppInit, late_handle.clone());
                bus_handle.publish(Event::AppExit { exit_code: 0 });
                Ok(())
            }),
        );

        bus.publish(Event::AppInit);
        // The snapshot taken before dispatch does not include the new handle.
        assert!(log.lock().unwrap().is_empty());

        bus.publish(Event::AppInit);
        assert_eq!(*log.lock().unwrap(), vec!["late"]);
    }

    #[test]
    fn clear_topic_and_clear_all() {
        let bus = EventBus::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(Topic::AppInit, recorder(&log, "a"));
        bus.subscribe(Topic::AppExit, recorder(&log, "b"));

        bus.clear_topic(Topic::AppInit);
        assert_eq!(bus.subscriber_count(Topic::AppInit), 0);
        assert_eq!(bus.subscriber_count(Topic::AppExit), 1);

        bus.clear_all();
        assert_eq!(bus.subscriber_count(Topic::AppExit), 0);
    }

    #[test]
    fn event_topics_match_wire_names() {
        let event = Event::ExtractionCompleted {
            success: true,
            count: 2,
            message: "done".into(),
        };
        assert_eq!(event.topic(), Topic::ExtractionCompleted);
        assert_eq!(event.topic().as_str(), "extraction:completed");

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["topic"], "extraction:completed");
        assert_eq!(json["count"], 2);
        assert_eq!(json["success"], true);

        let json = serde_json::to_value(Event::FileLoaded {
            path: PathBuf::from("a.rpy"),
            content_length: 10,
        })
        .unwrap();
        assert_eq!(json["topic"], "file:loaded");
        assert_eq!(json["contentLength"], 10);

        let event = Event::ConfigChanged(ConfigChange::Language("japanese".into()));
        assert_eq!(event.topic(), Topic::ConfigChanged);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["topic"], "config:changed");
        assert_eq!(json["field"], "language");
        assert_eq!(json["value"], "japanese");
    }

    #[test]
    fn global_bus_is_shared() {
        let first = event_bus();
        let second = event_bus();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
