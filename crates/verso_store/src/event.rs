//! Normalized change records.
//!
//! Raw store notifications and initial-listing items are folded into one
//! [`Event`] shape so that "list then watch" reads as a single logical
//! sequence. The constructors here are the only producers; the watch layer
//! is the only consumer.

use verso_client::{ChangeNotification, KeyValue};

/// A normalized change record for one key.
///
/// At most one of `created` and `deleted` is true; a plain update sets
/// neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// The key that changed.
    pub key: String,
    /// The stored bytes after the change (empty for deletions).
    pub value: Vec<u8>,
    /// The stored bytes before the change, when known.
    pub prev_value: Option<Vec<u8>>,
    /// Revision of the change.
    pub revision: i64,
    /// True if the change removed the key.
    pub deleted: bool,
    /// True if the change brought the key into existence.
    pub created: bool,
}

impl Event {
    /// Normalizes an initial-listing item into a synthetic creation event.
    #[must_use]
    pub fn from_listing(kv: KeyValue) -> Self {
        Self {
            key: kv.key,
            value: kv.value,
            prev_value: None,
            revision: kv.revision,
            deleted: false,
            created: true,
        }
    }

    /// Normalizes a live change notification.
    ///
    /// The previous value is copied only if the transport provided one.
    #[must_use]
    pub fn from_notification(notification: ChangeNotification) -> Self {
        Self {
            key: notification.key,
            value: notification.value,
            prev_value: notification.prev_value,
            revision: notification.revision,
            deleted: notification.deleted,
            created: notification.created,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_items_become_creations() {
        let event = Event::from_listing(KeyValue {
            key: "/a".into(),
            value: b"one".to_vec(),
            revision: 5,
        });

        assert!(event.created);
        assert!(!event.deleted);
        assert_eq!(event.prev_value, None);
        assert_eq!(event.revision, 5);
    }

    #[test]
    fn notifications_map_through() {
        let event = Event::from_notification(ChangeNotification {
            key: "/a".into(),
            value: b"two".to_vec(),
            prev_value: Some(b"one".to_vec()),
            revision: 6,
            created: false,
            deleted: false,
        });

        assert!(!event.created && !event.deleted);
        assert_eq!(event.prev_value.as_deref(), Some(b"one".as_slice()));
    }

    #[test]
    fn deletion_keeps_previous_value_only() {
        let event = Event::from_notification(ChangeNotification {
            key: "/a".into(),
            value: Vec::new(),
            prev_value: Some(b"one".to_vec()),
            revision: 7,
            created: false,
            deleted: true,
        });

        assert!(event.deleted);
        assert!(!event.created);
    }

    #[test]
    fn created_and_deleted_are_never_both_set() {
        // Both constructors preserve the invariant for every input shape
        // the transports can produce.
        let sources = [
            (true, false),
            (false, true),
            (false, false),
        ];
        for (created, deleted) in sources {
            let event = Event::from_notification(ChangeNotification {
                key: "/a".into(),
                value: Vec::new(),
                prev_value: None,
                revision: 1,
                created,
                deleted,
            });
            assert!(!(event.created && event.deleted));
        }

        let listed = Event::from_listing(KeyValue {
            key: "/a".into(),
            value: Vec::new(),
            revision: 1,
        });
        assert!(!(listed.created && listed.deleted));
    }
}
