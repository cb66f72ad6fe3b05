//! Shared operation types: preconditions, metadata, lists, predicates.

use crate::error::{StoreError, StoreResult};
use std::sync::Arc;
use verso_codec::Object;

/// Identity checks gating a delete or update.
///
/// All set fields must match the live object for the mutation to proceed;
/// a mismatch is a hard failure, never retried.
#[derive(Debug, Clone, Default)]
pub struct Preconditions {
    /// Required owner UID, if any.
    pub uid: Option<String>,
}

impl Preconditions {
    /// Creates empty preconditions (everything passes).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the live object's UID to equal `uid`.
    #[must_use]
    pub fn with_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: Some(uid.into()),
        }
    }

    /// Checks the preconditions against the live object.
    pub fn check<O: Object>(&self, key: &str, obj: &O) -> StoreResult<()> {
        if let Some(expected) = &self.uid {
            if obj.uid() != Some(expected.as_str()) {
                return Err(StoreError::precondition_failed(
                    key,
                    format!(
                        "uid in precondition: {expected}, uid in object: {:?}",
                        obj.uid()
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Read metadata handed to `try_update` callbacks alongside the object.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseMeta {
    /// Revision of the state the callback is mutating (0 if the key was
    /// absent and absence is tolerated).
    pub resource_version: i64,
}

/// A decoded listing with its version cursor.
#[derive(Debug, Clone)]
pub struct ObjectList<O> {
    /// Matching objects, in the order the scan returned them.
    pub items: Vec<O>,
    /// Read revision for single-key listings; `None` for full prefix scans,
    /// where per-item revisions differ and no single cursor applies.
    pub revision: Option<i64>,
}

impl<O> Default for ObjectList<O> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            revision: None,
        }
    }
}

/// Object-level filter applied by list and watch operations.
pub struct SelectionPredicate<O> {
    matches: Arc<dyn Fn(&O) -> bool + Send + Sync>,
}

impl<O> SelectionPredicate<O> {
    /// Creates a predicate from a match function.
    pub fn new(matches: impl Fn(&O) -> bool + Send + Sync + 'static) -> Self {
        Self {
            matches: Arc::new(matches),
        }
    }

    /// A predicate that matches every object.
    #[must_use]
    pub fn everything() -> Self {
        Self::new(|_| true)
    }

    /// Returns true if the object passes the filter.
    pub fn matches(&self, obj: &O) -> bool {
        (self.matches)(obj)
    }
}

impl<O> Clone for SelectionPredicate<O> {
    fn clone(&self) -> Self {
        Self {
            matches: Arc::clone(&self.matches),
        }
    }
}

impl<O> std::fmt::Debug for SelectionPredicate<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionPredicate").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Owned {
        uid: String,
        version: i64,
    }

    impl Object for Owned {
        fn resource_version(&self) -> i64 {
            self.version
        }

        fn set_resource_version(&mut self, revision: i64) {
            self.version = revision;
        }

        fn uid(&self) -> Option<&str> {
            Some(&self.uid)
        }
    }

    #[test]
    fn empty_preconditions_pass() {
        let obj = Owned::default();
        assert!(Preconditions::new().check("/a", &obj).is_ok());
    }

    #[test]
    fn uid_mismatch_fails() {
        let obj = Owned {
            uid: "u-1".into(),
            version: 0,
        };

        assert!(Preconditions::with_uid("u-1").check("/a", &obj).is_ok());

        let err = Preconditions::with_uid("u-2").check("/a", &obj).unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed { .. }));
    }

    #[test]
    fn predicate_filters() {
        let even = SelectionPredicate::<Owned>::new(|o| o.version % 2 == 0);
        let odd_obj = Owned {
            uid: String::new(),
            version: 3,
        };
        assert!(!even.matches(&odd_obj));
        assert!(SelectionPredicate::<Owned>::everything().matches(&odd_obj));
    }
}
