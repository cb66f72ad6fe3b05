//! The versioned-object trait.

/// A domain object that can be stored by verso.
///
/// Every stored object carries an embedded resource version: the revision the
/// remote store assigned to the last mutation of its key. The version is
/// metadata about the copy in hand, not part of the object's identity, so it
/// is stripped before serialization and re-stamped after every read.
///
/// A version of `0` means "not yet persisted" (or "unknown"); objects handed
/// to `create` must carry `0`.
pub trait Object: Clone + Default + Send + Sync + 'static {
    /// Returns the embedded resource version.
    fn resource_version(&self) -> i64;

    /// Sets the embedded resource version.
    ///
    /// Must be idempotent and free of side effects beyond the version field.
    fn set_resource_version(&mut self, revision: i64);

    /// Returns the object's owner UID, if it has one.
    ///
    /// Used by precondition checks on delete and update. The default of
    /// `None` opts the type out of UID preconditions.
    fn uid(&self) -> Option<&str> {
        None
    }
}
