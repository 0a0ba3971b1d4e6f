//! Local persistence layer (device storage).

pub mod local_store;

pub use local_store::LocalStore;

/// Well-known store keys.
pub mod keys {
    pub const SESSION: &str = "auth.session";
    /// Last successfully fetched profile of the signed-in user
    pub const PROFILE_CACHE: &str = "profile.cache";
    /// Wellness records waiting to be sent
    pub const PENDING_RECORDS: &str = "pending.records";
}
