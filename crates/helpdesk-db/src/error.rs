use rusqlite::ffi;
use thiserror::Error;

/// Constraint failures a caller can act on. Everything else stays an opaque
/// `anyhow::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("login already exists")]
    DuplicateLogin,

    /// An insert named an account or ticket that is gone, e.g. a session
    /// outliving its deleted account.
    #[error("referenced account or ticket no longer exists")]
    MissingReference,
}

/// Lifts the constraint violations above out of a raw SQLite error.
pub(crate) fn classify(err: rusqlite::Error) -> anyhow::Error {
    if let rusqlite::Error::SqliteFailure(code, msg) = &err {
        if code.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
            && msg.as_deref().is_some_and(|m| m.contains("users.login"))
        {
            return StoreError::DuplicateLogin.into();
        }
        if code.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
            return StoreError::MissingReference.into();
        }
    }
    err.into()
}

/// The [`StoreError`] behind `err`, if any.
pub fn store_error(err: &anyhow::Error) -> Option<StoreError> {
    err.downcast_ref::<StoreError>().copied()
}
