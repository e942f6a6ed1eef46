//! Registers `sqlite-vec` as a SQLite auto-extension so every connection
//! opened afterwards exposes `vec_distance_cosine` and friends.
//!
//! Registration happens at most once per process. Set `RUNWAY_SQLITE_VEC=0`
//! (or `false`/`off`) to keep the extension out, which forces the catalog's
//! in-process cosine fallback.

use rusqlite::Connection;
use std::sync::OnceLock;

const AUTO_ENABLE_ENV: &str = "RUNWAY_SQLITE_VEC";

static REGISTRATION: OnceLock<Result<(), RegistrationError>> = OnceLock::new();

/// Why the extension could not be made available.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("sqlite-vec auto-extension disabled by {AUTO_ENABLE_ENV}")]
    Disabled,

    #[error("sqlite3_auto_extension failed with rc={0}")]
    AutoExtension(i32),
}

/// Register the extension for all connections opened after this call.
///
/// # Errors
///
/// Returns [`RegistrationError::Disabled`] when the env switch is off, or
/// [`RegistrationError::AutoExtension`] when SQLite rejects the entrypoint.
pub fn register_auto_extension() -> Result<(), RegistrationError> {
    if disabled_by_env(std::env::var(AUTO_ENABLE_ENV).ok().as_deref()) {
        return Err(RegistrationError::Disabled);
    }

    REGISTRATION.get_or_init(register_once).clone()
}

/// Returns true when `conn` can evaluate `vec_version()`.
#[must_use]
pub fn vec_available(conn: &Connection) -> bool {
    conn.query_row("SELECT vec_version()", [], |row| row.get::<_, String>(0))
        .is_ok()
}

fn disabled_by_env(value: Option<&str>) -> bool {
    matches!(
        value.map(str::to_ascii_lowercase).as_deref(),
        Some("0" | "false" | "off" | "no")
    )
}

fn register_once() -> Result<(), RegistrationError> {
    #[allow(clippy::transmute_ptr_to_ptr)]
    let entrypoint: unsafe extern "C" fn(
        *mut rusqlite::ffi::sqlite3,
        *mut *const std::os::raw::c_char,
        *const rusqlite::ffi::sqlite3_api_routines,
    ) -> std::os::raw::c_int =
        unsafe { std::mem::transmute(sqlite_vec::sqlite3_vec_init as *const ()) };

    let rc = unsafe { rusqlite::ffi::sqlite3_auto_extension(Some(entrypoint)) };
    if rc == rusqlite::ffi::SQLITE_OK {
        tracing::debug!("sqlite-vec registered as auto-extension");
        Ok(())
    } else {
        Err(RegistrationError::AutoExtension(rc))
    }
}
