use std::sync::Arc;

use ik_core::{CoreResult, Preferences};

/// Key of the persisted login flag.
pub const KEY_IS_LOGGED_IN: &str = "is_logged_in";

/// Shared handle to a preference scope.
pub type SharedPreferences = Arc<dyn Preferences + Send + Sync>;

/// Persisted "logged in" flag, read by each screen when it becomes visible.
#[derive(Clone)]
pub struct SessionManager {
    prefs: SharedPreferences,
}

impl SessionManager {
    pub fn new(prefs: SharedPreferences) -> Self {
        Self { prefs }
    }

    pub fn save_login_state(&self, logged_in: bool) -> CoreResult<()> {
        tracing::info!(logged_in, "session state saved");
        self.prefs.put_bool(KEY_IS_LOGGED_IN, logged_in)
    }

    /// False when the flag was never written or cannot be read.
    pub fn is_logged_in(&self) -> bool {
        match self.prefs.get_bool(KEY_IS_LOGGED_IN) {
            Ok(value) => value.unwrap_or(false),
            Err(err) => {
                tracing::warn!(error = %err, "unable to read session flag");
                false
            }
        }
    }

    /// Forget everything stored for the session.
    pub fn clear_session(&self) -> CoreResult<()> {
        tracing::info!("session cleared");
        self.prefs.clear()
    }
}
