//! View-models, repositories, session, and widget logic for InvKeeper.
//!
//! Screens talk to the view-models; view-models talk to the repositories;
//! repositories run backend calls on blocking workers and never surface
//! backend errors.

mod auth;
mod inventory;
mod repository;
mod session;
mod widget;

pub use auth::{
    AuthRepository, LoginViewModel, SharedIdentity, BIOMETRIC_FAILURE, BIOMETRIC_SUCCESS,
    LOGIN_FAILURE, LOGIN_SUCCESS, REGISTER_DUPLICATE, REGISTER_FAILURE, REGISTER_SUCCESS,
};
pub use inventory::InventoryViewModel;
pub use repository::InventoryRepository;
pub use session::{SessionManager, SharedPreferences, KEY_IS_LOGGED_IN};
pub use widget::{InventoryWidget, TapOutcome, ToggleIcon, WidgetRoute, WidgetView};

use std::sync::Arc;

use ik_core::CoreResult;
use ik_store::{Backend, DataDir};

/// Message shown when saving hits an existing code.
pub const DUPLICATE_CODE_MESSAGE: &str = "Error: item code already exists";

/// Everything a front end needs, wired from one data directory and backend.
pub struct AppContext {
    pub inventory: InventoryViewModel,
    pub login: LoginViewModel,
    pub session: SessionManager,
    pub widget: InventoryWidget,
}

impl AppContext {
    /// Compose the application around the selected backend.
    pub fn open(data: &DataDir, backend: Backend) -> CoreResult<Self> {
        let store = data.open_store(backend)?;
        let session = SessionManager::new(Arc::new(data.session_prefs()));
        let widget = InventoryWidget::new(
            Arc::clone(&store),
            session.clone(),
            Arc::new(data.widget_prefs()),
        );
        let inventory = InventoryViewModel::new(InventoryRepository::new(store));
        let login = LoginViewModel::new(
            AuthRepository::new(Arc::new(data.accounts())),
            session.clone(),
        );
        Ok(Self {
            inventory,
            login,
            session,
            widget,
        })
    }

    /// Sign out: clear the session flag and hide every widget value.
    pub fn logout(&self) -> CoreResult<()> {
        self.session.clear_session()?;
        self.widget.clear_all_visibility()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ik_core::{InventoryItem, UserRequest};

    #[tokio::test]
    async fn end_to_end_on_document_backend() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let data = DataDir::new(temp.path().to_path_buf());
        data.init().expect("init");
        let app = AppContext::open(&data, Backend::Document).expect("open");

        let response = app
            .login
            .register(UserRequest::new("me@home.com", "secret1"))
            .await;
        assert!(response.is_successful);
        assert!(app.session.is_logged_in());

        let item = InventoryItem::new(200, "New Item", 20, 5).unwrap();
        assert!(app.inventory.save(item.clone()).await);
        assert!(!app.inventory.save(item).await);
        assert_eq!(app.inventory.current_items().len(), 1);
        assert_eq!(app.widget.total(), 100);

        app.widget.tap_toggle(1);
        assert!(app.widget.is_visible(1));
        app.logout().expect("logout");
        assert!(!app.session.is_logged_in());
        assert!(!app.widget.is_visible(1));
    }
}
