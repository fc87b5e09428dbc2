use std::fmt;

use ik_core::{inventory_total, CoreResult, InventoryStore, Preferences};
use ik_store::SharedStore;
use ik_utils::{format_currency, MASKED_AMOUNT};

use crate::{SessionManager, SharedPreferences};

/// Icon offered by the visibility toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleIcon {
    /// Value hidden; tapping reveals it.
    Show,
    /// Value shown; tapping hides it.
    Hide,
}

/// Screen a widget tap leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetRoute {
    Login,
    Inventory,
}

/// Rendered state of one widget instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetView {
    pub widget_id: u32,
    pub balance: String,
    pub toggle: ToggleIcon,
}

impl fmt::Display for WidgetView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let toggle = match self.toggle {
            ToggleIcon::Show => "[show]",
            ToggleIcon::Hide => "[hide]",
        };
        writeln!(f, "Inventory #{}", self.widget_id)?;
        writeln!(f, "{}  {}", self.balance, toggle)?;
        write!(f, "Manage inventory")
    }
}

/// Outcome of tapping the visibility toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    Rendered(WidgetView),
    Route(WidgetRoute),
}

/// Summary card with the aggregate inventory value.
#[derive(Clone)]
pub struct InventoryWidget {
    store: SharedStore,
    session: SessionManager,
    prefs: SharedPreferences,
}

impl InventoryWidget {
    pub fn new(store: SharedStore, session: SessionManager, prefs: SharedPreferences) -> Self {
        Self {
            store,
            session,
            prefs,
        }
    }

    pub fn visibility_key(widget_id: u32) -> String {
        format!("visible_{widget_id}")
    }

    pub fn is_visible(&self, widget_id: u32) -> bool {
        match self.prefs.get_bool(&Self::visibility_key(widget_id)) {
            Ok(value) => value.unwrap_or(false),
            Err(err) => {
                tracing::warn!(widget_id, error = %err, "unable to read widget visibility");
                false
            }
        }
    }

    /// Render one instance. The aggregate is only computed for a signed-in, visible widget.
    pub fn render(&self, widget_id: u32) -> WidgetView {
        self.ensure_default(widget_id);
        let masked = WidgetView {
            widget_id,
            balance: MASKED_AMOUNT.to_string(),
            toggle: ToggleIcon::Show,
        };
        if !self.session.is_logged_in() || !self.is_visible(widget_id) {
            return masked;
        }
        WidgetView {
            widget_id,
            balance: format_currency(self.total()),
            toggle: ToggleIcon::Hide,
        }
    }

    /// Tap on the eye icon.
    pub fn tap_toggle(&self, widget_id: u32) -> TapOutcome {
        if !self.session.is_logged_in() {
            return TapOutcome::Route(WidgetRoute::Login);
        }
        let key = Self::visibility_key(widget_id);
        let next = !self.is_visible(widget_id);
        if let Err(err) = self.prefs.put_bool(&key, next) {
            tracing::warn!(widget_id, error = %err, "unable to store widget visibility");
        }
        TapOutcome::Rendered(self.render(widget_id))
    }

    /// Tap on "Manage inventory".
    pub fn tap_manage(&self) -> WidgetRoute {
        if self.session.is_logged_in() {
            WidgetRoute::Inventory
        } else {
            WidgetRoute::Login
        }
    }

    /// Forget every instance's visibility, hiding all values again.
    pub fn clear_all_visibility(&self) -> CoreResult<()> {
        self.prefs.clear()
    }

    /// Sum of price times quantity; zero when the store cannot be read.
    pub fn total(&self) -> u128 {
        match self.store.list() {
            Ok(items) => inventory_total(&items),
            Err(err) => {
                tracing::warn!(error = %err, "unable to compute inventory total");
                0
            }
        }
    }

    fn ensure_default(&self, widget_id: u32) {
        let key = Self::visibility_key(widget_id);
        match self.prefs.get_bool(&key) {
            Ok(Some(_)) => {}
            Ok(None) => {
                if let Err(err) = self.prefs.put_bool(&key, false) {
                    tracing::warn!(widget_id, error = %err, "unable to store widget default");
                }
            }
            Err(err) => tracing::warn!(widget_id, error = %err, "unable to read widget visibility"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use ik_core::InventoryItem;
    use ik_store::SqliteStore;

    use crate::repository::tests::BrokenStore;
    use crate::session::tests::MemoryPreferences;

    struct Fixture {
        widget: InventoryWidget,
        session: SessionManager,
        prefs: Arc<MemoryPreferences>,
    }

    fn fixture(store: SharedStore) -> Fixture {
        let session = SessionManager::new(Arc::new(MemoryPreferences::default()));
        let prefs = Arc::new(MemoryPreferences::default());
        let widget = InventoryWidget::new(store, session.clone(), prefs.clone());
        Fixture {
            widget,
            session,
            prefs,
        }
    }

    fn stocked_store() -> SharedStore {
        let store = SqliteStore::open_in_memory().expect("store");
        store
            .insert(&InventoryItem::new(1, "Bolt", 1_000, 3).unwrap())
            .expect("insert");
        store
            .insert(&InventoryItem::new(2, "Nut", 250, 2).unwrap())
            .expect("insert");
        Arc::new(store)
    }

    #[test]
    fn first_render_stores_hidden_default() {
        let f = fixture(stocked_store());
        f.session.save_login_state(true).unwrap();
        let view = f.widget.render(7);
        assert_eq!(view.balance, MASKED_AMOUNT);
        assert_eq!(f.prefs.get_bool("visible_7").unwrap(), Some(false));
    }

    #[test]
    fn toggle_reveals_aggregate() {
        let f = fixture(stocked_store());
        f.session.save_login_state(true).unwrap();
        let TapOutcome::Rendered(view) = f.widget.tap_toggle(7) else {
            panic!("expected a render");
        };
        assert_eq!(view.toggle, ToggleIcon::Hide);
        insta::assert_snapshot!(view.to_string(), @r###"
        Inventory #7
        $ 3.500,00  [hide]
        Manage inventory
        "###);

        let TapOutcome::Rendered(view) = f.widget.tap_toggle(7) else {
            panic!("expected a render");
        };
        assert_eq!(view.balance, MASKED_AMOUNT);
    }

    #[test]
    fn signed_out_is_masked_and_routes_to_login() {
        let f = fixture(stocked_store());
        f.prefs.put_bool("visible_3", true).unwrap();
        let view = f.widget.render(3);
        assert_eq!(view.balance, MASKED_AMOUNT);
        assert!(!view.to_string().contains("3.500"));
        assert_eq!(f.widget.tap_toggle(3), TapOutcome::Route(WidgetRoute::Login));
        assert_eq!(f.widget.tap_manage(), WidgetRoute::Login);
        f.session.save_login_state(true).unwrap();
        assert_eq!(f.widget.tap_manage(), WidgetRoute::Inventory);
    }

    #[test]
    fn instances_toggle_independently() {
        let f = fixture(stocked_store());
        f.session.save_login_state(true).unwrap();
        f.widget.tap_toggle(1);
        assert!(f.widget.is_visible(1));
        assert!(!f.widget.is_visible(2));
        f.widget.clear_all_visibility().unwrap();
        assert!(!f.widget.is_visible(1));
    }

    #[test]
    fn unreadable_store_totals_zero() {
        let f = fixture(Arc::new(BrokenStore));
        f.session.save_login_state(true).unwrap();
        f.widget.tap_toggle(1);
        assert_eq!(f.widget.render(1).balance, "$ 0,00");
    }
}
