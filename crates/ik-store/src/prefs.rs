//! File-scoped boolean preferences.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use ik_core::{CoreError, CoreResult, Preferences};

/// One YAML map of flags per preference scope.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
}

impl FilePreferences {
    /// Preferences stored in `<dir>/<scope>.yaml`.
    pub fn new(dir: PathBuf, scope: &str) -> Self {
        Self {
            path: dir.join(format!("{scope}.yaml")),
        }
    }

    fn load(&self) -> CoreResult<BTreeMap<String, bool>> {
        let values = ik_utils::read_yaml(&self.path)
            .map_err(|err| CoreError::Storage(err.to_string()))?;
        Ok(values.unwrap_or_default())
    }
}

impl Preferences for FilePreferences {
    fn get_bool(&self, key: &str) -> CoreResult<Option<bool>> {
        Ok(self.load()?.get(key).copied())
    }

    fn put_bool(&self, key: &str, value: bool) -> CoreResult<()> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value);
        ik_utils::write_yaml(&self.path, &values).map_err(|err| CoreError::Storage(err.to_string()))
    }

    fn clear(&self) -> CoreResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::remove_file(&self.path).map_err(|err| CoreError::Storage(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn flags_persist_and_clear() {
        let temp = TempDir::new().expect("temp dir");
        let prefs = FilePreferences::new(temp.path().to_path_buf(), "user_session");
        assert_eq!(prefs.get_bool("is_logged_in").unwrap(), None);

        prefs.put_bool("is_logged_in", true).unwrap();
        let reopened = FilePreferences::new(temp.path().to_path_buf(), "user_session");
        assert_eq!(reopened.get_bool("is_logged_in").unwrap(), Some(true));

        reopened.clear().unwrap();
        assert_eq!(prefs.get_bool("is_logged_in").unwrap(), None);
        reopened.clear().unwrap();
    }

    #[test]
    fn scopes_are_separate_files() {
        let temp = TempDir::new().expect("temp dir");
        let session = FilePreferences::new(temp.path().to_path_buf(), "user_session");
        let widget = FilePreferences::new(temp.path().to_path_buf(), "inventory_widget_prefs");
        widget.put_bool("visible_1", true).unwrap();
        session.clear().unwrap();
        assert_eq!(widget.get_bool("visible_1").unwrap(), Some(true));
    }
}
