use tracing::{debug, info, warn};

use crate::datastore::{DARK_MODE_KEY, KeyValueStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

/// The persisted dark-mode flag.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThemePreference {
    dark_mode: bool,
}

impl ThemePreference {
    /// Only the exact string `"true"` counts as enabled.
    #[tracing::instrument(skip(store))]
    pub fn load<S>(store: &S) -> Self
    where
        S: KeyValueStore + ?Sized,
    {
        let dark_mode = match store.load(DARK_MODE_KEY) {
            Ok(raw) => raw.as_deref() == Some("true"),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed reading theme preference");
                false
            }
        };
        info!(dark_mode, "loaded theme preference");
        Self { dark_mode }
    }

    pub fn is_dark(&self) -> bool {
        self.dark_mode
    }

    pub fn theme(&self) -> Theme {
        if self.dark_mode {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    #[tracing::instrument(skip(self, store))]
    pub fn toggle<S>(&mut self, store: &mut S) -> bool
    where
        S: KeyValueStore + ?Sized,
    {
        self.dark_mode = !self.dark_mode;
        debug!(dark_mode = self.dark_mode, "theme toggled");

        let value = if self.dark_mode { "true" } else { "false" };
        if let Err(err) = store.save(DARK_MODE_KEY, value) {
            warn!(error = %format!("{err:#}"), "failed to persist theme preference");
        }
        self.dark_mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::MemoryStore;

    #[test]
    fn defaults_to_light() {
        let store = MemoryStore::new();

        assert!(!ThemePreference::load(&store).is_dark());
    }

    #[test]
    fn only_exact_true_enables() {
        for raw in ["TRUE", "1", "yes", " true", ""] {
            let store = MemoryStore::new().with_value(DARK_MODE_KEY, raw);
            assert!(!ThemePreference::load(&store).is_dark(), "{raw:?}");
        }
        let store = MemoryStore::new().with_value(DARK_MODE_KEY, "true");
        assert_eq!(ThemePreference::load(&store).theme(), Theme::Dark);
    }

    #[test]
    fn toggle_survives_reload() {
        let mut store = MemoryStore::new();
        let mut pref = ThemePreference::load(&store);

        assert!(pref.toggle(&mut store));
        assert!(ThemePreference::load(&store).is_dark());

        assert!(!pref.toggle(&mut store));
        assert!(!ThemePreference::load(&store).is_dark());
    }
}
