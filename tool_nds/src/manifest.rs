use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use lib_nds::constants::parse_language;
use log::debug;
use serde::Deserialize;

use crate::error::ActionError;

/// Banner sources described in a JSON file.
///
/// ```json
/// { "icon": "icon.png", "titles": { "English": "Game;Maker", "3": "Spiel" } }
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Manifest {
    pub icon: Option<PathBuf>,
    pub animation: Option<PathBuf>,
    pub grf: Option<PathBuf>,
    pub titles: BTreeMap<String, String>,
}

/// Accepts a language index (0-15) or one of the language names.
pub fn language_index(text: &str) -> Result<usize, ActionError> {
    parse_language(text).ok_or_else(|| ActionError::InvalidLanguage(text.to_string()))
}

impl Manifest {
    /// Loads a manifest. Relative paths are resolved against its directory.
    pub fn load(path: &Path) -> Result<Manifest, ActionError> {
        let text = fs::read_to_string(path).map_err(|source| ActionError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut manifest: Manifest =
            serde_json::from_str(&text).map_err(|source| ActionError::Manifest {
                path: path.display().to_string(),
                source,
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for source in [
            &mut manifest.icon,
            &mut manifest.animation,
            &mut manifest.grf,
        ] {
            if let Some(file) = source {
                if file.is_relative() {
                    *file = base.join(&*file);
                }
            }
        }
        debug!("Loaded manifest {}: {:?}", path.display(), manifest);
        Ok(manifest)
    }

    /// Titles keyed by language index.
    pub fn title_entries(&self) -> Result<Vec<(usize, String)>, ActionError> {
        self.titles
            .iter()
            .map(|(language, text)| Ok((language_index(language)?, text.clone())))
            .collect()
    }
}
