use std::path::PathBuf;

use crate::KnowledgeSettings;
use crate::errors::{KnowledgeError, KnowledgeResult};

pub const KNOWLEDGE_DB_FILE: &str = "knowledge.sqlite3";

pub fn data_root(settings: &KnowledgeSettings) -> KnowledgeResult<PathBuf> {
    if let Some(path) = &settings.data_root_override {
        return Ok(path.clone());
    }

    if let Ok(override_dir) = std::env::var("OTVET_DATA_DIR") {
        return Ok(PathBuf::from(override_dir));
    }

    let dir = dirs::data_dir().ok_or(KnowledgeError::MissingDataDir)?;
    Ok(dir.join("otvet"))
}

pub fn knowledge_db_path(settings: &KnowledgeSettings) -> KnowledgeResult<PathBuf> {
    if let Some(path) = &settings.knowledge_db_path_override {
        return Ok(path.clone());
    }
    Ok(data_root(settings)?.join(KNOWLEDGE_DB_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_path_overrides() {
        let settings = KnowledgeSettings {
            data_root_override: Some(PathBuf::from("/srv/otvet")),
            ..Default::default()
        };
        assert_eq!(
            knowledge_db_path(&settings).unwrap(),
            PathBuf::from("/srv/otvet/knowledge.sqlite3")
        );

        let settings = KnowledgeSettings {
            knowledge_db_path_override: Some(PathBuf::from("/tmp/kb.db")),
            data_root_override: Some(PathBuf::from("/srv/otvet")),
            ..Default::default()
        };
        assert_eq!(
            knowledge_db_path(&settings).unwrap(),
            PathBuf::from("/tmp/kb.db")
        );
    }
}
