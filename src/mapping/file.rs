use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::IdMapping;
use crate::error::{PipelineError, Result};
use crate::types::Identifier;

pub const MAPPING_FILE: &str = "mappings.json";

/// On-disk form: stringified dense index -> original identifier.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MappingFile {
    pub user_mapping: BTreeMap<String, Identifier>,
    pub item_mapping: BTreeMap<String, Identifier>,
}

impl MappingFile {
    pub fn new(users: &IdMapping, items: &IdMapping) -> Self {
        let encode = |m: &IdMapping| {
            m.iter()
                .map(|(idx, id)| (idx.to_string(), id.clone()))
                .collect()
        };
        Self {
            user_mapping: encode(users),
            item_mapping: encode(items),
        }
    }

    pub fn load(dir: &Path) -> Result<(IdMapping, IdMapping)> {
        let path = dir.join(MAPPING_FILE);
        if !path.exists() {
            return Err(PipelineError::artifact(&path, "not found, run `cinematch extract` first"));
        }
        let content = std::fs::read_to_string(&path)?;
        let file: MappingFile = serde_json::from_str(&content)
            .map_err(|e| PipelineError::artifact(&path, e.to_string()))?;

        let decode = |side: &str, raw: BTreeMap<String, Identifier>| -> Result<IdMapping> {
            let entries = raw
                .into_iter()
                .map(|(key, id)| {
                    key.parse::<usize>().map(|idx| (idx, id)).map_err(|_| {
                        PipelineError::artifact(&path, format!("{side}: bad index key {key:?}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            IdMapping::from_entries(entries)
                .map_err(|reason| PipelineError::artifact(&path, format!("{side}: {reason}")))
        };

        let users = decode("user_mapping", file.user_mapping)?;
        let items = decode("item_mapping", file.item_mapping)?;
        Ok((users, items))
    }

    /// Write the new mapping beside the current one without replacing it.
    pub fn stage(&self, dir: &Path) -> Result<StagedMapping> {
        std::fs::create_dir_all(dir)?;
        let tmp_path = dir.join(".mappings.json.tmp");
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&tmp_path, &content)?;
        Ok(StagedMapping {
            tmp_path,
            path: dir.join(MAPPING_FILE),
        })
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        self.stage(dir)?.commit()
    }
}

/// A fully written mapping waiting to replace `mappings.json`.
#[derive(Debug)]
pub struct StagedMapping {
    tmp_path: PathBuf,
    path: PathBuf,
}

impl StagedMapping {
    pub fn commit(self) -> Result<()> {
        std::fs::rename(&self.tmp_path, &self.path)?;
        Ok(())
    }

    /// Drop the pending file, leaving the current mapping untouched.
    pub fn discard(self) {
        let _ = std::fs::remove_file(&self.tmp_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::map_interactions;
    use crate::types::fallback_interactions;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_restores_both_spaces() {
        let tmp = TempDir::new().unwrap();
        let mapped = map_interactions(&fallback_interactions()).unwrap();
        MappingFile::new(&mapped.users, &mapped.items)
            .save(tmp.path())
            .unwrap();

        let (users, items) = MappingFile::load(tmp.path()).unwrap();
        assert_eq!(users, mapped.users);
        assert_eq!(items, mapped.items);
    }

    #[test]
    fn json_layout_uses_string_keys_and_typed_values() {
        let tmp = TempDir::new().unwrap();
        let mapped = map_interactions(&fallback_interactions()).unwrap();
        MappingFile::new(&mapped.users, &mapped.items)
            .save(tmp.path())
            .unwrap();

        let raw = std::fs::read_to_string(tmp.path().join(MAPPING_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["user_mapping"]["0"], serde_json::json!("user-1"));
        assert_eq!(value["item_mapping"]["2"], serde_json::json!(27205));
        assert_eq!(value["item_mapping"].as_object().unwrap().len(), 3);
    }

    #[test]
    fn discarded_stage_keeps_current_mapping() {
        let tmp = TempDir::new().unwrap();
        let first = map_interactions(&fallback_interactions()).unwrap();
        MappingFile::new(&first.users, &first.items)
            .save(tmp.path())
            .unwrap();

        let other = IdMapping::from_ids(&[Identifier::from("solo")]);
        MappingFile::new(&other, &other)
            .stage(tmp.path())
            .unwrap()
            .discard();

        let (users, items) = MappingFile::load(tmp.path()).unwrap();
        assert_eq!((users, items), (first.users, first.items));
        assert!(!tmp.path().join(".mappings.json.tmp").exists());
    }

    #[test]
    fn missing_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let err = MappingFile::load(tmp.path()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArtifact { .. }));
    }

    #[test]
    fn non_numeric_key_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(MAPPING_FILE),
            r#"{"user_mapping": {"zero": "u"}, "item_mapping": {"0": 1}}"#,
        )
        .unwrap();
        let err = MappingFile::load(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("bad index key"));
    }

    #[test]
    fn gap_in_item_space_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(MAPPING_FILE),
            r#"{"user_mapping": {"0": "u"}, "item_mapping": {"0": 1, "2": 3}}"#,
        )
        .unwrap();
        let err = MappingFile::load(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("item_mapping: index 2 out of range"));
    }

    #[test]
    fn oversized_index_key_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(MAPPING_FILE),
            r#"{"user_mapping": {"0": "u"}, "item_mapping": {"0": 1, "18446744073709551615": 3}}"#,
        )
        .unwrap();
        let err = MappingFile::load(tmp.path()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidArtifact { .. }));
        assert!(err.to_string().contains("out of range"));
    }
}
