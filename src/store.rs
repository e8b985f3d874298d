use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::StoreError;
use crate::types::worksheet_data::{LessonRecord, LessonSummary};

/// Persistence for finished worksheets. Records are immutable once saved.
pub trait LessonStore {
    fn save(
        &mut self,
        topics: &[String],
        grade: u32,
        lesson_text: &str,
        age: Option<u32>,
        tags: Option<Vec<String>>,
    ) -> Result<i64, StoreError>;
    fn get(&self, id: i64) -> Result<Option<LessonRecord>, StoreError>;
    /// Newest first.
    fn list(&self) -> Result<Vec<LessonSummary>, StoreError>;
    fn search(&self, keyword: &str) -> Result<Vec<LessonRecord>, StoreError>;
    fn delete(&mut self, id: i64) -> Result<bool, StoreError>;
    fn count(&self) -> Result<usize, StoreError>;
}

// On-disk layout of the store file.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
struct StoreSnapshot {
    next_id: i64,
    lessons: Vec<LessonRecord>,
}

/// Keeps every lesson in a single JSON file, rewritten on each change.
/// A missing file is an empty store.
#[derive(Debug, Clone)]
pub struct JsonLessonStore {
    path: PathBuf,
}

impl JsonLessonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io { path: self.path.display().to_string(), source }
    }

    fn load(&self) -> Result<StoreSnapshot, StoreError> {
        if !self.path.exists() {
            return Ok(StoreSnapshot { next_id: 1, lessons: Vec::new() });
        }
        let file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Serialization {
            path: self.path.display().to_string(),
            source,
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    // Writes to a sibling `.tmp` file, syncs it, then renames it over the store.
    fn persist(&self, snapshot: &StoreSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let tmp_path = self.tmp_path();
        let file = File::create(&tmp_path).map_err(|e| self.io_error(e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, snapshot).map_err(|source| {
            StoreError::Serialization { path: self.path.display().to_string(), source }
        })?;
        writer.flush().map_err(|e| self.io_error(e))?;
        let file = writer.into_inner().map_err(|e| self.io_error(e.into_error()))?;
        file.sync_all().map_err(|e| self.io_error(e))?;
        drop(file);
        fs::rename(&tmp_path, &self.path).map_err(|e| self.io_error(e))
    }
}

fn newest_first(records: &mut [LessonRecord]) {
    records.sort_by(|a, b| {
        b.date_generated
            .cmp(&a.date_generated)
            .then_with(|| b.id.cmp(&a.id))
    });
}

fn record_matches(record: &LessonRecord, needle: &str) -> bool {
    let contains = |s: &str| s.to_lowercase().contains(needle);
    record.topics.iter().any(|t| contains(t))
        || contains(&record.lesson_text)
        || record.tags.iter().flatten().any(|t| contains(t))
}

impl LessonStore for JsonLessonStore {
    fn save(
        &mut self,
        topics: &[String],
        grade: u32,
        lesson_text: &str,
        age: Option<u32>,
        tags: Option<Vec<String>>,
    ) -> Result<i64, StoreError> {
        let mut snapshot = self.load()?;
        let id = snapshot.next_id.max(1);
        snapshot.next_id = id + 1;
        snapshot.lessons.push(LessonRecord {
            id,
            topics: topics.to_vec(),
            grade,
            age,
            date_generated: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
            lesson_text: lesson_text.to_string(),
            tags: tags.filter(|t| !t.is_empty()),
        });
        self.persist(&snapshot)?;
        Ok(id)
    }

    fn get(&self, id: i64) -> Result<Option<LessonRecord>, StoreError> {
        Ok(self.load()?.lessons.into_iter().find(|l| l.id == id))
    }

    fn list(&self) -> Result<Vec<LessonSummary>, StoreError> {
        let mut lessons = self.load()?.lessons;
        newest_first(&mut lessons);
        Ok(lessons.iter().map(LessonSummary::from).collect())
    }

    fn search(&self, keyword: &str) -> Result<Vec<LessonRecord>, StoreError> {
        let needle = keyword.to_lowercase();
        let mut matches: Vec<LessonRecord> = self
            .load()?
            .lessons
            .into_iter()
            .filter(|record| record_matches(record, &needle))
            .collect();
        newest_first(&mut matches);
        Ok(matches)
    }

    fn delete(&mut self, id: i64) -> Result<bool, StoreError> {
        let mut snapshot = self.load()?;
        let before = snapshot.lessons.len();
        snapshot.lessons.retain(|l| l.id != id);
        if snapshot.lessons.len() == before {
            return Ok(false);
        }
        self.persist(&snapshot)?;
        Ok(true)
    }

    fn count(&self) -> Result<usize, StoreError> {
        Ok(self.load()?.lessons.len())
    }
}

/// Saves a freshly generated lesson, logging instead of failing when the store
/// cannot be written. The lesson itself is never lost to a storage error.
pub fn save_generated_lesson<S: LessonStore + ?Sized>(
    store: &mut S,
    topics: &[String],
    grade: u32,
    lesson_text: &str,
) -> Option<i64> {
    match store.save(topics, grade, lesson_text, None, None) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Failed to save lesson to store: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, JsonLessonStore) {
        let dir = TempDir::new().unwrap();
        let store = JsonLessonStore::new(dir.path().join("lessons.json"));
        (dir, store)
    }

    fn topics(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let (_dir, store) = store();
        assert_eq!(store.count().unwrap(), 0);
        assert!(store.list().unwrap().is_empty());
        assert!(store.get(1).unwrap().is_none());
    }

    #[test]
    fn saved_lesson_round_trips() {
        let (_dir, mut store) = store();
        let id = store
            .save(&topics(&["Nouns", "Verbs"]), 4, "Grammar — Nouns\n\nExplanation", Some(9), Some(topics(&["review"])))
            .unwrap();
        assert_eq!(id, 1);

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.topics, topics(&["Nouns", "Verbs"]));
        assert_eq!(record.grade, 4);
        assert_eq!(record.age, Some(9));
        assert_eq!(record.lesson_text, "Grammar — Nouns\n\nExplanation");
        assert_eq!(record.tags, Some(topics(&["review"])));
        assert!(chrono::DateTime::parse_from_rfc3339(&record.date_generated).is_ok());
    }

    #[test]
    fn list_is_newest_first() {
        let (_dir, mut store) = store();
        let first = store.save(&topics(&["Nouns"]), 3, "a", None, None).unwrap();
        let second = store.save(&topics(&["Verbs"]), 3, "b", None, None).unwrap();
        let ids: Vec<i64> = store.list().unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[test]
    fn search_covers_topics_text_and_tags() {
        let (_dir, mut store) = store();
        store.save(&topics(&["Commas"]), 2, "Use commas in lists.", None, None).unwrap();
        store.save(&topics(&["Nouns"]), 2, "A noun names a thing.", None, Some(topics(&["Plurals"]))).unwrap();
        store.save(&topics(&["Verbs"]), 2, "Run, jump, swim.", None, None).unwrap();

        assert_eq!(store.search("COMMAS").unwrap().len(), 1);
        assert_eq!(store.search("plural").unwrap()[0].topics, topics(&["Nouns"]));
        assert_eq!(store.search("swim").unwrap()[0].topics, topics(&["Verbs"]));
        assert!(store.search("adverb").unwrap().is_empty());
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let (_dir, mut store) = store();
        let id = store.save(&topics(&["Nouns"]), 1, "x", None, None).unwrap();
        assert!(store.delete(id).unwrap());
        assert!(!store.delete(id).unwrap());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn ids_are_not_reused_after_delete() {
        let (_dir, mut store) = store();
        let first = store.save(&topics(&["Nouns"]), 1, "x", None, None).unwrap();
        store.delete(first).unwrap();
        let second = store.save(&topics(&["Nouns"]), 1, "y", None, None).unwrap();
        assert_eq!(second, first + 1);
    }

    #[test]
    fn failed_write_keeps_the_previous_store_intact() {
        let (_dir, mut store) = store();
        store.save(&topics(&["Nouns"]), 3, "kept", None, None).unwrap();
        fs::create_dir(store.tmp_path()).unwrap();

        let err = store.save(&topics(&["Verbs"]), 3, "lost", None, None).unwrap_err();

        assert!(matches!(err, StoreError::Io { .. }));
        let lessons = store.search("").unwrap();
        assert_eq!(lessons.len(), 1);
        assert_eq!(lessons[0].lesson_text, "kept");
    }

    #[test]
    fn save_leaves_complete_json_and_no_tmp_file() {
        let (_dir, mut store) = store();
        store.save(&topics(&["Nouns"]), 3, "a", None, None).unwrap();

        let on_disk: serde_json::Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(on_disk["next_id"], 2);
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn generated_lesson_save_failure_is_not_fatal() {
        let (_dir, mut store) = store();
        fs::create_dir(store.tmp_path()).unwrap();

        assert_eq!(save_generated_lesson(&mut store, &topics(&["Nouns"]), 3, "text"), None);
        fs::remove_dir(store.tmp_path()).unwrap();
        assert_eq!(save_generated_lesson(&mut store, &topics(&["Nouns"]), 3, "text"), Some(1));
    }

    #[test]
    fn corrupt_file_is_reported() {
        let (_dir, store) = store();
        fs::write(store.path(), "not json").unwrap();
        assert!(matches!(store.count(), Err(StoreError::Serialization { .. })));
    }
}
