//! Content-addressed quiz store.
//!
//! Grounded on `game/quiz/manager.go`: one readers-writer lock protects both
//! the hash map and the category set, `LoadDir` releases the write lock
//! across each recursive descent into a subdirectory, and per-file load
//! failures during a crawl are reported rather than aborting it (the
//! original's `LoadDir` actually aborts on the first error despite its own
//! doc comment — spec §9 treats that as a bug and this expansion implements
//! the documented, corrected behaviour).

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::time::SystemTime;

use crate::error::{Error, Result};

use super::{Quiz, Source};

struct Entry {
    quiz: Quiz,
    inserted: SystemTime,
}

struct Inner {
    quizzes: HashMap<String, Entry>,
    categories: BTreeSet<String>,
}

/// One failure encountered while crawling a directory, alongside the path
/// that produced it.
#[derive(Debug)]
pub struct LoadDirError {
    pub path: std::path::PathBuf,
    pub error: Error,
}

/// Outcome of a directory crawl: what loaded, and what didn't.
#[derive(Debug, Default)]
pub struct LoadDirReport {
    pub loaded: Vec<Quiz>,
    pub errors: Vec<LoadDirError>,
}

pub struct Manager {
    inner: std::sync::RwLock<Inner>,
}

impl Manager {
    pub fn new() -> Manager {
        Manager {
            inner: std::sync::RwLock::new(Inner {
                quizzes: HashMap::new(),
                categories: BTreeSet::new(),
            }),
        }
    }

    /// Inserts `quiz`, keyed by its content hash. Fails [`Error::DuplicateQuiz`]
    /// if that hash is already present.
    pub fn load(&self, quiz: Quiz) -> Result<()> {
        let mut inner = self.inner.write().expect("quiz manager lock poisoned");
        Self::load_locked(&mut inner, quiz)
    }

    fn load_locked(inner: &mut Inner, quiz: Quiz) -> Result<()> {
        let hash = quiz.hash_hex();
        if inner.quizzes.contains_key(&hash) {
            return Err(Error::DuplicateQuiz);
        }

        inner.categories.insert(quiz.category.clone());
        inner.quizzes.insert(hash, Entry { quiz, inserted: SystemTime::now() });
        Ok(())
    }

    /// Reads, parses and loads a single quiz archive file from disk.
    pub fn load_from(&self, path: &Path) -> Result<Quiz> {
        let file = std::fs::File::open(path)?;
        let quiz = Quiz::load(file, Source::Filesystem)?;
        self.load(quiz.clone())?;
        Ok(quiz)
    }

    /// Depth-first recursive crawl of `path`, loading every quiz archive
    /// found. A directory-open failure for `path` itself is fatal; failures
    /// on individual entries (including nested directories) are collected
    /// into the returned report and do not stop the crawl.
    ///
    /// The write lock is held only across each directory's own entries and
    /// is released before recursing into a subdirectory, so a slow nested
    /// crawl never starves readers for longer than one directory's worth of
    /// insertions.
    pub fn load_dir(&self, path: &Path) -> Result<LoadDirReport> {
        let entries = std::fs::read_dir(path)?;

        let mut report = LoadDirReport::default();
        let mut inner = self.inner.write().expect("quiz manager lock poisoned");

        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    report.errors.push(LoadDirError { path: path.to_path_buf(), error: Error::Io(e) });
                    continue;
                }
            };
            let full = entry.path();

            if full.is_dir() {
                drop(inner);
                match self.load_dir(&full) {
                    Ok(sub) => {
                        report.loaded.extend(sub.loaded);
                        report.errors.extend(sub.errors);
                    }
                    Err(e) => report.errors.push(LoadDirError { path: full.clone(), error: e }),
                }
                inner = self.inner.write().expect("quiz manager lock poisoned");
                continue;
            }

            match std::fs::File::open(&full) {
                Ok(f) => match Quiz::load(f, Source::Filesystem) {
                    Ok(quiz) => match Self::load_locked(&mut inner, quiz.clone()) {
                        Ok(()) => report.loaded.push(quiz),
                        Err(e) => report.errors.push(LoadDirError { path: full, error: e }),
                    },
                    Err(e) => report.errors.push(LoadDirError { path: full, error: e }),
                },
                Err(e) => report.errors.push(LoadDirError { path: full, error: Error::Io(e) }),
            }
        }

        Ok(report)
    }

    /// Looks up a quiz by its raw SHA-256 digest bytes.
    pub fn get(&self, hash_bytes: &[u8]) -> Option<Quiz> {
        let hex: String = hash_bytes.iter().map(|b| format!("{b:02X}")).collect();
        self.get_string(&hex)
    }

    /// Looks up a quiz by its hex-encoded hash string.
    pub fn get_string(&self, hex_hash: &str) -> Option<Quiz> {
        let inner = self.inner.read().expect("quiz manager lock poisoned");
        inner.quizzes.get(hex_hash).map(|e| e.quiz.clone())
    }

    /// Snapshot of every stored quiz.
    pub fn get_all(&self) -> Vec<Quiz> {
        let inner = self.inner.read().expect("quiz manager lock poisoned");
        inner.quizzes.values().map(|e| e.quiz.clone()).collect()
    }

    /// Deduplicated, friendly-formatted category list.
    pub fn get_categories(&self) -> Vec<String> {
        let inner = self.inner.read().expect("quiz manager lock poisoned");
        inner.categories.iter().map(|c| super::friendly_category(c)).collect()
    }

    /// Number of stored quizzes. Mostly useful for tests.
    pub fn len(&self) -> usize {
        self.inner.read().expect("quiz manager lock poisoned").quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Time a quiz was inserted, if present. Exposed for bookkeeping/tests.
    pub fn inserted_at(&self, hex_hash: &str) -> Option<SystemTime> {
        let inner = self.inner.read().expect("quiz manager lock poisoned");
        inner.quizzes.get(hex_hash).map(|e| e.inserted)
    }
}

impl Default for Manager {
    fn default() -> Self {
        Manager::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{Answer, Question};

    fn quiz(title: &str, category: &str) -> Quiz {
        Quiz {
            title: title.to_string(),
            description: String::new(),
            author: String::new(),
            category: category.to_string(),
            created: String::new(),
            questions: vec![Question {
                title: "q".to_string(),
                duration: 10,
                image_url: None,
                answers: vec![Answer { title: "a".to_string(), correct: true }],
            }],
            source: Source::Upload,
        }
    }

    #[test]
    fn load_then_duplicate_load_fails() {
        let mgr = Manager::new();
        let q = quiz("Quiz", "science");
        mgr.load(q.clone()).unwrap();

        let err = mgr.load(q).unwrap_err();
        assert!(matches!(err, Error::DuplicateQuiz));
        assert_eq!(mgr.get_all().len(), 1);
    }

    #[test]
    fn get_all_returns_value_copies() {
        let mgr = Manager::new();
        mgr.load(quiz("A", "x")).unwrap();
        mgr.load(quiz("B", "y")).unwrap();
        assert_eq!(mgr.get_all().len(), 2);
    }

    #[test]
    fn get_string_round_trips_hash() {
        let mgr = Manager::new();
        let q = quiz("A", "x");
        let hash = q.hash_hex();
        mgr.load(q.clone()).unwrap();

        let found = mgr.get_string(&hash).unwrap();
        assert_eq!(found.title, "A");
    }

    #[test]
    fn get_categories_dedupes_and_beautifies() {
        let mgr = Manager::new();
        mgr.load(quiz("A", "science")).unwrap();
        mgr.load(quiz("B", "science")).unwrap();
        mgr.load(quiz("C", "")).unwrap();

        let mut cats = mgr.get_categories();
        cats.sort();
        assert_eq!(cats, vec!["Science".to_string(), "Uncategorised".to_string()]);
    }

    #[test]
    fn load_dir_crawls_nested_directories() {
        let dir = std::env::temp_dir().join(format!("quiplex-test-{}", std::process::id()));
        let sub = dir.join("nested");
        std::fs::create_dir_all(&sub).unwrap();

        std::fs::write(dir.join("one.json"), serde_json::to_vec(&quiz("One", "a")).unwrap()).unwrap();
        std::fs::write(sub.join("two.json"), serde_json::to_vec(&quiz("Two", "b")).unwrap()).unwrap();
        std::fs::write(dir.join("broken.json"), b"not json").unwrap();

        let mgr = Manager::new();
        let report = mgr.load_dir(&dir).unwrap();

        assert_eq!(report.loaded.len(), 2);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(mgr.len(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn load_dir_missing_root_is_fatal() {
        let mgr = Manager::new();
        let missing = std::env::temp_dir().join("quiplex-definitely-missing-dir");
        assert!(mgr.load_dir(&missing).is_err());
    }
}
