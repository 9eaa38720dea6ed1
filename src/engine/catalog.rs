//! Static lesson catalog
//!
//! Lessons form a prerequisite graph. A lesson unlocks once every prerequisite
//! has been completed; lessons without prerequisites are unlocked from the start.

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub type LessonId = String;

/// A lesson definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    pub id: LessonId,
    pub title: String,
    pub unit: u32,
    #[serde(default)]
    pub prerequisites: Vec<LessonId>,
}

impl Lesson {
    pub fn new(id: &str, title: &str, unit: u32, prerequisites: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            unit,
            prerequisites: prerequisites.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Ordered set of known lessons
#[derive(Debug, Clone, Default)]
pub struct LessonCatalog {
    lessons: Vec<Lesson>,
}

static DEFAULT_CATALOG: Lazy<LessonCatalog> = Lazy::new(|| {
    LessonCatalog::new(vec![
        Lesson::new("basics-1", "Basics 1", 1, &[]),
        Lesson::new("greetings", "Greetings", 1, &[]),
        Lesson::new("basics-2", "Basics 2", 1, &["basics-1"]),
        Lesson::new("phrases", "Common Phrases", 1, &["basics-1", "greetings"]),
        Lesson::new("food", "Food", 2, &["basics-2"]),
        Lesson::new("family", "Family", 2, &["basics-2", "phrases"]),
        Lesson::new("numbers", "Numbers", 2, &["basics-2"]),
        Lesson::new("shopping", "Shopping", 3, &["food", "numbers"]),
        Lesson::new("travel", "Travel", 3, &["phrases", "numbers"]),
        Lesson::new("home", "Home", 3, &["family"]),
        Lesson::new("present-tense", "Present Tense", 4, &["shopping", "home"]),
        Lesson::new("directions", "Directions", 4, &["travel"]),
        Lesson::new("past-tense", "Past Tense", 5, &["present-tense"]),
        Lesson::new("restaurant", "At the Restaurant", 5, &["shopping", "directions"]),
        Lesson::new("future-tense", "Future Tense", 6, &["past-tense"]),
        Lesson::new("stories", "Short Stories", 6, &["past-tense", "restaurant"]),
    ])
});

impl LessonCatalog {
    pub fn new(lessons: Vec<Lesson>) -> Self {
        Self { lessons }
    }

    /// Built-in course
    pub fn builtin() -> &'static LessonCatalog {
        &DEFAULT_CATALOG
    }

    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Look up a lesson, failing with `UnknownEntity`
    pub fn require(&self, id: &str) -> Result<&Lesson> {
        self.get(id).ok_or_else(|| EngineError::unknown_lesson(id))
    }

    /// Lessons that are unlocked before anything is completed
    pub fn initially_unlocked(&self) -> BTreeSet<LessonId> {
        self.lessons
            .iter()
            .filter(|l| l.prerequisites.is_empty())
            .map(|l| l.id.clone())
            .collect()
    }

    /// Lessons whose prerequisites are all completed but that are not yet in
    /// `unlocked`, in catalog order
    pub fn newly_unlockable(
        &self,
        completed: &BTreeSet<LessonId>,
        unlocked: &BTreeSet<LessonId>,
    ) -> Vec<LessonId> {
        self.lessons
            .iter()
            .filter(|l| !unlocked.contains(&l.id))
            .filter(|l| l.prerequisites.iter().all(|p| completed.contains(p)))
            .map(|l| l.id.clone())
            .collect()
    }
}
