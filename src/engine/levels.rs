//! XP and level system
//!
//! Level thresholds grow by roughly 20-30% per level. Level is a pure function of
//! total XP.

/// Level definition
#[derive(Debug, Clone)]
pub struct Level {
    pub level: u32,
    pub xp_required: u64,
    pub title: &'static str,
}

/// All level definitions (must be sorted by level)
pub static LEVELS: &[Level] = &[
    Level {
        level: 1,
        xp_required: 0,
        title: "Newcomer",
    },
    Level {
        level: 2,
        xp_required: 60,
        title: "Newcomer",
    },
    Level {
        level: 3,
        xp_required: 150,
        title: "Beginner",
    },
    Level {
        level: 4,
        xp_required: 280,
        title: "Beginner",
    },
    Level {
        level: 5,
        xp_required: 450,
        title: "Explorer",
    },
    Level {
        level: 6,
        xp_required: 670,
        title: "Explorer",
    },
    Level {
        level: 7,
        xp_required: 950,
        title: "Conversant",
    },
    Level {
        level: 8,
        xp_required: 1300,
        title: "Conversant",
    },
    Level {
        level: 9,
        xp_required: 1730,
        title: "Conversant",
    },
    Level {
        level: 10,
        xp_required: 2250,
        title: "Intermediate",
    },
    Level {
        level: 11,
        xp_required: 2880,
        title: "Intermediate",
    },
    Level {
        level: 12,
        xp_required: 3640,
        title: "Intermediate",
    },
    Level {
        level: 13,
        xp_required: 4550,
        title: "Advanced",
    },
    Level {
        level: 14,
        xp_required: 5640,
        title: "Advanced",
    },
    Level {
        level: 15,
        xp_required: 6940,
        title: "Advanced",
    },
    Level {
        level: 16,
        xp_required: 8500,
        title: "Fluent",
    },
    Level {
        level: 17,
        xp_required: 10370,
        title: "Fluent",
    },
    Level {
        level: 18,
        xp_required: 12600,
        title: "Fluent",
    },
    Level {
        level: 19,
        xp_required: 15280,
        title: "Polyglot",
    },
    Level {
        level: 20,
        xp_required: 18500,
        title: "Polyglot",
    },
];

impl Level {
    /// Level entry for the given XP total
    pub fn for_xp(xp: u64) -> &'static Level {
        LEVELS
            .iter()
            .rev()
            .find(|l| xp >= l.xp_required)
            .unwrap_or(&LEVELS[0])
    }

    /// XP needed for next level (None if max level)
    pub fn xp_for_next(current_level: u32) -> Option<u64> {
        LEVELS
            .iter()
            .find(|l| l.level == current_level + 1)
            .map(|l| l.xp_required)
    }

    pub fn max_level() -> u32 {
        LEVELS.last().map(|l| l.level).unwrap_or(1)
    }
}

/// Level number for an XP total
pub fn level_for_xp(xp: u64) -> u32 {
    Level::for_xp(xp).level
}

/// Summary used by status views
#[derive(Debug, Clone, Default)]
pub struct LevelProgress {
    pub total_xp: u64,
    pub level: u32,
    pub title: String,
    /// XP at which the current level started
    pub current_level_xp: u64,
    /// XP needed for next level (None if max)
    pub next_level_xp: Option<u64>,
}

impl LevelProgress {
    pub fn new(total_xp: u64) -> Self {
        let level_info = Level::for_xp(total_xp);

        Self {
            total_xp,
            level: level_info.level,
            title: level_info.title.to_string(),
            current_level_xp: level_info.xp_required,
            next_level_xp: Level::xp_for_next(level_info.level),
        }
    }

    /// Progress towards the next level (0.0 - 1.0)
    pub fn progress_to_next(&self) -> f32 {
        match self.next_level_xp {
            Some(next) => {
                let xp_in_level = self.total_xp - self.current_level_xp;
                let xp_for_level = next - self.current_level_xp;
                if xp_for_level == 0 {
                    1.0
                } else {
                    (xp_in_level as f32) / (xp_for_level as f32)
                }
            }
            None => 1.0,
        }
    }

    pub fn is_max_level(&self) -> bool {
        self.next_level_xp.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_xp() {
        assert_eq!(level_for_xp(0), 1);
        assert_eq!(level_for_xp(59), 1);
        assert_eq!(level_for_xp(60), 2);
        assert_eq!(level_for_xp(150), 3);
        assert_eq!(level_for_xp(18500), 20);
        assert_eq!(level_for_xp(1_000_000), 20);
    }

    #[test]
    fn test_table_is_sorted_with_growing_gaps() {
        for pair in LEVELS.windows(2) {
            assert_eq!(pair[1].level, pair[0].level + 1);
            assert!(pair[1].xp_required > pair[0].xp_required);
        }
        for triple in LEVELS.windows(3) {
            let gap_a = triple[1].xp_required - triple[0].xp_required;
            let gap_b = triple[2].xp_required - triple[1].xp_required;
            assert!(gap_b >= gap_a);
        }
    }

    #[test]
    fn test_level_monotonic_in_xp() {
        let mut previous = level_for_xp(0);
        for xp in (0..25_000).step_by(7) {
            let level = level_for_xp(xp);
            assert!(level >= previous, "level dropped at xp {}", xp);
            previous = level;
        }
    }

    #[test]
    fn test_level_progress() {
        let progress = LevelProgress::new(105); // between 60 and 150
        assert_eq!(progress.level, 2);
        assert!((progress.progress_to_next() - 0.5).abs() < 0.01);

        let maxed = LevelProgress::new(50_000);
        assert!(maxed.is_max_level());
        assert_eq!(maxed.progress_to_next(), 1.0);
        assert_eq!(Level::max_level(), 20);
    }
}
