use std::collections::{HashMap, HashSet};

use crate::config::DEFAULT_SECTION_WIDTH;
use crate::level::ObjectId;

/// Upper bound on section indices; positions further right share the last
/// section.
pub const MAX_SECTION: usize = (1 << 20) - 1;

/// Objects bucketed by horizontal position into fixed-width sections.
///
/// Only occupied sections hold a bucket. `section_count` is a high-water mark
/// (one past the furthest section ever used) and never shrinks. An object id
/// is expected in exactly one section at a time; the caller tracks which one.
#[derive(Debug, Clone)]
pub struct SectionIndex {
    section_width: f32,
    sections: HashMap<usize, HashSet<ObjectId>>,
    section_count: usize,
    len: usize,
}

impl Default for SectionIndex {
    fn default() -> Self {
        Self::new(DEFAULT_SECTION_WIDTH)
    }
}

impl SectionIndex {
    pub fn new(section_width: f32) -> Self {
        let section_width = if section_width.is_finite() && section_width > 0.0 {
            section_width
        } else {
            DEFAULT_SECTION_WIDTH
        };
        Self {
            section_width,
            sections: HashMap::new(),
            section_count: 0,
            len: 0,
        }
    }

    pub fn section_width(&self) -> f32 {
        self.section_width
    }

    /// Section for a world x coordinate, biased one section to the left and
    /// clamped to `0..=MAX_SECTION`.
    pub fn bucket_for(&self, x: f32) -> usize {
        let raw = (x / self.section_width).floor() - 1.0;
        if raw.is_nan() || raw <= 0.0 {
            0
        } else {
            (raw as usize).min(MAX_SECTION)
        }
    }

    /// Raises the section count to cover `section` without allocating a
    /// bucket for it.
    pub fn ensure_capacity(&mut self, section: usize) {
        self.section_count = self.section_count.max(section.saturating_add(1));
    }

    pub fn insert(&mut self, id: ObjectId, section: usize) {
        self.ensure_capacity(section);
        if self.sections.entry(section).or_default().insert(id) {
            self.len += 1;
        }
    }

    pub fn remove(&mut self, id: ObjectId, section: usize) -> bool {
        let Some(bucket) = self.sections.get_mut(&section) else {
            return false;
        };
        let removed = bucket.remove(&id);
        if bucket.is_empty() {
            self.sections.remove(&section);
        }
        if removed {
            self.len -= 1;
        }
        removed
    }

    /// Moves `id` from `from` to `to`. A missing source entry is tolerated;
    /// the object still ends up in `to`.
    pub fn relocate(&mut self, id: ObjectId, from: usize, to: usize) {
        if from == to {
            self.insert(id, to);
            return;
        }
        self.remove(id, from);
        self.insert(id, to);
    }

    pub fn objects_in_section(&self, section: usize) -> impl Iterator<Item = ObjectId> + '_ {
        self.sections
            .get(&section)
            .into_iter()
            .flat_map(|bucket| bucket.iter().copied())
    }

    pub fn contains(&self, id: ObjectId, section: usize) -> bool {
        self.sections
            .get(&section)
            .is_some_and(|bucket| bucket.contains(&id))
    }

    pub fn section_count(&self) -> usize {
        self.section_count
    }

    /// Number of sections currently holding at least one object.
    pub fn occupied_sections(&self) -> usize {
        self.sections.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
