//! Directional record cache.
//!
//! Holds the records returned by the last block fetch so that sequential and
//! keyed cursor movement can be served locally. The cursor ranges over
//! `-1..=size`:
//!
//! ```text
//!   -1        0      1     ...    size-1     size
//! before   [ rec ][ rec ]  ...  [ rec ]     after
//!  first                                     last
//! ```
//!
//! Positions `0` and `size - 1` are the edges of the cache
//! ([`RecordCache::is_beginning_of_cache`], [`RecordCache::is_end_of_cache`]);
//! `-1` and `size` are the before-first and after-last states. Whether those
//! edges are also the edges of the file is tracked separately by the
//! first/last record flags supplied with each fetch.
//!
//! Lookups that find nothing return `None` or `false`. The only errors are a
//! search key longer than the record key and a failure decoding raw key
//! bytes.

use tracing::trace;

use crate::{
    convert::{Ccsid, CharConverter},
    error::{CacheError, ConversionError},
    key,
    record::{FieldValue, Record},
};

/// Scan direction of the fetch that filled the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Records arrived in file order
    #[default]
    Forward,
    /// Records arrived in reverse file order
    Backward,
}

/// In-memory cursor window over fetched records.
#[derive(Debug, Clone)]
pub struct RecordCache<C = Ccsid> {
    records: Vec<Record>,
    direction: Direction,
    position: isize,
    contains_first: bool,
    contains_last: bool,
    converter: C,
}

impl<C: CharConverter> RecordCache<C> {
    /// Empty cache decoding raw key bytes with `converter`.
    pub fn new(converter: C) -> Self {
        Self {
            records: Vec::new(),
            direction: Direction::Forward,
            position: -1,
            contains_first: false,
            contains_last: false,
            converter,
        }
    }

    /// Replace the contents with a new fetch.
    ///
    /// Backward fetches are stored reversed, so the cache is always in file
    /// order. The cursor lands on the record that was read first: index 0
    /// for a forward fetch, `size - 1` for a backward one.
    pub fn refresh(
        &mut self,
        mut records: Vec<Record>,
        direction: Direction,
        contains_first: bool,
        contains_last: bool,
    ) {
        if direction == Direction::Backward {
            records.reverse();
        }

        self.records = records;
        self.direction = direction;

        if self.records.is_empty() {
            self.position = -1;
            self.contains_first = false;
            self.contains_last = false;
        } else {
            self.position = match direction {
                Direction::Forward => 0,
                Direction::Backward => self.len() - 1,
            };
            self.contains_first = contains_first;
            self.contains_last = contains_last;
        }

        trace!(size = self.records.len(), ?direction, position = self.position, "cache refreshed");
    }

    /// Insert one record at the front or the back.
    ///
    /// Inserting at the front shifts the cursor so it stays on the same
    /// record. A cursor after the last record stays after it.
    pub fn add(&mut self, record: Record, at_end: bool) {
        if at_end {
            let was_after_last = self.is_after_last();
            self.records.push(record);
            if was_after_last {
                self.position = self.len();
            }
        } else {
            self.records.insert(0, record);
            if self.position >= 0 {
                self.position += 1;
            }
        }
    }

    /// Drop every record and reset to the empty state.
    pub fn clear(&mut self) {
        self.refresh(Vec::new(), Direction::Forward, false, false);
    }

    /// Number of cached records.
    pub fn size(&self) -> usize {
        self.records.len()
    }

    /// Whether the cache holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Cursor position in `-1..=size`.
    pub fn current_position(&self) -> isize {
        self.position
    }

    /// Direction of the last fetch.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether index 0 is the first record of the file.
    pub fn contains_first_record(&self) -> bool {
        self.contains_first
    }

    /// Whether index `size - 1` is the last record of the file.
    pub fn contains_last_record(&self) -> bool {
        self.contains_last
    }

    /// Record under the cursor.
    pub fn get_current(&self) -> Option<&Record> {
        usize::try_from(self.position).ok().and_then(|i| self.records.get(i))
    }

    /// Advance one record. At the last record the cursor moves to after-last
    /// and `None` is returned; it never moves past `size`.
    pub fn get_next(&mut self) -> Option<&Record> {
        if self.records.is_empty() || self.position >= self.len() {
            return None;
        }

        self.position += 1;
        self.get_current()
    }

    /// Step back one record. At the first record the cursor moves to
    /// before-first and `None` is returned; it never moves below `-1`.
    pub fn get_previous(&mut self) -> Option<&Record> {
        if self.records.is_empty() || self.position < 0 {
            return None;
        }

        self.position -= 1;
        self.get_current()
    }

    /// Move to index 0.
    pub fn get_first(&mut self) -> Option<&Record> {
        if self.records.is_empty() {
            return None;
        }

        self.position = 0;
        self.get_current()
    }

    /// Move to index `size - 1`.
    pub fn get_last(&mut self) -> Option<&Record> {
        if self.records.is_empty() {
            return None;
        }

        self.position = self.len() - 1;
        self.get_current()
    }

    /// Index of the record with the given relative record number.
    pub fn find_record(&self, record_number: u32) -> Option<usize> {
        self.records.iter().position(|r| r.record_number() == record_number)
    }

    /// Scan from the cursor for the nearest record matching `key`.
    ///
    /// The record under the cursor is checked first. Forward scans then move
    /// toward the end of the cache, backward scans toward the start.
    pub fn find_record_by_key(
        &self,
        key: &[FieldValue],
        search_forward: bool,
    ) -> Result<Option<usize>, CacheError> {
        let Some(first) = self.records.first() else {
            return Ok(None);
        };

        if key.len() > first.key_len() {
            return Err(CacheError::KeyTooLong {
                key_fields: key.len(),
                record_key_fields: first.key_len(),
            });
        }

        let last = self.records.len() - 1;
        let start = usize::try_from(self.position).unwrap_or(0).min(last);

        if search_forward {
            for i in start..=last {
                if self.compare_keys(key, &self.records[i])? {
                    return Ok(Some(i));
                }
            }
        } else {
            for i in (0..=start).rev() {
                if self.compare_keys(key, &self.records[i])? {
                    return Ok(Some(i));
                }
            }
        }

        Ok(None)
    }

    /// Match `key` against one record using this cache's converter.
    pub fn compare_keys(&self, key: &[FieldValue], record: &Record) -> Result<bool, ConversionError> {
        key::compare_keys(key, record, &self.converter)
    }

    /// Move the cursor to the record with the given record number.
    ///
    /// Leaves the cursor alone and returns `false` if it is not cached.
    pub fn set_position(&mut self, record_number: u32) -> bool {
        match self.find_record(record_number) {
            Some(i) => {
                self.position = i as isize;
                true
            },
            None => false,
        }
    }

    /// Move the cursor to the first cached record matching `key`.
    ///
    /// A key longer than the record key is reported as not found.
    pub fn set_position_by_key(&mut self, key: &[FieldValue]) -> Result<bool, CacheError> {
        let saved = self.position;
        self.position = -1;

        match self.find_record_by_key(key, true) {
            Ok(Some(i)) => {
                self.position = i as isize;
                Ok(true)
            },
            Ok(None) | Err(CacheError::KeyTooLong { .. }) => {
                self.position = saved;
                Ok(false)
            },
            Err(e) => {
                self.position = saved;
                Err(e)
            },
        }
    }

    /// Cursor is on index 0.
    pub fn is_beginning_of_cache(&self) -> bool {
        !self.records.is_empty() && self.position == 0
    }

    /// Cursor is on index `size - 1`.
    pub fn is_end_of_cache(&self) -> bool {
        !self.records.is_empty() && self.position == self.len() - 1
    }

    /// Cursor is before the first record.
    pub fn is_before_first(&self) -> bool {
        self.position == -1
    }

    /// Cursor is after the last record.
    pub fn is_after_last(&self) -> bool {
        !self.records.is_empty() && self.position == self.len()
    }

    /// Put the cursor before the first record.
    pub fn set_before_first(&mut self) {
        self.position = -1;
    }

    /// Put the cursor after the last record. No-op on an empty cache.
    pub fn set_after_last(&mut self) {
        if !self.records.is_empty() {
            self.position = self.len();
        }
    }

    fn len(&self) -> isize {
        self.records.len() as isize
    }
}

impl Default for RecordCache<Ccsid> {
    fn default() -> Self {
        Self::new(Ccsid::default())
    }
}
