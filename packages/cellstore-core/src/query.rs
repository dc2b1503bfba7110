//! Read-side ordering primitives over the materialized cell table.
//!
//! Everything here is a pure borrow of one snapshot; callers always observe
//! a fully applied state, never a half-applied event.

use std::ops::Bound;

use crate::cell::Cell;
use crate::ids::CellId;
use crate::snapshot::Snapshot;

impl Snapshot {
    /// All live cells in canonical notebook order (ascending fractional
    /// index, id as tie-break).
    pub fn ordered_cells(&self) -> Vec<&Cell> {
        self.order
            .iter()
            .filter_map(|(_, id)| self.cells.get(id))
            .collect()
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn first_cell(&self) -> Option<&Cell> {
        self.order.first().and_then(|(_, id)| self.cells.get(id))
    }

    pub fn last_cell(&self) -> Option<&Cell> {
        self.order.last().and_then(|(_, id)| self.cells.get(id))
    }

    /// Up to `limit` cells strictly before `key`, nearest first (descending).
    pub fn cells_before(&self, key: &str, limit: usize) -> Vec<&Cell> {
        self.order
            .range(..(key.to_owned(), CellId::new("")))
            .rev()
            .take(limit)
            .filter_map(|(_, id)| self.cells.get(id))
            .collect()
    }

    /// Up to `limit` cells strictly after `key`, nearest first (ascending).
    pub fn cells_after(&self, key: &str, limit: usize) -> Vec<&Cell> {
        self.order
            .range((
                Bound::Excluded((key.to_owned(), CellId::new(""))),
                Bound::Unbounded,
            ))
            .skip_while(|(k, _)| k.as_str() == key)
            .take(limit)
            .filter_map(|(_, id)| self.cells.get(id))
            .collect()
    }

    /// Inclusive range scan for virtualized rendering; open bounds scan from
    /// the start / to the end.
    pub fn cells_in_range(&self, start: Option<&str>, end: Option<&str>) -> Vec<&Cell> {
        let lower = match start {
            Some(key) => Bound::Included((key.to_owned(), CellId::new(""))),
            None => Bound::Unbounded,
        };
        self.order
            .range((lower, Bound::Unbounded))
            .take_while(|(k, _)| end.map_or(true, |end| k.as_str() <= end))
            .filter_map(|(_, id)| self.cells.get(id))
            .collect()
    }

    /// Immediate predecessor and successor of a cell in the current order,
    /// `None` at either end. Returns `None` for an unknown id.
    pub fn neighbors_of(&self, id: &CellId) -> Option<(Option<&Cell>, Option<&Cell>)> {
        let cell = self.cells.get(id)?;
        let entry = (cell.fractional_index.clone(), id.clone());
        let before = self
            .order
            .range(..entry.clone())
            .next_back()
            .and_then(|(_, id)| self.cells.get(id));
        let after = self
            .order
            .range((Bound::Excluded(entry), Bound::Unbounded))
            .next()
            .and_then(|(_, id)| self.cells.get(id));
        Some((before, after))
    }
}
