// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The temporal-offset sliding window (§4.5, §8 invariant 6): for a GOP of display order `TR`,
//! the entry at presentation position `p` in coded order carries `temporal_offset = TR[p] - p`.
//! The engine fills a window of up to 128 slots per GOP and verifies every slot is filled when the
//! GOP closes, as the codec writer helpers (C11) discover each frame's `temporal_reference`.

pub const WINDOW_SIZE: usize = 128;

#[derive(Clone)]
pub struct TemporalOffsetWindow {
    slots: Vec<Option<i8>>,
    gop_start: i64,
}

impl TemporalOffsetWindow {
    pub fn new(gop_start: i64) -> Self {
        TemporalOffsetWindow { slots: vec![None; WINDOW_SIZE], gop_start }
    }

    pub fn reset(&mut self, gop_start: i64) {
        self.slots.iter_mut().for_each(|s| *s = None);
        self.gop_start = gop_start;
    }

    pub fn gop_start(&self) -> i64 {
        self.gop_start
    }

    /// Sets the temporal offset for `position`, given as an absolute edit-unit position within the
    /// current GOP.
    pub fn set(&mut self, position: i64, temporal_offset: i8) -> bool {
        let slot = (position - self.gop_start) as usize;
        if slot >= WINDOW_SIZE {
            return false;
        }
        self.slots[slot] = Some(temporal_offset);
        true
    }

    pub fn get(&self, position: i64) -> Option<i8> {
        let slot = (position - self.gop_start) as usize;
        self.slots.get(slot).copied().flatten()
    }

    /// Verifies every slot in `[gop_start, gop_start + len)` is filled (§8 invariant 6). Returns
    /// the positions of any unfilled slots so the caller can log them and write nulls.
    pub fn verify_closed(&self, len: usize) -> Vec<i64> {
        (0..len.min(WINDOW_SIZE))
            .filter(|&i| self.slots[i].is_none())
            .map(|i| self.gop_start + i as i64)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_window_fill_and_closure() {
        let mut window = TemporalOffsetWindow::new(100);
        for i in 0..12 {
            window.set(100 + i, (i % 3) as i8 - 1);
        }
        assert!(window.verify_closed(12).is_empty());
        assert_eq!(window.get(103), Some(0));
    }

    #[test]
    fn verify_incomplete_gop_reports_missing_slots() {
        let mut window = TemporalOffsetWindow::new(0);
        window.set(0, 0);
        window.set(2, 1);
        let missing = window.verify_closed(3);
        assert_eq!(missing, vec![1]);
    }
}
