/*
 * Copyright 2026 Luc Lenôtre
 *
 * This file is part of CoreFS.
 *
 * CoreFS is free software: you can redistribute it and/or modify it under the
 * terms of the GNU General Public License as published by the Free Software
 * Foundation, either version 3 of the License, or (at your option) any later
 * version.
 *
 * CoreFS is distributed in the hope that it will be useful, but WITHOUT ANY
 * WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR
 * A PARTICULAR PURPOSE. See the GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License along with
 * CoreFS. If not, see <https://www.gnu.org/licenses/>.
 */

//! Per-block erase counts and the wear-leveling selection policy.

use alloc::vec;
use alloc::vec::Vec;

use crate::config::{BLOCK_SIZE, WEAR_UNHEALTHY_DEVIATION};
use crate::error::CoreResult;
use crate::partition::{block_read, block_write, PartitionIo};

/// Summary produced by [`WearTable::health_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WearHealth {
	pub min: u16,
	pub max: u16,
	pub avg: u16,
	/// Whether `max - min` exceeds [`WEAR_UNHEALTHY_DEVIATION`].
	pub unhealthy: bool,
}

/// The per-block erase-count array. Persisted to the wear-count block as a
/// flat array, truncated to fit one block if the table would be larger.
pub struct WearTable {
	counts: Vec<u16>,
}

impl WearTable {
	/// Builds a fresh, all-zero table for `block_count` blocks.
	pub fn new_zeroed(block_count: u32) -> Self {
		Self {
			counts: vec![0u16; block_count as usize],
		}
	}

	/// Number of blocks this table tracks.
	pub fn len(&self) -> u32 {
		self.counts.len() as u32
	}

	/// Current erase count of block `b`.
	pub fn count(&self, b: u32) -> u16 {
		self.counts[b as usize]
	}

	/// Increments the erase count of block `b`, saturating at `u16::MAX`.
	pub fn increment(&mut self, b: u32) {
		let c = &mut self.counts[b as usize];
		*c = c.saturating_add(1);
	}

	/// Among blocks `b >= from` for which `is_free(b)` holds, returns the one
	/// with the smallest wear count, tie-broken by lowest index. This is the
	/// filesystem's sole wear-leveling policy: a block is not reused until
	/// every free block of equal-or-lower wear has been exhausted.
	pub fn best_free_block(&self, from: u32, mut is_free: impl FnMut(u32) -> bool) -> Option<u32> {
		let mut best: Option<(u16, u32)> = None;
		for b in from..self.len() {
			if !is_free(b) {
				continue;
			}
			let w = self.count(b);
			match best {
				Some((bw, _)) if w >= bw => {}
				_ => best = Some((w, b)),
			}
		}
		best.map(|(_, b)| b)
	}

	/// Reports min/max/avg wear and whether the deviation is unhealthy.
	pub fn health_check(&self) -> WearHealth {
		let min = self.counts.iter().copied().min().unwrap_or(0);
		let max = self.counts.iter().copied().max().unwrap_or(0);
		let sum: u64 = self.counts.iter().map(|&c| c as u64).sum();
		let avg = if self.counts.is_empty() {
			0
		} else {
			(sum / self.counts.len() as u64) as u16
		};
		WearHealth {
			min,
			max,
			avg,
			unhealthy: max.saturating_sub(min) > WEAR_UNHEALTHY_DEVIATION,
		}
	}

	/// Persists the table to `block`, truncating to fit a single block if
	/// the table itself is larger.
	pub fn save<P: PartitionIo>(&self, partition: &mut P, block: u32) -> CoreResult<()> {
		let mut buf = [0u8; BLOCK_SIZE];
		let bytes = bytemuck::cast_slice(&self.counts);
		let n = bytes.len().min(BLOCK_SIZE);
		buf[..n].copy_from_slice(&bytes[..n]);
		block_write(partition, block, &buf)?;
		Ok(())
	}

	/// Loads a table of `block_count` entries back from `block`.
	pub fn load<P: PartitionIo>(partition: &mut P, block: u32, block_count: u32) -> CoreResult<Self> {
		let mut buf = [0u8; BLOCK_SIZE];
		block_read(partition, block, &mut buf)?;
		let mut counts = vec![0u16; block_count as usize];
		let bytes = bytemuck::cast_slice_mut(&mut counts);
		let n = bytes.len().min(BLOCK_SIZE);
		bytes[..n].copy_from_slice(&buf[..n]);
		Ok(Self { counts })
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn picks_lowest_wear_then_lowest_index() {
		let mut t = WearTable::new_zeroed(8);
		t.increment(4);
		t.increment(4);
		t.increment(5);
		// 4..8 all free; 6 and 7 are tied at zero wear, lowest index wins.
		assert_eq!(t.best_free_block(4, |_| true), Some(6));
	}

	#[test]
	fn health_check_flags_large_deviation() {
		let mut t = WearTable::new_zeroed(4);
		for _ in 0..2000 {
			t.increment(0);
		}
		let h = t.health_check();
		assert!(h.unhealthy);
		assert_eq!(h.min, 0);
		assert_eq!(h.max, 2000);
	}
}
