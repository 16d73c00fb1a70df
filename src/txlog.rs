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

//! The in-memory transaction journal and its atomic flush to the log
//! block.
//!
//! The log records the *intent* of a multi-step mutation so recovery can
//! tell complete sequences from interrupted ones. It does not make writes
//! atomic by itself: copy-on-write at the block-allocator level (a freed
//! block's content survives until reallocated) is what actually protects
//! the filesystem from a crash mid-mutation. The log is diagnostic, never
//! replayed.

use core::mem::size_of;

use bytemuck::Zeroable;

use crate::config::{BLOCK_SIZE, LOG_BLOCK};
use crate::error::CoreResult;
use crate::layout::{RawTxEntry, TXN_OP_BEGIN, TXN_OP_COMMIT, TXN_OP_NONE};
use crate::partition::{block_read, block_write, PartitionIo};

/// Number of [`RawTxEntry`] records a single log block can hold.
pub const LOG_CAPACITY: usize = BLOCK_SIZE / size_of::<RawTxEntry>();

/// The in-memory op journal for the currently open transaction, if any.
pub struct TransactionLog {
	entries: alloc::vec::Vec<RawTxEntry>,
	active: bool,
}

impl TransactionLog {
	pub fn new() -> Self {
		Self {
			entries: alloc::vec::Vec::with_capacity(LOG_CAPACITY),
			active: false,
		}
	}

	/// Clears the in-memory log and appends a BEGIN entry. Re-entering with
	/// an already-open transaction rolls back first.
	pub fn begin(&mut self, now: u64) {
		if self.active {
			self.rollback();
		}
		self.entries.clear();
		self.entries.push(RawTxEntry {
			timestamp: now,
			op: TXN_OP_BEGIN,
			inode_number: 0,
			block_number: 0,
			reserved: 0,
		});
		self.active = true;
	}

	/// Appends an entry describing one step of the open transaction.
	/// Overflow past [`LOG_CAPACITY`] silently drops further entries: this
	/// is a documented capacity limit on how many ops one transaction may
	/// span, not a fault.
	pub fn log(&mut self, op: u32, inode_number: u32, block_number: u32, now: u64) {
		if !self.active || self.entries.len() >= LOG_CAPACITY {
			return;
		}
		self.entries.push(RawTxEntry {
			timestamp: now,
			op,
			inode_number,
			block_number,
			reserved: 0,
		});
	}

	/// Appends COMMIT and flushes the log block as a single atomic sector
	/// operation.
	pub fn commit<P: PartitionIo>(&mut self, partition: &mut P, now: u64) -> CoreResult<()> {
		if self.active && self.entries.len() < LOG_CAPACITY {
			self.entries.push(RawTxEntry {
				timestamp: now,
				op: TXN_OP_COMMIT,
				inode_number: 0,
				block_number: 0,
				reserved: 0,
			});
		}
		self.flush(partition)?;
		self.active = false;
		self.entries.clear();
		Ok(())
	}

	/// Discards the in-memory log without touching flash.
	pub fn rollback(&mut self) {
		self.active = false;
		self.entries.clear();
	}

	fn flush<P: PartitionIo>(&self, partition: &mut P) -> CoreResult<()> {
		let mut buf = [0u8; BLOCK_SIZE];
		let mut padded = [RawTxEntry::zeroed(); LOG_CAPACITY];
		let n = self.entries.len().min(LOG_CAPACITY);
		padded[..n].copy_from_slice(&self.entries[..n]);
		let bytes = bytemuck::bytes_of(&padded);
		buf[..bytes.len()].copy_from_slice(bytes);
		block_write(partition, LOG_BLOCK, &buf)?;
		Ok(())
	}
}

impl Default for TransactionLog {
	fn default() -> Self {
		Self::new()
	}
}

/// Outcome of scanning a persisted log block at mount/recovery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogScan {
	/// Whether the last BEGIN in the log was not followed by a COMMIT.
	pub interrupted: bool,
}

/// Reads the log block and classifies it without replaying anything.
pub fn scan<P: PartitionIo>(partition: &mut P) -> CoreResult<LogScan> {
	let mut buf = [0u8; BLOCK_SIZE];
	block_read(partition, LOG_BLOCK, &mut buf)?;
	// Copy into a properly aligned array rather than casting the raw byte
	// buffer in place: `buf` has no alignment guarantee beyond 1, but
	// `RawTxEntry` requires 8 (its `timestamp: u64` field).
	let mut entries = [RawTxEntry::zeroed(); LOG_CAPACITY];
	let dst: &mut [u8] = bytemuck::cast_slice_mut(&mut entries);
	dst.copy_from_slice(&buf[..dst.len()]);
	let mut open = false;
	for entry in &entries {
		match entry.op {
			TXN_OP_BEGIN => open = true,
			TXN_OP_COMMIT => open = false,
			TXN_OP_NONE => break,
			_ => {}
		}
	}
	Ok(LogScan { interrupted: open })
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::partition::ram::RamPartition;
	use crate::config::SECTOR_SIZE;
	use crate::layout::TXN_OP_WRITE;

	#[test]
	fn committed_transaction_scans_clean() {
		let mut p = RamPartition::new(64 * SECTOR_SIZE);
		let mut log = TransactionLog::new();
		log.begin(1);
		log.log(TXN_OP_WRITE, 1, 10, 2);
		log.commit(&mut p, 3).unwrap();
		assert_eq!(scan(&mut p).unwrap(), LogScan { interrupted: false });
	}

	#[test]
	fn begin_without_commit_scans_interrupted() {
		let mut p = RamPartition::new(64 * SECTOR_SIZE);
		// Simulate a crash mid-transaction: write BEGIN directly without a
		// matching commit by writing the block ourselves.
		let mut log = TransactionLog::new();
		log.begin(1);
		log.flush(&mut p).unwrap();
		assert_eq!(scan(&mut p).unwrap(), LogScan { interrupted: true });
	}

	#[test]
	fn reentering_begin_rolls_back_prior_txn() {
		let mut log = TransactionLog::new();
		log.begin(1);
		log.log(TXN_OP_WRITE, 1, 10, 2);
		log.begin(3);
		assert_eq!(log.entries.len(), 1);
	}
}
