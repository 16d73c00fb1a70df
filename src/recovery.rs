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

//! The startup recovery scan and the on-demand consistency check.

use crate::error::CoreResult;
use crate::partition::PartitionIo;
use crate::superblock::Superblock;
use crate::txlog;
use crate::wear::WearHealth;

/// Outcome of the recovery scan run at mount time when the superblock's
/// clean-unmount flag was zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryOutcome {
	/// Whether the log showed an interrupted (BEGIN without COMMIT)
	/// transaction. No replay is performed either way: the prior on-disk
	/// state is already intact, because every write is copy-on-write at
	/// the block-allocator level.
	pub interrupted_txn: bool,
}

/// Runs the best-effort recovery scan: reads the log, classifies it, then
/// re-verifies the superblock CRC. CRC mismatch aborts the mount.
pub fn recover<P: PartitionIo>(partition: &mut P, superblock: &Superblock) -> CoreResult<RecoveryOutcome> {
	let scan = txlog::scan(partition)?;
	superblock.verify()?;
	Ok(RecoveryOutcome {
		interrupted_txn: scan.interrupted,
	})
}

/// Result of the stronger, on-demand `check()` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckReport {
	pub wear: WearHealth,
}

/// Verifies superblock magic and CRC and reports wear-health deviation.
/// Deeper checks (B-tree consistency, per-inode CRC sweep, orphan-block
/// detection) are left as implementer extensions.
pub fn check(superblock: &Superblock, wear: &crate::wear::WearTable) -> CoreResult<CheckReport> {
	superblock.verify()?;
	Ok(CheckReport {
		wear: wear.health_check(),
	})
}
