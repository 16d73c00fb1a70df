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

//! Format / mount / unmount orchestration.
//!
//! The block-allocation bitmap is never persisted on its own: the on-disk
//! layout reserves only four metadata blocks (superblock, directory root,
//! log, wear table). At mount, the bitmap is reconstructed by walking the
//! directory index and every live inode's block list: a block is used iff
//! it is reserved or referenced from one of those places.

use crate::allocator::BlockAllocator;
use crate::clock::Clock;
use crate::config::{METADATA_BLOCKS, SECTOR_SIZE};
use crate::dir::Directory;
use crate::error::{CoreResult, Error};
use crate::inode::Inode;
use crate::partition::{block_count, PartitionIo};
use crate::recovery;
use crate::superblock::Superblock;
use crate::trace::TraceEvent;
use crate::txlog::TransactionLog;
use crate::wear::WearTable;
use crate::CoreFs;

/// Formats `partition` with a fresh, empty filesystem. Refuses unless the
/// partition's size and base address are both sector-aligned.
pub fn format<P: PartitionIo>(partition: &mut P) -> CoreResult<()> {
	if partition.size() % SECTOR_SIZE as u64 != 0 || partition.address() % SECTOR_SIZE as u64 != 0 {
		return Err(Error::InvalidArg);
	}
	let total_blocks = block_count(partition);
	if total_blocks <= METADATA_BLOCKS {
		return Err(Error::InvalidArg);
	}

	let mut superblock = Superblock::init(total_blocks);
	let allocator = BlockAllocator::new(total_blocks);
	let wear = WearTable::new_zeroed(total_blocks);
	let mut directory = Directory::new_empty();

	// Block 0 and block 1 share sector 0: writing the superblock first
	// erases the sector, then the directory root is written into the
	// companion block the erase just cleared. The reverse order would
	// have the superblock's own erase wipe the root straight back out.
	superblock.raw.blocks_used = allocator.blocks_used();
	superblock.write(partition)?;
	directory.save(partition)?;
	wear.save(partition, crate::config::WEAR_BLOCK)?;

	Ok(())
}

/// Rebuilds the allocation bitmap by walking the directory and every live
/// inode's block list, and returns alongside it the next inode number to
/// hand out (one past the highest one found on disk).
fn rebuild_allocator<P: PartitionIo>(
	partition: &mut P,
	total_blocks: u32,
	directory: &Directory,
) -> CoreResult<(BlockAllocator, u32)> {
	let mut allocator = BlockAllocator::new(total_blocks);
	for b in 0..METADATA_BLOCKS {
		allocator.mark_used_during_scan(b);
	}
	let mut max_inode_number = 0;
	for inode_block in directory.inode_blocks() {
		allocator.mark_used_during_scan(inode_block);
		if let Ok(inode) = Inode::read(partition, inode_block) {
			max_inode_number = max_inode_number.max(inode.raw.inode_number);
			for &data_block in inode.block_list() {
				if data_block != 0 {
					allocator.mark_used_during_scan(data_block);
				}
			}
		}
	}
	Ok((allocator, max_inode_number + 1))
}

impl<P: PartitionIo, C: Clock> CoreFs<P, C> {
	/// Mounts `partition`, running the crash-recovery scan if the last
	/// unmount was not clean.
	pub fn mount(mut partition: P, clock: C) -> CoreResult<Self> {
		let mut superblock = Superblock::read(&mut partition)?;

		let mut recovery_outcome = None;
		if !superblock.is_clean_unmount() {
			let outcome = recovery::recover(&mut partition, &superblock)?;
			recovery_outcome = Some(outcome);
		}

		let total_blocks = superblock.total_blocks();
		let wear = WearTable::load(&mut partition, crate::config::WEAR_BLOCK, total_blocks)?;
		let mut directory = Directory::load(&mut partition)?;
		let (allocator, next_inode) = rebuild_allocator(&mut partition, total_blocks, &directory)?;

		superblock.raw.boot_count += 1;
		superblock.raw.clean_unmount = 0;
		superblock.raw.blocks_used = allocator.blocks_used();
		superblock.write(&mut partition)?;
		// The write above erases the whole of sector 0; re-save the root
		// into its companion block so it isn't left at 0xFF.
		directory.save(&mut partition)?;

		let mut fs = CoreFs {
			partition,
			clock,
			superblock,
			allocator,
			wear,
			directory,
			txlog: TransactionLog::new(),
			open_files: core::array::from_fn(|_| None),
			next_inode,
			mounted: true,
			trace: None,
		};

		fs.trace(TraceEvent::Mounted {
			mount_count: fs.superblock.raw.boot_count,
			clean: recovery_outcome.is_none(),
		});
		if let Some(outcome) = recovery_outcome {
			fs.trace(TraceEvent::RecoveryRan {
				interrupted_txn: outcome.interrupted_txn,
			});
		}

		Ok(fs)
	}

	/// Force-closes every open handle, marks the unmount clean, and returns
	/// the partition to the caller.
	pub fn unmount(mut self) -> CoreResult<P> {
		self.close_all()?;
		self.superblock.raw.clean_unmount = 1;
		self.superblock.raw.blocks_used = self.allocator.blocks_used();
		self.superblock.write(&mut self.partition)?;
		// Same sector-0 erase as in `mount`: re-persist the root so the
		// next mount's `Directory::load` doesn't see a wiped block.
		self.directory.save(&mut self.partition)?;
		self.mounted = false;
		self.trace(TraceEvent::Unmounted);
		Ok(self.partition)
	}
}
