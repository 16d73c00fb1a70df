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

//! Parse, verify, and persist the filesystem header.

use core::mem::size_of;

use crate::checksum::crc32;
use crate::config::{
	BLOCK_SIZE, LOG_BLOCK, ROOT_BLOCK, SUPERBLOCK_BLOCK, SUPERBLOCK_MAGIC, VERSION_MAJOR, VERSION_MINOR, WEAR_BLOCK,
};
use crate::error::{CoreResult, Error};
use crate::layout::RawSuperblock;
use crate::partition::{block_read, block_write, PartitionIo};

/// An in-memory, validated superblock.
#[derive(Clone, Copy)]
pub struct Superblock {
	pub raw: RawSuperblock,
}

fn with_crc_zeroed(raw: &RawSuperblock) -> RawSuperblock {
	let mut copy = *raw;
	copy.crc32 = 0;
	copy
}

fn compute_crc(raw: &RawSuperblock) -> u32 {
	let zeroed = with_crc_zeroed(raw);
	crc32(bytemuck::bytes_of(&zeroed))
}

impl Superblock {
	/// Synthesizes a fresh header for a partition of `total_blocks`.
	pub fn init(total_blocks: u32) -> Self {
		let mut raw = RawSuperblock {
			magic: SUPERBLOCK_MAGIC,
			version_major: VERSION_MAJOR,
			version_minor: VERSION_MINOR,
			flags: 0,
			block_size: BLOCK_SIZE as u32,
			total_blocks,
			blocks_used: 0,
			root_block: ROOT_BLOCK,
			log_block: LOG_BLOCK,
			wear_block: WEAR_BLOCK,
			boot_count: 0,
			clean_unmount: 1,
			reserved: [0; 3],
			crc32: 0,
		};
		raw.crc32 = compute_crc(&raw);
		Self { raw }
	}

	/// Reads block 0, verifying magic and CRC. Magic mismatch and CRC
	/// mismatch are both fatal on mount.
	pub fn read<P: PartitionIo>(partition: &mut P) -> CoreResult<Self> {
		let mut buf = [0u8; BLOCK_SIZE];
		block_read(partition, SUPERBLOCK_BLOCK, &mut buf)?;
		let raw: RawSuperblock = bytemuck::pod_read_unaligned(&buf[..size_of::<RawSuperblock>()]);
		if raw.magic != SUPERBLOCK_MAGIC {
			return Err(Error::BadMagic);
		}
		if compute_crc(&raw) != raw.crc32 {
			return Err(Error::BadCrc);
		}
		Ok(Self { raw })
	}

	/// Re-verifies magic and CRC without requiring the caller to re-parse.
	/// Used by recovery and `check()`.
	pub fn verify(&self) -> CoreResult<()> {
		if self.raw.magic != SUPERBLOCK_MAGIC {
			return Err(Error::BadMagic);
		}
		if compute_crc(&self.raw) != self.raw.crc32 {
			return Err(Error::BadCrc);
		}
		Ok(())
	}

	/// Computes the CRC, erases sector 0, and writes the header.
	pub fn write<P: PartitionIo>(&mut self, partition: &mut P) -> CoreResult<()> {
		self.raw.crc32 = compute_crc(&self.raw);
		let mut buf = [0u8; BLOCK_SIZE];
		let bytes = bytemuck::bytes_of(&self.raw);
		buf[..bytes.len()].copy_from_slice(bytes);
		block_write(partition, SUPERBLOCK_BLOCK, &buf)?;
		Ok(())
	}

	pub fn total_blocks(&self) -> u32 {
		self.raw.total_blocks
	}

	pub fn blocks_used(&self) -> u32 {
		self.raw.blocks_used
	}

	pub fn is_clean_unmount(&self) -> bool {
		self.raw.clean_unmount != 0
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::partition::ram::RamPartition;
	use crate::partition::PartitionIo;
	use crate::config::SECTOR_SIZE;

	#[test]
	fn init_then_write_then_read_roundtrips() {
		let mut p = RamPartition::new(64 * SECTOR_SIZE);
		let mut sb = Superblock::init(32);
		sb.write(&mut p).unwrap();
		let read_back = Superblock::read(&mut p).unwrap();
		assert_eq!(read_back.total_blocks(), 32);
		assert!(read_back.is_clean_unmount());
	}

	#[test]
	fn corrupted_magic_is_rejected() {
		let mut p = RamPartition::new(64 * SECTOR_SIZE);
		let mut sb = Superblock::init(32);
		sb.write(&mut p).unwrap();
		// Flip the magic directly in the backing store.
		p.write(0, &[0u8; 4]).unwrap();
		assert_eq!(Superblock::read(&mut p), Err(Error::BadMagic));
	}
}
