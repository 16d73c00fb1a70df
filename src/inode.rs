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

//! Serialize, validate, create, read, write and delete per-file metadata
//! records.

use core::mem::size_of;

use crate::allocator::BlockAllocator;
use crate::checksum::crc32;
use crate::config::{BLOCK_SIZE, INODE_MAGIC, MAX_FILE_BLOCKS, NAME_MAX};
use crate::error::{CoreResult, Error};
use crate::layout::RawInode;
use crate::partition::{block_read, block_write, PartitionIo};
use crate::wear::WearTable;

fn with_crc_zeroed(raw: &RawInode) -> RawInode {
	let mut copy = *raw;
	copy.crc32 = 0;
	copy
}

fn compute_crc(raw: &RawInode) -> u32 {
	crc32(bytemuck::bytes_of(&with_crc_zeroed(raw)))
}

fn encode_name(name: &str) -> [u8; NAME_MAX] {
	let mut buf = [0u8; NAME_MAX];
	let n = name.len().min(NAME_MAX);
	buf[..n].copy_from_slice(&name.as_bytes()[..n]);
	buf
}

/// An in-memory inode: the validated record plus convenience accessors.
#[derive(Clone, Copy)]
pub struct Inode {
	pub raw: RawInode,
}

impl Inode {
	/// Builds a fresh, empty inode for `filename` with both ticks set to
	/// `now`.
	pub fn new(inode_number: u32, filename: &str, now: u64) -> Self {
		let raw = RawInode {
			created_tick: now,
			modified_tick: now,
			magic: INODE_MAGIC,
			inode_number,
			size: 0,
			blocks_used: 0,
			mode: 0,
			flags: 0,
			block_list: [0u32; MAX_FILE_BLOCKS],
			name: encode_name(filename),
			crc32: 0,
		};
		Self { raw }
	}

	/// Reads the inode at block `b`, verifying magic and CRC distinctly.
	pub fn read<P: PartitionIo>(partition: &mut P, b: u32) -> CoreResult<Self> {
		let mut buf = [0u8; BLOCK_SIZE];
		block_read(partition, b, &mut buf)?;
		let raw: RawInode = bytemuck::pod_read_unaligned(&buf[..size_of::<RawInode>()]);
		if raw.magic != INODE_MAGIC {
			return Err(Error::BadMagic);
		}
		if compute_crc(&raw) != raw.crc32 {
			return Err(Error::BadCrc);
		}
		Ok(Self { raw })
	}

	/// Updates the modified tick, recomputes the CRC, and writes the inode
	/// to block `b`. On a sector-initiating write the caller is responsible
	/// for having erased via [`crate::partition::block_write`].
	pub fn write<P: PartitionIo>(&mut self, partition: &mut P, b: u32, now: u64) -> CoreResult<()> {
		self.raw.modified_tick = now;
		self.raw.crc32 = compute_crc(&self.raw);
		let mut buf = [0u8; BLOCK_SIZE];
		let bytes = bytemuck::bytes_of(&self.raw);
		buf[..bytes.len()].copy_from_slice(bytes);
		block_write(partition, b, &buf)?;
		Ok(())
	}

	pub fn size(&self) -> usize {
		self.raw.size as usize
	}

	pub fn blocks_used(&self) -> usize {
		self.raw.blocks_used as usize
	}

	pub fn block_list(&self) -> &[u32] {
		&self.raw.block_list[..self.blocks_used()]
	}

	/// Appends a freshly allocated data block to the direct block list.
	/// Fails with [`Error::FileTooLarge`] past [`MAX_FILE_BLOCKS`].
	pub fn append_block(&mut self, block: u32) -> CoreResult<()> {
		let n = self.blocks_used();
		if n >= MAX_FILE_BLOCKS {
			return Err(Error::FileTooLarge);
		}
		self.raw.block_list[n] = block;
		self.raw.blocks_used += 1;
		Ok(())
	}

	pub fn set_size(&mut self, size: usize) {
		self.raw.size = size as u32;
	}

	/// Frees every data block this inode owns and resets size/count to
	/// zero. Used by `TRUNC` and by [`delete`].
	pub fn truncate_to_empty(&mut self, allocator: &mut BlockAllocator) -> CoreResult<()> {
		for i in 0..self.blocks_used() {
			let b = self.raw.block_list[i];
			if b != 0 {
				allocator.free(b)?;
			}
		}
		self.raw.block_list = [0u32; MAX_FILE_BLOCKS];
		self.raw.blocks_used = 0;
		self.raw.size = 0;
		Ok(())
	}

	/// Reads the inode at `b`, frees every block it owns, then frees `b`
	/// itself.
	pub fn delete<P: PartitionIo>(partition: &mut P, allocator: &mut BlockAllocator, b: u32) -> CoreResult<()> {
		let inode = Self::read(partition, b)?;
		for i in 0..inode.blocks_used() {
			let block = inode.raw.block_list[i];
			if block != 0 {
				allocator.free(block)?;
			}
		}
		allocator.free(b)
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::partition::ram::RamPartition;
	use crate::config::SECTOR_SIZE;

	#[test]
	fn create_write_read_roundtrip() {
		let mut p = RamPartition::new(64 * SECTOR_SIZE);
		let mut inode = Inode::new(1, "a.txt", 1000);
		inode.set_size(5);
		inode.write(&mut p, 4, 1001).unwrap();
		let read_back = Inode::read(&mut p, 4).unwrap();
		assert_eq!(read_back.size(), 5);
		assert_eq!(read_back.raw.modified_tick, 1001);
	}

	#[test]
	fn corrupted_crc_is_rejected() {
		let mut p = RamPartition::new(64 * SECTOR_SIZE);
		let mut inode = Inode::new(1, "a.txt", 1000);
		inode.write(&mut p, 4, 1000).unwrap();
		let mut buf = [0u8; BLOCK_SIZE];
		crate::partition::block_read(&mut p, 4, &mut buf).unwrap();
		buf[0] ^= 0xFF;
		crate::partition::PartitionIo::write(&mut p, 4 * BLOCK_SIZE as u64, &buf).unwrap();
		assert_eq!(Inode::read(&mut p, 4), Err(Error::BadCrc));
	}

	#[test]
	fn append_block_respects_cap() {
		let mut inode = Inode::new(1, "a.txt", 0);
		for i in 0..MAX_FILE_BLOCKS as u32 {
			inode.append_block(i + 10).unwrap();
		}
		assert_eq!(inode.append_block(9999), Err(Error::FileTooLarge));
	}
}
