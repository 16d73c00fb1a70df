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

//! The partition collaborator: a byte-addressable, sector-erased flash
//! range, and the block-level view the core builds on top of it.

use crate::config::{BLOCK_SIZE, SECTOR_SIZE};
use crate::error::{CoreResult, Error, IoFault};

/// The interface the core requires of the underlying flash partition.
///
/// Implementors guarantee: `write` only ever flips bits from `1` to `0`
/// (the caller is responsible for ensuring destination bytes are
/// currently all-ones, i.e. freshly erased); `erase_range` sets every byte
/// in range to `0xFF`.
pub trait PartitionIo {
	/// Reads `buf.len()` bytes starting at `offset_bytes`.
	fn read(&mut self, offset_bytes: u64, buf: &mut [u8]) -> CoreResult<()>;
	/// Writes `buf` starting at `offset_bytes`. The destination must already
	/// be erased.
	fn write(&mut self, offset_bytes: u64, buf: &[u8]) -> CoreResult<()>;
	/// Erases `len_bytes` bytes starting at `offset_bytes`. `offset_bytes`
	/// must be sector-aligned and `len_bytes` a multiple of [`SECTOR_SIZE`].
	fn erase_range(&mut self, offset_bytes: u64, len_bytes: u64) -> CoreResult<()>;
	/// Total addressable size of the partition, in bytes.
	fn size(&self) -> u64;
	/// Absolute flash address of the partition's first byte, used only by
	/// the optional [`block_flash_addr`] debug accessor.
	fn address(&self) -> u64;
}

/// Total number of blocks a partition of `size` bytes can hold.
pub fn block_count<P: PartitionIo + ?Sized>(partition: &P) -> u32 {
	(partition.size() / BLOCK_SIZE as u64) as u32
}

/// Byte offset of block `b` within the partition.
pub fn block_offset(b: u32) -> u64 {
	b as u64 * BLOCK_SIZE as u64
}

/// Absolute flash address of block `b`.
pub fn block_flash_addr<P: PartitionIo + ?Sized>(partition: &P, b: u32) -> u64 {
	partition.address() + block_offset(b)
}

/// Whether block `b` begins a sector, i.e. whether writing it requires an
/// erase first.
pub fn block_starts_sector(b: u32) -> bool {
	block_offset(b) % SECTOR_SIZE as u64 == 0
}

fn check_bounds<P: PartitionIo + ?Sized>(partition: &P, b: u32) -> CoreResult<()> {
	if b >= block_count(partition) {
		return Err(Error::Io(IoFault::OutOfRange));
	}
	Ok(())
}

/// Reads block `b` into `buf`, which must be exactly [`BLOCK_SIZE`] bytes.
pub fn block_read<P: PartitionIo + ?Sized>(partition: &mut P, b: u32, buf: &mut [u8; BLOCK_SIZE]) -> CoreResult<()> {
	check_bounds(partition, b)?;
	partition.read(block_offset(b), buf)
}

/// Writes `buf` (exactly [`BLOCK_SIZE`] bytes) to block `b`. Erases the
/// enclosing sector first if `b` begins that sector.
///
/// A sector holds two blocks, so erasing it would also wipe `b`'s sibling
/// (the other block sharing the sector) to `0xFF`. To avoid that, the
/// sibling's current content is read back before the erase and rewritten
/// immediately after, so a write to one half of a sector never destroys
/// the other half. Returns whether an erase was performed, so callers can
/// update wear counts.
pub fn block_write<P: PartitionIo + ?Sized>(partition: &mut P, b: u32, buf: &[u8; BLOCK_SIZE]) -> CoreResult<bool> {
	check_bounds(partition, b)?;
	if !block_starts_sector(b) {
		partition.write(block_offset(b), buf)?;
		return Ok(false);
	}

	let sibling = b + 1;
	let sibling_in_range = sibling < block_count(partition);
	let mut sibling_buf = [0u8; BLOCK_SIZE];
	if sibling_in_range {
		partition.read(block_offset(sibling), &mut sibling_buf)?;
	}

	let sector_off = block_offset(b);
	partition.erase_range(sector_off, SECTOR_SIZE as u64)?;
	partition.write(block_offset(b), buf)?;
	if sibling_in_range {
		partition.write(block_offset(sibling), &sibling_buf)?;
	}
	Ok(true)
}

/// An in-memory [`PartitionIo`] used for the test suite and host-side
/// simulation. Not part of the on-flash core; gated behind the `std`
/// feature, analogous to a device-backed stand-in for real flash.
#[cfg(feature = "std")]
pub mod ram {
	use super::*;
	use std::vec;
	use std::vec::Vec;

	/// A partition backed by a `Vec<u8>`, entirely erased (all `0xFF`) on
	/// construction.
	pub struct RamPartition {
		data: Vec<u8>,
	}

	impl RamPartition {
		/// Creates a partition of `size_bytes`. `size_bytes` need not be
		/// sector-aligned: deliberately so, to let tests exercise
		/// `format`'s own alignment rejection.
		pub fn new(size_bytes: usize) -> Self {
			Self {
				data: vec![0xFFu8; size_bytes],
			}
		}
	}

	impl PartitionIo for RamPartition {
		fn read(&mut self, offset_bytes: u64, buf: &mut [u8]) -> CoreResult<()> {
			let off = offset_bytes as usize;
			let end = off.checked_add(buf.len()).ok_or(Error::Io(IoFault::OutOfRange))?;
			if end > self.data.len() {
				return Err(Error::Io(IoFault::OutOfRange));
			}
			buf.copy_from_slice(&self.data[off..end]);
			Ok(())
		}

		fn write(&mut self, offset_bytes: u64, buf: &[u8]) -> CoreResult<()> {
			let off = offset_bytes as usize;
			let end = off.checked_add(buf.len()).ok_or(Error::Io(IoFault::OutOfRange))?;
			if end > self.data.len() {
				return Err(Error::Io(IoFault::OutOfRange));
			}
			self.data[off..end].copy_from_slice(buf);
			Ok(())
		}

		fn erase_range(&mut self, offset_bytes: u64, len_bytes: u64) -> CoreResult<()> {
			let off = offset_bytes as usize;
			let len = len_bytes as usize;
			let end = off.checked_add(len).ok_or(Error::Io(IoFault::OutOfRange))?;
			if end > self.data.len() || off % SECTOR_SIZE != 0 || len % SECTOR_SIZE != 0 {
				return Err(Error::Io(IoFault::OutOfRange));
			}
			for byte in &mut self.data[off..end] {
				*byte = 0xFF;
			}
			Ok(())
		}

		fn size(&self) -> u64 {
			self.data.len() as u64
		}

		fn address(&self) -> u64 {
			0
		}
	}
}
