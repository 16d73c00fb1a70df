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

//! The flat root directory index: a single B-tree leaf mapping
//! path to inode-block.
//!
//! Only the root leaf is ever produced (no splitting is implemented), so
//! "the directory index" and "the root node" are the same value here.

use core::mem::size_of;

use crate::checksum::crc32;
use crate::config::{BLOCK_SIZE, BTREE_MAGIC, NAME_MAX, ROOT_BLOCK};
use crate::error::{CoreResult, Error};
use crate::layout::{RawBtreeNode, RawEntry, NODE_TYPE_LEAF};
use crate::partition::{block_read, block_write, PartitionIo};

const FNV_OFFSET_BASIS: u32 = 2166136261;
const FNV_PRIME: u32 = 16777619;

/// FNV-1a over a filename's bytes.
fn fnv1a(bytes: &[u8]) -> u32 {
	let mut hash = FNV_OFFSET_BASIS;
	for &byte in bytes {
		hash ^= byte as u32;
		hash = hash.wrapping_mul(FNV_PRIME);
	}
	hash
}

/// Splits `path` into its stored filename, validating the leading slash and
/// the fixed-width cap.
fn filename_of(path: &str) -> CoreResult<&str> {
	let name = path.strip_prefix('/').ok_or(Error::InvalidArg)?;
	if name.len() >= NAME_MAX {
		return Err(Error::NameTooLong);
	}
	Ok(name)
}

fn with_crc_zeroed(raw: &RawBtreeNode) -> RawBtreeNode {
	let mut copy = *raw;
	copy.crc32 = 0;
	copy
}

fn compute_crc(raw: &RawBtreeNode) -> u32 {
	crc32(bytemuck::bytes_of(&with_crc_zeroed(raw)))
}

fn encode_name(name: &str) -> [u8; NAME_MAX] {
	let mut buf = [0u8; NAME_MAX];
	buf[..name.len()].copy_from_slice(name.as_bytes());
	buf
}

/// The in-memory root node of the directory index.
pub struct Directory {
	raw: RawBtreeNode,
}

impl Directory {
	/// Builds a fresh, empty root node.
	pub fn new_empty() -> Self {
		let mut raw = RawBtreeNode::zeroed_node();
		raw.magic = BTREE_MAGIC;
		raw.node_type = NODE_TYPE_LEAF;
		Self { raw }
	}

	/// Reads the root block and verifies its magic. An empty node with
	/// valid magic is permitted.
	pub fn load<P: PartitionIo>(partition: &mut P) -> CoreResult<Self> {
		let mut buf = [0u8; BLOCK_SIZE];
		block_read(partition, ROOT_BLOCK, &mut buf)?;
		let raw: RawBtreeNode = bytemuck::pod_read_unaligned(&buf[..size_of::<RawBtreeNode>()]);
		if raw.magic != BTREE_MAGIC {
			return Err(Error::BadMagic);
		}
		if compute_crc(&raw) != raw.crc32 {
			return Err(Error::BadCrc);
		}
		Ok(Self { raw })
	}

	/// Persists the root node, computing its CRC first.
	pub fn save<P: PartitionIo>(&mut self, partition: &mut P) -> CoreResult<()> {
		self.raw.crc32 = compute_crc(&self.raw);
		let mut buf = [0u8; BLOCK_SIZE];
		let bytes = bytemuck::bytes_of(&self.raw);
		buf[..bytes.len()].copy_from_slice(bytes);
		block_write(partition, ROOT_BLOCK, &buf)?;
		Ok(())
	}

	fn count(&self) -> usize {
		self.raw.entry_count as usize
	}

	/// The inode block of every live entry, in no particular order. Used
	/// only to reconstruct the allocation bitmap at mount time.
	pub fn inode_blocks(&self) -> impl Iterator<Item = u32> + '_ {
		self.raw.entries[..self.count()].iter().map(|e| e.inode_block)
	}

	/// Linear scan for a matching hash *and* byte-identical name.
	pub fn find(&self, path: &str) -> CoreResult<Option<u32>> {
		let name = filename_of(path)?;
		let hash = fnv1a(name.as_bytes());
		let encoded = encode_name(name);
		for entry in &self.raw.entries[..self.count()] {
			if entry.name_hash == hash && entry.name == encoded {
				return Ok(Some(entry.inode_block));
			}
		}
		Ok(None)
	}

	/// Inserts `path -> inode_block` at the first free slot. Fails with
	/// [`Error::Exists`] on duplicate, [`Error::NameTooLong`] on an
	/// over-width name, [`Error::OutOfSpace`] on a full node.
	pub fn insert(&mut self, path: &str, inode_block: u32) -> CoreResult<()> {
		let name = filename_of(path)?;
		if self.find(path)?.is_some() {
			return Err(Error::Exists);
		}
		let count = self.count();
		if count >= self.raw.entries.len() {
			return Err(Error::OutOfSpace);
		}
		self.raw.entries[count] = RawEntry {
			inode_block,
			name_hash: fnv1a(name.as_bytes()),
			name: encode_name(name),
		};
		self.raw.entry_count += 1;
		Ok(())
	}

	/// Removes `path`'s entry, compacting the tail over the gap. Fails with
	/// [`Error::NotFound`] if absent.
	pub fn delete(&mut self, path: &str) -> CoreResult<()> {
		let name = filename_of(path)?;
		let hash = fnv1a(name.as_bytes());
		let encoded = encode_name(name);
		let count = self.count();
		let idx = self.raw.entries[..count]
			.iter()
			.position(|e| e.name_hash == hash && e.name == encoded)
			.ok_or(Error::NotFound)?;
		for i in idx..count - 1 {
			self.raw.entries[i] = self.raw.entries[i + 1];
		}
		self.raw.entries[count - 1] = RawEntry::zeroed_entry();
		self.raw.entry_count -= 1;
		Ok(())
	}
}

impl RawBtreeNode {
	fn zeroed_node() -> Self {
		bytemuck::Zeroable::zeroed()
	}
}

impl RawEntry {
	fn zeroed_entry() -> Self {
		bytemuck::Zeroable::zeroed()
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::partition::ram::RamPartition;
	use crate::config::SECTOR_SIZE;

	#[test]
	fn insert_find_delete_roundtrip() {
		let mut dir = Directory::new_empty();
		dir.insert("/a.txt", 10).unwrap();
		dir.insert("/b.txt", 20).unwrap();
		assert_eq!(dir.find("/a.txt").unwrap(), Some(10));
		assert_eq!(dir.find("/b.txt").unwrap(), Some(20));
		assert_eq!(dir.find("/c.txt").unwrap(), None);
		dir.delete("/a.txt").unwrap();
		assert_eq!(dir.find("/a.txt").unwrap(), None);
		assert_eq!(dir.find("/b.txt").unwrap(), Some(20));
	}

	#[test]
	fn duplicate_insert_fails_exists() {
		let mut dir = Directory::new_empty();
		dir.insert("/a.txt", 10).unwrap();
		assert_eq!(dir.insert("/a.txt", 99), Err(Error::Exists));
	}

	#[test]
	fn node_capacity_enforced() {
		let mut dir = Directory::new_empty();
		for i in 0..crate::config::MAX_ENTRIES {
			dir.insert(&alloc::format!("/f{i}.txt"), i as u32 + 10).unwrap();
		}
		assert_eq!(dir.insert("/overflow.txt", 1), Err(Error::OutOfSpace));
	}

	#[test]
	fn name_too_long_rejected() {
		let dir = Directory::new_empty();
		let max_ok = "a".repeat(NAME_MAX - 1);
		let too_long = "a".repeat(NAME_MAX);
		assert!(filename_of(&alloc::format!("/{max_ok}")).is_ok());
		assert_eq!(filename_of(&alloc::format!("/{too_long}")), Err(Error::NameTooLong));
		let _ = dir;
	}

	#[test]
	fn save_then_load_roundtrips() {
		let mut p = RamPartition::new(64 * SECTOR_SIZE);
		let mut dir = Directory::new_empty();
		dir.insert("/a.txt", 10).unwrap();
		dir.save(&mut p).unwrap();
		let loaded = Directory::load(&mut p).unwrap();
		assert_eq!(loaded.find("/a.txt").unwrap(), Some(10));
	}
}
