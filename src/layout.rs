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

//! Byte-exact, `#[repr(C)]` on-disk record layouts.
//!
//! Field order follows largest-alignment-first so the compiler never
//! inserts implicit padding; every struct's size is already a multiple of
//! its own alignment.

use bytemuck::{Pod, Zeroable};

use crate::config::{MAX_ENTRIES, MAX_FILE_BLOCKS, NAME_MAX, ORDER};

/// The filesystem header, persisted at block 0.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy)]
pub struct RawSuperblock {
	pub magic: u32,
	pub version_major: u16,
	pub version_minor: u16,
	pub flags: u32,
	pub block_size: u32,
	pub total_blocks: u32,
	pub blocks_used: u32,
	pub root_block: u32,
	pub log_block: u32,
	pub wear_block: u32,
	pub boot_count: u32,
	pub clean_unmount: u8,
	pub reserved: [u8; 3],
	pub crc32: u32,
}

/// A single directory-index entry: a name and the block holding its inode.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy)]
pub struct RawEntry {
	pub inode_block: u32,
	pub name_hash: u32,
	pub name: [u8; NAME_MAX],
}

/// Node kind stored in [`RawBtreeNode::node_type`]. Only `LEAF` is produced
/// at the target scale (spec calls for a single-root index); `INTERNAL` is
/// reserved layout space for a future splitting implementation.
pub const NODE_TYPE_LEAF: u32 = 0;
pub const NODE_TYPE_INTERNAL: u32 = 1;

/// The directory index's single root node.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy)]
pub struct RawBtreeNode {
	pub magic: u32,
	pub node_type: u32,
	pub entry_count: u32,
	pub parent_block: u32,
	pub children: [u32; ORDER],
	pub entries: [RawEntry; MAX_ENTRIES],
	pub crc32: u32,
}

/// Per-file metadata, one block per inode.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy)]
pub struct RawInode {
	pub created_tick: u64,
	pub modified_tick: u64,
	pub magic: u32,
	pub inode_number: u32,
	pub size: u32,
	pub blocks_used: u32,
	pub mode: u32,
	pub flags: u32,
	pub block_list: [u32; MAX_FILE_BLOCKS],
	pub name: [u8; NAME_MAX],
	pub crc32: u32,
}

/// Transaction-log operation codes. Reserved for a future idempotent-replay
/// implementation; recovery only inspects them, it never replays.
pub const TXN_OP_NONE: u32 = 0;
pub const TXN_OP_BEGIN: u32 = 1;
pub const TXN_OP_WRITE: u32 = 2;
pub const TXN_OP_DELETE: u32 = 3;
pub const TXN_OP_COMMIT: u32 = 4;

/// A single transaction-log entry.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy)]
pub struct RawTxEntry {
	pub timestamp: u64,
	pub op: u32,
	pub inode_number: u32,
	pub block_number: u32,
	pub reserved: u32,
}
