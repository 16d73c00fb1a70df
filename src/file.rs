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

//! Open/read/write/seek/close, plus name-level `unlink`/`exists`.

use alloc::string::{String, ToString};
use bitflags::bitflags;

use crate::clock::Clock;
use crate::config::{BLOCK_SIZE, MAX_FILE_BLOCKS, MAX_OPEN_FILES};
use crate::error::{CoreResult, Error};
use crate::inode::Inode;
use crate::partition::{block_read, block_write, PartitionIo};
use crate::{CoreFs, TraceEvent};

bitflags! {
	/// Bits accepted by [`CoreFs::open`].
	#[derive(Debug, Clone, Copy, PartialEq, Eq)]
	pub struct OpenFlags: u32 {
		const RDONLY = 0x01;
		const WRONLY = 0x02;
		const RDWR = 0x03;
		const CREAT = 0x04;
		const TRUNC = 0x08;
		const APPEND = 0x10;
	}
}

impl OpenFlags {
	fn readable(self) -> bool {
		self.intersects(Self::RDONLY | Self::RDWR)
	}

	fn writable(self) -> bool {
		self.intersects(Self::WRONLY | Self::RDWR)
	}
}

/// Reference point for [`CoreFs::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekWhence {
	Set = 0,
	Cur = 1,
	End = 2,
}

/// An open file: an owned in-memory copy of the inode plus cursor state.
pub struct FileHandle {
	pub(crate) path: String,
	pub(crate) inode: Inode,
	pub(crate) inode_block: u32,
	pub(crate) offset: usize,
	pub(crate) flags: OpenFlags,
	pub(crate) dirty: bool,
}

impl FileHandle {
	/// The path this handle was opened with.
	pub fn path(&self) -> &str {
		&self.path
	}
}

fn block_index_and_offset(offset: usize) -> (usize, usize) {
	(offset / BLOCK_SIZE, offset % BLOCK_SIZE)
}

impl<P: PartitionIo, C: Clock> CoreFs<P, C> {
	fn find_free_slot(&self) -> CoreResult<usize> {
		self.open_files
			.iter()
			.position(Option::is_none)
			.ok_or(Error::TooManyOpen)
	}

	/// Opens `path`, creating it if `CREAT` is set and it's absent.
	pub fn open(&mut self, path: &str, flags: OpenFlags) -> CoreResult<usize> {
		if !self.mounted {
			return Err(Error::NotMounted);
		}
		if !path.starts_with('/') {
			return Err(Error::InvalidArg);
		}
		let slot = self.find_free_slot()?;

		let existing = self.directory.find(path)?;
		let (inode_block, inode) = match existing {
			Some(b) => (b, Inode::read(&mut self.partition, b)?),
			None => {
				if !flags.contains(OpenFlags::CREAT) {
					return Err(Error::NotFound);
				}
				self.create_file(path, flags)?
			}
		};

		let mut handle = FileHandle {
			path: path.to_string(),
			inode,
			inode_block,
			offset: 0,
			flags,
			dirty: false,
		};

		if flags.contains(OpenFlags::TRUNC) {
			handle.inode.truncate_to_empty(&mut self.allocator)?;
			handle.dirty = true;
		}
		if flags.contains(OpenFlags::APPEND) {
			handle.offset = handle.inode.size();
		}
		if handle.dirty {
			let now = self.now();
			handle.inode.write(&mut self.partition, handle.inode_block, now)?;
			handle.dirty = false;
		}

		self.open_files[slot] = Some(handle);
		Ok(slot)
	}

	/// Creates a fresh inode for `path` and inserts it into the directory
	/// index, rolling back the allocation if the insert fails.
	fn create_file(&mut self, path: &str, _flags: OpenFlags) -> CoreResult<(u32, Inode)> {
		let name = path.strip_prefix('/').ok_or(Error::InvalidArg)?;
		let block = self.allocator.allocate(&self.wear)?;
		let now = self.now();
		self.next_inode += 1;
		let mut inode = Inode::new(self.next_inode, name, now);
		if let Err(e) = inode.write(&mut self.partition, block, now) {
			let _ = self.allocator.free(block);
			return Err(e);
		}
		if let Err(e) = self.directory.insert(path, block) {
			// Roll back: free the block and drop the in-memory inode.
			let _ = self.allocator.free(block);
			return Err(e);
		}
		if let Err(e) = self.directory.save(&mut self.partition) {
			let _ = self.directory.delete(path);
			let _ = self.allocator.free(block);
			return Err(e);
		}
		Ok((block, inode))
	}

	fn handle(&self, h: usize) -> CoreResult<&FileHandle> {
		self.open_files.get(h).and_then(Option::as_ref).ok_or(Error::InvalidArg)
	}

	fn handle_mut(&mut self, h: usize) -> CoreResult<&mut FileHandle> {
		self.open_files
			.get_mut(h)
			.and_then(Option::as_mut)
			.ok_or(Error::InvalidArg)
	}

	/// Reads up to `buf.len()` bytes at the handle's current offset.
	/// Returns 0 at EOF.
	pub fn read(&mut self, h: usize, buf: &mut [u8]) -> CoreResult<usize> {
		let partition = &mut self.partition;
		let handle = self.open_files.get_mut(h).and_then(Option::as_mut).ok_or(Error::InvalidArg)?;
		if !handle.flags.readable() {
			return Err(Error::InvalidArg);
		}
		let remaining = handle.inode.size().saturating_sub(handle.offset);
		let n = buf.len().min(remaining);
		let mut done = 0;
		let mut scratch = [0u8; BLOCK_SIZE];
		while done < n {
			let (block_idx, within) = block_index_and_offset(handle.offset);
			let block = handle.inode.block_list()[block_idx];
			block_read(partition, block, &mut scratch)?;
			let chunk = (BLOCK_SIZE - within).min(n - done);
			buf[done..done + chunk].copy_from_slice(&scratch[within..within + chunk]);
			handle.offset += chunk;
			done += chunk;
		}
		Ok(done)
	}

	/// Writes `buf` at the handle's current offset, growing the file as
	/// needed. Returns the number of bytes actually written, which may be
	/// less than `buf.len()` if [`MAX_FILE_BLOCKS`] is reached.
	pub fn write(&mut self, h: usize, buf: &[u8]) -> CoreResult<usize> {
		if !self.handle(h)?.flags.writable() {
			return Err(Error::InvalidArg);
		}
		let inode_number = self.handle(h)?.inode.raw.inode_number;
		let now = self.now();
		self.txlog.begin(now);

		let mut done = 0;
		let mut scratch = [0u8; BLOCK_SIZE];
		while done < buf.len() {
			let offset = self.handle(h)?.offset;
			let (block_idx, within) = block_index_and_offset(offset);
			let chunk = (BLOCK_SIZE - within).min(buf.len() - done);

			if block_idx >= self.handle(h)?.inode.blocks_used() {
				if block_idx >= MAX_FILE_BLOCKS {
					break;
				}
				let new_block = match self.allocator.allocate(&self.wear) {
					Ok(b) => b,
					Err(_) => {
						self.trace(TraceEvent::AllocationExhausted);
						break;
					}
				};
				let handle = self.handle_mut(h)?;
				if handle.inode.append_block(new_block).is_err() {
					let _ = self.allocator.free(new_block);
					break;
				}
			}

			let handle = self.handle(h)?;
			let block = handle.inode.block_list()[block_idx];
			let partial = chunk < BLOCK_SIZE;
			if partial {
				block_read(&mut self.partition, block, &mut scratch)?;
			} else {
				scratch = [0u8; BLOCK_SIZE];
			}
			scratch[within..within + chunk].copy_from_slice(&buf[done..done + chunk]);
			block_write(&mut self.partition, block, &scratch)?;
			self.txlog.log(crate::layout::TXN_OP_WRITE, inode_number, block, now);

			let handle = self.handle_mut(h)?;
			handle.offset += chunk;
			if handle.offset > handle.inode.size() {
				handle.inode.set_size(handle.offset);
			}
			handle.dirty = true;
			done += chunk;
		}

		if done > 0 {
			let now = self.now();
			let (block, mut inode) = {
				let handle = self.handle(h)?;
				(handle.inode_block, handle.inode)
			};
			inode.write(&mut self.partition, block, now)?;
			let handle = self.handle_mut(h)?;
			handle.inode = inode;
			handle.dirty = false;
		}
		let now = self.now();
		self.txlog.commit(&mut self.partition, now)?;
		// The log block shares sector 1 with the wear table; the commit's
		// erase wipes it, so re-persist it in the same breath.
		self.wear.save(&mut self.partition, crate::config::WEAR_BLOCK)?;
		Ok(done)
	}

	/// Recomputes the offset per SET/CUR/END semantics. `0 <= new <= size`
	/// must hold.
	pub fn seek(&mut self, h: usize, offset: i64, whence: SeekWhence) -> CoreResult<usize> {
		let handle = self.handle(h)?;
		let base = match whence {
			SeekWhence::Set => 0i64,
			SeekWhence::Cur => handle.offset as i64,
			SeekWhence::End => handle.inode.size() as i64,
		};
		let new_offset = base.checked_add(offset).ok_or(Error::InvalidArg)?;
		if new_offset < 0 || new_offset as usize > handle.inode.size() {
			return Err(Error::InvalidArg);
		}
		let handle = self.handle_mut(h)?;
		handle.offset = new_offset as usize;
		Ok(handle.offset)
	}

	/// Current offset.
	pub fn tell(&self, h: usize) -> CoreResult<usize> {
		Ok(self.handle(h)?.offset)
	}

	/// Current file size.
	pub fn size(&self, h: usize) -> CoreResult<usize> {
		Ok(self.handle(h)?.inode.size())
	}

	/// Flushes a dirty inode and releases the handle's slot.
	pub fn close(&mut self, h: usize) -> CoreResult<()> {
		let handle = self.open_files.get(h).and_then(Option::as_ref).ok_or(Error::InvalidArg)?;
		if handle.dirty {
			let now = self.now();
			let block = handle.inode_block;
			let mut inode = handle.inode;
			inode.write(&mut self.partition, block, now)?;
		}
		self.open_files[h] = None;
		Ok(())
	}

	/// Finds the inode via the index, deletes it (freeing its blocks), then
	/// removes the index entry. If the index-delete step fails after the
	/// inode is already gone, the file is nonetheless gone from the
	/// namespace's perspective; see the crate-level error-propagation notes.
	pub fn unlink(&mut self, path: &str) -> CoreResult<()> {
		if !self.mounted {
			return Err(Error::NotMounted);
		}
		let block = self.directory.find(path)?.ok_or(Error::NotFound)?;
		let now = self.now();
		self.txlog.begin(now);
		self.txlog.log(crate::layout::TXN_OP_DELETE, 0, block, now);
		Inode::delete(&mut self.partition, &mut self.allocator, block)?;
		self.directory.delete(path)?;
		self.directory.save(&mut self.partition)?;
		self.txlog.commit(&mut self.partition, now)?;
		// See the matching note in `write`: the commit's erase shares a
		// sector with the wear table.
		self.wear.save(&mut self.partition, crate::config::WEAR_BLOCK)?;
		Ok(())
	}

	/// Pure index lookup.
	pub fn exists(&self, path: &str) -> CoreResult<bool> {
		if !self.mounted {
			return Err(Error::NotMounted);
		}
		Ok(self.directory.find(path)?.is_some())
	}

	/// Force-closes every open handle, flushing dirty inodes. Used by
	/// [`CoreFs::unmount`].
	pub(crate) fn close_all(&mut self) -> CoreResult<()> {
		for i in 0..MAX_OPEN_FILES {
			if self.open_files[i].is_some() {
				self.close(i)?;
			}
		}
		Ok(())
	}
}
