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

//! CoreFS is an embedded filesystem for small NOR-flash partitions, engineered
//! for reliability under sudden power loss.
//!
//! It exposes a POSIX-like file API (open/read/write/seek/close,
//! exists/unlink) over a flat namespace stored in a single flash partition.
//! The filesystem does not interpret nested paths, does not support links or
//! per-user permissions, and serves exactly one mounted instance at a time;
//! the [`CoreFs`] value *is* that instance, owned by the caller.
//!
//! The crate is `no_std` (plus `alloc`): it never touches a clock or a
//! logger directly. A caller supplies a [`PartitionIo`](partition::PartitionIo)
//! implementation, a [`Clock`](clock::Clock), and optionally a
//! [`TraceSink`](trace::TraceSink).

#![no_std]

extern crate alloc;

mod allocator;
mod checksum;
pub mod clock;
pub mod config;
mod dir;
pub mod error;
mod inode;
pub mod layout;
pub mod partition;
mod recovery;
mod superblock;
pub mod trace;
mod txlog;
pub mod wear;

mod file;
mod lifecycle;

pub use clock::Clock;
pub use error::{CoreResult, Error, IoFault};
pub use file::{FileHandle, OpenFlags, SeekWhence};
pub use lifecycle::format;
pub use partition::PartitionIo;
pub use recovery::{CheckReport, RecoveryOutcome};
pub use trace::{TraceEvent, TraceSink};

use alloc::boxed::Box;

use allocator::BlockAllocator;
use config::MAX_OPEN_FILES;
use dir::Directory;
use superblock::Superblock;
use txlog::TransactionLog;
use wear::WearTable;

/// Filesystem usage reported by [`CoreFs::info`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Info {
	pub total_blocks: u32,
	pub used_blocks: u32,
	pub free_blocks: u32,
	pub block_size: u32,
	pub mount_count: u32,
}

/// The mounted filesystem instance.
///
/// There is exactly one of these per mounted partition; the "global
/// context" the on-disk format implies is simply this value, owned by
/// whoever called [`CoreFs::mount`].
pub struct CoreFs<P: PartitionIo, C: Clock> {
	pub(crate) partition: P,
	pub(crate) clock: C,
	pub(crate) superblock: Superblock,
	pub(crate) allocator: BlockAllocator,
	pub(crate) wear: WearTable,
	pub(crate) directory: Directory,
	pub(crate) txlog: TransactionLog,
	pub(crate) open_files: [Option<FileHandle>; MAX_OPEN_FILES],
	pub(crate) next_inode: u32,
	pub(crate) mounted: bool,
	pub(crate) trace: Option<Box<dyn TraceSink>>,
}

impl<P: PartitionIo, C: Clock> CoreFs<P, C> {
	pub(crate) fn now(&self) -> u64 {
		self.clock.now_ms()
	}

	pub(crate) fn trace(&self, event: TraceEvent) {
		if let Some(sink) = &self.trace {
			sink.event(event);
		}
	}

	/// Attaches a trace sink, replacing any previously attached one.
	pub fn set_trace_sink(&mut self, sink: Box<dyn TraceSink>) {
		self.trace = Some(sink);
	}

	/// Whether the filesystem is currently mounted. Always `true` for a
	/// live [`CoreFs`] value obtained from [`CoreFs::mount`]; exposed for
	/// parity with the documented API surface.
	pub fn is_mounted(&self) -> bool {
		self.mounted
	}

	/// Reports total/used/free blocks and the mount count.
	pub fn info(&self) -> CoreResult<Info> {
		if !self.mounted {
			return Err(Error::NotMounted);
		}
		let total = self.superblock.total_blocks();
		let used = self.allocator.blocks_used();
		Ok(Info {
			total_blocks: total,
			used_blocks: used,
			free_blocks: total - used,
			block_size: config::BLOCK_SIZE as u32,
			mount_count: self.superblock.raw.boot_count,
		})
	}

	/// Runs the stronger, on-demand consistency check.
	pub fn check(&self) -> CoreResult<CheckReport> {
		if !self.mounted {
			return Err(Error::NotMounted);
		}
		let report = recovery::check(&self.superblock, &self.wear);
		if let Err(cause) = report {
			self.trace(TraceEvent::CheckFailed { cause });
		}
		report
	}

	/// The size-dependent geometry derived from the mounted partition's
	/// block count.
	pub fn geometry(&self) -> config::Geometry {
		config::Geometry::for_total_blocks(self.superblock.total_blocks())
	}

	/// Reclaims the backing partition without performing a clean unmount,
	/// i.e. without setting `clean_unmount` or flushing open handles. A
	/// host process has no equivalent call: a real power cut simply stops
	/// the process. This exists so host-side tests can simulate one.
	#[doc(hidden)]
	pub fn into_partition_without_unmount(self) -> P {
		self.partition
	}
}
