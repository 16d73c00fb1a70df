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

//! The configurable trace facility.
//!
//! The core does not log on its own account and never terminates the
//! process; a caller that wants visibility into lifecycle and allocator
//! events attaches a [`TraceSink`] to the context. With none attached the
//! core is silent.

use crate::error::Error;

/// A lifecycle or allocator event the core may report to an attached sink.
#[derive(Debug, Clone, Copy)]
pub enum TraceEvent {
	/// A fresh filesystem was synthesized on the partition.
	Formatted { total_blocks: u32 },
	/// The filesystem was mounted.
	Mounted { mount_count: u32, clean: bool },
	/// The recovery scan ran at mount time and reached this outcome.
	RecoveryRan { interrupted_txn: bool },
	/// The filesystem was unmounted.
	Unmounted,
	/// The block allocator could not satisfy a request.
	AllocationExhausted,
	/// `check()` observed a fault.
	CheckFailed { cause: Error },
}

/// Receives [`TraceEvent`]s emitted by the core.
pub trait TraceSink {
	/// Called synchronously, on the caller's thread, for each event.
	fn event(&self, event: TraceEvent);
}
