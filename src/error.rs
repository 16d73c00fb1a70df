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

//! The error type returned by every fallible core operation.

use thiserror::Error;

/// A fault reported by the partition collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoFault {
	/// The requested byte range or block index falls outside the partition.
	OutOfRange,
	/// The partition driver reported a failure performing the access.
	Device,
}

/// Every way a core operation can fail.
///
/// The core never panics and never terminates the process: every fallible
/// path returns one of these.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
	/// A caller-supplied argument is invalid (e.g. a path not starting with `/`).
	#[error("invalid argument")]
	InvalidArg,
	/// No entry with the given path exists.
	#[error("not found")]
	NotFound,
	/// An entry with the given path already exists.
	#[error("already exists")]
	Exists,
	/// The filesystem is not currently mounted.
	#[error("not mounted")]
	NotMounted,
	/// The filesystem is already mounted.
	#[error("already mounted")]
	AlreadyMounted,
	/// A persisted structure's magic number did not match.
	#[error("bad magic")]
	BadMagic,
	/// A persisted structure's CRC-32 did not match its content.
	#[error("bad crc")]
	BadCrc,
	/// No free block satisfies the request.
	#[error("out of space")]
	OutOfSpace,
	/// The open-file table is full.
	#[error("too many open files")]
	TooManyOpen,
	/// A filename exceeds [`crate::config::NAME_MAX`].
	#[error("name too long")]
	NameTooLong,
	/// A file has reached [`crate::config::MAX_FILE_BLOCKS`].
	#[error("file too large")]
	FileTooLarge,
	/// The requested operation is declared but not implemented.
	#[error("unsupported")]
	Unsupported,
	/// The partition layer faulted.
	#[error("i/o fault: {0:?}")]
	Io(IoFault),
}

/// Result alias used by every public operation.
pub type CoreResult<T> = Result<T, Error>;
