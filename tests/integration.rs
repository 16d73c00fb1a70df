#![cfg(feature = "std")]

use std::cell::Cell;

use corefs::config::{MAX_ENTRIES, MAX_FILE_SIZE, SECTOR_SIZE};
use corefs::partition::ram::RamPartition;
use corefs::{Clock, CoreFs, Error, OpenFlags, SeekWhence};

/// A monotonically increasing millisecond tick, advancing by one on every
/// read. Good enough to exercise created/modified ordering in tests.
struct TestClock(Cell<u64>);

impl TestClock {
	fn new() -> Self {
		Self(Cell::new(0))
	}
}

impl Clock for TestClock {
	fn now_ms(&self) -> u64 {
		let v = self.0.get();
		self.0.set(v + 1);
		v
	}
}

const PARTITION_BLOCKS: usize = 64;

fn fresh_partition() -> RamPartition {
	RamPartition::new(PARTITION_BLOCKS * corefs::config::BLOCK_SIZE)
}

fn formatted() -> RamPartition {
	let mut p = fresh_partition();
	corefs::format(&mut p).unwrap();
	p
}

#[test]
fn scenario_write_read_back_exact_bytes() {
	let p = formatted();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();

	let h = fs.open("/a.txt", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
	assert_eq!(fs.write(h, b"hello").unwrap(), 5);
	fs.close(h).unwrap();

	let h = fs.open("/a.txt", OpenFlags::RDONLY).unwrap();
	let mut buf = [0u8; 5];
	assert_eq!(fs.read(h, &mut buf).unwrap(), 5);
	assert_eq!(&buf, b"hello");
	assert_eq!(fs.size(h).unwrap(), 5);
	fs.close(h).unwrap();
}

#[test]
fn scenario_append_concatenates() {
	let p = formatted();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();

	let h = fs.open("/a.txt", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
	fs.write(h, b"hello").unwrap();
	fs.close(h).unwrap();

	let h = fs.open("/a.txt", OpenFlags::WRONLY | OpenFlags::APPEND).unwrap();
	fs.write(h, b" world").unwrap();
	fs.close(h).unwrap();

	let h = fs.open("/a.txt", OpenFlags::RDONLY).unwrap();
	let mut buf = [0u8; 64];
	let n = fs.read(h, &mut buf).unwrap();
	assert_eq!(&buf[..n], b"hello world");
	assert_eq!(fs.size(h).unwrap(), 11);
}

#[test]
fn scenario_truncate_on_open_zeroes_size() {
	let p = formatted();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();

	let h = fs.open("/a.txt", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
	fs.write(h, b"hello").unwrap();
	fs.close(h).unwrap();

	let h = fs
		.open("/a.txt", OpenFlags::CREAT | OpenFlags::WRONLY | OpenFlags::TRUNC)
		.unwrap();
	assert_eq!(fs.size(h).unwrap(), 0);
	fs.close(h).unwrap();
}

#[test]
fn scenario_exists_and_unlink() {
	let p = formatted();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();

	let h = fs.open("/a.txt", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
	fs.write(h, b"hello").unwrap();
	fs.close(h).unwrap();

	assert!(fs.exists("/a.txt").unwrap());
	assert!(!fs.exists("/nope").unwrap());

	fs.unlink("/a.txt").unwrap();
	assert!(!fs.exists("/a.txt").unwrap());
	assert_eq!(fs.open("/a.txt", OpenFlags::RDONLY).unwrap_err(), Error::NotFound);
}

#[test]
fn scenario_directory_full_rolls_back_inode_allocation() {
	let p = formatted();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();

	for i in 0..MAX_ENTRIES {
		let path = std::format!("/f{i}.txt");
		let h = fs.open(&path, OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
		fs.close(h).unwrap();
	}
	let used_before = fs.info().unwrap().used_blocks;

	let err = fs.open("/overflow.txt", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap_err();
	assert_eq!(err, Error::OutOfSpace);

	// The inode allocated for the failed attempt must have been released.
	assert_eq!(fs.info().unwrap().used_blocks, used_before);
}

#[test]
fn scenario_crash_then_remount_reads_back_prior_file() {
	let p = formatted();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();
	let h = fs.open("/a.txt", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
	fs.write(h, b"hello").unwrap();
	fs.close(h).unwrap();

	// Simulate a power cut: drop the mounted state without calling
	// `unmount`, so `clean_unmount` is still zero on the backing store.
	let raw = fs.into_partition_without_unmount();

	let mut fs2 = CoreFs::mount(raw, TestClock::new()).unwrap();
	let h = fs2.open("/a.txt", OpenFlags::RDONLY).unwrap();
	let mut buf = [0u8; 5];
	assert_eq!(fs2.read(h, &mut buf).unwrap(), 5);
	assert_eq!(&buf, b"hello");
}

#[test]
fn round_trip_durability_across_clean_unmount() {
	let p = formatted();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();
	let h = fs.open("/a.txt", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
	fs.write(h, b"hello").unwrap();
	fs.close(h).unwrap();
	let p = fs.unmount().unwrap();

	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();
	assert!(fs.exists("/a.txt").unwrap());
	let p = fs.unmount().unwrap();

	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();
	let h = fs.open("/a.txt", OpenFlags::RDONLY).unwrap();
	let mut buf = [0u8; 5];
	assert_eq!(fs.read(h, &mut buf).unwrap(), 5);
	assert_eq!(&buf, b"hello");
}

#[test]
fn boundary_name_too_long_at_exactly_name_max() {
	let p = formatted();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();

	let ok_name = "a".repeat(corefs::config::NAME_MAX - 1);
	let too_long_name = "a".repeat(corefs::config::NAME_MAX);

	let h = fs
		.open(&std::format!("/{ok_name}"), OpenFlags::CREAT | OpenFlags::WRONLY)
		.unwrap();
	fs.close(h).unwrap();

	assert_eq!(
		fs.open(&std::format!("/{too_long_name}"), OpenFlags::CREAT | OpenFlags::WRONLY)
			.unwrap_err(),
		Error::NameTooLong
	);
}

#[test]
fn boundary_file_at_max_blocks_vs_one_more() {
	// Needs room for a full MAX_FILE_BLOCKS file plus the 4 reserved blocks.
	let mut p = RamPartition::new((corefs::config::MAX_FILE_BLOCKS + 8) * corefs::config::BLOCK_SIZE);
	corefs::format(&mut p).unwrap();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();

	let h = fs.open("/big.bin", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
	let payload: std::vec::Vec<u8> = (0..MAX_FILE_SIZE).map(|i| (i % 251) as u8).collect();
	let written = fs.write(h, &payload).unwrap();
	assert_eq!(written, MAX_FILE_SIZE);

	// One more byte must be refused (partial write of 0).
	let extra = fs.write(h, b"X").unwrap();
	assert_eq!(extra, 0);
	fs.close(h).unwrap();
}

#[test]
fn boundary_seek_to_size_ok_past_size_fails() {
	let p = formatted();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();
	let h = fs.open("/a.txt", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
	fs.write(h, b"hello").unwrap();

	assert_eq!(fs.seek(h, 5, SeekWhence::Set).unwrap(), 5);
	assert!(fs.seek(h, 6, SeekWhence::Set).is_err());
}

#[test]
fn boundary_read_at_eof_returns_zero() {
	let p = formatted();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();
	let h = fs.open("/a.txt", OpenFlags::CREAT | OpenFlags::WRONLY).unwrap();
	fs.write(h, b"hi").unwrap();
	fs.close(h).unwrap();

	let h = fs.open("/a.txt", OpenFlags::RDONLY).unwrap();
	let mut buf = [0u8; 2];
	fs.read(h, &mut buf).unwrap();
	let mut buf2 = [0u8; 16];
	assert_eq!(fs.read(h, &mut buf2).unwrap(), 0);
}

#[test]
fn too_many_open_files_is_refused() {
	// Open the same file repeatedly rather than MAX_OPEN_FILES distinct
	// files: the directory index's own capacity (MAX_ENTRIES) is smaller
	// than MAX_OPEN_FILES, so distinct files would hit that limit first.
	let p = formatted();
	let mut fs = CoreFs::mount(p, TestClock::new()).unwrap();
	let h0 = fs.open("/a.txt", OpenFlags::CREAT | OpenFlags::RDONLY).unwrap();
	let mut handles = std::vec![h0];
	for _ in 1..corefs::config::MAX_OPEN_FILES {
		handles.push(fs.open("/a.txt", OpenFlags::RDONLY).unwrap());
	}
	assert_eq!(fs.open("/a.txt", OpenFlags::RDONLY).unwrap_err(), Error::TooManyOpen);
}

#[test]
fn format_rejects_misaligned_partition_size() {
	let mut p = RamPartition::new(SECTOR_SIZE + 1024);
	assert!(corefs::format(&mut p).is_err());
}
