//! A `no_std`, no-alloc managed flash storage for embedded systems.
//!
//! This crate stores a fixed set of numbered, variable-size records in
//! two flash banks and keeps them consistent across power loss. It is a
//! small key-value store for configuration and calibration data on
//! microcontrollers with NOR flash.
//!
//! # Features
//!
//! - **Zero heap allocation** - All state statically sized through const generics
//! - **Append-only writes** - Records are never rewritten in place
//! - **Power-loss safety** - Sealed headers and a two-bank compaction scheme
//! - **Self-repair** - Mount classifies both banks and fixes whatever it finds
//! - **Transactions** - Several writes and erases applied all at once, or not at all
//!
//! # Architecture
//!
//! One bank is active and receives appended records; the other stays
//! erased until compaction moves the live records into it:
//!
//! ```text
//! ┌──────────────────────────┐  compact   ┌──────────────────────────┐
//! │ Bank 0 (active, cnt = n) │───────────▶│ Bank 1 (cnt = n + 1)     │
//! │                          │  live      │                          │
//! │ hdr │ r1 │ r2 │ r1' │ ▒▒ │  records   │ hdr │ r1' │ r2 │ ...     │
//! │             append ─▶    │  only      │                          │
//! └──────────────────────────┘            └──────────────────────────┘
//!              ▲                                       │
//!              └────────── erased after copy ──────────┘
//! ```
//!
//! - **Writes** append a record whose magic words are programmed last
//! - **Erases** append a zero-size tombstone
//! - **Mount** rebuilds an in-memory index by scanning the active bank
//! - **Compaction** copies live records, writes the new header, then erases the old bank
//!
//! # Example
//!
//! ```rust,no_run
//! use embedded_mfs::prelude::*;
//!
//! struct RamFlash {
//!     mem: [u8; 8192],
//! }
//!
//! impl FlashDevice for RamFlash {
//!     fn descriptor(&self) -> FlashDescriptor {
//!         FlashDescriptor { sector_count: 2, sector_size: 4096, erased: Erased::Ones, write_size: 1 }
//!     }
//!
//!     fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
//!         let at = offset as usize;
//!         buf.copy_from_slice(&self.mem[at..at + buf.len()]);
//!         Ok(())
//!     }
//!
//!     fn program(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
//!         let at = offset as usize;
//!         for (cell, b) in self.mem[at..at + data.len()].iter_mut().zip(data) {
//!             *cell &= *b;
//!         }
//!         Ok(())
//!     }
//!
//!     fn start_erase_sector(&mut self, sector: u32) -> Result<(), FlashError> {
//!         let at = sector as usize * 4096;
//!         self.mem[at..at + 4096].fill(0xFF);
//!         Ok(())
//!     }
//!
//!     fn wait_erase(&mut self) -> Result<(), FlashError> {
//!         Ok(())
//!     }
//!
//!     fn verify_erase(&mut self, sector: u32) -> Result<(), FlashError> {
//!         let at = sector as usize * 4096;
//!         match self.mem[at..at + 4096].iter().all(|b| *b == 0xFF) {
//!             true => Ok(()),
//!             false => Err(FlashError::Verify),
//!         }
//!     }
//! }
//!
//! let config = MfsConfigBuilder::new()
//!     .bank0(0, 1)
//!     .bank1(1, 1)
//!     .bank_size(4096)
//!     .build();
//!
//! // 32 records, 16 operations per transaction
//! let mut mfs: Mfs<RamFlash, 32, 16> =
//!     Mfs::new(RamFlash { mem: [0xFF; 8192] }, config).map_err(|(_, e)| e)?;
//! mfs.start()?;
//!
//! mfs.write_record(1, b"calibration")?;
//!
//! let mut buf = [0u8; 32];
//! let n = mfs.read_record(1, &mut buf)?;
//! assert_eq!(&buf[..n], b"calibration");
//!
//! // Update two records atomically
//! mfs.start_transaction(128)?;
//! mfs.write_record(1, b"gain=2")?;
//! mfs.write_record(2, b"offset=-3")?;
//! mfs.commit_transaction()?;
//! # Ok::<(), MfsError>(())
//! ```

#![deny(unsafe_code)]
#![no_std]

pub mod mfs;

pub mod prelude {
    pub use crate::mfs::prelude::*;
}
