pub mod builder;
pub mod config;
pub mod crc;
pub mod error;
pub mod flash;
pub mod layout;
pub mod nor;
pub mod shared;
pub mod types;

pub(crate) mod descriptors;
pub(crate) mod fields;
pub(crate) mod transaction;

mod bank;
mod driver;
mod gc;
mod io;
mod mount;
mod record;
mod scan;

#[cfg(test)]
mod test_support;

pub use builder::MfsConfigBuilder;
pub use config::MfsConfig;
pub use driver::Mfs;
pub use error::{FlashError, MfsError};
pub use flash::{Erased, FlashDescriptor, FlashDevice};
pub use nor::NorFlashDevice;
pub use shared::SharedMfs;
pub use types::{BankId, BankState, DriverState, Offset, Status};

pub mod prelude {
    pub use super::{
        BankId, DriverState, Erased, FlashDescriptor, FlashDevice, FlashError, Mfs, MfsConfig,
        MfsConfigBuilder, MfsError, NorFlashDevice, SharedMfs, Status,
    };
}
