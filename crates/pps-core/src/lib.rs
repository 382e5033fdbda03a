//! Cache-coherent persistence for per-user particle data.
//!
//! A [`DataManager`] serves reads from the [`UserRecordCache`] owned by the
//! [`ForegroundLoop`] and pushes writes through per-owner lanes to the
//! SQLite-backed [`pps_kernel::Kernel`].

pub mod authority;
pub mod cache;
pub mod config;
pub mod dispatch;
mod error;
mod lanes;
pub mod manager;

pub use authority::{FixedEffectAuthority, NoUnlimited, UnlimitedOwners};
pub use cache::UserRecordCache;
pub use config::{Config, LazySettings, SettingsSource, WriteFailurePolicy};
pub use dispatch::{Dispatcher, ForegroundHandle, ForegroundLoop};
pub use error::{DataError, DataResult};
pub use manager::{DataManager, DataManagerBuilder, Ticket};
