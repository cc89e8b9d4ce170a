//! Data layer for the console pages
//!
//! [`ConsoleClient`] talks to the dockyard API and keeps recent reads in a
//! [`TtlCache`]. [`pages`] holds the filtering, sorting and form checks the
//! pages run locally.

pub mod cache;
pub mod client;
pub mod error;
pub mod pages;
pub mod types;

pub use cache::{TtlCache, DEFAULT_TTL};
pub use client::{ConsoleClient, Fetch};
pub use error::{ClientError, Result};
pub use pages::{ContainerFilter, RegistrationForm, ScheduleForm, SortKey, SortOrder};
