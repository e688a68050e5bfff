//! Runtime components: include ordering, launch plan and process supervision

pub mod dependency;
pub mod executor;
pub mod process;

pub use dependency::*;
pub use executor::*;
pub use process::*;
