//! Bringup profile parsing, package lookup and substitution

mod ament;
mod profile;
mod substitution;

pub use ament::*;
pub use profile::*;
pub use substitution::*;
