//! CLI subcommand implementations.

pub mod info;
pub mod map;

pub use info::CmdInfo;
pub use map::CmdMap;
