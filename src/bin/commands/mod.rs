pub mod build_cmd;
pub mod inspect_cmd;
pub mod match_cmd;

pub use build_cmd::cmd_build;
pub use inspect_cmd::cmd_inspect;
pub use match_cmd::cmd_match;
