mod config;
mod digest;
mod error;
mod layout;
mod phase;

pub use config::{
    CarryoverConfig, HandoffConfig, InstallConfig, SourceConfig, SourceKind, UpdateConfig,
    CONFIG_FILE_NAME,
};
pub use digest::{collect_relative_file_paths, sha256_hex, tree_digest};
pub use error::UpdateError;
pub use layout::InstallLayout;
pub use phase::{UpdatePhase, UPDATE_STEP_COUNT};
