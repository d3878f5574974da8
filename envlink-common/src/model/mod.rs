// envlink-common/src/model/mod.rs
pub mod dist;
pub mod index;
pub mod manifest;
pub mod prefix;

pub use dist::Dist;
pub use index::{DistIndex, EnvSpec};
pub use manifest::{IndexRecord, LinkManifest, LinkSource, LinkType, SourceInfo};
pub use prefix::{PrefixMode, PrefixRecord, PREFIX_PLACEHOLDER};
