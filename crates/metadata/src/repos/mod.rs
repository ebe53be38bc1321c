//! Repository traits for metadata operations.

pub mod entries;
pub mod spaces;

pub use entries::{CreatedFolder, DirectoryListing, EntryRepo, SubtreeStats};
pub use spaces::SpaceRepo;
