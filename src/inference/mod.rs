//! Model artifacts and inference.
//!
//! An artifact is a JSON document holding a semantic version, an ordered
//! feature schema and the parameters of a regression model. Artifacts are
//! validated once at load time; inference then never has to re-check widths
//! or tree structure.

pub mod artifact;
pub mod handle;
pub mod loader;
pub mod model;
pub mod schema;

pub use artifact::{ArtifactDocument, ModelArtifact, sha256_hex};
pub use handle::ModelHandle;
pub use loader::{ArtifactLoader, FileArtifactLoader};
pub use model::{Aggregation, RegressionModel, RegressionTree, TreeNode};
pub use schema::{FeatureSchema, FeatureSlot};
