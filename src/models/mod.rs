//! Model registries.
//!
//! [`ModelRepository`] holds one [`SessionModel`] per type for the whole
//! application run. [`WorldModelRepository`] holds one [`ContextualModel`]
//! per type for a single scene and reaches back to the session repository
//! through the ambient world.

mod contextual;
mod links;
mod session;

pub use contextual::{ContextualModel, ContextualModelClass, WorldModelRepository};
pub use links::RepositoryLinks;
pub use session::{ModelRepository, SessionModel, SessionModelClass};
