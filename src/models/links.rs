use std::fmt;
use std::sync::{Arc, Weak};

use super::{ModelRepository, WorldModelRepository};

/// Non-owning handles to the repositories a model or view model was
/// created against. Both resolve to `None` once the repository is gone.
#[derive(Clone, Default)]
pub struct RepositoryLinks {
    model_repository: Weak<ModelRepository>,
    world_model_repository: Weak<WorldModelRepository>,
}

impl RepositoryLinks {
    pub fn new(
        model_repository: &Arc<ModelRepository>,
        world_model_repository: Option<&Arc<WorldModelRepository>>,
    ) -> Self {
        Self {
            model_repository: Arc::downgrade(model_repository),
            world_model_repository: world_model_repository
                .map(Arc::downgrade)
                .unwrap_or_default(),
        }
    }

    pub(crate) fn from_weak(
        model_repository: Weak<ModelRepository>,
        world_model_repository: Weak<WorldModelRepository>,
    ) -> Self {
        Self {
            model_repository,
            world_model_repository,
        }
    }

    pub fn model_repository(&self) -> Option<Arc<ModelRepository>> {
        self.model_repository.upgrade()
    }

    pub fn world_model_repository(&self) -> Option<Arc<WorldModelRepository>> {
        self.world_model_repository.upgrade()
    }
}

impl fmt::Debug for RepositoryLinks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryLinks")
            .field("model_repository", &(self.model_repository.strong_count() > 0))
            .field(
                "world_model_repository",
                &(self.world_model_repository.strong_count() > 0),
            )
            .finish()
    }
}
