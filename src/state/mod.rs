pub mod identity;
pub mod state_machine;

use std::sync::Arc;

use crate::{
    config::AppConfig,
    dao::game_store::GameStore,
    generation::{QuestionGenerator, pipeline::GenerationPipeline},
};

pub type SharedState = Arc<AppState>;

/// Central application state: the persistence handle, the optional question
/// generator and the loaded configuration.
///
/// Nothing here is mutated after construction; every game lives in the store.
pub struct AppState {
    store: Arc<dyn GameStore>,
    generator: Option<Arc<dyn QuestionGenerator>>,
    config: AppConfig,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(
        store: Arc<dyn GameStore>,
        generator: Option<Arc<dyn QuestionGenerator>>,
        config: AppConfig,
    ) -> SharedState {
        Arc::new(Self {
            store,
            generator,
            config,
        })
    }

    /// Handle to the game store.
    pub fn store(&self) -> &Arc<dyn GameStore> {
        &self.store
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Name of the installed generator, if any.
    pub fn generator_name(&self) -> Option<&str> {
        self.generator.as_ref().map(|generator| generator.name())
    }

    /// Pipeline wired to this state's store and generator.
    pub fn pipeline(&self) -> GenerationPipeline {
        GenerationPipeline::new(
            self.store.clone(),
            self.generator.clone(),
            self.config.pipeline.clone(),
        )
    }
}
