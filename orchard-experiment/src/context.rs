use crate::config::ExperimentConfig;
use crate::error::SessionError;
use orchard_classify::{Classifier, TrainedModel, for_mode};
use orchard_core::ChannelLayout;
use orchard_signal::{FeatureExtractor, SourceModel, SignalError};
use std::sync::Arc;

/// Session-scoped collaborators shared by every trial: the configuration,
/// the classifier, and the subject's source model.
///
/// The source model is built at most once per context. After that the
/// context only hands out shared references to it.
pub struct SessionContext {
    config: Arc<ExperimentConfig>,
    classifier: Box<dyn Classifier>,
    source_model: Option<Arc<SourceModel>>,
    builds: usize,
}

impl SessionContext {
    pub fn new(config: Arc<ExperimentConfig>, classifier: Box<dyn Classifier>) -> Self {
        Self {
            config,
            classifier,
            source_model: None,
            builds: 0,
        }
    }

    /// Context for the data-collection modes.
    pub fn for_collection(config: Arc<ExperimentConfig>) -> Result<Self, SessionError> {
        let classifier =
            for_mode(config.mode).ok_or(SessionError::MissingClassifier(config.mode))?;
        Ok(Self::new(config, classifier))
    }

    /// Context for evaluation. The source model is built up front from the
    /// geometry the classifier was trained on, and the configured features
    /// must have the length the classifier was fitted to.
    pub fn for_evaluation(
        config: Arc<ExperimentConfig>,
        trained: TrainedModel,
    ) -> Result<Self, SessionError> {
        tracing::info!(
            epochs = trained.n_epochs,
            layout = ?trained.layout,
            srate = trained.sample_rate,
            "using trained classifier"
        );
        let expected = trained.classifier.pipeline().n_features();
        let mut context = Self::new(config, Box::new(trained.classifier));
        let configured = context.extractor(trained.layout)?.feature_len();
        if configured != expected {
            return Err(SessionError::FeatureLength {
                trained: expected,
                configured,
            });
        }
        Ok(context)
    }

    pub fn config(&self) -> &Arc<ExperimentConfig> {
        &self.config
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// The subject's source model, built on first use.
    ///
    /// Asking for a different layout once the model exists is an error
    /// rather than a rebuild.
    pub fn source_model(&mut self, layout: ChannelLayout) -> Result<Arc<SourceModel>, SignalError> {
        if let Some(model) = &self.source_model {
            if model.layout() != layout {
                return Err(SignalError::LayoutMismatch {
                    expected: model.layout(),
                    actual: layout,
                });
            }
            return Ok(Arc::clone(model));
        }

        tracing::info!(?layout, sources = self.config.source_model.n_sources, "building source model");
        let model = Arc::new(SourceModel::build(layout, &self.config.source_model)?);
        self.builds += 1;
        self.source_model = Some(Arc::clone(&model));
        Ok(model)
    }

    pub fn source_model_layout(&self) -> Option<ChannelLayout> {
        self.source_model.as_ref().map(|m| m.layout())
    }

    /// How many times the source model has been constructed.
    pub fn source_model_builds(&self) -> usize {
        self.builds
    }

    pub fn extractor(&mut self, layout: ChannelLayout) -> Result<FeatureExtractor, SignalError> {
        let model = self.source_model(layout)?;
        Ok(FeatureExtractor::new(self.config.features.clone(), model))
    }
}
