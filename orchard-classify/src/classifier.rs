use crate::error::ClassifyError;
use crate::pipeline::LinearPipeline;
use orchard_core::{DecisionKind, FeatureVector, SessionMode, Side};
use rand::{Rng, RngCore};

/// Everything a decision may look at for one trial.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub target_x: f32,
    pub screen_width: f32,
    pub features: Option<&'a FeatureVector>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub side: Side,
    /// In `[0, 1]`; above one half means right.
    pub confidence: f64,
}

impl Decision {
    pub fn from_confidence(confidence: f64) -> Self {
        Self {
            side: Side::from_confidence(confidence),
            confidence,
        }
    }
}

/// Picks the hand to open. Implementations are immutable once built and
/// shared read-only for the whole session.
pub trait Classifier: Send + Sync {
    fn kind(&self) -> DecisionKind;

    /// Whether `decide` needs a feature vector for the trial.
    fn needs_features(&self) -> bool {
        false
    }

    fn decide(
        &self,
        input: &DecisionInput<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Decision, ClassifyError>;
}

/// Reads the answer straight off the target's position.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositionalClassifier;

fn positional(input: &DecisionInput<'_>) -> Result<f64, ClassifyError> {
    if input.screen_width.is_nan() || input.screen_width <= 0.0 {
        return Err(ClassifyError::InvalidGeometry);
    }
    Ok(f64::from(input.target_x / input.screen_width))
}

impl Classifier for PositionalClassifier {
    fn kind(&self) -> DecisionKind {
        DecisionKind::Positional
    }

    fn decide(
        &self,
        input: &DecisionInput<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Decision, ClassifyError> {
        positional(input).map(Decision::from_confidence)
    }
}

/// Positional two times out of three, a coin flip otherwise, so collected
/// data holds both correct and incorrect hand feedback.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomizedClassifier;

impl Classifier for RandomizedClassifier {
    fn kind(&self) -> DecisionKind {
        DecisionKind::Randomized
    }

    fn decide(
        &self,
        input: &DecisionInput<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<Decision, ClassifyError> {
        let position = positional(input)?;
        let confidence = match rng.random_range(0..3) {
            1 => rng.random::<f64>(),
            _ => position,
        };
        Ok(Decision::from_confidence(confidence))
    }
}

/// Fitted pipeline trained on a subject's archived sessions.
#[derive(Debug, Clone)]
pub struct LearnedClassifier {
    pipeline: LinearPipeline,
}

impl LearnedClassifier {
    pub fn new(pipeline: LinearPipeline) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &LinearPipeline {
        &self.pipeline
    }
}

impl Classifier for LearnedClassifier {
    fn kind(&self) -> DecisionKind {
        DecisionKind::Learned
    }

    fn needs_features(&self) -> bool {
        true
    }

    fn decide(
        &self,
        input: &DecisionInput<'_>,
        _rng: &mut dyn RngCore,
    ) -> Result<Decision, ClassifyError> {
        let features = input.features.ok_or(ClassifyError::MissingFeatures)?;
        if features.len() != self.pipeline.n_features() {
            return Err(ClassifyError::FeatureLength {
                expected: self.pipeline.n_features(),
                actual: features.len(),
            });
        }
        Ok(Decision::from_confidence(
            self.pipeline.predict_proba(features.as_slice()),
        ))
    }
}

/// The classifier for a data-collection mode. Evaluation needs a trained
/// model and has no default.
pub fn for_mode(mode: SessionMode) -> Option<Box<dyn Classifier>> {
    match mode.decision_kind() {
        DecisionKind::Positional => Some(Box::new(PositionalClassifier)),
        DecisionKind::Randomized => Some(Box::new(RandomizedClassifier)),
        DecisionKind::Learned => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn input(x: f32) -> DecisionInput<'static> {
        DecisionInput {
            target_x: x,
            screen_width: 1900.0,
            features: None,
        }
    }

    #[test]
    fn positional_follows_the_target() {
        let mut rng = StdRng::seed_from_u64(1);
        let right = PositionalClassifier.decide(&input(1400.0), &mut rng).unwrap();
        assert_eq!(right.side, Side::Right);
        let left = PositionalClassifier.decide(&input(500.0), &mut rng).unwrap();
        assert_eq!(left.side, Side::Left);
        assert!((left.confidence - 500.0 / 1900.0).abs() < 1e-6);
    }

    #[test]
    fn randomized_is_mostly_positional() {
        let mut rng = StdRng::seed_from_u64(7);
        let decisions: Vec<Decision> = (0..3000)
            .map(|_| RandomizedClassifier.decide(&input(1400.0), &mut rng).unwrap())
            .collect();
        let right = decisions.iter().filter(|d| d.side == Side::Right).count();
        // 2/3 positional plus half of the random third.
        let share = right as f64 / decisions.len() as f64;
        assert!((share - 5.0 / 6.0).abs() < 0.05, "share {share}");
        assert!(decisions.iter().all(|d| (0.0..=1.0).contains(&d.confidence)));
    }

    #[test]
    fn zero_width_screen_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let bad = DecisionInput {
            screen_width: 0.0,
            ..input(10.0)
        };
        assert_eq!(
            PositionalClassifier.decide(&bad, &mut rng),
            Err(ClassifyError::InvalidGeometry)
        );
    }

    #[test]
    fn modes_map_to_variants() {
        assert_eq!(
            for_mode(SessionMode::Training).map(|c| c.kind()),
            Some(DecisionKind::Positional)
        );
        assert_eq!(
            for_mode(SessionMode::Define).map(|c| c.kind()),
            Some(DecisionKind::Randomized)
        );
        assert!(for_mode(SessionMode::Test).is_none());
    }
}
