//! Stacked LSTM regressor for next-day spending
//!
//! Layer stack: LSTM(64, full sequence) → dropout(0.2) → LSTM(32, last state)
//! → dropout(0.2) → dense(16, relu) → dense(1, linear). The single output is
//! the scaled `total_amount` of the following day.

use super::layers::{Activation, Dense, DenseGrads, Dropout, Lstm, LstmGrads};
use super::optimizer::Adam;
use super::SequenceModel;
use crate::data::{FeatureRow, FEATURE_COUNT};
use crate::sequence::{SequenceSample, WINDOW_LEN};
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const ENCODER_UNITS: usize = 64;
pub const DECODER_UNITS: usize = 32;
pub const HIDDEN_UNITS: usize = 16;
pub const DROPOUT_RATE: f64 = 0.2;

/// Index of the feature the network is trained to predict
pub const TARGET_FEATURE: usize = 0;

/// Trainable recurrent network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceNetwork {
    window_len: usize,
    features: usize,
    encoder: Lstm,
    decoder: Lstm,
    hidden: Dense,
    output: Dense,
    dropout: Dropout,
}

#[derive(Debug, Clone)]
struct NetworkGrads {
    encoder: LstmGrads,
    decoder: LstmGrads,
    hidden: DenseGrads,
    output: DenseGrads,
}

impl NetworkGrads {
    fn slices(&self) -> Vec<&Vec<f64>> {
        let mut all: Vec<&Vec<f64>> = Vec::with_capacity(10);
        all.extend(self.encoder.slices());
        all.extend(self.decoder.slices());
        all.extend(self.hidden.slices());
        all.extend(self.output.slices());
        all
    }
}

/// Mean error of a network over a set of samples
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationMetrics {
    pub mse: f64,
    pub mae: f64,
}

impl SequenceNetwork {
    /// Build a freshly initialised network for `WINDOW_LEN × FEATURE_COUNT` inputs
    pub fn new<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            window_len: WINDOW_LEN,
            features: FEATURE_COUNT,
            encoder: Lstm::new(FEATURE_COUNT, ENCODER_UNITS, rng),
            decoder: Lstm::new(ENCODER_UNITS, DECODER_UNITS, rng),
            hidden: Dense::new(DECODER_UNITS, HIDDEN_UNITS, Activation::Relu, rng),
            output: Dense::new(HIDDEN_UNITS, 1, Activation::Linear, rng),
            dropout: Dropout::new(DROPOUT_RATE),
        }
    }

    /// Whether layer sizes agree with each other, with the input shape and
    /// with the lengths of the stored weights
    pub fn is_consistent(&self) -> bool {
        self.window_len == WINDOW_LEN
            && self.features == FEATURE_COUNT
            && self.encoder.inputs() == self.features
            && self.decoder.inputs() == self.encoder.units()
            && self.hidden.inputs() == self.decoder.units()
            && self.output.inputs() == self.hidden.units()
            && self.output.units() == 1
            && self.encoder.is_valid()
            && self.decoder.is_valid()
            && self.hidden.is_valid()
            && self.output.is_valid()
    }

    fn to_inputs(window: &[FeatureRow]) -> Vec<Vec<f64>> {
        window.iter().map(|row| row.to_vec()).collect()
    }

    /// Inference pass without dropout
    pub fn predict(&self, window: &[FeatureRow]) -> f64 {
        let encoded = self.encoder.forward(&Self::to_inputs(window));
        let decoded = self.decoder.forward(&encoded);
        let last = decoded.last().cloned().unwrap_or_else(|| vec![0.0; DECODER_UNITS]);
        let hidden = self.hidden.forward(&last);
        self.output.forward(&hidden)[0]
    }

    /// One optimizer step over a mini-batch; returns the batch MSE before the update
    pub fn train_batch<R: Rng + ?Sized>(
        &mut self,
        batch: &[&SequenceSample],
        optimizer: &mut Adam,
        rng: &mut R,
    ) -> f64 {
        if batch.is_empty() {
            return 0.0;
        }

        let mut grads = NetworkGrads {
            encoder: self.encoder.zero_grads(),
            decoder: self.decoder.zero_grads(),
            hidden: self.hidden.zero_grads(),
            output: self.output.zero_grads(),
        };
        let scale = 1.0 / batch.len() as f64;
        let mut loss = 0.0;

        for sample in batch {
            let inputs = Self::to_inputs(&sample.window);

            let (encoded, encoder_cache) = self.encoder.forward_cached(&inputs);
            let encoder_masks: Vec<Vec<f64>> = encoded
                .iter()
                .map(|h| self.dropout.mask(h.len(), rng))
                .collect();
            let dropped: Vec<Vec<f64>> = encoded
                .iter()
                .zip(&encoder_masks)
                .map(|(h, m)| h.iter().zip(m).map(|(a, b)| a * b).collect())
                .collect();

            let (decoded, decoder_cache) = self.decoder.forward_cached(&dropped);
            let last = &decoded[decoded.len() - 1];
            let decoder_mask = self.dropout.mask(last.len(), rng);
            let last_dropped: Vec<f64> = last.iter().zip(&decoder_mask).map(|(a, b)| a * b).collect();

            let (hidden, hidden_cache) = self.hidden.forward_cached(&last_dropped);
            let (output, output_cache) = self.output.forward_cached(&hidden);

            let error = output[0] - sample.target[TARGET_FEATURE];
            loss += error * error * scale;

            let grad_output = [2.0 * error * scale];
            let grad_hidden = self.output.backward(&output_cache, &grad_output, &mut grads.output);
            let grad_last = self.hidden.backward(&hidden_cache, &grad_hidden, &mut grads.hidden);

            let mut grad_decoded = vec![vec![0.0; DECODER_UNITS]; decoded.len()];
            if let Some(slot) = grad_decoded.last_mut() {
                *slot = grad_last.iter().zip(&decoder_mask).map(|(g, m)| g * m).collect();
            }
            let grad_dropped = self.decoder.backward(&decoder_cache, &grad_decoded, &mut grads.decoder);

            let grad_encoded: Vec<Vec<f64>> = grad_dropped
                .iter()
                .zip(&encoder_masks)
                .map(|(g, m)| g.iter().zip(m).map(|(a, b)| a * b).collect())
                .collect();
            self.encoder.backward(&encoder_cache, &grad_encoded, &mut grads.encoder);
        }

        optimizer.apply(self.parameters_mut(), grads.slices());
        loss
    }

    /// Mean squared and absolute error on the target feature, without dropout
    pub fn evaluate(&self, samples: &[SequenceSample]) -> Option<EvaluationMetrics> {
        if samples.is_empty() {
            return None;
        }

        let n = samples.len() as f64;
        let (sq, abs) = samples.iter().fold((0.0, 0.0), |(sq, abs), sample| {
            let error = self.predict(&sample.window) - sample.target[TARGET_FEATURE];
            (sq + error * error, abs + error.abs())
        });

        Some(EvaluationMetrics {
            mse: sq / n,
            mae: abs / n,
        })
    }

    fn parameters_mut(&mut self) -> Vec<&mut Vec<f64>> {
        let mut all: Vec<&mut Vec<f64>> = Vec::with_capacity(10);
        all.extend(self.encoder.parameters_mut());
        all.extend(self.decoder.parameters_mut());
        all.extend(self.hidden.parameters_mut());
        all.extend(self.output.parameters_mut());
        all
    }
}

impl SequenceModel for SequenceNetwork {
    fn predict_next(&self, window: &[FeatureRow]) -> f64 {
        self.predict(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::create_sequences;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn periodic_rows(n: usize) -> Vec<FeatureRow> {
        (0..n)
            .map(|i| {
                let phase = (i % 7) as f64 / 7.0 * std::f64::consts::TAU;
                [phase.sin(), phase.cos(), 0.5 * phase.sin()]
            })
            .collect()
    }

    #[test]
    fn test_new_network_is_consistent() {
        let mut rng = StdRng::seed_from_u64(1);
        let network = SequenceNetwork::new(&mut rng);

        assert!(network.is_consistent());
    }

    #[test]
    fn test_truncated_output_layer_is_inconsistent() {
        let mut rng = StdRng::seed_from_u64(5);
        let network = SequenceNetwork::new(&mut rng);

        let mut value = serde_json::to_value(&network).unwrap();
        value["output"]["weights"] = serde_json::json!([]);
        value["output"]["bias"] = serde_json::json!([]);
        let truncated: SequenceNetwork = serde_json::from_value(value).unwrap();

        assert!(!truncated.is_consistent());
    }

    #[test]
    fn test_predict_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(2);
        let network = SequenceNetwork::new(&mut rng);
        let window = periodic_rows(7);

        let first = network.predict(&window);
        assert!(first.is_finite());
        assert_eq!(first, network.predict(&window));
    }

    #[test]
    fn test_training_reduces_loss() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut network = SequenceNetwork::new(&mut rng);
        let mut optimizer = Adam::new(0.005);
        let samples = create_sequences(&periodic_rows(40));

        let before = network.evaluate(&samples).unwrap().mse;
        for _ in 0..20 {
            for chunk in samples.chunks(8) {
                let batch: Vec<&SequenceSample> = chunk.iter().collect();
                network.train_batch(&batch, &mut optimizer, &mut rng);
            }
        }
        let after = network.evaluate(&samples).unwrap().mse;

        assert!(after < before, "loss did not improve: {} -> {}", before, after);
    }

    #[test]
    fn test_serde_round_trip_preserves_predictions() {
        let mut rng = StdRng::seed_from_u64(4);
        let network = SequenceNetwork::new(&mut rng);
        let window = periodic_rows(7);

        let json = serde_json::to_string(&network).unwrap();
        let restored: SequenceNetwork = serde_json::from_str(&json).unwrap();

        assert!((network.predict(&window) - restored.predict(&window)).abs() < 1e-12);
    }
}
