//! Recurrent and dense layers with explicit forward caches and backprop
//!
//! Weights are stored row-major in flat vectors. Gate order inside the LSTM
//! is input, forget, candidate, output.

use rand::Rng;
use rand_distr::{Distribution, Uniform};
use serde::{Deserialize, Serialize};

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Glorot-uniform initialisation for a `fan_out × fan_in` matrix
fn glorot_uniform<R: Rng + ?Sized>(fan_in: usize, fan_out: usize, rng: &mut R) -> Vec<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    let dist = Uniform::new_inclusive(-limit, limit);
    (0..fan_in * fan_out).map(|_| dist.sample(rng)).collect()
}

/// `out[r] += sum_k m[r * cols + k] * v[k]`
fn mat_vec_add(m: &[f64], cols: usize, v: &[f64], out: &mut [f64]) {
    for (r, o) in out.iter_mut().enumerate() {
        let row = &m[r * cols..(r + 1) * cols];
        *o += row.iter().zip(v).map(|(a, b)| a * b).sum::<f64>();
    }
}

/// `out[k] += sum_r m[r * cols + k] * v[r]`
fn mat_t_vec_add(m: &[f64], cols: usize, v: &[f64], out: &mut [f64]) {
    for (r, &scale) in v.iter().enumerate() {
        if scale == 0.0 {
            continue;
        }
        let row = &m[r * cols..(r + 1) * cols];
        for (o, a) in out.iter_mut().zip(row) {
            *o += a * scale;
        }
    }
}

/// `grad[r * cols + k] += v[r] * x[k]`
fn outer_add(grad: &mut [f64], cols: usize, v: &[f64], x: &[f64]) {
    for (r, &scale) in v.iter().enumerate() {
        if scale == 0.0 {
            continue;
        }
        let row = &mut grad[r * cols..(r + 1) * cols];
        for (g, xk) in row.iter_mut().zip(x) {
            *g += scale * xk;
        }
    }
}

/// Activation applied after a dense projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
}

/// Fully connected layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dense {
    inputs: usize,
    units: usize,
    activation: Activation,
    weights: Vec<f64>,
    bias: Vec<f64>,
}

/// Values kept from a dense forward pass for backprop
#[derive(Debug, Clone)]
pub struct DenseCache {
    input: Vec<f64>,
    pre_activation: Vec<f64>,
}

/// Accumulated dense gradients
#[derive(Debug, Clone)]
pub struct DenseGrads {
    pub weights: Vec<f64>,
    pub bias: Vec<f64>,
}

impl Dense {
    pub fn new<R: Rng + ?Sized>(
        inputs: usize,
        units: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        Self {
            inputs,
            units,
            activation,
            weights: glorot_uniform(inputs, units, rng),
            bias: vec![0.0; units],
        }
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Whether the weight buffers match the declared shape
    pub fn is_valid(&self) -> bool {
        self.weights.len() == self.units * self.inputs && self.bias.len() == self.units
    }

    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.forward_cached(input).0
    }

    pub fn forward_cached(&self, input: &[f64]) -> (Vec<f64>, DenseCache) {
        let mut pre_activation = self.bias.clone();
        mat_vec_add(&self.weights, self.inputs, input, &mut pre_activation);

        let output = match self.activation {
            Activation::Linear => pre_activation.clone(),
            Activation::Relu => pre_activation.iter().map(|z| z.max(0.0)).collect(),
        };

        (
            output,
            DenseCache {
                input: input.to_vec(),
                pre_activation,
            },
        )
    }

    /// Accumulate gradients into `grads` and return the gradient w.r.t. the input
    pub fn backward(&self, cache: &DenseCache, grad_output: &[f64], grads: &mut DenseGrads) -> Vec<f64> {
        let grad_pre: Vec<f64> = match self.activation {
            Activation::Linear => grad_output.to_vec(),
            Activation::Relu => grad_output
                .iter()
                .zip(&cache.pre_activation)
                .map(|(g, z)| if *z > 0.0 { *g } else { 0.0 })
                .collect(),
        };

        outer_add(&mut grads.weights, self.inputs, &grad_pre, &cache.input);
        for (b, g) in grads.bias.iter_mut().zip(&grad_pre) {
            *b += g;
        }

        let mut grad_input = vec![0.0; self.inputs];
        mat_t_vec_add(&self.weights, self.inputs, &grad_pre, &mut grad_input);
        grad_input
    }

    pub fn zero_grads(&self) -> DenseGrads {
        DenseGrads {
            weights: vec![0.0; self.weights.len()],
            bias: vec![0.0; self.bias.len()],
        }
    }

    pub(crate) fn parameters_mut(&mut self) -> [&mut Vec<f64>; 2] {
        [&mut self.weights, &mut self.bias]
    }
}

impl DenseGrads {
    pub(crate) fn slices(&self) -> [&Vec<f64>; 2] {
        [&self.weights, &self.bias]
    }
}

/// Long short-term memory layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lstm {
    inputs: usize,
    units: usize,
    /// `4 * units × inputs`
    kernel: Vec<f64>,
    /// `4 * units × units`
    recurrent: Vec<f64>,
    bias: Vec<f64>,
}

#[derive(Debug, Clone)]
struct LstmStep {
    input: Vec<f64>,
    h_prev: Vec<f64>,
    c_prev: Vec<f64>,
    /// Activated gates, `4 * units`
    gates: Vec<f64>,
    tanh_c: Vec<f64>,
}

/// Per-timestep values kept from an LSTM forward pass
#[derive(Debug, Clone)]
pub struct LstmCache {
    steps: Vec<LstmStep>,
}

/// Accumulated LSTM gradients
#[derive(Debug, Clone)]
pub struct LstmGrads {
    pub kernel: Vec<f64>,
    pub recurrent: Vec<f64>,
    pub bias: Vec<f64>,
}

impl Lstm {
    pub fn new<R: Rng + ?Sized>(inputs: usize, units: usize, rng: &mut R) -> Self {
        let mut bias = vec![0.0; 4 * units];
        // Forget gate starts open
        for b in &mut bias[units..2 * units] {
            *b = 1.0;
        }

        Self {
            inputs,
            units,
            kernel: glorot_uniform(inputs, 4 * units, rng),
            recurrent: glorot_uniform(units, 4 * units, rng),
            bias,
        }
    }

    pub fn inputs(&self) -> usize {
        self.inputs
    }

    pub fn units(&self) -> usize {
        self.units
    }

    /// Whether the weight buffers match the declared shape
    pub fn is_valid(&self) -> bool {
        let gates = 4 * self.units;
        self.kernel.len() == gates * self.inputs
            && self.recurrent.len() == gates * self.units
            && self.bias.len() == gates
    }

    /// Hidden state after every timestep
    pub fn forward(&self, inputs: &[Vec<f64>]) -> Vec<Vec<f64>> {
        self.forward_cached(inputs).0
    }

    pub fn forward_cached(&self, inputs: &[Vec<f64>]) -> (Vec<Vec<f64>>, LstmCache) {
        let u = self.units;
        let mut h = vec![0.0; u];
        let mut c = vec![0.0; u];
        let mut hidden = Vec::with_capacity(inputs.len());
        let mut steps = Vec::with_capacity(inputs.len());

        for x in inputs {
            let mut gates = self.bias.clone();
            mat_vec_add(&self.kernel, self.inputs, x, &mut gates);
            mat_vec_add(&self.recurrent, u, &h, &mut gates);

            for j in 0..u {
                gates[j] = sigmoid(gates[j]);
                gates[u + j] = sigmoid(gates[u + j]);
                gates[2 * u + j] = gates[2 * u + j].tanh();
                gates[3 * u + j] = sigmoid(gates[3 * u + j]);
            }

            let mut c_next = vec![0.0; u];
            let mut tanh_c = vec![0.0; u];
            let mut h_next = vec![0.0; u];
            for j in 0..u {
                c_next[j] = gates[u + j] * c[j] + gates[j] * gates[2 * u + j];
                tanh_c[j] = c_next[j].tanh();
                h_next[j] = gates[3 * u + j] * tanh_c[j];
            }

            steps.push(LstmStep {
                input: x.clone(),
                h_prev: h,
                c_prev: c,
                gates,
                tanh_c,
            });
            hidden.push(h_next.clone());
            h = h_next;
            c = c_next;
        }

        (hidden, LstmCache { steps })
    }

    /// Backprop through time
    ///
    /// `grad_hidden[t]` is the loss gradient w.r.t. the hidden state emitted at
    /// step `t` by the layer above. Returns the gradient w.r.t. each input.
    pub fn backward(
        &self,
        cache: &LstmCache,
        grad_hidden: &[Vec<f64>],
        grads: &mut LstmGrads,
    ) -> Vec<Vec<f64>> {
        let u = self.units;
        let mut dh_next = vec![0.0; u];
        let mut dc_next = vec![0.0; u];
        let mut grad_inputs = vec![vec![0.0; self.inputs]; cache.steps.len()];
        let mut dz = vec![0.0; 4 * u];

        for (t, step) in cache.steps.iter().enumerate().rev() {
            let gates = &step.gates;

            for j in 0..u {
                let dh = grad_hidden[t][j] + dh_next[j];
                let (i, f, g, o) = (gates[j], gates[u + j], gates[2 * u + j], gates[3 * u + j]);
                let tc = step.tanh_c[j];

                let d_o = dh * tc;
                let dc = dh * o * (1.0 - tc * tc) + dc_next[j];

                dz[j] = dc * g * i * (1.0 - i);
                dz[u + j] = dc * step.c_prev[j] * f * (1.0 - f);
                dz[2 * u + j] = dc * i * (1.0 - g * g);
                dz[3 * u + j] = d_o * o * (1.0 - o);

                dc_next[j] = dc * f;
            }

            outer_add(&mut grads.kernel, self.inputs, &dz, &step.input);
            outer_add(&mut grads.recurrent, u, &dz, &step.h_prev);
            for (b, d) in grads.bias.iter_mut().zip(&dz) {
                *b += d;
            }

            mat_t_vec_add(&self.kernel, self.inputs, &dz, &mut grad_inputs[t]);
            dh_next.iter_mut().for_each(|v| *v = 0.0);
            mat_t_vec_add(&self.recurrent, u, &dz, &mut dh_next);
        }

        grad_inputs
    }

    pub fn zero_grads(&self) -> LstmGrads {
        LstmGrads {
            kernel: vec![0.0; self.kernel.len()],
            recurrent: vec![0.0; self.recurrent.len()],
            bias: vec![0.0; self.bias.len()],
        }
    }

    pub(crate) fn parameters_mut(&mut self) -> [&mut Vec<f64>; 3] {
        [&mut self.kernel, &mut self.recurrent, &mut self.bias]
    }
}

impl LstmGrads {
    pub(crate) fn slices(&self) -> [&Vec<f64>; 3] {
        [&self.kernel, &self.recurrent, &self.bias]
    }
}

/// Inverted dropout: kept units are scaled by `1 / (1 - rate)` during training
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dropout {
    rate: f64,
}

impl Dropout {
    pub fn new(rate: f64) -> Self {
        Self {
            rate: rate.clamp(0.0, 0.99),
        }
    }

    /// Sample a multiplicative mask of `len` entries
    pub fn mask<R: Rng + ?Sized>(&self, len: usize, rng: &mut R) -> Vec<f64> {
        let keep = 1.0 / (1.0 - self.rate);
        (0..len)
            .map(|_| if rng.gen::<f64>() < self.rate { 0.0 } else { keep })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn sequence() -> Vec<Vec<f64>> {
        vec![
            vec![0.3, -0.2],
            vec![-0.5, 0.1],
            vec![0.8, 0.4],
        ]
    }

    fn lstm_loss(layer: &Lstm, inputs: &[Vec<f64>]) -> f64 {
        layer.forward(inputs).iter().flatten().sum()
    }

    #[test]
    fn test_lstm_shapes() {
        let mut rng = StdRng::seed_from_u64(7);
        let layer = Lstm::new(2, 4, &mut rng);
        let hidden = layer.forward(&sequence());

        assert_eq!(hidden.len(), 3);
        assert!(hidden.iter().all(|h| h.len() == 4));
        assert!(hidden.iter().flatten().all(|v| v.abs() < 1.0));
    }

    #[test]
    fn test_lstm_input_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(11);
        let layer = Lstm::new(2, 3, &mut rng);
        let inputs = sequence();

        let (hidden, cache) = layer.forward_cached(&inputs);
        let ones: Vec<Vec<f64>> = hidden.iter().map(|h| vec![1.0; h.len()]).collect();
        let mut grads = layer.zero_grads();
        let analytic = layer.backward(&cache, &ones, &mut grads);

        let eps = 1e-6;
        for t in 0..inputs.len() {
            for k in 0..2 {
                let mut plus = inputs.clone();
                plus[t][k] += eps;
                let mut minus = inputs.clone();
                minus[t][k] -= eps;
                let numeric = (lstm_loss(&layer, &plus) - lstm_loss(&layer, &minus)) / (2.0 * eps);
                assert_relative_eq!(analytic[t][k], numeric, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_lstm_bias_gradient_matches_finite_difference() {
        let mut rng = StdRng::seed_from_u64(5);
        let layer = Lstm::new(2, 3, &mut rng);
        let inputs = sequence();

        let (hidden, cache) = layer.forward_cached(&inputs);
        let ones: Vec<Vec<f64>> = hidden.iter().map(|h| vec![1.0; h.len()]).collect();
        let mut grads = layer.zero_grads();
        layer.backward(&cache, &ones, &mut grads);

        let eps = 1e-6;
        for idx in 0..grads.bias.len() {
            let mut plus = layer.clone();
            plus.bias[idx] += eps;
            let mut minus = layer.clone();
            minus.bias[idx] -= eps;
            let numeric = (lstm_loss(&plus, &inputs) - lstm_loss(&minus, &inputs)) / (2.0 * eps);
            assert_relative_eq!(grads.bias[idx], numeric, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_dense_relu_and_gradient() {
        let mut rng = StdRng::seed_from_u64(3);
        let layer = Dense::new(3, 2, Activation::Relu, &mut rng);
        let input = [0.5, -1.0, 2.0];

        let (output, cache) = layer.forward_cached(&input);
        assert!(output.iter().all(|v| *v >= 0.0));

        let mut grads = layer.zero_grads();
        let grad_input = layer.backward(&cache, &[1.0, 1.0], &mut grads);
        assert_eq!(grad_input.len(), 3);

        let eps = 1e-6;
        for k in 0..3 {
            let mut plus = input;
            plus[k] += eps;
            let mut minus = input;
            minus[k] -= eps;
            let numeric = (layer.forward(&plus).iter().sum::<f64>()
                - layer.forward(&minus).iter().sum::<f64>())
                / (2.0 * eps);
            assert_relative_eq!(grad_input[k], numeric, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_truncated_weights_are_invalid() {
        let mut rng = StdRng::seed_from_u64(13);
        let mut lstm = Lstm::new(3, 4, &mut rng);
        let mut dense = Dense::new(4, 2, Activation::Linear, &mut rng);
        assert!(lstm.is_valid());
        assert!(dense.is_valid());

        lstm.recurrent.pop();
        dense.bias.clear();
        assert!(!lstm.is_valid());
        assert!(!dense.is_valid());
    }

    #[test]
    fn test_dropout_mask() {
        let mut rng = StdRng::seed_from_u64(42);
        let dropout = Dropout::new(0.2);
        let mask = dropout.mask(10_000, &mut rng);

        assert!(mask.iter().all(|m| *m == 0.0 || (*m - 1.25).abs() < 1e-12));
        let kept = mask.iter().filter(|m| **m > 0.0).count() as f64 / 10_000.0;
        assert!((0.75..0.85).contains(&kept));
    }
}
