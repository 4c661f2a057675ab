//! Adam optimizer over flat parameter buffers

/// Adam with bias-corrected step size
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
    step: i32,
    first_moments: Vec<Vec<f64>>,
    second_moments: Vec<Vec<f64>>,
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.001)
    }
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            step: 0,
            first_moments: Vec::new(),
            second_moments: Vec::new(),
        }
    }

    /// Apply one update; `params` and `grads` must list buffers in the same order every call
    pub fn apply(&mut self, params: Vec<&mut Vec<f64>>, grads: Vec<&Vec<f64>>) {
        debug_assert_eq!(params.len(), grads.len());

        if self.first_moments.is_empty() {
            self.first_moments = grads.iter().map(|g| vec![0.0; g.len()]).collect();
            self.second_moments = self.first_moments.clone();
        }

        self.step += 1;
        let correction1 = 1.0 - self.beta1.powi(self.step);
        let correction2 = 1.0 - self.beta2.powi(self.step);
        let step_size = self.learning_rate * correction2.sqrt() / correction1;

        for (idx, (param, grad)) in params.into_iter().zip(grads).enumerate() {
            let m = &mut self.first_moments[idx];
            let v = &mut self.second_moments[idx];

            for k in 0..param.len() {
                let g = grad[k];
                m[k] = self.beta1 * m[k] + (1.0 - self.beta1) * g;
                v[k] = self.beta2 * v[k] + (1.0 - self.beta2) * g * g;
                param[k] -= step_size * m[k] / (v[k].sqrt() + self.epsilon);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_step_moves_by_learning_rate() {
        let mut adam = Adam::new(0.1);
        let mut param = vec![1.0, -1.0];
        let grad = vec![4.0, -0.5];

        adam.apply(vec![&mut param], vec![&grad]);

        // Bias correction makes the first step ~lr * sign(g)
        assert!((param[0] - 0.9).abs() < 1e-6);
        assert!((param[1] + 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_minimizes_quadratic() {
        let mut adam = Adam::new(0.05);
        let mut param = vec![3.0];

        for _ in 0..2000 {
            let grad = vec![2.0 * (param[0] - 1.5)];
            adam.apply(vec![&mut param], vec![&grad]);
        }

        assert!((param[0] - 1.5).abs() < 1e-2);
    }
}
