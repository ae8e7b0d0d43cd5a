//! Biquad filter with WebAudio `BiquadFilterNode` coefficients, retuned
//! on the fly as its cutoff parameter moves.

use std::f64::consts::PI;

use serde::Serialize;

/// Filter response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Lowpass,
    Bandpass,
}

/// A 2nd-order IIR filter, Direct Form II Transposed.
///
/// Coefficients follow the Audio EQ Cookbook.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    filter_type: FilterType,
    q: f64,
    sample_rate: f64,
    /// Frequency the current coefficients were computed for.
    tuned_to: f64,

    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,

    z1: f64,
    z2: f64,
}

impl BiquadFilter {
    pub fn new(filter_type: FilterType, q: f64, sample_rate: f64) -> Self {
        BiquadFilter {
            filter_type,
            q: q.max(1e-4),
            sample_rate,
            tuned_to: f64::NAN,
            b0: 1.0,
            b1: 0.0,
            b2: 0.0,
            a1: 0.0,
            a2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Filter one sample with the cutoff (or centre) at `frequency` Hz.
    pub fn process(&mut self, input: f64, frequency: f64) -> f64 {
        if frequency != self.tuned_to {
            self.retune(frequency);
        }
        let output = self.b0 * input + self.z1;
        self.z1 = self.b1 * input - self.a1 * output + self.z2;
        self.z2 = self.b2 * input - self.a2 * output;
        output
    }

    fn retune(&mut self, frequency: f64) {
        let nyquist = self.sample_rate / 2.0;
        let f = frequency.clamp(10.0, nyquist * 0.99);
        let w0 = 2.0 * PI * f / self.sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * self.q);

        let (b0, b1, b2) = match self.filter_type {
            FilterType::Lowpass => {
                let b1 = 1.0 - cos_w0;
                (b1 / 2.0, b1, b1 / 2.0)
            }
            FilterType::Bandpass => (alpha, 0.0, -alpha),
        };
        let a0 = 1.0 + alpha;

        self.b0 = b0 / a0;
        self.b1 = b1 / a0;
        self.b2 = b2 / a0;
        self.a1 = -2.0 * cos_w0 / a0;
        self.a2 = (1.0 - alpha) / a0;
        self.tuned_to = frequency;
    }
}
