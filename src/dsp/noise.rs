//! White noise buffers for the crowd roar and claps.

use rand::Rng;

/// Fill `len` samples with uniform white noise in `[-amplitude, amplitude)`.
pub fn white_noise<R: Rng>(len: usize, amplitude: f64, rng: &mut R) -> Vec<f64> {
    (0..len)
        .map(|_| (rng.random::<f64>() * 2.0 - 1.0) * amplitude)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn bounded_by_amplitude() {
        let mut rng = Pcg32::seed_from_u64(9);
        let buf = white_noise(48_000, 0.5, &mut rng);
        assert_eq!(buf.len(), 48_000);
        assert!(buf.iter().all(|s| (-0.5..0.5).contains(s)));
    }

    #[test]
    fn roughly_zero_mean() {
        let mut rng = Pcg32::seed_from_u64(10);
        let buf = white_noise(100_000, 1.0, &mut rng);
        let mean = buf.iter().sum::<f64>() / buf.len() as f64;
        assert!(mean.abs() < 0.02, "mean {mean}");
    }
}
