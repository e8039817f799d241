//! Minimal complex-number type and a radix-2 Cooley-Tukey FFT.
//!
//! Kept hand-rolled rather than pulled from a crate: the transform is the
//! algorithmic core of this crate, not an implementation detail to hide
//! behind a dependency.

use std::f32::consts::PI;

#[derive(Debug, Clone, Copy, Default)]
pub struct Complex {
    pub re: f32,
    pub im: f32,
}

impl Complex {
    pub fn new(re: f32, im: f32) -> Self {
        Complex { re, im }
    }

    pub fn from_polar(r: f32, theta: f32) -> Self {
        Complex {
            re: r * theta.cos(),
            im: r * theta.sin(),
        }
    }

    pub fn norm_sqr(&self) -> f32 {
        self.re * self.re + self.im * self.im
    }

    pub fn norm(&self) -> f32 {
        self.norm_sqr().sqrt()
    }
}

impl std::ops::Add for Complex {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Complex {
            re: self.re + rhs.re,
            im: self.im + rhs.im,
        }
    }
}

impl std::ops::Sub for Complex {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Complex {
            re: self.re - rhs.re,
            im: self.im - rhs.im,
        }
    }
}

impl std::ops::Mul for Complex {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        // (a + bi)*(c + di) = (ac - bd) + i(ad + bc)
        Complex {
            re: self.re * rhs.re - self.im * rhs.im,
            im: self.re * rhs.im + self.im * rhs.re,
        }
    }
}

/// In-place radix-2 decimation-in-time FFT. `buf.len()` must be a power of
/// two.
pub fn fft_in_place(buf: &mut [Complex]) {
    let n = buf.len();
    if n <= 1 {
        return;
    }

    debug_assert!(n.is_power_of_two(), "fft_in_place requires a power-of-two length");

    let mut even: Vec<Complex> = Vec::with_capacity(n / 2);
    let mut odd: Vec<Complex> = Vec::with_capacity(n / 2);
    for (i, &sample) in buf.iter().enumerate() {
        if i % 2 == 0 {
            even.push(sample);
        } else {
            odd.push(sample);
        }
    }

    fft_in_place(&mut even);
    fft_in_place(&mut odd);

    for j in 0..n / 2 {
        let theta = (2.0 * PI * (j as f32)) / (n as f32);
        // forward transform uses the negative-angle convention
        let twiddle = Complex::from_polar(1.0, -theta);
        let odd_term = twiddle * odd[j];
        buf[j] = even[j] + odd_term;
        buf[j + n / 2] = even[j] - odd_term;
    }
}

/// Periodic Hann window of the given length.
pub fn hann_window(len: usize) -> Vec<f32> {
    if len <= 1 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (len - 1) as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_of_dc_signal_has_energy_only_in_bin_zero() {
        let mut buf: Vec<Complex> = (0..8).map(|_| Complex::new(1.0, 0.0)).collect();
        fft_in_place(&mut buf);
        assert!((buf[0].re - 8.0).abs() < 1e-3);
        for bin in &buf[1..] {
            assert!(bin.norm() < 1e-3);
        }
    }

    #[test]
    fn complex_multiplication_matches_textbook_formula() {
        let a = Complex::new(1.0, 2.0);
        let b = Complex::new(3.0, -1.0);
        let product = a * b;
        assert!((product.re - 5.0).abs() < 1e-6);
        assert!((product.im - 5.0).abs() < 1e-6);
    }

    #[test]
    fn hann_window_endpoints_are_near_zero() {
        let w = hann_window(64);
        assert!(w[0] < 1e-6);
        assert!(w[63] < 0.01);
    }
}
