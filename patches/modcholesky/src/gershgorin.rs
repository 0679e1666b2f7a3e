// Copyright 2018-2020 argmin developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

/// Gershgorin circles
///
/// # References
///
/// * Semyon Aranovich Gerschgorin.
///   Über die Abgrenzung der Eigenwerte einer Matrix.
///   Izv. Akad. Nauk. USSR Otd. Fiz.-Mat. Nauk, 6: 749–754, 1931.
pub trait GershgorinCircles {
    /// Computes the Gershgorin Circles of a matrix
    fn gershgorin_circles(&self) -> Vec<(f64, f64)>;
}

impl GershgorinCircles for ndarray::Array2<f64> {
    /// Computes the Gershgorin Circles of a matrix
    fn gershgorin_circles(&self) -> Vec<(f64, f64)> {
        debug_assert!(self.is_square());
        let n = self.raw_dim()[0];
        let mut out: Vec<(f64, f64)> = Vec::with_capacity(n);
        for i in 0..n {
            // TODO: do this with slices instead of loops
            let aii = self[(i, i)];
            let mut ri = 0.0;
            let mut ci = 0.0;
            for j in 0..n {
                if i == j {
                    continue;
                }
                ri += self[(i, j)].abs();
                ci += self[(j, i)].abs();
            }
            out.push((aii, ri.min(ci)));
        }
        out
    }
}
