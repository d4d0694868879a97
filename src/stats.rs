//! P-value adjustment for multiple testing.
//!
//! Implements the full `p.adjust` family (holm, hochberg, hommel,
//! bonferroni, BH, BY, none) with R's semantics as the reference: the
//! number of tests `m` counts only finite p-values, NaN entries stay NaN
//! without shifting anyone's rank, and monotonicity is enforced the same
//! way (cumulative max for step-down methods, cumulative min for step-up
//! methods).

use crate::models::CorrectionMethod;

/// Adjust a vector of p-values with the chosen method.
///
/// The returned vector is index-aligned with the input. NaN inputs yield
/// NaN outputs.
pub fn p_adjust(pvalues: &[f64], method: CorrectionMethod) -> Vec<f64> {
    match method {
        CorrectionMethod::None => pvalues.to_vec(),
        CorrectionMethod::Bonferroni => bonferroni(pvalues),
        CorrectionMethod::Holm => holm(pvalues),
        CorrectionMethod::Hochberg => hochberg(pvalues),
        CorrectionMethod::Hommel => hommel(pvalues),
        CorrectionMethod::BenjaminiHochberg => benjamini_hochberg(pvalues),
        CorrectionMethod::BenjaminiYekutieli => benjamini_yekutieli(pvalues),
    }
}

/// Indices of `pvalues` sorted ascending, NaN entries pushed to the end.
fn ascending_order(pvalues: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..pvalues.len()).collect();
    indices.sort_by(|&a, &b| {
        let pa = pvalues[a];
        let pb = pvalues[b];
        if pa.is_nan() && pb.is_nan() {
            std::cmp::Ordering::Equal
        } else if pa.is_nan() {
            std::cmp::Ordering::Greater
        } else if pb.is_nan() {
            std::cmp::Ordering::Less
        } else {
            pa.partial_cmp(&pb).unwrap()
        }
    });
    indices
}

fn finite_count(pvalues: &[f64]) -> usize {
    pvalues.iter().filter(|p| p.is_finite()).count()
}

/// Bonferroni: `min(1, p * m)`, controls the family-wise error rate.
pub fn bonferroni(pvalues: &[f64]) -> Vec<f64> {
    let m = finite_count(pvalues);
    if m == 0 {
        return vec![f64::NAN; pvalues.len()];
    }
    pvalues
        .iter()
        .map(|&p| {
            if p.is_nan() {
                f64::NAN
            } else {
                (p * m as f64).min(1.0)
            }
        })
        .collect()
}

/// Holm step-down: cumulative max of `(m - rank + 1) * p` over ascending
/// ranks, capped at 1.
pub fn holm(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    let m = finite_count(pvalues);
    if m == 0 {
        return vec![f64::NAN; n];
    }

    let indices = ascending_order(pvalues);
    let mut adjusted = vec![f64::NAN; n];
    let mut cummax = 0.0_f64;

    for (rank0, &i) in indices.iter().enumerate().take(m) {
        let adj = ((m - rank0) as f64 * pvalues[i]).min(1.0);
        cummax = cummax.max(adj);
        adjusted[i] = cummax;
    }

    adjusted
}

/// Hochberg step-up: cumulative min of `(m - rank + 1) * p` walking from
/// the largest p-value down.
pub fn hochberg(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    let m = finite_count(pvalues);
    if m == 0 {
        return vec![f64::NAN; n];
    }

    let indices = ascending_order(pvalues);
    let mut adjusted = vec![f64::NAN; n];
    let mut cummin = f64::INFINITY;

    for (rank0, &i) in indices.iter().enumerate().take(m).rev() {
        let adj = ((m - rank0) as f64 * pvalues[i]).min(1.0);
        cummin = cummin.min(adj);
        adjusted[i] = cummin;
    }

    adjusted
}

/// Hommel's closed-testing adjustment, following the algorithm used by R's
/// `p.adjust`. Coincides with Hochberg for fewer than three tests, which
/// is also how the short inputs are handled here (the inner loop needs
/// `m >= 3`).
pub fn hommel(pvalues: &[f64]) -> Vec<f64> {
    let n = pvalues.len();
    let m = finite_count(pvalues);
    if m < 3 {
        return hochberg(pvalues);
    }

    let indices = ascending_order(pvalues);
    // Sorted finite p-values; position k here is rank k+1.
    let sorted: Vec<f64> = indices.iter().take(m).map(|&i| pvalues[i]).collect();

    let q_init = (0..m)
        .map(|k| m as f64 * sorted[k] / (k + 1) as f64)
        .fold(f64::INFINITY, f64::min);
    let mut q = vec![q_init; m];
    let mut pa = vec![q_init; m];

    for w in (2..m).rev() {
        // Tail block: the w-1 largest p-values, scaled by w over 2..=w.
        let tail_start = m - w + 1;
        let q1 = (tail_start..m)
            .map(|k| w as f64 * sorted[k] / (k - tail_start + 2) as f64)
            .fold(f64::INFINITY, f64::min);
        for k in 0..tail_start {
            q[k] = (w as f64 * sorted[k]).min(q1);
        }
        let head_last = q[tail_start - 1];
        for k in tail_start..m {
            q[k] = head_last;
        }
        for k in 0..m {
            pa[k] = pa[k].max(q[k]);
        }
    }

    let mut adjusted = vec![f64::NAN; n];
    for (k, &i) in indices.iter().enumerate().take(m) {
        adjusted[i] = pa[k].max(sorted[k]).min(1.0);
    }
    adjusted
}

/// Benjamini-Hochberg step-up FDR adjustment: cumulative min of
/// `p * m / rank` from the largest p-value down.
pub fn benjamini_hochberg(pvalues: &[f64]) -> Vec<f64> {
    bh_with_scale(pvalues, 1.0)
}

/// Benjamini-Yekutieli: BH scaled by `c(m) = sum_{i=1..m} 1/i`, valid
/// under arbitrary dependence.
pub fn benjamini_yekutieli(pvalues: &[f64]) -> Vec<f64> {
    let m = finite_count(pvalues);
    if m == 0 {
        return vec![f64::NAN; pvalues.len()];
    }
    let cm: f64 = (1..=m).map(|i| 1.0 / i as f64).sum();
    bh_with_scale(pvalues, cm)
}

fn bh_with_scale(pvalues: &[f64], scale: f64) -> Vec<f64> {
    let n = pvalues.len();
    let m = finite_count(pvalues);
    if m == 0 {
        return vec![f64::NAN; n];
    }

    let indices = ascending_order(pvalues);
    let mut adjusted = vec![f64::NAN; n];
    let mut cummin = f64::INFINITY;

    for (rank0, &i) in indices.iter().enumerate().take(m).rev() {
        let adj = (scale * pvalues[i] * m as f64 / (rank0 + 1) as f64).min(1.0);
        cummin = cummin.min(adj);
        adjusted[i] = cummin;
    }

    adjusted
}
