//! Descriptive statistics shared by the calculators.
//!
//! Missing observations are NaN on input and `None` on output. Only
//! [`forward_fill`] bridges gaps, and only when a caller asks for it.

/// Day-over-day fractional change. Same length as the input; the first
/// element is always `None`, as is any change with a missing or zero base.
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(None);
    out.extend(values.windows(2).map(|w| {
        let (prev, cur) = (w[0], w[1]);
        if prev.is_finite() && cur.is_finite() && prev != 0.0 {
            Some((cur - prev) / prev)
        } else {
            None
        }
    }));
    out
}

/// Carry the last present value forward over NaN gaps. Leading gaps stay NaN.
pub fn forward_fill(values: &[f64]) -> Vec<f64> {
    let mut last = f64::NAN;
    values
        .iter()
        .map(|&v| {
            if v.is_finite() {
                last = v;
            }
            last
        })
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1). `None` below two observations.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Pearson correlation over pairwise-complete observations.
///
/// `None` with fewer than two complete pairs or when either side has zero
/// variance over those pairs.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let (dx, dy) = (x - mean_x, y - mean_y);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x <= f64::EPSILON * f64::EPSILON || var_y <= f64::EPSILON * f64::EPSILON {
        return None;
    }
    Some((cov / (var_x * var_y).sqrt()).clamp(-1.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pct_change_leads_with_none() {
        let r = pct_change(&[100.0, 110.0, 99.0]);
        assert_eq!(r.len(), 3);
        assert_eq!(r[0], None);
        assert!((r[1].unwrap() - 0.1).abs() < 1e-12);
        assert!((r[2].unwrap() + 0.1).abs() < 1e-12);
    }

    #[test]
    fn pct_change_does_not_bridge_gaps() {
        let r = pct_change(&[100.0, f64::NAN, 120.0, 0.0, 5.0]);
        assert_eq!(r[1], None);
        assert_eq!(r[2], None);
        assert_eq!(r[4], None);
        assert!(r[3].is_some());
    }

    #[test]
    fn forward_fill_keeps_leading_gaps() {
        let filled = forward_fill(&[f64::NAN, 20.0, f64::NAN, 24.0, f64::NAN]);
        assert!(filled[0].is_nan());
        assert_eq!(&filled[1..], &[20.0, 20.0, 24.0, 24.0]);
    }

    #[test]
    fn std_dev_needs_two_values() {
        assert_eq!(sample_std_dev(&[]), None);
        assert_eq!(sample_std_dev(&[1.0]), None);
        let sd = sample_std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((sd - 2.138089935299395).abs() < 1e-12);
    }

    #[test]
    fn pearson_detects_perfect_relationships() {
        let x = [Some(1.0), Some(2.0), Some(3.0)];
        let up = [Some(2.0), Some(4.0), Some(6.0)];
        let down = [Some(3.0), Some(2.0), Some(1.0)];
        assert!((pearson(&x, &up).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&x, &down).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_uses_pairwise_complete_rows() {
        let x = [None, Some(1.0), Some(2.0), Some(9.0), Some(3.0)];
        let y = [Some(5.0), Some(1.0), Some(2.0), None, Some(3.0)];
        assert!((pearson(&x, &y).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_undefined_for_constant_or_short_input() {
        assert_eq!(pearson(&[Some(1.0)], &[Some(2.0)]), None);
        assert_eq!(
            pearson(&[Some(1.0), Some(1.0)], &[Some(2.0), Some(3.0)]),
            None
        );
    }
}
