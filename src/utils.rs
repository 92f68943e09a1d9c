use ultraviolet::DVec3;

/// Component `axis` (0 = x, 1 = y, 2 = z) of a vector.
#[inline]
pub fn component(v: DVec3, axis: usize) -> f64 {
    match axis {
        0 => v.x,
        1 => v.y,
        _ => v.z,
    }
}

#[inline]
pub fn component_mut(v: &mut DVec3, axis: usize) -> &mut f64 {
    match axis {
        0 => &mut v.x,
        1 => &mut v.y,
        _ => &mut v.z,
    }
}

#[inline]
pub fn to_array(v: DVec3) -> [f64; 3] {
    [v.x, v.y, v.z]
}

#[inline]
pub fn from_array(a: [f64; 3]) -> DVec3 {
    DVec3::new(a[0], a[1], a[2])
}

/// True when `n` factors into 2, 3, 5 and 7 only (FFT friendly).
pub fn is_smooth(mut n: usize) -> bool {
    if n == 0 {
        return false;
    }
    for p in [2, 3, 5, 7] {
        while n % p == 0 {
            n /= p;
        }
    }
    n == 1
}

/// Smallest FFT-friendly integer that is `>= n`.
pub fn next_smooth(n: usize) -> usize {
    let mut m = n.max(1);
    while !is_smooth(m) {
        m += 1;
    }
    m
}

/// Evenly spaced samples over `[lo, hi]`, endpoints included.
pub fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (n - 1) as f64;
            (0..n).map(|i| lo + step * i as f64).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smooth_numbers() {
        assert!(is_smooth(64));
        assert!(is_smooth(60));
        assert!(!is_smooth(11));
        assert_eq!(next_smooth(11), 12);
        assert_eq!(next_smooth(13), 14);
        assert_eq!(next_smooth(0), 1);
    }

    #[test]
    fn linspace_includes_endpoints() {
        let v = linspace(1.0, 2.0, 5);
        assert_eq!(v.len(), 5);
        assert_eq!(v[0], 1.0);
        assert!((v[4] - 2.0).abs() < 1e-15);
    }
}
