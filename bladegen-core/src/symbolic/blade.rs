//! Basis blades encoded as bitmaps over the basis vectors.

pub fn grade(bitmap: u32) -> u32 {
    bitmap.count_ones()
}

/// Sign picked up when reordering `a ^ b` into canonical order.
pub fn reordering_sign(a: u32, b: u32) -> f64 {
    let mut a = a >> 1;
    let mut swaps = 0;
    while a != 0 {
        swaps += (a & b).count_ones();
        a >>= 1;
    }
    if swaps & 1 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// Geometric product of two basis blades under an orthogonal metric.
pub fn geometric_product(a: u32, b: u32, diagonal: &[f64]) -> (u32, f64) {
    let mut sign = reordering_sign(a, b);
    let mut common = a & b;
    let mut i = 0;
    while common != 0 {
        if common & 1 != 0 {
            sign *= diagonal[i];
        }
        common >>= 1;
        i += 1;
    }
    (a ^ b, sign)
}

pub fn outer_product(a: u32, b: u32) -> Option<(u32, f64)> {
    if a & b != 0 {
        None
    } else {
        Some((a | b, reordering_sign(a, b)))
    }
}

pub fn reverse_sign(grade: u32) -> f64 {
    if (grade * grade.saturating_sub(1) / 2) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

pub fn involution_sign(grade: u32) -> f64 {
    if grade % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

pub fn conjugate_sign(grade: u32) -> f64 {
    if (grade * (grade + 1) / 2) % 2 == 0 {
        1.0
    } else {
        -1.0
    }
}

/// All blades of one grade in a space of `dimension` basis vectors, by bitmap order.
pub fn blades_of_grade(dimension: usize, grade: u32) -> Vec<u32> {
    (0..1u32 << dimension)
        .filter(|b| b.count_ones() == grade)
        .collect()
}

/// Outer product of sparse numeric multivectors given as (bitmap, coefficient) lists.
pub fn outer_numeric(a: &[(u32, f64)], b: &[(u32, f64)]) -> Vec<(u32, f64)> {
    let mut out: Vec<(u32, f64)> = Vec::new();
    for &(ba, ca) in a {
        for &(bb, cb) in b {
            if let Some((bitmap, sign)) = outer_product(ba, bb) {
                let value = sign * ca * cb;
                match out.iter_mut().find(|(k, _)| *k == bitmap) {
                    Some(entry) => entry.1 += value,
                    None => out.push((bitmap, value)),
                }
            }
        }
    }
    out.retain(|(_, c)| *c != 0.0);
    out.sort_by_key(|(k, _)| *k);
    out
}
