//! Nearest-valid-neighbour gap filling.
//!
//! Every invalid cell takes the value of the closest valid cell under
//! Euclidean pixel distance. The nearest source is found with a separable
//! feature transform: a column pass records the nearest valid row in each
//! column, then a row pass builds the lower envelope of the parabolas
//! `(c - c')^2 + dy(c')^2` and reads the winning column for every cell.

/// Index of the nearest valid cell for every cell of a `rows x cols` grid,
/// or `None` when the grid holds no valid cell at all.
///
/// Ties resolve towards the smaller row in the column pass and the smaller
/// column in the row pass.
pub fn nearest_valid_indices(valid: &[bool], rows: usize, cols: usize) -> Option<Vec<usize>> {
    debug_assert_eq!(valid.len(), rows * cols);
    if !valid.iter().any(|&v| v) {
        return None;
    }

    // Column pass: nearest valid row within the same column.
    let mut nearest_row: Vec<Option<usize>> = vec![None; rows * cols];
    for c in 0..cols {
        let mut last: Option<usize> = None;
        for r in 0..rows {
            if valid[r * cols + c] {
                last = Some(r);
            }
            nearest_row[r * cols + c] = last;
        }
        let mut next: Option<usize> = None;
        for r in (0..rows).rev() {
            if valid[r * cols + c] {
                next = Some(r);
            }
            let idx = r * cols + c;
            if let Some(n) = next {
                let closer = match nearest_row[idx] {
                    Some(p) => n - r < r - p,
                    None => true,
                };
                if closer {
                    nearest_row[idx] = Some(n);
                }
            }
        }
    }

    // Row pass: lower envelope over the columns that have a source.
    let mut nearest = vec![0usize; rows * cols];
    let mut sites: Vec<(usize, usize, f64)> = Vec::with_capacity(cols);
    let mut hull: Vec<usize> = Vec::with_capacity(cols);
    let mut bounds: Vec<f64> = Vec::with_capacity(cols + 1);

    for r in 0..rows {
        sites.clear();
        for c in 0..cols {
            if let Some(src) = nearest_row[r * cols + c] {
                let dy = src.abs_diff(r) as f64;
                sites.push((c, src, dy * dy));
            }
        }
        if sites.is_empty() {
            continue;
        }

        hull.clear();
        bounds.clear();
        hull.push(0);
        bounds.push(f64::NEG_INFINITY);
        for q in 1..sites.len() {
            let mut s = intersection(sites[*hull.last().unwrap_or(&0)], sites[q]);
            while let Some(&boundary) = bounds.last() {
                if s > boundary || hull.len() == 1 {
                    break;
                }
                hull.pop();
                bounds.pop();
                s = intersection(sites[*hull.last().unwrap_or(&0)], sites[q]);
            }
            hull.push(q);
            bounds.push(s);
        }

        let mut k = 0;
        for c in 0..cols {
            let x = c as f64;
            while k + 1 < hull.len() && bounds[k + 1] < x {
                k += 1;
            }
            let (src_col, src_row, _) = sites[hull[k]];
            nearest[r * cols + c] = src_row * cols + src_col;
        }
    }

    Some(nearest)
}

/// Abscissa where the parabola of `q` drops below the one of `p`.
fn intersection(p: (usize, usize, f64), q: (usize, usize, f64)) -> f64 {
    let (pc, _, pf) = p;
    let (qc, _, qf) = q;
    let (pc, qc) = (pc as f64, qc as f64);
    ((qf + qc * qc) - (pf + pc * pc)) / (2.0 * (qc - pc))
}
