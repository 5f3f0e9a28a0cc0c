use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Sub, SubAssign};

use crate::activation::activation::sigmoid;

/// Dense row-major matrix of `f64`.
///
/// Element `(i, j)` lives at `data[i * cols + j]` and `data.len() == rows * cols`
/// always holds. Column vectors are `n × 1` matrices.
///
/// Operations that require matching shapes panic on a mismatch: a wrong shape
/// is a bug in the caller, never bad input data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMatrix")]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

#[derive(Deserialize)]
struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl TryFrom<RawMatrix> for Matrix {
    type Error = String;

    fn try_from(raw: RawMatrix) -> Result<Self, Self::Error> {
        if raw.rows == 0 || raw.cols == 0 {
            return Err(format!("matrix extents must be non-zero, got {}x{}", raw.rows, raw.cols));
        }
        let len = raw
            .rows
            .checked_mul(raw.cols)
            .ok_or_else(|| format!("matrix extents {}x{} overflow usize", raw.rows, raw.cols))?;
        if raw.data.len() != len {
            return Err(format!(
                "matrix {}x{} needs {} values, got {}",
                raw.rows, raw.cols, len, raw.data.len()
            ));
        }
        Ok(Matrix { rows: raw.rows, cols: raw.cols, data: raw.data })
    }
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        let len = checked_len(rows, cols);
        Matrix {
            rows,
            cols,
            data: vec![0.0; len],
        }
    }

    /// Uniform samples in [-1, 1] drawn from `rng`.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        for x in res.data.iter_mut() {
            *x = rng.gen::<f64>() * 2.0 - 1.0;
        }
        res
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Matrix {
        let len = checked_len(rows, cols);
        assert_eq!(
            data.len(),
            len,
            "Matrix {}x{} needs {} values, got {}",
            rows, cols, len, data.len()
        );
        Matrix { rows, cols, data }
    }

    /// Builds a matrix from nested rows; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Matrix {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, |r| r.len());
        assert!(rows.iter().all(|r| r.len() == n_cols), "Matrix rows have uneven lengths");
        Matrix::from_vec(n_rows, n_cols, rows.into_iter().flatten().collect())
    }

    /// Column vector (`values.len() × 1`).
    pub fn column(values: &[f64]) -> Matrix {
        Matrix::from_vec(values.len(), 1, values.to_vec())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[self.offset(i, j)]
    }

    pub fn set(&mut self, i: usize, j: usize, x: f64) {
        let k = self.offset(i, j);
        self.data[k] = x;
    }

    fn offset(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.rows && j < self.cols,
            "Index ({}, {}) out of bounds for {}x{} matrix",
            i, j, self.rows, self.cols
        );
        i * self.cols + j
    }

    fn assert_same_shape(&self, other: &Matrix, op: &str) {
        if self.shape() != other.shape() {
            panic!(
                "{}: matrices are of incorrect sizes ({}x{} vs {}x{})",
                op, self.rows, self.cols, other.rows, other.cols
            );
        }
    }

    pub fn fill(&mut self, x: f64) {
        self.data.fill(x);
    }

    /// Copies `src` into `self` element by element.
    pub fn copy_from(&mut self, src: &Matrix) {
        self.assert_same_shape(src, "copy");
        self.data.copy_from_slice(&src.data);
    }

    /// Copies a flat slice into `self`; the slice length must match exactly.
    pub fn copy_from_slice(&mut self, values: &[f64]) {
        assert_eq!(
            values.len(),
            self.data.len(),
            "copy: {} values do not fit a {}x{} matrix",
            values.len(), self.rows, self.cols
        );
        self.data.copy_from_slice(values);
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);

        for i in 0..self.rows {
            for j in 0..self.cols {
                res.data[j * res.cols + i] = self.data[i * self.cols + j];
            }
        }

        res
    }

    /// `self := a ⊙ b`.
    pub fn hadamard_into(&mut self, a: &Matrix, b: &Matrix) {
        a.assert_same_shape(b, "hadamard");
        self.assert_same_shape(a, "hadamard");
        for ((d, x), y) in self.data.iter_mut().zip(&a.data).zip(&b.data) {
            *d = x * y;
        }
    }

    /// `self := self ⊙ other`.
    pub fn hadamard_assign(&mut self, other: &Matrix) {
        self.assert_same_shape(other, "hadamard");
        for (d, y) in self.data.iter_mut().zip(&other.data) {
            *d *= y;
        }
    }

    pub fn scale(&mut self, x: f64) {
        for d in self.data.iter_mut() {
            *d *= x;
        }
    }

    /// Logistic function applied in place.
    pub fn sigmoid(&mut self) {
        self.map_in_place(sigmoid);
    }

    /// New matrix with every element set to `x - self(i, j)`.
    pub fn subtract_from_scalar(&self, x: f64) -> Matrix {
        self.map(|v| x - v)
    }

    /// `self := a · b` with the naive triple loop. `self` is zeroed first.
    pub fn multiply_into(&mut self, a: &Matrix, b: &Matrix) {
        if a.cols != b.rows || self.rows != a.rows || self.cols != b.cols {
            panic!(
                "multiply: matrices are of incorrect sizes ({}x{} = {}x{} · {}x{})",
                self.rows, self.cols, a.rows, a.cols, b.rows, b.cols
            );
        }

        self.fill(0.0);
        for i in 0..a.rows {
            for k in 0..a.cols {
                let lhs = a.data[i * a.cols + k];
                let b_row = &b.data[k * b.cols..(k + 1) * b.cols];
                let out_row = &mut self.data[i * self.cols..(i + 1) * self.cols];
                for (o, r) in out_row.iter_mut().zip(b_row) {
                    *o += lhs * r;
                }
            }
        }
    }

    /// `self := aᵀ · b` without materializing the transpose.
    pub fn transpose_multiply_into(&mut self, a: &Matrix, b: &Matrix) {
        if a.rows != b.rows || self.rows != a.cols || self.cols != b.cols {
            panic!(
                "transpose multiply: matrices are of incorrect sizes ({}x{} = ({}x{})ᵀ · {}x{})",
                self.rows, self.cols, a.rows, a.cols, b.rows, b.cols
            );
        }

        self.fill(0.0);
        for k in 0..a.rows {
            let a_row = &a.data[k * a.cols..(k + 1) * a.cols];
            let b_row = &b.data[k * b.cols..(k + 1) * b.cols];
            for (i, &lhs) in a_row.iter().enumerate() {
                let out_row = &mut self.data[i * self.cols..(i + 1) * self.cols];
                for (o, r) in out_row.iter_mut().zip(b_row) {
                    *o += lhs * r;
                }
            }
        }
    }

    /// Reinterprets `rows × cols` as `(rows * cols) × 1`. No data moves.
    pub fn flatten(&mut self) {
        self.rows *= self.cols;
        self.cols = 1;
    }

    pub fn map<F>(&self, functor: F) -> Matrix
    where
        F: Fn(f64) -> f64,
    {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    pub fn map_in_place<F>(&mut self, functor: F)
    where
        F: Fn(f64) -> f64,
    {
        for x in self.data.iter_mut() {
            *x = functor(*x);
        }
    }
}

/// `rows * cols`, panicking on empty or overflowing extents.
fn checked_len(rows: usize, cols: usize) -> usize {
    assert!(rows > 0 && cols > 0, "Matrix extents must be non-zero, got {}x{}", rows, cols);
    rows.checked_mul(cols)
        .unwrap_or_else(|| panic!("Matrix extents {}x{} overflow usize", rows, cols))
}

impl Index<(usize, usize)> for Matrix {
    type Output = f64;

    fn index(&self, (i, j): (usize, usize)) -> &f64 {
        &self.data[self.offset(i, j)]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (i, j): (usize, usize)) -> &mut f64 {
        let k = self.offset(i, j);
        &mut self.data[k]
    }
}

impl AddAssign<&Matrix> for Matrix {
    fn add_assign(&mut self, rhs: &Matrix) {
        self.assert_same_shape(rhs, "sum");
        for (d, x) in self.data.iter_mut().zip(&rhs.data) {
            *d += x;
        }
    }
}

impl SubAssign<&Matrix> for Matrix {
    fn sub_assign(&mut self, rhs: &Matrix) {
        self.assert_same_shape(rhs, "sub");
        for (d, x) in self.data.iter_mut().zip(&rhs.data) {
            *d -= x;
        }
    }
}

impl Add for Matrix {
    type Output = Matrix;

    fn add(mut self, rhs: Self) -> Self::Output {
        self += &rhs;
        self
    }
}

impl Sub for Matrix {
    type Output = Matrix;

    fn sub(mut self, rhs: Self) -> Self::Output {
        self -= &rhs;
        self
    }
}

impl Mul for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        if self.cols != rhs.rows {
            panic!(
                "multiply: matrices are of incorrect sizes ({}x{} · {}x{})",
                self.rows, self.cols, rhs.rows, rhs.cols
            );
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);
        res.multiply_into(self, rhs);
        res
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        &self * &rhs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn m(rows: Vec<Vec<f64>>) -> Matrix {
        Matrix::from_rows(rows)
    }

    #[test]
    fn multiply_known_product() {
        let a = m(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = m(vec![vec![5.0, 6.0], vec![7.0, 8.0]]);
        assert_eq!(&a * &b, m(vec![vec![19.0, 22.0], vec![43.0, 50.0]]));
    }

    #[test]
    fn multiply_shape_law() {
        let mut rng = StdRng::seed_from_u64(7);
        for (r, k, c) in [(1, 1, 1), (3, 5, 2), (4, 1, 6), (2, 7, 1)] {
            let a = Matrix::random(r, k, &mut rng);
            let b = Matrix::random(k, c, &mut rng);
            assert_eq!((&a * &b).shape(), (r, c));
        }
    }

    #[test]
    fn multiply_into_overwrites_previous_contents() {
        let a = m(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = m(vec![vec![5.0, 6.0], vec![7.0, 8.0]]);
        let mut dst = Matrix::zeros(2, 2);
        dst.fill(100.0);
        dst.multiply_into(&a, &b);
        assert_eq!(dst.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    #[should_panic(expected = "incorrect sizes")]
    fn multiply_rejects_inner_mismatch() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(2, 3);
        let _ = &a * &b;
    }

    #[test]
    #[should_panic(expected = "incorrect sizes")]
    fn multiply_into_rejects_wrong_destination() {
        let a = Matrix::zeros(2, 3);
        let b = Matrix::zeros(3, 4);
        let mut dst = Matrix::zeros(4, 2);
        dst.multiply_into(&a, &b);
    }

    #[test]
    fn transpose_multiply_matches_explicit_transpose() {
        let mut rng = StdRng::seed_from_u64(11);
        let a = Matrix::random(4, 3, &mut rng);
        let b = Matrix::random(4, 2, &mut rng);
        let mut dst = Matrix::zeros(3, 2);
        dst.transpose_multiply_into(&a, &b);
        let expected = &a.transpose() * &b;
        for (x, y) in dst.as_slice().iter().zip(expected.as_slice()) {
            assert!((x - y).abs() < 1e-12);
        }
    }

    #[test]
    fn transpose_swaps_indices() {
        let a = m(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
        let t = a.transpose();
        assert_eq!(t.shape(), (3, 2));
        for i in 0..2 {
            for j in 0..3 {
                assert_eq!(t[(j, i)], a[(i, j)]);
            }
        }
    }

    #[test]
    fn elementwise_ops() {
        let mut a = m(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = m(vec![vec![2.0, 2.0], vec![0.5, -1.0]]);

        let mut h = Matrix::zeros(2, 2);
        h.hadamard_into(&a, &b);
        assert_eq!(h.as_slice(), &[2.0, 4.0, 1.5, -4.0]);

        a += &b;
        assert_eq!(a.as_slice(), &[3.0, 4.0, 3.5, 3.0]);
        a -= &b;
        assert_eq!(a.as_slice(), &[1.0, 2.0, 3.0, 4.0]);

        a.scale(0.5);
        assert_eq!(a.as_slice(), &[0.5, 1.0, 1.5, 2.0]);

        let s = a.subtract_from_scalar(1.0);
        assert_eq!(s.as_slice(), &[0.5, 0.0, -0.5, -1.0]);
        assert_eq!(a.as_slice(), &[0.5, 1.0, 1.5, 2.0]);
    }

    #[test]
    #[should_panic(expected = "hadamard")]
    fn hadamard_rejects_mismatch() {
        let a = Matrix::zeros(2, 2);
        let b = Matrix::zeros(2, 1);
        let mut dst = Matrix::zeros(2, 2);
        dst.hadamard_into(&a, &b);
    }

    #[test]
    fn hadamard_assign_multiplies_in_place() {
        let mut a = Matrix::from_rows(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let b = Matrix::from_rows(vec![vec![2.0, 0.5], vec![-1.0, 0.0]]);
        a.hadamard_assign(&b);
        assert_eq!(a.as_slice(), &[2.0, 1.0, -3.0, 0.0]);
    }

    #[test]
    #[should_panic(expected = "hadamard")]
    fn hadamard_assign_rejects_mismatch() {
        let mut a = Matrix::zeros(2, 2);
        a.hadamard_assign(&Matrix::zeros(1, 2));
    }

    #[test]
    #[should_panic(expected = "overflow")]
    fn from_vec_rejects_overflowing_extents() {
        Matrix::from_vec(usize::MAX, 2, Vec::new());
    }

    #[test]
    #[should_panic(expected = "overflow")]
    fn zeros_rejects_overflowing_extents() {
        Matrix::zeros(usize::MAX / 2 + 1, 2);
    }

    #[test]
    #[should_panic(expected = "sum")]
    fn sum_rejects_mismatch() {
        let mut a = Matrix::zeros(3, 1);
        a += &Matrix::zeros(1, 3);
    }

    #[test]
    #[should_panic(expected = "sub")]
    fn sub_rejects_mismatch() {
        let mut a = Matrix::zeros(3, 2);
        a -= &Matrix::zeros(2, 3);
    }

    #[test]
    #[should_panic(expected = "copy")]
    fn copy_rejects_mismatch() {
        let mut a = Matrix::zeros(2, 2);
        a.copy_from(&Matrix::zeros(4, 1));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn index_out_of_range_panics() {
        let a = Matrix::zeros(2, 2);
        let _ = a[(0, 2)];
    }

    #[test]
    fn flatten_keeps_row_major_order() {
        let mut rng = StdRng::seed_from_u64(3);
        let (r, c) = (3, 4);
        let original = Matrix::random(r, c, &mut rng);
        let mut flat = original.clone();
        flat.flatten();
        assert_eq!(flat.shape(), (r * c, 1));
        for k in 0..r * c {
            assert_eq!(flat[(k, 0)], original[(k / c, k % c)]);
        }
    }

    #[test]
    fn sigmoid_in_place() {
        let mut a = m(vec![vec![0.0, 50.0, -50.0]]);
        a.sigmoid();
        assert_eq!(a[(0, 0)], 0.5);
        assert!(a[(0, 1)] < 1.0 && a[(0, 1)] > 0.5);
        assert!(a[(0, 2)] > 0.0 && a[(0, 2)] < 0.5);
    }

    #[test]
    fn random_stays_in_unit_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = Matrix::random(20, 20, &mut rng);
        assert!(a.as_slice().iter().all(|x| (-1.0..=1.0).contains(x)));
    }

    #[test]
    fn clone_is_deep() {
        let a = m(vec![vec![1.0, 2.0]]);
        let mut b = a.clone();
        b.set(0, 0, 9.0);
        assert_eq!(a[(0, 0)], 1.0);
        assert_eq!(b[(0, 0)], 9.0);
    }

    #[test]
    fn deserialize_rejects_bad_buffer_length() {
        let bad = r#"{"rows":2,"cols":2,"data":[1.0,2.0,3.0]}"#;
        assert!(serde_json::from_str::<Matrix>(bad).is_err());
        let good = r#"{"rows":1,"cols":2,"data":[1.0,2.0]}"#;
        let parsed: Matrix = serde_json::from_str(good).unwrap();
        assert_eq!(parsed.shape(), (1, 2));
    }
}
