use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Dense row-major matrix backed by one flat buffer.
///
/// `resize` keeps the allocation whenever the new element count fits in the
/// current capacity, so per-batch buffers can follow a shrinking final
/// minibatch without reallocating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub rows: usize,
    pub cols: usize,
    pub data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Matrix {
        Matrix {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Wraps a row-major buffer. Panics if `data.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Matrix {
        if data.len() != rows * cols {
            panic!("Matrices are of incorrect sizes")
        }
        Matrix { rows, cols, data }
    }

    /// Builds a matrix from nested rows. All rows must have the same length.
    pub fn from_data(data: Vec<Vec<f64>>) -> Matrix {
        let rows = data.len();
        let cols = data.first().map_or(0, |row| row.len());
        let mut flat = Vec::with_capacity(rows * cols);
        for row in data {
            if row.len() != cols {
                panic!("Matrices are of incorrect sizes")
            }
            flat.extend(row);
        }
        Matrix {
            rows,
            cols,
            data: flat,
        }
    }

    /// Uniform samples in `[-1, 1)`.
    pub fn random<R: Rng + ?Sized>(rows: usize, cols: usize, rng: &mut R) -> Matrix {
        let mut res = Matrix::zeros(rows, cols);
        res.data
            .iter_mut()
            .for_each(|x| *x = rng.gen::<f64>() * 2.0 - 1.0);
        res
    }

    pub fn transpose(&self) -> Matrix {
        let mut res = Matrix::zeros(self.cols, self.rows);

        for i in 0..res.rows {
            for j in 0..res.cols {
                res.data[i * res.cols + j] = self.data[j * self.cols + i];
            }
        }

        res
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

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// Changes the logical shape. Contents are unspecified afterwards.
    pub fn resize(&mut self, rows: usize, cols: usize) {
        self.rows = rows;
        self.cols = cols;
        self.data.resize(rows * cols, 0.0);
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn view(&self) -> MatRef<'_> {
        MatRef::new(self.rows, self.cols, self.cols, &self.data)
    }

    pub fn view_mut(&mut self) -> MatMut<'_> {
        MatMut::new(self.rows, self.cols, self.cols, &mut self.data)
    }

    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix {
            rows: 0,
            cols: 0,
            data: vec![],
        }
    }
}

impl Mul for &Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        if self.cols != rhs.rows {
            panic!("Matrices are of incorrect sizes")
        }

        let mut res = Matrix::zeros(self.rows, rhs.cols);
        gemm_nn(self.view(), rhs.view(), res.view_mut());
        res
    }
}

impl Mul for Matrix {
    type Output = Matrix;

    fn mul(self, rhs: Self) -> Self::Output {
        &self * &rhs
    }
}

#[inline]
fn required_len(rows: usize, cols: usize, stride: usize) -> usize {
    if rows == 0 || cols == 0 {
        0
    } else {
        (rows - 1) * stride + cols
    }
}

/// Borrowed, possibly strided, read-only matrix view.
#[derive(Debug, Clone, Copy)]
pub struct MatRef<'a> {
    rows: usize,
    cols: usize,
    stride: usize,
    data: &'a [f64],
}

impl<'a> MatRef<'a> {
    pub fn new(rows: usize, cols: usize, stride: usize, data: &'a [f64]) -> Self {
        assert!(cols <= stride || rows <= 1, "stride shorter than a row");
        assert!(
            required_len(rows, cols, stride) <= data.len(),
            "view exceeds its buffer"
        );
        MatRef {
            rows,
            cols,
            stride,
            data,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn row(&self, i: usize) -> &'a [f64] {
        let start = i * self.stride;
        &self.data[start..start + self.cols]
    }

    #[inline]
    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.row(i)[j]
    }

    /// Rows `start..end`.
    pub fn rows_range(&self, start: usize, end: usize) -> MatRef<'a> {
        assert!(start <= end && end <= self.rows, "row range out of bounds");
        if start == end {
            return MatRef::new(0, self.cols, self.stride, &[]);
        }
        MatRef::new(end - start, self.cols, self.stride, &self.data[start * self.stride..])
    }

    /// Every row but the first; for a weight matrix this drops the bias row.
    pub fn skip_first_row(&self) -> MatRef<'a> {
        self.rows_range(1.min(self.rows), self.rows)
    }

    /// Every column but the first; for `NextX1` this is `Ypred`.
    pub fn skip_first_col(&self) -> MatRef<'a> {
        if self.rows == 0 || self.cols == 0 {
            return MatRef::new(self.rows, self.cols.saturating_sub(1), self.stride, &[]);
        }
        MatRef::new(self.rows, self.cols - 1, self.stride, &self.data[1..])
    }

    pub fn to_matrix(&self) -> Matrix {
        let mut data = Vec::with_capacity(self.rows * self.cols);
        for i in 0..self.rows {
            data.extend_from_slice(self.row(i));
        }
        Matrix::from_vec(self.rows, self.cols, data)
    }

    pub fn is_finite(&self) -> bool {
        (0..self.rows).all(|i| self.row(i).iter().all(|x| x.is_finite()))
    }
}

/// Borrowed, possibly strided, mutable matrix view.
#[derive(Debug)]
pub struct MatMut<'a> {
    rows: usize,
    cols: usize,
    stride: usize,
    data: &'a mut [f64],
}

impl<'a> MatMut<'a> {
    pub fn new(rows: usize, cols: usize, stride: usize, data: &'a mut [f64]) -> Self {
        assert!(cols <= stride || rows <= 1, "stride shorter than a row");
        assert!(
            required_len(rows, cols, stride) <= data.len(),
            "view exceeds its buffer"
        );
        MatMut {
            rows,
            cols,
            stride,
            data,
        }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        let start = i * self.stride;
        &self.data[start..start + self.cols]
    }

    #[inline]
    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        let start = i * self.stride;
        &mut self.data[start..start + self.cols]
    }

    #[inline]
    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.row(i)[j]
    }

    #[inline]
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.row_mut(i)[j] = value;
    }

    /// Reborrows as a read-only view.
    pub fn rb(&self) -> MatRef<'_> {
        MatRef::new(self.rows, self.cols, self.stride, &*self.data)
    }

    /// Reborrows mutably for a shorter lifetime.
    pub fn rb_mut(&mut self) -> MatMut<'_> {
        MatMut::new(self.rows, self.cols, self.stride, &mut *self.data)
    }

    pub fn skip_first_col(self) -> MatMut<'a> {
        if self.rows == 0 || self.cols == 0 {
            return MatMut::new(self.rows, self.cols.saturating_sub(1), self.stride, &mut []);
        }
        MatMut::new(self.rows, self.cols - 1, self.stride, &mut self.data[1..])
    }

    pub fn fill(&mut self, value: f64) {
        for i in 0..self.rows {
            self.row_mut(i).fill(value);
        }
    }

    pub fn copy_from(&mut self, src: MatRef<'_>) {
        assert_same_shape(src.rows, src.cols, self.rows, self.cols);
        for i in 0..self.rows {
            self.row_mut(i).copy_from_slice(src.row(i));
        }
    }

    /// `self = self ⊙ other`.
    pub fn mul_elem(&mut self, other: MatRef<'_>) {
        assert_same_shape(other.rows, other.cols, self.rows, self.cols);
        for i in 0..self.rows {
            for (x, &y) in self.row_mut(i).iter_mut().zip(other.row(i)) {
                *x *= y;
            }
        }
    }

    /// Applies `f` elementwise on `src`, writing into `self`.
    pub fn apply_from<F>(&mut self, src: MatRef<'_>, f: F)
    where
        F: Fn(f64) -> f64,
    {
        assert_same_shape(src.rows, src.cols, self.rows, self.cols);
        for i in 0..self.rows {
            for (dst, &x) in self.row_mut(i).iter_mut().zip(src.row(i)) {
                *dst = f(x);
            }
        }
    }
}

#[inline]
fn assert_same_shape(rows: usize, cols: usize, expected_rows: usize, expected_cols: usize) {
    if rows != expected_rows || cols != expected_cols {
        panic!("Matrices are of incorrect sizes")
    }
}

/// `c = a · b`
pub fn gemm_nn(a: MatRef<'_>, b: MatRef<'_>, mut c: MatMut<'_>) {
    assert_same_shape(a.cols, c.cols, b.rows, b.cols);
    assert_eq!(a.rows, c.rows, "Matrices are of incorrect sizes");

    for i in 0..a.rows {
        let a_row = a.row(i);
        let c_row = c.row_mut(i);
        c_row.fill(0.0);
        for (k, &aik) in a_row.iter().enumerate() {
            for (cij, &bkj) in c_row.iter_mut().zip(b.row(k)) {
                *cij += aik * bkj;
            }
        }
    }
}

/// `c = aᵀ · b`
pub fn gemm_tn(a: MatRef<'_>, b: MatRef<'_>, mut c: MatMut<'_>) {
    assert_eq!(a.rows, b.rows, "Matrices are of incorrect sizes");
    assert_same_shape(c.rows, c.cols, a.cols, b.cols);

    c.fill(0.0);
    for s in 0..a.rows {
        let b_row = b.row(s);
        for (i, &asi) in a.row(s).iter().enumerate() {
            for (cij, &bsj) in c.row_mut(i).iter_mut().zip(b_row) {
                *cij += asi * bsj;
            }
        }
    }
}

/// `c = a · bᵀ`
pub fn gemm_nt(a: MatRef<'_>, b: MatRef<'_>, mut c: MatMut<'_>) {
    assert_eq!(a.cols, b.cols, "Matrices are of incorrect sizes");
    assert_same_shape(c.rows, c.cols, a.rows, b.rows);

    for i in 0..a.rows {
        let a_row = a.row(i);
        for j in 0..b.rows {
            let dot = a_row.iter().zip(b.row(j)).map(|(x, y)| x * y).sum();
            c.set(i, j, dot);
        }
    }
}

/// Writes `[1 | src]` into `dst`.
pub fn copy_prepend_ones(src: MatRef<'_>, mut dst: MatMut<'_>) {
    assert_same_shape(dst.rows, dst.cols, src.rows, src.cols + 1);
    for i in 0..src.rows {
        let row = dst.row_mut(i);
        row[0] = 1.0;
        row[1..].copy_from_slice(src.row(i));
    }
}

pub fn frobenius_norm(values: &[f64]) -> f64 {
    values.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Modified Gram-Schmidt over the smaller dimension: the columns of a tall
/// matrix, the rows of a wide one. Vectors that collapse to zero are left as
/// they are.
pub fn orthonormalize(m: &mut MatMut<'_>) {
    const EPS: f64 = 1e-12;

    let by_cols = m.rows >= m.cols;
    let (count, len) = if by_cols {
        (m.cols, m.rows)
    } else {
        (m.rows, m.cols)
    };
    let idx = |v: usize, e: usize| if by_cols { (e, v) } else { (v, e) };

    for v in 0..count {
        for u in 0..v {
            let dot: f64 = (0..len)
                .map(|e| {
                    let (vi, vj) = idx(v, e);
                    let (ui, uj) = idx(u, e);
                    m.at(vi, vj) * m.at(ui, uj)
                })
                .sum();
            for e in 0..len {
                let (vi, vj) = idx(v, e);
                let (ui, uj) = idx(u, e);
                let value = m.at(vi, vj) - dot * m.at(ui, uj);
                m.set(vi, vj, value);
            }
        }
        let norm = (0..len)
            .map(|e| {
                let (i, j) = idx(v, e);
                m.at(i, j).powi(2)
            })
            .sum::<f64>()
            .sqrt();
        if norm > EPS {
            for e in 0..len {
                let (i, j) = idx(v, e);
                let value = m.at(i, j) / norm;
                m.set(i, j, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn gemm_variants_agree_with_transpose() {
        let mut rng = StdRng::seed_from_u64(3);
        let a = Matrix::random(4, 3, &mut rng);
        let b = Matrix::random(4, 2, &mut rng);

        let mut tn = Matrix::zeros(3, 2);
        gemm_tn(a.view(), b.view(), tn.view_mut());
        let expected = &a.transpose() * &b;
        assert!(tn.data.iter().zip(&expected.data).all(|(x, y)| close(*x, *y)));

        let c = Matrix::random(5, 3, &mut rng);
        let mut nt = Matrix::zeros(4, 5);
        gemm_nt(a.view(), c.view(), nt.view_mut());
        let expected = &a * &c.transpose();
        assert!(nt.data.iter().zip(&expected.data).all(|(x, y)| close(*x, *y)));
    }

    #[test]
    fn resize_reuses_the_allocation_when_shrinking() {
        let mut m = Matrix::zeros(200, 5);
        let cap = m.capacity();
        let ptr = m.data.as_ptr();
        m.resize(18, 5);
        m.resize(200, 5);
        assert_eq!(m.capacity(), cap);
        assert_eq!(m.data.as_ptr(), ptr);
        assert_eq!(m.data.len(), 1000);
    }

    #[test]
    fn strided_views_expose_non_bias_columns() {
        let mut m = Matrix::from_data(vec![vec![1.0, 2.0, 3.0], vec![1.0, 4.0, 5.0]]);
        {
            let mut tail = m.view_mut().skip_first_col();
            assert_eq!(tail.cols(), 2);
            tail.set(1, 1, 9.0);
        }
        let view = m.view().skip_first_col();
        assert_eq!(view.row(0), &[2.0, 3.0]);
        assert_eq!(view.row(1), &[4.0, 9.0]);
        assert_eq!(m.view().skip_first_row().row(0), &[1.0, 4.0, 9.0]);
    }

    #[test]
    fn orthonormalize_tall_matrix_gives_orthonormal_columns() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut m = Matrix::random(4, 2, &mut rng);
        orthonormalize(&mut m.view_mut());
        let gram = &m.transpose() * &m;
        assert!((gram.at(0, 0) - 1.0).abs() < 1e-9);
        assert!((gram.at(1, 1) - 1.0).abs() < 1e-9);
        assert!(gram.at(0, 1).abs() < 1e-9);
    }

    #[test]
    fn prepend_ones_builds_bias_column() {
        let src = Matrix::from_data(vec![vec![2.0], vec![3.0]]);
        let mut dst = Matrix::zeros(2, 2);
        copy_prepend_ones(src.view(), dst.view_mut());
        assert_eq!(dst.data, vec![1.0, 2.0, 1.0, 3.0]);
    }
}
