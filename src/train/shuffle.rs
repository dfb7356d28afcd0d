use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::math::matrix::{MatRef, Matrix};

/// Draws row permutations, reproducibly when seeded.
#[derive(Debug, Clone)]
pub struct RowShuffler {
    rng: StdRng,
}

impl RowShuffler {
    pub fn new(random_state: Option<u64>) -> RowShuffler {
        let rng = match random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        RowShuffler { rng }
    }

    pub fn permutation(&mut self, n: usize) -> Vec<usize> {
        let mut perm: Vec<usize> = (0..n).collect();
        perm.shuffle(&mut self.rng);
        perm
    }
}

/// Row `i` of the result is row `perm[i]` of the input.
pub fn permute_rows(m: &mut Matrix, perm: &[usize]) {
    let src = m.data.clone();
    let cols = m.cols;
    for (i, &p) in perm.iter().enumerate() {
        m.row_mut(i).copy_from_slice(&src[p * cols..(p + 1) * cols]);
    }
}

/// Inverse of `permute_rows` for the same `perm`.
pub fn unpermute_rows(m: &mut Matrix, perm: &[usize]) {
    let src = m.data.clone();
    let cols = m.cols;
    for (i, &p) in perm.iter().enumerate() {
        m.row_mut(p).copy_from_slice(&src[i * cols..(i + 1) * cols]);
    }
}

/// `X` and `Y` with their rows jointly permuted for the lifetime of the
/// guard. Dropping it puts every row back, whichever way the epoch exits.
pub struct ShuffledRows<'a> {
    x: &'a mut Matrix,
    y: &'a mut Matrix,
    perm: Option<Vec<usize>>,
}

impl<'a> ShuffledRows<'a> {
    /// Permutes both matrices with one draw from `shuffler`; with `None`
    /// the rows stay in place.
    pub fn new(x: &'a mut Matrix, y: &'a mut Matrix, shuffler: Option<&mut RowShuffler>) -> Self {
        let perm = shuffler.map(|s| s.permutation(x.rows));
        if let Some(perm) = &perm {
            permute_rows(x, perm);
            permute_rows(y, perm);
        }
        ShuffledRows { x, y, perm }
    }

    pub fn x(&self) -> MatRef<'_> {
        self.x.view()
    }

    pub fn y(&self) -> MatRef<'_> {
        self.y.view()
    }

    pub fn permutation(&self) -> Option<&[usize]> {
        self.perm.as_deref()
    }
}

impl Drop for ShuffledRows<'_> {
    fn drop(&mut self) {
        if let Some(perm) = self.perm.take() {
            unpermute_rows(self.x, &perm);
            unpermute_rows(self.y, &perm);
        }
    }
}
