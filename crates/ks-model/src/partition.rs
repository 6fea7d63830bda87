//! Independent/dependent coordinate partition.

use crate::common::{scatter, select};
use crate::error::{ModelError, ModelResult};
use ks_core::Real;
use nalgebra::{DMatrix, DVector};

/// Fixed split of the generalized coordinates into independent (`u`) and
/// dependent (`v`) subsets.
///
/// Invariant: `independent ∪ dependent = {0..nb_q}` with no overlap. Both
/// index lists keep the order given at construction; `u` and `v` vectors are
/// laid out in that order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoordinatePartition {
    nb_q: usize,
    independent: Vec<usize>,
    dependent: Vec<usize>,
}

/// The four blocks of a square matrix split by a partition.
#[derive(Clone, Debug)]
pub struct PartitionedBlocks<T: Real> {
    pub uu: DMatrix<T>,
    pub uv: DMatrix<T>,
    pub vu: DMatrix<T>,
    pub vv: DMatrix<T>,
}

impl CoordinatePartition {
    /// Build a partition, checking that the index sets tile `0..nb_q`.
    pub fn new(nb_q: usize, independent: Vec<usize>, dependent: Vec<usize>) -> ModelResult<Self> {
        let total = independent.len() + dependent.len();
        if total != nb_q {
            return Err(ModelError::DimensionMismatch {
                what: "partition size",
                expected: nb_q,
                actual: total,
            });
        }

        let mut seen = vec![false; nb_q];
        for &i in independent.iter().chain(dependent.iter()) {
            if i >= nb_q {
                return Err(ModelError::IndexOob {
                    what: "partition index",
                    index: i,
                    len: nb_q,
                });
            }
            if seen[i] {
                return Err(ModelError::InvalidArg {
                    what: "partition index listed twice",
                });
            }
            seen[i] = true;
        }

        Ok(Self {
            nb_q,
            independent,
            dependent,
        })
    }

    /// Every coordinate independent, no dependent set.
    pub fn unconstrained(nb_q: usize) -> Self {
        Self {
            nb_q,
            independent: (0..nb_q).collect(),
            dependent: Vec::new(),
        }
    }

    pub fn nb_q(&self) -> usize {
        self.nb_q
    }

    pub fn nb_independent(&self) -> usize {
        self.independent.len()
    }

    pub fn nb_dependent(&self) -> usize {
        self.dependent.len()
    }

    pub fn independent(&self) -> &[usize] {
        &self.independent
    }

    pub fn dependent(&self) -> &[usize] {
        &self.dependent
    }

    /// Interleave `u` and `v` back into a full coordinate vector.
    ///
    /// # Panics
    /// Panics if `u` or `v` do not match the partition sizes.
    pub fn expand<T: Real>(&self, u: &DVector<T>, v: &DVector<T>) -> DVector<T> {
        assert_eq!(u.len(), self.independent.len(), "u length");
        assert_eq!(v.len(), self.dependent.len(), "v length");

        let mut q = scatter(self.nb_q, &self.independent, u);
        for (k, &i) in self.dependent.iter().enumerate() {
            q[i] = v[k];
        }
        q
    }

    /// Split a full vector into `(u, v)`.
    ///
    /// # Panics
    /// Panics if `q` does not have `nb_q` entries.
    pub fn reduce<T: Real>(&self, q: &DVector<T>) -> (DVector<T>, DVector<T>) {
        assert_eq!(q.len(), self.nb_q, "q length");
        (select(q, &self.independent), select(q, &self.dependent))
    }

    /// Fallible [`expand`](Self::expand) for inputs that were not validated upstream.
    pub fn try_expand<T: Real>(&self, u: &DVector<T>, v: &DVector<T>) -> ModelResult<DVector<T>> {
        self.check_u(u)?;
        self.check_v(v)?;
        Ok(self.expand(u, v))
    }

    /// Fallible [`reduce`](Self::reduce).
    pub fn try_reduce<T: Real>(&self, q: &DVector<T>) -> ModelResult<(DVector<T>, DVector<T>)> {
        if q.len() != self.nb_q {
            return Err(ModelError::DimensionMismatch {
                what: "q",
                expected: self.nb_q,
                actual: q.len(),
            });
        }
        Ok(self.reduce(q))
    }

    pub fn check_u<T: Real>(&self, u: &DVector<T>) -> ModelResult<()> {
        crate::common::check_len("u", u, self.independent.len())
    }

    pub fn check_v<T: Real>(&self, v: &DVector<T>) -> ModelResult<()> {
        crate::common::check_len("v", v, self.dependent.len())
    }

    /// Split the columns of `m` into `(m[:, u], m[:, v])`.
    pub fn split_columns<T: Real>(&self, m: &DMatrix<T>) -> (DMatrix<T>, DMatrix<T>) {
        (
            m.select_columns(self.independent.iter()),
            m.select_columns(self.dependent.iter()),
        )
    }

    /// Split a square `nb_q × nb_q` matrix into its partition blocks.
    pub fn split_blocks<T: Real>(&self, m: &DMatrix<T>) -> PartitionedBlocks<T> {
        let rows_u = m.select_rows(self.independent.iter());
        let rows_v = m.select_rows(self.dependent.iter());
        PartitionedBlocks {
            uu: rows_u.select_columns(self.independent.iter()),
            uv: rows_u.select_columns(self.dependent.iter()),
            vu: rows_v.select_columns(self.independent.iter()),
            vv: rows_v.select_columns(self.dependent.iter()),
        }
    }
}
