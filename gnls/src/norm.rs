use crate::tree::{Scalar, Tree};

/// Sum of squares of every leaf. This is the least-squares objective of a residual.
pub fn sum_squares<T: Tree>(tree: &T) -> Scalar {
    tree.leaves().iter().map(|x| x * x).sum()
}

/// Largest absolute leaf. Zero for an empty tree, NaN if any leaf is NaN.
pub fn max_norm<T: Tree>(tree: &T) -> Scalar {
    max_abs(&tree.leaves())
}

/// Root-mean-square of the leaves. Zero for an empty tree.
pub fn rms_norm<T: Tree>(tree: &T) -> Scalar {
    rms(&tree.leaves())
}

/// Euclidean norm of the leaves.
pub fn two_norm<T: Tree>(tree: &T) -> Scalar {
    two(&tree.leaves())
}

fn max_abs(leaves: &[Scalar]) -> Scalar {
    leaves.iter().fold(0.0, |acc, x| {
        if acc.is_nan() || x.is_nan() {
            Scalar::NAN
        } else {
            libm::fmax(acc, x.abs())
        }
    })
}

fn two(leaves: &[Scalar]) -> Scalar {
    libm::sqrt(leaves.iter().map(|x| x * x).sum())
}

fn rms(leaves: &[Scalar]) -> Scalar {
    if leaves.is_empty() {
        return 0.0;
    }
    two(leaves) / libm::sqrt(leaves.len() as Scalar)
}

/// Which norm to measure trees with, e.g. in convergence checks.
#[derive(Debug, Clone, Copy, Default)]
pub enum Norm {
    /// Largest absolute leaf.
    #[default]
    Max,
    /// Root-mean-square of the leaves.
    Rms,
    /// Euclidean norm.
    Two,
    /// Any function of the flattened leaves.
    Custom(fn(&[Scalar]) -> Scalar),
}

impl Norm {
    /// Measure a tree.
    pub fn apply<T: Tree>(self, tree: &T) -> Scalar {
        self.of_leaves(&tree.leaves())
    }

    /// Measure a flat list of leaves.
    pub fn of_leaves(self, leaves: &[Scalar]) -> Scalar {
        match self {
            Self::Max => max_abs(leaves),
            Self::Rms => rms(leaves),
            Self::Two => two(leaves),
            Self::Custom(norm) => norm(leaves),
        }
    }
}
