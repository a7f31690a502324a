//! Structured numeric values.
//!
//! Parameters, residuals and Jacobian-vector products are all [`Tree`]s: a fixed
//! structure (scalars, vectors, maps, tuples) whose numeric leaves can be read out
//! in a stable order and written back. All the arithmetic the solvers need is
//! expressed leafwise through this trait, so a parameter can be a `Vec<f64>`, a
//! `(f64, [f64; 3])` or a map of named vectors without the solver caring.

use std::collections::BTreeMap;
use std::fmt::{self, Debug, Display, Formatter};

use faer::Col;

/// Every leaf is stored as this type.
pub type Scalar = f64;

const DTYPE: &str = "f64";

/// Shape and element type of one array in a [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShapeDtype {
    /// Array shape. Empty for a scalar.
    pub shape: Vec<usize>,
    /// Element type name.
    pub dtype: &'static str,
}

impl ShapeDtype {
    /// A single scalar.
    pub fn scalar() -> Self {
        Self {
            shape: Vec::new(),
            dtype: DTYPE,
        }
    }

    /// A one-dimensional array.
    pub fn vector(len: usize) -> Self {
        Self {
            shape: vec![len],
            dtype: DTYPE,
        }
    }

    /// How many numbers this array holds.
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }
}

impl Display for ShapeDtype {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:?}", self.dtype, self.shape)
    }
}

/// Shape/dtype description of a whole tree, one entry per array in flattening order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Structure {
    arrays: Vec<ShapeDtype>,
}

impl Structure {
    /// The arrays of this tree, in flattening order.
    pub fn arrays(&self) -> &[ShapeDtype] {
        &self.arrays
    }

    /// Total number of scalar leaves.
    pub fn size(&self) -> usize {
        self.arrays.iter().map(ShapeDtype::size).sum()
    }

    fn concat(parts: impl IntoIterator<Item = Structure>) -> Self {
        Self {
            arrays: parts.into_iter().flat_map(|s| s.arrays).collect(),
        }
    }
}

impl From<ShapeDtype> for Structure {
    fn from(array: ShapeDtype) -> Self {
        Self {
            arrays: vec![array],
        }
    }
}

impl Display for Structure {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, array) in self.arrays.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{array}")?;
        }
        f.write_str(")")
    }
}

/// A structured numeric value.
///
/// Implementors only describe how to flatten themselves into scalar leaves and how
/// to rebuild a value of the same structure from leaves. Everything else
/// (elementwise arithmetic, `full_like`, dot products) is provided.
///
/// Binary operations require both operands to have the same [`Structure`].
pub trait Tree: Clone + Debug {
    /// Shape/dtype description of this value.
    fn structure(&self) -> Structure;

    /// Append this value's leaves to `out`, in flattening order.
    fn flatten_into(&self, out: &mut Vec<Scalar>);

    /// Build a value with the same structure as `self`, consuming leaves in flattening order.
    /// Missing leaves come out as NaN.
    fn unflatten_from(&self, leaves: &mut std::slice::Iter<'_, Scalar>) -> Self;

    /// Number of scalar leaves.
    fn size(&self) -> usize {
        self.structure().size()
    }

    /// All leaves, in flattening order.
    fn leaves(&self) -> Vec<Scalar> {
        let mut out = Vec::new();
        self.flatten_into(&mut out);
        out
    }

    /// Build a value with the same structure as `self` from a flat slice of leaves.
    fn from_leaves(&self, leaves: &[Scalar]) -> Self {
        debug_assert_eq!(
            leaves.len(),
            self.size(),
            "wrong number of leaves for structure {}",
            self.structure()
        );
        self.unflatten_from(&mut leaves.iter())
    }

    /// Apply `f` to every leaf.
    fn map(&self, f: impl FnMut(Scalar) -> Scalar) -> Self {
        let leaves: Vec<Scalar> = self.leaves().into_iter().map(f).collect();
        self.from_leaves(&leaves)
    }

    /// Combine matching leaves of `self` and `other` with `f`.
    fn zip_map(&self, other: &Self, mut f: impl FnMut(Scalar, Scalar) -> Scalar) -> Self {
        let rhs = other.leaves();
        let lhs = self.leaves();
        debug_assert_eq!(lhs.len(), rhs.len(), "zip_map over mismatched trees");
        let leaves: Vec<Scalar> = lhs.into_iter().zip(rhs).map(|(a, b)| f(a, b)).collect();
        self.from_leaves(&leaves)
    }

    /// Same structure, every leaf set to `value`.
    fn full_like(&self, value: Scalar) -> Self {
        self.map(|_| value)
    }

    /// Same structure, every leaf zero.
    fn zeros_like(&self) -> Self {
        self.full_like(0.0)
    }

    /// Same structure, zero everywhere except a one at flat position `index`.
    fn unit_like(&self, index: usize) -> Self {
        let mut i = 0;
        self.map(|_| {
            let leaf = if i == index { 1.0 } else { 0.0 };
            i += 1;
            leaf
        })
    }

    /// Leafwise `self + other`.
    fn add(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a + b)
    }

    /// Leafwise `self - other`.
    fn sub(&self, other: &Self) -> Self {
        self.zip_map(other, |a, b| a - b)
    }

    /// Every leaf multiplied by `factor`.
    fn scale(&self, factor: Scalar) -> Self {
        self.map(|a| factor * a)
    }

    /// Sum of the leafwise products.
    fn dot(&self, other: &Self) -> Scalar {
        dot_leaves(&self.leaves(), &other.leaves())
    }
}

/// Dot product of two flat leaf vectors.
pub fn dot_leaves(a: &[Scalar], b: &[Scalar]) -> Scalar {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn next_leaf(leaves: &mut std::slice::Iter<'_, Scalar>) -> Scalar {
    leaves.next().copied().unwrap_or(Scalar::NAN)
}

impl Tree for Scalar {
    fn structure(&self) -> Structure {
        ShapeDtype::scalar().into()
    }

    fn flatten_into(&self, out: &mut Vec<Scalar>) {
        out.push(*self);
    }

    fn unflatten_from(&self, leaves: &mut std::slice::Iter<'_, Scalar>) -> Self {
        next_leaf(leaves)
    }

    fn size(&self) -> usize {
        1
    }
}

impl Tree for Vec<Scalar> {
    fn structure(&self) -> Structure {
        ShapeDtype::vector(self.len()).into()
    }

    fn flatten_into(&self, out: &mut Vec<Scalar>) {
        out.extend_from_slice(self);
    }

    fn unflatten_from(&self, leaves: &mut std::slice::Iter<'_, Scalar>) -> Self {
        (0..self.len()).map(|_| next_leaf(leaves)).collect()
    }

    fn size(&self) -> usize {
        self.len()
    }
}

impl<const N: usize> Tree for [Scalar; N] {
    fn structure(&self) -> Structure {
        ShapeDtype::vector(N).into()
    }

    fn flatten_into(&self, out: &mut Vec<Scalar>) {
        out.extend_from_slice(self);
    }

    fn unflatten_from(&self, leaves: &mut std::slice::Iter<'_, Scalar>) -> Self {
        std::array::from_fn(|_| next_leaf(leaves))
    }

    fn size(&self) -> usize {
        N
    }
}

impl Tree for Col<Scalar> {
    fn structure(&self) -> Structure {
        ShapeDtype::vector(self.nrows()).into()
    }

    fn flatten_into(&self, out: &mut Vec<Scalar>) {
        out.extend(self.as_ref().iter().copied());
    }

    fn unflatten_from(&self, leaves: &mut std::slice::Iter<'_, Scalar>) -> Self {
        Col::from_fn(self.nrows(), |_| next_leaf(leaves))
    }

    fn size(&self) -> usize {
        self.nrows()
    }
}

/// Maps flatten in key order.
impl<K, T> Tree for BTreeMap<K, T>
where
    K: Ord + Clone + Debug,
    T: Tree,
{
    fn structure(&self) -> Structure {
        Structure::concat(self.values().map(Tree::structure))
    }

    fn flatten_into(&self, out: &mut Vec<Scalar>) {
        for value in self.values() {
            value.flatten_into(out);
        }
    }

    fn unflatten_from(&self, leaves: &mut std::slice::Iter<'_, Scalar>) -> Self {
        self.iter()
            .map(|(key, value)| (key.clone(), value.unflatten_from(leaves)))
            .collect()
    }
}

macro_rules! tuple_tree {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Tree),+> Tree for ($($name,)+) {
            fn structure(&self) -> Structure {
                Structure::concat([$(self.$idx.structure()),+])
            }

            fn flatten_into(&self, out: &mut Vec<Scalar>) {
                $(self.$idx.flatten_into(out);)+
            }

            fn unflatten_from(&self, leaves: &mut std::slice::Iter<'_, Scalar>) -> Self {
                ($(self.$idx.unflatten_from(leaves),)+)
            }
        }
    };
}

tuple_tree!(A: 0, B: 1);
tuple_tree!(A: 0, B: 1, C: 2);
tuple_tree!(A: 0, B: 1, C: 2, D: 3);
