//! Strided views: offset, extents and strides over a flat buffer.
//!
//! Every transformation here is metadata only. A view produced by
//! [`View::permute`], [`View::broadcast_to`], [`View::index`] or
//! [`View::slice`] addresses the same buffer cells as its source.

use std::ops::Range;

use crate::error::ShapeError;
use crate::iter::{ElementIter, Positions};
use crate::shape::{Shape, Strides};

/// `[start, end)` with a step, for one dimension of [`View::slice`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Slice {
    pub start: usize,
    pub end: usize,
    pub step: usize,
}

impl Slice {
    pub fn new(start: usize, end: usize) -> Self {
        Slice {
            start,
            end,
            step: 1,
        }
    }

    pub fn with_step(start: usize, end: usize, step: usize) -> Self {
        Slice { start, end, step }
    }

    /// The whole dimension.
    pub fn full() -> Self {
        Slice::new(0, usize::MAX)
    }
}

impl From<Range<usize>> for Slice {
    fn from(r: Range<usize>) -> Self {
        Slice::new(r.start, r.end)
    }
}

/// Layout of a tensor over its buffer.
///
/// Equality compares extents only: a broadcast view equals a contiguous
/// view of the same extents.
#[derive(Clone, Debug)]
pub struct View {
    offset: usize,
    shape: Shape,
    strides: Strides,
}

impl PartialEq for View {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape
    }
}

impl View {
    /// Row-major layout at offset 0. Empty extents are normalized to `[1]`.
    pub fn contiguous(shape: impl Into<Shape>) -> Self {
        let shape = shape.into().normalized();
        let strides = shape.contiguous_strides();
        View {
            offset: 0,
            shape,
            strides,
        }
    }

    /// Build a view from raw parts.
    pub fn from_parts(offset: usize, shape: Shape, strides: Strides) -> Self {
        debug_assert_eq!(shape.ndim(), strides.0.len());
        View {
            offset,
            shape,
            strides,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn extents(&self) -> &[usize] {
        self.shape.dims()
    }

    pub fn strides(&self) -> &Strides {
        &self.strides
    }

    pub fn rank(&self) -> usize {
        self.shape.ndim()
    }

    /// Number of logical elements.
    pub fn size(&self) -> usize {
        self.shape.numel()
    }

    /// Buffer position of a multi-dimensional index.
    pub fn location(&self, index: &[usize]) -> usize {
        self.offset + self.strides.index(index)
    }

    /// Buffer cells needed to back this view, i.e. one past the furthest position.
    pub fn extent_end(&self) -> usize {
        if self.size() == 0 {
            return self.offset;
        }
        self.offset
            + self
                .shape
                .dims()
                .iter()
                .zip(self.strides.as_slice())
                .map(|(e, s)| (e - 1) * s)
                .sum::<usize>()
            + 1
    }

    /// True when the elements are consecutive cells in row-major order starting at `offset`.
    /// Strides of unit dimensions are ignored.
    pub fn is_contiguous(&self) -> bool {
        let canonical = self.shape.contiguous_strides();
        self.shape
            .dims()
            .iter()
            .zip(self.strides.as_slice().iter().zip(canonical.as_slice()))
            .all(|(&e, (s, c))| e == 1 || s == c)
    }

    pub fn iter(&self) -> ElementIter {
        ElementIter::new(self)
    }

    pub fn positions(&self) -> Positions {
        self.iter().positions()
    }

    /// Expand to `target`, padding leading unit dimensions. Expanded dimensions get stride 0.
    pub fn broadcast_to(&self, target: &Shape) -> Result<View, ShapeError> {
        let fail = || ShapeError::NotBroadcastable {
            from: self.shape.clone(),
            to: target.clone(),
        };
        if target.ndim() < self.rank() {
            return Err(fail());
        }

        let pad = target.ndim() - self.rank();
        let mut strides = vec![0usize; target.ndim()];
        for (i, &t) in target.dims().iter().enumerate().skip(pad) {
            let src = self.shape.dim(i - pad);
            strides[i] = if src == t {
                self.strides.0[i - pad]
            } else if src == 1 {
                0
            } else {
                return Err(fail());
            };
        }

        Ok(View {
            offset: self.offset,
            shape: target.clone(),
            strides: Strides(strides),
        })
    }

    /// Reorder dimensions: dimension `i` of the result is dimension `perm[i]` of `self`.
    pub fn permute(&self, perm: &[usize]) -> Result<View, ShapeError> {
        let rank = self.rank();
        let mut seen = vec![false; rank];
        let valid = perm.len() == rank
            && perm
                .iter()
                .all(|&p| p < rank && !std::mem::replace(&mut seen[p], true));
        if !valid {
            return Err(ShapeError::InvalidPermutation {
                perm: perm.to_vec(),
                rank,
            });
        }

        Ok(View {
            offset: self.offset,
            shape: Shape(perm.iter().map(|&p| self.shape.dim(p)).collect()),
            strides: Strides(perm.iter().map(|&p| self.strides.0[p]).collect()),
        })
    }

    /// Reverse the order of dimensions `start_dim..rank`.
    pub fn transpose(&self, start_dim: usize) -> Result<View, ShapeError> {
        self.permute(&transpose_perm(self.rank(), start_dim)?)
    }

    /// Swap the last two dimensions. Identity on rank 1.
    pub fn t(&self) -> Result<View, ShapeError> {
        self.transpose(self.rank().saturating_sub(2))
    }

    /// Remove unit dimension `dim`, or every unit dimension for `None`.
    ///
    /// The last remaining dimension is never removed, and squeezing a
    /// non-unit dimension leaves the view unchanged.
    pub fn squeeze(&self, dim: Option<usize>) -> Result<View, ShapeError> {
        let rank = self.rank();
        let keep: Vec<bool> = match dim {
            Some(d) if d >= rank => return Err(ShapeError::InvalidDimension { dim: d, rank }),
            Some(d) => (0..rank)
                .map(|i| i != d || self.shape.dim(i) != 1 || rank == 1)
                .collect(),
            None => {
                let mut keep: Vec<bool> = self.shape.dims().iter().map(|&e| e != 1).collect();
                if !keep.iter().any(|&k| k) {
                    keep[rank - 1] = true;
                }
                keep
            }
        };

        let (dims, strides): (Vec<usize>, Vec<usize>) = self
            .shape
            .dims()
            .iter()
            .zip(self.strides.as_slice())
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|((&e, &s), _)| (e, s))
            .unzip();
        Ok(View {
            offset: self.offset,
            shape: Shape(dims),
            strides: Strides(strides),
        })
    }

    /// Insert a unit dimension before `dim`, or append one for `None`.
    pub fn unsqueeze(&self, dim: Option<usize>) -> Result<View, ShapeError> {
        let rank = self.rank();
        let d = dim.unwrap_or(rank);
        if d > rank {
            return Err(ShapeError::InvalidDimension { dim: d, rank });
        }

        let stride = if d < rank {
            self.shape.dim(d) * self.strides.0[d]
        } else {
            1
        };
        let mut dims = self.shape.0.clone();
        let mut strides = self.strides.0.clone();
        dims.insert(d, 1);
        strides.insert(d, stride);
        Ok(View {
            offset: self.offset,
            shape: Shape(dims),
            strides: Strides(strides),
        })
    }

    /// Fix the leading dimensions to `indices`. Indexing every dimension yields a `[1]` view.
    pub fn index(&self, indices: &[usize]) -> Result<View, ShapeError> {
        let rank = self.rank();
        if indices.len() > rank {
            return Err(ShapeError::InvalidDimension {
                dim: indices.len(),
                rank,
            });
        }

        let mut offset = self.offset;
        for (dim, &index) in indices.iter().enumerate() {
            let extent = self.shape.dim(dim);
            if index >= extent {
                return Err(ShapeError::IndexOutOfBounds { index, dim, extent });
            }
            offset += index * self.strides.0[dim];
        }

        let n = indices.len();
        if n == rank {
            return Ok(View {
                offset,
                shape: Shape(vec![1]),
                strides: Strides(vec![1]),
            });
        }
        Ok(View {
            offset,
            shape: Shape(self.shape.0[n..].to_vec()),
            strides: Strides(self.strides.0[n..].to_vec()),
        })
    }

    /// Restrict the leading dimensions to the given ranges.
    ///
    /// Ranges are clamped to the extent: an `end` past the extent stops at
    /// the extent and a `start` at or past it gives an empty dimension.
    /// A step of 0 is treated as 1.
    pub fn slice(&self, ranges: &[Slice]) -> Result<View, ShapeError> {
        let rank = self.rank();
        if ranges.len() > rank {
            return Err(ShapeError::InvalidDimension {
                dim: ranges.len(),
                rank,
            });
        }

        let mut view = self.clone();
        for (dim, range) in ranges.iter().enumerate() {
            let extent = self.shape.dim(dim);
            let start = range.start.min(extent);
            let end = range.end.min(extent).max(start);
            let step = range.step.max(1);

            view.offset += start * self.strides.0[dim];
            let len = (end - start).div_ceil(step);
            view.shape.0[dim] = len;
            // A single element never advances along this dimension.
            if len > 1 {
                view.strides.0[dim] *= step;
            }
        }
        Ok(view)
    }

    /// Row-major layout of `target` at the same offset.
    ///
    /// Only meaningful on a contiguous view; callers copy first otherwise.
    pub fn reshape(&self, target: &Shape) -> Result<View, ShapeError> {
        let target = target.clone().normalized();
        if target.numel() != self.size() {
            return Err(ShapeError::ShapeMismatch {
                op: "reshape",
                lhs: self.shape.clone(),
                rhs: target,
            });
        }
        let strides = target.contiguous_strides();
        Ok(View {
            offset: self.offset,
            shape: target,
            strides,
        })
    }
}

/// Permutation reversing `start_dim..rank`.
pub fn transpose_perm(rank: usize, start_dim: usize) -> Result<Vec<usize>, ShapeError> {
    if start_dim >= rank {
        return Err(ShapeError::InvalidDimension {
            dim: start_dim,
            rank,
        });
    }
    Ok((0..start_dim).chain((start_dim..rank).rev()).collect())
}

/// Permutation moving `dim` to the last position, keeping the others in order.
pub fn move_to_last(rank: usize, dim: usize) -> Vec<usize> {
    (0..rank).filter(|&d| d != dim).chain(std::iter::once(dim)).collect()
}

/// Inverse of a permutation.
pub fn inverse_perm(perm: &[usize]) -> Vec<usize> {
    let mut inv = vec![0; perm.len()];
    for (i, &p) in perm.iter().enumerate() {
        inv[p] = i;
    }
    inv
}
