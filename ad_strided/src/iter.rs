//! Element traversal over a view.
//!
//! [`ElementIter`] yields buffer positions in logical row-major order. A
//! contiguous view walks a single running position; any other view runs an
//! odometer over per-dimension counters, so permuted, sliced and broadcast
//! (stride 0) layouts are visited without copying.
//!
//! The cursor protocol is explicit because the reduction and matmul kernels
//! need more than `next()`:
//!
//! ```
//! use ad_strided::View;
//!
//! let view = View::contiguous([2, 3]).t().unwrap();
//! let mut it = view.iter();
//! let mut seen = Vec::new();
//! it.start();
//! while it.has_next() {
//!     seen.push((it.count(), it.position()));
//!     it.advance();
//! }
//! assert_eq!(seen[1], (2, 3));
//! ```

use crate::view::View;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Dense,
    Strided,
}

/// Cursor over the buffer positions of a view.
#[derive(Clone, Debug)]
pub struct ElementIter {
    mode: Mode,
    offset: usize,
    extents: Vec<usize>,
    strides: Vec<usize>,
    size: usize,
    counters: Vec<usize>,
    pos: usize,
    ordinal: usize,
}

/// Saved cursor state, see [`ElementIter::save`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IterMark {
    counters: Vec<usize>,
    pos: usize,
    ordinal: usize,
}

impl ElementIter {
    pub fn new(view: &View) -> Self {
        let mode = if view.is_contiguous() {
            Mode::Dense
        } else {
            Mode::Strided
        };
        let rank = view.rank();
        ElementIter {
            mode,
            offset: view.offset(),
            extents: view.extents().to_vec(),
            strides: view.strides().as_slice().to_vec(),
            size: view.size(),
            counters: vec![0; rank],
            pos: view.offset(),
            ordinal: 1,
        }
    }

    /// Rewind to the first element.
    pub fn start(&mut self) {
        self.counters.iter_mut().for_each(|c| *c = 0);
        self.pos = self.offset;
        self.ordinal = 1;
    }

    /// True while the cursor points at an element of the view.
    pub fn has_next(&self) -> bool {
        self.ordinal <= self.size
    }

    /// Buffer position of the current element.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// 1-based ordinal of the current element since [`start`](Self::start).
    pub fn count(&self) -> usize {
        self.ordinal
    }

    /// Number of elements in the view.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether the dense strategy was selected.
    pub fn is_dense(&self) -> bool {
        self.mode == Mode::Dense
    }

    /// Move to the next element.
    pub fn advance(&mut self) {
        self.ordinal += 1;
        match self.mode {
            Mode::Dense => self.pos += 1,
            Mode::Strided => {
                for d in (0..self.extents.len()).rev() {
                    self.counters[d] += 1;
                    self.pos += self.strides[d];
                    if self.counters[d] < self.extents[d] {
                        return;
                    }
                    // carry
                    self.pos -= self.strides[d] * self.extents[d];
                    self.counters[d] = 0;
                }
            }
        }
    }

    pub fn save(&self) -> IterMark {
        IterMark {
            counters: self.counters.clone(),
            pos: self.pos,
            ordinal: self.ordinal,
        }
    }

    pub fn restore(&mut self, mark: &IterMark) {
        self.counters.clone_from(&mark.counters);
        self.pos = mark.pos;
        self.ordinal = mark.ordinal;
    }

    /// Consume the cursor as a standard iterator over the remaining positions.
    pub fn positions(self) -> Positions {
        Positions { iter: self }
    }
}

/// [`Iterator`] adapter over an [`ElementIter`].
#[derive(Clone, Debug)]
pub struct Positions {
    iter: ElementIter,
}

impl Iterator for Positions {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if !self.iter.has_next() {
            return None;
        }
        let pos = self.iter.position();
        self.iter.advance();
        Some(pos)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.iter.size + 1).saturating_sub(self.iter.ordinal);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Positions {}

/// Walks several views of equal size together, yielding one position per view.
#[derive(Clone, Debug)]
pub struct Lockstep<const N: usize> {
    iters: [ElementIter; N],
}

/// Iterate `views` in lock-step. Stops at the end of the shortest view.
pub fn lockstep<const N: usize>(views: [&View; N]) -> Lockstep<N> {
    Lockstep {
        iters: views.map(ElementIter::new),
    }
}

impl<const N: usize> Iterator for Lockstep<N> {
    type Item = [usize; N];

    fn next(&mut self) -> Option<[usize; N]> {
        if !self.iters.iter().all(ElementIter::has_next) {
            return None;
        }
        let out = std::array::from_fn(|i| self.iters[i].position());
        self.iters.iter_mut().for_each(ElementIter::advance);
        Some(out)
    }
}
