//! Flat scalar storage shared between aliasing views.

use std::cell::Cell;
use std::fmt;

/// A fixed-length run of `f32` cells.
///
/// Buffers are shared through `Rc<Buffer>` by every view that aliases them.
/// Cells are individually mutable through a shared reference, so an
/// in-place kernel may read one alias and write another of the same buffer
/// in the same pass.
pub struct Buffer {
    cells: Box<[Cell<f32>]>,
}

impl Buffer {
    pub fn zeros(len: usize) -> Self {
        Self::filled(len, 0.0)
    }

    pub fn filled(len: usize, value: f32) -> Self {
        Buffer {
            cells: (0..len).map(|_| Cell::new(value)).collect(),
        }
    }

    pub fn from_vec(data: Vec<f32>) -> Self {
        Buffer {
            cells: data.into_iter().map(Cell::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn get(&self, pos: usize) -> f32 {
        self.cells[pos].get()
    }

    #[inline]
    pub fn set(&self, pos: usize, value: f32) {
        self.cells[pos].set(value);
    }

    /// Add `delta` to the cell at `pos`.
    #[inline]
    pub fn accumulate(&self, pos: usize, delta: f32) {
        let cell = &self.cells[pos];
        cell.set(cell.get() + delta);
    }

    pub fn fill(&self, value: f32) {
        self.cells.iter().for_each(|c| c.set(value));
    }

    /// Raw buffer order, ignoring any view.
    pub fn to_vec(&self) -> Vec<f32> {
        self.cells.iter().map(Cell::get).collect()
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer").field("len", &self.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    #[test]
    fn test_fill_and_accumulate() {
        let buf = Buffer::zeros(3);
        buf.fill(2.0);
        buf.accumulate(1, 0.5);
        assert_eq!(buf.to_vec(), vec![2.0, 2.5, 2.0]);
    }

    #[test]
    fn test_shared_writes_are_visible() {
        let a = Rc::new(Buffer::from_vec(vec![1.0, 2.0]));
        let b = Rc::clone(&a);
        b.set(0, 7.0);
        assert_eq!(a.get(0), 7.0);
        assert_eq!(Rc::strong_count(&a), 2);
        drop(b);
        assert_eq!(Rc::strong_count(&a), 1);
    }
}
