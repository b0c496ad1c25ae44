//! # ad_strided - Strided views over shared buffers
//!
//! The data model underneath `ad_lazy`: a [`View`] is an offset, extents and
//! strides over a flat [`Buffer`]; transformations such as permute,
//! broadcast, index and slice produce new views over the same cells, and
//! [`ElementIter`] walks any view in logical row-major order.
//!
//! ## Example
//!
//! ```
//! use ad_strided::prelude::*;
//!
//! let buf = Buffer::from_vec((0..6).map(|x| x as f32).collect());
//! let view = View::contiguous([2, 3]).t().unwrap();
//! let values: Vec<f32> = view.positions().map(|p| buf.get(p)).collect();
//! assert_eq!(values, vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
//! ```

pub mod buffer;
pub mod error;
pub mod iter;
pub mod shape;
pub mod view;

pub use buffer::Buffer;
pub use error::ShapeError;
pub use iter::{lockstep, ElementIter, IterMark, Lockstep, Positions};
pub use shape::{Shape, Strides};
pub use view::{inverse_perm, move_to_last, transpose_perm, Slice, View};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::buffer::Buffer;
    pub use crate::error::ShapeError;
    pub use crate::iter::{lockstep, ElementIter, IterMark};
    pub use crate::shape::{Shape, Strides};
    pub use crate::view::{Slice, View};
}
