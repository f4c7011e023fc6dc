//! Infrastructure for contouring 2D implicit surfaces.
//!
//! An implicit surface is a scalar field over the [−1, 1]² domain, negative
//! inside and positive outside.  Fields are built as expressions from the
//! [`context`] module (or the [`shapes`] primitives), compiled to a flat
//! instruction [`Tape`], and contoured with marching squares:
//!
//! ```
//! use isoline::{compile, contour, optimize, shapes::disk};
//!
//! let tape = optimize(&compile(&disk(0.0, 0.0, 0.5)));
//! let c = contour(&tape, 65)?;
//!
//! // The contour of a disk is a closed loop of segments near the circle
//! assert_eq!(c.mesh.vertices.len(), c.mesh.edges.len());
//! for v in &c.mesh.vertices {
//!     let d = (v.x * v.x + v.y * v.y).sqrt();
//!     assert!((d - 0.5).abs() < 0.05);
//! }
//! # Ok::<(), isoline::Error>(())
//! ```
//!
//! The interesting work happens between the tape and the mesh: the
//! [`vm::Vm`] recursively bisects the grid, bounds the field over each
//! quadrant with four-wide interval arithmetic, culls quadrants the
//! contour cannot pass through, and specializes the tape per quadrant by
//! dropping `min`/`max` branches that interval bounds prove dominated.
//! Leaf tiles are then sampled in bulk and walked cell-by-cell.
pub mod compiler;
pub mod context;
pub mod mesh;
pub mod shapes;
pub mod types;
pub mod vm;

mod error;
pub use error::Error;

pub use compiler::{compile, optimize, Tape};
pub use context::Scalar;
pub use mesh::{contour, Contour, Mesh};
pub use vm::Vm;
