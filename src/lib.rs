//! Banded contour generation for polygonal meshes.
//!
//! Given a mesh with one scalar per point and a set of contour values, the
//! [`BandedContour`] filter splits every cell into sub-regions ("bands") where
//! the scalar falls within one interval, tagging each output cell with its
//! band. Shared edges are split identically on both sides so the output mesh
//! develops no cracks.
use rustc_hash::FxHashMap as HashMap;
use rustc_hash::FxHashSet as HashSet;

#[cfg(test)]
extern crate quickcheck;
#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

mod bands;
#[cfg(feature = "io")]
pub mod io;
mod mesh;
mod point;

pub use bands::*;
pub use mesh::*;
pub use point::*;

/// Area can be calculated from an object.
///
/// Note that area is contextual from the object.
/// For instance, a polygon cell's area is its _surface_ area in 3D space.
/// If implementing this trait be sure to be **explicit** about the area being
/// calculated.
pub trait Area {
    /// Calculate the area of an object.
    fn area(&self) -> f64;
}

/// Unit square in the XY plane with scalars 0,1,1,0 -- the canonical banding
/// fixture.
#[cfg(test)]
fn unit_square() -> PolyMesh {
    let mut m = PolyMesh::new(
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        vec![0.0, 1.0, 1.0, 0.0],
    )
    .unwrap();
    m.push_poly([0, 1, 2, 3]);
    m
}
