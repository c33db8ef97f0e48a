//! Banded output interop.
//! Adds functionality for data persistence and conversion.
use crate::*;
use byteorder::*;
use std::{
    error::Error,
    io::{Cursor, Read, Write},
};

pub mod banded;

type Result<T> = std::result::Result<T, Box<dyn Error + Send + Sync>>;

fn to_dxf_point(p: Point3) -> ::dxf::Point {
    let [x, y, z] = p;
    ::dxf::Point { x, y, z }
}

fn to_polyline(
    drawing: &mut ::dxf::Drawing,
    ps: impl Iterator<Item = Point3>,
) -> ::dxf::entities::Polyline {
    let mut polyline = ::dxf::entities::Polyline::default();

    let vertices = ps.map(to_dxf_point).map(::dxf::entities::Vertex::new);

    for vertex in vertices {
        polyline.add_vertex(drawing, vertex);
    }

    polyline.set_is_3d_polyline(true);

    polyline
}
