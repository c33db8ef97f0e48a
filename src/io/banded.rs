use super::*;

// banded outputs serialize as follows:
// **big endian encoding**
// 4 bytes magic `MBD1`
// 1 byte scalar mode (0 = index, 1 = value)
// 4 bytes u32 -- point count
// (8 bytes f64: x, 8 bytes f64: y, 8 bytes f64: z)
// --> repeats for points
// (8 bytes f64: scalar)
// --> repeats for points
// 4 bytes u32 -- attribute count
// (4 bytes u32: name length, name bytes, 4 bytes u32: components,
//  8 bytes f64 per value)
// --> repeats for attributes
// per cell array in verts, lines, polys, strips order:
//   4 bytes u32 cell count, then per cell 4 bytes u32 id count + 4 byte ids
// 4 bytes u32 band count, 4 bytes u32 per band
// 4 bytes u32 clip value count, 8 bytes f64 per value
// 1 byte edge flag; when set: 4 bytes u32 edge count + (u32, u32) pairs
const MAGIC: &[u8; 4] = b"MBD1";

/// Serialize a banded output to its binary representation.
pub fn to_bytes(out: &BandedOutput) -> Vec<u8> {
    fn ser(out: &BandedOutput) -> Result<Vec<u8>> {
        let mut wtr = Vec::new();
        wtr.write_all(MAGIC)?;
        wtr.write_u8(match out.scalar_mode {
            ScalarMode::Index => 0,
            ScalarMode::Value => 1,
        })?;

        let mesh = &out.mesh;
        wtr.write_u32::<BE>(mesh.point_len() as u32)?;
        for &[x, y, z] in mesh.points() {
            wtr.write_f64::<BE>(x)?;
            wtr.write_f64::<BE>(y)?;
            wtr.write_f64::<BE>(z)?;
        }
        for &s in mesh.scalars() {
            wtr.write_f64::<BE>(s)?;
        }

        wtr.write_u32::<BE>(mesh.attributes().len() as u32)?;
        for attr in mesh.attributes() {
            let name = attr.name().as_bytes();
            wtr.write_u32::<BE>(name.len() as u32)?;
            wtr.write_all(name)?;
            wtr.write_u32::<BE>(attr.components() as u32)?;
            for &v in attr.data() {
                wtr.write_f64::<BE>(v)?;
            }
        }

        for cells in [mesh.verts(), mesh.lines(), mesh.polys(), mesh.strips()] {
            wtr.write_u32::<BE>(cells.len() as u32)?;
            for cell in cells.iter() {
                wtr.write_u32::<BE>(cell.len() as u32)?;
                for &id in cell {
                    wtr.write_u32::<BE>(id)?;
                }
            }
        }

        wtr.write_u32::<BE>(out.bands.len() as u32)?;
        for &b in &out.bands {
            wtr.write_u32::<BE>(b)?;
        }
        wtr.write_u32::<BE>(out.clip_values.len() as u32)?;
        for &v in &out.clip_values {
            wtr.write_f64::<BE>(v)?;
        }

        match &out.contour_edges {
            None => wtr.write_u8(0)?,
            Some(edges) => {
                wtr.write_u8(1)?;
                wtr.write_u32::<BE>(edges.len() as u32)?;
                for &[a, b] in edges {
                    wtr.write_u32::<BE>(a)?;
                    wtr.write_u32::<BE>(b)?;
                }
            }
        }

        Ok(wtr)
    }

    ser(out).expect("serialization should not fail since writing to a memory buffer")
}

/// Deserialize a banded output from its binary representation.
pub fn from_bytes(bytes: &[u8]) -> Result<BandedOutput> {
    let mut c = Cursor::new(bytes);

    let mut magic = [0u8; 4];
    c.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err("not a banded mesh payload (bad magic)".into());
    }

    let scalar_mode = match c.read_u8()? {
        0 => ScalarMode::Index,
        1 => ScalarMode::Value,
        m => return Err(format!("unknown scalar mode byte: {m}").into()),
    };

    let pcount = c.read_u32::<BE>()? as usize;
    log::debug!("reading banded mesh with {} points", pcount);

    let mut points = Vec::with_capacity(pcount);
    for _ in 0..pcount {
        let x = c.read_f64::<BE>()?;
        let y = c.read_f64::<BE>()?;
        let z = c.read_f64::<BE>()?;
        points.push([x, y, z]);
    }
    let mut scalars = Vec::with_capacity(pcount);
    for _ in 0..pcount {
        scalars.push(c.read_f64::<BE>()?);
    }
    let mut mesh = PolyMesh::new(points, scalars)?;

    let acount = c.read_u32::<BE>()? as usize;
    for _ in 0..acount {
        let nlen = c.read_u32::<BE>()? as usize;
        let mut name = vec![0u8; nlen];
        c.read_exact(&mut name)?;
        let name = String::from_utf8(name)?;
        let components = c.read_u32::<BE>()? as usize;
        let mut data = Vec::with_capacity(pcount * components);
        for _ in 0..pcount * components {
            data.push(c.read_f64::<BE>()?);
        }
        mesh.add_attribute(Attribute::new(name, components, data))?;
    }

    fn read_cells(c: &mut Cursor<&[u8]>) -> Result<Vec<Vec<u32>>> {
        let ccount = c.read_u32::<BE>()? as usize;
        let mut cells = Vec::with_capacity(ccount);
        for _ in 0..ccount {
            let n = c.read_u32::<BE>()? as usize;
            let mut ids = Vec::with_capacity(n);
            for _ in 0..n {
                ids.push(c.read_u32::<BE>()?);
            }
            cells.push(ids);
        }
        Ok(cells)
    }

    for ids in read_cells(&mut c)? {
        mesh.push_vert(ids);
    }
    for ids in read_cells(&mut c)? {
        mesh.push_line(ids);
    }
    for ids in read_cells(&mut c)? {
        mesh.push_poly(ids);
    }
    for ids in read_cells(&mut c)? {
        mesh.push_strip(ids);
    }

    let bcount = c.read_u32::<BE>()? as usize;
    let mut bands = Vec::with_capacity(bcount);
    for _ in 0..bcount {
        bands.push(c.read_u32::<BE>()?);
    }
    let vcount = c.read_u32::<BE>()? as usize;
    let mut clip_values = Vec::with_capacity(vcount);
    for _ in 0..vcount {
        clip_values.push(c.read_f64::<BE>()?);
    }

    let contour_edges = match c.read_u8()? {
        0 => None,
        _ => {
            let ecount = c.read_u32::<BE>()? as usize;
            let mut edges = Vec::with_capacity(ecount);
            for _ in 0..ecount {
                let a = c.read_u32::<BE>()?;
                let b = c.read_u32::<BE>()?;
                edges.push([a, b]);
            }
            Some(edges)
        }
    };

    Ok(BandedOutput {
        mesh,
        bands,
        clip_values,
        contour_edges,
        scalar_mode,
    })
}

/// Export the dividing edges as 3D polylines on the given layer.
///
/// Produces an empty drawing if the output was generated without contour
/// edges.
pub fn edges_to_dxf<L: std::fmt::Display>(out: &BandedOutput, layer_name: L) -> Vec<u8> {
    use ::dxf::entities::*;

    let mut d = ::dxf::Drawing::new();

    let layer_name = layer_name.to_string();
    for &[a, b] in out.contour_edges.iter().flatten() {
        let ps = [
            out.mesh.points()[a as usize],
            out.mesh.points()[b as usize],
        ];
        let polyline = to_polyline(&mut d, ps.into_iter());
        let mut entity = Entity::new(EntityType::Polyline(polyline));
        entity.common.layer = layer_name.clone();
        d.add_entity(entity);
    }

    d.normalize();
    let mut buf = Vec::new();
    d.save(&mut buf).expect("writing dxf to memory buffer");

    buf
}

/// Export the band polygons as closed polyline rings, one layer per band
/// (`band_<i>`).
pub fn polys_to_dxf(out: &BandedOutput) -> Vec<u8> {
    use ::dxf::entities::*;

    let mut d = ::dxf::Drawing::new();

    // poly tags sit at the tail of the band array, behind verts and lines
    let poly_tags = out.bands.len() - out.mesh.polys().len();
    for (i, cell) in out.mesh.polys().iter().enumerate() {
        let band = out.bands[poly_tags + i];
        let mut ps = out.mesh.cell_points(cell);
        if let Some(&first) = ps.first() {
            ps.push(first); // close the ring
        }
        let polyline = to_polyline(&mut d, ps.into_iter());
        let mut entity = Entity::new(EntityType::Polyline(polyline));
        entity.common.layer = format!("band_{band}");
        d.add_entity(entity);
    }

    d.normalize();
    let mut buf = Vec::new();
    d.save(&mut buf).expect("writing dxf to memory buffer");

    buf
}
