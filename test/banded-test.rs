use meshband::*;
use quickcheck_macros::quickcheck;

fn ramp_grid(n: usize) -> PolyMesh {
    PolyMesh::triangulated_grid(n, n, |x, y| x + y)
}

#[test]
fn banding_is_deterministic() {
    let mesh = ramp_grid(10);
    let filter = BandedContour::new([3.0, 7.0, 11.0]).contour_edges(true);

    let a = filter.execute(&mesh);
    let b = filter.execute(&mesh);

    // identical point count, cell count, band tags, and edge output
    assert_eq!(a, b);
}

#[test]
fn bands_partition_every_cell() {
    let mesh = ramp_grid(8);
    let out = BandedContour::new([2.0, 5.0, 9.0]).execute(&mesh);

    // the bands exactly partition each input polygon, so total surface area
    // is preserved
    assert!((out.mesh.area() - mesh.area()).abs() < 1e-8);

    // and more cells come out than went in
    assert!(out.mesh.polys().len() > mesh.polys().len());
}

#[quickcheck]
fn band_tags_stay_within_table(contours: Vec<f64>) -> bool {
    let contours = contours
        .into_iter()
        .filter(|c| c.is_finite() && (0.0..8.0).contains(c))
        .take(5)
        .collect::<Vec<_>>();
    let out = BandedContour::new(contours).execute(&ramp_grid(5));
    out.bands
        .iter()
        .all(|&b| (b as usize) < out.clip_values.len())
}

#[quickcheck]
fn area_preserved_for_arbitrary_contours(contours: Vec<f64>) -> bool {
    let contours = contours
        .into_iter()
        .filter(|c| c.is_finite() && (0.5..7.5).contains(c))
        .take(5)
        .collect::<Vec<_>>();
    let mesh = ramp_grid(5);
    let out = BandedContour::new(contours).execute(&mesh);
    (out.mesh.area() - mesh.area()).abs() < 1e-8
}

#[test]
fn inserted_point_scalars_match_table_exactly() {
    let mesh = ramp_grid(6);
    let out = BandedContour::new([1.5, 4.0, 8.5]).execute(&mesh);

    for &s in &out.mesh.scalars()[mesh.point_len()..] {
        assert!(
            out.clip_values.iter().any(|&c| c == s),
            "inserted scalar {s} is not a clip value"
        );
    }
}

#[test]
fn clipping_keeps_only_contoured_bands() {
    let mesh = ramp_grid(8);
    let clipped = BandedContour::new([3.0, 9.0]).clipping(true).execute(&mesh);
    let full = BandedContour::new([3.0, 9.0]).execute(&mesh);

    assert!(clipped.mesh.polys().len() < full.mesh.polys().len());
    // band 1 is the only band between the two contour values
    assert!(clipped.bands.iter().all(|&b| b == 1));

    // the clipped area is the band's true footprint, strictly inside the
    // original
    assert!(clipped.mesh.area() < mesh.area());
    assert!(clipped.mesh.area() > 0.0);
}

#[test]
fn attributes_interpolate_along_clipped_edges() {
    let mut mesh = PolyMesh::new(
        vec![
            [0.0, 0.0, 0.0],
            [2.0, 0.0, 0.0],
            [2.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        vec![0.0, 2.0, 2.0, 0.0],
    )
    .unwrap();
    mesh.push_poly([0, 1, 2, 3]);
    mesh.add_attribute(Attribute::new(
        "temp",
        1,
        vec![10.0, 30.0, 30.0, 10.0],
    ))
    .unwrap();

    let out = BandedContour::new([1.0]).execute(&mesh);

    // two inserted midpoints carry the midway attribute value
    assert_eq!(out.mesh.point_len(), 6);
    let temp = &out.mesh.attributes()[0];
    assert_eq!(temp.tuple(4), &[20.0]);
    assert_eq!(temp.tuple(5), &[20.0]);
}

#[test]
fn attribute_selection_drops_unnamed_arrays() {
    let mut mesh = ramp_grid(3);
    mesh.add_attribute(Attribute::new("keep", 1, vec![1.0; 9]))
        .unwrap();
    mesh.add_attribute(Attribute::new("drop", 1, vec![2.0; 9]))
        .unwrap();

    let out = BandedContour::new([2.0])
        .attributes(Some(vec!["keep".into()]))
        .execute(&mesh);

    assert_eq!(out.mesh.attributes().len(), 1);
    assert_eq!(out.mesh.attributes()[0].name(), "keep");

    let out = BandedContour::new([2.0]).execute(&mesh);
    assert_eq!(out.mesh.attributes().len(), 2);
}

#[test]
fn abort_truncates_but_keeps_emitted_output() {
    let mesh = ramp_grid(10);
    let full = BandedContour::new([5.0]).execute(&mesh);

    let mut polled = 0;
    let partial = BandedContour::new([5.0]).execute_until(&mesh, || {
        polled += 1;
        polled > 20
    });

    assert!(partial.mesh.polys().len() < full.mesh.polys().len());
    assert!(partial.mesh.polys().len() > 0);
    // every emitted cell still carries a tag
    assert_eq!(partial.bands.len(), partial.mesh.cell_len());

    // the cells that were emitted match the full run's prefix
    for i in 0..partial.mesh.polys().len() {
        assert_eq!(partial.mesh.polys().cell(i), full.mesh.polys().cell(i));
        assert_eq!(partial.bands[i], full.bands[i]);
    }
}

#[test]
fn shared_edges_never_crack() {
    // every interior edge of the grid is shared by two triangles; collect
    // each output polygon's boundary segments and check that any segment
    // between an original vertex pair is subdivided identically everywhere
    let mesh = ramp_grid(6);
    let out = BandedContour::new([2.5, 6.5]).execute(&mesh);

    // walk output polygons and count directed edges; in a crack-free banded
    // mesh every interior sub-edge is used exactly once in each direction,
    // so undirected counts are 1 (hull) or 2 (interior)
    let mut counts = std::collections::HashMap::new();
    for cell in out.mesh.polys().iter() {
        for i in 0..cell.len() {
            let (a, b) = (cell[i], cell[(i + 1) % cell.len()]);
            let key = (a.min(b), a.max(b));
            *counts.entry(key).or_insert(0u32) += 1;
        }
    }

    // band chords are interior to their original cell and appear twice (once
    // for each band they divide) except where clipped by the hull
    assert!(counts.values().all(|&c| c <= 2));
}

#[test]
fn mixed_cell_types_tag_in_order() {
    let mut mesh = PolyMesh::new(
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ],
        vec![0.0, 1.0, 1.0, 0.0],
    )
    .unwrap();
    mesh.push_vert([0, 2]);
    mesh.push_line([0, 1]);
    mesh.push_poly([0, 1, 2, 3]);

    let out = BandedContour::new([0.5]).execute(&mesh);

    // verts first, then line sub-segments, then band polygons; the vert at
    // the data max tags with the overflow band beyond the last interval
    let verts = out.mesh.verts().len();
    let lines = out.mesh.lines().len();
    let polys = out.mesh.polys().len();
    assert_eq!(verts, 2);
    assert_eq!(lines, 2);
    assert_eq!(polys, 2);
    assert_eq!(out.bands.len(), verts + lines + polys);
    assert_eq!(out.bands, vec![0, 2, 0, 1, 0, 1]);
}

#[cfg(feature = "io")]
#[test]
fn binary_round_trip_full_pipeline() {
    let mesh = ramp_grid(6);
    let out = BandedContour::new([2.5, 6.5])
        .contour_edges(true)
        .scalar_mode(ScalarMode::Value)
        .execute(&mesh);

    let bytes = io::banded::to_bytes(&out);
    let back = io::banded::from_bytes(&bytes).unwrap();
    assert_eq!(out, back);
    assert_eq!(out.cell_scalars(), back.cell_scalars());
}
