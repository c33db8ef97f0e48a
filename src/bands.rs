use crate::*;

/// What the per-cell output scalar carries.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScalarMode {
    /// The band index.
    #[default]
    Index,
    /// The clip value at the band's lower boundary.
    Value,
}

/// Sorted, de-duplicated band boundaries: the user contour values plus the
/// scalar field's min and max.
///
/// Adjacent entries always differ by more than the internal tolerance
/// (`clip_tolerance * data_range`); closer entries are merged on build.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClipTable {
    values: Vec<f64>,
    tolerance: f64,
}

impl ClipTable {
    /// Build the table from the user contour values, the scalar field's
    /// `(min, max)` range, and the relative tolerance.
    pub fn build(contours: &[f64], range: (f64, f64), clip_tolerance: f64) -> Self {
        let (min, max) = range;
        let mut values = Vec::with_capacity(contours.len() + 2);
        values.push(min.min(contours.first().copied().unwrap_or(min)));
        values.extend_from_slice(contours);
        values.push(max.max(contours.last().copied().unwrap_or(max)));
        values.sort_unstable_by(f64::total_cmp);

        let tolerance = clip_tolerance * (max - min);

        // single pass suffices given sorted order
        let mut merged = Vec::with_capacity(values.len());
        for v in values {
            match merged.last() {
                Some(&prev) if prev + tolerance >= v => (),
                _ => merged.push(v),
            }
        }

        Self {
            values: merged,
            tolerance,
        }
    }

    /// The number of clip values after merging.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// The internal absolute tolerance (`clip_tolerance * data_range`).
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    /// The band index of `v`: the `i` with `values[i] <= v < values[i+1]`,
    /// or the last index when `v` is at or beyond the final entry.
    pub fn scalar_index(&self, v: f64) -> usize {
        for i in 0..self.values.len().saturating_sub(1) {
            if v >= self.values[i] && v < self.values[i + 1] {
                return i;
            }
        }
        self.values.len().saturating_sub(1)
    }

    /// Band index used to tag output cells: the representative scalar is
    /// nudged up by the tolerance so a value sitting exactly on a boundary
    /// lands in the upper band deterministically.
    fn clipped_index(&self, v: f64) -> usize {
        self.scalar_index(v + self.tolerance)
    }

    /// True iff `v` bit-equals one of the table entries.
    ///
    /// Inserted intersection points are assigned clip values directly (never
    /// re-interpolated), so exact equality is the correct test.
    #[allow(clippy::float_cmp)]
    pub fn is_clip_value(&self, v: f64) -> bool {
        self.values.iter().any(|&c| c == v)
    }
}

/// Outcome of clipping one mesh edge.
#[derive(Clone, Debug, PartialEq)]
enum EdgeSplit {
    /// Both endpoints fall within the same band.
    None,
    /// Inserted point ids, ordered from the lower-indexed endpoint to the
    /// higher-indexed endpoint.
    Points(Vec<u32>),
}

/// Inserted intersection points per edge, keyed by the unordered endpoint id
/// pair.
///
/// Two polygons sharing an edge must agree on exactly which points subdivide
/// it and in which order, or the output develops cracks. Storing the list in
/// canonical `min(a,b) -> max(a,b)` order makes the split independent of each
/// polygon's winding.
#[derive(Default)]
struct EdgeCache {
    edges: HashMap<u64, EdgeSplit>,
}

#[inline(always)]
fn edge_key(a: u32, b: u32) -> u64 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    ((lo as u64) << 32) | hi as u64
}

impl EdgeCache {
    fn lookup(&self, a: u32, b: u32) -> Option<&EdgeSplit> {
        self.edges.get(&edge_key(a, b))
    }

    fn insert(&mut self, a: u32, b: u32, split: EdgeSplit) {
        self.edges.insert(edge_key(a, b), split);
    }
}

/// A vertex of the transient per-cell "full polygon": the original polygon
/// vertices interleaved with the intersection points on the edges between
/// them, preserving cyclic order.
#[derive(Copy, Clone, Debug)]
struct FullVert {
    id: u32,
    scalar: f64,
    is_clip: bool,
    original: bool,
}

/// The banded contour filter.
///
/// Partitions every cell of a [`PolyMesh`] into sub-regions where the scalar
/// value falls within one of the intervals bounded by `contour_values` (plus
/// the data range), emitting new points and cells with one band tag per
/// output cell.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BandedContour {
    contour_values: Vec<f64>,
    clipping: bool,
    scalar_mode: ScalarMode,
    clip_tolerance: f64,
    contour_edges: bool,
    attributes: Option<Vec<String>>,
}

impl BandedContour {
    /// Create the filter with the given contour values.
    ///
    /// Zero contour values is valid: the table collapses to `[min, max]` and
    /// every cell passes through unmodified in band 0.
    pub fn new(contour_values: impl Into<Vec<f64>>) -> Self {
        Self {
            contour_values: contour_values.into(),
            clipping: false,
            scalar_mode: ScalarMode::default(),
            clip_tolerance: 1e-7,
            contour_edges: false,
            attributes: None,
        }
    }

    /// Discard output cells whose band lies outside the user contour range.
    pub fn clipping(mut self, clipping: bool) -> Self {
        self.clipping = clipping;
        self
    }

    pub fn scalar_mode(mut self, mode: ScalarMode) -> Self {
        self.scalar_mode = mode;
        self
    }

    /// Relative tolerance used to merge near-duplicate clip values and to
    /// classify representative scalars.
    pub fn clip_tolerance(mut self, tolerance: f64) -> Self {
        self.clip_tolerance = tolerance;
        self
    }

    /// Additionally emit the edges dividing adjacent bands.
    pub fn contour_edges(mut self, generate: bool) -> Self {
        self.contour_edges = generate;
        self
    }

    /// Which point attributes to interpolate through to the output.
    /// `None` carries all of them.
    pub fn attributes(mut self, names: Option<Vec<String>>) -> Self {
        self.attributes = names;
        self
    }

    /// Run the filter.
    ///
    /// Missing input (no points, no scalars, or no cells) is reported through
    /// `log::error!` and produces an empty, valid output.
    pub fn execute(&self, mesh: &PolyMesh) -> BandedOutput {
        self.execute_until(mesh, || false)
    }

    /// Run the filter with a cooperative abort check.
    ///
    /// `abort` is polled between whole-cell iterations only; returning `true`
    /// truncates the remaining traversal, leaving already-emitted output
    /// intact.
    pub fn execute_until(
        &self,
        mesh: &PolyMesh,
        mut abort: impl FnMut() -> bool,
    ) -> BandedOutput {
        let range = match mesh.scalar_range() {
            Some(r) if mesh.cell_len() > 0 => r,
            _ => {
                log::error!(
                    "banded contour input has no points, scalars, or cells; producing empty output"
                );
                return BandedOutput {
                    mesh: PolyMesh::default(),
                    bands: Vec::new(),
                    clip_values: Vec::new(),
                    contour_edges: self.contour_edges.then(Vec::new),
                    scalar_mode: self.scalar_mode,
                };
            }
        };

        let table = ClipTable::build(&self.contour_values, range, self.clip_tolerance);

        // clipping keeps only the bands between the first and last user value
        let clip_range = (self.clipping && !self.contour_values.is_empty()).then(|| {
            let lo = self
                .contour_values
                .iter()
                .copied()
                .reduce(f64::min)
                .unwrap_or(range.0);
            let hi = self
                .contour_values
                .iter()
                .copied()
                .reduce(f64::max)
                .unwrap_or(range.1);
            (table.scalar_index(lo), table.scalar_index(hi))
        });

        // output points start as a verbatim copy of the input; intersection
        // points are appended behind them
        let mut out = PolyMesh::new(mesh.points().to_vec(), mesh.scalars().to_vec())
            .expect("input arrays are parallel");
        for attr in mesh.attributes() {
            let carry = match &self.attributes {
                None => true,
                Some(names) => names.iter().any(|n| n == attr.name()),
            };
            if carry {
                out.attributes_mut().push(attr.clone());
            }
        }

        let mut asm = Assembly {
            out,
            bands: Vec::new(),
            table,
            cache: EdgeCache::default(),
            clip_range,
            dividing: self.contour_edges.then(DividingEdges::default),
        };

        let mut aborted = false;
        let mut cells =
            |asm: &mut Assembly, array: &CellArray, f: fn(&mut Assembly, &[u32])| {
                if aborted {
                    return;
                }
                for cell in array.iter() {
                    if abort() {
                        aborted = true;
                        return;
                    }
                    f(asm, cell);
                }
            };

        cells(&mut asm, mesh.verts(), Assembly::vert_cell);
        cells(&mut asm, mesh.lines(), Assembly::line_cell);
        cells(&mut asm, mesh.polys(), Assembly::poly_cell);
        cells(&mut asm, mesh.strips(), Assembly::strip_cell);

        let Assembly {
            out,
            bands,
            table,
            dividing,
            ..
        } = asm;

        BandedOutput {
            mesh: out,
            bands,
            clip_values: table.values,
            contour_edges: dividing.map(|d| d.edges),
            scalar_mode: self.scalar_mode,
        }
    }
}

/// The filter's output: the banded mesh, one band tag per cell (verts, then
/// lines, then polys), the final clip-value table, and optionally the edges
/// dividing adjacent bands.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BandedOutput {
    pub mesh: PolyMesh,
    pub bands: Vec<u32>,
    pub clip_values: Vec<f64>,
    pub contour_edges: Option<Vec<[u32; 2]>>,
    pub scalar_mode: ScalarMode,
}

impl BandedOutput {
    /// The per-cell scalar array in the configured [`ScalarMode`]: band
    /// indices, or the clip value at each band's lower boundary.
    pub fn cell_scalars(&self) -> Vec<f64> {
        match self.scalar_mode {
            ScalarMode::Index => self.bands.iter().map(|&b| b as f64).collect(),
            ScalarMode::Value => self
                .bands
                .iter()
                .map(|&b| {
                    let i = (b as usize).min(self.clip_values.len().saturating_sub(1));
                    self.clip_values[i]
                })
                .collect(),
        }
    }
}

#[derive(Default)]
struct DividingEdges {
    edges: Vec<[u32; 2]>,
    seen: HashSet<u64>,
}

/// Per-invocation mutable state: the growing output arrays, the clip table,
/// and the edge intersection cache. Constructed fresh for every `execute`
/// call and discarded at the end.
struct Assembly {
    out: PolyMesh,
    bands: Vec<u32>,
    table: ClipTable,
    cache: EdgeCache,
    clip_range: Option<(usize, usize)>,
    dividing: Option<DividingEdges>,
}

impl Assembly {
    /// Poly-vertex cells split into individual vertex cells, each tagged by
    /// its own point's band. Never clipped.
    fn vert_cell(&mut self, cell: &[u32]) {
        for &v in cell {
            let band = self.table.clipped_index(self.out.scalars()[v as usize]);
            self.out.push_vert([v]);
            self.bands.push(band as u32);
        }
    }

    /// Polyline cells re-emitted as 2-point sub-segments split at every band
    /// crossing. Never clipped.
    fn line_cell(&mut self, cell: &[u32]) {
        for w in cell.windows(2) {
            let (a, b) = (w[0], w[1]);
            self.ensure_clipped(a, b);

            let mut seq = vec![a];
            if let Some(EdgeSplit::Points(ids)) = self.cache.lookup(a, b) {
                if a <= b {
                    seq.extend(ids.iter().copied());
                } else {
                    seq.extend(ids.iter().rev().copied());
                }
            }
            seq.push(b);

            for s in seq.windows(2) {
                let sa = self.out.scalars()[s[0] as usize];
                let sb = self.out.scalars()[s[1] as usize];
                let band = self.table.clipped_index(sa.min(sb));
                self.out.push_line([s[0], s[1]]);
                self.bands.push(band as u32);
            }
        }
    }

    fn strip_cell(&mut self, cell: &[u32]) {
        for tri in strip_triangles(cell) {
            self.poly_cell(&tri);
        }
    }

    /// Band one polygon: clip its edges, build the full polygon, and peel a
    /// band off the ring per clip interval crossed.
    fn poly_cell(&mut self, cell: &[u32]) {
        if cell.len() < 3 {
            return;
        }

        for i in 0..cell.len() {
            self.ensure_clipped(cell[i], cell[(i + 1) % cell.len()]);
        }

        let (full, intersected) = self.full_polygon(cell);

        // trivial: nothing crossed, or the ring is already a triangle
        if !intersected || full.len() == 3 {
            let min = full
                .iter()
                .map(|v| v.scalar)
                .reduce(f64::min)
                .unwrap_or_default();
            let ids = full.iter().map(|v| v.id).collect::<Vec<_>>();
            let band = self.table.clipped_index(min);
            self.insert_cell(ids, band);
            return;
        }

        self.peel_bands(&full);
    }

    /// Walk the original vertices in order, splicing each edge's cached
    /// intersection points in traversal direction. Returns the ring and
    /// whether any edge produced an intersection.
    fn full_polygon(&self, cell: &[u32]) -> (Vec<FullVert>, bool) {
        let scalars = self.out.scalars();
        let mut full = Vec::with_capacity(cell.len() * 2);
        let mut intersected = false;

        for (i, &v) in cell.iter().enumerate() {
            let vn = cell[(i + 1) % cell.len()];
            let s = scalars[v as usize];
            full.push(FullVert {
                id: v,
                scalar: s,
                is_clip: self.table.is_clip_value(s),
                original: true,
            });

            if let Some(EdgeSplit::Points(ids)) = self.cache.lookup(v, vn) {
                intersected = true;
                let mut splice = |id: u32| {
                    full.push(FullVert {
                        id,
                        scalar: scalars[id as usize],
                        is_clip: true,
                        original: false,
                    })
                };
                // cached order is min-id -> max-id; match this polygon's
                // traversal direction
                if v <= vn {
                    ids.iter().copied().for_each(&mut splice);
                } else {
                    ids.iter().rev().copied().for_each(&mut splice);
                }
            }
        }

        (full, intersected)
    }

    /// Strip one band polygon at a time off the outside of the ring until it
    /// is exhausted.
    fn peel_bands(&mut self, full: &[FullVert]) {
        let n = full.len();
        let nxt = |i: usize| (i + 1) % n;
        let prv = |i: usize| (i + n - 1) % n;
        let fwd_dist = |from: usize, to: usize| (to + n - from) % n;
        let path = |from: usize, to: usize| {
            // inclusive forward walk from -> to
            let mut ids = Vec::with_capacity(fwd_dist(from, to) + 1);
            let mut i = from;
            loop {
                ids.push(full[i].id);
                if i == to {
                    break;
                }
                i = nxt(i);
            }
            ids
        };

        // start from an original vertex of minimum scalar that is a local
        // minimum over the ring: band peeling then begins unambiguously
        // inside its own band on both sides. Ties keep the first vertex in
        // traversal order.
        let mut start = 0;
        let mut start_s = f64::INFINITY;
        for (i, v) in full.iter().enumerate() {
            if v.original
                && v.scalar < start_s
                && v.scalar <= full[prv(i)].scalar
                && v.scalar <= full[nxt(i)].scalar
            {
                start = i;
                start_s = v.scalar;
            }
        }

        // nearest contour-value vertices with a different scalar, either side
        #[allow(clippy::float_cmp)]
        let seek = |from: usize, until: usize, avoid: f64, step: &dyn Fn(usize) -> usize| {
            let mut i = step(from);
            while i != until {
                if full[i].is_clip && full[i].scalar != avoid {
                    return Some(i);
                }
                i = step(i);
            }
            None
        };

        let (m_l, m_r) = match (
            seek(start, start, start_s, &prv),
            seek(start, start, start_s, &nxt),
        ) {
            (Some(l), Some(r)) => (l, r),
            _ => {
                // intersections exist, so both walks find an inserted vertex;
                // this is unreachable but degrades to the unsplit cell
                let ids = full.iter().map(|v| v.id).collect::<Vec<_>>();
                let band = self.table.clipped_index(start_s);
                self.insert_cell(ids, band);
                return;
            }
        };

        // first band polygon wraps through the start vertex
        let band = self.table.clipped_index(start_s);
        self.insert_cell(path(m_l, m_r), band);

        let (mut m_l, mut m_r) = (m_l, m_r);
        loop {
            // un-peeled region runs forward from m_r around to m_l
            let remaining = fwd_dist(m_r, m_l) + 1;
            if remaining < 3 {
                break;
            }
            let band = self.table.clipped_index(full[m_r].scalar);
            if remaining == 3 {
                self.insert_cell(vec![full[m_r].id, full[nxt(m_r)].id, full[m_l].id], band);
                break;
            }

            let next_r = seek(m_r, m_l, full[m_r].scalar, &nxt);
            let next_l = seek(m_l, m_r, full[m_l].scalar, &prv);
            match (next_r, next_l) {
                (Some(r), Some(l)) if fwd_dist(m_r, r) < fwd_dist(m_r, l) => {
                    let mut ids = path(l, m_l);
                    ids.extend(path(m_r, r));
                    self.insert_cell(ids, band);
                    m_l = l;
                    m_r = r;
                }
                // cursors met or crossed: the ring is down to its last band
                _ => {
                    self.insert_cell(path(m_r, m_l), band);
                    break;
                }
            }
        }
    }

    /// Append a candidate polygon to the output.
    ///
    /// Degenerate polygons (< 3 vertices) are silently dropped; when clipping
    /// is enabled only bands within the user contour range are kept.
    fn insert_cell(&mut self, ids: Vec<u32>, band: usize) {
        if ids.len() < 3 {
            return;
        }

        if let Some(d) = &mut self.dividing {
            let scalars = self.out.scalars();
            for i in 0..ids.len() {
                let (a, b) = (ids[i], ids[(i + 1) % ids.len()]);
                let (sa, sb) = (scalars[a as usize], scalars[b as usize]);
                #[allow(clippy::float_cmp)]
                let on_contour =
                    sa == sb && self.table.is_clip_value(sa) && a != b;
                if on_contour && d.seen.insert(edge_key(a, b)) {
                    d.edges.push([a, b]);
                }
            }
        }

        if let Some((lo, hi)) = self.clip_range {
            if band < lo || band >= hi {
                return;
            }
        }

        self.out.push_poly(ids);
        self.bands.push(band as u32);
    }

    /// Clip edge `(a, b)` against the table once, inserting the crossing
    /// points and caching the split keyed by the unordered id pair.
    ///
    /// The inserted clip values are exactly the table entries strictly
    /// between the endpoint scalars; an endpoint sitting bit-exactly on a
    /// clip value contributes no point. Each new point's scalar is assigned
    /// the clip value itself, never the interpolated value, so equality
    /// tests across shared edges stay exact.
    fn ensure_clipped(&mut self, a: u32, b: u32) {
        if self.cache.lookup(a, b).is_some() {
            return;
        }

        // canonical id order; interpolation runs from the low-scalar end
        let (a, b) = if a <= b { (a, b) } else { (b, a) };
        let (s_a, s_b) = (
            self.out.scalars()[a as usize],
            self.out.scalars()[b as usize],
        );
        let (lo, hi, flipped) = if s_a <= s_b {
            (a, b, false)
        } else {
            (b, a, true)
        };
        let (s_lo, s_hi) = (s_a.min(s_b), s_a.max(s_b));

        let i_lo = self.table.scalar_index(s_lo);
        let i_hi = self.table.scalar_index(s_hi);

        let mut ids = Vec::new();
        for k in i_lo + 1..=i_hi {
            let value = self.table.values()[k];
            if value >= s_hi {
                break;
            }
            let t = (value - s_lo) / (s_hi - s_lo);
            let p = lerp(
                self.out.points()[lo as usize],
                self.out.points()[hi as usize],
                t,
            );
            let id = self.out.push_point(p, value);
            for attr in self.out.attributes_mut() {
                attr.push_lerped(lo as usize, hi as usize, t);
            }
            ids.push(id);
        }

        let split = if ids.is_empty() {
            EdgeSplit::None
        } else {
            if flipped {
                // store from the lower-indexed endpoint regardless of scalar
                // direction
                ids.reverse();
            }
            EdgeSplit::Points(ids)
        };
        self.cache.insert(a, b, split);
    }
}
