use crate::*;

/// Flat cell storage: connectivity ids plus an _end offset_ per cell.
///
/// Cell `i` is `connectivity[offsets[i-1]..offsets[i]]` (with an implicit zero
/// start for the first cell). This is done to save space so a cell costs
/// 4 bytes per id plus 4 bytes, rather than a `Vec` allocation each.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CellArray {
    offsets: Vec<u32>,
    connectivity: Vec<u32>,
}

impl CellArray {
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of cells.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// The total number of connectivity ids across all cells.
    pub fn id_len(&self) -> usize {
        self.connectivity.len()
    }

    /// Append a cell. Returns the cell's index.
    pub fn push<I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = u32>,
    {
        self.connectivity.extend(ids);
        self.offsets.push(self.connectivity.len() as u32);
        self.offsets.len() - 1
    }

    /// The ids of cell `i`.
    pub fn cell(&self, i: usize) -> &[u32] {
        let start = if i == 0 {
            0
        } else {
            self.offsets[i - 1] as usize
        };
        &self.connectivity[start..self.offsets[i] as usize]
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[u32]> + '_ {
        (0..self.len()).map(move |i| self.cell(i))
    }
}

impl<I> FromIterator<I> for CellArray
where
    I: IntoIterator<Item = u32>,
{
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        let mut c = CellArray::new();
        for cell in iter {
            c.push(cell);
        }
        c
    }
}

/// A named per-point data array with a fixed number of components per point.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Attribute {
    name: String,
    components: usize,
    data: Vec<f64>,
}

impl Attribute {
    pub fn new(name: impl Into<String>, components: usize, data: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            components,
            data,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// The number of point tuples stored.
    pub fn len(&self) -> usize {
        self.data.len() / self.components
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The components of point `i`.
    pub fn tuple(&self, i: usize) -> &[f64] {
        &self.data[i * self.components..(i + 1) * self.components]
    }

    /// Append the interpolation of tuples `a` and `b` at parameter `t`.
    pub fn push_lerped(&mut self, a: usize, b: usize, t: f64) {
        for c in 0..self.components {
            let x = self.data[a * self.components + c];
            let y = self.data[b * self.components + c];
            self.data.push(x + t * (y - x));
        }
    }
}

/// A polygonal mesh: points with one scalar each, optional extra point
/// attributes, and cell arrays for vertices, lines, polygons, and triangle
/// strips.
///
/// `PartialEq` is _derived_ and does _exact_ float equality, useful for
/// determinism checks but not for value equality.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PolyMesh {
    points: Vec<Point3>,
    scalars: Vec<f64>,
    attributes: Vec<Attribute>,
    verts: CellArray,
    lines: CellArray,
    polys: CellArray,
    strips: CellArray,
}

impl PolyMesh {
    /// Create a mesh from points and their parallel scalar array.
    pub fn new(points: Vec<Point3>, scalars: Vec<f64>) -> Result<Self, &'static str> {
        if points.len() != scalars.len() {
            Err("scalar array length must match point count")
        } else {
            Ok(Self {
                points,
                scalars,
                ..Default::default()
            })
        }
    }

    pub fn point_len(&self) -> usize {
        self.points.len()
    }

    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    pub fn scalars(&self) -> &[f64] {
        &self.scalars
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn verts(&self) -> &CellArray {
        &self.verts
    }

    pub fn lines(&self) -> &CellArray {
        &self.lines
    }

    pub fn polys(&self) -> &CellArray {
        &self.polys
    }

    pub fn strips(&self) -> &CellArray {
        &self.strips
    }

    /// The total number of cells across all cell arrays.
    pub fn cell_len(&self) -> usize {
        self.verts.len() + self.lines.len() + self.polys.len() + self.strips.len()
    }

    /// Register an extra point attribute to be carried through filters.
    ///
    /// The data length must equal `point_len * components`.
    pub fn add_attribute(&mut self, attr: Attribute) -> Result<(), &'static str> {
        if attr.len() != self.point_len() {
            Err("attribute tuple count must match point count")
        } else {
            self.attributes.push(attr);
            Ok(())
        }
    }

    pub fn push_vert<I: IntoIterator<Item = u32>>(&mut self, ids: I) -> usize {
        self.verts.push(ids)
    }

    pub fn push_line<I: IntoIterator<Item = u32>>(&mut self, ids: I) -> usize {
        self.lines.push(ids)
    }

    pub fn push_poly<I: IntoIterator<Item = u32>>(&mut self, ids: I) -> usize {
        self.polys.push(ids)
    }

    pub fn push_strip<I: IntoIterator<Item = u32>>(&mut self, ids: I) -> usize {
        self.strips.push(ids)
    }

    /// Appends a point (and its scalar), returning the new id.
    pub(crate) fn push_point(&mut self, p: Point3, scalar: f64) -> u32 {
        let id = self.points.len() as u32;
        self.points.push(p);
        self.scalars.push(scalar);
        id
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut Vec<Attribute> {
        &mut self.attributes
    }

    /// The `(min, max)` of the scalar field, or `None` if there are no points.
    pub fn scalar_range(&self) -> Option<(f64, f64)> {
        self.scalars
            .iter()
            .fold(None, |acc, &s| match acc {
                None => Some((s, s)),
                Some((lo, hi)) => Some((lo.min(s), hi.max(s))),
            })
    }

    /// The world coordinates of a cell's ids.
    pub fn cell_points(&self, ids: &[u32]) -> Vec<Point3> {
        ids.iter().map(|&i| self.points[i as usize]).collect()
    }

    /// A regular `nx` by `ny` triangulated sheet on unit spacing with scalar
    /// `f(x, y)` at each point. Useful for fixtures and benchmarking.
    pub fn triangulated_grid<F: Fn(f64, f64) -> f64>(nx: usize, ny: usize, f: F) -> Self {
        let mut points = Vec::with_capacity(nx * ny);
        let mut scalars = Vec::with_capacity(nx * ny);
        for y in 0..ny {
            for x in 0..nx {
                let (x, y) = (x as f64, y as f64);
                points.push([x, y, 0.0]);
                scalars.push(f(x, y));
            }
        }

        let mut mesh = Self::new(points, scalars).expect("parallel arrays by construction");

        let i = |x: usize, y: usize| (y * nx + x) as u32;
        for y in 0..ny.saturating_sub(1) {
            for x in 0..nx.saturating_sub(1) {
                mesh.push_poly([i(x, y), i(x + 1, y), i(x + 1, y + 1)]);
                mesh.push_poly([i(x, y), i(x + 1, y + 1), i(x, y + 1)]);
            }
        }

        mesh
    }
}

/// Total surface area of the mesh's polygons and (decomposed) strips.
impl Area for PolyMesh {
    fn area(&self) -> f64 {
        let polys = self
            .polys
            .iter()
            .map(|c| polygon_area(&self.cell_points(c)));
        let strips = self.strips.iter().flat_map(|s| {
            strip_triangles(s)
                .map(|t| polygon_area(&self.cell_points(&t)))
                .collect::<Vec<_>>()
        });
        polys.chain(strips).sum()
    }
}

/// Decompose a triangle strip into triangles.
///
/// For strip `(p0,p1,p2,p3,..)` yields `(p0,p1,p2), (p2,p1,p3), (p2,p3,p4),
/// ..` with alternating winding so every triangle keeps the strip's outward
/// orientation. Strips shorter than 3 ids yield nothing.
pub fn strip_triangles(ids: &[u32]) -> impl Iterator<Item = [u32; 3]> + '_ {
    ids.windows(3).enumerate().map(|(i, w)| {
        if i % 2 == 0 {
            [w[0], w[1], w[2]]
        } else {
            [w[1], w[0], w[2]]
        }
    })
}
