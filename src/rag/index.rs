//! Searchable vector index with two interchangeable backends.
//!
//! `FlatIndex` keeps a dense matrix and scores every row per query. The
//! `hnsw` feature adds `HnswVectorIndex`, an approximate nearest-neighbor
//! graph for larger stores. `build_index` picks the best backend compiled
//! into the binary.
//!
//! Both backends serialize to the same format: a small header (magic,
//! format version, backend tag, dimension, count) followed by the raw
//! little-endian f32 vector data. The tag records which backend wrote the
//! file; the reader only needs the vector payload, so a file written with
//! the HNSW backend loads fine into a flat-only binary and vice versa.

use std::cmp::Ordering;

use ndarray::{Array2, ArrayView1};

use crate::core::errors::ApiError;

const MAGIC: [u8; 4] = *b"SAVI";
const FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Flat,
    Hnsw,
}

impl IndexKind {
    fn tag(self) -> u8 {
        match self {
            IndexKind::Flat => 1,
            IndexKind::Hnsw => 2,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(IndexKind::Flat),
            2 => Some(IndexKind::Hnsw),
            _ => None,
        }
    }
}

/// A populated, searchable set of vectors.
///
/// Vectors are identified by insertion order; ids are dense and start at 0.
pub trait VectorIndex: Send + Sync {
    fn kind(&self) -> IndexKind;

    fn dimension(&self) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append vectors. Every vector must match the index dimension.
    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), ApiError>;

    /// Top-k ids by inner product with `query`, sorted by descending score
    /// with ties broken by insertion order.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, ApiError>;

    /// All stored vectors in insertion order, for persistence.
    fn vectors(&self) -> Vec<Vec<f32>>;
}

/// True when an accelerated nearest-neighbor backend is compiled in.
pub fn accelerated_available() -> bool {
    cfg!(feature = "hnsw")
}

/// Construct an empty index using the best available backend.
pub fn build_index(dimension: usize) -> Box<dyn VectorIndex> {
    #[cfg(feature = "hnsw")]
    return Box::new(HnswVectorIndex::new(dimension));

    #[cfg(not(feature = "hnsw"))]
    Box::new(FlatIndex::new(dimension))
}

/// Sort (id, score) pairs: score descending, insertion order on ties.
///
/// Applied explicitly in every backend so ranking does not depend on any
/// index library's native ordering.
fn rank(scores: &mut [(usize, f32)]) {
    scores.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
}

fn check_dimension(expected: usize, actual: usize) -> Result<(), ApiError> {
    if expected != actual {
        return Err(ApiError::Internal(format!(
            "vector dimension mismatch: expected {}, got {}",
            expected, actual
        )));
    }
    Ok(())
}

/// Exact search over a dense matrix.
pub struct FlatIndex {
    dimension: usize,
    matrix: Array2<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            matrix: Array2::zeros((0, dimension)),
        }
    }
}

impl VectorIndex for FlatIndex {
    fn kind(&self) -> IndexKind {
        IndexKind::Flat
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.matrix.nrows()
    }

    fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), ApiError> {
        for vector in vectors {
            check_dimension(self.dimension, vector.len())?;
            self.matrix
                .push_row(ArrayView1::from(&vector[..]))
                .map_err(ApiError::internal)?;
        }
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, ApiError> {
        check_dimension(self.dimension, query.len())?;
        if k == 0 || self.matrix.nrows() == 0 {
            return Ok(Vec::new());
        }

        let scores = self.matrix.dot(&ArrayView1::from(query));
        let mut ranked: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();
        rank(&mut ranked);
        ranked.truncate(k);
        Ok(ranked)
    }

    fn vectors(&self) -> Vec<Vec<f32>> {
        self.matrix.rows().into_iter().map(|r| r.to_vec()).collect()
    }
}

#[cfg(feature = "hnsw")]
pub use self::hnsw_backend::HnswVectorIndex;

#[cfg(feature = "hnsw")]
mod hnsw_backend {
    use hnsw_rs::prelude::*;

    use super::{check_dimension, rank, IndexKind, VectorIndex};
    use crate::core::errors::ApiError;

    const MAX_NB_CONNECTION: usize = 16;
    const EF_CONSTRUCTION: usize = 200;

    /// Approximate nearest-neighbor search over an HNSW graph.
    ///
    /// Keeps a copy of the raw vectors alongside the graph; the graph is
    /// rebuilt from them on append, which keeps insertion ids dense and the
    /// serialized form identical to the flat backend's.
    pub struct HnswVectorIndex {
        dimension: usize,
        rows: Vec<Vec<f32>>,
        graph: Hnsw<'static, f32, DistCosine>,
    }

    impl HnswVectorIndex {
        pub fn new(dimension: usize) -> Self {
            Self {
                dimension,
                rows: Vec::new(),
                graph: Self::build_graph(&[]),
            }
        }

        fn build_graph(rows: &[Vec<f32>]) -> Hnsw<'static, f32, DistCosine> {
            let capacity = rows.len().max(1);
            let nb_layer = ((capacity as f32).log2().ceil() as usize).clamp(4, 16);

            let mut graph: Hnsw<f32, DistCosine> = Hnsw::new(
                MAX_NB_CONNECTION,
                capacity,
                nb_layer,
                EF_CONSTRUCTION,
                DistCosine,
            );
            for (id, row) in rows.iter().enumerate() {
                graph.insert((row, id));
            }
            graph.set_searching_mode(true);
            graph
        }
    }

    impl VectorIndex for HnswVectorIndex {
        fn kind(&self) -> IndexKind {
            IndexKind::Hnsw
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn len(&self) -> usize {
            self.rows.len()
        }

        fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), ApiError> {
            for vector in vectors {
                check_dimension(self.dimension, vector.len())?;
            }
            self.rows.extend_from_slice(vectors);
            self.graph = Self::build_graph(&self.rows);
            Ok(())
        }

        fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>, ApiError> {
            check_dimension(self.dimension, query.len())?;
            if k == 0 || self.rows.is_empty() {
                return Ok(Vec::new());
            }

            let ef_search = (k * 2).max(50);
            let neighbours = self.graph.search(&query.to_vec(), k, ef_search);

            // DistCosine yields a distance; similarity = 1 - distance.
            let mut ranked: Vec<(usize, f32)> = neighbours
                .into_iter()
                .map(|n| (n.d_id, 1.0 - n.distance))
                .collect();
            rank(&mut ranked);
            ranked.truncate(k);
            Ok(ranked)
        }

        fn vectors(&self) -> Vec<Vec<f32>> {
            self.rows.clone()
        }
    }
}

/// Serialize an index: header plus raw vector data.
pub fn encode(index: &dyn VectorIndex) -> Vec<u8> {
    let rows = index.vectors();
    let dimension = index.dimension();

    let mut out = Vec::with_capacity(HEADER_LEN + rows.len() * dimension * 4);
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.push(index.kind().tag());
    out.push(0);
    out.extend_from_slice(&(dimension as u32).to_le_bytes());
    out.extend_from_slice(&(rows.len() as u32).to_le_bytes());

    for row in &rows {
        for value in row {
            out.extend_from_slice(&value.to_le_bytes());
        }
    }

    out
}

/// Deserialize an index file into the best available backend.
///
/// Returns the backend that wrote the file alongside the rebuilt index; the
/// writer's backend is informational only.
pub fn decode(bytes: &[u8]) -> Result<(IndexKind, Box<dyn VectorIndex>), ApiError> {
    if bytes.len() < HEADER_LEN {
        return Err(ApiError::Internal("index file truncated".to_string()));
    }
    if bytes[0..4] != MAGIC {
        return Err(ApiError::Internal("index file has invalid magic".to_string()));
    }

    let version = u16::from_le_bytes([bytes[4], bytes[5]]);
    if version != FORMAT_VERSION {
        return Err(ApiError::Internal(format!(
            "unsupported index format version {}",
            version
        )));
    }

    let written_by = IndexKind::from_tag(bytes[6]).ok_or_else(|| {
        ApiError::Internal(format!("unknown index backend tag {}", bytes[6]))
    })?;

    let dimension = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
    let count = u32::from_le_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]) as usize;

    let expected_len = HEADER_LEN as u64 + dimension as u64 * count as u64 * 4;
    if bytes.len() as u64 != expected_len {
        return Err(ApiError::Internal(format!(
            "index file length mismatch: expected {} bytes, got {}",
            expected_len,
            bytes.len()
        )));
    }

    if count == 0 {
        return Ok((written_by, Box::new(FlatIndex::new(dimension))));
    }

    let mut rows = Vec::with_capacity(count);
    let mut offset = HEADER_LEN;
    for _ in 0..count {
        let row: Vec<f32> = bytes[offset..offset + dimension * 4]
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        rows.push(row);
        offset += dimension * 4;
    }

    let mut index = build_index(dimension);
    index.add(&rows)?;
    Ok((written_by, index))
}
