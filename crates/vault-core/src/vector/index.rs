use crate::error::{Result, VaultError};
use crate::types::{Embedding, EntityId, ExposureCode, RetentionTier};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

/// One indexed entity. Replaced wholesale on upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub id: EntityId,
    pub vector: Embedding,
    pub exposure: ExposureCode,
    pub tier: RetentionTier,
    /// Sensitivity level of the entity.
    pub clearance: u8,
    /// Opaque source reference (path) carried back to callers.
    pub source: String,
}

/// Result from a similarity query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: EntityId,
    pub score: f32, // Cosine similarity, -1.0 to 1.0
    pub tier: RetentionTier,
    pub clearance: u8,
    pub exposure: ExposureCode,
    pub source: String,
}

/// Filter for similarity queries.
///
/// The ceiling is trusted as supplied: deriving it for an authenticated
/// requester happens at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorFilter {
    /// Records with a clearance above this are never returned.
    pub clearance_ceiling: u8,
    /// Only return records at exactly this tier.
    pub tier: Option<RetentionTier>,
}

impl VectorFilter {
    pub fn new(clearance_ceiling: u8) -> Self {
        Self {
            clearance_ceiling,
            tier: None,
        }
    }

    pub fn with_tier(mut self, tier: RetentionTier) -> Self {
        self.tier = Some(tier);
        self
    }

    fn matches(&self, record: &VectorRecord) -> bool {
        if record.clearance > self.clearance_ceiling {
            return false;
        }

        match self.tier {
            Some(tier) => record.tier == tier,
            None => true,
        }
    }
}

/// Cosine similarity. 0.0 when either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

/// Exact in-memory similarity index.
///
/// Ephemeral: rebuilt from a full scan of the entity store on startup.
/// Every query scores every record, so ranking is exact and stable.
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    records: HashMap<EntityId, VectorRecord>,
    dimension: usize,
}

impl SimilarityIndex {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(VaultError::InvalidDimension(dimension));
        }
        Ok(Self {
            records: HashMap::new(),
            dimension,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&VectorRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    /// Insert or fully replace records by id.
    ///
    /// The batch is validated before anything is applied, so a bad record
    /// leaves the index untouched.
    pub fn upsert(&mut self, records: Vec<VectorRecord>) -> Result<()> {
        for record in &records {
            self.check_vector(&record.vector)?;
            if record.exposure == ExposureCode::Suppressed {
                return Err(VaultError::Validation(format!(
                    "Refusing to index suppressed entity {}",
                    record.id
                )));
            }
        }

        for record in records {
            self.records.insert(record.id.clone(), record);
        }
        Ok(())
    }

    /// Remove a record. Returns the removed record if it existed.
    pub fn remove(&mut self, id: &str) -> Option<VectorRecord> {
        self.records.remove(id)
    }

    /// Top-K records by cosine similarity to `vector`, descending score,
    /// ties broken by ascending id.
    pub fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: Option<&VectorFilter>,
    ) -> Result<Vec<SearchHit>> {
        self.check_vector(vector)?;

        if top_k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<SearchHit> = self
            .records
            .par_iter()
            .filter(|(_, record)| filter.map_or(true, |f| f.matches(record)))
            .map(|(_, record)| SearchHit {
                id: record.id.clone(),
                score: cosine_similarity(vector, &record.vector),
                tier: record.tier,
                clearance: record.clearance,
                exposure: record.exposure,
                source: record.source.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(VaultError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(VaultError::Validation(
                "Vector contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(id: &str, vector: Vec<f32>, clearance: u8, tier: RetentionTier) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            vector,
            exposure: ExposureCode::Full,
            tier,
            clearance,
            source: format!("notes/{}.md", id),
        }
    }

    #[test]
    fn test_clearance_ceiling_example() {
        let mut index = SimilarityIndex::new(2).unwrap();
        index
            .upsert(vec![
                record("a", vec![1.0, 0.0], 1, RetentionTier::LongTerm),
                record("b", vec![0.0, 1.0], 3, RetentionTier::LongTerm),
            ])
            .unwrap();

        let hits = index
            .query(&[1.0, 0.0], 5, Some(&VectorFilter::new(2)))
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_own_vector_ranks_first() {
        let mut index = SimilarityIndex::new(3).unwrap();
        index
            .upsert(vec![
                record("x", vec![0.2, 0.9, 0.1], 0, RetentionTier::Temporary),
                record("y", vec![0.9, 0.1, 0.0], 0, RetentionTier::Temporary),
                record("z", vec![0.0, 0.0, 1.0], 0, RetentionTier::Temporary),
            ])
            .unwrap();

        let hits = index.query(&[0.9, 0.1, 0.0], 1, None).unwrap();
        assert_eq!(hits[0].id, "y");
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_upsert_replaces_whole_record() {
        let mut index = SimilarityIndex::new(2).unwrap();
        index
            .upsert(vec![record("a", vec![1.0, 0.0], 1, RetentionTier::Transitory)])
            .unwrap();
        index
            .upsert(vec![record("a", vec![0.0, 1.0], 4, RetentionTier::ShortTerm)])
            .unwrap();

        assert_eq!(index.len(), 1);
        let stored = index.get("a").unwrap();
        assert_eq!(stored.vector, vec![0.0, 1.0]);
        assert_eq!(stored.clearance, 4);
        assert_eq!(stored.tier, RetentionTier::ShortTerm);
    }

    #[test]
    fn test_bad_batch_applies_nothing() {
        let mut index = SimilarityIndex::new(2).unwrap();
        let result = index.upsert(vec![
            record("a", vec![1.0, 0.0], 1, RetentionTier::LongTerm),
            record("b", vec![1.0, 0.0, 0.0], 1, RetentionTier::LongTerm),
        ]);

        assert!(matches!(
            result,
            Err(VaultError::DimensionMismatch { expected: 2, got: 3 })
        ));
        assert!(index.is_empty());
    }

    #[test]
    fn test_suppressed_record_rejected() {
        let mut index = SimilarityIndex::new(2).unwrap();
        let mut secret = record("s", vec![1.0, 0.0], 9, RetentionTier::LongTerm);
        secret.exposure = ExposureCode::Suppressed;
        assert!(index.upsert(vec![secret]).is_err());
    }

    #[test]
    fn test_tier_filter_is_exact_match() {
        let mut index = SimilarityIndex::new(2).unwrap();
        index
            .upsert(vec![
                record("a", vec![1.0, 0.0], 0, RetentionTier::LongTerm),
                record("b", vec![1.0, 0.1], 0, RetentionTier::ShortTerm),
            ])
            .unwrap();

        let filter = VectorFilter::new(9).with_tier(RetentionTier::ShortTerm);
        let hits = index.query(&[1.0, 0.0], 10, Some(&filter)).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "b");
    }

    #[test]
    fn test_ties_broken_by_id() {
        let mut index = SimilarityIndex::new(2).unwrap();
        index
            .upsert(vec![
                record("m", vec![1.0, 0.0], 0, RetentionTier::LongTerm),
                record("c", vec![2.0, 0.0], 0, RetentionTier::LongTerm),
                record("q", vec![3.0, 0.0], 0, RetentionTier::LongTerm),
            ])
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 3, None).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "m", "q"]);
    }

    #[test]
    fn test_zero_magnitude_scores_zero() {
        let mut index = SimilarityIndex::new(2).unwrap();
        index
            .upsert(vec![record("zero", vec![0.0, 0.0], 0, RetentionTier::LongTerm)])
            .unwrap();

        let hits = index.query(&[1.0, 0.0], 1, None).unwrap();
        assert_eq!(hits[0].score, 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_empty_index_and_zero_top_k() {
        let mut index = SimilarityIndex::new(2).unwrap();
        assert!(index.query(&[1.0, 0.0], 5, None).unwrap().is_empty());

        index
            .upsert(vec![record("a", vec![1.0, 0.0], 0, RetentionTier::LongTerm)])
            .unwrap();
        assert!(index.query(&[1.0, 0.0], 0, None).unwrap().is_empty());
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let index = SimilarityIndex::new(3).unwrap();
        assert!(index.query(&[1.0, 0.0], 5, None).is_err());
        assert!(SimilarityIndex::new(0).is_err());
    }

    #[test]
    fn test_remove() {
        let mut index = SimilarityIndex::new(2).unwrap();
        index
            .upsert(vec![record("a", vec![1.0, 0.0], 0, RetentionTier::LongTerm)])
            .unwrap();
        assert!(index.remove("a").is_some());
        assert!(index.remove("a").is_none());
        assert!(index.query(&[1.0, 0.0], 5, None).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn prop_clearance_never_exceeds_ceiling(
            clearances in prop::collection::vec(0u8..=9, 1..40),
            ceiling in 0u8..=9,
        ) {
            let mut index = SimilarityIndex::new(2).unwrap();
            let records = clearances
                .iter()
                .enumerate()
                .map(|(i, c)| record(&format!("e{}", i), vec![1.0, i as f32], *c, RetentionTier::LongTerm))
                .collect();
            index.upsert(records).unwrap();

            let hits = index.query(&[1.0, 0.5], 100, Some(&VectorFilter::new(ceiling))).unwrap();
            let expected = clearances.iter().filter(|c| **c <= ceiling).count();
            prop_assert_eq!(hits.len(), expected);
            prop_assert!(hits.iter().all(|h| h.clearance <= ceiling));
        }
    }
}
