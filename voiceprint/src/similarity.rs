//! Cosine similarity over L2-normalized embeddings.
//!
//! Because every stored and query embedding is unit length, cosine
//! similarity reduces to a dot product. f64 accumulation keeps results
//! stable for the 192-512 dimensions this engine sees.

/// L2-normalizes a vector in place.
///
/// Near-zero vectors (norm below 1e-10) are left untouched; they indicate a
/// degenerate upstream embedding.
pub fn l2_normalize(v: &mut [f32]) {
    let mut norm: f64 = 0.0;
    for &x in v.iter() {
        norm += x as f64 * x as f64;
    }
    norm = norm.sqrt();
    if norm > 1e-10 {
        let scale = (1.0 / norm) as f32;
        for x in v.iter_mut() {
            *x *= scale;
        }
    }
}

/// Cosine similarity of two L2-normalized vectors, clamped to [-1, 1].
///
/// Returns 0 for empty or mismatched inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot: f64 = 0.0;
    for i in 0..a.len() {
        dot += a[i] as f64 * b[i] as f64;
    }
    dot.clamp(-1.0, 1.0) as f32
}

/// Result of a 1:N scan.
#[derive(Debug, Clone)]
pub struct BestMatch {
    /// Index into the candidate sequence.
    pub index: usize,
    /// Candidate identifier.
    pub speaker_id: String,
    /// Cosine similarity of the winner.
    pub score: f32,
}

/// Scans all candidates and returns the highest-scoring one.
///
/// Ties go to the first occurrence. Returns `None` on an empty candidate
/// sequence.
pub fn best_match<'a, I>(query: &[f32], candidates: I) -> Option<BestMatch>
where
    I: IntoIterator<Item = (&'a str, &'a [f32])>,
{
    let mut best: Option<BestMatch> = None;
    for (index, (id, emb)) in candidates.into_iter().enumerate() {
        let score = cosine_similarity(query, emb);
        let better = match &best {
            Some(b) => score > b.score,
            None => true,
        };
        if better {
            best = Some(BestMatch {
                index,
                speaker_id: id.to_string(),
                score,
            });
        }
    }
    best
}
