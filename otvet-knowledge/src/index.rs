//! Cosine top-K over the whole corpus.
//!
//! Ranking is a full linear scan: every stored vector is compared with the
//! query on each call. That is fine for tens to low thousands of entries;
//! larger corpora would need an ANN index, which this module does not have.

use tracing::warn;

/// One ranked corpus entry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ranked {
    pub id: i64,
    pub score: f64,
}

/// Cosine similarity accumulated in `f64`.
///
/// Returns `None` when the dimensions differ. A zero-norm side yields `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Some(0.0);
    }
    Some(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Rank `corpus` against `query`, best first, at most `k` results.
///
/// Entries without a vector, with a vector of another dimension, or whose
/// score is not finite are left out. Equal scores keep corpus order.
pub fn rank<'a, I>(query: &[f32], corpus: I, k: usize) -> Vec<Ranked>
where
    I: IntoIterator<Item = (i64, Option<&'a [f32]>)>,
{
    if k == 0 {
        return Vec::new();
    }

    let mut ranked: Vec<Ranked> = corpus
        .into_iter()
        .filter_map(|(id, vector)| {
            let vector = vector?;
            match cosine_similarity(query, vector) {
                Some(score) if score.is_finite() => Some(Ranked { id, score }),
                Some(_) => {
                    warn!(id, "skipping entry with non-finite similarity");
                    None
                }
                None => {
                    warn!(
                        id,
                        stored = vector.len(),
                        query = query.len(),
                        "skipping entry with mismatched embedding dimension"
                    );
                    None
                }
            }
        })
        .collect();

    // sort_by is stable, which gives the corpus-order tie-break
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    ranked.truncate(k);
    ranked
}
