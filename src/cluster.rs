//! Semantic phrase clustering.
//!
//! LLM-extracted opinion tags are free text: "comfortable seat" and "very
//! comfy chair seat" are the same consensus worded differently, and naive
//! string counting undercounts it. This module groups the distinct phrases of
//! a field by embedding similarity, picks one terse representative per group,
//! and counts every original occurrence under its representative.
//!
//! Clustering is a pure function of the input set: centroid seeding is
//! deterministic (farthest-point) and ties resolve by first-encountered
//! order, so identical inputs always produce identical rankings.

use anyhow::Result;
use std::collections::HashMap;

use crate::config::ClusteringConfig;
use crate::embedding::Embedder;
use crate::models::RankedPhrase;

/// Tuning knobs for one clustering call.
#[derive(Debug, Clone, Copy)]
pub struct ClusterParams {
    /// Target cluster count; capped at the distinct phrase count.
    pub cluster_count: usize,
    /// Ranking length returned to the caller.
    pub top_k: usize,
}

impl From<&ClusteringConfig> for ClusterParams {
    fn from(cfg: &ClusteringConfig) -> Self {
        Self {
            cluster_count: cfg.cluster_count,
            top_k: cfg.top_k,
        }
    }
}

/// Cluster a phrase multiset and return its `top_k` representatives by
/// occurrence count.
///
/// Normalization trims whitespace, lower-cases, and drops empty strings.
/// With fewer than 2 distinct normalized phrases clustering adds nothing, so
/// the raw multiset is counted as-is without touching the embedder.
pub async fn cluster_and_count(
    embedder: &dyn Embedder,
    params: ClusterParams,
    phrases: &[String],
) -> Result<Vec<RankedPhrase>> {
    let normalized: Vec<String> = phrases
        .iter()
        .map(|p| p.trim().to_lowercase())
        .filter(|p| !p.is_empty())
        .collect();

    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    // Distinct phrases in first-occurrence order. The order matters: it is
    // the tie-break for representative selection below.
    let mut distinct: Vec<String> = Vec::new();
    {
        let mut seen = std::collections::HashSet::new();
        for p in &normalized {
            if seen.insert(p.clone()) {
                distinct.push(p.clone());
            }
        }
    }

    if distinct.len() < 2 {
        return Ok(rank_by_count(normalized.iter().map(String::as_str), params.top_k));
    }

    let embeddings = embedder.embed(&distinct).await?;

    let k = params.cluster_count.min(distinct.len());
    let labels = kmeans(&embeddings, k);

    // Representative per cluster: the member with the fewest characters,
    // first encountered wins on ties. Terse canonical phrasing beats
    // verbose variants.
    let mut members: HashMap<usize, Vec<&str>> = HashMap::new();
    for (phrase, &label) in distinct.iter().zip(labels.iter()) {
        members.entry(label).or_default().push(phrase);
    }

    let mut representative: HashMap<&str, &str> = HashMap::new();
    for cluster in members.values() {
        let rep = cluster
            .iter()
            .copied()
            .min_by_key(|p| p.chars().count())
            .unwrap_or_default();
        for &phrase in cluster {
            representative.insert(phrase, rep);
        }
    }

    // Count every occurrence of the original multiset under its cluster's
    // representative, not just the distinct set.
    let mapped = normalized
        .iter()
        .map(|p| *representative.get(p.as_str()).unwrap_or(&p.as_str()));

    Ok(rank_by_count(mapped, params.top_k))
}

/// Count a phrase sequence and return the `top_k` entries by descending
/// count, ties broken by first-seen order.
fn rank_by_count<'a>(phrases: impl Iterator<Item = &'a str>, top_k: usize) -> Vec<RankedPhrase> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    let mut first_seen: HashMap<&str, usize> = HashMap::new();

    for (i, phrase) in phrases.enumerate() {
        *counts.entry(phrase).or_insert(0) += 1;
        first_seen.entry(phrase).or_insert(i);
    }

    let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
    ranked.sort_by_key(|(phrase, count)| (std::cmp::Reverse(*count), first_seen[phrase]));
    ranked.truncate(top_k);

    ranked
        .into_iter()
        .map(|(phrase, count)| RankedPhrase {
            phrase: phrase.to_string(),
            count,
        })
        .collect()
}

/// Lloyd's k-means with deterministic farthest-point seeding.
///
/// Returns one cluster label per input point. Seeding starts from the first
/// point and repeatedly picks the point farthest from its nearest chosen
/// centroid, so the result depends only on the input order, never on a RNG.
fn kmeans(points: &[Vec<f32>], k: usize) -> Vec<usize> {
    debug_assert!(k >= 1 && k <= points.len());
    let dims = points[0].len();

    let mut centroids: Vec<Vec<f32>> = Vec::with_capacity(k);
    centroids.push(points[0].clone());
    while centroids.len() < k {
        let next = points
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                let da = nearest_distance(a, &centroids);
                let db = nearest_distance(b, &centroids);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
            .unwrap_or(0);
        centroids.push(points[next].clone());
    }

    let mut labels = vec![0usize; points.len()];
    for _ in 0..100 {
        // Assignment step; nearest centroid, lowest index on ties.
        let mut changed = false;
        for (i, point) in points.iter().enumerate() {
            let label = nearest_centroid(point, &centroids);
            if labels[i] != label {
                labels[i] = label;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        // Update step. A cluster that lost all members keeps its centroid.
        let mut sums = vec![vec![0.0f32; dims]; k];
        let mut counts = vec![0usize; k];
        for (point, &label) in points.iter().zip(labels.iter()) {
            counts[label] += 1;
            for (s, v) in sums[label].iter_mut().zip(point.iter()) {
                *s += v;
            }
        }
        for (c, (sum, count)) in centroids.iter_mut().zip(sums.iter().zip(counts.iter())) {
            if *count > 0 {
                for (ci, si) in c.iter_mut().zip(sum.iter()) {
                    *ci = si / *count as f32;
                }
            }
        }
    }

    labels
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest_distance(point: &[f32], centroids: &[Vec<f32>]) -> f32 {
    centroids
        .iter()
        .map(|c| squared_distance(point, c))
        .fold(f32::INFINITY, f32::min)
}

fn nearest_centroid(point: &[f32], centroids: &[Vec<f32>]) -> usize {
    let mut best = 0usize;
    let mut best_dist = f32::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best_dist {
            best = i;
            best_dist = d;
        }
    }
    best
}
