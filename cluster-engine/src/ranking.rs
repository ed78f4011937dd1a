use embedding_engine::vector::{euclidean_distance, mean_vector};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use trend_core::{ClusterMap, Post, RankedPost, NOISE_LABEL};

/// Index (within `members`) of the vector nearest the members' mean.
///
/// Ties go to the lowest index. `members` must be non-empty.
pub fn elect_centroid(members: &[&[f32]]) -> usize {
    let mean = mean_vector(members);
    let mut best = 0;
    let mut best_distance = f32::INFINITY;

    for (index, vector) in members.iter().enumerate() {
        let distance = euclidean_distance(vector, &mean);
        if distance < best_distance {
            best = index;
            best_distance = distance;
        }
    }

    best
}

/// Group posts by label, flag each group's centroid and order it by engagement.
///
/// `posts`, `embeddings` and `labels` are parallel slices. Noise is dropped.
pub fn rank_clusters(posts: &[Post], embeddings: &[Vec<f32>], labels: &[i32]) -> ClusterMap {
    let mut groups: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
    for (index, &label) in labels.iter().enumerate() {
        if label != NOISE_LABEL {
            groups.entry(label).or_default().push(index);
        }
    }

    groups
        .into_iter()
        .map(|(label, indices)| {
            let vectors: Vec<&[f32]> = indices.iter().map(|&i| embeddings[i].as_slice()).collect();
            let centroid = elect_centroid(&vectors);

            let mut ranked: Vec<RankedPost> = indices
                .iter()
                .enumerate()
                .map(|(position, &i)| RankedPost {
                    post: posts[i].clone(),
                    is_centroid: position == centroid,
                })
                .collect();
            sort_by_engagement(&mut ranked);

            (label, ranked)
        })
        .collect()
}

/// Stable sort, highest engagement first. Engagement is finite here, and
/// `0.0` and `-0.0` compare equal so they keep their input order.
pub fn sort_by_engagement(posts: &mut [RankedPost]) {
    posts.sort_by(|a, b| {
        b.engagement()
            .partial_cmp(&a.engagement())
            .unwrap_or(Ordering::Equal)
    });
}
