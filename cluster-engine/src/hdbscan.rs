//! Deterministic HDBSCAN* over dense Euclidean vectors.
//!
//! The pipeline is the textbook one: core distances, mutual reachability,
//! a minimum spanning tree, the single-linkage hierarchy, the condensed tree
//! and excess-of-mass selection. Every tie is broken by point index, so the
//! same input always produces the same labels.

use embedding_engine::vector::euclidean_distance;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;
use trend_core::{ClusterError, NOISE_LABEL};

/// λ for zero-distance merges.
const MAX_LAMBDA: f64 = 1e12;

/// Parameters for HDBSCAN clustering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HdbscanParams {
    /// Minimum number of points to form a cluster.
    pub min_cluster_size: usize,

    /// Neighbour rank used for the core distance.
    /// Must be <= min_cluster_size.
    pub min_samples: usize,

    /// When the whole set forms one cluster, the widest gap in exit distances
    /// splits off noise only if the far side is at least this many times the near side.
    pub single_cluster_gap_ratio: f64,
}

impl Default for HdbscanParams {
    fn default() -> Self {
        Self {
            min_cluster_size: 3,
            min_samples: 1,
            single_cluster_gap_ratio: 1.5,
        }
    }
}

impl HdbscanParams {
    pub fn new(min_cluster_size: usize, min_samples: usize) -> Self {
        Self {
            min_cluster_size,
            min_samples,
            ..Self::default()
        }
    }

    pub fn with_min_cluster_size(mut self, size: usize) -> Self {
        self.min_cluster_size = size;
        self
    }

    pub fn with_min_samples(mut self, samples: usize) -> Self {
        self.min_samples = samples;
        self
    }

    pub fn with_gap_ratio(mut self, ratio: f64) -> Self {
        self.single_cluster_gap_ratio = ratio;
        self
    }

    /// Validate parameters.
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::InvalidParameter` if:
    /// - `min_cluster_size < 2`
    /// - `min_samples` is 0 or exceeds `min_cluster_size`
    /// - the gap ratio is below 1 or not finite
    pub fn validate(&self) -> Result<(), ClusterError> {
        if self.min_cluster_size < 2 {
            return Err(ClusterError::invalid_parameter(format!(
                "min_cluster_size must be >= 2, got {}",
                self.min_cluster_size
            )));
        }

        if self.min_samples == 0 {
            return Err(ClusterError::invalid_parameter(
                "min_samples must be >= 1, got 0",
            ));
        }

        if self.min_samples > self.min_cluster_size {
            return Err(ClusterError::invalid_parameter(format!(
                "min_samples ({}) must be <= min_cluster_size ({})",
                self.min_samples, self.min_cluster_size
            )));
        }

        if !self.single_cluster_gap_ratio.is_finite() || self.single_cluster_gap_ratio < 1.0 {
            return Err(ClusterError::invalid_parameter(format!(
                "single_cluster_gap_ratio must be a finite value >= 1, got {}",
                self.single_cluster_gap_ratio
            )));
        }

        Ok(())
    }
}

/// Label every point with a cluster number `0..k`, or [`NOISE_LABEL`].
pub fn hdbscan(points: &[Vec<f32>], params: &HdbscanParams) -> Result<Vec<i32>, ClusterError> {
    params.validate()?;

    let n = points.len();
    if n == 0 {
        return Ok(Vec::new());
    }

    let dim = points[0].len();
    if let Some(bad) = points.iter().position(|p| p.len() != dim) {
        return Err(ClusterError::InconsistentInput {
            message: format!(
                "point {} has dimension {}, expected {}",
                bad,
                points[bad].len(),
                dim
            ),
        });
    }

    if n < params.min_cluster_size {
        debug!(
            "{} points cannot form a cluster of {}, all noise",
            n, params.min_cluster_size
        );
        return Ok(vec![NOISE_LABEL; n]);
    }

    let distances = DistanceMatrix::new(points);
    let core = core_distances(&distances, params.min_samples);
    let mst = minimum_spanning_tree(&distances, &core);
    let hierarchy = single_linkage(n, mst);
    let tree = CondensedTree::build(&hierarchy, params.min_cluster_size);
    let labels = tree.labels(params);

    debug!(
        "HDBSCAN labelled {} points into {} clusters",
        n,
        labels.iter().filter(|&&l| l != NOISE_LABEL).max().map_or(0, |&l| l + 1)
    );

    Ok(labels)
}

struct DistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl DistanceMatrix {
    fn new(points: &[Vec<f32>]) -> Self {
        let n = points.len();
        let mut values = vec![0.0; n * n];
        for i in 0..n {
            for j in (i + 1)..n {
                let d = euclidean_distance(&points[i], &points[j]) as f64;
                values[i * n + j] = d;
                values[j * n + i] = d;
            }
        }
        Self { n, values }
    }

    fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.n + j]
    }
}

/// Distance to the `min_samples`-th nearest other point.
fn core_distances(distances: &DistanceMatrix, min_samples: usize) -> Vec<f64> {
    let n = distances.n;
    (0..n)
        .map(|i| {
            let mut others: Vec<f64> = (0..n)
                .filter(|&j| j != i)
                .map(|j| distances.get(i, j))
                .collect();
            if others.is_empty() {
                return 0.0;
            }
            others.sort_by(|a, b| a.total_cmp(b));
            let rank = (min_samples - 1).min(others.len() - 1);
            others[rank]
        })
        .collect()
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    a: usize,
    b: usize,
    weight: f64,
}

/// Dense Prim's over mutual reachability distances, starting at point 0.
fn minimum_spanning_tree(distances: &DistanceMatrix, core: &[f64]) -> Vec<Edge> {
    let n = distances.n;
    let mut in_tree = vec![false; n];
    let mut best = vec![f64::INFINITY; n];
    let mut from = vec![0usize; n];
    let mut edges = Vec::with_capacity(n.saturating_sub(1));

    let mut current = 0;
    in_tree[current] = true;

    for _ in 1..n {
        for v in 0..n {
            if in_tree[v] {
                continue;
            }
            let reach = distances.get(current, v).max(core[current]).max(core[v]);
            if reach < best[v] {
                best[v] = reach;
                from[v] = current;
            }
        }

        // Strict comparison keeps the lowest index on ties.
        let mut next = usize::MAX;
        for v in 0..n {
            if !in_tree[v] && (next == usize::MAX || best[v] < best[next]) {
                next = v;
            }
        }

        in_tree[next] = true;
        edges.push(Edge {
            a: from[next],
            b: next,
            weight: best[next],
        });
        current = next;
    }

    edges
}

#[derive(Debug, Clone, Copy)]
struct Merge {
    left: usize,
    right: usize,
    distance: f64,
    size: usize,
}

/// Single-linkage dendrogram. Leaves are `0..n`; merge `k` is node `n + k`.
struct Hierarchy {
    n: usize,
    merges: Vec<Merge>,
}

impl Hierarchy {
    fn root(&self) -> usize {
        self.n + self.merges.len() - 1
    }

    fn size(&self, node: usize) -> usize {
        if node < self.n {
            1
        } else {
            self.merges[node - self.n].size
        }
    }

    fn leaves(&self, node: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![node];
        while let Some(node) = stack.pop() {
            if node < self.n {
                out.push(node);
            } else {
                let merge = &self.merges[node - self.n];
                stack.push(merge.right);
                stack.push(merge.left);
            }
        }
        out
    }
}

fn single_linkage(n: usize, mut edges: Vec<Edge>) -> Hierarchy {
    edges.sort_by(|x, y| {
        x.weight
            .total_cmp(&y.weight)
            .then(x.a.min(x.b).cmp(&y.a.min(y.b)))
            .then(x.a.max(x.b).cmp(&y.a.max(y.b)))
    });

    let total = 2 * n - 1;
    let mut parent: Vec<usize> = (0..total).collect();
    let mut merges = Vec::with_capacity(n - 1);

    fn find(parent: &mut [usize], mut x: usize) -> usize {
        let mut root = x;
        while parent[root] != root {
            root = parent[root];
        }
        while parent[x] != root {
            let next = parent[x];
            parent[x] = root;
            x = next;
        }
        root
    }

    let mut sizes = vec![1usize; total];
    for (k, edge) in edges.iter().enumerate() {
        let left = find(&mut parent, edge.a);
        let right = find(&mut parent, edge.b);
        let node = n + k;
        let size = sizes[left] + sizes[right];
        parent[left] = node;
        parent[right] = node;
        sizes[node] = size;
        merges.push(Merge {
            left,
            right,
            distance: edge.weight,
            size,
        });
    }

    Hierarchy { n, merges }
}

fn lambda(distance: f64) -> f64 {
    if distance > 1.0 / MAX_LAMBDA {
        1.0 / distance
    } else {
        MAX_LAMBDA
    }
}

fn exit_distance(lambda: f64) -> f64 {
    if lambda > 0.0 {
        1.0 / lambda
    } else {
        f64::INFINITY
    }
}

/// Condensed cluster tree. Cluster 0 is the root; children always have larger ids.
struct CondensedTree {
    n: usize,
    parent: Vec<Option<usize>>,
    birth: Vec<f64>,
    children: Vec<Vec<usize>>,
    /// Sum over points leaving each cluster of `(λ_leave - λ_birth)`, weighted by size.
    stability: Vec<f64>,
    /// Cluster each point falls out of, and the λ at which it does.
    point_exit: Vec<(usize, f64)>,
}

impl CondensedTree {
    fn build(hierarchy: &Hierarchy, min_cluster_size: usize) -> Self {
        let n = hierarchy.n;
        let mut tree = CondensedTree {
            n,
            parent: vec![None],
            birth: vec![0.0],
            children: vec![Vec::new()],
            stability: vec![0.0],
            point_exit: vec![(0, 0.0); n],
        };

        let mut queue = VecDeque::from([(hierarchy.root(), 0usize)]);
        while let Some((node, cluster)) = queue.pop_front() {
            let merge = hierarchy.merges[node - n];
            let at = lambda(merge.distance);
            let left_big = hierarchy.size(merge.left) >= min_cluster_size;
            let right_big = hierarchy.size(merge.right) >= min_cluster_size;

            match (left_big, right_big) {
                (true, true) => {
                    for child in [merge.left, merge.right] {
                        let id = tree.add_cluster(cluster, at);
                        tree.stability[cluster] +=
                            (at - tree.birth[cluster]) * hierarchy.size(child) as f64;
                        queue.push_back((child, id));
                    }
                }
                (false, false) => {
                    for child in [merge.left, merge.right] {
                        tree.drop_points(hierarchy, child, cluster, at);
                    }
                }
                (true, false) => {
                    tree.drop_points(hierarchy, merge.right, cluster, at);
                    queue.push_back((merge.left, cluster));
                }
                (false, true) => {
                    tree.drop_points(hierarchy, merge.left, cluster, at);
                    queue.push_back((merge.right, cluster));
                }
            }
        }

        tree
    }

    fn add_cluster(&mut self, parent: usize, birth: f64) -> usize {
        let id = self.parent.len();
        self.parent.push(Some(parent));
        self.birth.push(birth);
        self.children.push(Vec::new());
        self.stability.push(0.0);
        self.children[parent].push(id);
        id
    }

    fn drop_points(&mut self, hierarchy: &Hierarchy, node: usize, cluster: usize, at: f64) {
        for point in hierarchy.leaves(node) {
            self.point_exit[point] = (cluster, at);
            self.stability[cluster] += at - self.birth[cluster];
        }
    }

    fn cluster_count(&self) -> usize {
        self.parent.len()
    }

    /// Excess-of-mass selection. The root only competes when it has no children.
    fn select(&self) -> Vec<bool> {
        let count = self.cluster_count();
        let mut selected = vec![false; count];

        if count == 1 {
            selected[0] = true;
            return selected;
        }

        let mut stability = self.stability.clone();
        for cluster in (1..count).rev() {
            let children = &self.children[cluster];
            let subtree: f64 = children.iter().map(|&c| stability[c]).sum();

            if !children.is_empty() && subtree > stability[cluster] {
                stability[cluster] = subtree;
            } else {
                selected[cluster] = true;
                let mut stack = children.clone();
                while let Some(descendant) = stack.pop() {
                    selected[descendant] = false;
                    stack.extend(self.children[descendant].iter().copied());
                }
            }
        }

        selected
    }

    /// Points split off the lone root cluster by the widest gap in exit distances.
    ///
    /// Exit distances are sorted ascending and only cuts that leave at least
    /// `min_cluster_size` points on the near side are considered. The widest
    /// gap wins, earliest first on ties, and it only cuts when the far side is
    /// `single_cluster_gap_ratio` times the near side or more.
    fn single_cluster_outliers(&self, params: &HdbscanParams) -> Vec<usize> {
        let mut exits: Vec<(f64, usize)> = self
            .point_exit
            .iter()
            .enumerate()
            .map(|(point, &(_, at))| (exit_distance(at), point))
            .collect();
        exits.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));

        let keep = params.min_cluster_size;
        if exits.len() <= keep {
            return Vec::new();
        }

        let mut cut = None;
        let mut widest = 0.0;
        for near in (keep - 1)..(exits.len() - 1) {
            let gap = exits[near + 1].0 - exits[near].0;
            if gap > widest {
                widest = gap;
                cut = Some(near + 1);
            }
        }

        match cut {
            Some(cut) if exits[cut].0 >= exits[cut - 1].0 * params.single_cluster_gap_ratio => {
                exits[cut..].iter().map(|&(_, point)| point).collect()
            }
            _ => Vec::new(),
        }
    }

    fn labels(&self, params: &HdbscanParams) -> Vec<i32> {
        let selected = self.select();
        let mut assignment: Vec<Option<usize>> = (0..self.n)
            .map(|point| {
                let mut cluster = Some(self.point_exit[point].0);
                while let Some(c) = cluster {
                    if selected[c] {
                        return Some(c);
                    }
                    cluster = self.parent[c];
                }
                None
            })
            .collect();

        if self.cluster_count() == 1 {
            for point in self.single_cluster_outliers(params) {
                assignment[point] = None;
            }
        }

        let mut members = vec![0usize; self.cluster_count()];
        for cluster in assignment.iter().flatten() {
            members[*cluster] += 1;
        }

        let mut numbering = vec![None; self.cluster_count()];
        let mut next = 0i32;
        for cluster in 0..self.cluster_count() {
            if selected[cluster] && members[cluster] >= params.min_cluster_size {
                numbering[cluster] = Some(next);
                next += 1;
            }
        }

        assignment
            .into_iter()
            .map(|slot| {
                slot.and_then(|cluster| numbering[cluster])
                    .unwrap_or(NOISE_LABEL)
            })
            .collect()
    }
}
