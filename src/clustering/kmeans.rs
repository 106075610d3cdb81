//! Seeded Lloyd's k-means over the flattened spectrogram matrix.

use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::Rng;

/// Run k-means for one `k` and return the within-cluster sum of Euclidean
/// distances between each row and its assigned centroid.
pub(crate) fn kmeans_wcss(
    data: &Array2<f64>,
    k: usize,
    iterations: usize,
    rng: &mut StdRng,
) -> f64 {
    let centroids = initialize_centroids(data, k, rng);
    let (centroids, assignments) = lloyd(data, centroids, iterations);
    total_wcss(data, &centroids, &assignments)
}

/// Initial centroids are sampled from the data rows with replacement.
fn initialize_centroids(data: &Array2<f64>, k: usize, rng: &mut StdRng) -> Array2<f64> {
    let rows = data.nrows();
    let mut centroids = Array2::zeros((k, data.ncols()));
    for i in 0..k {
        let pick = rng.random_range(0..rows);
        centroids.row_mut(i).assign(&data.row(pick));
    }
    centroids
}

/// A fixed number of assign/update passes. The returned assignments are the
/// ones that fed the final update pass.
pub(crate) fn lloyd(
    data: &Array2<f64>,
    mut centroids: Array2<f64>,
    iterations: usize,
) -> (Array2<f64>, Vec<usize>) {
    let k = centroids.nrows();
    let mut assignments = vec![0usize; data.nrows()];

    for _ in 0..iterations {
        for (j, row) in data.rows().into_iter().enumerate() {
            assignments[j] = closest_centroid(row, &centroids);
        }
        centroids = update_centroids(data, &assignments, k, &centroids);
    }

    (centroids, assignments)
}

/// Index of the nearest centroid by squared Euclidean distance; ties go to
/// the lower index.
fn closest_centroid(point: ArrayView1<f64>, centroids: &Array2<f64>) -> usize {
    let mut closest = 0;
    let mut min_dist = squared_distance(point, centroids.row(0));
    for (i, centroid) in centroids.rows().into_iter().enumerate().skip(1) {
        let d = squared_distance(point, centroid);
        if d < min_dist {
            closest = i;
            min_dist = d;
        }
    }
    closest
}

/// Each centroid becomes the coordinate-wise mean of its assigned rows.
/// An empty cluster keeps its previous centroid.
fn update_centroids(
    data: &Array2<f64>,
    assignments: &[usize],
    k: usize,
    previous: &Array2<f64>,
) -> Array2<f64> {
    let mut sums = Array2::zeros((k, data.ncols()));
    let mut counts = vec![0usize; k];

    for (row, &cluster) in data.rows().into_iter().zip(assignments) {
        let mut sum = sums.row_mut(cluster);
        sum += &row;
        counts[cluster] += 1;
    }

    for (i, &count) in counts.iter().enumerate() {
        let mut centroid = sums.row_mut(i);
        if count > 0 {
            centroid /= count as f64;
        } else {
            centroid.assign(&previous.row(i));
        }
    }

    sums
}

fn total_wcss(data: &Array2<f64>, centroids: &Array2<f64>, assignments: &[usize]) -> f64 {
    data.rows()
        .into_iter()
        .zip(assignments)
        .map(|(row, &cluster)| squared_distance(row, centroids.row(cluster)).sqrt())
        .sum()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}
