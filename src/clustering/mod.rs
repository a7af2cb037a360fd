mod kmeans;

pub use kmeans::{KMeans, KMeansResult};

/// Row indices belonging to each of the `n_clusters` groups, in ascending row order.
///
/// Labels outside `[0, n_clusters)` are ignored.
pub fn cluster_members(labels: &[usize], n_clusters: usize) -> Vec<Vec<usize>> {
    let mut members = vec![Vec::new(); n_clusters];
    for (row, &label) in labels.iter().enumerate() {
        if let Some(group) = members.get_mut(label) {
            group.push(row);
        }
    }
    members
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_members() {
        let members = cluster_members(&[1, 0, 1, 2, 0], 4);

        assert_eq!(members, vec![vec![1, 4], vec![0, 2], vec![3], vec![]]);
    }
}
