pub(crate) mod centroids;
