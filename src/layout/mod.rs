mod clusterer;

pub use clusterer::LayoutClusterer;
