pub mod classifier;
pub mod navigator;

pub use classifier::{RouteClass, RouteClassifier, RouteRule};
pub use navigator::{Navigator, StaticNavigator};
