pub mod labels;
pub mod metrics;
pub mod timeline;

pub use metrics::*;
pub use timeline::*;
