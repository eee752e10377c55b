mod adapter;
mod backend;
mod backends;
mod result;

pub use adapter::{DetectorAdapter, DetectorOptions, STUB_MODEL_SCHEME};
pub use backend::DetectorBackend;
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use result::{BoundingBox, Category, Detection, DetectionSet};
