// PDF rendering: headless Chromium behind a bounded pool, PDFs kept in object
// storage with one object per session.

pub mod chromium;
pub mod handlers;
pub mod objects;
pub mod pipeline;
pub mod pool;

pub use chromium::ChromiumRenderer;
pub use objects::{ObjectStore, S3ObjectStore};
pub use pool::RenderPool;
