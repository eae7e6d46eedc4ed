// Submodules for separation of concerns
mod cursor;
mod eval;
mod types;

pub use cursor::ContinuationCursor;
pub use eval::{compare_json, eval_filter};
pub use types::{CmpOp, FeedResponse, Filter, Page, Projection, QueryRequest};
