pub mod clustering;
pub mod dimred;
pub mod error;
pub mod model;
pub mod svd;
mod utils;

pub use error::{CsvdError, Result};
pub use model::{build, build_dyn, build_from_rows, ClusteredSvd, ClusteredSvdBuilder, RankDeficiency};
pub use svd::SvdMethod;
pub use utils::{as_matrix, rows_to_array};
