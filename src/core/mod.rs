pub mod etl;

pub use crate::domain::model::{City, EnrichedListing, Listing};
pub use crate::domain::ports::{PageFetcher, Pipeline, Storage};
pub use crate::utils::error::Result;
