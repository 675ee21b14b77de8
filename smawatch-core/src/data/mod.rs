//! Data sources, weekly series alignment and caching

pub mod cache;
pub mod provider;
pub mod series;
pub mod universe;
pub mod wikipedia;
pub mod yahoo;

pub use provider::{ConstituentSource, DataError, FetchProgress, PriceSource, StdoutProgress};
pub use series::{PriceSeries, WeeklyClose};
pub use universe::{Constituent, ConstituentList};
pub use wikipedia::WikipediaConstituents;
pub use yahoo::YahooProvider;
