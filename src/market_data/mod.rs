pub mod bar_series;
pub mod replay;
pub mod source;
pub mod yahoo;

pub use bar_series::{Bar, BarSeries};
pub use replay::ReplaySource;
pub use source::BarSource;
pub use yahoo::YahooSource;
