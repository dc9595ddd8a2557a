pub mod background;
pub mod history;
pub mod raster;
pub mod renderer;

pub use background::{BackgroundSource, fit_background};
pub use history::History;
pub use raster::{Brush, LayeredCanvas, WHITE};
pub use renderer::{RenderOutcome, SourceId, StrokeRenderer, secondary_color};
