pub mod compositor;
pub mod encoder;
pub mod style;

pub use compositor::{overlay_logo, CompositeError};
pub use encoder::{encode, to_data_url, to_png, EncodeError, CANVAS_EDGE};
pub use style::{QrStyle, DEFAULT_BACKGROUND, DEFAULT_COLOR};
