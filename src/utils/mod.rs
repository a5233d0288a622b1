//! Various utilities functions and types

mod geometry;
pub mod serial;
pub mod signaling;
pub mod transform;

pub use self::geometry::{Coordinate, Point, Rectangle, Size};
pub use self::serial::{Serial, SerialCounter, SERIAL_COUNTER};

#[cfg(test)]
pub(crate) fn test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
