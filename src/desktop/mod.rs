//! The scene graph
//!
//! A [`Scene`] stacks [`SurfaceView`]s in [`Layer`]s and composes their transforms along the
//! parent chain. Rendering walks it back to front, input hit-testing front to back.

mod scene;
mod view;

pub use self::scene::{Layer, Scene};
pub use self::view::{SurfaceView, ViewId};
