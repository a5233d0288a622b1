use std::fmt;

use crate::{
    desktop::{Scene, ViewId},
    utils::Serial,
};

use super::MotionEvent;

/// The view currently receiving pointer input, announced whenever it changes
///
/// `view` is `None` once the grab has been released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerGrab {
    /// The grabbed view, if any
    pub view: Option<ViewId>,
}

/// A motion callback bound to a grab serial
///
/// Installed through [`PointerDevice::grab_motion`](super::PointerDevice::grab_motion), it replaces
/// regular motion handling while the grab identified by `serial` lasts.
pub struct GrabMotion {
    pub(super) serial: Serial,
    pub(super) callback: Box<dyn FnMut(&mut Scene, &MotionEvent)>,
}

// the callback is a closure, so we have to impl Debug manually
impl fmt::Debug for GrabMotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrabMotion").field("serial", &self.serial).finish()
    }
}

impl GrabMotion {
    /// Serial of the grab this callback belongs to
    pub fn serial(&self) -> Serial {
        self.serial
    }
}
