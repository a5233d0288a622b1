#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # compositor-core: the state machines of a Wayland compositor
//!
//! This crate contains the protocol-independent core of a Wayland compositor: the scene graph of
//! surface views, the shell surface role with its liveness checking and interactive move/resize,
//! the pointer and keyboard focus and grab logic, and an executor bringing jobs from any thread
//! back onto the event loop.
//!
//! The wire protocol and the graphics stack are not part of it. Protocol objects are reached
//! through the resource traits of [`protocol`], and drawing goes through [`backend::Renderer`].
//!
//! ## Structure of the crate
//!
//! - [`compositor`] holds the [`Compositor`](compositor::Compositor) state, surfaces and roles.
//! - [`desktop`] is the scene graph: views stacked in layers, with parent/child transforms.
//! - [`input`] is the seat with its pointer and keyboard devices.
//! - [`shell`] implements the shell surface role.
//! - [`executor`] runs jobs submitted from other threads on the event loop.
//!
//! ## General principles
//!
//! ### The event loop and state handling
//!
//! Like any Wayland compositor, this one waits for events and reacts to them. The crate is built
//! around [`calloop`]: the [`Compositor`](compositor::Compositor) is the shared data of the event
//! loop, so timers (ping timeouts), idle callbacks (coalesced renders) and the job executor all get
//! mutable access to it without any synchronization.
//!
//! Everything except [`executor::JobSubmitter`] is single-threaded.
//!
//! ### Logging
//!
//! The crate logs through [`tracing`]. Stale client requests, like a pong with an old serial or a
//! move without the matching grab, are expected races and are logged at `debug` level.
//!
//! To limit the log level at compile time, enable the corresponding [`tracing`] features in the
//! binary crate:
//!
//! ```toml
//! [dependencies]
//! tracing = { version = "0.1", features = ["max_level_trace", "release_max_level_debug"] }
//! ```

pub mod backend;
pub mod compositor;
pub mod desktop;
pub mod executor;
pub mod input;
pub mod protocol;
pub mod shell;
pub mod utils;
