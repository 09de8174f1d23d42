//! Abstract contracts for the external VR runtime.
//!
//! The tracking core never talks to a real headset directly; it consumes
//! three narrow traits — [`TrackingSystem`], [`ModelLoader`], [`Compositor`]
//! — plus the [`poll::block_on_load`] adapter that turns the runtime's
//! poll-until-ready load calls into a blocking result.
//!
//! [`stub`] ships a scripted in-memory runtime so the whole pipeline runs
//! headless in tests and the demo app.

pub mod poll;
pub mod stub;
pub mod traits;
pub mod types;

pub use poll::{LoadError, LoadFailure, LoadPolicy, LoadPoll, block_on_load};
pub use traits::{Compositor, ModelLoader, TrackingSystem};
pub use types::{
    ControllerState, DeviceEvent, DeviceProperty, DevicePose, ModelData, ModelVertex,
    PropertyError, TextureData, TextureId,
};
