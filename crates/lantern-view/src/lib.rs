//! Embedded view runtime for Lantern.
//!
//! Ties the protocol session and the renderer to a [`Surface`]: ingests the
//! initial payload, renders trees pushed by the host, reports the content
//! size and turns drag-move and inline-edit gestures into optimistic tool
//! calls.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod frame;
pub mod mutation;
pub mod surface;
pub mod view;

pub use bootstrap::{Incoming, PayloadShape, ingest};
pub use config::{LanternConfig, ProtocolConfig, ViewConfig};
pub use error::ViewError;
pub use frame::{FrameTransport, InputFrame, OutputFrame, forward_ops, read_loop, write_loop};
pub use mutation::{DragOperation, EditSession, Interaction};
pub use surface::{Content, Editor, HeadlessSurface, Size, Status, StatusLevel, Surface, SurfaceOp};
pub use view::{Bootstrap, FRAME_DELAY, View};
