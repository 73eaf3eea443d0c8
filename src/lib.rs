//! Bridge library for RNet multi-zone audio distribution controllers.
//!
//! Talks the framed, checksummed, escape-coded RNet serial protocol to a
//! whole-home audio controller (directly or through a serial-over-IP
//! adapter), and turns it into a typed async API: zones with power, volume,
//! source and auxiliary parameters, sources with media metadata and display
//! text, plus a change-event stream for the embedding application.
//!
//! ```ignore
//! use rnet_bridge::{transport, Bridge, ChangeEvent, JsonFileStore};
//!
//! let link = transport::connect_tcp("192.168.1.50:4001").await?;
//! let store = Box::new(JsonFileStore::new("zones.json"));
//! let (bridge, handle, mut events) = Bridge::new(link, store);
//! tokio::spawn(bridge.run());
//!
//! handle.create_zone(0, 0, "Living Room").await?;
//! handle.set_power(0, 0, true).await?;
//!
//! while let Some(event) = events.recv().await {
//!     if let ChangeEvent::Volume { volume, .. } = event {
//!         println!("volume now {volume}");
//!     }
//! }
//! ```

pub mod bridge;
pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod frame;
pub mod packet;
pub mod param;
pub mod queue;
pub mod source;
pub mod transport;
pub mod zone;

pub use bridge::{Bridge, BridgeHandle, AUTO_UPDATE_INTERVAL, REQUERY_DELAY, SEND_INTERVAL};
pub use config::{JsonFileStore, MemoryStore, ZoneConfig, ZoneEntry, ZoneStore};
pub use controller::{ConnectionState, Controller, SourceSnapshot, ZoneSnapshot};
pub use error::Error;
pub use event::{ChangeEvent, Origin};
pub use frame::{Frame, FrameReassembler};
pub use packet::{cmd, KeypadKey, Packet, TextAlign};
pub use param::{ExtraParam, ParamValue};
pub use source::{ControlOp, SourceType};
pub use transport::{TransportEvent, TransportLink};

pub type Result<T> = std::result::Result<T, Error>;
