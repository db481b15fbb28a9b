//! Port Interfaces
//!
//! Defines the interfaces (ports) the ingestion pipeline depends on,
//! following the Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TickStreamPort`: Source of normalized ticks (live feed or mock)
//! - `TickSinkPort`: Durable tick storage

mod tick_sink_port;
mod tick_stream_port;

pub use tick_sink_port::{SinkError, TickSinkPort};
pub use tick_stream_port::{
    ConnectionState, ERROR_QUEUE_CAPACITY, StreamError, TickStream, TickStreamPort,
    TickStreamSender, tick_channel,
};
