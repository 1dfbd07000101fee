//! Device Simulation Library
//!
//! This crate provides simulated byte-stream devices for testing the send
//! and receive engine without a physical port attached:
//!
//! - **LoopbackTransport**: a device whose reads return promptly with zero
//!   bytes when idle, optionally echoing every write back to the reader
//! - **LoopbackProbe**: a handle for inspecting and steering that device
//!   (recorded writes, read counts, injected data, forced errors)
//!
//! # Example
//!
//! ```rust
//! use rig_sim::LoopbackTransport;
//! use tokio::io::{AsyncReadExt, AsyncWriteExt};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (mut device, probe) = LoopbackTransport::echo();
//! device.write_all(b"ping").await.unwrap();
//!
//! let mut buf = [0u8; 16];
//! let n = device.read(&mut buf).await.unwrap();
//! assert_eq!(&buf[..n], b"ping");
//! assert_eq!(probe.writes(), vec![b"ping".to_vec()]);
//! # }
//! ```

pub mod loopback;

pub use loopback::{LoopbackProbe, LoopbackTransport};
