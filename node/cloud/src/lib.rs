//! A concrete `CloudAdapter` implementation speaking JSON-over-HTTPS to a
//! droplet-shaped IaaS provider (§4.3, §6). `fleet-agent`'s core only
//! depends on the `CloudAdapter` trait; this crate is the one collaborator
//! that makes the workspace runnable as a real binary against a real API.

mod http;
mod wire;

pub use http::{HttpCloudAdapter, DEFAULT_BASE_URL};
