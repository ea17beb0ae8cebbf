//! Mocks and scripted stubs for the engine's boundary traits.

mod gateway;

pub use gateway::{GatewayGate, MockRemoteGateway, StubGateway};
