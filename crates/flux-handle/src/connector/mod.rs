pub mod fd;
pub mod local;
pub mod loopback;
pub mod stream;
pub mod tcp;

pub use loopback::LoopConnector;
