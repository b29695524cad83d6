// Value model and errors
pub mod errors;
pub mod value;

// Conversion core
pub mod codec;
pub mod dispatch;
pub mod error_bridge;
pub mod handle;
pub mod store;

// Command surface and ambient setup
pub mod commands;
pub mod config;
pub mod logging;

// Re-export commonly used items
pub use codec::{Decode, Encode, ForeignKind};
pub use commands::Session;
pub use config::BridgeConfig;
pub use dispatch::Converter;
pub use errors::{CommandContext, ConvResult, ConversionError, ErrorKind, HostError};
pub use handle::ForeignHandle;
pub use logging::{init_logging, LogConfig, LogFormat, LogOutput};
pub use store::{Checkpoint, ObjectStore, StoreEntryInfo};
pub use value::{
    ArrayData, CellArray, CharArray, ComplexScalar, Dims, ElementType, FloatScalar, HostValue,
    IntScalar, NumericArray, ScalarKind, StructArray, StructValue,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
