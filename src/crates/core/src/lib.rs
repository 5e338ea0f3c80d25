// FreeWay Study Core Library - Platform-agnostic client logic
// Three-layer architecture: Util -> Stream/Transport -> Chat/Service

pub mod chat; // Chat layer - conversation state, turn state machine, presentation events
pub mod config; // Backend endpoint configuration
pub mod service; // Service layer - library, auth, upload REST collaborators
pub mod stream; // Stream layer - wire frame decoding
pub mod transport; // Transport layer - completion request/stream seam
pub mod util; // Utility layer - errors, helpers

// Export main types
pub use util::errors::{FreewayError, FreewayResult};

pub use chat::{
    ChatEvent, ChatSnapshot, Conversation, Message, MessageRole, TurnCancelHandle, TurnController,
};
pub use config::ApiConfig;
pub use stream::{FrameDecoder, StreamPayload};
pub use transport::{CompletionStream, CompletionTransport, HttpCompletionTransport};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CORE_NAME: &str = "FreeWay Study Core";
