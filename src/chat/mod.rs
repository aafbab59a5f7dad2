//! Response streamer: conversation normalization, prompt assembly and the request pipeline.

pub mod messages;
pub mod pipeline;
pub mod prompt;

pub use messages::{ChatMessage, ChatRequest, Content, MessagePart};
pub use pipeline::{
    ChatError, ChatPipeline, ChatResponse, PipelineSettings, PreparedChat, RequestStage,
    StartupError,
};
