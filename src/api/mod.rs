//! API Module
//!
//! Request, response, streaming event and catalog types.

pub mod catalog;
pub mod completion;
pub mod request;
pub mod streaming;

pub use catalog::{ModelDescriptor, ModelList, PromptTemplate};
pub use completion::{Choice, CompletionResponse, ResponseMessage, Usage};
pub use request::{ChatMessage, CompletionRequest, RequestPayload, Role};
pub use streaming::{
    parse_event, ApiErrorBody, DeltaEvent, StreamAccumulator, StreamChoice, StreamDelta,
    StreamSummary,
};
