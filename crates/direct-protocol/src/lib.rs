//! Ext.Direct protocol types.
//!
//! Wire shapes for the remoting protocol: batch envelopes and form calls
//! coming in, result/exception/upload records going out, the API descriptor
//! that advertises registered methods, and the failure taxonomy shared by
//! the dispatcher and the transport.

pub mod api;
pub mod context;
pub mod envelope;
pub mod error;
pub mod response;

pub use api::{ApiDescriptor, Manifest, MethodDescriptor};
pub use context::RequestContext;
pub use envelope::{DirectRequest, FormFields, FormRequest, UploadedFile};
pub use error::{DispatchError, MethodError, MethodResult};
pub use response::{
    BatchReply, DirectResponse, ExceptionRecord, FormReply, ResultRecord, UploadRecord,
};
