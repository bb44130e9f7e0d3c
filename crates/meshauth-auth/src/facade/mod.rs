//! The auth facade: one entry point per use case.

pub mod context;
pub mod request;
pub mod response;
pub mod service;

pub use context::RequestContext;
pub use service::AuthFacade;
