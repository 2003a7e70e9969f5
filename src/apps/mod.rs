//! Wire types exchanged with the chat host's apps framework: bindings,
//! forms, call requests and call responses.

mod binding;
mod call;
mod manifest;

pub use binding::{Binding, Call, Field, FieldType, Form, SelectOption};
pub use call::{CallContext, CallRequest, CallResponse, CallType, FieldValue};
pub use manifest::{AppType, Manifest, Permission, LOCATION_COMMAND};
