use crate::apps::{CallRequest, CallResponse, CallType};
use crate::bindings::BindingTree;
use crate::error::AppError;

/// Resolve `path` (prefix already removed) in the tree and run its handler.
/// `None` when no binding owns the path.
pub(crate) async fn invoke(tree: &BindingTree, path: &str, body: &[u8]) -> Option<CallResponse> {
    let handler = tree.find_handler(path)?;
    let call_type = CallType::from_path(path);

    let request: CallRequest = match serde_json::from_slice(body) {
        Ok(request) => request,
        Err(e) => {
            let err = AppError::Decode(e.to_string());
            tracing::error!(path, error = %err, "rejecting call");
            return Some(CallResponse::error(err));
        }
    };

    tracing::debug!(path, %call_type, user = %request.context.acting_user_id, "dispatching call");
    let response = handler.handle(request, call_type).await;
    if response.is_error() {
        tracing::debug!(path, %call_type, "call returned an error response");
    }
    Some(response)
}
