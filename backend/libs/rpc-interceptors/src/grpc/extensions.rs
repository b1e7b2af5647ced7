//! Request extension trait for reading the call context in tonic handlers

use request_context::{CallContext, Identity};
use tonic::{Request, Status};

/// Access to the `CallContext` stored by `AuthLayer`
///
/// ```rust,ignore
/// use rpc_interceptors::grpc::CallContextExt;
///
/// async fn get_quote(&self, request: Request<GetQuoteRequest>) -> Result<Response<Quote>, Status> {
///     let caller = request.identity()?.principal().clone();
///     // ...
/// }
/// ```
pub trait CallContextExt {
    /// Fails with `Internal` when the server was built without `AuthLayer`
    fn call_context(&self) -> Result<&CallContext, Status>;

    /// Fails with `Unauthenticated` on public procedures
    fn identity(&self) -> Result<&Identity, Status>;
}

impl<T> CallContextExt for Request<T> {
    fn call_context(&self) -> Result<&CallContext, Status> {
        self.extensions().get::<CallContext>().ok_or_else(|| {
            tracing::error!("Call context missing; is AuthLayer installed?");
            Status::internal(error_types::GENERIC_INTERNAL_MESSAGE)
        })
    }

    fn identity(&self) -> Result<&Identity, Status> {
        self.call_context()?
            .identity()
            .ok_or_else(|| Status::unauthenticated("caller identity required"))
    }
}
