#[cfg(test)]
pub mod mock {
    use crate::api::client::{ApiRequest, ApiResponse, Transport};
    use crate::api::ApiError;
    use async_trait::async_trait;
    use bytes::Bytes;
    use reqwest::{Method, StatusCode};
    use serde_json::Value;
    use std::{cell::RefCell, rc::Rc};

    pub const GET: Method = Method::GET;
    pub const POST: Method = Method::POST;
    pub const PATCH: Method = Method::PATCH;

    /// Scripted transport: answers by method and path, records every request,
    /// and can hold a response back for a number of scheduler turns to open a
    /// window for concurrent callers.
    #[derive(Clone, Default)]
    pub struct FakeTransport {
        inner: Rc<RefCell<Inner>>,
    }

    #[derive(Default)]
    struct Inner {
        routes: Vec<Route>,
        requests: Vec<ApiRequest>,
    }

    #[derive(Clone)]
    struct Route {
        method: Method,
        path: String,
        reply: Result<(u16, Bytes), ApiError>,
        pending_turns: usize,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn shared(&self) -> Rc<dyn Transport> {
            Rc::new(self.clone())
        }

        pub fn respond_json(&self, method: Method, path: &str, status: u16, body: Value) {
            self.push(method, path, Ok((status, Bytes::from(body.to_string()))), 0);
        }

        pub fn respond_raw(&self, method: Method, path: &str, status: u16, body: &'static [u8]) {
            self.push(method, path, Ok((status, Bytes::from_static(body))), 0);
        }

        pub fn respond_slowly(
            &self,
            method: Method,
            path: &str,
            status: u16,
            body: Value,
            turns: usize,
        ) {
            self.push(method, path, Ok((status, Bytes::from(body.to_string()))), turns);
        }

        pub fn fail(&self, method: Method, path: &str) {
            self.push(
                method,
                path,
                Err(ApiError::request_failed("Request failed: connection refused")),
                0,
            );
        }

        fn push(
            &self,
            method: Method,
            path: &str,
            reply: Result<(u16, Bytes), ApiError>,
            pending_turns: usize,
        ) {
            self.inner.borrow_mut().routes.push(Route {
                method,
                path: path.to_string(),
                reply,
                pending_turns,
            });
        }

        pub fn requests(&self) -> Vec<ApiRequest> {
            self.inner.borrow().requests.clone()
        }

        pub fn count(&self, method: &Method, path: &str) -> usize {
            self.inner
                .borrow()
                .requests
                .iter()
                .filter(|r| r.method == *method && r.path == path)
                .count()
        }

        pub fn last(&self, method: &Method, path: &str) -> Option<ApiRequest> {
            self.inner
                .borrow()
                .requests
                .iter()
                .rev()
                .find(|r| r.method == *method && r.path == path)
                .cloned()
        }
    }

    #[async_trait(?Send)]
    impl Transport for FakeTransport {
        async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
            let route = {
                let mut inner = self.inner.borrow_mut();
                inner.requests.push(request.clone());
                inner
                    .routes
                    .iter()
                    .rev()
                    .find(|r| r.method == request.method && r.path == request.path)
                    .cloned()
            };
            let route = route.ok_or_else(|| {
                ApiError::unknown(format!("No mock for {} {}", request.method, request.path))
            })?;

            for _ in 0..route.pending_turns {
                tokio::task::yield_now().await;
            }

            let (status, body) = route.reply?;
            let status = StatusCode::from_u16(status)
                .map_err(|_| ApiError::unknown("mock status out of range"))?;
            Ok(ApiResponse::new(status, body))
        }
    }
}
