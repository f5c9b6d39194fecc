// src/layer.rs

//! tower middleware around [`AuthFilter`].
//!
//! ```
//! # use std::sync::Arc;
//! # use negotiate_filter::{auth::IdentityBackend, layer::AuthLayer, AuthFilter};
//! # fn wrap<S>(backend: Arc<dyn IdentityBackend>, service: S) -> negotiate_filter::Result<()> {
//! use tower::Layer;
//!
//! let filter = AuthFilter::builder().backend(backend).realm("Intranet").build()?;
//! let _service = AuthLayer::new(filter).layer(service);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use http::header::WWW_AUTHENTICATE;
use http::{HeaderValue, Request, Response};
use pin_project_lite::pin_project;
use tower::{Layer, Service};

use crate::filter::{AuthFilter, Filtered};

/// Applies an [`AuthFilter`] to the wrapped service.
#[derive(Clone, Debug)]
pub struct AuthLayer {
    filter: AuthFilter,
}

impl AuthLayer {
    pub fn new(filter: AuthFilter) -> Self {
        AuthLayer { filter }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            filter: self.filter.clone(),
        }
    }
}

/// Forwards authorized requests to `S` and answers the rest itself.
///
/// Authorized requests carry an
/// [`AuthenticatedUser`](crate::auth::AuthenticatedUser) extension. Other
/// requests never reach `S`; they get an empty-bodied `401`, `302`, or `500`.
#[derive(Clone, Debug)]
pub struct AuthService<S> {
    inner: S,
    filter: AuthFilter,
}

impl<S> AuthService<S> {
    pub fn filter(&self) -> &AuthFilter {
        &self.filter
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, B, R> Service<Request<B>> for AuthService<S>
where
    S: Service<Request<B>, Response = Response<R>>,
    R: Default,
{
    type Response = Response<R>;
    type Error = S::Error;
    type Future = ResponseFuture<S::Future, R>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        match self.filter.filter(request) {
            Filtered::Proceed { request, mutual } => ResponseFuture::Inner {
                future: self.inner.call(request),
                mutual,
            },
            Filtered::Respond(head) => ResponseFuture::Ready {
                response: Some(head.into_response()),
            },
        }
    }
}

pin_project! {
    /// Response future of [`AuthService`].
    #[project = ResponseFutureProj]
    pub enum ResponseFuture<F, R> {
        Inner {
            #[pin]
            future: F,
            mutual: Option<HeaderValue>,
        },
        Ready {
            response: Option<Response<R>>,
        },
    }
}

impl<F, R> fmt::Debug for ResponseFuture<F, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseFuture::Inner { mutual, .. } => f
                .debug_struct("ResponseFuture::Inner")
                .field("mutual", &mutual.is_some())
                .finish(),
            ResponseFuture::Ready { .. } => f.write_str("ResponseFuture::Ready"),
        }
    }
}

impl<F, R, E> Future for ResponseFuture<F, R>
where
    F: Future<Output = Result<Response<R>, E>>,
{
    type Output = Result<Response<R>, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            ResponseFutureProj::Inner { future, mutual } => {
                let mut response = ready!(future.poll(cx))?;
                if let Some(token) = mutual.take() {
                    response.headers_mut().append(WWW_AUTHENTICATE, token);
                }
                Poll::Ready(Ok(response))
            }
            ResponseFutureProj::Ready { response } => {
                Poll::Ready(Ok(response.take().expect("ResponseFuture polled after completion")))
            }
        }
    }
}
