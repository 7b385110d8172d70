//! HTTP client for the timer API.
//!
//! Provides both async and blocking client variants behind feature flags.
//! The admin CLI uses the blocking client; the storefront render loop
//! fetches through the async one via [`crate::countdown::TimerSource`].

use url::Url;

use crate::error::{Result, TimerError};
use crate::models::ApiErrorBody;

/// Path segments of the timer collection below the base URL.
const TIMERS_PATH: [&str; 2] = ["api", "timers"];

/// Parses and checks a client base URL.
fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw)?;
    if url.cannot_be_a_base() {
        return Err(TimerError::Config(format!(
            "API base URL cannot carry a path: {raw}"
        )));
    }
    Ok(url)
}

/// Builds `<base>/api/timers[/<segment>...]`, percent-encoding each segment.
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut url = base.clone();
    {
        let mut path = url.path_segments_mut().map_err(|()| {
            TimerError::Config(format!("API base URL cannot carry a path: {base}"))
        })?;
        let _path = path
            .pop_if_empty()
            .extend(TIMERS_PATH)
            .extend(segments);
    }
    Ok(url)
}

/// Turns a non-success response into [`TimerError::Api`], preferring the
/// `{"error": ...}` message when the body carries one.
fn api_error(status: u16, body: &str) -> TimerError {
    let message = serde_json::from_str::<ApiErrorBody>(body).map_or_else(
        |_| {
            if body.trim().is_empty() {
                "unknown error".to_owned()
            } else {
                body.to_owned()
            }
        },
        |parsed| parsed.error,
    );
    tracing::debug!(status, message = %message, "API error");
    TimerError::Api { status, message }
}

/// Generates a timer API client (async or blocking) with builder, methods, and tests.
macro_rules! define_client {
    (
        client_name: $client:ident,
        builder_name: $builder:ident,
        http_type: $http_type:ty,
        request_type: $req_type:ty,
        response_type: $resp_type:ty,
        client_doc: $client_doc:expr,
        builder_doc: $builder_doc:expr,
        $(async_kw: $async_kw:tt,)?
        $(await_kw: $await_ext:tt,)?
    ) => {
        #[doc = $builder_doc]
        #[derive(Debug)]
        pub struct $builder {
            /// Base URL of the timer API.
            base_url: Option<String>,
        }

        impl $builder {
            /// Sets the base URL of the timer API (e.g. `http://localhost:5000`).
            #[inline]
            #[must_use]
            pub fn base_url<T: Into<String>>(mut self, url: T) -> Self {
                self.base_url = Some(url.into());
                self
            }

            /// Builds the client.
            ///
            /// # Errors
            ///
            /// Returns [`TimerError::MissingBaseUrl`] if no base URL was provided,
            /// [`TimerError::InvalidUrl`] or [`TimerError::Config`] if it is not a
            /// usable base, and [`TimerError::Http`] if the HTTP client fails to
            /// build.
            #[inline]
            #[tracing::instrument(skip_all)]
            pub fn build(self) -> Result<$client> {
                let raw = self.base_url.ok_or(TimerError::MissingBaseUrl)?;
                let base_url = parse_base_url(&raw)?;
                tracing::debug!(base_url = %base_url, "building client");
                let http = <$http_type>::builder().build()?;

                Ok($client { http, base_url })
            }
        }

        #[doc = $client_doc]
        #[derive(Debug)]
        pub struct $client {
            /// Underlying HTTP client.
            http: $http_type,
            /// API base URL.
            base_url: Url,
        }

        impl $client {
            /// Creates a new builder for configuring the client.
            #[inline]
            #[must_use]
            pub const fn builder() -> $builder {
                $builder { base_url: None }
            }

            /// Creates a timer via `POST /api/timers`.
            ///
            /// # Errors
            ///
            /// Returns [`TimerError::Api`] with status 400 if the server rejects
            /// the request, or an error if the HTTP request fails or the
            /// response cannot be deserialized.
            #[inline]
            #[tracing::instrument(skip_all, fields(store = %request.store_domain))]
            pub $($async_kw)? fn create_timer(&self, request: &NewTimer) -> Result<Timer> {
                let url = endpoint(&self.base_url, &[])?;
                tracing::debug!(url = %url, "creating timer");
                self.execute(self.http.post(url).json(request)) $( .$await_ext )?
            }

            /// Lists a storefront's timers via `GET /api/timers/:storeDomain`.
            ///
            /// # Errors
            ///
            /// Returns an error if the HTTP request fails, the server returns a
            /// non-success status, or the response cannot be deserialized.
            #[inline]
            #[tracing::instrument(skip_all, fields(store = %store))]
            pub $($async_kw)? fn list_timers(&self, store: &StoreDomain) -> Result<Vec<Timer>> {
                let url = endpoint(&self.base_url, &[store.as_inner()])?;
                tracing::debug!(url = %url, "listing timers");
                self.execute(self.http.get(url)) $( .$await_ext )?
            }

            /// Deletes a timer via `DELETE /api/timers/:id`.
            ///
            /// # Errors
            ///
            /// Returns [`TimerError::NotFound`] if the server has no such timer,
            /// or an error if the HTTP request fails, the server returns another
            /// non-success status, or the response cannot be deserialized.
            #[inline]
            #[tracing::instrument(skip_all, fields(id = %id))]
            pub $($async_kw)? fn delete_timer(&self, id: &TimerId) -> Result<DeleteResponse> {
                let url = endpoint(&self.base_url, &[id.as_inner()])?;
                tracing::debug!(url = %url, "deleting timer");
                match self.execute(self.http.delete(url)) $( .$await_ext )? {
                    Err(TimerError::Api { status: 404, .. }) => Err(TimerError::NotFound(id.clone())),
                    other => other,
                }
            }

            /// Sends a prepared request and deserializes a success body.
            $($async_kw)? fn execute<Resp: serde::de::DeserializeOwned>(
                &self,
                request: $req_type,
            ) -> Result<Resp> {
                let response: $resp_type = request.send() $( .$await_ext )? ?;
                let status = response.status();
                tracing::debug!(status = %status, "received response");
                let body = response.text() $( .$await_ext )? ?;
                if status.is_success() {
                    tracing::trace!(body_len = body.len(), "parsing response body");
                    serde_json::from_str(&body).map_err(TimerError::from)
                } else {
                    Err(api_error(status.as_u16(), &body))
                }
            }
        }

    };
}

#[cfg(feature = "async")]
mod async_client {
    //! Async HTTP client for the timer API.

    use core::future::Future;

    use url::Url;

    use super::{api_error, endpoint, parse_base_url};
    use crate::countdown::TimerSource;
    use crate::error::{Result, TimerError};
    use crate::models::{DeleteResponse, NewTimer, StoreDomain, Timer, TimerId};

    define_client! {
        client_name: TimerClient,
        builder_name: TimerClientBuilder,
        http_type: reqwest::Client,
        request_type: reqwest::RequestBuilder,
        response_type: reqwest::Response,
        client_doc: "Async client for the timer API.\n\nUse [`TimerClient::builder()`] to construct an instance.",
        builder_doc: "Builder for constructing a [`TimerClient`].",
        async_kw: async,
        await_kw: await,
    }

    impl TimerSource for TimerClient {
        #[inline]
        fn fetch_timers(
            &self,
            store: &StoreDomain,
        ) -> impl Future<Output = Result<Vec<Timer>>> + Send {
            self.list_timers(store)
        }
    }
}

#[cfg(feature = "blocking")]
mod blocking_client {
    //! Blocking (synchronous) HTTP client for the timer API.

    use url::Url;

    use super::{api_error, endpoint, parse_base_url};
    use crate::error::{Result, TimerError};
    use crate::models::{DeleteResponse, NewTimer, StoreDomain, Timer, TimerId};

    define_client! {
        client_name: TimerBlockingClient,
        builder_name: TimerBlockingClientBuilder,
        http_type: reqwest::blocking::Client,
        request_type: reqwest::blocking::RequestBuilder,
        response_type: reqwest::blocking::Response,
        client_doc: "Blocking (synchronous) client for the timer API.\n\nUse [`TimerBlockingClient::builder()`] to construct an instance.",
        builder_doc: "Builder for constructing a [`TimerBlockingClient`].",
    }
}

#[cfg(feature = "async")]
pub use async_client::{TimerClient, TimerClientBuilder};
#[cfg(feature = "blocking")]
pub use blocking_client::{TimerBlockingClient, TimerBlockingClientBuilder};
