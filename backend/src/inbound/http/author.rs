//! Caller identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the verified author
//! id in the `X-Author-Id` header. Handlers take [`AuthorContext`] as an
//! argument and never read headers themselves.

use actix_web::{FromRequest, HttpRequest, dev::Payload};
use futures_util::future::{Ready, ready};
use tracing::debug;

use crate::domain::{AuthorId, Error};

/// Header carrying the authenticated author id.
pub const AUTHOR_ID_HEADER: &str = "X-Author-Id";

/// Authenticated author for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorContext(AuthorId);

impl AuthorContext {
    /// Identifier of the calling author.
    pub fn author_id(&self) -> &AuthorId {
        &self.0
    }

    fn from_headers(req: &HttpRequest) -> Result<Self, Error> {
        let raw = req
            .headers()
            .get(AUTHOR_ID_HEADER)
            .ok_or_else(|| Error::unauthorized("author id required"))?;
        let raw = raw
            .to_str()
            .map_err(|_| Error::unauthorized("author id must be visible ASCII"))?;
        AuthorId::new(raw).map(Self).map_err(|error| {
            debug!(error = %error, "rejecting malformed author id");
            Error::unauthorized("author id required")
        })
    }
}

impl FromRequest for AuthorContext {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_headers(req))
    }
}

#[cfg(test)]
mod tests {
    use actix_web::http::StatusCode;
    use actix_web::{App, HttpResponse, test as actix_test, web};
    use rstest::rstest;

    use super::*;

    async fn echo(author: AuthorContext) -> HttpResponse {
        HttpResponse::Ok().body(author.author_id().as_str().to_owned())
    }

    #[rstest]
    #[case(Some("uid-7"), StatusCode::OK)]
    #[case(None, StatusCode::UNAUTHORIZED)]
    #[case(Some("   "), StatusCode::UNAUTHORIZED)]
    #[case(Some(" uid "), StatusCode::UNAUTHORIZED)]
    #[actix_web::test]
    async fn extracts_author_from_header(
        #[case] header: Option<&str>,
        #[case] expected: StatusCode,
    ) {
        let app =
            actix_test::init_service(App::new().route("/whoami", web::get().to(echo))).await;
        let mut request = actix_test::TestRequest::get().uri("/whoami");
        if let Some(value) = header {
            request = request.insert_header((AUTHOR_ID_HEADER, value));
        }

        let response = actix_test::call_service(&app, request.to_request()).await;

        assert_eq!(response.status(), expected);
        if expected == StatusCode::OK {
            let body = actix_test::read_body(response).await;
            assert_eq!(&body[..], b"uid-7");
        }
    }
}
