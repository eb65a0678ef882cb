use std::collections::HashMap;

use axum::extract::Query;
use axum::http::header::HOST;
use axum::http::request::Parts;
use dog_tenancy::RequestDescriptor;

/// Build the transport-neutral view of an HTTP request.
///
/// The host comes from the `Host` header, falling back to the URI authority
/// (HTTP/2 requests carry it there). Headers that are not valid UTF-8 are
/// skipped; an unparsable query string yields no query parameters.
pub fn descriptor_from_parts(parts: &Parts) -> RequestDescriptor {
    let mut descriptor = RequestDescriptor::new().with_path(parts.uri.path());

    let host = parts
        .headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| parts.uri.authority().map(|a| a.to_string()));
    if let Some(host) = host {
        descriptor = descriptor.with_host(host);
    }

    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            descriptor = descriptor.with_header(name.as_str(), value);
        }
    }

    if let Ok(Query(query)) = Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
        descriptor = descriptor.with_queries(query);
    }

    descriptor
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn copies_host_path_headers_and_query() {
        let p = parts(
            Request::builder()
                .uri("/orders/1?_tenant=acme&page=2")
                .header("host", "acme.example.com:8080")
                .header("X-Tenant-Id", "globex")
                .body(())
                .unwrap(),
        );

        let d = descriptor_from_parts(&p);
        assert_eq!(d.hostname().as_deref(), Some("acme.example.com"));
        assert_eq!(d.path(), "/orders/1");
        assert_eq!(d.header("x-tenant-id"), Some("globex"));
        assert_eq!(d.query("_tenant"), Some("acme"));
        assert_eq!(d.query("page"), Some("2"));
    }

    #[test]
    fn falls_back_to_uri_authority() {
        let p = parts(
            Request::builder()
                .uri("https://globex.example.com/")
                .body(())
                .unwrap(),
        );
        assert_eq!(
            descriptor_from_parts(&p).hostname().as_deref(),
            Some("globex.example.com")
        );
    }
}
