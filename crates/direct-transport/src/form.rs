//! Form body decoding for the router endpoint.
//!
//! The router body has already been buffered, so each decoder reassembles
//! the request from its original parts (keeping the body limit extension)
//! and lets axum's extractors parse it.

use axum::{
    body::Body,
    extract::{Form, FromRequest, Multipart, Request},
    http::{header::CONTENT_TYPE, request::Parts},
};
use bytes::Bytes;
use direct_protocol::{FormFields, UploadedFile};
use tracing::debug;

const URLENCODED: &str = "application/x-www-form-urlencoded";
const MULTIPART: &str = "multipart/form-data";

/// Decode `body` as form fields if the request's content type names a form
/// encoding.
///
/// Returns `None` for other content types and for bodies the matching
/// decoder rejects.
pub async fn decode_form(parts: Parts, body: Bytes) -> Option<FormFields> {
    let mime = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match mime.as_str() {
        URLENCODED => decode_urlencoded(Request::from_parts(parts, Body::from(body))).await,
        MULTIPART => decode_multipart(Request::from_parts(parts, Body::from(body))).await,
        _ => None,
    }
}

async fn decode_urlencoded(request: Request) -> Option<FormFields> {
    match Form::<Vec<(String, String)>>::from_request(request, &()).await {
        Ok(Form(pairs)) => Some(FormFields::from_pairs(pairs)),
        Err(e) => {
            debug!("Urlencoded body rejected: {e}");
            None
        }
    }
}

async fn decode_multipart(request: Request) -> Option<FormFields> {
    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(m) => m,
        Err(e) => {
            debug!("Multipart body rejected: {e}");
            return None;
        }
    };

    let mut fields = FormFields::new();
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                debug!("Multipart field error: {e}");
                return None;
            }
        };

        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let file_name = field.file_name().map(str::to_owned);
        let part_type = field.content_type().map(str::to_owned);
        let data = match field.bytes().await {
            Ok(data) => data,
            Err(e) => {
                debug!("Multipart field {name} unreadable: {e}");
                return None;
            }
        };

        match file_name {
            Some(file_name) => fields.insert_file(
                name,
                UploadedFile {
                    file_name,
                    content_type: part_type,
                    data,
                },
            ),
            None => fields.insert_text(name, String::from_utf8_lossy(&data).into_owned()),
        }
    }

    Some(fields)
}
