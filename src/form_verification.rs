use std::fmt::Display;

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Multipart, Request},
    http::header::CONTENT_TYPE,
};
use mime::Mime;
use tracing::{debug, error};

use crate::error::{InternalCause, PlaylistInfoError, INVALID_PLAYLIST_URL, URL_REQUIRED};

/// Anything containing this passes as a playlist URL. Containment only, so a match inside a
/// query string or an unrelated host is accepted too.
pub const PLAYLIST_MARKER: &str = "youtube.com/playlist";

#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Text(String),
    File { file_name: String },
}

/// One decoded form submission, fields kept in the order they were sent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Submission {
    fields: Vec<(String, FormValue)>,
}

impl Submission {
    pub fn new(fields: Vec<(String, FormValue)>) -> Self {
        Self { fields }
    }

    pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: Vec<(K, V)>) -> Self {
        Self::new(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), FormValue::Text(v.into())))
                .collect(),
        )
    }

    /// First value sent under `name`
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, PlaylistInfoError> {
        let mut fields = Vec::new();
        while let Some(field) = multipart.next_field().await.map_err(form_error)? {
            let name = field.name().unwrap_or_default().to_string();
            let value = match field.file_name().map(str::to_string) {
                Some(file_name) => FormValue::File { file_name },
                None => FormValue::Text(field.text().await.map_err(form_error)?),
            };
            fields.push((name, value));
        }
        Ok(Self::new(fields))
    }

    fn from_urlencoded(body: &[u8]) -> Result<Self, PlaylistInfoError> {
        let pairs: Vec<(String, String)> =
            serde_html_form::from_bytes(body).map_err(form_error)?;
        Ok(Self::from_pairs(pairs))
    }
}

#[async_trait]
impl<S> FromRequest<S> for Submission
where
    S: Send + Sync,
{
    type Rejection = PlaylistInfoError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();

        match form_encoding(&content_type) {
            Some(FormEncoding::Multipart) => {
                let multipart = Multipart::from_request(req, state)
                    .await
                    .map_err(|err| form_error(err.body_text()))?;
                Self::from_multipart(multipart).await
            }
            Some(FormEncoding::UrlEncoded) => {
                let body = Bytes::from_request(req, state)
                    .await
                    .map_err(|err| form_error(err.body_text()))?;
                Self::from_urlencoded(&body)
            }
            None => Err(form_error(format!("unsupported content type {content_type:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum FormEncoding {
    UrlEncoded,
    Multipart,
}

/// Media types compare case-insensitively and ignore parameters such as `boundary`
fn form_encoding(content_type: &str) -> Option<FormEncoding> {
    let mime: Mime = content_type.parse().ok()?;
    if mime.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str() {
        Some(FormEncoding::UrlEncoded)
    } else if mime.essence_str() == mime::MULTIPART_FORM_DATA.essence_str() {
        Some(FormEncoding::Multipart)
    } else {
        None
    }
}

fn form_error(err: impl Display) -> PlaylistInfoError {
    error!("Error reading form submission: {err}");
    InternalCause::Form(err.to_string()).into()
}

/// Pulls a non-empty text `url` out of the submission
pub fn required_url(submission: &Submission) -> Result<&str, PlaylistInfoError> {
    match submission.get("url") {
        Some(FormValue::Text(url)) if !url.is_empty() => return Ok(url.as_str()),
        Some(FormValue::Text(_)) => debug!("Rejecting submission, url is empty"),
        Some(FormValue::File { file_name }) => {
            debug!("Rejecting submission, url is an uploaded file ({file_name})")
        }
        None => debug!("Rejecting submission, no url field"),
    }
    Err(PlaylistInfoError::InvalidInput(URL_REQUIRED))
}

pub fn is_playlist_url(url: &str) -> bool {
    url.contains(PLAYLIST_MARKER)
}

/// Both checks a submission has to pass before anything is sent to the backend
pub fn verify_submission(submission: &Submission) -> Result<&str, PlaylistInfoError> {
    let url = required_url(submission)?;
    if !is_playlist_url(url) {
        debug!("Rejecting {url}, not a playlist URL");
        return Err(PlaylistInfoError::InvalidInput(INVALID_PLAYLIST_URL));
    }
    Ok(url)
}
