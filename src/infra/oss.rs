//! Aliyun OSS client covering the four calls the persistence gateway needs.
//!
//! Requests are signed with the OSS header signature (HMAC-SHA1 over the
//! canonical string); read URLs use the query-string variant of the same
//! signature with an `Expires` deadline.

use std::time::Duration;

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use sha1::Sha1;
use time::{OffsetDateTime, macros::format_description};
use url::Url;

use crate::application::storage::{ObjectStore, ObjectStoreError, PutOptions};

type HmacSha1 = Hmac<Sha1>;

const META_HEADER_PREFIX: &str = "x-oss-meta-";

#[derive(Debug, Clone)]
pub struct OssCredentials {
    pub access_key_id: String,
    pub access_key_secret: String,
}

#[derive(Debug, Clone)]
pub struct OssClientConfig {
    /// Host without scheme, e.g. `oss-cn-hangzhou.aliyuncs.com`.
    pub endpoint: String,
    pub bucket: String,
    pub credentials: OssCredentials,
    pub secure: bool,
}

impl OssClientConfig {
    pub fn endpoint_for_region(region: &str) -> String {
        format!("{region}.aliyuncs.com")
    }
}

#[derive(Debug, Clone)]
pub struct OssClient {
    http: Client,
    config: OssClientConfig,
    base: Url,
}

impl OssClient {
    pub fn new(config: OssClientConfig) -> Result<Self, ObjectStoreError> {
        if config.bucket.trim().is_empty() {
            return Err(ObjectStoreError::Configuration("bucket must not be empty".into()));
        }
        let scheme = if config.secure { "https" } else { "http" };
        let base = Url::parse(&format!("{scheme}://{}.{}/", config.bucket, config.endpoint))
            .map_err(|err| ObjectStoreError::Configuration(format!("invalid endpoint: {err}")))?;
        let http = Client::builder()
            .build()
            .map_err(|err| ObjectStoreError::Configuration(err.to_string()))?;

        Ok(Self { http, config, base })
    }

    fn object_url(&self, key: &str) -> Result<Url, ObjectStoreError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ObjectStoreError::Configuration("endpoint cannot be a base URL".into()))?
            .clear()
            .extend(key.split('/'));
        Ok(url)
    }

    fn canonical_resource(&self, key: &str) -> String {
        format!("/{}/{key}", self.config.bucket)
    }

    fn sign(&self, string_to_sign: &str) -> Result<String, ObjectStoreError> {
        let mut mac = HmacSha1::new_from_slice(self.config.credentials.access_key_secret.as_bytes())
            .map_err(|err| ObjectStoreError::Configuration(err.to_string()))?;
        mac.update(string_to_sign.as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    fn signed_request(
        &self,
        method: Method,
        key: &str,
        content_type: Option<&str>,
        oss_headers: &[(String, String)],
    ) -> Result<RequestBuilder, ObjectStoreError> {
        let date = http_date(OffsetDateTime::now_utc())?;
        let string_to_sign = string_to_sign(
            method.as_str(),
            content_type.unwrap_or_default(),
            &date,
            oss_headers,
            &self.canonical_resource(key),
        );
        let signature = self.sign(&string_to_sign)?;

        let mut request = self
            .http
            .request(method, self.object_url(key)?)
            .header("Date", date)
            .header(
                "Authorization",
                format!("OSS {}:{signature}", self.config.credentials.access_key_id),
            );
        if let Some(content_type) = content_type {
            request = request.header("Content-Type", content_type);
        }
        for (name, value) in oss_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        Ok(request)
    }
}

#[async_trait]
impl ObjectStore for OssClient {
    async fn put(&self, key: &str, data: Bytes, options: PutOptions) -> Result<(), ObjectStoreError> {
        let oss_headers: Vec<(String, String)> = options
            .metadata
            .iter()
            .map(|(name, value)| {
                (
                    format!("{META_HEADER_PREFIX}{}", name.to_ascii_lowercase()),
                    value.clone(),
                )
            })
            .collect();

        let mut request = self
            .signed_request(Method::PUT, key, options.content_type.as_deref(), &oss_headers)?
            .body(data);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(map_transport)?;
        check_status(key, response).await
    }

    fn signed_url(&self, key: &str, expires: Duration) -> Result<String, ObjectStoreError> {
        let deadline = OffsetDateTime::now_utc().unix_timestamp() + expires.as_secs() as i64;
        let string_to_sign = string_to_sign(
            "GET",
            "",
            &deadline.to_string(),
            &[],
            &self.canonical_resource(key),
        );
        let signature = self.sign(&string_to_sign)?;

        let mut url = self.object_url(key)?;
        url.query_pairs_mut()
            .append_pair("OSSAccessKeyId", &self.config.credentials.access_key_id)
            .append_pair("Expires", &deadline.to_string())
            .append_pair("Signature", &signature);
        Ok(url.into())
    }

    async fn head(&self, key: &str) -> Result<(), ObjectStoreError> {
        let response = self
            .signed_request(Method::HEAD, key, None, &[])?
            .send()
            .await
            .map_err(map_transport)?;
        check_status(key, response).await
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        let response = self
            .signed_request(Method::DELETE, key, None, &[])?
            .send()
            .await
            .map_err(map_transport)?;
        check_status(key, response).await
    }
}

fn map_transport(err: reqwest::Error) -> ObjectStoreError {
    if err.is_timeout() {
        ObjectStoreError::Timeout
    } else {
        ObjectStoreError::Transport(err.to_string())
    }
}

async fn check_status(key: &str, response: Response) -> Result<(), ObjectStoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ObjectStoreError::NotFound {
            key: key.to_string(),
        });
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_code(&body).unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    });
    Err(ObjectStoreError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Pull `<Code>` out of an OSS XML error document.
fn error_code(body: &str) -> Option<String> {
    let document = roxmltree::Document::parse(body).ok()?;
    let code = document
        .root_element()
        .children()
        .find(|node| node.has_tag_name("Code"))?
        .text()?
        .trim();
    (!code.is_empty()).then(|| code.to_string())
}

fn string_to_sign(
    verb: &str,
    content_type: &str,
    date: &str,
    oss_headers: &[(String, String)],
    resource: &str,
) -> String {
    let mut headers: Vec<(String, &str)> = oss_headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.trim()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let mut canonical = format!("{verb}\n\n{content_type}\n{date}\n");
    for (name, value) in headers {
        canonical.push_str(&name);
        canonical.push(':');
        canonical.push_str(value);
        canonical.push('\n');
    }
    canonical.push_str(resource);
    canonical
}

fn http_date(now: OffsetDateTime) -> Result<String, ObjectStoreError> {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    now.format(&format)
        .map_err(|err| ObjectStoreError::Configuration(format!("failed to format date: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn client() -> OssClient {
        OssClient::new(OssClientConfig {
            endpoint: OssClientConfig::endpoint_for_region("oss-cn-hangzhou"),
            bucket: "formulas".to_string(),
            credentials: OssCredentials {
                access_key_id: "id".to_string(),
                access_key_secret: "secret".to_string(),
            },
            secure: true,
        })
        .expect("valid config")
    }

    #[test]
    fn string_to_sign_sorts_oss_headers() {
        let headers = vec![
            ("x-oss-meta-scale".to_string(), "2".to_string()),
            ("X-OSS-Meta-Dpi".to_string(), " 144 ".to_string()),
        ];
        let canonical = string_to_sign(
            "PUT",
            "image/png",
            "Thu, 17 Nov 2005 18:49:58 GMT",
            &headers,
            "/formulas/formula-images/1-a.png",
        );
        assert_eq!(
            canonical,
            "PUT\n\nimage/png\nThu, 17 Nov 2005 18:49:58 GMT\nx-oss-meta-dpi:144\nx-oss-meta-scale:2\n/formulas/formula-images/1-a.png"
        );
    }

    #[test]
    fn http_date_uses_gmt_format() {
        let date = http_date(datetime!(2005-11-17 18:49:58 UTC)).unwrap();
        assert_eq!(date, "Thu, 17 Nov 2005 18:49:58 GMT");
    }

    #[test]
    fn object_url_encodes_each_segment() {
        let url = client().object_url("formula-images/1-a b.png").unwrap();
        assert_eq!(
            url.as_str(),
            "https://formulas.oss-cn-hangzhou.aliyuncs.com/formula-images/1-a%20b.png"
        );
    }

    #[test]
    fn signed_url_carries_signature_query() {
        let url = client()
            .signed_url("formula-images/1-a.png", Duration::from_secs(60))
            .unwrap();
        let parsed = Url::parse(&url).unwrap();
        let keys: Vec<String> = parsed.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(keys, ["OSSAccessKeyId", "Expires", "Signature"]);
        assert_eq!(parsed.path(), "/formula-images/1-a.png");
    }

    #[test]
    fn error_code_is_extracted_from_xml() {
        let body = "<?xml version=\"1.0\"?><Error><Code>AccessDenied</Code><Message>no</Message></Error>";
        assert_eq!(error_code(body).as_deref(), Some("AccessDenied"));
        assert_eq!(error_code("plain text"), None);
        assert_eq!(error_code("<Error><Code>"), None);
        assert_eq!(error_code("<Error><Code>  </Code></Error>"), None);
        assert_eq!(
            error_code("<Error>\n  <Code>\n    NoSuchBucket\n  </Code>\n</Error>").as_deref(),
            Some("NoSuchBucket")
        );
    }

    #[test]
    fn empty_bucket_is_rejected() {
        let err = OssClient::new(OssClientConfig {
            endpoint: "oss-cn-hangzhou.aliyuncs.com".to_string(),
            bucket: " ".to_string(),
            credentials: OssCredentials {
                access_key_id: "id".to_string(),
                access_key_secret: "secret".to_string(),
            },
            secure: true,
        })
        .unwrap_err();
        assert!(matches!(err, ObjectStoreError::Configuration(_)));
    }
}
