//! HTTP transport.
//!
//! Requests map onto the REST gateway routes under `/db` and `/acl`.
//! Streamed results come back as a sequence of JSON values, written back
//! to back or separated by newlines.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Method, Url};
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};

use bcdb_core::{Acl, AclKey, Metadata, ObjectId, Permissions, Tag, TagValue, UserId};

use crate::error::{Result, TransportError};
use crate::messages::{Request, Response, StatusCode};
use crate::transport::{end_on_error, CallMetadata, ResponseStream, Transport};

pub const HEADER_ACL: &str = "x-acl";
pub const HEADER_TAGS: &str = "x-tags";
pub const HEADER_ROUTE: &str = "x-threebot-id";

/// HTTP transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Gateway root, e.g. `http://localhost:50061`.
    pub base_url: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Body of a mapped HTTP call.
#[derive(Debug, Clone, PartialEq)]
pub enum HttpBody {
    Empty,
    Raw(Bytes),
    Json(serde_json::Value),
}

/// A request mapped onto an HTTP call.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRoute {
    pub method: Method,
    /// Path segments below the base url.
    pub path: Vec<String>,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(&'static str, String)>,
    pub body: HttpBody,
}

impl HttpRoute {
    fn new(method: Method, path: &[&str]) -> Self {
        Self {
            method,
            path: path.iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
            headers: Vec::new(),
            body: HttpBody::Empty,
        }
    }

    fn header(mut self, name: &'static str, value: String) -> Self {
        self.headers.push((name, value));
        self
    }

    fn body(mut self, body: HttpBody) -> Self {
        self.body = body;
        self
    }
}

/// Map a request onto its HTTP route.
pub fn route(request: &Request) -> Result<HttpRoute> {
    let route = match request {
        Request::Set { data, metadata } => {
            with_metadata(HttpRoute::new(Method::POST, &["db", &metadata.collection]), metadata)?
                .body(HttpBody::Raw(data.clone()))
        }
        Request::Get { collection, id } => {
            HttpRoute::new(Method::GET, &["db", collection, &id.to_string()])
        }
        // Every gateway object route is scoped to a collection.
        Request::Fetch { .. } => return Err(TransportError::Unsupported(request.name())),
        Request::Update { id, data, metadata } => {
            let id = id.to_string();
            // An empty body leaves the stored data untouched.
            let body = data.clone().unwrap_or_default();
            with_metadata(
                HttpRoute::new(Method::PUT, &["db", metadata.collection.as_str(), id.as_str()]),
                metadata,
            )?
            .body(HttpBody::Raw(body))
        }
        Request::Delete { collection, id } => {
            HttpRoute::new(Method::DELETE, &["db", collection, &id.to_string()])
        }
        Request::List { collection, tags } | Request::Find { collection, tags } => {
            let mut route = HttpRoute::new(Method::GET, &["db", collection]);
            route.query = tags
                .iter()
                .map(|t| (t.key.clone(), t.value.to_string()))
                .collect();
            if route.query.is_empty() {
                // The gateway's query filter rejects an empty query string.
                route.query.push(("_".into(), String::new()));
            }
            route
        }
        Request::AclCreate { perm, users } => HttpRoute::new(Method::POST, &["acl"]).body(
            HttpBody::Json(serde_json::json!({ "perm": perm.to_string(), "users": users })),
        ),
        Request::AclGet { key } => HttpRoute::new(Method::GET, &["acl", &key.to_string()]),
        Request::AclSet { key, perm } => HttpRoute::new(Method::PUT, &["acl", &key.to_string()])
            .body(HttpBody::Json(serde_json::json!({ "perm": perm.to_string() }))),
        Request::AclGrant { key, users } => {
            HttpRoute::new(Method::POST, &["acl", &key.to_string(), "grant"])
                .body(HttpBody::Json(serde_json::json!({ "users": users })))
        }
        Request::AclRevoke { key, users } => {
            HttpRoute::new(Method::POST, &["acl", &key.to_string(), "revoke"])
                .body(HttpBody::Json(serde_json::json!({ "users": users })))
        }
        Request::AclList => HttpRoute::new(Method::GET, &["acl", "list"]),
    };
    Ok(route)
}

fn with_metadata(route: HttpRoute, metadata: &Metadata) -> Result<HttpRoute> {
    let tags: BTreeMap<&str, String> = metadata
        .tags
        .iter()
        .map(|t| (t.key.as_str(), t.value.to_string()))
        .collect();
    let tags = serde_json::to_string(&tags).map_err(|e| TransportError::Codec(e.to_string()))?;

    let route = route.header(HEADER_TAGS, tags);
    Ok(match metadata.acl {
        Some(acl) => route.header(HEADER_ACL, acl.to_string()),
        None => route,
    })
}

#[derive(Deserialize)]
struct AclBody {
    perm: Permissions,
    users: Vec<UserId>,
}

#[derive(Deserialize)]
struct FindItem {
    id: ObjectId,
    #[serde(default)]
    tags: BTreeMap<String, String>,
    acl: Option<AclKey>,
}

#[derive(Deserialize)]
struct AclItem {
    key: AclKey,
    acl: AclBody,
}

fn json<'a, T: Deserialize<'a>>(body: &'a [u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| TransportError::Codec(e.to_string()))
}

fn tags_from_map(map: BTreeMap<String, String>) -> Vec<Tag> {
    map.into_iter()
        .map(|(key, value)| Tag {
            key,
            value: TagValue::Str(value),
        })
        .collect()
}

/// Decode the reply to a unary call.
pub fn decode_reply(request: &Request, headers: &HeaderMap, body: Bytes) -> Result<Response> {
    let response = match request {
        Request::Set { .. } => Response::Id { id: json(&body)? },
        Request::Get { id, .. } => {
            let collection = request.collection().unwrap_or_default().to_string();
            let acl = match headers.get(HEADER_ACL) {
                Some(value) => Some(
                    value
                        .to_str()
                        .ok()
                        .and_then(|v| v.parse::<AclKey>().ok())
                        .ok_or_else(|| TransportError::Codec("invalid x-acl header".into()))?,
                ),
                None => None,
            };
            let tags = match headers.get(HEADER_TAGS) {
                Some(value) => json::<BTreeMap<String, String>>(value.as_bytes())?,
                None => BTreeMap::new(),
            };
            Response::Object {
                id: *id,
                metadata: Metadata {
                    collection,
                    acl,
                    tags: tags_from_map(tags),
                },
                data: body,
            }
        }
        Request::AclCreate { .. } => Response::AclKey { key: json(&body)? },
        Request::AclGet { key } => {
            let acl: AclBody = json(&body)?;
            Response::Acl {
                acl: Acl {
                    key: *key,
                    perm: acl.perm,
                    users: acl.users.into_iter().collect(),
                },
            }
        }
        Request::Update { .. }
        | Request::Delete { .. }
        | Request::AclSet { .. }
        | Request::AclGrant { .. }
        | Request::AclRevoke { .. } => Response::Empty,
        Request::Fetch { .. } => return Err(TransportError::Unsupported(request.name())),
        Request::List { .. } | Request::Find { .. } | Request::AclList => {
            return Err(TransportError::UnexpectedResponse(format!(
                "{} is a streaming call",
                request.name()
            )))
        }
    };
    Ok(response)
}

/// Decode one value of a streamed reply.
pub fn decode_item(request: &Request, value: &[u8]) -> Result<Response> {
    match request {
        Request::List { .. } => {
            let item: FindItem = json(value)?;
            Ok(Response::Id { id: item.id })
        }
        Request::Find { collection, .. } => {
            let item: FindItem = json(value)?;
            Ok(Response::Found {
                id: item.id,
                metadata: Metadata {
                    collection: collection.clone(),
                    acl: item.acl,
                    tags: tags_from_map(item.tags),
                },
            })
        }
        Request::AclList => {
            let item: AclItem = json(value)?;
            Ok(Response::Acl {
                acl: Acl {
                    key: item.key,
                    perm: item.acl.perm,
                    users: item.acl.users.into_iter().collect(),
                },
            })
        }
        other => Err(TransportError::UnexpectedResponse(format!(
            "{} is not a streaming call",
            other.name()
        ))),
    }
}

/// Split a chunked body into complete JSON values.
///
/// The gateway writes values back to back, with or without whitespace in
/// between. Bytes of an incomplete value stay buffered until the next chunk.
pub fn json_values<S>(body: S) -> BoxStream<'static, Result<Vec<u8>>>
where
    S: futures::Stream<Item = Result<Bytes>> + Send + Unpin + 'static,
{
    struct State<S> {
        body: S,
        buf: Vec<u8>,
        ready: VecDeque<Vec<u8>>,
        eof: bool,
    }

    let state = State {
        body,
        buf: Vec::new(),
        ready: VecDeque::new(),
        eof: false,
    };

    stream::try_unfold(state, |mut state| async move {
        loop {
            if let Some(value) = state.ready.pop_front() {
                return Ok(Some((value, state)));
            }

            if state.eof {
                if state.buf.iter().all(u8::is_ascii_whitespace) {
                    return Ok(None);
                }
                return Err(TransportError::Codec(format!(
                    "body ended inside a JSON value ({} bytes pending)",
                    state.buf.len()
                )));
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    state.buf.extend_from_slice(&chunk);
                    split_values(&mut state.buf, &mut state.ready)?;
                }
                Some(Err(e)) => return Err(e),
                None => state.eof = true,
            }
        }
    })
    .boxed()
}

/// Move every complete value at the front of `buf` into `ready`.
fn split_values(buf: &mut Vec<u8>, ready: &mut VecDeque<Vec<u8>>) -> Result<()> {
    let mut consumed = 0;
    let mut values = serde_json::Deserializer::from_slice(&buf[..]).into_iter::<IgnoredAny>();
    loop {
        match values.next() {
            Some(Ok(_)) => {
                let end = values.byte_offset();
                let value = &buf[consumed..end];
                let start = value
                    .iter()
                    .position(|b| !b.is_ascii_whitespace())
                    .unwrap_or(value.len());
                ready.push_back(value[start..].to_vec());
                consumed = end;
            }
            Some(Err(e)) if e.is_eof() => break,
            Some(Err(e)) => return Err(TransportError::Codec(e.to_string())),
            None => break,
        }
    }
    drop(values);
    buf.drain(..consumed);
    Ok(())
}

/// Transport speaking to the REST gateway.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| TransportError::InvalidConfig(format!("{}: {e}", config.base_url)))?;
        if base.cannot_be_a_base() {
            return Err(TransportError::InvalidConfig(format!(
                "{} cannot be used as a base url",
                config.base_url
            )));
        }
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, base })
    }

    /// Build the full url of a route.
    pub fn url(&self, route: &HttpRoute) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidConfig("base url cannot be a base".into()))?
            .pop_if_empty()
            .extend(&route.path);
        if !route.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&route.query);
        }
        Ok(url)
    }

    async fn send(&self, metadata: &CallMetadata, request: &Request) -> Result<reqwest::Response> {
        let route = route(request)?;
        let url = self.url(&route)?;
        tracing::trace!(method = %route.method, %url, op = request.name(), "http call");

        let mut builder = self
            .client
            .request(route.method.clone(), url)
            .header(AUTHORIZATION, metadata.authorization.as_str());
        if let Some(peer) = metadata.route {
            builder = builder.header(HEADER_ROUTE, peer.to_string());
        }
        for (name, value) in route.headers {
            builder = builder.header(name, value);
        }
        builder = match route.body {
            HttpBody::Empty => builder,
            HttpBody::Raw(bytes) => builder.body(bytes),
            HttpBody::Json(value) => builder.json(&value),
        };

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(TransportError::status(
                StatusCode::from_http(status.as_u16()),
                message,
            ));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn unary(&self, metadata: CallMetadata, request: Request) -> Result<Response> {
        let response = self.send(&metadata, &request).await?;
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        decode_reply(&request, &headers, body)
    }

    async fn streaming(
        &self,
        metadata: CallMetadata,
        request: Request,
    ) -> Result<ResponseStream> {
        let response = self.send(&metadata, &request).await?;
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed();

        let replies = json_values(body)
            .map(move |value| value.and_then(|value| decode_item(&request, &value)));
        Ok(end_on_error(replies).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn metadata() -> Metadata {
        Metadata {
            collection: "files".into(),
            acl: Some(7),
            tags: vec![Tag::new("name", "report"), Tag::new("size", 3i64)],
        }
    }

    fn transport() -> HttpTransport {
        HttpTransport::new(HttpConfig::new("http://localhost:50061/")).unwrap()
    }

    #[test]
    fn test_set_route() {
        let route = route(&Request::Set {
            data: Bytes::from_static(b"hello"),
            metadata: metadata(),
        })
        .unwrap();

        assert_eq!(route.method, Method::POST);
        assert_eq!(route.path, vec!["db", "files"]);
        assert!(route
            .headers
            .contains(&(HEADER_TAGS, r#"{"name":"report","size":"3"}"#.to_string())));
        assert!(route.headers.contains(&(HEADER_ACL, "7".to_string())));
        assert_eq!(route.body, HttpBody::Raw(Bytes::from_static(b"hello")));
    }

    #[test]
    fn test_update_without_data_sends_empty_body() {
        let route = route(&Request::Update {
            id: 4,
            data: None,
            metadata: Metadata {
                acl: None,
                ..metadata()
            },
        })
        .unwrap();

        assert_eq!(route.method, Method::PUT);
        assert_eq!(route.path, vec!["db", "files", "4"]);
        assert_eq!(route.body, HttpBody::Raw(Bytes::new()));
        assert!(route.headers.iter().all(|(name, _)| *name != HEADER_ACL));
    }

    #[test]
    fn test_acl_routes() {
        let grant = route(&Request::AclGrant {
            key: 3,
            users: vec![1, 2],
        })
        .unwrap();
        assert_eq!(grant.method, Method::POST);
        assert_eq!(grant.path, vec!["acl", "3", "grant"]);
        assert_eq!(grant.body, HttpBody::Json(serde_json::json!({ "users": [1, 2] })));

        let create = route(&Request::AclCreate {
            perm: "rw-".parse().unwrap(),
            users: vec![],
        })
        .unwrap();
        assert_eq!(
            create.body,
            HttpBody::Json(serde_json::json!({ "perm": "rw-", "users": [] }))
        );

        let list = route(&Request::AclList).unwrap();
        assert_eq!(list.method, Method::GET);
        assert_eq!(list.path, vec!["acl", "list"]);
    }

    #[test]
    fn test_fetch_has_no_route() {
        assert!(matches!(
            route(&Request::Fetch { id: 5 }),
            Err(TransportError::Unsupported("fetch"))
        ));
    }

    #[test]
    fn test_find_url_escapes_query() {
        let request = Request::Find {
            collection: "my files".into(),
            tags: vec![Tag::new("name", "a&b")],
        };
        let url = transport().url(&route(&request).unwrap()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:50061/db/my%20files?name=a%26b");

        let empty = Request::List {
            collection: "files".into(),
            tags: vec![],
        };
        let url = transport().url(&route(&empty).unwrap()).unwrap();
        assert_eq!(url.as_str(), "http://localhost:50061/db/files?_=");
    }

    #[test]
    fn test_decode_get() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_ACL, HeaderValue::from_static("9"));
        headers.insert(HEADER_TAGS, HeaderValue::from_static(r#"{"k":"v",":size":"5"}"#));

        let response = decode_reply(
            &Request::Get {
                collection: "files".into(),
                id: 2,
            },
            &headers,
            Bytes::from_static(b"hello"),
        )
        .unwrap();

        let Response::Object { id, metadata, data } = response else {
            panic!("expected object");
        };
        assert_eq!(id, 2);
        assert_eq!(metadata.acl, Some(9));
        assert_eq!(metadata.collection, "files");
        assert_eq!(data, Bytes::from_static(b"hello"));
        assert!(metadata.tags.contains(&Tag::new(":size", "5")));
    }

    #[test]
    fn test_decode_items() {
        let find = Request::Find {
            collection: "files".into(),
            tags: vec![],
        };
        let item = br#"{"id":3,"tags":{"k":"v"},"acl":null}"#;
        let Response::Found { id, metadata } = decode_item(&find, item).unwrap() else {
            panic!("expected found");
        };
        assert_eq!(id, 3);
        assert_eq!(metadata.tags, vec![Tag::new("k", "v")]);

        let list = Request::List {
            collection: "files".into(),
            tags: vec![],
        };
        assert_eq!(decode_item(&list, item).unwrap(), Response::Id { id: 3 });

        let acl_item = br#"{"key":1,"acl":{"perm":"r-d","users":[2,1]}}"#;
        let Response::Acl { acl } = decode_item(&Request::AclList, acl_item).unwrap() else {
            panic!("expected acl");
        };
        assert_eq!(acl.perm.to_string(), "r-d");
        assert_eq!(acl.users.into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    async fn split(chunks: &[&'static str]) -> Vec<Result<Vec<u8>>> {
        let chunks: Vec<Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c.as_bytes())))
            .collect();
        json_values(stream::iter(chunks)).collect().await
    }

    #[tokio::test]
    async fn test_json_values_concatenated_across_chunks() {
        let values = split(&[
            r#"{"id":1,"tags":{},"acl":null}{"id":2,"ta"#,
            r#"gs":{"k":"v"},"acl":4}{"#,
            r#""id":3,"tags":{},"acl":null}"#,
        ])
        .await;
        let values: Vec<_> = values.into_iter().map(|v| v.unwrap()).collect();
        assert_eq!(
            values,
            vec![
                br#"{"id":1,"tags":{},"acl":null}"#.to_vec(),
                br#"{"id":2,"tags":{"k":"v"},"acl":4}"#.to_vec(),
                br#"{"id":3,"tags":{},"acl":null}"#.to_vec(),
            ]
        );
    }

    #[tokio::test]
    async fn test_json_values_newline_separated() {
        let values = split(&["{\"a\":1}\n{\"b\"", ":2}\n\n", "{\"c\":3}\n"]).await;
        let values: Vec<_> = values.into_iter().map(|v| v.unwrap()).collect();
        assert_eq!(
            values,
            vec![
                b"{\"a\":1}".to_vec(),
                b"{\"b\":2}".to_vec(),
                b"{\"c\":3}".to_vec()
            ]
        );
    }

    #[tokio::test]
    async fn test_json_values_truncated_body() {
        let values = split(&[r#"{"key":1,"acl":{"perm":"r--","users":[]}}{"key":2,"#]).await;
        assert_eq!(values.len(), 2);
        assert!(values[0].is_ok());
        assert!(matches!(values[1], Err(TransportError::Codec(_))));
    }

    #[tokio::test]
    async fn test_json_values_malformed_body() {
        let values = split(&["{\"a\":1} nonsense {\"b\":2}"]).await;
        // The complete value ahead of the garbage is not released.
        assert_eq!(values.len(), 1);
        assert!(matches!(values[0], Err(TransportError::Codec(_))));
    }

    #[tokio::test]
    async fn test_json_values_chunk_error_ends_stream() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"{\"a\":1}")),
            Err(TransportError::ConnectionClosed),
            Ok(Bytes::from_static(b"{\"b\":2}")),
        ];
        let items: Vec<_> = json_values(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(TransportError::ConnectionClosed)));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpTransport::new(HttpConfig::new("not a url")),
            Err(TransportError::InvalidConfig(_))
        ));
    }
}
