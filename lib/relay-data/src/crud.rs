//! Generic REST resource client.
//!
//! [`CrudClient`] talks to one collection endpoint (for example
//! `/api/products`) through any [`HttpClient`] whose failures are already
//! normalized, usually a [`Pipeline`]. A [`Mapper`] converts between the wire
//! DTOs and the model handed to callers.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | [`get_all`](CrudClient::get_all) | `GET {base}?{params}` |
//! | [`get_all_paginated`](CrudClient::get_all_paginated) | `GET {base}?{params}` |
//! | [`get_by_id`](CrudClient::get_by_id) | `GET {base}/{id}` |
//! | [`create`](CrudClient::create) | `POST {base}` |
//! | [`update`](CrudClient::update) | `PUT {base}/{id}` |
//! | [`patch`](CrudClient::patch) | `PATCH {base}/{id}` |
//! | [`delete`](CrudClient::delete) | `DELETE {base}/{id}` |
//! | [`bulk_create`](CrudClient::bulk_create) | `POST {base}/bulk` |
//! | [`bulk_delete`](CrudClient::bulk_delete) | `DELETE {base}/bulk` with `{"ids": [...]}` |

use std::fmt;
use std::marker::PhantomData;

use bytes::Bytes;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use relay::{HeaderMap, HttpClient, Method, NormalizedError, Pipeline, Request, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::{DataError, Result};

/// Characters escaped in an id path segment.
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\')
    .add(b'%');

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending.
    Desc,
}

/// Standard list parameters. Unset fields are left out of the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PaginationParams {
    /// Page number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Page size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Sort field.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    /// Sort direction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<SortOrder>,
}

impl PaginationParams {
    /// Request one page of `limit` items.
    #[must_use]
    pub const fn page(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
            sort: None,
            order: None,
        }
    }

    /// Sort by `field` in the given direction.
    #[must_use]
    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort = Some(field.into());
        self.order = Some(order);
        self
    }
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    /// Items on this page.
    pub data: Vec<T>,
    /// Total number of items.
    pub total: u64,
    /// Page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Number of pages.
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    /// Convert every item, keeping the paging metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResponse<U> {
        PaginatedResponse {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }
}

/// Conversion between wire DTOs and models.
pub trait Mapper: Send + Sync {
    /// Model handed to callers.
    type Model;
    /// Representation received from the server.
    type Dto: DeserializeOwned;
    /// Partial model accepted by create and update operations.
    type Draft;
    /// Representation of a draft sent to the server.
    type DraftDto: Serialize;

    /// Convert a received DTO.
    fn from_dto(&self, dto: Self::Dto) -> Self::Model;

    /// Convert a draft for sending.
    fn to_dto(&self, draft: &Self::Draft) -> Self::DraftDto;
}

/// Mapper for resources whose model is the wire type.
pub struct Identity<T>(PhantomData<fn() -> T>);

impl<T> Identity<T> {
    /// Create the mapper.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Identity<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Identity<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Identity<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Identity")
    }
}

impl<T> Mapper for Identity<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    type Model = T;
    type Dto = T;
    type Draft = T;
    type DraftDto = T;

    fn from_dto(&self, dto: T) -> T {
        dto
    }

    fn to_dto(&self, draft: &T) -> T {
        draft.clone()
    }
}

#[derive(Serialize)]
struct BulkDelete<'a, I> {
    ids: &'a [I],
}

/// Client for one REST collection.
///
/// # Example
///
/// ```ignore
/// use relay::Pipeline;
/// use relay_data::{CrudClient, PaginationParams, ProductMapper};
///
/// let products = CrudClient::new(Pipeline::default(), "http://localhost:8080/api/products", ProductMapper);
/// let page = products.get_all(&PaginationParams::page(1, 20)).await?;
///
/// // Extra headers for a single call
/// let mut headers = HeaderMap::new();
/// headers.insert("X-Request-Id", HeaderValue::from_static("42"));
/// let product = products.clone().with_headers(headers).get_by_id(7).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CrudClient<M, C = Pipeline> {
    client: C,
    base_url: String,
    mapper: M,
    headers: HeaderMap,
}

impl<M, C> CrudClient<M, C> {
    /// Create a client for the collection at `base_url`.
    pub fn new(client: C, base_url: impl Into<String>, mapper: M) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client,
            base_url,
            mapper,
            headers: HeaderMap::new(),
        }
    }

    /// Send `headers` with every request of this client, replacing same-named
    /// values. Clone the client first to scope them to one call.
    #[must_use]
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Extra headers sent with every request.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Collection URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The DTO mapper.
    #[must_use]
    pub const fn mapper(&self) -> &M {
        &self.mapper
    }

    /// The underlying HTTP client.
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }
}

impl<M, C> CrudClient<M, C>
where
    M: Mapper,
    C: HttpClient<Error = NormalizedError>,
{
    /// List the collection.
    pub async fn get_all(&self, params: &PaginationParams) -> Result<Vec<M::Model>> {
        self.get_all_with(params).await
    }

    /// List the collection with arbitrary query parameters.
    ///
    /// `query` is any value that serializes to key/value pairs: a struct,
    /// a map or a slice of tuples. Sequences become repeated keys.
    pub async fn get_all_with<Q>(&self, query: &Q) -> Result<Vec<M::Model>>
    where
        Q: Serialize + ?Sized + Sync,
    {
        let query = relay::to_query_string(query).map_err(DataError::Encode)?;
        let response = self.send(Method::Get, &self.base_url, &query, None).await?;
        let dtos: Vec<M::Dto> = decode(&response)?;
        Ok(dtos.into_iter().map(|dto| self.mapper.from_dto(dto)).collect())
    }

    /// Fetch one page of the collection.
    pub async fn get_all_paginated(
        &self,
        params: &PaginationParams,
    ) -> Result<PaginatedResponse<M::Model>> {
        let query = relay::to_query_string(params).map_err(DataError::Encode)?;
        let response = self.send(Method::Get, &self.base_url, &query, None).await?;
        let page: PaginatedResponse<M::Dto> = decode(&response)?;
        Ok(page.map(|dto| self.mapper.from_dto(dto)))
    }

    /// Fetch one item.
    pub async fn get_by_id(&self, id: impl fmt::Display + Send) -> Result<M::Model> {
        let url = self.item_url(&id);
        let response = self.send(Method::Get, &url, "", None).await?;
        Ok(self.mapper.from_dto(decode(&response)?))
    }

    /// Create an item.
    pub async fn create(&self, draft: &M::Draft) -> Result<M::Model>
    where
        M::Draft: Sync,
    {
        let body = encode(&self.mapper.to_dto(draft))?;
        let response = self
            .send(Method::Post, &self.base_url, "", Some(body))
            .await?;
        Ok(self.mapper.from_dto(decode(&response)?))
    }

    /// Replace an item.
    pub async fn update(&self, id: impl fmt::Display + Send, draft: &M::Draft) -> Result<M::Model>
    where
        M::Draft: Sync,
    {
        let body = encode(&self.mapper.to_dto(draft))?;
        let url = self.item_url(&id);
        let response = self.send(Method::Put, &url, "", Some(body)).await?;
        Ok(self.mapper.from_dto(decode(&response)?))
    }

    /// Partially update an item.
    pub async fn patch(&self, id: impl fmt::Display + Send, draft: &M::Draft) -> Result<M::Model>
    where
        M::Draft: Sync,
    {
        let body = encode(&self.mapper.to_dto(draft))?;
        let url = self.item_url(&id);
        let response = self.send(Method::Patch, &url, "", Some(body)).await?;
        Ok(self.mapper.from_dto(decode(&response)?))
    }

    /// Delete an item.
    pub async fn delete(&self, id: impl fmt::Display + Send) -> Result<()> {
        let url = self.item_url(&id);
        self.send(Method::Delete, &url, "", None).await?;
        Ok(())
    }

    /// Create several items in one request.
    pub async fn bulk_create(&self, drafts: &[M::Draft]) -> Result<Vec<M::Model>>
    where
        M::Draft: Sync,
    {
        let dtos: Vec<M::DraftDto> = drafts.iter().map(|d| self.mapper.to_dto(d)).collect();
        let body = encode(&dtos)?;
        let response = self
            .send(Method::Post, &self.bulk_url(), "", Some(body))
            .await?;
        let created: Vec<M::Dto> = decode(&response)?;
        Ok(created
            .into_iter()
            .map(|dto| self.mapper.from_dto(dto))
            .collect())
    }

    /// Delete several items in one request.
    pub async fn bulk_delete<I>(&self, ids: &[I]) -> Result<()>
    where
        I: Serialize + Sync,
    {
        let body = encode(&BulkDelete { ids })?;
        self.send(Method::Delete, &self.bulk_url(), "", Some(body))
            .await?;
        Ok(())
    }

    fn item_url(&self, id: &dyn fmt::Display) -> String {
        let id = id.to_string();
        format!(
            "{}/{}",
            self.base_url,
            utf8_percent_encode(&id, PATH_SEGMENT_ENCODE_SET)
        )
    }

    fn bulk_url(&self) -> String {
        format!("{}/bulk", self.base_url)
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        query: &str,
        body: Option<Bytes>,
    ) -> Result<Response<Bytes>> {
        let url = relay::url::Url::parse(url)
            .map_err(|err| DataError::Request(relay::Error::from(err).into()))?;

        let mut builder = Request::builder(method, url).raw_query(query);
        if !self.headers.is_empty() {
            builder = builder.headers(self.headers.clone());
        }
        if let Some(body) = body {
            builder = builder
                .header("Content-Type", relay::ContentType::Json.as_str())
                .body(body);
        }
        let request = builder
            .build()
            .map_err(|err| DataError::Request(err.into()))?;

        Ok(self.client.execute(request).await?)
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
    relay::to_json(value).map_err(DataError::Encode)
}

fn decode<T: DeserializeOwned>(response: &Response<Bytes>) -> Result<T> {
    relay::from_json(response.body()).map_err(DataError::Decode)
}
