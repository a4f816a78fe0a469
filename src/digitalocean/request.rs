use crate::digitalocean::{error::Error, Config, Links, ListOptions, Result};
use http::header::ACCEPT;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

pub(super) async fn get_list<R: DeserializeOwned>(
    http_client: &reqwest::Client,
    config: &Config,
    path: &str,
    result_json_path: &str,
    mut params: HashMap<String, String>,
    options: Option<&ListOptions>,
) -> Result<(Vec<R>, Links)> {
    if let Some(options) = options {
        params.paginate(options);
    }

    let url = gen_url(config, path, &params)?;
    debug!(url = %url, "GET request");

    let response = http_client
        .get(url)
        .with_auth(config)
        .header(ACCEPT, "application/json")
        .send()
        .await?;

    let mut json: Value = ensure_success(response).await?.json().await?;

    let links: Links = match parse_at_pointer(&mut json, "/links") {
        Some(v) => v?,
        None => Links::default(),
    };

    let data: Vec<R> = match parse_at_pointer(&mut json, result_json_path) {
        Some(v) => v,
        None => return Err(Error::MissingResponseValue(result_json_path.to_owned())),
    }?;

    Ok((data, links))
}

pub(super) async fn put<T: Serialize, R: DeserializeOwned>(
    http_client: &reqwest::Client,
    config: &Config,
    path: &str,
    content: &T,
    result_json_path: &str,
) -> Result<R> {
    let url = gen_url(config, path, &HashMap::new())?;
    debug!(url = %url, "PUT request");

    let response = http_client
        .put(url)
        .with_auth(config)
        .header(ACCEPT, "application/json")
        .json(content)
        .send()
        .await?;

    let mut json: Value = ensure_success(response).await?.json().await?;

    match parse_at_pointer(&mut json, result_json_path) {
        Some(v) => v,
        None => Err(Error::MissingResponseValue(result_json_path.to_owned())),
    }
}

pub(super) async fn delete(
    http_client: &reqwest::Client,
    config: &Config,
    path: &str,
    params: HashMap<String, String>,
) -> Result<()> {
    let url = gen_url(config, path, &params)?;
    debug!(url = %url, "DELETE request");

    let response = http_client
        .delete(url)
        .with_auth(config)
        .header(ACCEPT, "application/json")
        .send()
        .await?;

    ensure_success(response).await?;

    Ok(())
}

async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    Err(Error::BadResponse {
        status: response.status(),
        headers: response.headers().clone(),
        body: response.text().await?,
    })
}

trait Paginate {
    fn paginate(&mut self, options: &ListOptions);
}

impl Paginate for HashMap<String, String> {
    fn paginate(&mut self, options: &ListOptions) {
        self.insert(String::from("page"), options.page.to_string());
        self.insert(String::from("per_page"), options.per_page.to_string());
    }
}

trait Authenticated {
    fn with_auth(self, config: &Config) -> Self;
}

impl Authenticated for RequestBuilder {
    fn with_auth(self, config: &Config) -> Self {
        self.bearer_auth(&config.api_token)
    }
}

/// Resolves `path` relative to the configured base address, so a base of
/// `https://api.digitalocean.com/` and `https://api.digitalocean.com/v2` both
/// end up at `https://api.digitalocean.com/v2/...` for a `v2/...` path.
fn gen_url(config: &Config, path: &str, params: &HashMap<String, String>) -> Result<Url> {
    let mut url = config.address.join(path).map_err(|e| Error::InvalidUrl {
        source: e,
        url: format!("{}{}", config.address, path),
    })?;

    if !params.is_empty() {
        let mut params: Vec<_> = params.iter().collect();
        params.sort();
        url.query_pairs_mut().extend_pairs(params);
    }

    Ok(url)
}

fn parse_at_pointer<T: DeserializeOwned>(json: &mut Value, pointer: &str) -> Option<Result<T>> {
    json.pointer_mut(pointer).map(|json| {
        serde_json::from_value(json.take()).map_err(|e| Error::Deserialization {
            source: e,
            pointer: pointer.to_owned(),
        })
    })
}
