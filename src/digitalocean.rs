pub mod error;
pub mod kubernetes;
mod request;
pub mod sizes;

use reqwest::{ClientBuilder, Url};
use serde::{Deserialize, Serialize};

pub use kubernetes::Kubernetes;
pub use sizes::Sizes;

pub type Result<T> = std::result::Result<T, error::Error>;

pub const DEFAULT_ADDRESS: &str = "https://api.digitalocean.com/";

const DEFAULT_PER_PAGE: u64 = 200;

#[derive(Debug)]
pub struct Client {
    config: Config,
    http_client: reqwest::Client,
}

#[derive(Debug, Clone)]
pub struct Config {
    address: Url,
    api_token: String,
}

impl Client {
    pub fn builder() -> Builder {
        Builder::default()
    }
}

#[derive(Clone, Debug, Default)]
pub struct Builder {
    address: Option<String>,
    api_token: Option<String>,
    user_agent: Option<String>,
}

impl Builder {
    pub fn address(mut self, address: String) -> Self {
        self.address = Some(address);
        self
    }

    pub fn api_token(mut self, api_token: String) -> Self {
        self.api_token = Some(api_token);
        self
    }

    pub fn user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = Some(user_agent);
        self
    }

    pub fn build(self) -> Result<Client> {
        use error::Error::*;

        let address = self
            .address
            .unwrap_or_else(|| String::from(DEFAULT_ADDRESS));
        let address = Url::parse(&address).map_err(|source| InvalidUrl {
            url: address.clone(),
            source,
        })?;

        let mut http_client = ClientBuilder::new();
        if let Some(user_agent) = self.user_agent {
            http_client = http_client.user_agent(user_agent);
        }

        Ok(Client {
            config: Config {
                address,
                api_token: self.api_token.ok_or(MissingConfig("api_token"))?,
            },
            http_client: http_client.build()?,
        })
    }
}

/// Query parameters of a paginated list request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListOptions {
    pub page: u64,
    pub per_page: u64,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub pages: Option<Pages>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pages {
    pub first: Option<String>,
    pub prev: Option<String>,
    pub next: Option<String>,
    pub last: Option<String>,
}

impl Links {
    pub fn is_last_page(&self) -> bool {
        self.pages
            .as_ref()
            .and_then(|pages| pages.next.as_ref())
            .is_none()
    }
}
