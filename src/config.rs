use std::env;

use crate::error::Error;

/// Endpoints the client talks to. `api_base` is the backend REST origin;
/// `public_origin` is the host shareable links are composed against, which
/// may differ from the API host behind a CDN.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base: String,
    pub public_origin: String,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        let api_base = env::var("ITINERA_API_BASE")?;
        let public_origin =
            env::var("ITINERA_PUBLIC_ORIGIN").unwrap_or_else(|_| api_base.clone());

        Ok(Self {
            api_base,
            public_origin,
        })
    }
}
