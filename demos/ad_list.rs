//! Registers an ad listing API and sends a few requests through `ApiService`.
//!
//! ```bash
//! APISTREAM_LOG_FORMAT=pretty cargo run --example ad_list
//! ```

use apistream::auth::{Authenticator, StaticTokenResolver};
use apistream::runtime_config::{RuntimeConfig, ServiceConfig};
use apistream::telemetry::{init_logging_with_config, LogConfig};
use apistream::{Api, ApiConfig, ApiError, ApiProfile, ApiService, Registry, RequestContext, RouteKey};
use http::Request;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Default, Deserialize)]
#[serde(default)]
struct AdList {
    title: String,
    index: i64,
    size: i64,
}

#[derive(Serialize)]
struct Ad {
    id: String,
    title: String,
}

#[derive(Serialize)]
struct AdListOut {
    total: i64,
    items: Vec<Ad>,
}

impl Api for AdList {
    type Output = AdListOut;

    fn route(&self) -> RouteKey {
        RouteKey::post("/api/v1/adList")
    }

    fn input_schema(&self) -> &str {
        "version=http://json-schema.org/draft-07/schema#,id=in,direction=in\n\
         fullname=title,required,description=ad title\n\
         fullname=index,format=int,required,default=0,description=page index,0 based\n\
         fullname=size,format=int,required,default=10"
    }

    fn output_schema(&self) -> &str {
        "version=http://json-schema.org/draft-07/schema#,id=out,direction=out\n\
         fullname=total,format=int,required\n\
         fullname=items[].id,format=int\n\
         fullname=items[].title"
    }

    fn profile(&self) -> ApiProfile {
        ApiProfile {
            domain: "ads".into(),
            name: "adList".into(),
            title: "List ads".into(),
            description: String::new(),
        }
    }

    fn handle(&mut self, _ctx: &RequestContext) -> Result<Option<AdListOut>, ApiError> {
        let first = self.index * self.size;
        let items = (first..first + self.size.min(3))
            .map(|n| Ad {
                id: (n + 1).to_string(),
                title: format!("{} {}", self.title, n + 1),
            })
            .collect();
        Ok(Some(AdListOut { total: 42, items }))
    }
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct MyAds {
    #[serde(rename = "userId")]
    user_id: String,
}

#[derive(Serialize)]
struct MyAdsOut {
    owner: String,
}

impl Api for MyAds {
    type Output = MyAdsOut;

    fn route(&self) -> RouteKey {
        RouteKey::get("/api/v1/myAds")
    }

    fn input_schema(&self) -> &str {
        "fullname=userId,required"
    }

    fn config(&self) -> ApiConfig {
        ApiConfig { auth: true }
    }

    fn handle(&mut self, _ctx: &RequestContext) -> Result<Option<MyAdsOut>, ApiError> {
        Ok(Some(MyAdsOut {
            owner: self.user_id.clone(),
        }))
    }
}

fn main() -> anyhow::Result<()> {
    let _guard = init_logging_with_config(&LogConfig {
        stderr: true,
        ..LogConfig::from_env()
    })?;

    let registry = Arc::new(Registry::with_config(
        RuntimeConfig::from_env(),
        &ServiceConfig::default(),
    ));
    registry.register(AdList::default())?;
    registry.register(MyAds::default())?;
    let resolver = StaticTokenResolver::new().with_token("demo-token", "ann");
    let service = ApiService::new(Arc::clone(&registry))
        .with_authenticator(Authenticator::new(Arc::new(resolver)));

    let requests = vec![
        Request::builder()
            .method("POST")
            .uri("/api/v1/adList")
            .header("content-type", "application/json")
            .body(br#"{"title":"promo"}"#.to_vec())?,
        Request::builder()
            .method("POST")
            .uri("/api/v1/adList?index=2&size=2")
            .header("content-type", "application/json")
            .body(br#"{"title":"promo"}"#.to_vec())?,
        Request::builder()
            .method("POST")
            .uri("/api/v1/adList")
            .body(br#"{"index":"1"}"#.to_vec())?,
        Request::builder()
            .uri("/api/v1/myAds")
            .header("cookie", "token=demo-token")
            .body(Vec::new())?,
        Request::builder().uri("/api/v1/myAds").body(Vec::new())?,
    ];

    for request in requests {
        let line = format!("{} {}", request.method(), request.uri());
        let response = service.handle(request);
        println!(
            "{line} -> {} {}",
            response.status(),
            String::from_utf8_lossy(response.body())
        );
    }

    registry.shutdown();
    Ok(())
}
