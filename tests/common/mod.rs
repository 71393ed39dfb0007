//! Shared fixtures: the `POST /api/v1/adList` route and a call recorder.
#![allow(dead_code)]

use apistream::{Api, ApiConfig, ApiError, ApiProfile, RequestContext, RouteKey};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

pub const AD_LIST_IN: &str = "version=http://json-schema.org/draft-07/schema#,id=in,direction=in\n\
    fullname=title,required,description=ad title\n\
    fullname=index,format=int,required,default=0,description=page index,0 based\n\
    fullname=size,format=int,required,default=10\n\
    fullname=tag,description=correlates calls in tests";

pub const AD_LIST_OUT: &str = "version=http://json-schema.org/draft-07/schema#,id=out,direction=out\n\
    fullname=index,format=int\n\
    fullname=size,format=int\n\
    fullname=total,format=int\n\
    fullname=items[].id,format=int\n\
    fullname=items[].title";

/// Business calls seen per `tag`, so parallel tests do not observe each other.
static CALLS: Lazy<Mutex<HashMap<String, Vec<(String, i64, i64)>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn record(tag: &str, title: &str, index: i64, size: i64) {
    CALLS
        .lock()
        .unwrap()
        .entry(tag.to_string())
        .or_default()
        .push((title.to_string(), index, size));
}

/// `(title, index, size)` for every business call made with `tag`.
pub fn calls(tag: &str) -> Vec<(String, i64, i64)> {
    CALLS.lock().unwrap().get(tag).cloned().unwrap_or_default()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AdList {
    pub title: String,
    pub index: i64,
    pub size: i64,
    pub tag: String,
}

#[derive(Debug, Serialize)]
pub struct AdItem {
    /// Sent as text; the output schema turns it back into an integer
    pub id: String,
    pub title: String,
}

#[derive(Debug, Serialize)]
pub struct AdListOut {
    pub index: i64,
    pub size: i64,
    pub total: i64,
    pub items: Vec<AdItem>,
    /// Not declared by the output schema
    pub internal_note: String,
}

impl Api for AdList {
    type Output = AdListOut;

    fn route(&self) -> RouteKey {
        RouteKey::post("/api/v1/adList")
    }

    fn input_schema(&self) -> &str {
        AD_LIST_IN
    }

    fn output_schema(&self) -> &str {
        AD_LIST_OUT
    }

    fn profile(&self) -> ApiProfile {
        ApiProfile {
            domain: "ads".into(),
            name: "adList".into(),
            title: "List ads".into(),
            description: "Paged ad listing".into(),
        }
    }

    fn handle(&mut self, _ctx: &RequestContext) -> Result<Option<AdListOut>, ApiError> {
        record(&self.tag, &self.title, self.index, self.size);
        if self.title == "boom" {
            return Err(ApiError::business("ad store unavailable"));
        }
        if self.title == "nothing" {
            return Ok(None);
        }
        let items = (0..self.size.min(2))
            .map(|i| AdItem {
                id: (self.index * self.size + i + 1).to_string(),
                title: format!("{} #{}", self.title, i + 1),
            })
            .collect();
        Ok(Some(AdListOut {
            index: self.index,
            size: self.size,
            total: 2,
            items,
            internal_note: "cache miss".into(),
        }))
    }
}

/// Same route, guarded by auth; echoes the injected user id.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MyAds {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct MyAdsOut {
    pub owner: String,
}

impl Api for MyAds {
    type Output = MyAdsOut;

    fn route(&self) -> RouteKey {
        RouteKey::get("/api/v1/myAds")
    }

    fn input_schema(&self) -> &str {
        "fullname=userId,required"
    }

    fn output_schema(&self) -> &str {
        "fullname=owner,required"
    }

    fn config(&self) -> ApiConfig {
        ApiConfig { auth: true }
    }

    fn handle(&mut self, ctx: &RequestContext) -> Result<Option<MyAdsOut>, ApiError> {
        let owner = ctx.user_id.clone().unwrap_or_else(|| self.user_id.clone());
        Ok(Some(MyAdsOut { owner }))
    }
}
