use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer};

use super::services::{MarketFilter, Page};

/// Query string of `GET /market`. Blank values are treated as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketQuery {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub condition_score: Option<i32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub mileage: Option<i32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub sold_price: Option<i32>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub limit: Option<i64>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub offset: Option<i64>,
}

impl MarketQuery {
    /// Split into filter and paging. Negative `limit` or `offset` is rejected.
    pub fn into_parts(self) -> Result<(MarketFilter, Option<Page>), String> {
        if self.limit.is_some_and(|l| l < 0) {
            return Err("limit must not be negative".into());
        }
        if self.offset.is_some_and(|o| o < 0) {
            return Err("offset must not be negative".into());
        }
        let page = self.limit.map(|limit| Page {
            limit,
            offset: self.offset.unwrap_or(0),
        });
        let filter = MarketFilter {
            brand: self.brand,
            model: self.model,
            year: self.year,
            condition_score: self.condition_score,
            mileage: self.mileage,
            sold_price: self.sold_price,
        };
        Ok((filter, page))
    }
}

fn empty_string_as_none<'de, D, T>(de: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let opt = Option::<String>::deserialize(de)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => FromStr::from_str(s).map_err(de::Error::custom).map(Some),
    }
}
