use async_trait::async_trait;
use scraper::Html;

use super::parse::{child_attr, child_text, has_next_page, id_from_href, parse_decimal, parse_int, selector, Parsed, RowError};
use super::{PaginationConfig, PaginationHandler, Scraper, PAGE_PARAM};
use crate::domain::models::EntityType;
use crate::domain::raw::ClubRaw;
use crate::error::{ImportError, Result};

pub struct ClubsScraper {
    pagination: PaginationHandler,
    listing_url: String,
    max_pages: Option<u32>,
}

impl ClubsScraper {
    pub fn new(pagination: PaginationHandler, base_url: &str, max_pages: Option<u32>) -> Self {
        Self {
            pagination,
            listing_url: format!("{}/rating?tab=clubs", base_url.trim_end_matches('/')),
            max_pages,
        }
    }
}

#[async_trait]
impl Scraper for ClubsScraper {
    type Item = ClubRaw;

    async fn scrape(&self, _target: Option<&str>) -> Result<Vec<Parsed<ClubRaw>>> {
        self.pagination
            .scrape_all_pages(PaginationConfig {
                base_url: &self.listing_url,
                page_param: PAGE_PARAM,
                max_pages: self.max_pages,
                extract: &extract_clubs,
                has_next: &has_next_page,
            })
            .await
    }
}

pub fn extract_clubs(document: &Html) -> Result<Vec<Parsed<ClubRaw>>> {
    let table = document
        .select(selector!("table.clubs-table"))
        .next()
        .ok_or_else(|| ImportError::parse(EntityType::Club, "clubs table not found"))?;

    let rows = table
        .select(selector!("tr.club-row"))
        .map(|row| {
            let id = child_attr(row, selector!("td.col-name a"), "href").and_then(id_from_href);
            let Some(gomafia_id) = id else {
                return Err(RowError::new(EntityType::Club, None, "row has no club link"));
            };
            let Some(name) = child_text(row, selector!("td.col-name")) else {
                return Err(RowError::new(EntityType::Club, Some(gomafia_id), "row has no club name"));
            };

            Ok(ClubRaw {
                gomafia_id,
                name,
                region: child_text(row, selector!("td.col-region")),
                president_name: child_text(row, selector!("td.col-president")),
                members_count: child_text(row, selector!("td.col-members")).and_then(|s| parse_int(&s)),
                elo: child_text(row, selector!("td.col-elo")).and_then(|s| parse_decimal(&s)),
            })
        })
        .collect();

    Ok(rows)
}
