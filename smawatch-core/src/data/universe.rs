//! Index constituents: the ticker universe grouped by GICS sector.
//!
//! The list is fetched as a whole and replaced wholesale on refresh.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One index member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constituent {
    pub ticker: String,
    pub company: String,
    pub sector: String,
    pub sub_industry: String,
}

/// Ordered list of index members, in source order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstituentList {
    constituents: Vec<Constituent>,
}

impl ConstituentList {
    pub fn new(constituents: Vec<Constituent>) -> Self {
        Self { constituents }
    }

    pub fn constituents(&self) -> &[Constituent] {
        &self.constituents
    }

    pub fn len(&self) -> usize {
        self.constituents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constituents.is_empty()
    }

    /// Look up a member by ticker.
    pub fn get(&self, ticker: &str) -> Option<&Constituent> {
        self.constituents.iter().find(|c| c.ticker == ticker)
    }

    /// All tickers in source order.
    pub fn all_tickers(&self) -> Vec<&str> {
        self.constituents.iter().map(|c| c.ticker.as_str()).collect()
    }

    /// Sector names, sorted.
    pub fn sector_names(&self) -> Vec<&str> {
        self.by_sector().into_keys().collect()
    }

    /// Members of one sector, in source order.
    pub fn sector_members(&self, sector: &str) -> Vec<&Constituent> {
        self.constituents
            .iter()
            .filter(|c| c.sector == sector)
            .collect()
    }

    /// Members grouped by sector.
    pub fn by_sector(&self) -> BTreeMap<&str, Vec<&Constituent>> {
        let mut sectors: BTreeMap<&str, Vec<&Constituent>> = BTreeMap::new();
        for c in &self.constituents {
            sectors.entry(c.sector.as_str()).or_default().push(c);
        }
        sectors
    }
}
