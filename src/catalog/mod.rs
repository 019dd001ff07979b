use log::{debug, warn};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;
use thiserror::Error;

/// Canonical tag tokens of a product, ordered so identical sets compare and hash equal.
pub type TagSet = BTreeSet<String>;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read or parse CSV file: {0}")]
    CsvError(#[from] PolarsError),
    #[error("Failed to parse JSON catalog: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Failed to read catalog file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Catalog file is missing required column: '{0}'")]
    MissingColumns(String),
    #[error("Invalid price at row {row}: {reason}")]
    InvalidPrice { row: usize, reason: String },
    #[error("Unsupported catalog format '{0}' (expected .csv or .json)")]
    UnsupportedFormat(String),
}

/// Configuration for catalog loading
#[derive(Debug, Clone, Default)]
pub struct LoadConfig {
    /// Drop rows whose price is missing or invalid instead of failing the whole load
    pub skip_invalid_rows: bool,
}

/// One row of the tagged product table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Row index in the full catalog. Survives price filtering.
    #[serde(default)]
    pub id: usize,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub tags: TagSet,
}

impl Product {
    pub fn new(name: impl Into<String>, price: f64, tags: &[&str]) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: String::new(),
            price,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Validates that the price is usable for range filtering
    pub fn validate(&self) -> Result<(), String> {
        if !self.price.is_finite() {
            return Err(format!("Price ({}) must be a finite number", self.price));
        }
        if self.price < 0.0 {
            return Err(format!("Price ({}) cannot be negative", self.price));
        }
        Ok(())
    }
}

/// Inclusive price bounds; `None` leaves that side unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
}

impl PriceRange {
    pub fn new(min_price: Option<f64>, max_price: Option<f64>) -> Self {
        Self {
            min_price,
            max_price,
        }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min_price.map_or(true, |min| price >= min)
            && self.max_price.map_or(true, |max| price <= max)
    }

    /// A range with min above max admits nothing; this is a valid (empty) outcome.
    pub fn is_inverted(&self) -> bool {
        matches!((self.min_price, self.max_price), (Some(min), Some(max)) if min > max)
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = |v: Option<f64>| v.map_or_else(|| "any".to_string(), |p| format!("{}", p));
        write!(f, "({}, {})", side(self.min_price), side(self.max_price))
    }
}

/// The in-memory product table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    /// Builds a full catalog, numbering each product by its position.
    pub fn new(products: Vec<Product>) -> Self {
        let products = products
            .into_iter()
            .enumerate()
            .map(|(id, p)| Product { id, ..p })
            .collect();
        Self { products }
    }

    /// Wraps rows that already carry their catalog ids (filtered or selected tables).
    pub fn from_rows(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// Loads a catalog, dispatching on the file extension.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        Self::load_with_config(path, &LoadConfig::default())
    }

    pub fn load_with_config(path: &Path, config: &LoadConfig) -> Result<Self, CatalogError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => load_csv_with_config(path, config),
            "json" => load_json_with_config(path, config),
            other => Err(CatalogError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn products(&self) -> &[Product] {
        &self.products
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.products.iter()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn into_products(self) -> Vec<Product> {
        self.products
    }

    /// Returns the rows whose price lies inside `range`, ids untouched.
    pub fn filter_by_price(&self, range: &PriceRange) -> Catalog {
        if range.is_inverted() {
            warn!(
                "Price range {} is inverted; no product can be selected",
                range
            );
        }
        let products = self
            .products
            .iter()
            .filter(|p| range.contains(p.price))
            .cloned()
            .collect();
        Catalog { products }
    }

    /// Hash over every row, used to tie an export to the catalog it was computed from.
    pub fn fingerprint(&self) -> String {
        let mut hasher = DefaultHasher::new();
        for product in &self.products {
            product.id.hash(&mut hasher);
            product.name.hash(&mut hasher);
            product.price.to_bits().hash(&mut hasher);
            product.tags.hash(&mut hasher);
        }
        format!("{:x}", hasher.finish())
    }
}

/// Keeps the first row of every distinct tag set, preserving order.
///
/// Two rows with identical tags are interchangeable for recommendation purposes, so only one
/// of them is shown.
pub fn dedup_by_tags(products: Vec<Product>) -> Vec<Product> {
    let mut seen: HashSet<TagSet> = HashSet::new();
    products
        .into_iter()
        .filter(|p| seen.insert(p.tags.clone()))
        .collect()
}

/// Splits a raw `tags` cell into tokens.
///
/// Accepts `a|b`, `a, b`, `a;b`, whitespace separated tokens and list literals such as
/// `['a', 'b']`.
pub fn parse_tags(raw: &str) -> TagSet {
    raw.split(|c: char| c == '|' || c == ',' || c == ';' || c.is_whitespace())
        .map(|token| {
            token
                .trim_matches(|c: char| matches!(c, '[' | ']' | '{' | '}' | '(' | ')' | '\'' | '"'))
                .to_lowercase()
        })
        .filter(|token| !token.is_empty())
        .collect()
}

/// Column names resolved against the CSV header
struct CatalogColumns {
    name: String,
    price: String,
    tags: String,
    description: Option<String>,
}

fn find_column(columns: &[String], candidates: &[&str]) -> Option<String> {
    candidates.iter().find_map(|candidate| {
        columns
            .iter()
            .find(|c| c.trim().eq_ignore_ascii_case(candidate))
            .cloned()
    })
}

/// Detects the column mapping for the CSV file
fn detect_columns(df: &DataFrame) -> Result<CatalogColumns, CatalogError> {
    let columns: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let name = find_column(&columns, &["name", "title", "product_name"])
        .ok_or_else(|| CatalogError::MissingColumns("name".to_string()))?;
    let price = find_column(&columns, &["price", "final_price"])
        .ok_or_else(|| CatalogError::MissingColumns("price".to_string()))?;
    let tags = find_column(&columns, &["tags"])
        .ok_or_else(|| CatalogError::MissingColumns("tags".to_string()))?;
    let description = find_column(&columns, &["description"]);

    Ok(CatalogColumns {
        name,
        price,
        tags,
        description,
    })
}

/// Loads a tagged product table from a CSV file.
pub fn load_csv(file_path: &Path) -> Result<Catalog, CatalogError> {
    load_csv_with_config(file_path, &LoadConfig::default())
}

pub fn load_csv_with_config(file_path: &Path, config: &LoadConfig) -> Result<Catalog, CatalogError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(file_path.into()))?
        .finish()?;

    let columns = detect_columns(&df)?;

    let name_binding = df.column(&columns.name)?.cast(&DataType::String)?;
    let names = name_binding.str()?;
    let price_binding = df.column(&columns.price)?.cast(&DataType::Float64)?;
    let prices = price_binding.f64()?;
    let tag_binding = df.column(&columns.tags)?.cast(&DataType::String)?;
    let tag_cells = tag_binding.str()?;
    let description_binding = match &columns.description {
        Some(col) => Some(df.column(col)?.cast(&DataType::String)?),
        None => None,
    };
    let descriptions = match &description_binding {
        Some(col) => Some(col.str()?),
        None => None,
    };

    let mut products = Vec::with_capacity(df.height());
    for row in 0..df.height() {
        let product = Product {
            id: 0,
            name: names.get(row).unwrap_or_default().to_string(),
            description: descriptions
                .and_then(|d| d.get(row))
                .unwrap_or_default()
                .to_string(),
            price: prices.get(row).unwrap_or(f64::NAN),
            tags: tag_cells.get(row).map(parse_tags).unwrap_or_default(),
        };

        if let Err(reason) = product.validate() {
            if config.skip_invalid_rows {
                warn!("Skipping row {} ('{}'): {}", row, product.name, reason);
                continue;
            }
            return Err(CatalogError::InvalidPrice { row, reason });
        }
        products.push(product);
    }

    debug!(
        "Loaded {} products from '{}'",
        products.len(),
        file_path.display()
    );
    Ok(Catalog::new(products))
}

/// Loads a tagged product table from a JSON array of product records.
pub fn load_json(file_path: &Path) -> Result<Catalog, CatalogError> {
    load_json_with_config(file_path, &LoadConfig::default())
}

pub fn load_json_with_config(
    file_path: &Path,
    config: &LoadConfig,
) -> Result<Catalog, CatalogError> {
    let content = fs::read_to_string(file_path)?;
    let records: Vec<Product> = serde_json::from_str(&content)?;

    let mut products = Vec::with_capacity(records.len());
    for (row, product) in records.into_iter().enumerate() {
        if let Err(reason) = product.validate() {
            if config.skip_invalid_rows {
                warn!("Skipping row {} ('{}'): {}", row, product.name, reason);
                continue;
            }
            return Err(CatalogError::InvalidPrice { row, reason });
        }
        products.push(product);
    }
    Ok(Catalog::new(products))
}
