//! Product catalog loading and the per-locale product paragraph.

use crate::indexer::{IndexerError, SourceUnit};
use crate::knowledge::{ContentType, KnowledgeChunk};
use crate::locale::Locale;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

/// Text stored once per locale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Localized<T> {
    /// English value.
    #[serde(default)]
    pub en: T,
    /// Bulgarian value.
    #[serde(default)]
    pub bg: T,
}

impl<T> Localized<T> {
    /// Value for `locale`.
    pub fn get(&self, locale: Locale) -> &T {
        match locale {
            Locale::En => &self.en,
            Locale::Bg => &self.bg,
        }
    }
}

impl Localized<String> {
    /// Value for `locale`, falling back to the other locale when blank.
    pub fn text(&self, locale: Locale) -> &str {
        let preferred = self.get(locale).trim();
        if !preferred.is_empty() {
            return preferred;
        }
        match locale {
            Locale::En => self.bg.trim(),
            Locale::Bg => self.en.trim(),
        }
    }
}

/// One catalog entry as exported by the storefront.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Stable catalog id.
    pub id: String,
    /// Stock keeping unit.
    #[serde(default)]
    pub sku: Option<String>,
    /// URL slug; the id is used when absent.
    #[serde(default)]
    pub slug: Option<String>,
    /// Display name.
    pub name: Localized<String>,
    /// Long description.
    #[serde(default)]
    pub description: Localized<String>,
    /// Category slug, e.g. `laminate`.
    pub category: String,
    /// Collection the product belongs to.
    #[serde(default)]
    pub collection: Option<String>,
    /// Unit price.
    #[serde(default)]
    pub price: Option<f64>,
    /// ISO currency code of `price`.
    #[serde(default)]
    pub currency: Option<String>,
    /// Installation method key: `click`, `glue`, `nail` or `floating`.
    #[serde(default)]
    pub installation_method: Option<String>,
    /// Selling points.
    #[serde(default)]
    pub features: Localized<Vec<String>>,
    /// Technical specifications keyed by spec name.
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    /// Main product image.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Specifications included in the rendered paragraph, in output order.
const SELECTED_SPECIFICATIONS: [&str; 7] = [
    "thickness",
    "wearLayer",
    "dimensions",
    "finish",
    "waterResistance",
    "underfloorHeating",
    "warranty",
];

struct Labels {
    price: &'static str,
    category: &'static str,
    collection: &'static str,
    installation: &'static str,
    features: &'static str,
    specifications: &'static str,
}

const EN_LABELS: Labels = Labels {
    price: "Price",
    category: "Category",
    collection: "Collection",
    installation: "Installation",
    features: "Features",
    specifications: "Specifications",
};

const BG_LABELS: Labels = Labels {
    price: "Цена",
    category: "Категория",
    collection: "Колекция",
    installation: "Монтаж",
    features: "Предимства",
    specifications: "Спецификации",
};

fn labels(locale: Locale) -> &'static Labels {
    match locale {
        Locale::En => &EN_LABELS,
        Locale::Bg => &BG_LABELS,
    }
}

fn installation_label(method: &str, locale: Locale) -> &str {
    match (method, locale) {
        ("click", Locale::En) => "click-lock system",
        ("click", Locale::Bg) => "система за заключване (клик)",
        ("glue", Locale::En) => "glued down",
        ("glue", Locale::Bg) => "лепене",
        ("nail", Locale::En) => "nailed down",
        ("nail", Locale::Bg) => "заковаване",
        ("floating", Locale::En) => "floating installation",
        ("floating", Locale::Bg) => "плаващ монтаж",
        (other, _) => other,
    }
}

fn specification_label(key: &str, locale: Locale) -> &str {
    match (key, locale) {
        ("thickness", Locale::En) => "Thickness",
        ("thickness", Locale::Bg) => "Дебелина",
        ("wearLayer", Locale::En) => "Wear layer",
        ("wearLayer", Locale::Bg) => "Износоустойчив слой",
        ("dimensions", Locale::En) => "Dimensions",
        ("dimensions", Locale::Bg) => "Размери",
        ("finish", Locale::En) => "Finish",
        ("finish", Locale::Bg) => "Покритие",
        ("waterResistance", Locale::En) => "Water resistance",
        ("waterResistance", Locale::Bg) => "Водоустойчивост",
        ("underfloorHeating", Locale::En) => "Underfloor heating",
        ("underfloorHeating", Locale::Bg) => "Подово отопление",
        ("warranty", Locale::En) => "Warranty",
        ("warranty", Locale::Bg) => "Гаранция",
        (other, _) => other,
    }
}

/// Read the catalog, a JSON array of products.
pub fn load_catalog(path: &Path) -> Result<Vec<Product>, IndexerError> {
    let raw = std::fs::read_to_string(path).map_err(|source| IndexerError::Catalog {
        path: path.to_path_buf(),
        source,
    })?;
    let products: Vec<Product> = serde_json::from_str(&raw)?;
    tracing::info!(path = %path.display(), products = products.len(), "Loaded product catalog");
    Ok(products)
}

/// Deterministic paragraph describing `product` in `locale`.
pub fn render_product(product: &Product, locale: Locale) -> String {
    let labels = labels(locale);
    let mut text = String::from(product.name.text(locale));

    if let Some(price) = product.price {
        let currency = product.currency.as_deref().unwrap_or("EUR");
        let _ = write!(text, "\n{}: {price:.2} {currency}", labels.price);
    }
    let _ = write!(text, "\n{}: {}", labels.category, product.category);
    if let Some(collection) = product.collection.as_deref().filter(|c| !c.is_empty()) {
        let _ = write!(text, "\n{}: {collection}", labels.collection);
    }
    if let Some(method) = product.installation_method.as_deref() {
        let _ = write!(
            text,
            "\n{}: {}",
            labels.installation,
            installation_label(method, locale)
        );
    }

    let description = product.description.text(locale);
    if !description.is_empty() {
        let _ = write!(text, "\n\n{description}");
    }

    let features = product.features.get(locale);
    if !features.is_empty() {
        let _ = write!(text, "\n\n{}:", labels.features);
        for feature in features {
            let _ = write!(text, "\n- {}", feature.trim());
        }
    }

    let specifications: Vec<(&str, &str)> = SELECTED_SPECIFICATIONS
        .iter()
        .filter_map(|key| {
            product
                .specifications
                .get(*key)
                .map(|value| (*key, value.as_str()))
        })
        .collect();
    if !specifications.is_empty() {
        let _ = write!(text, "\n\n{}:", labels.specifications);
        for (key, value) in specifications {
            let _ = write!(text, "\n- {}: {value}", specification_label(key, locale));
        }
    }

    text
}

/// Source id of a product's chunks.
pub fn product_source_id(product: &Product) -> String {
    format!("product:{}", product.id)
}

/// One single-chunk unit per product and locale, optionally restricted to one collection.
pub fn product_units(
    products: &[Product],
    site_base_url: &str,
    collection: Option<&str>,
) -> Result<Vec<SourceUnit>, IndexerError> {
    let base = site_base_url.trim_end_matches('/');
    let mut units = Vec::new();
    for product in products {
        if let Some(wanted) = collection
            && product.collection.as_deref() != Some(wanted)
        {
            continue;
        }

        let record = serde_json::to_value(product)?;
        let slug = product.slug.as_deref().unwrap_or(&product.id);
        for locale in Locale::ALL {
            let chunk = KnowledgeChunk {
                text: render_product(product, locale),
                locale,
                content_type: ContentType::Product,
                category: product.category.clone(),
                source_id: product_source_id(product),
                source_url: format!("{base}/{locale}/products/{slug}"),
                source_title: product.name.text(locale).to_string(),
                chunk_index: 0,
                sku: product.sku.clone(),
                price: product.price,
                image_url: product.image_url.clone(),
                product: Some(record.clone()),
            };
            units.push(SourceUnit {
                source_id: chunk.source_id.clone(),
                locale,
                chunks: vec![chunk],
            });
        }
    }
    Ok(units)
}
