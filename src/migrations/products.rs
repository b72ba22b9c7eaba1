use crate::{
    cache::LookupCache,
    documents::{Document, LegacyProduct, PRODUCTS, PricingOption, ProductItem},
    error::{DocumentError, PlanError},
    patch::Patch,
    runner::Migration,
};
use async_trait::async_trait;
use serde_json::{Number, Value};
use tracing::debug;

const GROUP_NAME: &str = "groupName";
const ITEMS: &str = "items";
const ONSITE_SALE: &str = "isAvailableForOnsiteSale";

/// Legacy fields dropped in the same write that adds the new ones.
const OBSOLETE_FIELDS: &[&str] = &["name", "pricingOptions", "stock", "maxOrderPerPerson"];

const DEFAULT_GROUP_NAME: &str = "이름 없음";
const DEFAULT_OPTION_NAME: &str = "품목명 없음";
const DEFAULT_ITEM_NAME: &str = "기본 품목";
const DEFAULT_UNIT: &str = "개";

/// Moves products from the `name`/`pricingOptions` shape to
/// `groupName`/`items`/`isAvailableForOnsiteSale`.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProductSchemaMigration;

#[async_trait]
impl Migration for ProductSchemaMigration {
    fn name(&self) -> &str {
        "migrate-products"
    }

    fn source(&self) -> &str {
        PRODUCTS
    }

    fn default_batch_size(&self) -> usize {
        499
    }

    async fn plan(
        &self,
        doc: &Document,
        _lookup: &mut LookupCache<'_>,
    ) -> Result<Option<Patch>, PlanError> {
        Ok(normalize_product(doc)?)
    }
}

/// Patch converting a legacy product, or `None` if it already carries both
/// `groupName` and `items`.
pub fn normalize_product(doc: &Document) -> Result<Option<Patch>, DocumentError> {
    if doc.has(GROUP_NAME) && doc.has(ITEMS) {
        return Ok(None);
    }
    let legacy: LegacyProduct = doc.view()?;
    if legacy.pricing_options.is_none() {
        debug!(id = %doc.id, "no pricing options, synthesizing a single item");
    }
    let items = build_items(&legacy);

    let mut patch = Patch::builder()
        .set(
            GROUP_NAME,
            legacy.name.as_deref().unwrap_or(DEFAULT_GROUP_NAME),
        )
        .set_json(ITEMS, &items)
        .map_err(|e| DocumentError::Malformed {
            reason: e.to_string(),
        })?;
    if !doc.has(ONSITE_SALE) {
        patch = patch.set(ONSITE_SALE, false);
    }
    Ok(Some(patch.delete_present(doc, OBSOLETE_FIELDS).build()))
}

/// Target-schema items: one per pricing option, or a single item built from
/// the product's own fields when it has no option list.
pub fn build_items(legacy: &LegacyProduct) -> Vec<ProductItem> {
    match &legacy.pricing_options {
        Some(options) => options
            .iter()
            .map(|opt| item_from_option(opt, legacy.name.as_deref()))
            .collect(),
        None => vec![ProductItem {
            name: legacy
                .name
                .clone()
                .unwrap_or_else(|| DEFAULT_ITEM_NAME.to_string()),
            price: legacy.price.clone().unwrap_or_else(|| Number::from(0)),
            stock: legacy.stock.clone().unwrap_or_else(unlimited),
            unit_type: legacy
                .unit_type
                .clone()
                .unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            limit_quantity: non_null(legacy.max_order_per_person.clone()),
            expiration_date: non_null(legacy.expiration_date.clone()),
        }],
    }
}

fn item_from_option(opt: &PricingOption, product_name: Option<&str>) -> ProductItem {
    ProductItem {
        name: opt
            .name
            .as_deref()
            .or(product_name)
            .unwrap_or(DEFAULT_OPTION_NAME)
            .to_string(),
        price: opt.price.clone().unwrap_or_else(|| Number::from(0)),
        stock: opt.stock.clone().unwrap_or_else(unlimited),
        unit_type: opt.unit.clone().unwrap_or_else(|| DEFAULT_UNIT.to_string()),
        limit_quantity: non_null(opt.limit_quantity.clone()),
        expiration_date: non_null(opt.expiration_date.clone()),
    }
}

fn unlimited() -> Number {
    Number::from(-1)
}

fn non_null(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}
