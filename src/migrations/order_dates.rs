use crate::{
    cache::LookupCache,
    documents::{Document, ORDERS, OrderDoc, PRODUCTS, ProductHistory, SalesRound},
    error::{DocumentError, PlanError},
    patch::Patch,
    runner::Migration,
};
use async_trait::async_trait;

const PICKUP_DATE: &str = "pickupDate";
const PICKUP_DEADLINE_DATE: &str = "pickupDeadlineDate";

/// Copies pickup dates onto orders from the sales round they were placed in.
///
/// Only the first order item is consulted; its product and round govern the
/// whole order.
#[derive(Clone, Copy, Debug, Default)]
pub struct OrderDateBackfill;

#[async_trait]
impl Migration for OrderDateBackfill {
    fn name(&self) -> &str {
        "backfill-order-dates"
    }

    fn source(&self) -> &str {
        ORDERS
    }

    fn lookup(&self) -> &str {
        PRODUCTS
    }

    fn default_batch_size(&self) -> usize {
        400
    }

    async fn plan(
        &self,
        doc: &Document,
        lookup: &mut LookupCache<'_>,
    ) -> Result<Option<Patch>, PlanError> {
        if doc.is_set(PICKUP_DEADLINE_DATE) {
            return Ok(None);
        }
        let order: OrderDoc = doc.view()?;
        let Some(item) = order.first_item()? else {
            return Ok(None);
        };

        let product_id = non_empty(item.product_id.as_deref())
            .ok_or_else(|| DocumentError::missing("productId"))?;
        let round_id = non_empty(item.round_id.as_deref())
            .ok_or_else(|| DocumentError::missing("roundId"))?;

        let Some(product) = lookup.fetch(product_id).await? else {
            return Err(DocumentError::ForeignNotFound {
                collection: PRODUCTS.to_string(),
                id: product_id.to_string(),
            }
            .into());
        };
        let history: ProductHistory = product.view()?;
        let round = history
            .round(round_id)?
            .ok_or_else(|| DocumentError::RoundNotFound {
                product_id: product_id.to_string(),
                round_id: round_id.to_string(),
            })?;

        Ok(Some(backfill_patch(&order, &round)))
    }
}

/// Fields the order lacks entirely, taken from the round. A field stored as
/// null on the order counts as present and is left alone.
pub fn backfill_patch(order: &OrderDoc, round: &SalesRound) -> Patch {
    let mut patch = Patch::builder();
    if order.pickup_date.is_absent() {
        patch = patch.set_if(PICKUP_DATE, round.pickup_date.stored());
    }
    if order.pickup_deadline_date.is_absent() {
        patch = patch.set_if(PICKUP_DEADLINE_DATE, round.pickup_deadline_date.stored());
    }
    patch.build()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
