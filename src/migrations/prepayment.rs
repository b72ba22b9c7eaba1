use crate::{
    cache::LookupCache,
    documents::{Document, PRODUCTS},
    error::{DocumentError, PlanError},
    patch::Patch,
    runner::Migration,
};
use async_trait::async_trait;
use serde_json::Value;

const SALES_HISTORY: &str = "salesHistory";
const PREPAYMENT_FLAG: &str = "isPrepaymentRequired";

/// Initializes `isPrepaymentRequired = false` on every sales round missing it.
#[derive(Clone, Copy, Debug, Default)]
pub struct PrepaymentFlagBackfill;

#[async_trait]
impl Migration for PrepaymentFlagBackfill {
    fn name(&self) -> &str {
        "backfill-prepayment-flag"
    }

    fn source(&self) -> &str {
        PRODUCTS
    }

    async fn plan(
        &self,
        doc: &Document,
        _lookup: &mut LookupCache<'_>,
    ) -> Result<Option<Patch>, PlanError> {
        Ok(backfill_prepayment_flag(doc)?)
    }
}

/// Rewrites the whole `salesHistory` list when at least one round lacks the flag.
pub fn backfill_prepayment_flag(doc: &Document) -> Result<Option<Patch>, DocumentError> {
    let Some(Value::Array(rounds)) = doc.get(SALES_HISTORY) else {
        return Ok(None);
    };
    let mut changed = false;
    let mut updated = Vec::with_capacity(rounds.len());
    for round in rounds {
        let Value::Object(fields) = round else {
            return Err(DocumentError::Malformed {
                reason: format!("{SALES_HISTORY} entry is not an object"),
            });
        };
        let mut fields = fields.clone();
        if !fields.contains_key(PREPAYMENT_FLAG) {
            fields.insert(PREPAYMENT_FLAG.to_string(), Value::Bool(false));
            changed = true;
        }
        updated.push(Value::Object(fields));
    }
    if !changed {
        return Ok(None);
    }
    Ok(Some(
        Patch::builder()
            .set(SALES_HISTORY, Value::Array(updated))
            .build(),
    ))
}
