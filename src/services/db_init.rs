use mongodb::{bson::doc, Database, IndexModel};

use tracing::warn;

use crate::error::AppResult;

pub async fn ensure_indexes(db: &Database) -> AppResult<()> {
    // requests: cascade on user delete and per-user listing scan by holder
    {
        let col = db.collection::<mongodb::bson::Document>("requests");
        let model = IndexModel::builder()
            .keys(doc! { "subscribers.user_id": 1 })
            .build();

        col.create_index(model, None).await?;
    }

    // requests: operators look things up by pair
    {
        let col = db.collection::<mongodb::bson::Document>("requests");
        let model = IndexModel::builder().keys(doc! { "symbol": 1 }).build();

        if let Err(e) = col.create_index(model, None).await {
            warn!(error = %e, "requests.symbol index not created");
        }
    }

    Ok(())
}
