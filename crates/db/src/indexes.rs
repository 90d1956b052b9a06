use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Users
    create_indexes(
        db,
        "users",
        vec![
            index_unique(bson::doc! { "email": 1 }),
            index(bson::doc! { "role": 1 }),
        ],
    )
    .await?;

    // Credit transactions
    create_indexes(
        db,
        "credit_transactions",
        vec![
            index(bson::doc! { "user_id": 1, "created_at": -1 }),
            index(bson::doc! { "payment_id": 1 }),
        ],
    )
    .await?;

    // Payments
    create_indexes(
        db,
        "payments",
        vec![
            index_unique(bson::doc! { "transaction_ref": 1 }),
            index(bson::doc! { "user_id": 1, "created_at": -1 }),
            index(bson::doc! { "status": 1, "created_at": -1 }),
        ],
    )
    .await?;

    // Transcription history
    create_indexes(
        db,
        "transcription_history",
        vec![index(bson::doc! { "user_id": 1, "created_at": -1 })],
    )
    .await?;

    info!("MongoDB indexes ensured");
    Ok(())
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}
