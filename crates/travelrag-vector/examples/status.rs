use std::path::Path;

use travelrag_core::traits::VectorStore;
use travelrag_vector::LanceVectorStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ws_root = Path::new(env!("CARGO_MANIFEST_DIR")).ancestors().nth(2).unwrap_or(Path::new("."));
    let db_path = ws_root.join("dev_data/indexes/lancedb");
    let store = LanceVectorStore::open(&db_path, "travel_data", 384).await?;
    println!("documents: {}", store.count().await?);
    match store.last_persisted().await? {
        Some(cp) => println!("persisted: version={} at={}", cp.version, cp.at_millis),
        None => println!("persisted: never"),
    }
    Ok(())
}
