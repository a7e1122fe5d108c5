//! A process-wide database handle.
//!
//! The first caller of [`shared_database`] opens the pool and runs migrations. Callers that arrive while that is in
//! flight wait on the same attempt instead of opening pools of their own. If the attempt fails, the cell stays empty
//! and the next caller tries again. Once the pool is open, the arguments of later calls are ignored.
use log::*;
use tokio::sync::OnceCell;

use crate::SqliteDatabase;

static SHARED_DB: OnceCell<SqliteDatabase> = OnceCell::const_new();

pub async fn shared_database(url: &str, max_connections: u32) -> Result<&'static SqliteDatabase, sqlx::Error> {
    SHARED_DB
        .get_or_try_init(|| async {
            info!("🗃️ Opening shared database connection to {url}");
            let db = SqliteDatabase::new_with_url(url, max_connections).await?;
            db.migrate().await?;
            Ok::<_, sqlx::Error>(db)
        })
        .await
}
