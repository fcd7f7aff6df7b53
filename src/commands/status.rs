use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{ParserKind, StatusArgs};
use crate::pipeline::table_for;
use crate::store;

pub fn run(args: StatusArgs) -> Result<()> {
    info!(db = %args.db_path.display(), "status requested");

    if !args.db_path.exists() {
        warn!(path = %args.db_path.display(), "database file missing");
        return Ok(());
    }

    let conn = store::open(&args.db_path)?;
    let raw_count = store::table_count(&conn, store::RAW_TABLE).unwrap_or(0);
    info!(table = store::RAW_TABLE, rows = raw_count, "raw listings");

    for kind in ParserKind::all() {
        let table = table_for(kind);
        let rows = store::table_count(&conn, table.name).unwrap_or(0);
        let missing = store::count_records(&conn, table, true).unwrap_or(0);

        info!(
            parser = kind.as_str(),
            table = table.name,
            rows,
            missing,
            "parsed table status"
        );
    }

    Ok(())
}
