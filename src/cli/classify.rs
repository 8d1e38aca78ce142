use colored::Colorize;

use crate::cli::sync::run_classify;
use crate::db::get_connection;
use crate::error::Result;
use crate::settings::get_data_dir;

pub fn run(overwrite: bool) -> Result<()> {
    let data_dir = get_data_dir();
    let mut conn = get_connection(&data_dir.join("kassa.db"))?;

    let outcome = run_classify(&mut conn, &data_dir, overwrite)?;
    if outcome.updated > 0 {
        println!("Classified: {} rows", outcome.updated);
    } else {
        println!("Classified: no update");
    }
    if outcome.ambiguous > 0 {
        eprintln!(
            "{} {} rows matched more than one tag",
            "warning:".yellow().bold(),
            outcome.ambiguous
        );
    }
    Ok(())
}
