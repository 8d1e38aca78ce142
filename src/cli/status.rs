use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::format_bytes;
use crate::reports::store_counts;
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let data_dir = std::path::PathBuf::from(&settings.data_dir);
    let db_path = data_dir.join("kassa.db");

    println!("Data dir:   {}", data_dir.display());
    println!("Database:   {}", db_path.display());
    println!("CSV glob:   {}", settings.csv_pattern);

    if db_path.exists() {
        let size = std::fs::metadata(&db_path)?.len();
        println!("DB size:    {}", format_bytes(size));

        let conn = get_connection(&db_path)?;
        let counts = store_counts(&conn)?;

        println!();
        println!("Transactions:    {}", counts.transactions);
        println!("Uncategorised:   {}", counts.uncategorised);
        println!("Excluded:        {}", counts.excluded);
        println!("Categories:      {}", counts.categories);
        println!("Tags:            {}", counts.tags);
        println!("Exclusion rules: {}", counts.exclusion_rules);
        println!("Fingerprints:    {}", counts.fingerprints);
    } else {
        println!();
        println!("Database not found. Run `kassa init` to set up.");
    }

    Ok(())
}
