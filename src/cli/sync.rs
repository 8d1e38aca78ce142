use std::path::{Path, PathBuf};

use colored::Colorize;
use regex::Regex;
use rusqlite::Connection;

use crate::classifier::{self, AllowedDuplicates};
use crate::db::{get_connection, init_db};
use crate::dictionary::{self, TagDictionary};
use crate::error::{KassaError, Result};
use crate::exclusions::{self, ExclusionRules};
use crate::fingerprint;
use crate::ingest;
use crate::settings::load_settings;

const CATEGORIES_FILE: &str = "categories.json";
const EXCLUDE_FILE: &str = "exclude.json";
const ALLOWED_DUPLICATES_FILE: &str = "allowed_duplicates.json";

/// One full batch pass: ingest changed exports, resynchronize changed
/// dictionaries, flag exclusions, classify, prune stale fingerprints.
/// Every phase reports its effect count, zero included.
pub fn run(force: bool) -> Result<()> {
    let settings = load_settings();
    let data_dir = PathBuf::from(&settings.data_dir);
    let mut conn = get_connection(&data_dir.join("kassa.db"))?;
    init_db(&conn)?;

    // Ingest
    let csv_files = find_csv_files(&data_dir, &settings.csv_pattern)?;
    let ingested = ingest::ingest(&mut conn, &csv_files, settings.delimiter_byte(), force)?;
    if ingested.inserted > 0 {
        println!("Transactions: {} inserted", ingested.inserted);
    } else {
        println!("Transactions: no update");
    }
    for (file, reason) in &ingested.failed {
        eprintln!(
            "{} {} not ingested: {reason}",
            "warning:".yellow().bold(),
            file.display()
        );
    }

    // Tag dictionary. A broken file fails this phase only: the old
    // fingerprint stays, so the file is re-checked next run.
    let categories_path = data_dir.join(CATEGORIES_FILE);
    let mut dictionary_changed = false;
    if categories_path.exists() && (force || fingerprint::has_changed(&conn, &categories_path)?) {
        match load_and_sync_dictionary(&mut conn, &categories_path) {
            Ok(outcome) => {
                dictionary_changed = outcome.changed();
                if outcome.changed() {
                    let total = outcome.total();
                    println!(
                        "Dictionary: {} added, {} removed",
                        total.inserted, total.removed
                    );
                } else {
                    println!("Dictionary: no update");
                }
            }
            Err(err) => eprintln!(
                "{} {} not synchronized: {err}",
                "warning:".yellow().bold(),
                categories_path.display()
            ),
        }
    } else {
        println!("Dictionary: no update");
    }

    // Exclusion rules
    let exclude_path = data_dir.join(EXCLUDE_FILE);
    if exclude_path.exists() && (force || fingerprint::has_changed(&conn, &exclude_path)?) {
        match load_and_sync_exclusions(&mut conn, &exclude_path) {
            Ok(outcome) => {
                if outcome.changed() {
                    println!(
                        "Exclusion rules: {} added, {} removed",
                        outcome.inserted, outcome.removed
                    );
                } else {
                    println!("Exclusion rules: no update");
                }
            }
            Err(err) => eprintln!(
                "{} {} not synchronized: {err}",
                "warning:".yellow().bold(),
                exclude_path.display()
            ),
        }
    } else {
        println!("Exclusion rules: no update");
    }

    // Exclusion pass, before classification so excluded rows stay excluded
    let stored_rules = exclusions::aggregate(&conn)?;
    let flagged = classifier::exclude(&mut conn, &stored_rules)?;
    if flagged > 0 {
        println!("Excluded: {flagged} rows");
    } else {
        println!("Excluded: no update");
    }

    // Classification; a changed dictionary invalidates old assignments
    let overwrite = force || dictionary_changed;
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

    // Drop fingerprints of files no longer tracked
    let mut tracked: Vec<&Path> = csv_files.iter().map(PathBuf::as_path).collect();
    tracked.push(&categories_path);
    tracked.push(&exclude_path);
    let pruned = fingerprint::prune(&conn, &tracked)?;
    if pruned > 0 {
        println!("Fingerprints: {pruned} pruned");
    }

    Ok(())
}

fn load_and_sync_dictionary(
    conn: &mut Connection,
    path: &Path,
) -> Result<dictionary::DictionarySyncOutcome> {
    let dict = TagDictionary::load(&std::fs::read_to_string(path)?)?;
    let tx = conn.transaction()?;
    let outcome = dictionary::synchronize(&tx, &dict)?;
    fingerprint::record(&tx, path)?;
    tx.commit()?;
    Ok(outcome)
}

fn load_and_sync_exclusions(
    conn: &mut Connection,
    path: &Path,
) -> Result<crate::reconcile::ReconcileOutcome> {
    let rules = ExclusionRules::load(&std::fs::read_to_string(path)?)?;
    let tx = conn.transaction()?;
    let outcome = exclusions::synchronize(&tx, &rules)?;
    fingerprint::record(&tx, path)?;
    tx.commit()?;
    Ok(outcome)
}

/// Shared by `kassa sync` and `kassa classify`: run the classifier against
/// the stored dictionary, honoring allowed_duplicates.json when present.
pub fn run_classify(
    conn: &mut Connection,
    data_dir: &Path,
    overwrite: bool,
) -> Result<classifier::ClassifyOutcome> {
    let groups = dictionary::aggregate(conn)?;
    let allowed_path = data_dir.join(ALLOWED_DUPLICATES_FILE);
    let allowed = if allowed_path.exists() {
        AllowedDuplicates::load(&std::fs::read_to_string(&allowed_path)?)?
    } else {
        AllowedDuplicates::default()
    };
    classifier::classify(conn, &groups, &allowed, overwrite)
}

fn find_csv_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let matcher = glob_regex(pattern)?;
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if matcher.is_match(&name.to_string_lossy()) {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// `hist*.csv` style patterns: `*` matches anything, the rest is literal.
fn glob_regex(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern).replace(r"\*", ".*");
    Regex::new(&format!("(?i)^{escaped}$"))
        .map_err(|e| KassaError::Other(format!("bad csv pattern '{pattern}': {e}")))
}
