use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::amount;
use crate::reports;
use crate::settings::get_data_dir;

pub fn summary(monthly: bool) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("kassa.db"))?;
    let pivot = reports::summary(&conn, monthly)?;

    if pivot.periods.is_empty() {
        println!("No transactions to report.");
        return Ok(());
    }

    let mut table = Table::new();
    let mut header = vec![if monthly { "Month" } else { "Year" }.to_string()];
    header.extend(pivot.categories.iter().cloned());
    table.set_header(header);

    for (row_idx, period) in pivot.periods.iter().enumerate() {
        let mut cells = vec![Cell::new(period)];
        for value in &pivot.cells[row_idx] {
            cells.push(Cell::new(value.map(amount).unwrap_or_default()));
        }
        table.add_row(cells);
    }
    let mut cells = vec![Cell::new("total")];
    for value in &pivot.totals {
        cells.push(Cell::new(value.map(amount).unwrap_or_default()));
    }
    table.add_row(cells);

    println!("{}\n{table}", "Expenses".green().bold());
    Ok(())
}

pub fn subcategory(name: &str) -> Result<()> {
    let conn = get_connection(&get_data_dir().join("kassa.db"))?;
    let rows = reports::sub_category_register(&conn, name)?;

    if rows.is_empty() {
        println!("No transactions in '{name}'.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Date", "Title", "Vendor", "Amount"]);
    let mut total = 0.0;
    for row in &rows {
        total += row.amount;
        table.add_row(vec![
            Cell::new(&row.date),
            Cell::new(&row.title),
            Cell::new(row.vendor.clone().unwrap_or_default()),
            Cell::new(amount(row.amount)),
        ]);
    }
    table.add_row(vec![
        Cell::new("total"),
        Cell::new(""),
        Cell::new(""),
        Cell::new(amount(total)),
    ]);

    println!("{}\n{table}", format!("Expenses in {name}").green().bold());
    Ok(())
}
