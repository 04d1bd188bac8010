use calamine::{open_workbook_auto, DataType, Reader};
use std::env;

use gas_meter_analyzer::importers::{DetectorRegistry, SheetLayout};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    let Some(file_path) = args.get(1) else {
        eprintln!("usage: examine-workbook <workbook.xlsx> [sheet]");
        std::process::exit(2);
    };

    println!("Opening workbook: {file_path}");
    let mut workbook = open_workbook_auto(file_path)?;
    let sheet_names = workbook.sheet_names();

    println!("\nSheet names:");
    for (i, name) in sheet_names.iter().enumerate() {
        println!("  {i}: {name}");
    }

    // Allow specifying which sheet to examine, default to the first
    let sheet_name = match args.get(2) {
        Some(name) => name.clone(),
        None => sheet_names.first().cloned().ok_or("workbook has no sheets")?,
    };

    println!("\n\nExamining sheet: {sheet_name}");
    println!("{}", "=".repeat(100));

    let range = workbook.worksheet_range(&sheet_name)?;
    println!("Dimensions: {:?} (starts at {:?})", range.get_size(), range.start());

    println!("\nFirst 30 rows (showing first 8 columns):");
    println!("{}", "=".repeat(100));

    let (start_row, _) = range.start().unwrap_or((0, 0));
    for (row_idx, row) in range.rows().enumerate().take(30) {
        let has_data = row.iter().any(|cell| !cell.is_empty());
        if has_data {
            print!("Row {:3}: ", start_row as usize + row_idx + 1);
            for cell in row.iter().take(8) {
                if cell.is_empty() {
                    print!("[empty] ");
                } else {
                    print!("[{cell}] ");
                }
            }
            println!();
        }
    }

    // Show which columns the importer would pick
    let layout = SheetLayout::default();
    let width = range.end().map(|(_, c)| c + 1).unwrap_or(0);
    let headers: Vec<String> = (0..width)
        .map(|col| {
            range
                .get_value((layout.header_row, col))
                .map(|cell| cell.to_string().trim().to_string())
                .unwrap_or_default()
        })
        .collect();

    println!("\n{}", "=".repeat(100));
    println!("Header row {}: {:?}", layout.header_row + 1, headers);
    match DetectorRegistry::default().resolve(None, &headers) {
        Some(mapping) => println!("Detected columns: {mapping:?}"),
        None => println!("No flow column detected"),
    }

    Ok(())
}
