use colored::Colorize;

pub fn print_error_message(error_message: &str) {
    println!("{}", error_message.red());
}

pub fn print_warn_message(warn_message: &str) {
    println!("{}", warn_message.yellow());
}

pub fn print_success_message(success_message: &str) {
    println!("{}", success_message.green());
}

/// Prints rows as left aligned columns under a bold header.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let header_line = headers
        .iter()
        .zip(&widths)
        .map(|(header, width)| format!("{:<width$}", header, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header_line.bold());

    for row in rows {
        let line = row
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ");
        println!("{}", line);
    }
}

pub fn format_optional<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_else(|| "-".to_string())
}
