//! `pv list`: table of linked projects.

use anyhow::{Context, Result};
use pv_core::{Paths, Project, Registry, Settings};

pub async fn run() -> Result<()> {
    let paths = Paths::new();
    let registry = Registry::load(&paths).await.context("cannot load registry")?;

    if registry.is_empty() {
        println!("No projects linked yet. Run `pv link` in a project directory to get started.");
        return Ok(());
    }

    let settings = Settings::load(&paths).await?;

    let rows: Vec<Vec<String>> = registry
        .list()
        .iter()
        .map(|project| {
            let kind = project.kind.as_str();
            vec![
                project.name.clone(),
                format!("https://{}.{}", project.name, settings.tld),
                if kind.is_empty() { "-" } else { kind }.to_string(),
                php_label(project, &settings.global_php),
                project.path.display().to_string(),
            ]
        })
        .collect();

    print_table(&["NAME", "URL", "TYPE", "PHP", "PATH"], &rows);
    Ok(())
}

/// Effective version, annotated when it comes from the global default.
fn php_label(project: &Project, global_php: &str) -> String {
    let effective = project.effective_php(global_php);
    if effective.is_empty() {
        "-".to_string()
    } else if project.php.is_empty() {
        format!("{effective} (global)")
    } else {
        effective.to_string()
    }
}

/// Column-aligned output with two spaces between columns, like tabwriter.
fn print_table(header: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = header.iter().map(|cell| cell.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            widths[i] = widths[i].max(cell.len());
        }
    }

    println!("{}", format_row(header.iter().copied(), &widths));
    for row in rows {
        println!("{}", format_row(row.iter().map(String::as_str), &widths));
    }
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = String::new();
    for (i, cell) in cells.enumerate() {
        line.push_str(&format!("{cell:<width$}  ", width = widths[i]));
    }
    line.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn project(name: &str, php: &str) -> Project {
        Project {
            name: name.to_string(),
            path: PathBuf::from("/tmp/app"),
            kind: pv_core::ProjectType::Laravel,
            php: php.to_string(),
        }
    }

    #[test]
    fn global_version_is_annotated() {
        assert_eq!(php_label(&project("a", ""), "8.4"), "8.4 (global)");
        assert_eq!(php_label(&project("a", "8.3"), "8.4"), "8.3");
        assert_eq!(php_label(&project("a", ""), ""), "-");
    }

    #[test]
    fn rows_align_to_widest_cell() {
        let rows = vec![
            vec!["short".to_string(), "x".to_string()],
            vec!["a-much-longer-name".to_string(), "y".to_string()],
        ];
        let widths = vec![18, 1];
        assert_eq!(
            format_row(rows[0].iter().map(String::as_str), &widths),
            "short               x"
        );
    }
}
